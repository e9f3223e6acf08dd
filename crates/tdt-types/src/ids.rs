//! Integer identifiers and shard selection.

/// Vertex identifier allocated by the [`LabelTable`](crate::LabelTable).
pub type VertexId = u32;

/// Document identifier allocated by the [`DocTable`](crate::DocTable).
pub type DocId = u32;

/// Facet key local to one window.
pub type LocalFacetKey = u32;

/// Permanent facet key spanning every processed window.
pub type GlobalFacetKey = u32;

/// Vertex id marking a document boundary or an unresolvable token.
pub const BOUNDARY_VERTEX: VertexId = 0;

/// Number of vertex dictionary shards (one per leading digit 1-9).
pub const SHARD_COUNT: usize = 9;

/// Shard slot for a vertex, selected by its leading decimal digit.
///
/// Returns `None` for the boundary vertex.
pub fn shard_index(id: VertexId) -> Option<usize> {
    if id == BOUNDARY_VERTEX {
        return None;
    }
    let leading = id / 10u32.pow(id.ilog10());
    Some(leading as usize - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_index_leading_digit() {
        assert_eq!(shard_index(1), Some(0));
        assert_eq!(shard_index(9), Some(8));
        assert_eq!(shard_index(10), Some(0));
        assert_eq!(shard_index(42), Some(3));
        assert_eq!(shard_index(987_654), Some(8));
        assert_eq!(shard_index(u32::MAX), Some(3));
    }

    #[test]
    fn test_shard_index_boundary() {
        assert_eq!(shard_index(BOUNDARY_VERTEX), None);
    }
}
