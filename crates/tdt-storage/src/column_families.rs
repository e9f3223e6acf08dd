//! Column family definitions for RocksDB.
//!
//! - windows: per-window artifacts, keyed by community and artifact name
//! - globals: cross-window tables rewritten at session end
//! - checkpoints: session progress per community and scope

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family for per-window artifacts
pub const CF_WINDOWS: &str = "windows";

/// Column family for cross-window globals
pub const CF_GLOBALS: &str = "globals";

/// Column family for session checkpoints
pub const CF_CHECKPOINTS: &str = "checkpoints";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_WINDOWS, CF_GLOBALS, CF_CHECKPOINTS];

/// Window artifacts are large and written once per run.
fn windows_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_WINDOWS, windows_options()),
        ColumnFamilyDescriptor::new(CF_GLOBALS, Options::default()),
        ColumnFamilyDescriptor::new(CF_CHECKPOINTS, Options::default()),
    ]
}
