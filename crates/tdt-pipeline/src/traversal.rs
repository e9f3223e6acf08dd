//! Input traversal of tokenized document files.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use tdt_types::TokenizedDocument;

use crate::error::PipelineError;

/// Outcome of walking an input tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputFiles {
    /// Files with the token suffix, sorted by path
    pub files: Vec<PathBuf>,
    /// Other files found
    pub rejected: Vec<PathBuf>,
    /// Entries the walk could not read
    pub errors: Vec<String>,
}

/// List token files under `root`.
///
/// Files not ending in `.{suffix}` are returned as rejected, and entries
/// the walk cannot read (unreadable directories, dangling links) as errors,
/// so the caller can report them and go on.
pub fn collect_token_files(root: &Path, suffix: &str) -> Result<InputFiles, PipelineError> {
    if !root.is_dir() {
        return Err(PipelineError::Input(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let ending = format!(".{}", suffix.trim_start_matches('.'));
    let mut input = InputFiles::default();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Input entry unreadable");
                input.errors.push(e.to_string());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(&ending));
        if matches {
            input.files.push(path);
        } else {
            input.rejected.push(path);
        }
    }
    debug!(
        root = %root.display(),
        files = input.files.len(),
        rejected = input.rejected.len(),
        errors = input.errors.len(),
        "Input collected"
    );
    Ok(input)
}

/// Read and validate one token file.
pub fn load_token_file(path: &Path) -> Result<TokenizedDocument, PipelineError> {
    let bytes = std::fs::read(path)
        .map_err(|e| PipelineError::Input(format!("cannot read {}: {}", path.display(), e)))?;
    Ok(TokenizedDocument::from_bytes(&bytes)?)
}
