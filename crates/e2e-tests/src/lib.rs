//! End-to-end test infrastructure for topic detection and tracking.
//!
//! Provides a shared TestHarness and helper functions for E2E tests
//! covering the token-files-to-retrieval pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use tdt_facets::{Consolidator, UnusedBacklog};
use tdt_pipeline::{
    Diagnostic, NoOpProgressCallback, PipelineRunner, SessionContext, SessionOutcome,
    WindowReport,
};
use tdt_storage::Storage;
use tdt_types::{
    DocTable, GlobalArtifact, LabelTable, Scope, Settings, TokenRecord, TokenizedDocument,
};

/// Community used by every harness.
pub const COMMUNITY: &str = "default";

/// Shared test harness for E2E tests.
///
/// Provides storage, an input tree for token files, and helpers that run
/// sessions against them.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Shared storage instance
    pub storage: Arc<Storage>,
    /// Root of the token file tree
    pub input_root: PathBuf,
    /// Settings used by every session
    pub settings: Settings,
}

impl TestHarness {
    /// Create a new test harness with temp directory and storage.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let storage = Arc::new(
            Storage::open(&temp_dir.path().join("db")).expect("Failed to open test storage"),
        );
        let input_root = temp_dir.path().join("input");
        std::fs::create_dir_all(&input_root).expect("Failed to create input dir");

        Self {
            _temp_dir: temp_dir,
            storage,
            input_root,
            settings: Settings::default(),
        }
    }

    /// Input directory `name`, created on first use.
    pub fn input_dir(&self, name: &str) -> PathBuf {
        let dir = self.input_root.join(name);
        std::fs::create_dir_all(&dir).expect("Failed to create input subdir");
        dir
    }

    /// Open a session over the harness storage.
    pub fn open_session(&self, cancel: CancellationToken) -> SessionContext {
        SessionContext::open(self.storage.clone(), self.settings.clone(), cancel)
            .expect("Failed to open session")
    }

    /// Run one window to completion in a fresh session.
    pub fn run_window(&self, input: &Path, scope: Scope) -> (WindowReport, Vec<Diagnostic>) {
        let mut ctx = self.open_session(CancellationToken::new());
        let outcome = PipelineRunner::new(&mut ctx, &NoOpProgressCallback)
            .run_window(input, scope, false)
            .expect("Window run failed");
        match outcome {
            SessionOutcome::Completed(report) => (report, ctx.diagnostics.drain()),
            other => panic!("Expected a completed window, got {:?}", other),
        }
    }

    /// Consolidated facet structures as stored.
    pub fn consolidator(&self) -> Consolidator {
        Consolidator::load(&self.storage, COMMUNITY).expect("Failed to load consolidator")
    }

    /// Stored document table.
    pub fn docs(&self) -> DocTable {
        self.storage
            .get_global(COMMUNITY, GlobalArtifact::AllDocs)
            .expect("Failed to read documents")
            .unwrap_or_default()
    }

    /// Stored label table.
    pub fn labels(&self) -> LabelTable {
        self.storage
            .get_global(COMMUNITY, GlobalArtifact::AllLabels)
            .expect("Failed to read labels")
            .unwrap_or_default()
    }

    /// Stored unused backlog.
    pub fn backlog(&self) -> UnusedBacklog {
        self.storage
            .get_global(COMMUNITY, GlobalArtifact::Unused)
            .expect("Failed to read backlog")
            .unwrap_or_default()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A day of 2023.
pub fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, month, day).expect("Invalid test date")
}

/// Window between two days of 2023.
pub fn window(begin: (u32, u32), end: (u32, u32)) -> Scope {
    Scope::range(day(begin.0, begin.1), day(end.0, end.1))
}

/// Write `<name>.tok.json` holding `words` at consecutive positions.
pub fn write_token_file(dir: &Path, name: &str, source: &str, date: NaiveDate, words: &[&str]) {
    let doc = TokenizedDocument {
        filename: name.to_string(),
        source: source.to_string(),
        date,
        tokens: words
            .iter()
            .enumerate()
            .map(|(i, w)| TokenRecord::word(*w, i as u32))
            .collect(),
    };
    let bytes = serde_json::to_vec(&doc).expect("Failed to serialize document");
    std::fs::write(dir.join(format!("{}.tok.json", name)), bytes)
        .expect("Failed to write token file");
}

/// A story told by two sources on consecutive days, so every word is seen
/// in two collections.
pub fn write_story(dir: &Path, prefix: &str, first: NaiveDate, words: &[&str]) {
    write_token_file(dir, &format!("{}1", prefix), "wire", first, words);
    write_token_file(
        dir,
        &format!("{}2", prefix),
        "post",
        first.succ_opt().expect("Date overflow"),
        words,
    );
}
