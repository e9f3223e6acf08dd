//! Batch session runner.
//!
//! One window run reads its token files, then hands the tables from stage to
//! stage: network → information values → informative partition → arc
//! weights, informative arcs and associations → facets → consolidation.
//! Every stage persists its window artifacts before the next starts, so an
//! interrupted run leaves complete files of the stages it finished.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{info, instrument, warn};

use tdt_facets::{ConsolidationReport, Consolidator, FacetMaker, MergeReport, RescannedMap};
use tdt_graph::{
    adjust_all_arc_weights, store_info_map, BaselineList, GraphAnalyzer, InfoValueCalculator,
    InformativeTokens, NetworkBuilder, MIN_WALK_LENGTH,
};
use tdt_types::{Scope, TokenizedDocument, VertexId, WindowArtifact};

use crate::checkpoint::{SessionCheckpoint, SessionStage};
use crate::context::SessionContext;
use crate::error::PipelineError;
use crate::progress::{ProgressCallback, SessionProgress};
use crate::traversal::{collect_token_files, load_token_file};

/// Counts of one completed window run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowReport {
    /// Input file counters
    pub progress: SessionProgress,
    /// Documents added to the network
    pub docs_added: usize,
    /// Filenames already present in the window
    pub duplicates: usize,
    /// Vertices of the window
    pub vertices: usize,
    /// Informative vertices
    pub informative: usize,
    /// Local facets
    pub facets: usize,
    /// Backlog documents joined to a facet
    pub rescanned: usize,
    /// Backlog documents past the day limit
    pub purged: usize,
    /// Window documents in no facet
    pub unused: usize,
    /// Consolidation of the window, when it ran
    pub merge: Option<MergeReport>,
}

/// How a window run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// Every stage ran, or stopped early on a missing prerequisite
    Completed(WindowReport),
    /// The window had already finished and was not forced
    Skipped,
    /// Cancellation stopped the run
    Interrupted {
        /// Last completed stage
        stage: Option<SessionStage>,
        /// Input files handled before the stop
        files_processed: u64,
    },
}

/// Runs windows over a session context.
pub struct PipelineRunner<'a> {
    ctx: &'a mut SessionContext,
    progress: &'a dyn ProgressCallback,
}

impl<'a> PipelineRunner<'a> {
    /// Runner over a session.
    pub fn new(ctx: &'a mut SessionContext, progress: &'a dyn ProgressCallback) -> Self {
        Self { ctx, progress }
    }

    fn checkpoint(&self, checkpoint: &mut SessionCheckpoint, stage: SessionStage) -> Result<(), PipelineError> {
        checkpoint.complete(stage);
        checkpoint.save(&self.ctx.storage, self.ctx.community())
    }

    /// Process the token files under `input` whose dates fall in `scope`.
    #[instrument(skip_all, fields(scope = %scope, force = force))]
    pub fn run_window(
        &mut self,
        input: &Path,
        scope: Scope,
        force: bool,
    ) -> Result<SessionOutcome, PipelineError> {
        const TASK: &str = "session";
        let community = self.ctx.community().to_string();

        let mut checkpoint = SessionCheckpoint::new(scope);
        if let Some(previous) = SessionCheckpoint::load(&self.ctx.storage, &community, &scope)? {
            if previous.is_done() && !force {
                self.ctx
                    .diagnostics
                    .info(TASK, scope, "window already processed, skipping");
                return Ok(SessionOutcome::Skipped);
            }
            checkpoint.created_at = previous.created_at;
        }

        // Traversal
        let Some((documents, progress)) = self.read_documents(input, scope, &mut checkpoint)? else {
            return Ok(SessionOutcome::Interrupted {
                stage: checkpoint.stage,
                files_processed: checkpoint.files_processed,
            });
        };
        self.checkpoint(&mut checkpoint, SessionStage::Traversal)?;
        let mut report = WindowReport {
            progress,
            ..Default::default()
        };
        if documents.is_empty() {
            self.ctx
                .diagnostics
                .missing_components("network", scope, "no documents in window");
            return Ok(SessionOutcome::Completed(report));
        }

        // Network
        let labels = std::mem::take(&mut self.ctx.labels);
        let docs = std::mem::take(&mut self.ctx.docs);
        let mut builder = NetworkBuilder::new(labels, docs);
        let batch = self.ctx.settings.pipeline.checkpoint_every.max(1);
        let mut interrupted = false;
        for chunk in documents.chunks(batch) {
            if self.ctx.is_cancelled() {
                interrupted = true;
                break;
            }
            let added = builder.add_documents(chunk)?;
            report.docs_added += added.added.len();
            report.duplicates += added.duplicates.len();
            for name in &added.duplicates {
                self.ctx
                    .diagnostics
                    .info("network", scope, format!("{} already in window, skipped", name));
            }
        }
        let network = builder.finish();
        self.ctx.labels = network.labels;
        self.ctx.docs = network.docs;
        if interrupted {
            return Ok(SessionOutcome::Interrupted {
                stage: checkpoint.stage,
                files_processed: checkpoint.files_processed,
            });
        }
        let mut arcs = network.arcs;
        let storage = self.ctx.storage.clone();
        storage.put_window(&community, &scope, WindowArtifact::Arcs, &arcs)?;
        storage.put_window(&community, &scope, WindowArtifact::Vertices, &network.vertices)?;
        report.vertices = network.vertices.len();
        self.checkpoint(&mut checkpoint, SessionStage::Network)?;

        // Information values
        let baseline = self.baseline(scope);
        let calculator = InfoValueCalculator::with_baseline(baseline.0.clone(), baseline.1);
        let valued = calculator.calculate(network.vertices, network.collections);
        if !valued.report.unresolved_baseline.is_empty() {
            self.ctx.diagnostics.info(
                "info_values",
                scope,
                format!(
                    "{} baseline words not in the label table",
                    valued.report.unresolved_baseline.len()
                ),
            );
        }
        let vertices = valued.vertices;
        storage.put_window(&community, &scope, WindowArtifact::Vertices, &vertices)?;
        self.ctx.collections.merge_from(valued.collections);
        self.checkpoint(&mut checkpoint, SessionStage::InfoValues)?;

        // Partition
        let threshold = self.ctx.settings.pipeline.info_threshold;
        let partition = InformativeTokens::new(threshold)
            .with_baseline(baseline.0)
            .partition(&vertices);
        let info_map = partition.info_map;
        report.informative = info_map.len();
        store_info_map(&storage, &community, &scope, &info_map)?;
        self.checkpoint(&mut checkpoint, SessionStage::Partition)?;
        if info_map.is_empty() {
            self.ctx.diagnostics.missing_components(
                "facets",
                scope,
                &format!("no vertex above threshold {}", threshold),
            );
            self.ctx.save_globals()?;
            return Ok(SessionOutcome::Completed(report));
        }

        // Arc weights, informative arcs, associations
        adjust_all_arc_weights(&mut arcs, &vertices, &self.ctx.docs);
        storage.put_window(&community, &scope, WindowArtifact::Arcs, &arcs)?;
        let analyzer = GraphAnalyzer::new(&info_map);
        let info_arcs = analyzer.info_arcs(&arcs);
        let associations = analyzer.associations(&info_arcs, MIN_WALK_LENGTH);
        storage.put_window(&community, &scope, WindowArtifact::InfoArc, &info_arcs)?;
        storage.put_window(&community, &scope, WindowArtifact::Assoc, &associations)?;
        self.checkpoint(&mut checkpoint, SessionStage::Associations)?;

        // Facets; documents an earlier run rescanned into this window are
        // candidates again
        let previous: RescannedMap = storage
            .get_window(&community, &scope, WindowArtifact::Rescanned)?
            .unwrap_or_default();
        for doc in previous.values() {
            self.ctx.backlog.insert(doc.to_unused());
        }
        if !previous.is_empty() {
            info!(scope = %scope, restored = previous.len(), "Earlier rescans restored");
        }
        let mut maker = FacetMaker::new(scope, &info_map, &info_arcs, &arcs);
        report.facets = maker.build()?;
        let rescan = maker.rescan(
            &mut self.ctx.backlog,
            self.ctx.settings.pipeline.rescan_limit_days,
        )?;
        report.rescanned = rescan.matched.len();
        report.purged = rescan.purged.len();
        if !rescan.purged.is_empty() {
            self.ctx.diagnostics.info(
                "rescan",
                scope,
                format!("{} unused documents passed the day limit", rescan.purged.len()),
            );
        }
        let output = maker.finalize(&self.ctx.docs, &mut self.ctx.backlog)?;
        report.unused = output.unused.len();
        output.store(&storage, &community)?;
        self.checkpoint(&mut checkpoint, SessionStage::Facets)?;

        // Consolidation
        if report.facets > 0 {
            let mut consolidator = Consolidator::load(&storage, &community)?;
            let merge = consolidator.merge_window(&storage, &community, &scope, &mut self.ctx.docs)?;
            consolidator.store(&storage, &community)?;
            report.merge = Some(merge);
        } else {
            self.ctx
                .diagnostics
                .info("facets", scope, "no facet formed in window");
        }
        self.checkpoint(&mut checkpoint, SessionStage::Consolidated)?;

        self.ctx.save_globals()?;
        storage.flush()?;
        self.checkpoint(&mut checkpoint, SessionStage::Done)?;

        info!(
            scope = %scope,
            docs = report.docs_added,
            informative = report.informative,
            facets = report.facets,
            unused = report.unused,
            "Window completed"
        );
        Ok(SessionOutcome::Completed(report))
    }

    /// Read in-scope documents, checking for cancellation before each file.
    ///
    /// Returns `None` when interrupted.
    fn read_documents(
        &mut self,
        input: &Path,
        scope: Scope,
        checkpoint: &mut SessionCheckpoint,
    ) -> Result<Option<(Vec<TokenizedDocument>, SessionProgress)>, PipelineError> {
        const TASK: &str = "traversal";
        let suffix = self.ctx.settings.pipeline.token_file_suffix.clone();
        let files = collect_token_files(input, &suffix)?;
        for path in &files.rejected {
            self.ctx.diagnostics.warn(
                TASK,
                scope,
                format!("{}: not a .{} file, skipped", path.display(), suffix),
            );
        }
        for error in &files.errors {
            self.ctx
                .diagnostics
                .warn(TASK, scope, format!("{}, skipped", error));
        }

        let every = self.ctx.settings.pipeline.checkpoint_every.max(1) as u64;
        let mut progress = SessionProgress::new(files.files.len() as u64);
        checkpoint.files_total = progress.files_total;
        let mut documents = Vec::new();
        for path in &files.files {
            if self.ctx.is_cancelled() {
                checkpoint.files_processed = progress.files_processed;
                checkpoint.save(&self.ctx.storage, self.ctx.community())?;
                warn!(
                    scope = %scope,
                    processed = progress.files_processed,
                    total = progress.files_total,
                    "Session interrupted"
                );
                return Ok(None);
            }
            match load_token_file(path) {
                Ok(doc) if scope.contains(doc.date) => {
                    documents.push(doc);
                    progress.record_loaded();
                }
                Ok(_) => progress.record_out_of_scope(),
                Err(e) => {
                    self.ctx
                        .diagnostics
                        .warn(TASK, scope, format!("{}: {}", path.display(), e));
                    progress.record_failed();
                }
            }
            self.progress.on_progress(&progress);
            if progress.files_processed % every == 0 {
                checkpoint.files_processed = progress.files_processed;
                checkpoint.save(&self.ctx.storage, self.ctx.community())?;
            }
        }
        checkpoint.files_processed = progress.files_processed;
        if progress.files_out_of_scope > 0 {
            self.ctx.diagnostics.info(
                TASK,
                scope,
                format!("{} files dated outside the window", progress.files_out_of_scope),
            );
        }
        Ok(Some((documents, progress)))
    }

    /// Resolve the configured baseline list; problems become diagnostics
    /// and the session goes on without it.
    fn baseline(&mut self, scope: Scope) -> (BTreeSet<VertexId>, Vec<String>) {
        const TASK: &str = "baseline";
        let pipeline = &self.ctx.settings.pipeline;
        let Some(path) = pipeline.baseline_path.clone() else {
            return (BTreeSet::new(), Vec::new());
        };
        match BaselineList::load(Path::new(&path), &pipeline.baseline_language) {
            Ok(list) => {
                let resolved = list.resolve(&self.ctx.labels);
                info!(
                    language = list.language(),
                    words = list.words().len(),
                    resolved = resolved.ids.len(),
                    "Baseline list loaded"
                );
                (resolved.ids, resolved.unresolved)
            }
            Err(e) => {
                self.ctx.diagnostics.warn(
                    TASK,
                    scope,
                    format!("running without baseline {}: {}", path, e),
                );
                (BTreeSet::new(), Vec::new())
            }
        }
    }

    /// Merge every window of `task` into the global dictionary.
    ///
    /// Windows lacking artifacts are reported and skipped.
    #[instrument(skip_all, fields(task = %task))]
    pub fn consolidate(&mut self, task: Scope) -> Result<ConsolidationReport, PipelineError> {
        let community = self.ctx.community().to_string();
        let storage = self.ctx.storage.clone();
        let mut consolidator = Consolidator::load(&storage, &community)?;
        let report = consolidator.consolidate(&storage, &community, &task, &mut self.ctx.docs)?;
        for (window, missing) in &report.skipped {
            self.ctx
                .diagnostics
                .missing_components("consolidate", *window, &missing.join(", "));
        }
        consolidator.store(&storage, &community)?;
        self.ctx.save_globals()?;
        info!(
            task = %task,
            merged = report.merged.len(),
            skipped = report.skipped.len(),
            "Consolidation completed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use tdt_storage::Storage;
    use tdt_types::{Settings, TokenRecord};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    use crate::diagnostics::MISSING_COMPONENTS;
    use crate::progress::NoOpProgressCallback;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, day).unwrap()
    }

    fn january() -> Scope {
        Scope::range(date(1), date(31))
    }

    fn write_doc(dir: &Path, name: &str, source: &str, day: u32, words: &[&str]) {
        let doc = TokenizedDocument {
            filename: name.to_string(),
            source: source.to_string(),
            date: date(day),
            tokens: words
                .iter()
                .enumerate()
                .map(|(i, w)| TokenRecord::word(*w, i as u32))
                .collect(),
        };
        std::fs::write(
            dir.join(format!("{}.tok.json", name)),
            serde_json::to_vec(&doc).unwrap(),
        )
        .unwrap();
    }

    /// Two stories, each told by two sources on different days.
    fn write_corpus(dir: &Path) {
        let storm = ["storm", "coast", "flood", "warning"];
        let market = ["market", "price", "rally"];
        write_doc(dir, "d1", "wire", 1, &storm);
        write_doc(dir, "d2", "post", 2, &storm);
        write_doc(dir, "d3", "wire", 1, &market);
        write_doc(dir, "d4", "post", 2, &market);
    }

    struct Fixture {
        _db: TempDir,
        input: TempDir,
        ctx: SessionContext,
    }

    fn fixture() -> Fixture {
        let db = TempDir::new().unwrap();
        let input = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(db.path()).unwrap());
        let ctx =
            SessionContext::open(storage, Settings::default(), CancellationToken::new()).unwrap();
        Fixture {
            _db: db,
            input,
            ctx,
        }
    }

    fn completed(outcome: SessionOutcome) -> WindowReport {
        match outcome {
            SessionOutcome::Completed(report) => report,
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[test]
    fn test_window_runs_every_stage() {
        let mut f = fixture();
        write_corpus(f.input.path());
        let progress = NoOpProgressCallback;

        let outcome = PipelineRunner::new(&mut f.ctx, &progress)
            .run_window(f.input.path(), january(), false)
            .unwrap();
        let report = completed(outcome);

        assert_eq!(report.progress.files_processed, 4);
        assert_eq!(report.docs_added, 4);
        assert_eq!(report.informative, 7);
        assert_eq!(report.facets, 2);
        assert_eq!(report.unused, 0);
        assert_eq!(report.merge.as_ref().unwrap().new_keys.len(), 2);

        let storage = f.ctx.storage.clone();
        for kind in [
            WindowArtifact::Vertices,
            WindowArtifact::Arcs,
            WindowArtifact::InfoTok,
            WindowArtifact::InfoArc,
            WindowArtifact::Assoc,
            WindowArtifact::Topics,
            WindowArtifact::TopArcs,
            WindowArtifact::Rescanned,
        ] {
            assert!(storage.has_window("default", &january(), kind).unwrap(), "{}", kind);
        }
        let checkpoint = SessionCheckpoint::load(&storage, "default", &january())
            .unwrap()
            .unwrap();
        assert!(checkpoint.is_done());

        let d1 = f.ctx.docs.lookup("d1").unwrap();
        assert_eq!(f.ctx.docs.get(d1).unwrap().facets.len(), 1);
    }

    #[test]
    fn test_finished_window_is_skipped_unless_forced() {
        let mut f = fixture();
        write_corpus(f.input.path());
        let progress = NoOpProgressCallback;
        let mut runner = PipelineRunner::new(&mut f.ctx, &progress);

        completed(runner.run_window(f.input.path(), january(), false).unwrap());
        let again = runner.run_window(f.input.path(), january(), false).unwrap();
        assert_eq!(again, SessionOutcome::Skipped);

        let forced = completed(runner.run_window(f.input.path(), january(), true).unwrap());
        let merge = forced.merge.unwrap();
        assert!(merge.new_keys.is_empty());
        assert_eq!(merge.reused_keys.len(), 2);
        assert_eq!(f.ctx.docs.len(), 4);
    }

    #[test]
    fn test_bad_and_out_of_scope_files_are_reported() {
        let mut f = fixture();
        write_corpus(f.input.path());
        std::fs::write(f.input.path().join("broken.tok.json"), "{").unwrap();
        std::fs::write(f.input.path().join("readme.txt"), "notes").unwrap();
        write_doc(f.input.path(), "late", "wire", 1, &["storm"]);
        let mut late: TokenizedDocument = serde_json::from_slice(
            &std::fs::read(f.input.path().join("late.tok.json")).unwrap(),
        )
        .unwrap();
        late.date = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        std::fs::write(
            f.input.path().join("late.tok.json"),
            serde_json::to_vec(&late).unwrap(),
        )
        .unwrap();

        let progress = NoOpProgressCallback;
        let report = completed(
            PipelineRunner::new(&mut f.ctx, &progress)
                .run_window(f.input.path(), january(), false)
                .unwrap(),
        );

        assert_eq!(report.progress.files_total, 6);
        assert_eq!(report.progress.files_failed, 1);
        assert_eq!(report.progress.files_out_of_scope, 1);
        assert_eq!(report.docs_added, 4);
        assert!(f.ctx.diagnostics.contains("traversal", "broken.tok.json"));
        assert!(f.ctx.diagnostics.contains("traversal", "readme.txt"));
    }

    #[test]
    fn test_empty_window_reports_missing_components() {
        let mut f = fixture();
        let progress = NoOpProgressCallback;
        let report = completed(
            PipelineRunner::new(&mut f.ctx, &progress)
                .run_window(f.input.path(), january(), false)
                .unwrap(),
        );
        assert_eq!(report.docs_added, 0);
        assert!(f.ctx.diagnostics.contains("network", MISSING_COMPONENTS));
    }

    #[test]
    fn test_single_collection_has_no_informative_vertices() {
        let mut f = fixture();
        write_doc(f.input.path(), "a", "wire", 1, &["storm", "coast"]);
        write_doc(f.input.path(), "b", "wire", 1, &["storm", "coast"]);
        let progress = NoOpProgressCallback;

        let report = completed(
            PipelineRunner::new(&mut f.ctx, &progress)
                .run_window(f.input.path(), january(), false)
                .unwrap(),
        );
        assert_eq!(report.informative, 0);
        assert_eq!(report.facets, 0);
        assert!(f.ctx.diagnostics.contains("facets", MISSING_COMPONENTS));
    }

    #[test]
    fn test_cancelled_session_is_interrupted() {
        let mut f = fixture();
        write_corpus(f.input.path());
        f.ctx.cancel_token().cancel();
        let progress = NoOpProgressCallback;

        let outcome = PipelineRunner::new(&mut f.ctx, &progress)
            .run_window(f.input.path(), january(), false)
            .unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Interrupted {
                stage: None,
                files_processed: 0
            }
        );
        assert!(!f
            .ctx
            .storage
            .has_window("default", &january(), WindowArtifact::Arcs)
            .unwrap());
    }

    #[test]
    fn test_consolidate_task_reports_skipped_windows() {
        let mut f = fixture();
        write_corpus(f.input.path());
        let progress = NoOpProgressCallback;
        let mut runner = PipelineRunner::new(&mut f.ctx, &progress);
        completed(runner.run_window(f.input.path(), january(), false).unwrap());

        let report = runner.consolidate(Scope::AllDates).unwrap();
        assert_eq!(report.merged.len(), 1);
        assert!(report.skipped.is_empty());
        assert_eq!(report.merged[&january()].entries_added, 0);
    }
}
