//! Command implementations for `tdt`.
//!
//! Handles:
//! - run: process one window on a blocking worker
//! - consolidate: merge window facets inside a task scope
//! - retrieve: resolve a query against the consolidated facets
//! - admin: storage statistics and compaction

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use tdt_facets::{ConsolidationReport, Consolidator};
use tdt_pipeline::{
    Diagnostic, LoggingProgressCallback, NoOpProgressCallback, PipelineRunner, SessionContext,
    SessionOutcome,
};
use tdt_retrieval::{seed_channel, AcceptAll, QuerySeed, RetrievalOutcome, TopicRetriever};
use tdt_storage::Storage;
use tdt_types::{DocId, DocTable, GlobalArtifact, LabelTable, Scope, Settings, WindowArtifact};

use crate::cli::AdminCommands;

/// Load configuration and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    db_path_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(db_path) = db_path_override {
        settings.db_path = db_path.to_string();
    }
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    Ok(settings)
}

/// Install the tracing subscriber.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Open the store named by the settings, creating parent directories.
pub fn open_storage(settings: &Settings) -> Result<Arc<Storage>> {
    let db_path = settings.expanded_db_path();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    info!("Opening storage at {:?}", db_path);
    let storage = Storage::open(&db_path).context("Failed to open storage")?;
    Ok(Arc::new(storage))
}

/// Token cancelled on Ctrl+C.
pub fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping before the next file...");
            trigger.cancel();
        }
    });
    token
}

/// Process one window on a blocking worker.
pub async fn run_window(
    settings: Settings,
    input: PathBuf,
    scope: Scope,
    force: bool,
    cancel: CancellationToken,
) -> Result<(SessionOutcome, Vec<Diagnostic>)> {
    let storage = open_storage(&settings)?;
    let every = settings.pipeline.checkpoint_every;
    let worker = tokio::task::spawn_blocking(move || {
        let mut ctx = SessionContext::open(storage, settings, cancel)?;
        let progress = LoggingProgressCallback::new(every);
        let outcome = PipelineRunner::new(&mut ctx, &progress).run_window(&input, scope, force)?;
        Ok::<_, tdt_pipeline::PipelineError>((outcome, ctx.diagnostics.drain()))
    });
    let result = worker.await.context("Session worker failed")??;
    Ok(result)
}

/// Merge the facets of every window inside `scope`.
pub async fn consolidate(
    settings: Settings,
    scope: Scope,
    cancel: CancellationToken,
) -> Result<(ConsolidationReport, Vec<Diagnostic>)> {
    let storage = open_storage(&settings)?;
    let worker = tokio::task::spawn_blocking(move || {
        let mut ctx = SessionContext::open(storage, settings, cancel)?;
        let report = PipelineRunner::new(&mut ctx, &NoOpProgressCallback).consolidate(scope)?;
        Ok::<_, tdt_pipeline::PipelineError>((report, ctx.diagnostics.drain()))
    });
    let result = worker.await.context("Consolidation worker failed")??;
    Ok(result)
}

/// Resolve `query` against the facets of `scope`.
///
/// Returns the outcome and the document table used to name its documents.
pub async fn retrieve(
    settings: Settings,
    scope: Scope,
    query: Vec<String>,
    cancel: CancellationToken,
) -> Result<(RetrievalOutcome, DocTable)> {
    let storage = open_storage(&settings)?;
    let community = settings.community.as_str();
    let labels: LabelTable = storage
        .get_global(community, GlobalArtifact::AllLabels)?
        .unwrap_or_default();
    let docs: DocTable = storage
        .get_global(community, GlobalArtifact::AllDocs)?
        .unwrap_or_default();
    let mut consolidator = Consolidator::load(&storage, community)?;

    let (seeds, waiting) = seed_channel();
    tokio::spawn(async move {
        let seed = QuerySeed::resolve(&labels, &query);
        if seeds.send(seed).is_err() {
            info!("Retrieval ended before the query was sent");
        }
    });

    let mut retriever = TopicRetriever::new(
        &storage,
        community,
        &mut consolidator,
        settings.retrieval.clone(),
        scope,
    )?;
    let outcome = retriever
        .retrieve_when_seeded(waiting, &cancel, &AcceptAll)
        .await?;
    Ok((outcome, docs))
}

/// Run an admin command.
pub fn handle_admin(settings: &Settings, command: AdminCommands) -> Result<()> {
    let storage = open_storage(settings)?;
    match command {
        AdminCommands::Stats => {
            let community = settings.community.as_str();
            let stats = storage.get_stats()?;
            let labels: LabelTable = storage
                .get_global(community, GlobalArtifact::AllLabels)?
                .unwrap_or_default();
            let docs: DocTable = storage
                .get_global(community, GlobalArtifact::AllDocs)?
                .unwrap_or_default();
            let consolidator = Consolidator::load(&storage, community)?;
            let windows = storage.window_scopes(community, WindowArtifact::Topics)?;

            println!("Community:         {}", community);
            println!("Windows:           {}", windows.len());
            println!("Documents:         {}", docs.len());
            println!("Labels:            {}", labels.len());
            println!("Global facets:     {}", consolidator.registry().len());
            println!(
                "Dictionary:        {} vertices, {} entries",
                consolidator.dictionary().vertex_count(),
                consolidator.dictionary().entry_count()
            );
            println!("Window artifacts:  {}", stats.window_artifact_count);
            println!("Globals:           {}", stats.global_count);
            println!("Checkpoints:       {}", stats.checkpoint_count);
            println!("Disk usage:        {} bytes", stats.disk_usage_bytes);
        }
        AdminCommands::Compact { cf } => match cf {
            Some(name) => {
                storage.compact_cf(&name)?;
                println!("Compacted column family {}", name);
            }
            None => {
                storage.compact()?;
                println!("Compacted all column families");
            }
        },
    }
    Ok(())
}

/// Human-readable summary of a window run.
pub fn describe_session(scope: &Scope, outcome: &SessionOutcome) -> String {
    match outcome {
        SessionOutcome::Completed(report) => {
            let mut text = format!(
                "Window {}: {} files, {} documents added, {} informative vertices, {} facets, {} unused",
                scope,
                report.progress.files_processed,
                report.docs_added,
                report.informative,
                report.facets,
                report.unused
            );
            if let Some(merge) = &report.merge {
                text.push_str(&format!(
                    "\nConsolidated: {} new keys, {} reused, {} dictionary entries added",
                    merge.new_keys.len(),
                    merge.reused_keys.len(),
                    merge.entries_added
                ));
            }
            text
        }
        SessionOutcome::Skipped => {
            format!("Window {} already processed (use --force to rerun)", scope)
        }
        SessionOutcome::Interrupted {
            files_processed, ..
        } => format!(
            "Window {} interrupted after {} files; rerun to finish",
            scope, files_processed
        ),
    }
}

fn doc_name(docs: &DocTable, id: DocId) -> String {
    docs.get(id)
        .map(|d| d.filename.clone())
        .unwrap_or_else(|| format!("#{}", id))
}

/// Human-readable summary of a retrieval.
pub fn describe_retrieval(outcome: &RetrievalOutcome, docs: &DocTable) -> String {
    match outcome {
        RetrievalOutcome::Completed(result) => {
            let mut lines = Vec::new();
            lines.extend(result.warnings.iter().cloned());
            for (tokens, facets) in result.ranking.levels() {
                lines.push(format!("Facets shared by {} tokens: {:?}", tokens, facets));
            }
            lines.push(format!(
                "Core: {} documents in {} facets (threshold {})",
                result.reduction.docs.len(),
                result.reduction.facets.len(),
                result.reduction.threshold
            ));
            for (key, arcs) in &result.facet_arcs {
                lines.push(format!("Facet {}: {} defining arcs", key, arcs.len()));
            }
            for (i, cluster) in result.clusters.iter().enumerate() {
                lines.push(format!(
                    "Cluster {} around {}:",
                    i + 1,
                    doc_name(docs, cluster.prototype)
                ));
                for member in &cluster.members {
                    lines.push(format!(
                        "  {:.3}  {}",
                        result.matrix.similarity(cluster.prototype, *member),
                        doc_name(docs, *member)
                    ));
                }
            }
            lines.join("\n")
        }
        RetrievalOutcome::NothingToRetrieve { warnings, .. } => {
            let mut lines = warnings.clone();
            lines.push("Nothing to retrieve: no facet is shared by two query terms".to_string());
            lines.join("\n")
        }
        RetrievalOutcome::Aborted => "Retrieval aborted".to_string(),
        RetrievalOutcome::Cancelled => "Retrieval cancelled".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::Path;
    use tdt_types::{TokenRecord, TokenizedDocument};
    use tempfile::TempDir;

    fn write_doc(dir: &Path, name: &str, source: &str, day: u32, words: &[&str]) {
        let doc = TokenizedDocument {
            filename: name.to_string(),
            source: source.to_string(),
            date: NaiveDate::from_ymd_opt(2023, 1, day).unwrap(),
            tokens: words
                .iter()
                .enumerate()
                .map(|(i, w)| TokenRecord::word(*w, i as u32))
                .collect(),
        };
        fs::write(
            dir.join(format!("{}.tok.json", name)),
            serde_json::to_vec(&doc).unwrap(),
        )
        .unwrap();
    }

    fn settings(db: &TempDir) -> Settings {
        Settings {
            db_path: db.path().join("db").to_string_lossy().to_string(),
            ..Default::default()
        }
    }

    /// Two facets, both holding "storm" and "flood".
    fn write_corpus(dir: &Path) {
        let warning = ["storm", "coast", "flood", "warning"];
        let surge = ["flood", "alert", "storm", "surge"];
        write_doc(dir, "d1", "wire", 1, &warning);
        write_doc(dir, "d2", "post", 2, &warning);
        write_doc(dir, "d3", "wire", 1, &surge);
        write_doc(dir, "d4", "post", 2, &surge);
    }

    #[tokio::test]
    async fn test_run_then_retrieve() {
        let db = TempDir::new().unwrap();
        let input = TempDir::new().unwrap();
        write_corpus(input.path());
        let scope = Scope::AllDates;

        let (outcome, _) = run_window(
            settings(&db),
            input.path().to_path_buf(),
            scope,
            false,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        let text = describe_session(&scope, &outcome);
        assert!(text.contains("4 documents added"), "{}", text);
        assert!(text.contains("2 facets"), "{}", text);

        let (outcome, docs) = retrieve(
            settings(&db),
            scope,
            vec!["storm".to_string(), "flood".to_string()],
            CancellationToken::new(),
        )
        .await
        .unwrap();
        let text = describe_retrieval(&outcome, &docs);
        assert!(matches!(outcome, RetrievalOutcome::Completed(_)), "{}", text);
        assert!(text.contains("Facets shared by 2 tokens"), "{}", text);
        assert!(text.contains("d1"), "{}", text);
    }

    #[tokio::test]
    async fn test_rerun_is_skipped() {
        let db = TempDir::new().unwrap();
        let input = TempDir::new().unwrap();
        write_corpus(input.path());
        let scope = Scope::AllDates;

        let (first, _) = run_window(
            settings(&db),
            input.path().to_path_buf(),
            scope,
            false,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(matches!(first, SessionOutcome::Completed(_)));

        let (outcome, diagnostics) = run_window(
            settings(&db),
            input.path().to_path_buf(),
            scope,
            false,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, SessionOutcome::Skipped);
        assert!(describe_session(&scope, &outcome).contains("--force"));
        assert_eq!(diagnostics.len(), 1);
    }

    #[tokio::test]
    async fn test_consolidate_empty_store() {
        let db = TempDir::new().unwrap();
        let (report, diagnostics) = consolidate(settings(&db), Scope::AllDates, CancellationToken::new())
            .await
            .unwrap();
        assert!(report.merged.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_admin_on_fresh_store() {
        let db = TempDir::new().unwrap();
        let settings = settings(&db);
        handle_admin(&settings, AdminCommands::Stats).unwrap();
        handle_admin(&settings, AdminCommands::Compact { cf: None }).unwrap();
        handle_admin(
            &settings,
            AdminCommands::Compact {
                cf: Some("windows".to_string()),
            },
        )
        .unwrap();
    }

    #[test]
    fn test_describe_negative_outcomes() {
        let docs = DocTable::new();
        assert_eq!(
            describe_retrieval(&RetrievalOutcome::Aborted, &docs),
            "Retrieval aborted"
        );
        let text = describe_retrieval(
            &RetrievalOutcome::NothingToRetrieve {
                token_facets: Default::default(),
                warnings: vec!["Unknown query terms: zzz".to_string()],
            },
            &docs,
        );
        assert!(text.starts_with("Unknown query terms"));
        assert!(text.contains("Nothing to retrieve"));
    }
}
