//! # tdt-pipeline
//!
//! Batch sessions over date windows.
//!
//! A session opens the community globals into a [`SessionContext`], then a
//! [`PipelineRunner`] walks each window's token files through the graph and
//! facet stages. Progress is checkpointed per window so a finished window
//! is not redone and an interrupted one can be rerun.
//!
//! ```ignore
//! let ctx = SessionContext::open(storage, settings, cancel)?;
//! let mut runner = PipelineRunner::new(&mut ctx, &NoOpProgressCallback);
//! runner.run_window(Path::new("tokens/"), scope, false)?;
//! ```

pub mod checkpoint;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod progress;
pub mod session;
pub mod traversal;

pub use checkpoint::{SessionCheckpoint, SessionStage};
pub use context::SessionContext;
pub use diagnostics::{Diagnostic, Diagnostics, Severity, MISSING_COMPONENTS};
pub use error::PipelineError;
pub use progress::{
    LoggingProgressCallback, NoOpProgressCallback, ProgressCallback, SessionProgress,
};
pub use session::{PipelineRunner, SessionOutcome, WindowReport};
pub use traversal::{collect_token_files, load_token_file, InputFiles};
