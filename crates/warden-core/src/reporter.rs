//! Callback sink for facade activity.
//!
//! Components already emit progress through `tracing`; this trait adds
//! an explicit observer seam on top so an embedding application (a CLI
//! progress bar, a GUI status line) can react to individual operations
//! without scraping log output.

use crate::mutation::OperationOutcome;
use crate::principal::PrincipalHandle;

/// Observes facade activity. All methods have a default no-op body, so
/// implementors only override what they care about.
pub trait Reporter: Send + Sync {
    /// Called once an operation has completed, successfully or not.
    fn on_outcome(&self, _principal: PrincipalHandle, _outcome: &OperationOutcome) {}

    /// Called when a policy check denies an operation before it runs.
    fn on_denied(&self, _principal: PrincipalHandle, _reason: &str) {}
}

/// The default reporter: observes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}
