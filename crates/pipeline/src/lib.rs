//! Job lifecycle coordination.
//!
//! - [`JobIntake`]: validates a request, persists a `running` job and
//!   spawns its dispatch.
//! - [`Dispatcher`]: fans a job out to one provider call per required
//!   component.
//! - [`Reconciler`]: folds provider callbacks into the job record and
//!   drives the terminal transition.
//! - [`OutputComposer`]: turns a satisfied job into its final artifact.

pub mod composer;
pub mod dispatcher;
pub mod intake;
pub mod reconciler;

pub use composer::{ComposeError, ManifestComposer, OutputComposer};
pub use dispatcher::{ComponentDispatch, DispatchReport, Dispatcher};
pub use intake::{CreateJobRequest, JobIntake, Submitted};
pub use reconciler::{ReconcileOutcome, Reconciler};

#[cfg(test)]
pub(crate) mod testing;
