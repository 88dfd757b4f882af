use std::sync::Arc;

use adgen_db::JobStore;
use adgen_events::EventBus;
use adgen_pipeline::{Dispatcher, JobIntake, Reconciler};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub intake: Arc<JobIntake>,
    pub reconciler: Arc<Reconciler>,
    pub config: Arc<ServerConfig>,
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Wire the intake service around `dispatcher`.
    ///
    /// `reconciler` must share `store` and `event_bus`; it is built by the
    /// caller because in simulated mode the dispatcher's provider delivers
    /// into it.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn JobStore>,
        event_bus: Arc<EventBus>,
        reconciler: Arc<Reconciler>,
        dispatcher: Dispatcher,
    ) -> Self {
        let intake = Arc::new(JobIntake::new(
            Arc::clone(&store),
            Arc::new(dispatcher),
            Arc::clone(&event_bus),
        ));
        Self {
            store,
            intake,
            reconciler,
            config: Arc::new(config),
            event_bus,
        }
    }
}
