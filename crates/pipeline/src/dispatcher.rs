//! Fan-out of a job to its generation providers.

use std::collections::HashMap;
use std::sync::Arc;

use adgen_core::component::ComponentKind;
use adgen_core::job::Job;
use adgen_core::types::JobId;
use adgen_events::{event_types, EventBus, PlatformEvent};
use adgen_providers::{
    GenerationProvider, GenerationRequest, HttpGenerationProvider, ProviderConfig, ProviderError,
    ProviderTicket,
};

/// Result of dispatching one component.
#[derive(Debug)]
pub struct ComponentDispatch {
    pub component: ComponentKind,
    pub result: Result<ProviderTicket, ProviderError>,
}

/// Per-component dispatch results for one job.
#[derive(Debug)]
pub struct DispatchReport {
    pub job_id: JobId,
    pub components: Vec<ComponentDispatch>,
}

impl DispatchReport {
    pub fn accepted(&self) -> impl Iterator<Item = ComponentKind> + '_ {
        self.components
            .iter()
            .filter(|d| d.result.is_ok())
            .map(|d| d.component)
    }

    pub fn failed(&self) -> impl Iterator<Item = (ComponentKind, &ProviderError)> + '_ {
        self.components
            .iter()
            .filter_map(|d| d.result.as_ref().err().map(|e| (d.component, e)))
    }

    /// True when no component reached a provider. The job then stays
    /// `running` until it is expired.
    pub fn all_failed(&self) -> bool {
        !self.components.is_empty() && self.components.iter().all(|d| d.result.is_err())
    }
}

/// Starts one provider run per required component of a job.
pub struct Dispatcher {
    providers: HashMap<ComponentKind, Arc<dyn GenerationProvider>>,
    config: ProviderConfig,
    event_bus: Arc<EventBus>,
}

impl Dispatcher {
    /// Dispatcher backed by the HTTP provider for every component.
    pub fn new(config: ProviderConfig, event_bus: Arc<EventBus>) -> Result<Self, ProviderError> {
        let provider: Arc<dyn GenerationProvider> = Arc::new(HttpGenerationProvider::new(&config)?);
        Ok(Self::with_provider(config, provider, event_bus))
    }

    /// Dispatcher using one provider for every component.
    pub fn with_provider(
        config: ProviderConfig,
        provider: Arc<dyn GenerationProvider>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let providers = [ComponentKind::Music, ComponentKind::VoiceOver]
            .into_iter()
            .map(|c| (c, Arc::clone(&provider)))
            .collect();
        Self::with_providers(config, providers, event_bus)
    }

    pub fn with_providers(
        config: ProviderConfig,
        providers: HashMap<ComponentKind, Arc<dyn GenerationProvider>>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            providers,
            config,
            event_bus,
        }
    }

    /// Start every required component concurrently.
    ///
    /// A failed dispatch is logged and reported for its component only;
    /// sibling dispatches always run.
    pub async fn dispatch(&self, job: &Job) -> DispatchReport {
        let dispatches = job
            .required_components()
            .iter()
            .map(|&component| self.dispatch_component(job, component));
        let components = futures::future::join_all(dispatches).await;

        let report = DispatchReport {
            job_id: job.id.clone(),
            components,
        };
        if report.all_failed() {
            tracing::error!(job_id = %job.id, "No component could be dispatched; job left running");
        }
        report
    }

    async fn dispatch_component(&self, job: &Job, component: ComponentKind) -> ComponentDispatch {
        let result = self.start(job, component).await;

        let event = PlatformEvent::new(match &result {
            Ok(_) => event_types::COMPONENT_DISPATCHED,
            Err(_) => event_types::COMPONENT_DISPATCH_FAILED,
        })
        .for_job(&job.id, job.owner.clone())
        .with_component(component);

        match &result {
            Ok(ticket) => {
                tracing::info!(job_id = %job.id, %component, run_id = %ticket.run_id, "Component dispatched");
                self.event_bus
                    .publish(event.with_payload(serde_json::json!({ "run_id": ticket.run_id })));
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, %component, error = %e, "Component dispatch failed");
                self.event_bus
                    .publish(event.with_payload(serde_json::json!({ "error": e.to_string() })));
            }
        }

        ComponentDispatch { component, result }
    }

    async fn start(&self, job: &Job, component: ComponentKind) -> Result<ProviderTicket, ProviderError> {
        let provider = self
            .providers
            .get(&component)
            .ok_or(ProviderError::Unsupported(component))?;
        let input = job.input.get(&component).cloned().ok_or_else(|| {
            ProviderError::Rejected(format!("job has no input for component '{component}'"))
        })?;

        let request = GenerationRequest {
            job_id: job.id.clone(),
            component,
            input,
            callback_url: self.config.callback_url(&job.id, component),
        };
        tracing::debug!(job_id = %job.id, %component, provider = provider.name(), "Starting generation");
        provider.start(request).await
    }
}
