//! Deterministic in-process provider.
//!
//! [`ScriptedProvider`] never touches the network. Each component follows
//! a [`Script`]; accepted runs queue a callback which is either handed to
//! the [`CallbackSink`] right away on a spawned task
//! ([`Delivery::Immediate`]) or held until the caller releases it
//! ([`Delivery::Manual`]), which lets tests pick the arrival order.

use std::collections::HashMap;
use std::sync::Arc;

use adgen_core::component::{ComponentCallback, ComponentKind, ComponentOutcome};
use adgen_core::error::CoreError;
use adgen_core::types::JobId;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::provider::{
    CallbackSink, GenerationProvider, GenerationRequest, ProviderError, ProviderTicket,
};

/// How the provider behaves for one component.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Script {
    /// Accept and report a generated `simulated://` URL.
    #[default]
    Succeed,
    /// Accept and report the given URL.
    SucceedWith(String),
    /// Accept, then report a generation failure.
    Fail(String),
    /// Refuse the request synchronously.
    Reject(String),
    /// Accept and never call back.
    Silent,
    /// Accept and report the same success twice.
    DeliverTwice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Immediate,
    Manual,
}

pub struct ScriptedProvider {
    sink: Arc<dyn CallbackSink>,
    delivery: Delivery,
    scripts: HashMap<ComponentKind, Script>,
    requests: Mutex<Vec<GenerationRequest>>,
    pending: Mutex<Vec<ComponentCallback>>,
}

impl ScriptedProvider {
    pub fn new(sink: Arc<dyn CallbackSink>, delivery: Delivery) -> Self {
        Self {
            sink,
            delivery,
            scripts: HashMap::new(),
            requests: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Set the script for a component. Unscripted components succeed.
    pub fn with_script(mut self, component: ComponentKind, script: Script) -> Self {
        self.scripts.insert(component, script);
        self
    }

    /// URL reported by [`Script::Succeed`].
    pub fn simulated_url(job_id: &JobId, component: ComponentKind) -> String {
        format!("simulated://{component}/{job_id}")
    }

    /// Requests received so far, in arrival order.
    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of callbacks held back in manual mode.
    pub async fn pending(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Release held callbacks for one job component, in queue order.
    pub async fn release(
        &self,
        job_id: &JobId,
        component: ComponentKind,
    ) -> Vec<Result<(), CoreError>> {
        let released: Vec<ComponentCallback> = {
            let mut pending = self.pending.lock().await;
            let (matching, rest) = pending
                .drain(..)
                .partition(|cb| &cb.job_id == job_id && cb.component == component);
            *pending = rest;
            matching
        };
        self.deliver_all(released).await
    }

    /// Release every held callback, in queue order.
    pub async fn release_all(&self) -> Vec<Result<(), CoreError>> {
        let released = std::mem::take(&mut *self.pending.lock().await);
        self.deliver_all(released).await
    }

    async fn deliver_all(&self, callbacks: Vec<ComponentCallback>) -> Vec<Result<(), CoreError>> {
        let mut results = Vec::with_capacity(callbacks.len());
        for callback in callbacks {
            results.push(self.sink.deliver(callback).await);
        }
        results
    }

    async fn enqueue(&self, callback: ComponentCallback) {
        match self.delivery {
            Delivery::Manual => self.pending.lock().await.push(callback),
            Delivery::Immediate => {
                let sink = Arc::clone(&self.sink);
                tokio::spawn(async move {
                    let job_id = callback.job_id.clone();
                    let component = callback.component;
                    if let Err(e) = sink.deliver(callback).await {
                        tracing::warn!(%job_id, %component, error = %e, "Simulated callback was not reconciled");
                    }
                });
            }
        }
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn start(&self, request: GenerationRequest) -> Result<ProviderTicket, ProviderError> {
        self.requests.lock().await.push(request.clone());

        let script = self
            .scripts
            .get(&request.component)
            .cloned()
            .unwrap_or_default();
        let job_id = request.job_id;
        let component = request.component;
        let callback = |outcome| ComponentCallback {
            job_id: job_id.clone(),
            component,
            outcome,
        };

        match script {
            Script::Reject(reason) => return Err(ProviderError::Rejected(reason)),
            Script::Silent => {}
            Script::Succeed => {
                let url = Self::simulated_url(&job_id, component);
                self.enqueue(callback(ComponentOutcome::Succeeded { url })).await;
            }
            Script::SucceedWith(url) => {
                self.enqueue(callback(ComponentOutcome::Succeeded { url })).await;
            }
            Script::Fail(error) => {
                self.enqueue(callback(ComponentOutcome::Failed { error })).await;
            }
            Script::DeliverTwice => {
                let url = Self::simulated_url(&job_id, component);
                for _ in 0..2 {
                    let outcome = ComponentOutcome::Succeeded { url: url.clone() };
                    self.enqueue(callback(outcome)).await;
                }
            }
        }

        Ok(ProviderTicket {
            run_id: format!("scripted-{component}-{job_id}"),
        })
    }
}
