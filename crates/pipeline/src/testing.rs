//! Shared fixtures for pipeline unit tests.

use std::collections::BTreeMap;

use adgen_core::component::{ComponentCallback, ComponentKind};
use adgen_core::error::CoreError;
use adgen_core::input::{ComponentInput, MusicPrompt, Prompt, VoicePrompt};
use adgen_core::job::{Job, JobType};
use adgen_events::PlatformEvent;
use adgen_providers::{CallbackSink, ProviderConfig};
use async_trait::async_trait;
use tokio::sync::broadcast;

pub fn podcast_ad_input() -> BTreeMap<ComponentKind, ComponentInput> {
    BTreeMap::from([
        (
            ComponentKind::Music,
            ComponentInput {
                prompt: Prompt::Music(MusicPrompt {
                    genres: "lofi".into(),
                    moods: "calm".into(),
                    themes: String::new(),
                }),
                duration_secs: 30,
                volume: 0.4,
                offset_ms: 0,
            },
        ),
        (
            ComponentKind::VoiceOver,
            ComponentInput {
                prompt: Prompt::Voice(VoicePrompt {
                    voice: "alloy".into(),
                    text: "This episode is brought to you by...".into(),
                }),
                duration_secs: 25,
                volume: 1.0,
                offset_ms: 1500,
            },
        ),
    ])
}

pub fn new_job() -> Job {
    Job::new("user-1", JobType::PodcastAd, podcast_ad_input())
}

pub fn provider_config() -> ProviderConfig {
    ProviderConfig {
        provider_base_url: "http://provider.invalid".into(),
        api_key: "test-key".into(),
        callback_base_address: "http://localhost:3000".into(),
    }
}

/// Every event currently buffered for `rx`.
pub fn drain_events(rx: &mut broadcast::Receiver<PlatformEvent>) -> Vec<PlatformEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Sink that drops every callback.
pub struct NullSink;

#[async_trait]
impl CallbackSink for NullSink {
    async fn deliver(&self, _callback: ComponentCallback) -> Result<(), CoreError> {
        Ok(())
    }
}
