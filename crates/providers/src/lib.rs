//! Generation provider clients.
//!
//! A [`GenerationProvider`] starts one asynchronous generation run for a
//! single job component and returns as soon as the provider accepted it.
//! The eventual result never comes back through the provider: it arrives
//! as a callback, either over HTTP at the address carried in the request
//! or, for the [`ScriptedProvider`], straight into a [`CallbackSink`].

pub mod callback;
pub mod config;
pub mod http;
pub mod provider;
pub mod scripted;

pub use callback::CallbackPayload;
pub use config::ProviderConfig;
pub use http::HttpGenerationProvider;
pub use provider::{CallbackSink, GenerationProvider, GenerationRequest, ProviderError, ProviderTicket};
pub use scripted::{Delivery, Script, ScriptedProvider};
