#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod chat;
pub mod chat_stream;
pub mod client;
pub mod config;
pub mod cors;
pub mod error;
pub mod forward;
pub mod handlers;
pub mod models;
pub mod ndjson;
pub mod ollama_models;
pub mod resolver;
pub mod server;
pub mod sse;
pub mod state;
pub mod translate;

#[cfg(test)]
mod testing;

pub use client::BackendClient;
pub use config::ProxyConfig;
pub use error::ProxyError;
pub use resolver::{ModelResolver, Resolution};
pub use server::{router, serve};
pub use state::ProxyState;

#[cfg(test)]
use tokio_test as _;
