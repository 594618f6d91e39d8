#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod broadcaster;
pub mod events;
pub mod ports;
pub mod usage;

pub use broadcaster::{DEFAULT_LOG_CAPACITY, LogBroadcaster, SubscriberId, Subscription};
pub use events::{LogEvent, LogKind};
pub use ports::{BackendError, BackendMethod, BackendPort, BackendRequest, LineStream};
pub use usage::{TokenUsage, estimate_tokens};

#[cfg(test)]
use tokio_test as _;
