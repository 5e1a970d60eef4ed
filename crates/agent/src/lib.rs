//! Client, poller and normalization for the remote agent service.

pub mod adapter;
pub mod client;
pub mod error;
pub mod normalize;
pub mod poller;
pub mod remix;
pub mod scan;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use adapter::{ApiFlavor, ContentExtraction};
pub use client::HttpAgentClient;
pub use error::AgentError;
pub use poller::{PollOptions, ResponsePoller};
pub use transport::AgentTransport;
pub use types::*;
