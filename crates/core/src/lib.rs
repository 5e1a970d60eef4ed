pub mod config;
pub mod error;

pub use config::{ApiFlavor, Config, ContentExtraction, PollConfig};
pub use error::*;
