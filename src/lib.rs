pub mod config;
pub mod error;
pub mod jobs;
pub mod message;
pub mod reading;
pub mod redpanda;
pub mod scheduler;
pub mod station;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{AppError, FetchError, PublishError, Result};
