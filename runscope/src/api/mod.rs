//! Runscope API client

pub mod bucket;
pub mod client;
pub mod common;
pub mod environment;
pub mod error;
pub mod integration;
pub mod step;
pub mod test;
pub mod test_helpers;

pub use client::{Client, RetryConfig, DEFAULT_API_URL};
pub use error::ApiError;
