pub mod analytics;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod recorder;
pub mod service;
pub mod storage;

pub use error::{LinkError, LinkResult};
