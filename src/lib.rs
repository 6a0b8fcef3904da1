pub mod app;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod quote;
pub mod records;
pub mod utils;

pub use error::{AppError, FetchError, Result};
