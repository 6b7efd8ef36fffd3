pub mod assembler;
pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod observer;
pub mod reader;
pub mod resolver;
pub mod storage;

pub use error::{LoaderError, Result};
pub use loader::{LoadReport, Loader};
