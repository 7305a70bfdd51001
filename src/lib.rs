pub mod config;
pub mod error;
pub mod fc;
pub mod generator;
pub mod observability;
pub mod protocol;
pub mod stream;
pub mod transport;

pub(crate) mod json_scan;
mod util;

pub use generator::{ContentGenerator, CustomApiGenerator, ResponseStream};
