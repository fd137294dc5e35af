pub mod pipeline;
pub mod config;
pub mod parser;
pub mod sources;
pub mod sinks;
pub mod observability;

pub use pipeline::{FileLoader, FileOutcome, LoadError, LoadSummary};
