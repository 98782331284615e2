pub mod settings;

pub use settings::{AppConfig, MalformedPolicy, MergeSettings, PipelineSettings};
