pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod facets;
pub mod group;
pub mod model;
pub mod pipeline;
pub mod probe;
pub mod reconcile;
pub mod report;

pub use config::Config;
pub use error::InsightError;
pub use probe::{ProbeRegistry, SourceProbe, SourceSet};
pub use report::Report;
