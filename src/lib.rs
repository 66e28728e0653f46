pub mod advisory;
pub mod aggregate;
pub mod config;
pub mod error;
pub mod manifest;
pub mod model;
pub mod pipeline;
pub mod report;

pub use advisory::{AdvisoryClient, AdvisorySource, ClientOptions, OsvSource, RetryPolicy};
pub use config::Config;
pub use error::{FeedError, ParseError, ScanError};
pub use model::{
    Dependency, Ecosystem, FailureKind, QueryOutcome, ScanResult, Severity, Verdict,
    VulnerabilityRecord,
};
pub use pipeline::ScanPipeline;
pub use report::ReportFormat;
