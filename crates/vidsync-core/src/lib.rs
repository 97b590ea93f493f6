pub mod claim;
pub mod config;
pub mod error;
pub mod fixity;
pub mod ledger;
pub mod metadata;
pub mod naming;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod registry;
pub mod retry;

pub use claim::ClaimManager;
pub use config::AppConfig;
pub use error::Error;
pub use ledger::Ledger;
pub use metadata::MetadataRecord;
pub use pipeline::{CycleOutcome, Extractor, Pipeline, RunSummary};
pub use progress::{PipelineReporter, SilentReporter};
pub use registry::{AssetId, RegistryClient};
