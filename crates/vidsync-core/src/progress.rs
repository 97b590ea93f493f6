use crate::error::Error;
use crate::metadata::MetadataRecord;
use crate::registry::AssetId;
use std::path::Path;
use std::time::Duration;

/// Trait for reporting pipeline progress.
///
/// The CLI implements it with coloured terminal output. All methods have
/// default no-op implementations.
pub trait PipelineReporter: Send + Sync {
    fn on_claimed(&self, _path: &Path) {}
    fn on_processed(&self, _path: &Path, _asset_id: &AssetId, _record: &MetadataRecord) {}
    fn on_failed(&self, _path: &Path, _error: &Error) {}
    fn on_idle(&self, _wait: Duration) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl PipelineReporter for SilentReporter {}
