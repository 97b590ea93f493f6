use crate::claim::ClaimManager;
use crate::config::{AppConfig, RetryConfig};
use crate::error::Error;
use crate::fixity;
use crate::ledger::{self, Ledger};
use crate::metadata::{FileAttributes, MetadataRecord, Normalizer};
use crate::naming::CollectionName;
use crate::probe::Prober;
use crate::progress::PipelineReporter;
use crate::registry::{AssetId, FinalAsset, RegistryClient, StubDraft};
use crate::retry::retry_with_backoff;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Probe, fixity and naming for one file. Needs no ledger or registry, so
/// local inspection works without a registry endpoint.
pub struct Extractor {
    generate_missing_checksums: bool,
    checksum_extension: String,
    flexible_naming: bool,
    prober: Prober,
    normalizer: Normalizer,
}

impl Extractor {
    pub fn new(config: &AppConfig) -> Result<Self, Error> {
        Ok(Self {
            generate_missing_checksums: config.fixity.generate_missing,
            checksum_extension: config.fixity.checksum_extension.clone(),
            flexible_naming: config.naming.flexible,
            prober: Prober::new(&config.probe),
            normalizer: Normalizer::new(&config.fixity.checksum_extension, config.tz()?),
        })
    }

    /// Probe and normalize one file without touching claims, ledger or registry.
    pub fn extract(&self, path: &Path) -> Result<MetadataRecord, Error> {
        let name = CollectionName::for_master(path, self.flexible_naming)?;
        self.extract_named(path, &name)
    }

    fn extract_named(&self, path: &Path, name: &CollectionName) -> Result<MetadataRecord, Error> {
        if self.generate_missing_checksums
            && !fixity::sidecar_path(path, &self.checksum_extension).exists()
        {
            fixity::write_md5_sidecar(path, &self.checksum_extension)?;
        }
        let probe = self.prober.probe(path)?;
        let attributes = FileAttributes::read(path)?;
        self.normalizer.normalize(path, &probe, &attributes, name)
    }
}

pub struct Pipeline {
    source_root: PathBuf,
    idle_wait: Duration,
    flexible_naming: bool,
    write_json_sidecar: bool,
    release_on_success: bool,
    retry: RetryConfig,
    claims: ClaimManager,
    extractor: Extractor,
    ledger: Ledger,
    registry: RegistryClient,
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// Nothing eligible in the watch folder.
    Idle,
    Processed {
        path: PathBuf,
        asset_id: AssetId,
        record: MetadataRecord,
    },
    /// The claim marker is left in place and the file is settled, so no
    /// worker retries it, even once the marker is stale.
    Failed { path: PathBuf, error: Error },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: usize,
    pub processed: usize,
    pub failed: usize,
    pub idle: usize,
}

impl Pipeline {
    pub fn new(config: &AppConfig) -> Result<Self, Error> {
        Ok(Self {
            source_root: config.source_root.clone(),
            idle_wait: config.idle_wait(),
            flexible_naming: config.naming.flexible,
            write_json_sidecar: config.ledger.write_json_sidecar,
            release_on_success: config.claim.release_on_success,
            retry: config.retry,
            claims: ClaimManager::new(&config.claim),
            extractor: Extractor::new(config)?,
            ledger: Ledger::new(&config.output_folder, config.tz()?),
            registry: RegistryClient::new(&config.registry)?,
        })
    }

    pub fn claims(&self) -> &ClaimManager {
        &self.claims
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The next file a worker would pick up, without claiming it.
    pub fn peek(&self) -> Result<Option<PathBuf>, Error> {
        self.claims.claim_next(&self.source_root, false)
    }

    pub fn extract(&self, path: &Path) -> Result<MetadataRecord, Error> {
        self.extractor.extract(path)
    }

    /// Run a single claim cycle:
    /// 1. Claim the next eligible file
    /// 2. Extract and normalize its metadata
    /// 3. Append the record to today's ledger
    /// 4. Create or reuse the registry stub, then finalize it
    ///
    /// Only claim and walk failures are returned as `Err`; anything that goes
    /// wrong with the claimed file is reported as `CycleOutcome::Failed`.
    pub fn run_once(&self, reporter: &dyn PipelineReporter) -> Result<CycleOutcome, Error> {
        let Some(path) = self.claims.claim_next(&self.source_root, true)? else {
            debug!("No unclaimed video files under {}", self.source_root.display());
            return Ok(CycleOutcome::Idle);
        };
        reporter.on_claimed(&path);

        let started = Instant::now();
        match self.process(&path) {
            Ok((asset_id, record)) => {
                if self.release_on_success {
                    self.claims.release(&path)?;
                } else {
                    self.claims.settle(&path)?;
                }
                info!(
                    "Processed {} as asset {} in {:.2}s",
                    path.display(),
                    asset_id,
                    started.elapsed().as_secs_f64()
                );
                reporter.on_processed(&path, &asset_id, &record);
                Ok(CycleOutcome::Processed {
                    path,
                    asset_id,
                    record,
                })
            }
            Err(err) => {
                error!("Failed to process {}: {}", path.display(), err);
                self.claims.settle(&path)?;
                reporter.on_failed(&path, &err);
                Ok(CycleOutcome::Failed { path, error: err })
            }
        }
    }

    fn process(&self, path: &Path) -> Result<(AssetId, MetadataRecord), Error> {
        let name = CollectionName::for_master(path, self.flexible_naming)?;
        let record = self.extractor.extract_named(path, &name)?;

        let partition = self.ledger.append(&record)?;
        debug!("Recorded {} in {}", path.display(), partition.display());
        if self.write_json_sidecar {
            ledger::write_json_sidecar(path, &record)?;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let draft = StubDraft::new(&file_name, self.registry.placeholder(), &record);
        let asset_id = retry_with_backoff(
            self.retry,
            || self.registry.ensure_stub(&record.checksum, &draft),
            Error::is_retryable,
        )?;

        let final_fields = FinalAsset::new(&file_name, &record);
        retry_with_backoff(
            self.retry,
            || self.registry.finalize(&asset_id, &final_fields),
            Error::is_retryable,
        )?;

        Ok((asset_id, record))
    }

    /// Keep claiming files, sleeping for the idle wait whenever the queue is
    /// empty. Stops after `max_cycles` cycles when given, otherwise runs until
    /// a claim or walk error.
    pub fn run(
        &self,
        reporter: &dyn PipelineReporter,
        max_cycles: Option<usize>,
    ) -> Result<RunSummary, Error> {
        let mut summary = RunSummary::default();
        loop {
            let outcome = self.run_once(reporter)?;
            summary.cycles += 1;
            let idle = matches!(outcome, CycleOutcome::Idle);
            match outcome {
                CycleOutcome::Idle => summary.idle += 1,
                CycleOutcome::Processed { .. } => summary.processed += 1,
                CycleOutcome::Failed { .. } => summary.failed += 1,
            }

            if max_cycles.is_some_and(|max| summary.cycles >= max) {
                return Ok(summary);
            }
            if idle {
                reporter.on_idle(self.idle_wait);
                info!("Nothing to do, sleeping for {:?}", self.idle_wait);
                thread::sleep(self.idle_wait);
            }
        }
    }
}
