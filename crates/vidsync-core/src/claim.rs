//! Marker-file claims over a shared watch folder.
//!
//! A file is claimed iff `<path><marker_suffix>` exists. Markers are created
//! with `create_new`, so two workers racing for the same file cannot both
//! succeed on a filesystem that honours exclusive create.
//!
//! Once a worker reaches a terminal outcome for a file, processed or failed,
//! it also writes `<path><settled_suffix>`. Stale reclaim only ever applies
//! to claims without that second marker.

use crate::config::ClaimConfig;
use crate::error::Error;
use crate::metadata::mime::is_video_path;
use glob::Pattern;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

pub struct ClaimManager {
    marker_suffix: String,
    settled_suffix: String,
    restricted_sentinel: String,
    stale_after: Option<Duration>,
    ignore_patterns: Vec<Pattern>,
}

impl ClaimManager {
    pub fn new(config: &ClaimConfig) -> Self {
        let ignore_patterns = config
            .ignore_patterns
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();

        Self {
            marker_suffix: config.marker_suffix.clone(),
            settled_suffix: config.settled_suffix.clone(),
            restricted_sentinel: config.restricted_sentinel.clone(),
            stale_after: config.stale_after_secs.map(Duration::from_secs),
            ignore_patterns,
        }
    }

    pub fn marker_path(&self, path: &Path) -> PathBuf {
        let mut marker = path.as_os_str().to_os_string();
        marker.push(&self.marker_suffix);
        PathBuf::from(marker)
    }

    pub fn settled_path(&self, path: &Path) -> PathBuf {
        let mut settled = path.as_os_str().to_os_string();
        settled.push(&self.settled_suffix);
        PathBuf::from(settled)
    }

    pub fn is_claimed(&self, path: &Path) -> bool {
        self.marker_path(path).exists()
    }

    /// True once a worker finished with the file, whether it succeeded or not.
    pub fn is_settled(&self, path: &Path) -> bool {
        self.settled_path(path).exists()
    }

    /// Record that the claim reached a terminal outcome so it is never
    /// taken over as stale.
    pub fn settle(&self, path: &Path) -> Result<(), Error> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.settled_path(path))
        {
            Ok(_) => {
                debug!("Settled {}", path.display());
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Restricted files carry the sentinel (e.g. `_RESTRICTED_`) somewhere in their path.
    pub fn is_restricted(&self, path: &Path) -> bool {
        !self.restricted_sentinel.is_empty()
            && path.to_string_lossy().contains(&self.restricted_sentinel)
    }

    /// Walk `source_root` and hand out the first eligible video file.
    ///
    /// With `exclusive`, the file is claimed before it is returned and files
    /// that already carry a marker are skipped. Without it, the first
    /// candidate is returned and claim markers are neither read nor written.
    /// Restricted files are marked in both modes and never returned.
    pub fn claim_next(&self, source_root: &Path, exclusive: bool) -> Result<Option<PathBuf>, Error> {
        let root = std::path::absolute(source_root).unwrap_or_else(|_| source_root.to_path_buf());
        debug!("Looking for video files under {}", root.display());

        let walker = WalkDir::new(&root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_ignored(entry.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), err);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_video_path(entry.path()) {
                continue;
            }

            let path = entry.into_path();

            // another worker may have moved or deleted it since the walk listed it
            if !path.exists() {
                continue;
            }

            if self.is_restricted(&path) {
                self.exclude(&path)?;
                continue;
            }

            if !exclusive {
                return Ok(Some(path));
            }

            if self.try_claim(&path)? || self.reclaim_if_stale(&path)? {
                info!("Claimed {}", path.display());
                return Ok(Some(path));
            }
        }

        Ok(None)
    }

    /// Remove the claim marker and any settled marker. Returns false when
    /// there was no claim.
    pub fn release(&self, path: &Path) -> Result<bool, Error> {
        match fs::remove_file(self.settled_path(path)) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        match fs::remove_file(self.marker_path(path)) {
            Ok(()) => {
                debug!("Released {}", path.display());
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(path))
    }

    /// Atomically create the marker. False if it already existed.
    fn try_claim(&self, path: &Path) -> io::Result<bool> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.marker_path(path))
        {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn exclude(&self, path: &Path) -> io::Result<()> {
        if self.try_claim(path)? {
            info!("Ignoring restricted file: {}", path.display());
        }
        Ok(())
    }

    fn reclaim_if_stale(&self, path: &Path) -> io::Result<bool> {
        let Some(stale_after) = self.stale_after else {
            return Ok(false);
        };
        if self.is_settled(path) {
            return Ok(false);
        }
        let marker = self.marker_path(path);
        let modified = match fs::metadata(&marker).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return self.try_claim(path),
            Err(err) => return Err(err),
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age <= stale_after {
            return Ok(false);
        }

        warn!(
            "Claim on {} is {}s old, taking it over",
            path.display(),
            age.as_secs()
        );
        match fs::remove_file(&marker) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        self.try_claim(path)
    }
}
