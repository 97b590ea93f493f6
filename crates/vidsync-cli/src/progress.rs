use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use vidsync_core::{AssetId, Error, MetadataRecord, PipelineReporter};

/// Spinner while a file is being processed, one coloured line per outcome.
pub struct CliReporter {
    spinner: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
        }
    }

    fn start(&self, message: String) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]") {
            pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(80));

        let mut guard = self.spinner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = guard.replace(pb) {
            old.finish_and_clear();
        }
    }

    fn finish(&self) {
        let mut guard = self.spinner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl PipelineReporter for CliReporter {
    fn on_claimed(&self, path: &Path) {
        self.start(format!("Processing {}", display_name(path)));
    }

    fn on_processed(&self, path: &Path, asset_id: &AssetId, record: &MetadataRecord) {
        self.finish();
        eprintln!(
            "  {} {} → asset {} ({}, {})",
            "✓".green(),
            display_name(path),
            asset_id.to_string().cyan(),
            record.duration_hms,
            record.checksum.dimmed()
        );
    }

    fn on_failed(&self, path: &Path, error: &Error) {
        self.finish();
        eprintln!("  {} {}: {}", "✗".red(), display_name(path), error.to_string().red());
    }

    fn on_idle(&self, wait: Duration) {
        self.finish();
        eprintln!(
            "  {} Nothing to claim, checking again in {}s",
            "…".yellow(),
            wait.as_secs()
        );
    }
}
