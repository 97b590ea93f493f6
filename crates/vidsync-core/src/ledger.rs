use crate::error::Error;
use crate::metadata::{MetadataRecord, METADATA_COLUMNS};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Date-partitioned CSV log of processed files: one `<YYYYMMDD>_metadata.csv` per day.
pub struct Ledger {
    output_folder: PathBuf,
    timezone: Tz,
}

impl Ledger {
    pub fn new(output_folder: impl Into<PathBuf>, timezone: Tz) -> Self {
        Self {
            output_folder: output_folder.into(),
            timezone,
        }
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    pub fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.output_folder
            .join(format!("{}_metadata.csv", date.format("%Y%m%d")))
    }

    pub fn append(&self, record: &MetadataRecord) -> Result<PathBuf, Error> {
        self.append_on(self.today(), record)
    }

    /// Append one row, creating the partition with its header first if needed.
    ///
    /// The row is rendered in memory and written with a single call so a
    /// failed serialization never leaves half a row behind.
    pub fn append_on(&self, date: NaiveDate, record: &MetadataRecord) -> Result<PathBuf, Error> {
        fs::create_dir_all(&self.output_folder)?;
        let path = self.partition_path(date);
        if !path.exists() {
            self.create_partition(&path)?;
        }

        let mut file = OpenOptions::new().append(true).create(true).open(&path)?;
        // Only an empty file made by someone else still lacks the header.
        let needs_header = file.metadata()?.len() == 0;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        if needs_header {
            wtr.write_record(METADATA_COLUMNS)?;
        }
        wtr.serialize(record)?;
        let bytes = wtr
            .into_inner()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        file.write_all(&bytes)?;
        file.flush()?;
        debug!("Appended {} to {}", record.checksum, path.display());
        Ok(path)
    }

    /// Publish a partition holding just the header. The header is written to
    /// a temporary file and linked into place without clobbering, so when
    /// several workers race only one partition ever appears.
    fn create_partition(&self, path: &Path) -> Result<(), Error> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(NamedTempFile::new_in(&self.output_folder)?);
        wtr.write_record(METADATA_COLUMNS)?;
        let temp = wtr
            .into_inner()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        match temp.persist_noclobber(path) {
            Ok(_) => {
                info!("Started metadata ledger {}", path.display());
                Ok(())
            }
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!("Ledger {} was started by another worker", path.display());
                Ok(())
            }
            Err(err) => Err(err.error.into()),
        }
    }
}

pub fn read_partition(path: &Path) -> Result<Vec<MetadataRecord>, Error> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut records = Vec::new();
    for row in rdr.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// Write `<path>.json` with the record, pretty printed.
pub fn write_json_sidecar(path: &Path, record: &MetadataRecord) -> Result<PathBuf, Error> {
    let mut name = path.as_os_str().to_os_string();
    name.push(".json");
    let sidecar = PathBuf::from(name);
    fs::write(&sidecar, serde_json::to_vec_pretty(record)?)?;
    Ok(sidecar)
}
