pub mod mime;
pub mod timecode;

use crate::error::Error;
use crate::fixity;
use crate::naming::CollectionName;
use crate::probe::{ProbeRecord, ProbeStream};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use timecode::{seconds_to_hms, HmsOptions};
use tracing::debug;

/// Ledger column order. Must match the field order of [`MetadataRecord`].
pub const METADATA_COLUMNS: [&str; 21] = [
    "identifier",
    "title",
    "filetype",
    "duration_secs",
    "duration_hms",
    "checksum",
    "mime_type",
    "creation_datetime",
    "file_size_bytes",
    "overall_bit_rate",
    "video_codec",
    "video_bit_rate",
    "video_max_bit_rate",
    "video_frame_rate",
    "width",
    "height",
    "audio_codec",
    "audio_channels",
    "audio_sample_rate",
    "audio_bit_rate",
    "audio_max_bit_rate",
];

/// Canonical technical metadata for one file.
///
/// Every field is always present. Values that are unknown, or zero where zero
/// is meaningless (bitrates, sample rate), are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub identifier: String,
    pub title: String,
    pub filetype: String,
    pub duration_secs: f64,
    pub duration_hms: String,
    pub checksum: String,
    pub mime_type: Option<String>,
    pub creation_datetime: String,
    pub file_size_bytes: u64,
    pub overall_bit_rate: Option<u64>,
    pub video_codec: Option<String>,
    pub video_bit_rate: Option<u64>,
    pub video_max_bit_rate: Option<u64>,
    pub video_frame_rate: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub audio_codec: Option<String>,
    pub audio_channels: Option<u32>,
    pub audio_sample_rate: Option<u32>,
    pub audio_bit_rate: Option<u64>,
    pub audio_max_bit_rate: Option<u64>,
}

/// Filesystem attributes gathered alongside the probe.
#[derive(Debug, Clone, Copy)]
pub struct FileAttributes {
    pub created: SystemTime,
    pub modified: SystemTime,
    pub size: u64,
}

impl FileAttributes {
    pub fn read(path: &Path) -> Result<Self, Error> {
        let metadata = fs::metadata(path)?;
        let modified = metadata.modified()?;
        // Not every filesystem records a birth time.
        let created = metadata.created().unwrap_or(modified);
        Ok(Self {
            created,
            modified,
            size: metadata.len(),
        })
    }
}

pub struct Normalizer {
    checksum_extension: String,
    timezone: Tz,
}

impl Normalizer {
    pub fn new(checksum_extension: &str, timezone: Tz) -> Self {
        Self {
            checksum_extension: checksum_extension.to_string(),
            timezone,
        }
    }

    pub fn normalize(
        &self,
        path: &Path,
        probe: &ProbeRecord,
        attributes: &FileAttributes,
        name: &CollectionName,
    ) -> Result<MetadataRecord, Error> {
        let checksum = fixity::read_checksum_sidecar(path, &self.checksum_extension)?;

        let video = probe.video();
        let audio = probe.audio();

        let video_frame_rate = frame_rate(video.and_then(|v| v.avg_frame_rate.as_deref()));
        let duration_secs = probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .unwrap_or(0.0);

        let creation_datetime = match probe
            .creation_time_tag()
            .and_then(|tag| parse_creation_time(tag, self.timezone))
        {
            Some(tagged) => tagged,
            None => {
                debug!(
                    "No usable creation_time tag for {}, using filesystem time",
                    path.display()
                );
                localize(attributes.created, self.timezone)
            }
        };

        Ok(MetadataRecord {
            identifier: name.identifier.clone(),
            title: name.title.clone(),
            filetype: name.filetype.clone(),
            duration_secs,
            duration_hms: seconds_to_hms(duration_secs, HmsOptions::timecode(video_frame_rate)),
            checksum,
            mime_type: mime::mime_type_for_path(path).map(str::to_string),
            creation_datetime: creation_datetime.to_rfc3339(),
            file_size_bytes: attributes.size,
            overall_bit_rate: positive_number(probe.format.bit_rate.as_deref()),
            video_codec: video.map(codec_label),
            video_bit_rate: video.and_then(|v| positive_number(v.bit_rate.as_deref())),
            video_max_bit_rate: video.and_then(|v| positive_number(v.max_bit_rate.as_deref())),
            video_frame_rate,
            width: video.and_then(|v| v.width),
            height: video.and_then(|v| v.height),
            audio_codec: audio.map(codec_label),
            audio_channels: audio.and_then(|a| a.channels),
            audio_sample_rate: audio
                .and_then(|a| positive_number(a.sample_rate.as_deref()))
                .and_then(|rate| u32::try_from(rate).ok()),
            audio_bit_rate: audio.and_then(|a| positive_number(a.bit_rate.as_deref())),
            audio_max_bit_rate: audio.and_then(|a| positive_number(a.max_bit_rate.as_deref())),
        })
    }
}

/// Frames per second from ffprobe's `N/D` rational. Absent, malformed or `D == 0` gives `0.0`.
pub fn frame_rate(rational: Option<&str>) -> f64 {
    let Some((num, den)) = rational.and_then(|r| r.trim().split_once('/')) else {
        return 0.0;
    };
    let (Ok(num), Ok(den)) = (num.trim().parse::<f64>(), den.trim().parse::<f64>()) else {
        return 0.0;
    };
    if den == 0.0 || !num.is_finite() || !den.is_finite() {
        return 0.0;
    }
    num / den
}

/// Parse a numeric probe field where zero means "not reported".
pub fn positive_number(value: Option<&str>) -> Option<u64> {
    let value = value?.trim();
    let parsed = value
        .parse::<u64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))?;
    (parsed != 0).then_some(parsed)
}

/// Creation time from the container tag. Returns `None` instead of failing on bad input.
pub fn parse_creation_time(tag: &str, timezone: Tz) -> Option<DateTime<FixedOffset>> {
    let tag = tag.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(tag) {
        return Some(parsed);
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(tag, format).ok())
        .and_then(|naive| timezone.from_local_datetime(&naive).earliest())
        .map(|local| local.fixed_offset())
}

pub fn localize(time: SystemTime, timezone: Tz) -> DateTime<FixedOffset> {
    DateTime::<Utc>::from(time)
        .with_timezone(&timezone)
        .fixed_offset()
}

fn codec_label(stream: &ProbeStream) -> String {
    format!(
        "{} ({})",
        stream
            .codec_long_name
            .as_deref()
            .or(stream.codec_name.as_deref())
            .unwrap_or("unknown"),
        stream.codec_tag_string.as_deref().unwrap_or("unknown")
    )
}
