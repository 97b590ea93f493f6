//! Runs ffprobe (or a compatible program) and parses its JSON report.
//!
//! The probe never touches the filesystem itself; the target may be a local
//! path or a URL the inspection tool knows how to open.

use crate::config::ProbeConfig;
use crate::error::Error;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const PROBE_ARGS: [&str; 6] = [
    "-v",
    "quiet",
    "-print_format",
    "json",
    "-show_format",
    "-show_streams",
];

/// Raw `-show_format -show_streams` report.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeRecord {
    #[serde(default)]
    pub format: ProbeFormat,
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeFormat {
    pub format_name: Option<String>,
    pub duration: Option<String>,
    pub bit_rate: Option<String>,
    pub size: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeStream {
    pub index: Option<u32>,
    #[serde(default)]
    pub codec_type: String,
    pub codec_name: Option<String>,
    pub codec_long_name: Option<String>,
    pub codec_tag_string: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub avg_frame_rate: Option<String>,
    pub bit_rate: Option<String>,
    pub max_bit_rate: Option<String>,
    pub sample_rate: Option<String>,
    pub channels: Option<u32>,
}

impl ProbeRecord {
    pub fn parse(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(Error::ProbeParse)
    }

    /// The first stream of `codec_type`; later streams of the same type are ignored.
    pub fn first_stream(&self, codec_type: &str) -> Option<&ProbeStream> {
        self.streams.iter().find(|s| s.codec_type == codec_type)
    }

    pub fn video(&self) -> Option<&ProbeStream> {
        self.first_stream("video")
    }

    pub fn audio(&self) -> Option<&ProbeStream> {
        self.first_stream("audio")
    }

    pub fn creation_time_tag(&self) -> Option<&str> {
        self.format.tags.get("creation_time").map(String::as_str)
    }
}

pub struct Prober {
    program: String,
    timeout: Duration,
}

impl Prober {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            program: config.program.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// For logs and errors only; the target is passed to the tool unchanged.
    fn command_line(&self, target: &OsStr) -> String {
        format!(
            "{} {} {}",
            self.program,
            PROBE_ARGS.join(" "),
            Path::new(target).display()
        )
    }

    pub fn probe(&self, target: impl AsRef<OsStr>) -> Result<ProbeRecord, Error> {
        let target = target.as_ref();
        let command = self.command_line(target);
        info!("Running {}", command);

        let mut child = Command::new(&self.program)
            .args(PROBE_ARGS)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| Error::ProbeSpawn {
                command: command.clone(),
                source,
            })?;

        // Drain stdout on its own thread so a large report cannot fill the pipe
        // while we wait on the exit status.
        let mut stdout = child.stdout.take().ok_or_else(|| Error::ProbeSpawn {
            command: command.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "stdout was not captured"),
        })?;
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                // Grandchildren of a wrapper script can keep the pipe open, so
                // the reader is detached rather than joined.
                drop(reader);
                return Err(Error::ProbeTimeout {
                    command,
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let output = match reader.join() {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "probe output reader panicked",
                )))
            }
        };

        if !status.success() {
            return Err(Error::ProbeFailure {
                command,
                exit_code: status.code().unwrap_or(-1),
            });
        }

        debug!(
            "Probe finished in {:.2}s ({} bytes)",
            started.elapsed().as_secs_f64(),
            output.len()
        );
        ProbeRecord::parse(&String::from_utf8_lossy(&output))
    }
}
