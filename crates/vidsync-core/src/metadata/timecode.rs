use crate::error::Error;

#[derive(Debug, Clone, Copy)]
pub struct HmsOptions {
    pub always_include_hours: bool,
    /// Ignored when `output_frames` is set.
    pub decimal_places: usize,
    pub output_frames: bool,
    pub framerate: f64,
}

impl Default for HmsOptions {
    fn default() -> Self {
        Self {
            always_include_hours: false,
            decimal_places: 0,
            output_frames: false,
            framerate: 24.0,
        }
    }
}

impl HmsOptions {
    /// `HH:MM:SS:FF` as written to the ledger.
    pub fn timecode(framerate: f64) -> Self {
        Self {
            always_include_hours: true,
            output_frames: true,
            framerate,
            ..Self::default()
        }
    }
}

/// Format a duration as `[HH:]MM:SS[.fff][:FF]`.
///
/// Halves round to even, so `72.5` seconds without decimals prints as `01:12`.
pub fn seconds_to_hms(seconds: f64, options: HmsOptions) -> String {
    let mut seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let mut decimal_places = options.decimal_places;
    let mut frames_suffix = String::new();

    if options.output_frames {
        decimal_places = 0;
        let whole = seconds.floor();
        let framerate = if options.framerate.is_finite() { options.framerate } else { 0.0 };
        let mut frames = ((seconds - whole) * framerate).round_ties_even();
        seconds = whole;
        if framerate > 0.0 && frames >= framerate {
            seconds += 1.0;
            frames = 0.0;
        }
        frames_suffix = format!(":{:02}", frames as u64);
    }

    if decimal_places == 0 {
        // otherwise 59.6 would print as 00:60
        seconds = seconds.round_ties_even();
    }

    let hours = (seconds / 3600.0).floor();
    let minutes = ((seconds - hours * 3600.0) / 60.0).floor();
    let secs = seconds - hours * 3600.0 - minutes * 60.0;

    let secs_text = if decimal_places == 0 {
        format!("{:02}", secs as u64)
    } else {
        format!(
            "{:0width$.prec$}",
            secs,
            width = decimal_places + 3,
            prec = decimal_places
        )
    };

    if hours > 0.0 || options.always_include_hours {
        format!(
            "{:02}:{:02}:{}{}",
            hours as u64, minutes as u64, secs_text, frames_suffix
        )
    } else {
        format!("{:02}:{}{}", minutes as u64, secs_text, frames_suffix)
    }
}

/// Parse `HH:MM:SS` or `HH:MM:SS:FF` back into seconds.
pub fn hms_to_seconds(text: &str, framerate: f64) -> Result<f64, Error> {
    let sections: Vec<&str> = text.trim().split(':').collect();
    if sections.len() != 3 && sections.len() != 4 {
        return Err(Error::Timecode(format!(
            "expected 3 or 4 segments in '{}'",
            text
        )));
    }

    let mut values = Vec::with_capacity(sections.len());
    for section in &sections {
        let value = section
            .parse::<u64>()
            .map_err(|_| Error::Timecode(format!("'{}' is not a number in '{}'", section, text)))?;
        values.push(value as f64);
    }

    let mut total = values[0] * 3600.0 + values[1] * 60.0 + values[2];
    if let Some(frames) = values.get(3) {
        if framerate > 0.0 {
            total += frames / framerate;
        }
    }
    Ok(total)
}
