use std::path::Path;

use crate::PhaseError;

/// Conventional file name of the per-directory frame-rate database.
pub const FRAME_RATE_DATABASE: &str = "frameratedatabase";

/// Video name to frames-per-second table, in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameRateDatabase {
    entries: Vec<(String, f64)>,
}

impl FrameRateDatabase {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a video or track by file name, falling back to the file stem so
    /// `clip01.tk` finds `clip01.avi`.
    pub fn lookup(&self, name: &str) -> Option<f64> {
        let path = Path::new(name);
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or(name);
        if let Some((_, rate)) = self.entries.iter().find(|(video, _)| video == file_name) {
            return Some(*rate);
        }
        let stem = path.file_stem().and_then(|s| s.to_str())?;
        self.entries
            .iter()
            .find(|(video, _)| Path::new(video).file_stem().and_then(|s| s.to_str()) == Some(stem))
            .map(|(_, rate)| *rate)
    }
}

/// Parse whitespace-separated `video_name frame_rate` pairs.
pub fn parse_frame_rate_database(input: &str) -> Result<FrameRateDatabase, PhaseError> {
    let mut entries = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        while let Some(video) = tokens.next() {
            let raw = tokens.next().ok_or_else(|| PhaseError::TrackParse {
                line: idx + 1,
                reason: format!("no frame rate given for '{video}'"),
            })?;
            let rate: f64 = raw.parse().map_err(|_| PhaseError::TrackParse {
                line: idx + 1,
                reason: format!("invalid frame rate '{raw}' for '{video}'"),
            })?;
            entries.push((video.to_string(), rate));
        }
    }
    Ok(FrameRateDatabase { entries })
}
