use serde::{Deserialize, Serialize};

use crate::landmarks::LandmarkSeries;
use crate::{LandmarkKind, LandmarkLabel, Params, PhaseError};

/// Physiologically plausible beat lengths, in frames.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct BeatBounds {
    pub min_frames_per_beat: f64,
    pub max_frames_per_beat: f64,
}

impl BeatBounds {
    /// The fastest heart rate gives the shortest beat and vice versa.
    pub fn from_frame_rate(frame_rate: f64, params: &Params) -> Result<Self, PhaseError> {
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(PhaseError::InvalidParameter(format!(
                "frame rate must be positive and finite (got {frame_rate})"
            )));
        }
        params.validate()?;
        Ok(Self {
            min_frames_per_beat: 60.0 * frame_rate / params.max_heart_rate_bpm,
            max_frames_per_beat: 60.0 * frame_rate / params.min_heart_rate_bpm,
        })
    }

    pub fn contains(&self, beat_length: f64) -> bool {
        beat_length >= self.min_frames_per_beat && beat_length <= self.max_frames_per_beat
    }
}

#[derive(Clone, Debug)]
pub struct PeriodEstimate {
    /// Mean beat length in frames.
    pub period: f64,
    pub systole: LandmarkSeries,
    pub diastole: LandmarkSeries,
    /// Consecutive same-kind pairs that fell inside the bounds.
    pub pairs_used: usize,
}

/// Average the spacing of consecutive manual landmarks of the same kind.
///
/// Systole and diastole spacings feed one shared average. Every frame without a manual
/// label is reset to [`LandmarkLabel::Unlabelled`], which drops automatic labels left by a
/// previous run.
pub fn estimate_period(
    labels: &mut [LandmarkLabel],
    bounds: &BeatBounds,
) -> Result<PeriodEstimate, PhaseError> {
    let mut systole = LandmarkSeries::new(LandmarkKind::Systole);
    let mut diastole = LandmarkSeries::new(LandmarkKind::Diastole);
    let mut running_total = 0.0;
    let mut pairs_used = 0usize;

    for (f, label) in labels.iter_mut().enumerate() {
        let series = match *label {
            LandmarkLabel::ManualSystole => &mut systole,
            LandmarkLabel::ManualDiastole => &mut diastole,
            _ => {
                *label = LandmarkLabel::Unlabelled;
                continue;
            }
        };
        if let Some(prev) = series.last() {
            let beat_length = (f - prev) as f64;
            if bounds.contains(beat_length) {
                running_total += beat_length;
                pairs_used += 1;
            }
        }
        series.push(f);
    }

    if systole.is_empty() || diastole.is_empty() || pairs_used == 0 {
        return Err(PhaseError::InsufficientLandmarks);
    }

    Ok(PeriodEstimate {
        period: running_total / pairs_used as f64,
        systole,
        diastole,
        pairs_used,
    })
}
