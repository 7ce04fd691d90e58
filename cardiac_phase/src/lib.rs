//! Cardiac phase reconstruction from sparse end-systole/end-diastole annotations.
//!
//! Given a handful of manually labelled landmark frames, [`reconstruct`] estimates the
//! beat period, extends and densifies both landmark series to cover the whole sequence,
//! checks that they alternate, and assigns every frame a phase in `[0, 2π)`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

pub mod cycle;
pub mod frame_rate;
pub mod landmarks;
pub mod period;
pub mod track;

pub use frame_rate::{parse_frame_rate_database, FrameRateDatabase};
pub use landmarks::LandmarkSeries;
pub use period::{estimate_period, BeatBounds, PeriodEstimate};
pub use track::{FrameAnnotation, HeartPresence, TrackFile, ViewLabel};

/// Phase value of a frame that has never been reconstructed.
pub const UNSET_PHASE: f64 = -1.0;

/// Typical fetal heart rates (BPM).
pub const MIN_HEART_RATE_BPM: f64 = 110.0;
pub const MAX_HEART_RATE_BPM: f64 = 160.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhaseError {
    #[error(
        "insufficient landmarks: label at least one end-systole and one end-diastole frame, \
         plus one consecutive pair of end-systole or end-diastole frames"
    )]
    InsufficientLandmarks,
    #[error(
        "end-systole and end-diastole annotations are inconsistent at around frame {frame}; \
         check the annotations and try again"
    )]
    InconsistentAnnotation { frame: usize },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("failed to parse line {line}: {reason}")]
    TrackParse { line: usize, reason: String },
}

/// Per-frame landmark annotation. Discriminants are the on-disk `phase_point` codes.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LandmarkLabel {
    #[default]
    Unlabelled = 0,
    AutoSystole = 1,
    ManualSystole = 2,
    AutoDiastole = 3,
    ManualDiastole = 4,
}

impl LandmarkLabel {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(LandmarkLabel::Unlabelled),
            1 => Some(LandmarkLabel::AutoSystole),
            2 => Some(LandmarkLabel::ManualSystole),
            3 => Some(LandmarkLabel::AutoDiastole),
            4 => Some(LandmarkLabel::ManualDiastole),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_manual(self) -> bool {
        matches!(
            self,
            LandmarkLabel::ManualSystole | LandmarkLabel::ManualDiastole
        )
    }

    pub fn is_auto(self) -> bool {
        matches!(self, LandmarkLabel::AutoSystole | LandmarkLabel::AutoDiastole)
    }

    pub fn kind(self) -> Option<LandmarkKind> {
        match self {
            LandmarkLabel::Unlabelled => None,
            LandmarkLabel::AutoSystole | LandmarkLabel::ManualSystole => {
                Some(LandmarkKind::Systole)
            }
            LandmarkLabel::AutoDiastole | LandmarkLabel::ManualDiastole => {
                Some(LandmarkKind::Diastole)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LandmarkKind {
    /// End-systole, phase π.
    Systole,
    /// End-diastole, phase 0.
    Diastole,
}

impl LandmarkKind {
    pub fn manual_label(self) -> LandmarkLabel {
        match self {
            LandmarkKind::Systole => LandmarkLabel::ManualSystole,
            LandmarkKind::Diastole => LandmarkLabel::ManualDiastole,
        }
    }

    pub fn auto_label(self) -> LandmarkLabel {
        match self {
            LandmarkKind::Systole => LandmarkLabel::AutoSystole,
            LandmarkKind::Diastole => LandmarkLabel::AutoDiastole,
        }
    }

    pub fn phase(self) -> f64 {
        match self {
            LandmarkKind::Systole => std::f64::consts::PI,
            LandmarkKind::Diastole => 0.0,
        }
    }

    pub fn other(self) -> Self {
        match self {
            LandmarkKind::Systole => LandmarkKind::Diastole,
            LandmarkKind::Diastole => LandmarkKind::Systole,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Params {
    pub min_heart_rate_bpm: f64,
    pub max_heart_rate_bpm: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            min_heart_rate_bpm: MIN_HEART_RATE_BPM,
            max_heart_rate_bpm: MAX_HEART_RATE_BPM,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), PhaseError> {
        let (lo, hi) = (self.min_heart_rate_bpm, self.max_heart_rate_bpm);
        if !lo.is_finite() || !hi.is_finite() || lo <= 0.0 || hi <= 0.0 {
            return Err(PhaseError::InvalidParameter(format!(
                "heart rate bounds must be positive and finite (got {lo}..{hi} BPM)"
            )));
        }
        if lo >= hi {
            return Err(PhaseError::InvalidParameter(format!(
                "minimum heart rate {lo} BPM must be below maximum {hi} BPM"
            )));
        }
        Ok(())
    }

    pub fn params_hash_sha256(&self) -> Result<String, PhaseError> {
        let bytes =
            serde_json::to_vec(self).map_err(|e| PhaseError::InvalidParameter(e.to_string()))?;
        Ok(sha256_hex(&bytes))
    }
}

/// Summary of a successful reconstruction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Reconstruction {
    pub n_frames: usize,
    pub frame_rate: f64,
    pub cardiac_period: f64,
    pub bounds: BeatBounds,
    pub systole_frames: Vec<usize>,
    pub diastole_frames: Vec<usize>,
    pub manual_systole: usize,
    pub manual_diastole: usize,
    pub auto_systole: usize,
    pub auto_diastole: usize,
    pub pairs_used: usize,
    pub params_hash: String,
}

/// Recompute every automatic landmark and the per-frame phase.
///
/// `labels` and `phases` are the caller's per-frame columns and must have the same
/// length. Work happens on private copies; the caller's slices are only overwritten
/// when every stage succeeds, so a failed run leaves the last good result in place.
pub fn reconstruct(
    labels: &mut [LandmarkLabel],
    phases: &mut [f64],
    frame_rate: f64,
    params: &Params,
) -> Result<Reconstruction, PhaseError> {
    match run_pipeline(labels, phases.len(), frame_rate, params) {
        Ok((work_labels, work_phases, summary)) => {
            labels.copy_from_slice(&work_labels);
            phases.copy_from_slice(&work_phases);
            Ok(summary)
        }
        Err(err) => {
            warn!("cardiac phase not updated: {err}");
            Err(err)
        }
    }
}

type PipelineOutput = (Vec<LandmarkLabel>, Vec<f64>, Reconstruction);

fn run_pipeline(
    labels: &[LandmarkLabel],
    phase_len: usize,
    frame_rate: f64,
    params: &Params,
) -> Result<PipelineOutput, PhaseError> {
    let n_frames = labels.len();
    if n_frames == 0 {
        return Err(PhaseError::InvalidParameter("sequence has no frames".into()));
    }
    if phase_len != n_frames {
        return Err(PhaseError::InvalidParameter(format!(
            "phase column has {phase_len} frames but label column has {n_frames}"
        )));
    }
    let bounds = BeatBounds::from_frame_rate(frame_rate, params)?;
    let params_hash = params.params_hash_sha256()?;

    let mut work = labels.to_vec();
    let estimate = estimate_period(&mut work, &bounds)?;
    let PeriodEstimate {
        period,
        mut systole,
        mut diastole,
        pairs_used,
    } = estimate;
    let manual_systole = systole.len();
    let manual_diastole = diastole.len();
    debug!(
        period,
        pairs_used,
        manual_systole,
        manual_diastole,
        "estimated cardiac period"
    );

    for series in [&mut systole, &mut diastole] {
        let added = landmarks::extrapolate(series, &mut work, period);
        let filled = landmarks::fill_gaps(series, &mut work, period, bounds.max_frames_per_beat);
        debug!(kind = ?series.kind(), added, filled, "extended landmark series");
    }

    let anchors = cycle::CycleAnchors::new(&systole, &diastole, period);
    anchors.validate(n_frames)?;
    let mut phases = vec![UNSET_PHASE; n_frames];
    anchors.interpolate(&mut phases)?;

    let summary = Reconstruction {
        n_frames,
        frame_rate,
        cardiac_period: period,
        bounds,
        manual_systole,
        manual_diastole,
        auto_systole: systole.len() - manual_systole,
        auto_diastole: diastole.len() - manual_diastole,
        systole_frames: systole.into_frames(),
        diastole_frames: diastole.into_frames(),
        pairs_used,
        params_hash,
    };
    Ok((work, phases, summary))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
