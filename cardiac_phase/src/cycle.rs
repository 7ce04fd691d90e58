//! Boundary anchoring, alternation check and phase interpolation over the final
//! landmark series.

use std::f64::consts::PI;

use crate::landmarks::LandmarkSeries;
use crate::{LandmarkKind, PhaseError};

/// Both landmark series plus one imaginary anchor at the start and one at the end, so
/// every real frame lies between a diastole and a systole landmark.
#[derive(Clone, Debug)]
pub struct CycleAnchors {
    systole: Vec<i64>,
    diastole: Vec<i64>,
    /// The sequence opens between a diastole and the first systole.
    opens_toward_systole: bool,
}

impl CycleAnchors {
    pub fn new(systole: &LandmarkSeries, diastole: &LandmarkSeries, period: f64) -> Self {
        let mut sys: Vec<i64> = systole.frames().iter().map(|&f| f as i64).collect();
        let mut dia: Vec<i64> = diastole.frames().iter().map(|&f| f as i64).collect();
        let mut opens_toward_systole = false;

        match (sys.first().copied(), dia.first().copied()) {
            (Some(s), Some(d)) if d > s => {
                opens_toward_systole = true;
                dia.insert(0, (d as f64 - period).round() as i64);
            }
            (Some(s), Some(_)) => {
                sys.insert(0, (s as f64 - period).round() as i64);
            }
            _ => {}
        }

        if let (Some(&s), Some(&d)) = (sys.last(), dia.last()) {
            if d > s {
                sys.push((s as f64 + period).round() as i64);
            } else {
                dia.push((d as f64 + period).round() as i64);
            }
        }

        Self {
            systole: sys,
            diastole: dia,
            opens_toward_systole,
        }
    }

    pub fn opens_toward_systole(&self) -> bool {
        self.opens_toward_systole
    }

    /// Require the merged landmarks to alternate strictly between systole and diastole
    /// with no shared frames.
    pub fn validate(&self, n_frames: usize) -> Result<(), PhaseError> {
        let (sys, dia) = (&self.systole, &self.diastole);
        let inconsistent = |frame: i64| PhaseError::InconsistentAnnotation {
            frame: frame.clamp(0, n_frames.saturating_sub(1) as i64) as usize,
        };

        let (Some(&s0), Some(&d0)) = (sys.first(), dia.first()) else {
            return Err(PhaseError::InsufficientLandmarks);
        };
        // Seeded so that whichever kind comes first is accepted.
        let mut last = if s0 > d0 {
            LandmarkKind::Systole
        } else {
            LandmarkKind::Diastole
        };

        let (mut i, mut j) = (0usize, 0usize);
        while i < sys.len() || j < dia.len() {
            if i < sys.len() && j < dia.len() && sys[i] == dia[j] {
                return Err(inconsistent(dia[j]));
            }
            let take_diastole = i == sys.len() || (j < dia.len() && sys[i] > dia[j]);
            if take_diastole {
                if last == LandmarkKind::Diastole {
                    return Err(inconsistent(dia[j]));
                }
                last = LandmarkKind::Diastole;
                j += 1;
            } else {
                if last == LandmarkKind::Systole {
                    return Err(inconsistent(sys[i]));
                }
                last = LandmarkKind::Systole;
                i += 1;
            }
        }
        debug_assert!(i == sys.len() && j == dia.len());
        Ok(())
    }

    /// Assign every frame a phase in `[0, 2π)`: linear from 0 at end-diastole to π at
    /// end-systole, then on to 2π at the next end-diastole (written as 0).
    ///
    /// Assumes [`CycleAnchors::validate`] has passed.
    pub fn interpolate(&self, phases: &mut [f64]) -> Result<(), PhaseError> {
        let n_frames = phases.len();
        let out_of_anchors = |f: usize| PhaseError::InconsistentAnnotation {
            frame: f.min(n_frames.saturating_sub(1)),
        };

        let (mut si, mut di) = (0usize, 0usize);
        let mut toward_systole = self.opens_toward_systole;
        let mut f = 0usize;
        while f < n_frames {
            let systole = *self.systole.get(si).ok_or_else(|| out_of_anchors(f))?;
            let diastole = *self.diastole.get(di).ok_or_else(|| out_of_anchors(f))?;
            if toward_systole {
                let (from, to) = (diastole, systole);
                while f < n_frames && (f as i64) < to {
                    phases[f] = PI * (f as i64 - from) as f64 / (to - from) as f64;
                    f += 1;
                }
                if f >= n_frames {
                    break;
                }
                phases[f] = LandmarkKind::Systole.phase();
                di += 1;
            } else {
                let (from, to) = (systole, diastole);
                while f < n_frames && (f as i64) < to {
                    phases[f] = PI + PI * (f as i64 - from) as f64 / (to - from) as f64;
                    f += 1;
                }
                if f >= n_frames {
                    break;
                }
                phases[f] = LandmarkKind::Diastole.phase();
                si += 1;
            }
            f += 1;
            toward_systole = !toward_systole;
        }
        Ok(())
    }
}
