use serde::{Deserialize, Serialize};

use crate::{LandmarkKind, LandmarkLabel};

/// Frame indices of one landmark kind, kept in ascending order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LandmarkSeries {
    kind: LandmarkKind,
    frames: Vec<usize>,
}

impl LandmarkSeries {
    pub fn new(kind: LandmarkKind) -> Self {
        Self {
            kind,
            frames: Vec::new(),
        }
    }

    pub fn kind(&self) -> LandmarkKind {
        self.kind
    }

    pub fn frames(&self) -> &[usize] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<usize> {
        self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn first(&self) -> Option<usize> {
        self.frames.first().copied()
    }

    pub fn last(&self) -> Option<usize> {
        self.frames.last().copied()
    }

    /// Append a frame later than every frame already held.
    pub(crate) fn push(&mut self, frame: usize) {
        debug_assert!(self.last().map_or(true, |last| frame > last));
        self.frames.push(frame);
    }
}

/// Step outward from the first and last landmark by whole periods until the sequence
/// boundaries, labelling each new frame with the series' automatic label.
///
/// Returns the number of landmarks added.
pub fn extrapolate(
    series: &mut LandmarkSeries,
    labels: &mut [LandmarkLabel],
    period: f64,
) -> usize {
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return 0;
    };
    let n_frames = labels.len() as f64;
    let auto = series.kind.auto_label();

    let mut before = Vec::new();
    for n in 1.. {
        let f = first as f64 - (n as f64 * period).round();
        if f < 0.0 {
            break;
        }
        before.push(f as usize);
    }
    before.reverse();

    let mut after = Vec::new();
    for n in 1.. {
        let f = last as f64 + (n as f64 * period).round();
        if f >= n_frames {
            break;
        }
        after.push(f as usize);
    }

    for &f in before.iter().chain(after.iter()) {
        labels[f] = auto;
    }
    let added = before.len() + after.len();
    series.frames.splice(0..0, before);
    series.frames.extend(after);
    added
}

/// Insert evenly spaced automatic landmarks wherever two neighbours are further apart
/// than the longest plausible beat.
///
/// Returns the number of landmarks inserted.
pub fn fill_gaps(
    series: &mut LandmarkSeries,
    labels: &mut [LandmarkLabel],
    period: f64,
    max_frames_per_beat: f64,
) -> usize {
    let auto = series.kind.auto_label();
    let mut inserted = 0;
    let mut i = 0;
    while i + 1 < series.frames.len() {
        let a = series.frames[i];
        let b = series.frames[i + 1];
        let gap = (b - a) as f64;
        if gap > max_frames_per_beat {
            let count = ((gap / period).round() as usize).saturating_sub(1);
            let spacing = gap / (count + 1) as f64;
            let fill: Vec<usize> = (1..=count)
                .map(|k| a + (k as f64 * spacing).round() as usize)
                .collect();
            for &f in &fill {
                labels[f] = auto;
            }
            series.frames.splice(i + 1..i + 1, fill);
            inserted += count;
            // Resume from `b`; the new landmarks are evenly spaced by construction.
            i += count;
        }
        i += 1;
    }
    inserted
}
