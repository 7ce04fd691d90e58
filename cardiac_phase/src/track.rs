//! In-memory model of a heart track (`.tk`) file.
//!
//! Layout: a comment header, `width height`, `head_up radius`, then one line per frame
//! with `frame_no labelled present centrey centrex orientation view_label phase_point
//! cardiac_phase`.

use std::io::{self, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    reconstruct, LandmarkKind, LandmarkLabel, Params, PhaseError, Reconstruction, UNSET_PHASE,
};

pub const TRACK_HEADER: &str =
    "# frame_no labelled present centrey centrex orientation view_label phase_point cardiac_phase";

const DEFAULT_RADIUS: i32 = 80;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum HeartPresence {
    #[default]
    None = 0,
    Present = 1,
    Obscured = 2,
}

impl HeartPresence {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(HeartPresence::None),
            1 => Some(HeartPresence::Present),
            2 => Some(HeartPresence::Obscured),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ViewLabel {
    #[default]
    None = 0,
    FourChamber = 1,
    Lvot = 2,
    ThreeVessel = 3,
    VSign = 4,
}

impl ViewLabel {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ViewLabel::None),
            1 => Some(ViewLabel::FourChamber),
            2 => Some(ViewLabel::Lvot),
            3 => Some(ViewLabel::ThreeVessel),
            4 => Some(ViewLabel::VSign),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FrameAnnotation {
    pub labelled: bool,
    pub present: HeartPresence,
    pub centre_y: i32,
    pub centre_x: i32,
    pub orientation: i32,
    pub view_label: ViewLabel,
    pub phase_point: LandmarkLabel,
    pub cardiac_phase: f64,
}

impl Default for FrameAnnotation {
    fn default() -> Self {
        Self {
            labelled: false,
            present: HeartPresence::None,
            centre_y: 0,
            centre_x: 0,
            orientation: 0,
            view_label: ViewLabel::None,
            phase_point: LandmarkLabel::Unlabelled,
            cardiac_phase: UNSET_PHASE,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrackFile {
    pub width: u32,
    pub height: u32,
    pub head_up: bool,
    pub radius: i32,
    pub frames: Vec<FrameAnnotation>,
    /// Whether `cardiac_phase` holds the result of a successful reconstruction.
    pub phase_valid: bool,
}

impl TrackFile {
    pub fn new(n_frames: usize, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            head_up: true,
            radius: DEFAULT_RADIUS,
            frames: vec![FrameAnnotation::default(); n_frames],
            phase_valid: false,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Parse track text.
    ///
    /// With `expected_frames`, a file that stops early is padded with unlabelled frames
    /// and extra rows are ignored; without it the row count defines the sequence length.
    pub fn parse(input: &str, expected_frames: Option<usize>) -> Result<Self, PhaseError> {
        let mut lines = input.lines().enumerate().map(|(i, l)| (i + 1, l));

        // Line 1 is the comment header.
        lines.next();
        let (line_no, dims) = next_line(&mut lines, "image dimensions")?;
        let mut fields = Fields::new(line_no, dims);
        let width: u32 = fields.next("width")?;
        let height: u32 = fields.next("height")?;

        let (line_no, display) = next_line(&mut lines, "head-up and radius")?;
        let mut fields = Fields::new(line_no, display);
        let head_up = fields.next::<i64>("head_up")? != 0;
        let radius: i32 = fields.next("radius")?;

        let mut frames = Vec::with_capacity(expected_frames.unwrap_or(0));
        for (line_no, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            if expected_frames.is_some_and(|n| frames.len() >= n) {
                break;
            }
            frames.push(parse_frame_line(line_no, line, frames.len())?);
        }
        if let Some(n) = expected_frames {
            frames.resize(n, FrameAnnotation::default());
        }

        // Padded or never-computed frames carry the negative sentinel.
        let phase_valid = !frames.is_empty() && frames.iter().all(|f| f.cardiac_phase >= 0.0);

        Ok(Self {
            width,
            height,
            head_up,
            radius,
            frames,
            phase_valid,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "{TRACK_HEADER}")?;
        writeln!(writer, "{} {}", self.width, self.height)?;
        writeln!(writer, "{} {}", u8::from(self.head_up), self.radius)?;
        for (f, frame) in self.frames.iter().enumerate() {
            // Geometry is only meaningful on frames the user has labelled.
            let (present, cy, cx, ori, view) = if frame.labelled {
                (
                    frame.present as u8,
                    frame.centre_y,
                    frame.centre_x,
                    frame.orientation,
                    frame.view_label as u8,
                )
            } else {
                (0, 0, 0, 0, 0)
            };
            writeln!(
                writer,
                "{} {} {} {} {} {} {} {} {}",
                f,
                u8::from(frame.labelled),
                present,
                cy,
                cx,
                ori,
                view,
                frame.phase_point.code(),
                frame.cardiac_phase
            )?;
        }
        Ok(())
    }

    pub fn to_text(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn labels(&self) -> Vec<LandmarkLabel> {
        self.frames.iter().map(|f| f.phase_point).collect()
    }

    pub fn phases(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.cardiac_phase).collect()
    }

    /// Phase of `frame`, or `None` while no valid reconstruction is stored.
    pub fn phase_at(&self, frame: usize) -> Option<f64> {
        if !self.phase_valid {
            return None;
        }
        self.frames.get(frame).map(|f| f.cardiac_phase)
    }

    /// Mark `frame` as a manual landmark of `kind`, or clear it if it already is one.
    pub fn toggle_landmark(
        &mut self,
        frame: usize,
        kind: LandmarkKind,
    ) -> Result<LandmarkLabel, PhaseError> {
        let n_frames = self.frames.len();
        let annotation = self.frames.get_mut(frame).ok_or_else(|| {
            PhaseError::InvalidParameter(format!(
                "frame {frame} out of range for a {n_frames}-frame track"
            ))
        })?;
        annotation.phase_point = if annotation.phase_point == kind.manual_label() {
            LandmarkLabel::Unlabelled
        } else {
            kind.manual_label()
        };
        Ok(annotation.phase_point)
    }

    /// Rebuild automatic landmarks and phases from the manual landmarks.
    ///
    /// On failure the stored labels, phases and validity flag are left as they were.
    pub fn recompute(
        &mut self,
        frame_rate: f64,
        params: &Params,
    ) -> Result<Reconstruction, PhaseError> {
        let mut labels = self.labels();
        let mut phases = self.phases();
        let summary = reconstruct(&mut labels, &mut phases, frame_rate, params)?;
        for ((frame, label), phase) in self.frames.iter_mut().zip(labels).zip(phases) {
            frame.phase_point = label;
            frame.cardiac_phase = phase;
        }
        self.phase_valid = true;
        Ok(summary)
    }
}

fn next_line<'a, I>(lines: &mut I, what: &str) -> Result<(usize, &'a str), PhaseError>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    lines.next().ok_or_else(|| PhaseError::TrackParse {
        line: 0,
        reason: format!("missing {what} line"),
    })
}

struct Fields<'a> {
    line: usize,
    tokens: std::str::SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    fn new(line: usize, text: &'a str) -> Self {
        Self {
            line,
            tokens: text.split_whitespace(),
        }
    }

    fn next<T: FromStr>(&mut self, name: &str) -> Result<T, PhaseError> {
        let line = self.line;
        let token = self.tokens.next().ok_or_else(|| PhaseError::TrackParse {
            line,
            reason: format!("missing field `{name}`"),
        })?;
        token.parse().map_err(|_| PhaseError::TrackParse {
            line,
            reason: format!("invalid `{name}` value '{token}'"),
        })
    }

    fn code<T>(&mut self, name: &str, decode: fn(i64) -> Option<T>) -> Result<T, PhaseError> {
        let raw: i64 = self.next(name)?;
        decode(raw).ok_or_else(|| PhaseError::TrackParse {
            line: self.line,
            reason: format!("unknown `{name}` code {raw}"),
        })
    }
}

fn parse_frame_line(
    line_no: usize,
    line: &str,
    expected: usize,
) -> Result<FrameAnnotation, PhaseError> {
    let mut fields = Fields::new(line_no, line);
    let frame_no: usize = fields.next("frame_no")?;
    if frame_no != expected {
        return Err(PhaseError::TrackParse {
            line: line_no,
            reason: format!("expected frame {expected}, found {frame_no}"),
        });
    }
    Ok(FrameAnnotation {
        labelled: fields.next::<i64>("labelled")? != 0,
        present: fields.code("present", HeartPresence::from_code)?,
        centre_y: fields.next("centrey")?,
        centre_x: fields.next("centrex")?,
        orientation: fields.next("orientation")?,
        view_label: fields.code("view_label", ViewLabel::from_code)?,
        phase_point: fields.code("phase_point", LandmarkLabel::from_code)?,
        cardiac_phase: fields.next("cardiac_phase")?,
    })
}
