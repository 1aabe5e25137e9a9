//! Validated angle series and finite-difference velocities.
//!
//! Every channel is unwrapped before differencing, and each derivative divides by the
//! measured time between the two samples, so the same motion recorded at 30 fps and
//! at 300 fps produces the same rates.

use serde::Serialize;

use super::{AnalysisError, QualityFlag};
use crate::anthropometry::BatLever;
use crate::config::IngestConfig;
use crate::pose::{FramePositions, JointAngles, Point, SwingRecording};

/// One accepted frame: unwrapped angles plus positions in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicSample {
    pub frame_index: u64,
    pub timestamp_ms: f64,
    pub angles: JointAngles,
    pub positions: FramePositions,
}

/// Planar speed split into horizontal and vertical parts (m/s).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearVelocity {
    pub horizontal: f64,
    pub vertical: f64,
}

impl LinearVelocity {
    fn between(a: Point, b: Point, dt_s: f64) -> Self {
        Self {
            horizontal: (b.x - a.x).abs() / dt_s,
            vertical: (b.y - a.y).abs() / dt_s,
        }
    }

    pub fn speed(&self) -> f64 {
        self.horizontal.hypot(self.vertical)
    }
}

/// Rates over the interval ending at `timestamp_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JointVelocities {
    pub frame_index: u64,
    pub timestamp_ms: f64,
    pub pelvis_dps: f64,
    pub torso_dps: f64,
    pub shoulder_dps: Option<f64>,
    pub hand_line_dps: Option<f64>,
    pub lead_hand_mps: Option<f64>,
    pub rear_hand_mps: Option<f64>,
    pub pelvis_linear: Option<LinearVelocity>,
    pub shoulder_linear: Option<LinearVelocity>,
    /// Barrel speed from the hand-line rotation.
    pub bat_mps: Option<f64>,
}

impl JointVelocities {
    /// Fastest of the bat and hand speeds that are present.
    pub fn combined_mps(&self) -> Option<f64> {
        [self.bat_mps, self.lead_hand_mps, self.rear_hand_mps]
            .into_iter()
            .flatten()
            .filter(|v| v.is_finite())
            .reduce(f64::max)
    }

    /// Mean of the hand speeds that are present.
    pub fn mean_hand_mps(&self) -> Option<f64> {
        match (self.lead_hand_mps, self.rear_hand_mps) {
            (Some(a), Some(b)) => Some((a + b) / 2.0),
            (a, b) => a.or(b),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KinematicSeries {
    pub samples: Vec<KinematicSample>,
    /// `velocities[i]` covers `samples[i]..samples[i + 1]`.
    pub velocities: Vec<JointVelocities>,
    pub frames_received: usize,
    pub degenerate_skipped: usize,
    pub frames_without_angles: usize,
}

impl KinematicSeries {
    /// Build the series from raw frames.
    pub fn from_recording(
        recording: &SwingRecording,
        lever: &BatLever,
        scale_m: f64,
        ingest: &IngestConfig,
        flags: &mut Vec<QualityFlag>,
    ) -> Result<Self, AnalysisError> {
        let frames = &recording.frames;
        if frames.len() > ingest.max_frames {
            return Err(AnalysisError::RecordingTooLong {
                frames: frames.len(),
                max: ingest.max_frames,
            });
        }

        let bats = recording.athlete.bats;
        let mut samples: Vec<KinematicSample> = Vec::with_capacity(frames.len());
        let mut previous_ms: Option<f64> = None;
        let mut degenerate_skipped = 0;
        let mut frames_without_angles = 0;

        for frame in frames {
            let t = frame.timestamp_ms;
            if let Some(prev) = previous_ms {
                if !t.is_finite() || t < prev {
                    return Err(AnalysisError::NonMonotonicTimestamps {
                        frame_index: frame.frame_index,
                        previous_ms: prev,
                        timestamp_ms: t,
                    });
                }
            } else if !t.is_finite() {
                return Err(AnalysisError::NonMonotonicTimestamps {
                    frame_index: frame.frame_index,
                    previous_ms: f64::NEG_INFINITY,
                    timestamp_ms: t,
                });
            }
            previous_ms = Some(t);

            if samples.last().is_some_and(|s| s.timestamp_ms == t) {
                degenerate_skipped += 1;
                continue;
            }

            let Some(raw) = frame.resolve_angles(bats, ingest) else {
                frames_without_angles += 1;
                continue;
            };
            let angles = match samples.last() {
                Some(prev) => unwrap_angles(&prev.angles, &raw),
                None => raw,
            };
            samples.push(KinematicSample {
                frame_index: frame.frame_index,
                timestamp_ms: t,
                angles,
                positions: frame.positions(bats, scale_m, ingest),
            });
        }

        if degenerate_skipped > 0 {
            log::warn!("Skipped {} frames with repeated timestamps", degenerate_skipped);
            flags.push(QualityFlag::DegenerateTiming {
                skipped: degenerate_skipped,
            });
        }
        if frames_without_angles > 0 {
            log::debug!("{} frames had no usable pelvis/torso angles", frames_without_angles);
        }

        let velocities = samples
            .windows(2)
            .map(|pair| differentiate(&pair[0], &pair[1], lever))
            .collect::<Vec<_>>();

        log::debug!(
            "Kinematics: {} frames → {} samples, {} velocity intervals",
            frames.len(),
            samples.len(),
            velocities.len()
        );

        Ok(Self {
            samples,
            velocities,
            frames_received: frames.len(),
            degenerate_skipped,
            frames_without_angles,
        })
    }

    /// Samples with indices `start..=end`.
    pub fn samples_between(&self, start: usize, end: usize) -> &[KinematicSample] {
        &self.samples[start..=end]
    }

    /// Velocity intervals with both ends in `start..=end`. The first one ends at `start + 1`.
    pub fn velocities_between(&self, start: usize, end: usize) -> &[JointVelocities] {
        let end = end.min(self.velocities.len());
        if start >= end {
            return &[];
        }
        &self.velocities[start..end]
    }
}

/// Map a difference into (-180, 180].
pub fn wrap_degrees(delta: f64) -> f64 {
    let d = delta.rem_euclid(360.0);
    if d > 180.0 { d - 360.0 } else { d }
}

/// Continue `prev` by the shortest rotation towards `raw`.
fn unwrap_channel(prev: f64, raw: f64) -> f64 {
    prev + wrap_degrees(raw - prev)
}

fn unwrap_option(prev: Option<f64>, raw: Option<f64>) -> Option<f64> {
    match (prev, raw) {
        (Some(p), Some(r)) => Some(unwrap_channel(p, r)),
        (_, r) => r,
    }
}

fn unwrap_angles(prev: &JointAngles, raw: &JointAngles) -> JointAngles {
    JointAngles {
        pelvis: unwrap_channel(prev.pelvis, raw.pelvis),
        torso: unwrap_channel(prev.torso, raw.torso),
        shoulder: unwrap_option(prev.shoulder, raw.shoulder),
        elbow: unwrap_option(prev.elbow, raw.elbow),
        hand_line: unwrap_option(prev.hand_line, raw.hand_line),
    }
}

/// Callers guarantee `b.timestamp_ms > a.timestamp_ms`.
fn differentiate(a: &KinematicSample, b: &KinematicSample, lever: &BatLever) -> JointVelocities {
    let dt_s = (b.timestamp_ms - a.timestamp_ms) / 1000.0;
    let rate = |x: f64, y: f64| (y - x) / dt_s;
    let rate_opt = |x: Option<f64>, y: Option<f64>| Some(rate(x?, y?));
    let linear = |x: Option<Point>, y: Option<Point>| Some(LinearVelocity::between(x?, y?, dt_s));

    let pa = &a.positions;
    let pb = &b.positions;
    let hand_line_dps = rate_opt(a.angles.hand_line, b.angles.hand_line);

    JointVelocities {
        frame_index: b.frame_index,
        timestamp_ms: b.timestamp_ms,
        pelvis_dps: rate(a.angles.pelvis, b.angles.pelvis),
        torso_dps: rate(a.angles.torso, b.angles.torso),
        shoulder_dps: rate_opt(a.angles.shoulder, b.angles.shoulder),
        hand_line_dps,
        lead_hand_mps: linear(pa.lead_wrist, pb.lead_wrist).map(|v| v.speed()),
        rear_hand_mps: linear(pa.rear_wrist, pb.rear_wrist).map(|v| v.speed()),
        pelvis_linear: linear(pa.pelvis_centre, pb.pelvis_centre),
        shoulder_linear: linear(pa.shoulder_centre, pb.shoulder_centre),
        bat_mps: hand_line_dps.map(|w| lever.barrel_speed(w)),
    }
}
