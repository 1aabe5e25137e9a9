//! Synthetic recordings shared by the unit tests.
//!
//! The ground-truth swing is laid out relative to the window start (peak − 1000 ms)
//! so its key instants fall on shared 30/300 fps sample times:
//! load at +266.7 ms, foot-down at +833.3 ms, contact at +1000 ms.

use crate::analyzer::kinematics::{wrap_degrees, KinematicSeries};
use crate::anthropometry::{AnthropometricModel, AthleteProfile, Handedness, MPH_PER_MPS};
use crate::config::{IngestConfig, PhysicsConfig};
use crate::pose::{JointAngles, PoseFrame, SwingRecording};

pub const PEAK_MS: f64 = 9600.0;
pub const BAT_SPEED_MPH: f64 = 57.5;

/// 575 frame intervals at 30 fps.
const DURATION_MS: f64 = 575.0 * 1000.0 / 30.0;
const HAND_LINE_HALF_WIDTH_MS: f64 = 150.0;

const PELVIS: [(f64, f64); 6] = [
    (0.0, 0.0),
    (800.0 / 3.0, -15.0),
    (831.0, 10.0),
    (870.0, 25.0),
    (900.0, 45.0),
    (1100.0, 60.0),
];
const TORSO: [(f64, f64); 6] = [
    (0.0, 0.0),
    (800.0 / 3.0, -20.0),
    (900.0, 10.0),
    (940.0, 30.0),
    (975.0, 65.0),
    (1150.0, 75.0),
];
const SHOULDER: [(f64, f64); 3] = [(975.0, 90.0), (1000.0, 140.0), (1100.0, 150.0)];

/// 16-year-old, 6'0", 160 lb, 6'4" wingspan, 32"/29 oz bat.
pub fn athlete() -> AthleteProfile {
    AthleteProfile {
        height_inches: 72.0,
        weight_lbs: 160.0,
        age: 16,
        wingspan_inches: Some(76.0),
        bat_length_inches: 32.0,
        bat_weight_oz: 29.0,
        bats: Handedness::Right,
    }
}

pub fn angle_frame(frame_index: u64, timestamp_ms: f64, angles: JointAngles) -> PoseFrame {
    PoseFrame {
        frame_index,
        timestamp_ms,
        joint_positions: Default::default(),
        joint_angles: Some(angles),
        confidence: Some(0.95),
    }
}

fn piecewise(points: &[(f64, f64)], s: f64) -> f64 {
    let (first, last) = (points[0], points[points.len() - 1]);
    if s <= first.0 {
        return first.1;
    }
    if s >= last.0 {
        return last.1;
    }
    for w in points.windows(2) {
        let ((x0, y0), (x1, y1)) = (w[0], w[1]);
        if s <= x1 {
            return y0 + (y1 - y0) * (s - x0) / (x1 - x0);
        }
    }
    last.1
}

fn frame_count(fps: f64, duration_ms: f64) -> u64 {
    (duration_ms * fps / 1000.0).round() as u64 + 1
}

/// 19.17 s swing with its velocity peak at `PEAK_MS`, hand-line speed tuned to 57.5 mph.
pub fn ground_truth_recording(fps: f64) -> SwingRecording {
    let athlete = athlete();
    let physics = PhysicsConfig::default();
    let lever = AnthropometricModel::new(&athlete)
        .unwrap()
        .bat_lever(physics.barrel_fraction, physics.arm_axis_fraction);
    let peak_dps = (BAT_SPEED_MPH / MPH_PER_MPS / lever.effective_radius_m).to_degrees();
    let omega = |t: f64| peak_dps * (1.0 - (t - PEAK_MS).abs() / HAND_LINE_HALF_WIDTH_MS).max(0.0);

    let window_start = PEAK_MS - 1000.0;
    let mut hand_line = 30.0;
    let mut previous_t = 0.0;
    let frames = (0..frame_count(fps, DURATION_MS))
        .map(|i| {
            let t = i as f64 * 1000.0 / fps;
            // Integrate so the finite difference recovers ω(t) exactly at each sample.
            hand_line += omega(t) * (t - previous_t) / 1000.0;
            previous_t = t;
            let s = t - window_start;
            angle_frame(
                i,
                t,
                JointAngles {
                    pelvis: piecewise(&PELVIS, s),
                    torso: piecewise(&TORSO, s),
                    shoulder: Some(piecewise(&SHOULDER, s)),
                    elbow: None,
                    hand_line: Some(wrap_degrees(hand_line)),
                },
            )
        })
        .collect();

    SwingRecording { athlete, frames }
}

/// Athlete standing still for `seconds`.
pub fn static_recording(fps: f64, seconds: f64) -> SwingRecording {
    let frames = (0..frame_count(fps, seconds * 1000.0))
        .map(|i| {
            angle_frame(
                i,
                i as f64 * 1000.0 / fps,
                JointAngles {
                    pelvis: 0.0,
                    torso: 0.0,
                    shoulder: Some(90.0),
                    elbow: None,
                    hand_line: Some(30.0),
                },
            )
        })
        .collect();
    SwingRecording {
        athlete: athlete(),
        frames,
    }
}

/// Kinematics with default ingest and lever settings.
pub fn series(recording: &SwingRecording) -> KinematicSeries {
    let model = AnthropometricModel::new(&recording.athlete).unwrap();
    let physics = PhysicsConfig::default();
    let lever = model.bat_lever(physics.barrel_fraction, physics.arm_axis_fraction);
    KinematicSeries::from_recording(
        recording,
        &lever,
        model.height_m(),
        &IngestConfig::default(),
        &mut Vec::new(),
    )
    .unwrap()
}
