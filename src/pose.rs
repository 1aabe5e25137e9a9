//! Pose input schema and landmark → angle extraction.
//!
//! Landmark coordinates are normalized image units (x right, y down). Angles are
//! in degrees. Rotation angles follow the convention `90 − atan2(dy, dx)` for the
//! line running from the rear joint to the lead joint, so a left-handed hitter
//! reads the same as a right-handed one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::anthropometry::{AthleteProfile, Handedness};
use crate::config::IngestConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

/// Body part that exists on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limb {
    Shoulder,
    Elbow,
    Wrist,
    Hip,
}

impl Limb {
    fn joint(self, left: bool) -> Joint {
        match (self, left) {
            (Self::Shoulder, true) => Joint::LeftShoulder,
            (Self::Shoulder, false) => Joint::RightShoulder,
            (Self::Elbow, true) => Joint::LeftElbow,
            (Self::Elbow, false) => Joint::RightElbow,
            (Self::Wrist, true) => Joint::LeftWrist,
            (Self::Wrist, false) => Joint::RightWrist,
            (Self::Hip, true) => Joint::LeftHip,
            (Self::Hip, false) => Joint::RightHip,
        }
    }
}

impl Handedness {
    /// Lead side faces the pitcher: a right-handed hitter leads with the left.
    pub fn lead(self, limb: Limb) -> Joint {
        limb.joint(self == Handedness::Right)
    }

    pub fn rear(self, limb: Limb) -> Joint {
        limb.joint(self == Handedness::Left)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    /// Relative depth proxy. Carried but not used for planar kinematics.
    #[serde(default)]
    pub z: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl Landmark {
    pub fn point(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }
}

/// A position in the image plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn midpoint(self, other: Point) -> Point {
        Point {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }

    pub fn scaled(self, factor: f64) -> Point {
        Point {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Pre-computed angles supplied with a frame, or derived from its landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointAngles {
    pub pelvis: f64,
    pub torso: f64,
    #[serde(default)]
    pub shoulder: Option<f64>,
    #[serde(default)]
    pub elbow: Option<f64>,
    /// Rotation of the line through both wrists; the bat follows it.
    #[serde(default)]
    pub hand_line: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    pub frame_index: u64,
    pub timestamp_ms: f64,
    #[serde(default)]
    pub joint_positions: BTreeMap<Joint, Landmark>,
    #[serde(default)]
    pub joint_angles: Option<JointAngles>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// One recording as handed over by the pose extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingRecording {
    pub athlete: AthleteProfile,
    pub frames: Vec<PoseFrame>,
}

/// Landmark positions needed for linear velocities, in metres.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FramePositions {
    pub pelvis_centre: Option<Point>,
    pub shoulder_centre: Option<Point>,
    pub lead_wrist: Option<Point>,
    pub rear_wrist: Option<Point>,
}

impl PoseFrame {
    /// Landmark if the frame and the landmark both pass the confidence gates.
    pub fn landmark(&self, joint: Joint, ingest: &IngestConfig) -> Option<Point> {
        if self.confidence.unwrap_or(1.0) < ingest.min_frame_confidence {
            return None;
        }
        let lm = self.joint_positions.get(&joint)?;
        if lm.confidence.unwrap_or(1.0) < ingest.min_landmark_confidence {
            return None;
        }
        let p = lm.point();
        p.is_finite().then_some(p)
    }

    /// Supplied angles win; any channel they leave empty is filled from landmarks.
    /// Returns None when neither source yields pelvis and torso.
    pub fn resolve_angles(&self, bats: Handedness, ingest: &IngestConfig) -> Option<JointAngles> {
        let lm = |j: Joint| self.landmark(j, ingest);
        let derived_shoulder = || {
            angle_at(
                lm(bats.rear(Limb::Shoulder))?,
                lm(bats.lead(Limb::Shoulder))?,
                lm(bats.lead(Limb::Elbow))?,
            )
        };
        let derived_elbow = || {
            angle_at(
                lm(bats.lead(Limb::Shoulder))?,
                lm(bats.lead(Limb::Elbow))?,
                lm(bats.lead(Limb::Wrist))?,
            )
        };
        let derived_hand_line =
            || rotation_angle(lm(bats.rear(Limb::Wrist))?, lm(bats.lead(Limb::Wrist))?);

        let base = match self.joint_angles {
            Some(a) if a.pelvis.is_finite() && a.torso.is_finite() => a,
            _ => JointAngles {
                pelvis: rotation_angle(lm(bats.rear(Limb::Hip))?, lm(bats.lead(Limb::Hip))?)?,
                torso: rotation_angle(
                    lm(bats.rear(Limb::Shoulder))?,
                    lm(bats.lead(Limb::Shoulder))?,
                )?,
                shoulder: None,
                elbow: None,
                hand_line: None,
            },
        };

        Some(JointAngles {
            pelvis: base.pelvis,
            torso: base.torso,
            shoulder: finite(base.shoulder).or_else(derived_shoulder),
            elbow: finite(base.elbow).or_else(derived_elbow),
            hand_line: finite(base.hand_line).or_else(derived_hand_line),
        })
    }

    /// Centres and wrists scaled to metres.
    pub fn positions(&self, bats: Handedness, scale_m: f64, ingest: &IngestConfig) -> FramePositions {
        let lm = |j: Joint| self.landmark(j, ingest);
        let centre = |limb: Limb| Some(lm(bats.lead(limb))?.midpoint(lm(bats.rear(limb))?));
        FramePositions {
            pelvis_centre: centre(Limb::Hip).map(|p| p.scaled(scale_m)),
            shoulder_centre: centre(Limb::Shoulder).map(|p| p.scaled(scale_m)),
            lead_wrist: lm(bats.lead(Limb::Wrist)).map(|p| p.scaled(scale_m)),
            rear_wrist: lm(bats.rear(Limb::Wrist)).map(|p| p.scaled(scale_m)),
        }
    }
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

/// Rotation of the line `from → to`: `90 − atan2(dy, dx)`, in degrees.
pub fn rotation_angle(from: Point, to: Point) -> Option<f64> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    if dx == 0.0 && dy == 0.0 {
        return None;
    }
    Some(90.0 - dy.atan2(dx).to_degrees())
}

/// Interior angle at `vertex` between the rays to `a` and `c`, in [0, 180].
pub fn angle_at(a: Point, vertex: Point, c: Point) -> Option<f64> {
    let (ax, ay) = (a.x - vertex.x, a.y - vertex.y);
    let (cx, cy) = (c.x - vertex.x, c.y - vertex.y);
    let na = ax.hypot(ay);
    let nc = cx.hypot(cy);
    if na == 0.0 || nc == 0.0 {
        return None;
    }
    let cos = ((ax * cx + ay * cy) / (na * nc)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lm(x: f64, y: f64) -> Landmark {
        Landmark {
            x,
            y,
            z: None,
            confidence: Some(0.9),
        }
    }

    fn frame(positions: &[(Joint, Landmark)]) -> PoseFrame {
        PoseFrame {
            frame_index: 0,
            timestamp_ms: 0.0,
            joint_positions: positions.iter().copied().collect(),
            joint_angles: None,
            confidence: Some(0.9),
        }
    }

    #[test]
    fn test_rotation_angle_convention() {
        let o = Point { x: 0.0, y: 0.0 };
        let right = rotation_angle(o, Point { x: 1.0, y: 0.0 }).unwrap();
        let down = rotation_angle(o, Point { x: 0.0, y: 1.0 }).unwrap();
        assert!((right - 90.0).abs() < 1e-9);
        assert!(down.abs() < 1e-9);
        assert!(rotation_angle(o, o).is_none());
    }

    #[test]
    fn test_angle_at_right_angle() {
        let a = angle_at(
            Point { x: 1.0, y: 0.0 },
            Point { x: 0.0, y: 0.0 },
            Point { x: 0.0, y: 1.0 },
        )
        .unwrap();
        assert!((a - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_lead_side_follows_handedness() {
        assert_eq!(Handedness::Right.lead(Limb::Wrist), Joint::LeftWrist);
        assert_eq!(Handedness::Right.rear(Limb::Wrist), Joint::RightWrist);
        assert_eq!(Handedness::Left.lead(Limb::Hip), Joint::RightHip);
    }

    #[test]
    fn test_angles_derived_from_positions() {
        let f = frame(&[
            (Joint::LeftHip, lm(0.6, 0.5)),
            (Joint::RightHip, lm(0.4, 0.5)),
            (Joint::LeftShoulder, lm(0.6, 0.3)),
            (Joint::RightShoulder, lm(0.4, 0.3)),
            (Joint::LeftWrist, lm(0.55, 0.4)),
            (Joint::RightWrist, lm(0.5, 0.4)),
        ]);
        let a = f.resolve_angles(Handedness::Right, &IngestConfig::default()).unwrap();
        assert!((a.pelvis - 90.0).abs() < 1e-9);
        assert!((a.torso - 90.0).abs() < 1e-9);
        assert!(a.hand_line.is_some());
        // No elbows, so neither arm angle.
        assert!(a.shoulder.is_none());
        assert!(a.elbow.is_none());
    }

    #[test]
    fn test_supplied_angles_win_and_gaps_are_filled() {
        let mut f = frame(&[
            (Joint::LeftWrist, lm(0.6, 0.4)),
            (Joint::RightWrist, lm(0.5, 0.4)),
        ]);
        f.joint_angles = Some(JointAngles {
            pelvis: 12.0,
            torso: 20.0,
            shoulder: Some(80.0),
            elbow: None,
            hand_line: None,
        });
        let a = f.resolve_angles(Handedness::Right, &IngestConfig::default()).unwrap();
        assert_eq!(a.pelvis, 12.0);
        assert_eq!(a.shoulder, Some(80.0));
        assert!((a.hand_line.unwrap() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_low_confidence_frame_contributes_no_positions() {
        let mut f = frame(&[
            (Joint::LeftHip, lm(0.6, 0.5)),
            (Joint::RightHip, lm(0.4, 0.5)),
            (Joint::LeftShoulder, lm(0.6, 0.3)),
            (Joint::RightShoulder, lm(0.4, 0.3)),
        ]);
        f.confidence = Some(0.1);
        let ingest = IngestConfig::default();
        assert!(f.resolve_angles(Handedness::Right, &ingest).is_none());
        assert_eq!(f.positions(Handedness::Right, 1.8, &ingest), FramePositions::default());
    }

    #[test]
    fn test_frame_json_with_optional_fields_missing() {
        let f: PoseFrame = serde_json::from_str(
            r#"{"frame_index": 3, "timestamp_ms": 100.0,
                "joint_positions": {"left_wrist": {"x": 0.5, "y": 0.4}}}"#,
        )
        .unwrap();
        assert_eq!(f.frame_index, 3);
        assert!(f.joint_angles.is_none());
        assert!(f.joint_positions[&Joint::LeftWrist].confidence.is_none());
    }
}
