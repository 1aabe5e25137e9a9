//! Segment energies, kinetic sequence and bat-speed estimate over the swing window.
//!
//! `KE = ½·m·v² + ½·I·ω²` per region, with ω in rad/s. Energy magnitudes depend on
//! the anthropometric model; only the ordering of region peaks is compared across
//! sessions.

use serde::Serialize;

use super::kinematics::{JointVelocities, KinematicSeries};
use super::window::SwingWindow;
use super::QualityFlag;
use crate::anthropometry::{AnthropometricModel, BatLever, MPH_PER_MPS};
use crate::config::PhysicsConfig;

/// Body regions from proximal to distal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    LowerBody,
    Torso,
    Arms,
    Bat,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::LowerBody, Region::Torso, Region::Arms, Region::Bat];

    pub fn name(self) -> &'static str {
        match self {
            Self::LowerBody => "lower_body",
            Self::Torso => "torso",
            Self::Arms => "arms",
            Self::Bat => "bat",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RegionEnergy {
    pub rotational_j: f64,
    pub translational_j: f64,
}

impl RegionEnergy {
    pub fn total(&self) -> f64 {
        self.rotational_j + self.translational_j
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnergySample {
    pub timestamp_ms: f64,
    pub lower_body: RegionEnergy,
    pub torso: RegionEnergy,
    pub arms: RegionEnergy,
    pub bat: RegionEnergy,
    /// Vertical part of the lower-body translational energy.
    pub lower_body_vertical_j: f64,
    /// Torso minus pelvis rotation relative to the window's first sample.
    pub separation_deg: f64,
}

impl EnergySample {
    pub fn region(&self, region: Region) -> &RegionEnergy {
        match region {
            Region::LowerBody => &self.lower_body,
            Region::Torso => &self.torso,
            Region::Arms => &self.arms,
            Region::Bat => &self.bat,
        }
    }

    pub fn rotational_j(&self) -> f64 {
        Region::ALL.iter().map(|&r| self.region(r).rotational_j).sum()
    }

    pub fn translational_j(&self) -> f64 {
        Region::ALL.iter().map(|&r| self.region(r).translational_j).sum()
    }

    /// Vertical share of the lower-body translational energy.
    pub fn vertical_share(&self) -> Option<f64> {
        let t = self.lower_body.translational_j;
        (t > 0.0).then(|| self.lower_body_vertical_j / t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentPeak {
    pub timestamp_ms: f64,
    pub energy_j: f64,
}

/// Energy peak per region. A region that never carried energy has no peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KineticSequence {
    pub lower_body: Option<SegmentPeak>,
    pub torso: Option<SegmentPeak>,
    pub arms: Option<SegmentPeak>,
    pub bat: Option<SegmentPeak>,
}

impl KineticSequence {
    pub fn peak(&self, region: Region) -> Option<SegmentPeak> {
        match region {
            Region::LowerBody => self.lower_body,
            Region::Torso => self.torso,
            Region::Arms => self.arms,
            Region::Bat => self.bat,
        }
    }

    /// Regions that peaked, in proximal-to-distal order.
    pub fn present(&self) -> Vec<(Region, SegmentPeak)> {
        Region::ALL
            .iter()
            .filter_map(|&r| self.peak(r).map(|p| (r, p)))
            .collect()
    }

    /// Adjacent present regions whose peaks run backwards in time.
    pub fn inversions(&self) -> usize {
        self.present()
            .windows(2)
            .filter(|w| w[1].1.timestamp_ms < w[0].1.timestamp_ms)
            .count()
    }

    pub fn proximal_to_distal(&self) -> bool {
        self.inversions() == 0
    }

    /// Position of `region` when present peaks are sorted by time (0 = first).
    pub fn rank(&self, region: Region) -> Option<usize> {
        let target = self.peak(region)?;
        let earlier = self
            .present()
            .iter()
            .filter(|(r, p)| {
                *r != region
                    && (p.timestamp_ms < target.timestamp_ms
                        || (p.timestamp_ms == target.timestamp_ms && *r < region))
            })
            .count();
        Some(earlier)
    }

    /// Sum of all region peak energies.
    pub fn total_peak_energy(&self) -> f64 {
        self.present().iter().map(|(_, p)| p.energy_j).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatSpeedEstimate {
    pub mps: f64,
    pub mph: f64,
    pub raw_mps: f64,
    pub capped: bool,
    pub timestamp_ms: f64,
    pub effective_radius_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhysicsSummary {
    pub energy_samples: Vec<EnergySample>,
    pub kinetic_sequence: KineticSequence,
    pub bat_speed: Option<BatSpeedEstimate>,
    pub peak_pelvis_dps: f64,
    pub peak_torso_dps: f64,
    pub peak_hand_line_dps: Option<f64>,
    /// Time-integrated energy over the window (J·s).
    pub rotational_integral: f64,
    pub translational_integral: f64,
    pub vertical_integral: f64,
}

impl PhysicsSummary {
    /// Rotational share of the integrated energy.
    pub fn rotation_ratio(&self) -> Option<f64> {
        let total = self.rotational_integral + self.translational_integral;
        (total > 0.0).then(|| self.rotational_integral / total)
    }
}

/// Per-athlete constants used for every sample.
struct BodyConstants {
    pelvis_inertia: f64,
    torso_inertia: f64,
    arms_inertia: f64,
    bat_inertia: f64,
    lower_mass: f64,
    upper_mass: f64,
    arms_mass: f64,
    bat_mass: f64,
}

impl BodyConstants {
    fn new(model: &AnthropometricModel) -> Self {
        Self {
            pelvis_inertia: model.pelvis_inertia(),
            torso_inertia: model.torso_inertia(),
            arms_inertia: 2.0 * model.arm_inertia_about_shoulder(),
            bat_inertia: model.bat_inertia(),
            lower_mass: model.lower_body_mass(),
            upper_mass: model.upper_body_mass(),
            arms_mass: model.arms_mass(),
            bat_mass: model.bat_mass_kg(),
        }
    }
}

fn rotational(inertia: f64, omega_dps: f64) -> f64 {
    let w = omega_dps.to_radians();
    0.5 * inertia * w * w
}

fn translational(mass: f64, speed_mps: f64) -> f64 {
    0.5 * mass * speed_mps * speed_mps
}

/// Replace a non-finite or negative energy with 0 and count it.
fn sanitize(value: f64, bad: &mut usize) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        *bad += 1;
        0.0
    }
}

fn energy_sample(
    v: &JointVelocities,
    separation_deg: f64,
    body: &BodyConstants,
    bad: &mut usize,
) -> EnergySample {
    let hands = v.mean_hand_mps().unwrap_or(0.0);
    let pelvis_lin = v.pelvis_linear;
    let mut region = |inertia: f64, omega: Option<f64>, mass: f64, speed: f64| RegionEnergy {
        rotational_j: sanitize(rotational(inertia, omega.unwrap_or(0.0)), bad),
        translational_j: sanitize(translational(mass, speed), bad),
    };

    let lower_body = region(
        body.pelvis_inertia,
        Some(v.pelvis_dps),
        body.lower_mass,
        pelvis_lin.map_or(0.0, |l| l.speed()),
    );
    let torso = region(
        body.torso_inertia,
        Some(v.torso_dps),
        body.upper_mass,
        v.shoulder_linear.map_or(0.0, |l| l.speed()),
    );
    let arms = region(body.arms_inertia, v.shoulder_dps, body.arms_mass, hands);
    let bat = region(body.bat_inertia, v.hand_line_dps, body.bat_mass, hands);

    EnergySample {
        timestamp_ms: v.timestamp_ms,
        lower_body,
        torso,
        arms,
        bat,
        lower_body_vertical_j: sanitize(
            translational(body.lower_mass, pelvis_lin.map_or(0.0, |l| l.vertical)),
            bad,
        ),
        separation_deg: if separation_deg.is_finite() {
            separation_deg
        } else {
            *bad += 1;
            0.0
        },
    }
}

/// Earliest maximum of one region's total energy.
fn region_peak(samples: &[EnergySample], region: Region) -> Option<SegmentPeak> {
    let mut best: Option<SegmentPeak> = None;
    for s in samples {
        let e = s.region(region).total();
        if e > 0.0 && best.is_none_or(|b| e > b.energy_j) {
            best = Some(SegmentPeak {
                timestamp_ms: s.timestamp_ms,
                energy_j: e,
            });
        }
    }
    best
}

/// Peak barrel speed inside the window, capped.
fn bat_speed(
    velocities: &[JointVelocities],
    lever: &BatLever,
    cfg: &PhysicsConfig,
    flags: &mut Vec<QualityFlag>,
) -> Option<BatSpeedEstimate> {
    let mut best: Option<(f64, f64)> = None;
    for v in velocities {
        if let Some(mps) = v.bat_mps.filter(|x| x.is_finite()) {
            if best.is_none_or(|(_, b)| mps > b) {
                best = Some((v.timestamp_ms, mps));
            }
        }
    }
    let (timestamp_ms, raw_mps) = best?;

    let cap_mps = cfg.bat_speed_cap_mph / MPH_PER_MPS;
    let capped = raw_mps > cap_mps;
    let mps = raw_mps.min(cap_mps);
    if capped {
        log::warn!(
            "Bat speed {:.1} mph capped at {:.1} mph",
            raw_mps * MPH_PER_MPS,
            cfg.bat_speed_cap_mph
        );
        flags.push(QualityFlag::Clamped {
            quantity: "bat_speed_mps".into(),
            raw: Some(raw_mps),
            limit: cap_mps,
        });
    }

    Some(BatSpeedEstimate {
        mps,
        mph: mps * MPH_PER_MPS,
        raw_mps,
        capped,
        timestamp_ms,
        effective_radius_m: lever.effective_radius_m,
    })
}

/// Derive energies, the kinetic sequence and bat speed for the window.
pub fn compute(
    series: &KinematicSeries,
    window: &SwingWindow,
    model: &AnthropometricModel,
    lever: &BatLever,
    cfg: &PhysicsConfig,
    flags: &mut Vec<QualityFlag>,
) -> PhysicsSummary {
    let body = BodyConstants::new(model);
    let velocities = series.velocities_between(window.start_index, window.end_index);

    let stance = &series.samples[window.start_index].angles;
    let stance_offset = stance.torso - stance.pelvis;

    let mut bad = 0;
    // velocities[k] ends at samples[start + k + 1]; look the angles up by frame.
    let first_sample = window.start_index + 1;
    let energy_samples: Vec<EnergySample> = velocities
        .iter()
        .enumerate()
        .map(|(k, v)| {
            let a = &series.samples[first_sample + k].angles;
            let separation = (a.torso - a.pelvis) - stance_offset;
            energy_sample(v, separation, &body, &mut bad)
        })
        .collect();

    if bad > 0 {
        log::warn!("Replaced {} non-finite energy terms with 0", bad);
        flags.push(QualityFlag::NonFinite {
            stage: "physics".into(),
            count: bad,
        });
    }

    let kinetic_sequence = KineticSequence {
        lower_body: region_peak(&energy_samples, Region::LowerBody),
        torso: region_peak(&energy_samples, Region::Torso),
        arms: region_peak(&energy_samples, Region::Arms),
        bat: region_peak(&energy_samples, Region::Bat),
    };

    let max_abs = |f: fn(&JointVelocities) -> Option<f64>| {
        velocities
            .iter()
            .filter_map(f)
            .filter(|x| x.is_finite())
            .map(f64::abs)
            .reduce(f64::max)
    };
    let peak_pelvis_dps = max_abs(|v| Some(v.pelvis_dps)).unwrap_or(0.0);
    let peak_torso_dps = max_abs(|v| Some(v.torso_dps)).unwrap_or(0.0);
    let peak_hand_line_dps = max_abs(|v| v.hand_line_dps);

    // Each sample weighted by the interval it closes.
    let mut rotational_integral = 0.0;
    let mut translational_integral = 0.0;
    let mut vertical_integral = 0.0;
    let mut previous_ms = series.samples[first_sample - 1].timestamp_ms;
    for s in &energy_samples {
        let dt = (s.timestamp_ms - previous_ms) / 1000.0;
        rotational_integral += s.rotational_j() * dt;
        translational_integral += s.translational_j() * dt;
        vertical_integral += s.lower_body_vertical_j * dt;
        previous_ms = s.timestamp_ms;
    }

    let bat_speed = bat_speed(velocities, lever, cfg, flags);

    log::debug!(
        "Physics: {} energy samples, sequence {:?}, {} inversions",
        energy_samples.len(),
        kinetic_sequence
            .present()
            .iter()
            .map(|(r, _)| r.name())
            .collect::<Vec<_>>(),
        kinetic_sequence.inversions()
    );
    if let Some(b) = &bat_speed {
        log::info!("Bat speed {:.1} mph at {:.0} ms", b.mph, b.timestamp_ms);
    }

    PhysicsSummary {
        energy_samples,
        kinetic_sequence,
        bat_speed,
        peak_pelvis_dps,
        peak_torso_dps,
        peak_hand_line_dps,
        rotational_integral,
        translational_integral,
        vertical_integral,
    }
}
