use serde::Serialize;

use super::QualityFlag;
use super::events::{SwingEvents, TempoAssessment};
use super::physics::{PhysicsSummary, Region};
use crate::anthropometry::{AthleteProfile, BatSpeedCapacity};
use crate::config::{Band, EventConfig, ScoringConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorProfile {
    RotationDominant,
    TranslationDominant,
    VerticalDominant,
    Developing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotorProfileAssessment {
    pub profile: MotorProfile,
    pub confidence: f64,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBundle {
    pub tempo: TempoAssessment,
    pub ground_score: f64,
    pub engine_score: f64,
    pub weapon_score: f64,
    /// Bat speed as a share of the athlete's capacity. None without a bat-speed estimate.
    pub transfer_ratio_pct: Option<f64>,
    pub sequence_score: f64,
    pub overall_score: f64,
    pub bat_speed_capacity_mph: f64,
    /// Predicted ball exit speed. None without a bat-speed estimate.
    pub exit_velocity: Option<ExitVelocityPrediction>,
    pub krs: KineticRealization,
    pub motor_profile: MotorProfileAssessment,
}

/// How squarely the barrel is expected to meet the ball.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactQuality {
    Elite,
    Good,
    Average,
    BelowAverage,
    Poor,
}

impl ContactQuality {
    /// Graded from the weapon score: barrel delivery and arm→bat timing.
    pub fn from_weapon_score(weapon: f64) -> Self {
        if weapon >= 85.0 {
            Self::Elite
        } else if weapon >= 70.0 {
            Self::Good
        } else if weapon >= 55.0 {
            Self::Average
        } else if weapon >= 40.0 {
            Self::BelowAverage
        } else {
            Self::Poor
        }
    }

    /// Exit speed per unit of bat speed.
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Elite => 1.50,
            Self::Good => 1.45,
            Self::Average => 1.40,
            Self::BelowAverage => 1.35,
            Self::Poor => 1.30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExitVelocityPrediction {
    pub contact_quality: ContactQuality,
    pub multiplier: f64,
    /// Ceiling for a hitter of this height and weight.
    pub size_max_mph: f64,
    pub average_mph: f64,
    pub p90_mph: f64,
    pub pct_of_max_average: f64,
    pub pct_of_max_p90: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KrsLevel {
    Foundation,
    Building,
    Developing,
    Advanced,
    Elite,
}

impl KrsLevel {
    const BANDS: [(KrsLevel, f64); 4] = [
        (KrsLevel::Foundation, 40.0),
        (KrsLevel::Building, 60.0),
        (KrsLevel::Developing, 75.0),
        (KrsLevel::Advanced, 90.0),
    ];

    /// Level for a 0-100 score and the points still needed to reach the next one.
    pub fn from_score(krs: f64) -> (Self, f64) {
        Self::BANDS
            .iter()
            .find(|(_, upper)| krs < *upper)
            .map_or((Self::Elite, 0.0), |&(level, upper)| (level, upper - krs))
    }
}

/// Kinetic realization: power created by the body and how much of it reaches the bat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KineticRealization {
    pub creation_score: f64,
    pub transfer_score: f64,
    pub total: f64,
    pub level: KrsLevel,
    pub points_to_next_level: f64,
}

/// Compute every composite score for one swing.
pub fn score(
    events: &SwingEvents,
    physics: &PhysicsSummary,
    capacity: &BatSpeedCapacity,
    athlete: &AthleteProfile,
    event_cfg: &EventConfig,
    cfg: &ScoringConfig,
    flags: &mut Vec<QualityFlag>,
) -> ScoreBundle {
    let tempo = events.tempo(event_cfg, flags);
    let mut bad = 0;

    let ground_score = ground_score(physics, cfg, &mut bad);
    let (engine_score, separation_timing) = engine_score(events, physics, cfg, &mut bad);
    let transfer_ratio = transfer_ratio(physics, capacity, &mut bad);
    let weapon_score = weapon_score(transfer_ratio, physics, cfg);

    let transfer_ratio_pct = transfer_ratio.map(|r| {
        let pct = r * 100.0;
        let clamped = pct.clamp(0.0, cfg.transfer_ratio_max_pct);
        if clamped != pct {
            log::warn!("Transfer ratio {:.0}% clamped to {:.0}%", pct, clamped);
            flags.push(QualityFlag::Clamped {
                quantity: "transfer_ratio_pct".into(),
                raw: Some(pct),
                limit: clamped,
            });
        }
        clamped
    });

    let inversions = physics.kinetic_sequence.inversions();
    let sequence_score = (100.0 - 25.0 * inversions as f64).clamp(0.0, 100.0);
    let overall_score = ((ground_score + engine_score + weapon_score) / 3.0).clamp(0.0, 100.0);
    let motor_profile = classify_motor_profile(physics, ground_score, engine_score, cfg);
    let exit_velocity = physics
        .bat_speed
        .as_ref()
        .map(|b| predict_exit_velocity(b.mph, weapon_score, athlete));
    let krs = kinetic_realization(
        ground_score,
        engine_score,
        weapon_score,
        sequence_score,
        separation_timing,
        athlete,
    );

    if bad > 0 {
        log::warn!("Treated {} non-finite scoring inputs as 0", bad);
        flags.push(QualityFlag::NonFinite {
            stage: "scoring".into(),
            count: bad,
        });
    }

    log::info!(
        "Scores: ground {:.0}, engine {:.0}, weapon {:.0}, overall {:.0} ({:?})",
        ground_score,
        engine_score,
        weapon_score,
        overall_score,
        motor_profile.profile
    );

    ScoreBundle {
        tempo,
        ground_score,
        engine_score,
        weapon_score,
        transfer_ratio_pct,
        sequence_score,
        overall_score,
        bat_speed_capacity_mph: capacity.bat_speed_mph,
        exit_velocity,
        krs,
        motor_profile,
    }
}

fn finite_or_zero(value: f64, bad: &mut usize) -> f64 {
    if value.is_finite() {
        value
    } else {
        *bad += 1;
        0.0
    }
}

// ── Ground Score (0-100) ──────────────────────────────────────────────
// How well the lower body starts the swing.
fn ground_score(p: &PhysicsSummary, cfg: &ScoringConfig, bad: &mut usize) -> f64 {
    let seq = &p.kinetic_sequence;

    // Sequencing (40 pts): lower body peaks first among the regions that peaked
    let sequencing = match seq.rank(Region::LowerBody) {
        Some(rank) => (1.0 - rank as f64 / 3.0).clamp(0.0, 1.0),
        None => 0.0,
    };
    let sequencing_contrib = sequencing * 40.0;

    // Lower-body energy share (35 pts): share of summed region peaks
    let total = finite_or_zero(seq.total_peak_energy(), bad);
    let lower = seq.lower_body.map_or(0.0, |pk| finite_or_zero(pk.energy_j, bad));
    let share = if total > 0.0 { lower / total } else { 0.0 };
    let share_norm = (share / cfg.target_lower_share).clamp(0.0, 1.0);
    let share_contrib = share_norm * 35.0;

    // Pelvis velocity (25 pts): full credit at 1.2× reference
    let pelvis = finite_or_zero(p.peak_pelvis_dps, bad);
    let pelvis_norm = (pelvis / (cfg.reference_pelvis_velocity_dps * 1.2)).clamp(0.0, 1.0);
    let pelvis_contrib = pelvis_norm * 25.0;

    (sequencing_contrib + share_contrib + pelvis_contrib).clamp(0.0, 100.0)
}

// ── Engine Score (0-100) ──────────────────────────────────────────────
// Hip–shoulder separation: when the torso follows the pelvis, and how far apart they get.
/// Returns the score and the separation-timing factor it was built from.
fn engine_score(
    e: &SwingEvents,
    p: &PhysicsSummary,
    cfg: &ScoringConfig,
    bad: &mut usize,
) -> (f64, f64) {
    let seq = &p.kinetic_sequence;

    // Separation timing (60 pts): torso peak after lower-body peak
    let timing = match (seq.lower_body, seq.torso) {
        (Some(lower), Some(torso)) => separation_timing_factor(
            finite_or_zero(torso.timestamp_ms - lower.timestamp_ms, bad),
            cfg.optimal_separation_ms,
            cfg.wide_separation_ms,
            cfg.timing_floor,
        ),
        _ => cfg.timing_floor,
    };
    let timing_contrib = timing * 60.0;

    // Separation magnitude (40 pts): largest torso/pelvis gap between load and contact
    let max_separation = p
        .energy_samples
        .iter()
        .filter(|s| s.timestamp_ms >= e.load_ms && s.timestamp_ms <= e.contact_ms)
        .map(|s| s.separation_deg.abs())
        .fold(0.0, f64::max);
    let magnitude_norm = ((max_separation - cfg.min_separation_deg)
        / (cfg.target_separation_deg - cfg.min_separation_deg))
        .clamp(0.0, 1.0);
    let magnitude_contrib = magnitude_norm * 40.0;

    ((timing_contrib + magnitude_contrib).clamp(0.0, 100.0), timing)
}

/// 1.0 inside `optimal`, falling linearly to 0.5 at the edges of `wide`, then decaying
/// over one more `wide` width towards `floor`. Never below `floor`.
pub fn separation_timing_factor(gap_ms: f64, optimal: Band, wide: Band, floor: f64) -> f64 {
    let factor = if optimal.contains(gap_ms) {
        1.0
    } else if gap_ms < optimal.low && gap_ms >= wide.low {
        let span = (optimal.low - wide.low).max(f64::EPSILON);
        0.5 + 0.5 * (gap_ms - wide.low) / span
    } else if gap_ms > optimal.high && gap_ms <= wide.high {
        let span = (wide.high - optimal.high).max(f64::EPSILON);
        1.0 - 0.5 * (gap_ms - optimal.high) / span
    } else {
        let beyond = if gap_ms < wide.low {
            wide.low - gap_ms
        } else {
            gap_ms - wide.high
        };
        0.5 - 0.5 * beyond / wide.width().max(f64::EPSILON)
    };
    factor.clamp(floor, 1.0)
}

// ── Weapon Score (0-100) ──────────────────────────────────────────────
// How much of the body's capacity reaches the barrel, and whether the bat whips last.
fn weapon_score(transfer_ratio: Option<f64>, p: &PhysicsSummary, cfg: &ScoringConfig) -> f64 {
    let seq = &p.kinetic_sequence;

    // Transfer efficiency (70 pts): 50% of capacity = 0, 100% = full
    let transfer_norm = transfer_ratio.map_or(0.0, |r| ((r - 0.5) / 0.5).clamp(0.0, 1.0));
    let transfer_contrib = transfer_norm * 70.0;

    // Arm→bat timing (30 pts): bat peaks at or just after the arms
    let timing = match (seq.arms, seq.bat) {
        (Some(arms), Some(bat)) => {
            let gap = bat.timestamp_ms - arms.timestamp_ms;
            if gap < 0.0 {
                0.0
            } else if gap <= cfg.arm_bat_gap_max_ms {
                1.0
            } else {
                (1.0 - (gap - cfg.arm_bat_gap_max_ms) / cfg.arm_bat_gap_max_ms).max(0.0)
            }
        }
        // No shoulder channel: neither credit nor penalty for the arms.
        (None, Some(_)) => 0.5,
        _ => 0.0,
    };
    let timing_contrib = timing * 30.0;

    (transfer_contrib + timing_contrib).clamp(0.0, 100.0)
}

fn transfer_ratio(p: &PhysicsSummary, capacity: &BatSpeedCapacity, bad: &mut usize) -> Option<f64> {
    let bat = p.bat_speed.as_ref()?;
    if capacity.bat_speed_mph <= 0.0 {
        return None;
    }
    Some(finite_or_zero(bat.mph / capacity.bat_speed_mph, bad))
}

// ── Exit Velocity ─────────────────────────────────────────────────────
// Bat speed times a contact multiplier, capped by what hitters of this size reach.

/// Statcast hitters: (height in, weight lb, max exit mph, average exit mph).
const SIZE_BENCHMARKS: [(f64, f64, f64, f64); 12] = [
    (66.0, 167.0, 112.3, 86.7),
    (68.0, 180.0, 111.8, 87.1),
    (69.0, 180.0, 113.2, 87.5),
    (70.0, 185.0, 114.5, 88.3),
    (71.0, 195.0, 116.8, 89.4),
    (72.0, 200.0, 117.5, 89.8),
    (73.0, 205.0, 118.9, 90.5),
    (74.0, 215.0, 119.8, 91.2),
    (75.0, 220.0, 121.1, 92.0),
    (76.0, 230.0, 121.8, 92.5),
    (77.0, 240.0, 122.4, 93.1),
    (78.0, 250.0, 121.9, 92.8),
];
const BENCHMARK_NEIGHBOURS: usize = 4;
/// An inch of height counts as much as this many pounds when matching hitters.
const HEIGHT_WEIGHTING: f64 = 5.0;
const P90_FACTOR: f64 = 1.06;

/// Maximum exit speed for a hitter's size, inverse-distance weighted over the nearest benchmarks.
pub fn size_max_exit_velocity(height_inches: f64, weight_lbs: f64) -> f64 {
    let mut neighbours: Vec<(f64, f64, f64)> = SIZE_BENCHMARKS
        .iter()
        .map(|&(h, w, max_ev, _)| {
            let distance = ((h - height_inches) * HEIGHT_WEIGHTING).hypot(w - weight_lbs);
            (distance, w, max_ev)
        })
        .collect();
    neighbours.sort_by(|a, b| a.0.total_cmp(&b.0));
    neighbours.truncate(BENCHMARK_NEIGHBOURS);

    if let Some(&(_, _, max_ev)) = neighbours.iter().find(|(d, _, _)| *d < 0.1) {
        return max_ev;
    }

    let (weighted, total) = neighbours.iter().fold((0.0, 0.0), |(sum, total), &(d, _, max_ev)| {
        let weight = 1.0 / (d * d + 0.1);
        (sum + max_ev * weight, total + weight)
    });
    let mut max_ev = weighted / total;

    // Heavy for their height: up to 3% off, 1% per 5 lb over the neighbours.
    let mean_weight =
        neighbours.iter().map(|&(_, w, _)| w).sum::<f64>() / neighbours.len() as f64;
    if weight_lbs > mean_weight + 5.0 {
        max_ev *= 1.0 - (0.01 * (weight_lbs - mean_weight) / 5.0).min(0.03);
    }
    max_ev
}

pub fn predict_exit_velocity(
    bat_speed_mph: f64,
    weapon_score: f64,
    athlete: &AthleteProfile,
) -> ExitVelocityPrediction {
    let contact_quality = ContactQuality::from_weapon_score(weapon_score);
    let multiplier = contact_quality.multiplier();
    let size_max_mph = size_max_exit_velocity(athlete.height_inches, athlete.weight_lbs);

    let average_mph = (bat_speed_mph * multiplier).min(size_max_mph);
    let p90_mph = (average_mph * P90_FACTOR).min(size_max_mph);

    ExitVelocityPrediction {
        contact_quality,
        multiplier,
        size_max_mph,
        average_mph,
        p90_mph,
        pct_of_max_average: average_mph / size_max_mph * 100.0,
        pct_of_max_p90: p90_mph / size_max_mph * 100.0,
    }
}

// ── KRS (0-100) ───────────────────────────────────────────────────────
// Creation: ground 40%, engine 40%, body size 20%.
// Transfer: sequence 35%, ground 25%, separation timing 25%, weapon 15%.
const REFERENCE_HEIGHT_INCHES: f64 = 72.0;
const REFERENCE_WEIGHT_LBS: f64 = 185.0;

fn kinetic_realization(
    ground: f64,
    engine: f64,
    weapon: f64,
    sequence: f64,
    separation_timing: f64,
    athlete: &AthleteProfile,
) -> KineticRealization {
    let size = (athlete.weight_lbs / REFERENCE_WEIGHT_LBS
        + athlete.height_inches / REFERENCE_HEIGHT_INCHES)
        / 2.0;
    let size_contrib = (size * 100.0).min(100.0) * 0.2;
    let creation_score = (ground * 0.4 + engine * 0.4 + size_contrib).clamp(0.0, 100.0);

    let transfer_score =
        (sequence * 0.35 + ground * 0.25 + separation_timing * 100.0 * 0.25 + weapon * 0.15)
            .clamp(0.0, 100.0);

    let total = (creation_score + transfer_score) / 2.0;
    let (level, points_to_next_level) = KrsLevel::from_score(total);
    KineticRealization {
        creation_score,
        transfer_score,
        total,
        level,
        points_to_next_level,
    }
}

// ── Motor Profile ─────────────────────────────────────────────────────
// Energy split decides when there is energy; otherwise the engine/ground balance.
fn classify_motor_profile(
    p: &PhysicsSummary,
    ground: f64,
    engine: f64,
    cfg: &ScoringConfig,
) -> MotorProfileAssessment {
    if let Some(rotation) = p.rotation_ratio().filter(|r| r.is_finite()) {
        let translation = 1.0 - rotation;
        let vertical = if p.translational_integral > 0.0 {
            p.vertical_integral / p.translational_integral
        } else {
            0.0
        };

        if translation >= cfg.min_translation_share && vertical >= cfg.vertical_dominant_share {
            let past = (vertical - cfg.vertical_dominant_share)
                / (1.0 - cfg.vertical_dominant_share).max(f64::EPSILON);
            return assessment(
                MotorProfile::VerticalDominant,
                0.5 + 0.5 * past,
                format!(
                    "{:.0}% of translational energy is vertical ({:.0}% translational overall)",
                    vertical * 100.0,
                    translation * 100.0
                ),
            );
        }
        if rotation >= cfg.rotation_dominant_ratio {
            let past = (rotation - cfg.rotation_dominant_ratio)
                / (1.0 - cfg.rotation_dominant_ratio).max(f64::EPSILON);
            return assessment(
                MotorProfile::RotationDominant,
                0.5 + 0.5 * past,
                format!("{:.0}% of energy is rotational", rotation * 100.0),
            );
        }
        if rotation <= cfg.translation_dominant_ratio {
            let past = (cfg.translation_dominant_ratio - rotation)
                / cfg.translation_dominant_ratio.max(f64::EPSILON);
            return assessment(
                MotorProfile::TranslationDominant,
                0.5 + 0.5 * past,
                format!("only {:.0}% of energy is rotational", rotation * 100.0),
            );
        }
        let middle = (cfg.rotation_dominant_ratio + cfg.translation_dominant_ratio) / 2.0;
        let half = (cfg.rotation_dominant_ratio - cfg.translation_dominant_ratio) / 2.0;
        return assessment(
            MotorProfile::Developing,
            0.3 + 0.4 * (1.0 - (rotation - middle).abs() / half.max(f64::EPSILON)),
            format!(
                "{:.0}% rotational energy sits between the rotation and translation cutoffs",
                rotation * 100.0
            ),
        );
    }

    let diff = engine - ground;
    let cutoff = cfg.score_gap_cutoff;
    let headroom = (100.0 - cutoff).max(f64::EPSILON);
    if diff >= cutoff {
        assessment(
            MotorProfile::RotationDominant,
            0.5 + 0.5 * (diff - cutoff) / headroom,
            format!("engine score leads ground score by {:.0}", diff),
        )
    } else if -diff >= cutoff {
        assessment(
            MotorProfile::TranslationDominant,
            0.5 + 0.5 * (-diff - cutoff) / headroom,
            format!("ground score leads engine score by {:.0}", -diff),
        )
    } else {
        assessment(
            MotorProfile::Developing,
            0.3 + 0.4 * (1.0 - diff.abs() / cutoff.max(f64::EPSILON)),
            format!("engine and ground scores within {:.0} points", cutoff),
        )
    }
}

fn assessment(profile: MotorProfile, confidence: f64, rationale: String) -> MotorProfileAssessment {
    MotorProfileAssessment {
        profile,
        confidence: if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        },
        rationale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::physics::{BatSpeedEstimate, EnergySample, KineticSequence, SegmentPeak};
    use crate::anthropometry::MPH_PER_MPS;

    fn peak(t: f64, e: f64) -> Option<SegmentPeak> {
        Some(SegmentPeak {
            timestamp_ms: t,
            energy_j: e,
        })
    }

    fn capacity(mph: f64) -> BatSpeedCapacity {
        BatSpeedCapacity {
            bat_speed_mph: mph,
            weight_factor: 1.0,
            arm_factor: 1.0,
            age_factor: 1.0,
            bat_factor: 1.0,
            height_calibration: 1.0,
        }
    }

    /// 6'0", 200 lb: sits exactly on a size benchmark.
    fn athlete() -> AthleteProfile {
        AthleteProfile {
            height_inches: 72.0,
            weight_lbs: 200.0,
            ..crate::fixtures::athlete()
        }
    }

    fn events() -> SwingEvents {
        SwingEvents {
            stance_ms: 0.0,
            load_ms: 300.0,
            foot_down_ms: 850.0,
            contact_ms: 1000.0,
            follow_through_ms: 2000.0,
            corrections: Vec::new(),
        }
    }

    /// A clean swing: proximal-to-distal, 70 ms hip-shoulder gap, 40° separation.
    fn base_physics() -> PhysicsSummary {
        let separation = |t: f64, deg: f64| EnergySample {
            timestamp_ms: t,
            lower_body: Default::default(),
            torso: Default::default(),
            arms: Default::default(),
            bat: Default::default(),
            lower_body_vertical_j: 0.0,
            separation_deg: deg,
        };
        PhysicsSummary {
            energy_samples: vec![separation(500.0, -10.0), separation(900.0, -40.0)],
            kinetic_sequence: KineticSequence {
                lower_body: peak(880.0, 60.0),
                torso: peak(950.0, 100.0),
                arms: peak(980.0, 60.0),
                bat: peak(1000.0, 20.0),
            },
            bat_speed: Some(BatSpeedEstimate {
                mps: 70.0 / MPH_PER_MPS,
                mph: 70.0,
                raw_mps: 70.0 / MPH_PER_MPS,
                capped: false,
                timestamp_ms: 1000.0,
                effective_radius_m: 0.8,
            }),
            peak_pelvis_dps: 720.0,
            peak_torso_dps: 900.0,
            peak_hand_line_dps: Some(2000.0),
            rotational_integral: 90.0,
            translational_integral: 10.0,
            vertical_integral: 2.0,
        }
    }

    fn run(p: &PhysicsSummary, cap: f64) -> (ScoreBundle, Vec<QualityFlag>) {
        let mut flags = Vec::new();
        let bundle = score(
            &events(),
            p,
            &capacity(cap),
            &athlete(),
            &EventConfig::default(),
            &ScoringConfig::default(),
            &mut flags,
        );
        (bundle, flags)
    }

    #[test]
    fn test_timing_factor_bands() {
        let opt = Band::new(40.0, 120.0);
        let wide = Band::new(0.0, 200.0);
        assert_eq!(separation_timing_factor(80.0, opt, wide, 0.2), 1.0);
        assert_eq!(separation_timing_factor(40.0, opt, wide, 0.2), 1.0);
        assert!((separation_timing_factor(0.0, opt, wide, 0.2) - 0.5).abs() < 1e-12);
        assert!((separation_timing_factor(20.0, opt, wide, 0.2) - 0.75).abs() < 1e-12);
        assert!((separation_timing_factor(160.0, opt, wide, 0.2) - 0.75).abs() < 1e-12);
        assert!((separation_timing_factor(-100.0, opt, wide, 0.2) - 0.25).abs() < 1e-12);
        // Far outside: the floor, never zero.
        assert_eq!(separation_timing_factor(5000.0, opt, wide, 0.2), 0.2);
        assert_eq!(separation_timing_factor(-5000.0, opt, wide, 0.2), 0.2);
    }

    #[test]
    fn test_clean_swing_scores_high() {
        let (b, flags) = run(&base_physics(), 72.0);
        assert!(b.engine_score > 99.0, "engine={}", b.engine_score);
        assert!(b.ground_score > 80.0, "ground={}", b.ground_score);
        assert!(b.weapon_score > 80.0, "weapon={}", b.weapon_score);
        assert_eq!(b.sequence_score, 100.0);
        let overall = (b.ground_score + b.engine_score + b.weapon_score) / 3.0;
        assert!((b.overall_score - overall).abs() < 1e-9);
        assert!(flags.is_empty(), "{flags:?}");
    }

    #[test]
    fn test_late_lower_body_loses_sequencing() {
        let mut p = base_physics();
        p.kinetic_sequence.lower_body = peak(1100.0, 60.0);
        let (late, _) = run(&p, 72.0);
        let (clean, _) = run(&base_physics(), 72.0);
        assert!(late.ground_score < clean.ground_score - 30.0);
        assert!(late.sequence_score < 100.0);
        // Torso before lower body: separation timing collapses to the floor region.
        assert!(late.engine_score < clean.engine_score);
    }

    #[test]
    fn test_bat_before_arms_scores_no_arm_timing() {
        let mut p = base_physics();
        p.kinetic_sequence.bat = peak(950.0, 20.0);
        let (b, _) = run(&p, 72.0);
        let (clean, _) = run(&base_physics(), 72.0);
        assert!((clean.weapon_score - b.weapon_score - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_transfer_ratio_clamped_and_flagged() {
        let (b, flags) = run(&base_physics(), 20.0);
        assert_eq!(b.transfer_ratio_pct, Some(150.0));
        assert!(flags.iter().any(
            |f| matches!(f, QualityFlag::Clamped { quantity, .. } if quantity == "transfer_ratio_pct")
        ));
        assert!(b.weapon_score <= 100.0);
    }

    #[test]
    fn test_no_bat_speed_means_no_transfer() {
        let mut p = base_physics();
        p.bat_speed = None;
        let (b, _) = run(&p, 72.0);
        assert_eq!(b.transfer_ratio_pct, None);
        assert!(b.weapon_score <= 30.0);
    }

    #[test]
    fn test_sequence_score_floor() {
        let mut p = base_physics();
        p.kinetic_sequence = KineticSequence {
            lower_body: peak(400.0, 1.0),
            torso: peak(300.0, 1.0),
            arms: peak(200.0, 1.0),
            bat: peak(100.0, 1.0),
        };
        let (b, _) = run(&p, 72.0);
        assert_eq!(b.sequence_score, 25.0);
        assert!((0.0..=100.0).contains(&b.ground_score));
    }

    #[test]
    fn test_motor_profile_energy_path() {
        let (b, _) = run(&base_physics(), 72.0);
        assert_eq!(b.motor_profile.profile, MotorProfile::RotationDominant);
        assert!((b.motor_profile.confidence - 0.75).abs() < 1e-9);

        let mut p = base_physics();
        p.rotational_integral = 50.0;
        p.translational_integral = 50.0;
        p.vertical_integral = 10.0;
        let (b, _) = run(&p, 72.0);
        assert_eq!(b.motor_profile.profile, MotorProfile::TranslationDominant);

        p.vertical_integral = 40.0;
        let (b, _) = run(&p, 72.0);
        assert_eq!(b.motor_profile.profile, MotorProfile::VerticalDominant);

        p.rotational_integral = 72.5;
        p.translational_integral = 27.5;
        p.vertical_integral = 0.0;
        let (b, _) = run(&p, 72.0);
        assert_eq!(b.motor_profile.profile, MotorProfile::Developing);
        assert!((0.0..=1.0).contains(&b.motor_profile.confidence));
    }

    #[test]
    fn test_motor_profile_score_path_without_energy() {
        let mut p = base_physics();
        p.rotational_integral = 0.0;
        p.translational_integral = 0.0;
        p.vertical_integral = 0.0;
        // Strong engine, weak ground.
        p.kinetic_sequence.lower_body = None;
        p.peak_pelvis_dps = 0.0;
        let (b, _) = run(&p, 72.0);
        assert!(b.engine_score - b.ground_score >= 15.0);
        assert_eq!(b.motor_profile.profile, MotorProfile::RotationDominant);
        assert!(b.motor_profile.rationale.contains("engine"));
    }

    #[test]
    fn test_non_finite_inputs_become_zero() {
        let mut p = base_physics();
        p.peak_pelvis_dps = f64::NAN;
        let (b, flags) = run(&p, 72.0);
        assert!(b.ground_score.is_finite());
        assert!(flags
            .iter()
            .any(|f| matches!(f, QualityFlag::NonFinite { count: 1, .. })));
    }

    #[test]
    fn test_size_max_exit_velocity() {
        // Exact benchmark match returns that hitter's max.
        assert_eq!(size_max_exit_velocity(72.0, 200.0), 117.5);
        // Between benchmarks: bounded by the neighbours.
        let between = size_max_exit_velocity(72.5, 202.0);
        assert!(between > 116.0 && between < 119.5, "{between}");
        // Short and heavy: nearest hitters are 75"-78" (max 121.1-122.4 mph), then the
        // 3% heavy-for-height penalty pulls the result below all of them.
        let heavy = size_max_exit_velocity(68.0, 260.0);
        assert!(heavy < 121.1 && heavy >= 121.1 * 0.97, "heavy={heavy}");
    }

    #[test]
    fn test_exit_velocity_from_bat_speed() {
        let ev = predict_exit_velocity(60.0, 60.0, &athlete());
        assert_eq!(ev.contact_quality, ContactQuality::Average);
        assert!((ev.average_mph - 84.0).abs() < 1e-9);
        assert!((ev.p90_mph - 84.0 * 1.06).abs() < 1e-9);
        assert!((ev.pct_of_max_average - 84.0 / 117.5 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_exit_velocity_capped_by_size() {
        let ev = predict_exit_velocity(90.0, 95.0, &athlete());
        assert_eq!(ev.contact_quality, ContactQuality::Elite);
        assert_eq!(ev.average_mph, 117.5);
        assert_eq!(ev.p90_mph, 117.5);
        assert_eq!(ev.pct_of_max_p90, 100.0);
    }

    #[test]
    fn test_contact_quality_grades() {
        assert_eq!(ContactQuality::from_weapon_score(90.0), ContactQuality::Elite);
        assert_eq!(ContactQuality::from_weapon_score(70.0), ContactQuality::Good);
        assert_eq!(ContactQuality::from_weapon_score(54.9), ContactQuality::BelowAverage);
        assert_eq!(ContactQuality::from_weapon_score(10.0), ContactQuality::Poor);
    }

    #[test]
    fn test_krs_levels() {
        assert_eq!(KrsLevel::from_score(0.0), (KrsLevel::Foundation, 40.0));
        assert_eq!(KrsLevel::from_score(39.5), (KrsLevel::Foundation, 0.5));
        assert_eq!(KrsLevel::from_score(40.0), (KrsLevel::Building, 20.0));
        assert_eq!(KrsLevel::from_score(74.0), (KrsLevel::Developing, 1.0));
        assert_eq!(KrsLevel::from_score(75.0), (KrsLevel::Advanced, 15.0));
        assert_eq!(KrsLevel::from_score(90.0), (KrsLevel::Elite, 0.0));
        assert_eq!(KrsLevel::from_score(100.0), (KrsLevel::Elite, 0.0));
    }

    #[test]
    fn test_krs_composite() {
        let (b, _) = run(&base_physics(), 72.0);
        let size = (200.0 / 185.0 + 1.0) / 2.0;
        let creation =
            b.ground_score * 0.4 + b.engine_score * 0.4 + (size * 100.0_f64).min(100.0) * 0.2;
        // Clean swing: sequence 100, separation timing fully credited.
        let transfer = 100.0 * 0.35 + b.ground_score * 0.25 + 100.0 * 0.25 + b.weapon_score * 0.15;
        assert!((b.krs.creation_score - creation).abs() < 1e-9);
        assert!((b.krs.transfer_score - transfer).abs() < 1e-9);
        assert!((b.krs.total - (creation + transfer) / 2.0).abs() < 1e-9);
        assert_eq!(b.krs.level, KrsLevel::from_score(b.krs.total).0);
        assert!(b.exit_velocity.is_some());

        let mut p = base_physics();
        p.bat_speed = None;
        let (b, _) = run(&p, 72.0);
        assert!(b.exit_velocity.is_none());
    }
}
