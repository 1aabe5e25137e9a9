//! Rigid-body anthropometric model.
//!
//! Segment parameters follow de Leva (1996), "Adjustments to Zatsiorsky-Seluyanov's
//! segment inertia parameters". Mass is a fraction of body mass, length a fraction of
//! stature, and the moment of inertia comes from the radius of gyration: `I = m·(k·L)²`.

use serde::{Deserialize, Serialize};

use crate::analyzer::AnalysisError;

pub const METERS_PER_INCH: f64 = 0.0254;
pub const KG_PER_LB: f64 = 0.453592;
pub const KG_PER_OZ: f64 = 0.0283495;
pub const MPH_PER_MPS: f64 = 2.23694;

/// Biacromial (shoulder) breadth as a fraction of stature.
const SHOULDER_WIDTH_RATIO: f64 = 0.259;
/// Bi-iliac (hip) breadth as a fraction of stature.
const HIP_WIDTH_RATIO: f64 = 0.191;
/// Share of trunk mass carried by the lower trunk / pelvis.
const LOWER_TRUNK_SHARE: f64 = 0.33;

/// Athletes younger than this use youth length ratios.
pub const ADULT_AGE: u32 = 18;

/// Which side the athlete hits from. Decides which arm leads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handedness {
    #[default]
    Right,
    Left,
}

/// Athlete + equipment description, as supplied with a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteProfile {
    pub height_inches: f64,
    pub weight_lbs: f64,
    pub age: u32,
    #[serde(default)]
    pub wingspan_inches: Option<f64>,
    #[serde(default = "default_bat_length")]
    pub bat_length_inches: f64,
    #[serde(default = "default_bat_weight")]
    pub bat_weight_oz: f64,
    #[serde(default)]
    pub bats: Handedness,
}

fn default_bat_length() -> f64 {
    33.0
}

fn default_bat_weight() -> f64 {
    30.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Head,
    Trunk,
    UpperArm,
    Forearm,
    Hand,
    Thigh,
    Shank,
    Foot,
}

impl Segment {
    pub const ALL: [Segment; 8] = [
        Segment::Head,
        Segment::Trunk,
        Segment::UpperArm,
        Segment::Forearm,
        Segment::Hand,
        Segment::Thigh,
        Segment::Shank,
        Segment::Foot,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::Trunk => "trunk",
            Self::UpperArm => "upper_arm",
            Self::Forearm => "forearm",
            Self::Hand => "hand",
            Self::Thigh => "thigh",
            Self::Shank => "shank",
            Self::Foot => "foot",
        }
    }

    /// Limb segments exist on both sides of the body.
    pub fn count(self) -> u32 {
        match self {
            Self::Head | Self::Trunk => 1,
            _ => 2,
        }
    }

    fn mass_ratio(self) -> f64 {
        match self {
            Self::Head => 0.0694,
            Self::Trunk => 0.4346,
            Self::UpperArm => 0.0271,
            Self::Forearm => 0.0162,
            Self::Hand => 0.0061,
            Self::Thigh => 0.1416,
            Self::Shank => 0.0433,
            Self::Foot => 0.0137,
        }
    }

    fn length_ratio(self, youth: bool) -> f64 {
        match (self, youth) {
            // Youth: proportionally longer legs, shorter trunk.
            (Self::Trunk, true) => 0.270,
            (Self::Thigh, true) => 0.260,
            (Self::Shank, true) => 0.260,
            (Self::Head, _) => 0.130,
            (Self::Trunk, _) => 0.288,
            (Self::UpperArm, _) => 0.188,
            (Self::Forearm, _) => 0.146,
            (Self::Hand, _) => 0.108,
            (Self::Thigh, _) => 0.245,
            (Self::Shank, _) => 0.246,
            (Self::Foot, _) => 0.039,
        }
    }

    fn gyration_ratio(self) -> f64 {
        match self {
            Self::Head => 0.495,
            Self::Trunk => 0.496,
            Self::UpperArm => 0.322,
            Self::Forearm => 0.303,
            Self::Hand => 0.587,
            Self::Thigh => 0.329,
            Self::Shank => 0.302,
            Self::Foot => 0.475,
        }
    }

    fn com_ratio(self) -> f64 {
        match self {
            Self::Head | Self::Trunk | Self::Foot => 0.500,
            Self::UpperArm => 0.436,
            Self::Forearm => 0.430,
            Self::Hand => 0.506,
            Self::Thigh | Self::Shank => 0.433,
        }
    }
}

/// Physical properties of one body segment (one side, for limbs).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnthropometricSegment {
    pub segment: Segment,
    pub mass_kg: f64,
    pub length_m: f64,
    /// Centre of mass, measured from the proximal end.
    pub com_m: f64,
    /// About the segment's own centre of mass.
    pub inertia_kg_m2: f64,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmLengthSource {
    Wingspan,
    HeightEstimate,
}

/// Shoulder-to-fingertip length and where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArmLength {
    pub metres: f64,
    pub source: ArmLengthSource,
}

/// Per-athlete segment table. Built once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct AnthropometricModel {
    profile: AthleteProfile,
    height_m: f64,
    weight_kg: f64,
    segments: Vec<AnthropometricSegment>,
}

impl AnthropometricModel {
    pub fn new(profile: &AthleteProfile) -> Result<Self, AnalysisError> {
        validate_positive("height_inches", profile.height_inches)?;
        validate_positive("weight_lbs", profile.weight_lbs)?;
        validate_positive("bat_length_inches", profile.bat_length_inches)?;
        validate_positive("bat_weight_oz", profile.bat_weight_oz)?;
        if let Some(span) = profile.wingspan_inches {
            validate_positive("wingspan_inches", span)?;
        }

        let height_m = profile.height_inches * METERS_PER_INCH;
        let weight_kg = profile.weight_lbs * KG_PER_LB;
        let youth = profile.age < ADULT_AGE;

        let segments = Segment::ALL
            .iter()
            .map(|&segment| {
                let mass_kg = weight_kg * segment.mass_ratio();
                let length_m = height_m * segment.length_ratio(youth);
                let k = segment.gyration_ratio() * length_m;
                AnthropometricSegment {
                    segment,
                    mass_kg,
                    length_m,
                    com_m: length_m * segment.com_ratio(),
                    inertia_kg_m2: mass_kg * k * k,
                    count: segment.count(),
                }
            })
            .collect();

        log::debug!(
            "Anthropometric model: {:.2} m, {:.1} kg, age {}{}",
            height_m,
            weight_kg,
            profile.age,
            if youth { " (youth ratios)" } else { "" }
        );

        let model = Self {
            profile: profile.clone(),
            height_m,
            weight_kg,
            segments,
        };

        // A wingspan narrower than the shoulders leaves no arm to swing with.
        if let Some(span) = profile.wingspan_inches {
            if model.arm_length().metres <= 0.0 {
                return Err(AnalysisError::InvalidAthleteProfile {
                    field: "wingspan_inches",
                    value: span,
                });
            }
        }

        Ok(model)
    }

    pub fn profile(&self) -> &AthleteProfile {
        &self.profile
    }

    pub fn height_m(&self) -> f64 {
        self.height_m
    }

    pub fn weight_kg(&self) -> f64 {
        self.weight_kg
    }

    pub fn is_youth(&self) -> bool {
        self.profile.age < ADULT_AGE
    }

    pub fn segments(&self) -> &[AnthropometricSegment] {
        &self.segments
    }

    pub fn segment(&self, segment: Segment) -> &AnthropometricSegment {
        // Built from Segment::ALL, so the index always matches the declaration order.
        &self.segments[segment as usize]
    }

    /// Sum of all segment masses, both sides counted.
    pub fn total_segment_mass(&self) -> f64 {
        self.segments
            .iter()
            .map(|s| s.mass_kg * s.count as f64)
            .sum()
    }

    pub fn shoulder_width_m(&self) -> f64 {
        self.height_m * SHOULDER_WIDTH_RATIO
    }

    /// Arm length used for every lever-arm calculation.
    ///
    /// A measured wingspan replaces the stature estimate outright; the two are never blended.
    pub fn arm_length(&self) -> ArmLength {
        match self.profile.wingspan_inches {
            Some(span) => ArmLength {
                metres: (span * METERS_PER_INCH - self.shoulder_width_m()) / 2.0,
                source: ArmLengthSource::Wingspan,
            },
            None => ArmLength {
                metres: self.estimated_arm_length_m(),
                source: ArmLengthSource::HeightEstimate,
            },
        }
    }

    /// Upper arm + forearm + hand from stature ratios alone.
    pub fn estimated_arm_length_m(&self) -> f64 {
        self.segment(Segment::UpperArm).length_m
            + self.segment(Segment::Forearm).length_m
            + self.segment(Segment::Hand).length_m
    }

    pub fn torso_length_m(&self) -> f64 {
        self.segment(Segment::Trunk).length_m
    }

    pub fn leg_length_m(&self) -> f64 {
        self.segment(Segment::Thigh).length_m
            + self.segment(Segment::Shank).length_m
            + self.segment(Segment::Foot).length_m
    }

    /// Lower trunk modelled as a cylinder spinning about the vertical axis.
    pub fn pelvis_inertia(&self) -> f64 {
        let mass = self.segment(Segment::Trunk).mass_kg * LOWER_TRUNK_SHARE;
        let radius = self.height_m * HIP_WIDTH_RATIO / 2.0;
        mass * radius * radius
    }

    pub fn torso_inertia(&self) -> f64 {
        let mass = self.segment(Segment::Trunk).mass_kg;
        let radius = self.shoulder_width_m() / 2.0;
        mass * radius * radius
    }

    /// One arm (upper arm, forearm, hand) about the shoulder, via the parallel-axis theorem.
    pub fn arm_inertia_about_shoulder(&self) -> f64 {
        let mut offset = 0.0;
        let mut inertia = 0.0;
        for seg in [Segment::UpperArm, Segment::Forearm, Segment::Hand] {
            let s = self.segment(seg);
            let d = offset + s.com_m;
            inertia += s.inertia_kg_m2 + s.mass_kg * d * d;
            offset += s.length_m;
        }
        inertia
    }

    /// Pelvis, both legs.
    pub fn lower_body_mass(&self) -> f64 {
        let legs: f64 = [Segment::Thigh, Segment::Shank, Segment::Foot]
            .iter()
            .map(|&s| self.segment(s).mass_kg * 2.0)
            .sum();
        self.segment(Segment::Trunk).mass_kg * LOWER_TRUNK_SHARE + legs
    }

    /// Upper trunk plus head.
    pub fn upper_body_mass(&self) -> f64 {
        self.segment(Segment::Trunk).mass_kg * (1.0 - LOWER_TRUNK_SHARE)
            + self.segment(Segment::Head).mass_kg
    }

    /// Both arms.
    pub fn arms_mass(&self) -> f64 {
        [Segment::UpperArm, Segment::Forearm, Segment::Hand]
            .iter()
            .map(|&s| self.segment(s).mass_kg * 2.0)
            .sum()
    }

    pub fn bat_mass_kg(&self) -> f64 {
        self.profile.bat_weight_oz * KG_PER_OZ
    }

    pub fn bat_length_m(&self) -> f64 {
        self.profile.bat_length_inches * METERS_PER_INCH
    }

    /// Uniform rod about the knob: `⅓·m·L²`.
    pub fn bat_inertia(&self) -> f64 {
        bat_inertia(self.bat_mass_kg(), self.bat_length_m())
    }

    pub fn bat_lever(&self, barrel_fraction: f64, arm_axis_fraction: f64) -> BatLever {
        BatLever::new(self, barrel_fraction, arm_axis_fraction)
    }

    /// Theoretical bat-speed ceiling for this body and bat.
    pub fn bat_speed_capacity(&self) -> BatSpeedCapacity {
        BatSpeedCapacity::from_model(self)
    }

    pub fn summary(&self) -> AnthropometricSummary {
        let arm = self.arm_length();
        AnthropometricSummary {
            height_m: self.height_m,
            weight_kg: self.weight_kg,
            age: self.profile.age,
            youth_ratios: self.is_youth(),
            wingspan_m: self.profile.wingspan_inches.map(|w| w * METERS_PER_INCH),
            segments: self.segments.clone(),
            arm_length: arm,
            estimated_arm_length_m: self.estimated_arm_length_m(),
            torso_length_m: self.torso_length_m(),
            leg_length_m: self.leg_length_m(),
            pelvis_inertia_kg_m2: self.pelvis_inertia(),
            torso_inertia_kg_m2: self.torso_inertia(),
            arm_inertia_kg_m2: self.arm_inertia_about_shoulder(),
            bat_inertia_kg_m2: self.bat_inertia(),
            capacity: self.bat_speed_capacity(),
        }
    }
}

fn validate_positive(field: &'static str, value: f64) -> Result<(), AnalysisError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::InvalidAthleteProfile { field, value })
    }
}

fn bat_inertia(mass_kg: f64, length_m: f64) -> f64 {
    mass_kg * length_m * length_m / 3.0
}

/// The hand line treated as a rigid lever reaching out to the barrel.
///
/// The rotation axis sits inside the arms, so the radius combines part of the bat
/// with part of the athlete's own arm length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatLever {
    pub bat_length_m: f64,
    pub arm_length_m: f64,
    pub barrel_fraction: f64,
    pub arm_axis_fraction: f64,
    pub effective_radius_m: f64,
}

impl BatLever {
    pub fn new(model: &AnthropometricModel, barrel_fraction: f64, arm_axis_fraction: f64) -> Self {
        let bat_length_m = model.bat_length_m();
        let arm_length_m = model.arm_length().metres;
        Self {
            bat_length_m,
            arm_length_m,
            barrel_fraction,
            arm_axis_fraction,
            effective_radius_m: barrel_fraction * bat_length_m + arm_axis_fraction * arm_length_m,
        }
    }

    /// Barrel linear speed (m/s) for a hand-line angular velocity in deg/s.
    pub fn barrel_speed(&self, omega_deg_s: f64) -> f64 {
        omega_deg_s.abs().to_radians() * self.effective_radius_m
    }
}

/// Bat-speed ceiling, built from leverage-based factors calibrated on reference athletes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatSpeedCapacity {
    pub bat_speed_mph: f64,
    pub weight_factor: f64,
    pub arm_factor: f64,
    pub age_factor: f64,
    pub bat_factor: f64,
    pub height_calibration: f64,
}

impl BatSpeedCapacity {
    /// Reference adult: 1.75 m, 75 kg, 0.75 m arm, 33"/30 oz bat.
    const BASE_SPEED_MPH: f64 = 75.0;
    const REFERENCE_ARM_M: f64 = 0.75;
    const REFERENCE_WEIGHT_KG: f64 = 75.0;
    const SHORT_PLAYER_INCHES: f64 = 70.0;

    fn from_model(model: &AnthropometricModel) -> Self {
        let weight_factor =
            (1.0 + (model.weight_kg() - Self::REFERENCE_WEIGHT_KG) / 150.0).clamp(0.8, 1.15);

        // Sublinear: a longer lever also carries more inertia.
        let arm_factor = (model.arm_length().metres / Self::REFERENCE_ARM_M).powf(0.7);

        let age = model.profile().age as f64;
        let age_factor = if model.is_youth() {
            0.65 + (age - 12.0) * 0.0333
        } else if age <= 30.0 {
            1.0
        } else {
            1.0 - (age - 30.0) * 0.005
        }
        .clamp(0.60, 1.0);

        let reference = bat_inertia(30.0 * KG_PER_OZ, 33.0 * METERS_PER_INCH);
        let bat_factor = (reference / model.bat_inertia()).sqrt();

        let height_calibration = if model.profile().height_inches < Self::SHORT_PLAYER_INCHES {
            1.055
        } else {
            1.015
        };

        let bat_speed_mph = Self::BASE_SPEED_MPH
            * weight_factor
            * arm_factor
            * age_factor
            * bat_factor
            * height_calibration;

        Self {
            bat_speed_mph,
            weight_factor,
            arm_factor,
            age_factor,
            bat_factor,
            height_calibration,
        }
    }

    pub fn bat_speed_mps(&self) -> f64 {
        self.bat_speed_mph / MPH_PER_MPS
    }
}

/// Serializable view of the model for the `profile` command and reports.
#[derive(Debug, Clone, Serialize)]
pub struct AnthropometricSummary {
    pub height_m: f64,
    pub weight_kg: f64,
    pub age: u32,
    pub youth_ratios: bool,
    pub wingspan_m: Option<f64>,
    pub segments: Vec<AnthropometricSegment>,
    pub arm_length: ArmLength,
    pub estimated_arm_length_m: f64,
    pub torso_length_m: f64,
    pub leg_length_m: f64,
    pub pelvis_inertia_kg_m2: f64,
    pub torso_inertia_kg_m2: f64,
    pub arm_inertia_kg_m2: f64,
    pub bat_inertia_kg_m2: f64,
    pub capacity: BatSpeedCapacity,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(height: f64, weight: f64, age: u32, wingspan: Option<f64>) -> AthleteProfile {
        AthleteProfile {
            height_inches: height,
            weight_lbs: weight,
            age,
            wingspan_inches: wingspan,
            bat_length_inches: 33.0,
            bat_weight_oz: 30.0,
            bats: Handedness::Right,
        }
    }

    #[test]
    fn test_segment_masses_sum_to_body_mass() {
        let model = AnthropometricModel::new(&profile(72.0, 180.0, 25, None)).unwrap();
        let total = model.total_segment_mass();
        assert!(
            (total - model.weight_kg()).abs() < 0.01 * model.weight_kg(),
            "segments {total} vs body {}",
            model.weight_kg()
        );
    }

    #[test]
    fn test_doubling_weight_doubles_segment_masses() {
        let light = AnthropometricModel::new(&profile(70.0, 150.0, 25, None)).unwrap();
        let heavy = AnthropometricModel::new(&profile(70.0, 300.0, 25, None)).unwrap();
        for (a, b) in light.segments().iter().zip(heavy.segments()) {
            assert!((b.mass_kg / a.mass_kg - 2.0).abs() < 1e-9, "{:?}", a.segment);
            assert!((b.length_m - a.length_m).abs() < 1e-12);
        }
    }

    #[test]
    fn test_youth_step_at_eighteen() {
        let youth = AnthropometricModel::new(&profile(70.0, 160.0, 17, None)).unwrap();
        let adult = AnthropometricModel::new(&profile(70.0, 160.0, 18, None)).unwrap();
        let h = 70.0 * METERS_PER_INCH;
        assert!((youth.torso_length_m() - 0.270 * h).abs() < 1e-9);
        assert!((adult.torso_length_m() - 0.288 * h).abs() < 1e-9);
        assert!(youth.leg_length_m() > adult.leg_length_m());
        // Arm ratios are shared.
        assert!((youth.estimated_arm_length_m() - adult.estimated_arm_length_m()).abs() < 1e-12);
    }

    #[test]
    fn test_wingspan_overrides_height_estimate() {
        let without = AnthropometricModel::new(&profile(72.0, 160.0, 16, None)).unwrap();
        let with = AnthropometricModel::new(&profile(72.0, 160.0, 16, Some(76.0))).unwrap();

        let est = without.arm_length();
        let measured = with.arm_length();
        assert_eq!(est.source, ArmLengthSource::HeightEstimate);
        assert_eq!(measured.source, ArmLengthSource::Wingspan);

        let expected = (76.0 * METERS_PER_INCH - 72.0 * METERS_PER_INCH * 0.259) / 2.0;
        assert!((measured.metres - expected).abs() < 1e-9);
        assert!((est.metres - without.estimated_arm_length_m()).abs() < 1e-12);
        assert!((measured.metres - est.metres).abs() > 0.01);
        // Not a blend of the two either.
        let blended = (measured.metres + est.metres) / 2.0;
        assert!((measured.metres - blended).abs() > 0.005);
    }

    #[test]
    fn test_wingspan_changes_lever_radius() {
        let without = AnthropometricModel::new(&profile(72.0, 160.0, 16, None)).unwrap();
        let with = AnthropometricModel::new(&profile(72.0, 160.0, 16, Some(76.0))).unwrap();
        let a = without.bat_lever(0.75, 0.25);
        let b = with.bat_lever(0.75, 0.25);
        assert!((a.effective_radius_m - b.effective_radius_m).abs() > 1e-3);
        assert!((a.bat_length_m - b.bat_length_m).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_profile_rejected() {
        for p in [
            profile(0.0, 160.0, 20, None),
            profile(70.0, -5.0, 20, None),
            profile(f64::NAN, 160.0, 20, None),
            profile(70.0, 160.0, 20, Some(0.0)),
        ] {
            let err = AnthropometricModel::new(&p).unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidAthleteProfile { .. }), "{err}");
        }
    }

    #[test]
    fn test_wingspan_narrower_than_shoulders_rejected() {
        // Shoulder width at 72" is about 18.6", so a 15" span leaves a negative arm.
        let err = AnthropometricModel::new(&profile(72.0, 160.0, 16, Some(15.0))).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InvalidAthleteProfile {
                field: "wingspan_inches",
                value: 15.0
            }
        );

        let ok = AnthropometricModel::new(&profile(72.0, 160.0, 16, Some(20.0))).unwrap();
        assert!(ok.arm_length().metres > 0.0);
        assert!(ok.bat_speed_capacity().bat_speed_mph.is_finite());
    }

    #[test]
    fn test_arm_inertia_exceeds_segment_sum() {
        let model = AnthropometricModel::new(&profile(72.0, 180.0, 25, None)).unwrap();
        let own: f64 = [Segment::UpperArm, Segment::Forearm, Segment::Hand]
            .iter()
            .map(|&s| model.segment(s).inertia_kg_m2)
            .sum();
        assert!(model.arm_inertia_about_shoulder() > own);
    }

    #[test]
    fn test_capacity_reference_athlete() {
        // 16yo, 6'0", 160 lb, 6'4" span, 32"/29 oz bat: roughly 60 mph ceiling.
        let mut p = profile(72.0, 160.0, 16, Some(76.0));
        p.bat_length_inches = 32.0;
        p.bat_weight_oz = 29.0;
        let cap = AnthropometricModel::new(&p).unwrap().bat_speed_capacity();
        assert!(
            (cap.bat_speed_mph - 60.3).abs() < 1.0,
            "capacity={}",
            cap.bat_speed_mph
        );
        assert!((0.6..=1.0).contains(&cap.age_factor));
    }

    #[test]
    fn test_heavier_bat_lowers_capacity() {
        let light = AnthropometricModel::new(&profile(72.0, 190.0, 25, None)).unwrap();
        let mut p = profile(72.0, 190.0, 25, None);
        p.bat_weight_oz = 34.0;
        let heavy = AnthropometricModel::new(&p).unwrap();
        assert!(heavy.bat_speed_capacity().bat_speed_mph < light.bat_speed_capacity().bat_speed_mph);
    }
}
