//! Phase detection inside the swing window.
//!
//! Detection walks `Stance → Load → FootDown → Contact → FollowThrough` once, in
//! order. Alternative heuristics are `EventConfig` profiles, not separate detectors.

use serde::Serialize;

use super::kinematics::{KinematicSample, KinematicSeries};
use super::window::SwingWindow;
use super::{AnalysisError, QualityFlag, Stage};
use crate::config::{EventConfig, FootDownReference};

/// Swing durations at or below this are treated as zero.
const MIN_SWING_DURATION_MS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Stance,
    Load,
    FootDown,
    Contact,
    FollowThrough,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Stance,
        Phase::Load,
        Phase::FootDown,
        Phase::Contact,
        Phase::FollowThrough,
    ];

    pub fn next(self) -> Option<Phase> {
        match self {
            Self::Stance => Some(Self::Load),
            Self::Load => Some(Self::FootDown),
            Self::FootDown => Some(Self::Contact),
            Self::Contact => Some(Self::FollowThrough),
            Self::FollowThrough => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Stance => "stance",
            Self::Load => "load",
            Self::FootDown => "foot_down",
            Self::Contact => "contact",
            Self::FollowThrough => "follow_through",
        }
    }
}

/// A detected event moved later to keep the phases ordered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrderingCorrection {
    pub phase: Phase,
    pub detected_ms: f64,
    pub corrected_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwingEvents {
    pub stance_ms: f64,
    pub load_ms: f64,
    pub foot_down_ms: f64,
    pub contact_ms: f64,
    pub follow_through_ms: f64,
    pub corrections: Vec<OrderingCorrection>,
}

impl SwingEvents {
    fn from_timestamps(t: [f64; 5]) -> Self {
        Self {
            stance_ms: t[0],
            load_ms: t[1],
            foot_down_ms: t[2],
            contact_ms: t[3],
            follow_through_ms: t[4],
            corrections: Vec::new(),
        }
    }

    pub fn timestamp(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Stance => self.stance_ms,
            Phase::Load => self.load_ms,
            Phase::FootDown => self.foot_down_ms,
            Phase::Contact => self.contact_ms,
            Phase::FollowThrough => self.follow_through_ms,
        }
    }

    fn timestamp_mut(&mut self, phase: Phase) -> &mut f64 {
        match phase {
            Phase::Stance => &mut self.stance_ms,
            Phase::Load => &mut self.load_ms,
            Phase::FootDown => &mut self.foot_down_ms,
            Phase::Contact => &mut self.contact_ms,
            Phase::FollowThrough => &mut self.follow_through_ms,
        }
    }

    pub fn load_duration_ms(&self) -> f64 {
        self.foot_down_ms - self.load_ms
    }

    pub fn swing_duration_ms(&self) -> f64 {
        self.contact_ms - self.foot_down_ms
    }

    /// Push each event to at least `previous + min_gap_ms`. Never moves anything earlier.
    fn enforce_ordering(&mut self, min_gap_ms: f64) {
        let mut previous = self.stance_ms;
        let mut phase = Phase::Stance.next();
        while let Some(p) = phase {
            let earliest = previous + min_gap_ms;
            let detected = self.timestamp(p);
            if detected < earliest {
                log::warn!(
                    "{} at {:.1} ms too close to previous event, moved to {:.1} ms",
                    p.name(),
                    detected,
                    earliest
                );
                self.corrections.push(OrderingCorrection {
                    phase: p,
                    detected_ms: detected,
                    corrected_ms: earliest,
                });
                *self.timestamp_mut(p) = earliest;
            }
            previous = self.timestamp(p);
            phase = p.next();
        }
    }

    /// Load-to-swing ratio, clamped to the configured range.
    pub fn tempo(&self, cfg: &EventConfig, flags: &mut Vec<QualityFlag>) -> TempoAssessment {
        let load = self.load_duration_ms();
        let swing = self.swing_duration_ms();
        let raw = (swing > MIN_SWING_DURATION_MS)
            .then(|| load / swing)
            .filter(|r| r.is_finite());

        let ratio = match raw {
            Some(r) => r.clamp(cfg.tempo_min, cfg.tempo_max),
            None => cfg.tempo_max,
        };
        let clamped = raw != Some(ratio);
        if clamped {
            log::warn!("Tempo {:?} clamped to {:.2}", raw, ratio);
            flags.push(QualityFlag::Clamped {
                quantity: "tempo_ratio".into(),
                raw,
                limit: ratio,
            });
        }

        TempoAssessment {
            ratio,
            raw,
            clamped,
            optimal: cfg.optimal_tempo.contains(ratio),
            category: TempoCategory::from_ratio(ratio),
            load_duration_ms: load,
            swing_duration_ms: swing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TempoCategory {
    HairTrigger,
    QuickTrigger,
    Balanced,
    LongLoad,
}

impl TempoCategory {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < 0.75 {
            Self::HairTrigger
        } else if ratio < 1.5 {
            Self::QuickTrigger
        } else if ratio < 2.5 {
            Self::Balanced
        } else {
            Self::LongLoad
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TempoAssessment {
    pub ratio: f64,
    /// None when the swing duration was zero.
    pub raw: Option<f64>,
    pub clamped: bool,
    pub optimal: bool,
    pub category: TempoCategory,
    pub load_duration_ms: f64,
    pub swing_duration_ms: f64,
}

/// Detect all five events inside `window`.
pub fn detect(
    series: &KinematicSeries,
    window: &SwingWindow,
    cfg: &EventConfig,
) -> Result<SwingEvents, AnalysisError> {
    let samples = series.samples_between(window.start_index, window.end_index);
    if samples.len() < cfg.min_samples.max(2) {
        return Err(AnalysisError::InsufficientInputData {
            stage: Stage::EventDetection,
            available: samples.len(),
            required: cfg.min_samples.max(2),
        });
    }

    let mut detected = [0.0; 5];
    let mut load_index = 0;
    let mut phase = Some(Phase::Stance);
    while let Some(p) = phase {
        detected[p as usize] = match p {
            Phase::Stance => samples[0].timestamp_ms,
            Phase::Load => {
                load_index = find_load(samples, cfg);
                samples[load_index].timestamp_ms
            }
            Phase::FootDown => samples[find_foot_down(samples, load_index, cfg)].timestamp_ms,
            Phase::Contact => window.peak_ms,
            Phase::FollowThrough => samples[samples.len() - 1].timestamp_ms,
        };
        phase = p.next();
    }

    let mut events = SwingEvents::from_timestamps(detected);
    events.enforce_ordering(cfg.min_phase_gap_ms);

    log::debug!(
        "Events (v{}): stance {:.0}, load {:.0}, foot-down {:.0}, contact {:.0}, follow-through {:.0}",
        cfg.version,
        events.stance_ms,
        events.load_ms,
        events.foot_down_ms,
        events.contact_ms,
        events.follow_through_ms
    );
    Ok(events)
}

/// Deepest backward pelvis rotation in the first half of the window.
fn find_load(samples: &[KinematicSample], cfg: &EventConfig) -> usize {
    let n = samples.len();
    let baseline = samples[0].angles.pelvis;
    let half = (n / 2).max(2);

    let mut best = (0, 0.0);
    for (i, s) in samples.iter().enumerate().take(half).skip(1) {
        let backward = baseline - s.angles.pelvis;
        if backward > best.1 {
            best = (i, backward);
        }
    }

    if best.0 == 0 || best.1 < cfg.min_load_magnitude_deg {
        let fallback = ((n as f64 * cfg.load_fallback_fraction) as usize).clamp(1, n - 1);
        log::debug!(
            "Load rotation {:.1}° below {:.1}°, using fallback sample {}",
            best.1,
            cfg.min_load_magnitude_deg,
            fallback
        );
        fallback
    } else {
        best.0
    }
}

/// First sample after load where the pelvis has opened past the reference.
fn find_foot_down(samples: &[KinematicSample], load_index: usize, cfg: &EventConfig) -> usize {
    let n = samples.len();
    let reference = match cfg.foot_down_reference {
        FootDownReference::Stance => samples[0].angles.pelvis,
        FootDownReference::Load => samples[load_index].angles.pelvis,
    };

    samples
        .iter()
        .enumerate()
        .skip(load_index + 1)
        .find(|(_, s)| s.angles.pelvis - reference > cfg.foot_down_threshold_deg)
        .map(|(i, _)| i)
        .unwrap_or_else(|| {
            let fallback =
                (load_index + (n as f64 * cfg.foot_down_fallback_fraction) as usize).min(n - 1);
            log::debug!("No foot-down crossing, using fallback sample {}", fallback);
            fallback
        })
}
