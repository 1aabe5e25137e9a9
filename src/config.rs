use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the config file is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Number of parallel workers for `batch`. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Where batch results are written (defaults to next to each input).
    pub output_dir: Option<PathBuf>,
    /// Pipeline parameters.
    pub analysis: AnalysisConfig,
}

/// Every tunable threshold of the pipeline, threaded explicitly through each stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub ingest: IngestConfig,
    pub window: WindowConfig,
    pub events: EventConfig,
    pub physics: PhysicsConfig,
    pub scoring: ScoringConfig,
}

/// Inclusive `[low, high]` range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub low: f64,
    pub high: f64,
}

impl Band {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.low..=self.high).contains(&value)
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Recordings longer than this are refused before any stage runs.
    pub max_frames: usize,
    /// Frames below this confidence contribute no landmark positions.
    pub min_frame_confidence: f64,
    /// Landmarks below this confidence are ignored.
    pub min_landmark_confidence: f64,
    /// Metres per normalized image unit. None = athlete height.
    pub position_scale_m: Option<f64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_frames: 36_000,
            min_frame_confidence: 0.3,
            min_landmark_confidence: 0.3,
            position_scale_m: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Total window width centred on the peak.
    pub width_ms: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
    /// Peak combined velocity below this means no swing.
    pub min_peak_velocity_mps: f64,
    pub min_samples: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width_ms: 2000.0,
            min_duration_ms: 300.0,
            max_duration_ms: 3000.0,
            min_peak_velocity_mps: 1.0,
            min_samples: 10,
        }
    }
}

/// What the pelvis must swing back past for foot-down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FootDownReference {
    /// The pelvis angle at the first frame of the window.
    #[default]
    Stance,
    /// The pelvis angle at the detected load.
    Load,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    pub version: u32,
    pub min_samples: usize,
    pub min_load_magnitude_deg: f64,
    pub load_fallback_fraction: f64,
    pub foot_down_threshold_deg: f64,
    pub foot_down_reference: FootDownReference,
    pub foot_down_fallback_fraction: f64,
    pub min_phase_gap_ms: f64,
    pub tempo_min: f64,
    pub tempo_max: f64,
    pub optimal_tempo: Band,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            version: 3,
            min_samples: 5,
            min_load_magnitude_deg: 5.0,
            load_fallback_fraction: 0.15,
            foot_down_threshold_deg: 10.0,
            foot_down_reference: FootDownReference::Stance,
            foot_down_fallback_fraction: 0.25,
            min_phase_gap_ms: 10.0,
            tempo_min: 0.5,
            tempo_max: 10.0,
            optimal_tempo: Band::new(2.0, 3.5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub bat_speed_cap_mph: f64,
    /// Share of bat length between the hands and the barrel.
    pub barrel_fraction: f64,
    /// Share of arm length between the rotation axis and the hands.
    pub arm_axis_fraction: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            bat_speed_cap_mph: 120.0,
            barrel_fraction: 0.75,
            arm_axis_fraction: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub reference_pelvis_velocity_dps: f64,
    /// Lower-body share of summed region peaks that earns full credit.
    pub target_lower_share: f64,
    /// Lower bound of the separation-timing factor outside the wide band.
    pub timing_floor: f64,
    pub min_separation_deg: f64,
    pub target_separation_deg: f64,
    pub arm_bat_gap_max_ms: f64,
    pub transfer_ratio_max_pct: f64,
    pub rotation_dominant_ratio: f64,
    pub translation_dominant_ratio: f64,
    pub min_translation_share: f64,
    pub vertical_dominant_share: f64,
    pub score_gap_cutoff: f64,
    /// Torso-after-pelvis peak gap that earns full timing credit (ms).
    pub optimal_separation_ms: Band,
    pub wide_separation_ms: Band,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            reference_pelvis_velocity_dps: 600.0,
            target_lower_share: 0.25,
            timing_floor: 0.2,
            min_separation_deg: 10.0,
            target_separation_deg: 35.0,
            arm_bat_gap_max_ms: 60.0,
            transfer_ratio_max_pct: 150.0,
            rotation_dominant_ratio: 0.80,
            translation_dominant_ratio: 0.65,
            min_translation_share: 0.30,
            vertical_dominant_share: 0.5,
            score_gap_cutoff: 15.0,
            optimal_separation_ms: Band::new(40.0, 120.0),
            wide_separation_ms: Band::new(0.0, 200.0),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Invalid {
        path: String,
        source: InvalidSetting,
    },
}

/// A config value the pipeline cannot run with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{field} {reason}")]
pub struct InvalidSetting {
    pub field: &'static str,
    pub reason: String,
}

fn finite(field: &'static str, value: f64) -> Result<f64, InvalidSetting> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InvalidSetting {
            field,
            reason: format!("must be finite, got {value}"),
        })
    }
}

fn at_least(field: &'static str, value: f64, min: f64) -> Result<(), InvalidSetting> {
    if finite(field, value)? < min {
        return Err(InvalidSetting {
            field,
            reason: format!("must be at least {min}, got {value}"),
        });
    }
    Ok(())
}

fn positive(field: &'static str, value: f64) -> Result<(), InvalidSetting> {
    if finite(field, value)? <= 0.0 {
        return Err(InvalidSetting {
            field,
            reason: format!("must be positive, got {value}"),
        });
    }
    Ok(())
}

fn unit(field: &'static str, value: f64) -> Result<(), InvalidSetting> {
    if !(0.0..=1.0).contains(&finite(field, value)?) {
        return Err(InvalidSetting {
            field,
            reason: format!("must be within [0, 1], got {value}"),
        });
    }
    Ok(())
}

fn ordered(field: &'static str, low: f64, high: f64) -> Result<(), InvalidSetting> {
    if finite(field, low)? > finite(field, high)? {
        return Err(InvalidSetting {
            field,
            reason: format!("low bound {low} exceeds high bound {high}"),
        });
    }
    Ok(())
}

impl AnalysisConfig {
    /// Reject values that would make a stage panic or produce non-finite output.
    pub fn validate(&self) -> Result<(), InvalidSetting> {
        let i = &self.ingest;
        unit("ingest.min_frame_confidence", i.min_frame_confidence)?;
        unit("ingest.min_landmark_confidence", i.min_landmark_confidence)?;
        if let Some(scale) = i.position_scale_m {
            positive("ingest.position_scale_m", scale)?;
        }

        let w = &self.window;
        positive("window.width_ms", w.width_ms)?;
        at_least("window.min_duration_ms", w.min_duration_ms, 0.0)?;
        ordered("window.max_duration_ms", w.min_duration_ms, w.max_duration_ms)?;
        at_least("window.min_peak_velocity_mps", w.min_peak_velocity_mps, 0.0)?;

        let e = &self.events;
        at_least("events.min_load_magnitude_deg", e.min_load_magnitude_deg, 0.0)?;
        unit("events.load_fallback_fraction", e.load_fallback_fraction)?;
        finite("events.foot_down_threshold_deg", e.foot_down_threshold_deg)?;
        unit("events.foot_down_fallback_fraction", e.foot_down_fallback_fraction)?;
        at_least("events.min_phase_gap_ms", e.min_phase_gap_ms, 0.0)?;
        at_least("events.tempo_min", e.tempo_min, 0.0)?;
        ordered("events.tempo_max", e.tempo_min, e.tempo_max)?;
        ordered("events.optimal_tempo", e.optimal_tempo.low, e.optimal_tempo.high)?;

        let p = &self.physics;
        positive("physics.bat_speed_cap_mph", p.bat_speed_cap_mph)?;
        unit("physics.barrel_fraction", p.barrel_fraction)?;
        unit("physics.arm_axis_fraction", p.arm_axis_fraction)?;

        let s = &self.scoring;
        positive("scoring.reference_pelvis_velocity_dps", s.reference_pelvis_velocity_dps)?;
        positive("scoring.target_lower_share", s.target_lower_share)?;
        unit("scoring.timing_floor", s.timing_floor)?;
        at_least("scoring.min_separation_deg", s.min_separation_deg, 0.0)?;
        if finite("scoring.target_separation_deg", s.target_separation_deg)? <= s.min_separation_deg {
            return Err(InvalidSetting {
                field: "scoring.target_separation_deg",
                reason: format!(
                    "must exceed min_separation_deg ({}), got {}",
                    s.min_separation_deg, s.target_separation_deg
                ),
            });
        }
        positive("scoring.arm_bat_gap_max_ms", s.arm_bat_gap_max_ms)?;
        at_least("scoring.transfer_ratio_max_pct", s.transfer_ratio_max_pct, 0.0)?;
        unit("scoring.rotation_dominant_ratio", s.rotation_dominant_ratio)?;
        unit("scoring.translation_dominant_ratio", s.translation_dominant_ratio)?;
        ordered(
            "scoring.rotation_dominant_ratio",
            s.translation_dominant_ratio,
            s.rotation_dominant_ratio,
        )?;
        unit("scoring.min_translation_share", s.min_translation_share)?;
        unit("scoring.vertical_dominant_share", s.vertical_dominant_share)?;
        at_least("scoring.score_gap_cutoff", s.score_gap_cutoff, 0.0)?;
        ordered(
            "scoring.optimal_separation_ms",
            s.optimal_separation_ms.low,
            s.optimal_separation_ms.high,
        )?;
        ordered(
            "scoring.wide_separation_ms",
            s.wide_separation_ms.low,
            s.wide_separation_ms.high,
        )?;
        Ok(())
    }
}

impl AppConfig {
    /// Load config from `~/.config/swingtrace/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match Self::load_from(&path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("{}. Using defaults.", e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load an explicit config file. Unlike [`AppConfig::load`], errors are returned.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = toml::from_str::<AppConfig>(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.analysis.validate().map_err(|source| ConfigError::Invalid {
            path: path.display().to_string(),
            source,
        })?;
        Ok(config)
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Get the config file path.
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
