pub mod events;
pub mod kinematics;
pub mod physics;
pub mod scoring;
pub mod window;

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use thiserror::Error;

use crate::anthropometry::AnthropometricModel;
use crate::config::{AnalysisConfig, InvalidSetting};
use crate::pose::SwingRecording;
use events::{Phase, SwingEvents};
use kinematics::KinematicSeries;
use physics::{BatSpeedEstimate, EnergySample, KineticSequence};
use scoring::ScoreBundle;
use window::{NoSwingReason, SwingWindow, WindowOutcome};

/// Pipeline stage named in `InsufficientInputData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    WindowIsolation,
    EventDetection,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::WindowIsolation => "window isolation",
            Self::EventDetection => "event detection",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid athlete profile: {field} = {value}")]
    InvalidAthleteProfile { field: &'static str, value: f64 },
    #[error("Not enough samples for {stage}: {available} available, {required} required")]
    InsufficientInputData {
        stage: Stage,
        available: usize,
        required: usize,
    },
    #[error("Timestamp went backwards at frame {frame_index}: {timestamp_ms} ms after {previous_ms} ms")]
    NonMonotonicTimestamps {
        frame_index: u64,
        previous_ms: f64,
        timestamp_ms: f64,
    },
    #[error("Recording has {frames} frames, limit is {max}")]
    RecordingTooLong { frames: usize, max: usize },
    #[error("Invalid config: {0}")]
    InvalidConfig(#[from] InvalidSetting),
}

/// Explicit record of every clamp, skip and correction applied to a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityFlag {
    /// Frames dropped because they repeated the previous timestamp.
    DegenerateTiming { skipped: usize },
    /// Frames with neither supplied angles nor enough landmarks.
    FramesWithoutAngles { count: usize },
    Clamped {
        quantity: String,
        raw: Option<f64>,
        limit: f64,
    },
    OrderingCorrected {
        phase: Phase,
        detected_ms: f64,
        corrected_ms: f64,
    },
    NonFinite { stage: String, count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameStats {
    pub received: usize,
    pub used: usize,
    pub degenerate_skipped: usize,
    pub without_angles: usize,
}

/// Everything derived from one swing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwingAnalysis {
    pub config_version: u32,
    pub frames: FrameStats,
    pub swing_window: SwingWindow,
    pub swing_events: SwingEvents,
    pub kinetic_sequence: KineticSequence,
    pub energy_samples: Vec<EnergySample>,
    pub bat_speed: Option<BatSpeedEstimate>,
    pub peak_pelvis_dps: f64,
    pub peak_torso_dps: f64,
    pub peak_hand_line_dps: Option<f64>,
    pub rotation_ratio: Option<f64>,
    pub scores: ScoreBundle,
    pub flags: Vec<QualityFlag>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Swing(Box<SwingAnalysis>),
    NoSwing { reason: NoSwingReason },
}

/// Run the full pipeline over one recording.
pub fn analyze_recording(
    recording: &SwingRecording,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, AnalysisError> {
    config.validate()?;
    let model = AnthropometricModel::new(&recording.athlete)?;
    let lever = model.bat_lever(config.physics.barrel_fraction, config.physics.arm_axis_fraction);
    let scale_m = config.ingest.position_scale_m.unwrap_or(model.height_m());

    let mut flags = Vec::new();
    let series =
        KinematicSeries::from_recording(recording, &lever, scale_m, &config.ingest, &mut flags)?;
    if series.frames_without_angles > 0 {
        flags.push(QualityFlag::FramesWithoutAngles {
            count: series.frames_without_angles,
        });
    }

    let swing_window = match window::isolate(&series, &config.window)? {
        WindowOutcome::Found(w) => w,
        WindowOutcome::NoSwing(reason) => return Ok(AnalysisOutcome::NoSwing { reason }),
    };

    let swing_events = events::detect(&series, &swing_window, &config.events)?;
    flags.extend(swing_events.corrections.iter().map(|c| QualityFlag::OrderingCorrected {
        phase: c.phase,
        detected_ms: c.detected_ms,
        corrected_ms: c.corrected_ms,
    }));

    let physics = physics::compute(
        &series,
        &swing_window,
        &model,
        &lever,
        &config.physics,
        &mut flags,
    );
    let scores = scoring::score(
        &swing_events,
        &physics,
        &model.bat_speed_capacity(),
        model.profile(),
        &config.events,
        &config.scoring,
        &mut flags,
    );

    Ok(AnalysisOutcome::Swing(Box::new(SwingAnalysis {
        config_version: config.events.version,
        frames: FrameStats {
            received: series.frames_received,
            used: series.samples.len(),
            degenerate_skipped: series.degenerate_skipped,
            without_angles: series.frames_without_angles,
        },
        swing_window,
        swing_events,
        kinetic_sequence: physics.kinetic_sequence,
        rotation_ratio: physics.rotation_ratio(),
        energy_samples: physics.energy_samples,
        bat_speed: physics.bat_speed,
        peak_pelvis_dps: physics.peak_pelvis_dps,
        peak_torso_dps: physics.peak_torso_dps,
        peak_hand_line_dps: physics.peak_hand_line_dps,
        scores,
        flags,
    })))
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid recording {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Analysis of {path} failed: {source}")]
    Analysis {
        path: PathBuf,
        source: AnalysisError,
    },
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub struct BatchResult {
    pub analyzed: u64,
    pub no_swing: u64,
    pub failed: u64,
}

pub fn load_recording(path: &Path) -> Result<SwingRecording, BatchError> {
    let file = std::fs::File::open(path).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|source| BatchError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn analyze_file(path: &Path, config: &AnalysisConfig) -> Result<AnalysisOutcome, BatchError> {
    log::debug!(
        "Analyzing: {}",
        path.file_name().and_then(|f| f.to_str()).unwrap_or("?")
    );
    let recording = load_recording(path)?;
    analyze_recording(&recording, config).map_err(|source| BatchError::Analysis {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize an outcome to JSON text.
pub fn render_outcome(outcome: &AnalysisOutcome, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(outcome)
    } else {
        serde_json::to_string(outcome)
    }
}

pub fn write_outcome(path: &Path, outcome: &AnalysisOutcome, pretty: bool) -> Result<(), BatchError> {
    let text = render_outcome(outcome, pretty).map_err(|source| BatchError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, text).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `<dir>/<stem>.swing.json`, next to the input unless `out_dir` is given.
pub fn output_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("recording");
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{stem}.{}", crate::OUTPUT_SUFFIX))
}

/// Analyze recordings in parallel with rayon.
///
/// Processes files in chunks: analyze a chunk in parallel, write its results, then
/// move on, so only one chunk of results is held in memory.
pub fn analyze_files(
    paths: &[PathBuf],
    config: &AnalysisConfig,
    jobs: usize,
    out_dir: Option<&Path>,
) -> Result<BatchResult, BatchError> {
    if paths.is_empty() {
        log::info!("No recordings to analyze");
        return Ok(BatchResult {
            analyzed: 0,
            no_swing: 0,
            failed: 0,
        });
    }

    if let Some(dir) = out_dir {
        std::fs::create_dir_all(dir).map_err(|source| BatchError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let jobs = jobs.max(1);
    log::info!("Analyzing {} recordings with {} workers", paths.len(), jobs);

    let pb = ProgressBar::new(paths.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

    let mut analyzed: u64 = 0;
    let mut no_swing: u64 = 0;
    let mut failed: u64 = 0;

    let chunk_size = jobs * 2;

    for chunk in paths.chunks(chunk_size) {
        let results: Vec<_> = pool.install(|| {
            use rayon::prelude::*;
            chunk
                .par_iter()
                .map(|path| {
                    let result = analyze_file(path, config);
                    pb.inc(1);
                    (path, result)
                })
                .collect()
        });

        for (path, result) in results {
            match result {
                Ok(outcome) => {
                    let target = output_path(path, out_dir);
                    match write_outcome(&target, &outcome, true) {
                        Ok(()) => match outcome {
                            AnalysisOutcome::Swing(_) => analyzed += 1,
                            AnalysisOutcome::NoSwing { reason } => {
                                log::info!("{}: no swing ({})", path.display(), reason);
                                no_swing += 1;
                            }
                        },
                        Err(e) => {
                            log::error!("{}", e);
                            failed += 1;
                        }
                    }
                }
                Err(e) => {
                    log::warn!("{}", e);
                    failed += 1;
                }
            }
        }

        pb.set_message(format!("{} analyzed, {} no swing, {} failed", analyzed, no_swing, failed));
    }

    pb.finish_with_message(format!(
        "Done: {} analyzed, {} no swing, {} failed",
        analyzed, no_swing, failed
    ));

    Ok(BatchResult {
        analyzed,
        no_swing,
        failed,
    })
}
