//! Swing window isolation around the global velocity peak.

use serde::Serialize;

use super::AnalysisError;
use super::Stage;
use super::kinematics::KinematicSeries;
use crate::config::WindowConfig;

/// Tolerance when snapping window bounds to sample timestamps.
const SNAP_EPSILON_MS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SwingWindow {
    pub start_ms: f64,
    pub end_ms: f64,
    pub peak_ms: f64,
    pub peak_velocity_mps: f64,
    /// Indices into `KinematicSeries::samples`.
    pub start_index: usize,
    pub end_index: usize,
    pub peak_index: usize,
}

impl SwingWindow {
    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }

    pub fn sample_count(&self) -> usize {
        self.end_index - self.start_index + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoSwingReason {
    BelowMotionThreshold { peak_mps: f64, threshold_mps: f64 },
    DurationOutOfBounds { duration_ms: f64, min_ms: f64, max_ms: f64 },
    PeakAtRecordingEdge { peak_ms: f64 },
}

impl std::fmt::Display for NoSwingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BelowMotionThreshold {
                peak_mps,
                threshold_mps,
            } => write!(f, "peak {peak_mps:.2} m/s below {threshold_mps:.2} m/s"),
            Self::DurationOutOfBounds {
                duration_ms,
                min_ms,
                max_ms,
            } => write!(f, "window {duration_ms:.0} ms outside [{min_ms:.0}, {max_ms:.0}] ms"),
            Self::PeakAtRecordingEdge { peak_ms } => {
                write!(f, "peak at {peak_ms:.0} ms sits on the recording edge")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowOutcome {
    Found(SwingWindow),
    NoSwing(NoSwingReason),
}

/// Find the single swing in the recording.
pub fn isolate(series: &KinematicSeries, cfg: &WindowConfig) -> Result<WindowOutcome, AnalysisError> {
    let velocities = &series.velocities;
    if velocities.len() < cfg.min_samples {
        return Err(AnalysisError::InsufficientInputData {
            stage: Stage::WindowIsolation,
            available: velocities.len(),
            required: cfg.min_samples,
        });
    }

    // Global maximum; strict `>` keeps the earliest on ties.
    let mut peak: Option<(usize, f64)> = None;
    for (i, v) in velocities.iter().enumerate() {
        if let Some(value) = v.combined_mps() {
            if peak.is_none_or(|(_, best)| value > best) {
                peak = Some((i, value));
            }
        }
    }

    let (peak_velocity_index, peak_value) = peak.unwrap_or((0, 0.0));
    if peak.is_none() || peak_value < cfg.min_peak_velocity_mps {
        log::info!(
            "No swing: peak {:.2} m/s below threshold {:.2}",
            peak_value,
            cfg.min_peak_velocity_mps
        );
        return Ok(WindowOutcome::NoSwing(NoSwingReason::BelowMotionThreshold {
            peak_mps: peak_value,
            threshold_mps: cfg.min_peak_velocity_mps,
        }));
    }

    // Velocity i ends at sample i + 1.
    let peak_index = peak_velocity_index + 1;
    let samples = &series.samples;
    let last = samples.len() - 1;
    let peak_ms = samples[peak_index].timestamp_ms;

    if peak_index == last {
        return Ok(WindowOutcome::NoSwing(NoSwingReason::PeakAtRecordingEdge { peak_ms }));
    }

    let half = cfg.width_ms / 2.0;
    let target_start = (peak_ms - half).max(samples[0].timestamp_ms);
    let target_end = (peak_ms + half).min(samples[last].timestamp_ms);

    // Snap inward: first sample at/after the start, last sample at/before the end.
    let start_index = samples[..=peak_index]
        .iter()
        .position(|s| s.timestamp_ms >= target_start - SNAP_EPSILON_MS)
        .unwrap_or(peak_index);
    let end_index = samples[peak_index..]
        .iter()
        .rposition(|s| s.timestamp_ms <= target_end + SNAP_EPSILON_MS)
        .map_or(peak_index, |i| peak_index + i);

    let window = SwingWindow {
        start_ms: samples[start_index].timestamp_ms,
        end_ms: samples[end_index].timestamp_ms,
        peak_ms,
        peak_velocity_mps: peak_value,
        start_index,
        end_index,
        peak_index,
    };

    let duration_ms = window.duration_ms();
    if !(window.start_ms < peak_ms && peak_ms < window.end_ms)
        || duration_ms < cfg.min_duration_ms
        || duration_ms > cfg.max_duration_ms
    {
        log::info!(
            "No swing: window {:.0}–{:.0} ms ({:.0} ms) rejected",
            window.start_ms,
            window.end_ms,
            duration_ms
        );
        return Ok(WindowOutcome::NoSwing(NoSwingReason::DurationOutOfBounds {
            duration_ms,
            min_ms: cfg.min_duration_ms,
            max_ms: cfg.max_duration_ms,
        }));
    }

    log::info!(
        "Swing window {:.0}–{:.0} ms, peak {:.2} m/s at {:.0} ms",
        window.start_ms,
        window.end_ms,
        peak_value,
        peak_ms
    );
    Ok(WindowOutcome::Found(window))
}
