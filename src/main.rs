use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use swingtrace::analyzer::{self, AnalysisOutcome};
use swingtrace::anthropometry::{AnthropometricModel, AthleteProfile, Handedness};
use swingtrace::config::{AnalysisConfig, AppConfig, Band, FootDownReference};

#[derive(Parser)]
#[command(name = "swingtrace", version, about = "Baseball swing analyzer for pose recordings")]
struct Cli {
    /// Config file (defaults to the XDG config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FootDownArg {
    Stance,
    Load,
}

impl From<FootDownArg> for FootDownReference {
    fn from(arg: FootDownArg) -> Self {
        match arg {
            FootDownArg::Stance => FootDownReference::Stance,
            FootDownArg::Load => FootDownReference::Load,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum BatsArg {
    Right,
    Left,
}

/// Per-run overrides layered on top of the config file.
#[derive(Args, Default)]
struct Overrides {
    /// Swing window width (ms)
    #[arg(long)]
    window_ms: Option<f64>,

    /// Shortest accepted window (ms)
    #[arg(long)]
    min_window_ms: Option<f64>,

    /// Longest accepted window (ms)
    #[arg(long)]
    max_window_ms: Option<f64>,

    /// Minimum peak hand/bat speed for a swing (m/s)
    #[arg(long)]
    min_peak_velocity: Option<f64>,

    /// Minimum gap between consecutive events (ms)
    #[arg(long)]
    min_phase_gap_ms: Option<f64>,

    /// Lower tempo clamp
    #[arg(long)]
    tempo_min: Option<f64>,

    /// Upper tempo clamp
    #[arg(long)]
    tempo_max: Option<f64>,

    /// Optimal tempo band, e.g. "2.0,3.5"
    #[arg(long, value_parser = parse_band)]
    optimal_tempo: Option<Band>,

    /// Optimal hip–shoulder separation band (ms), e.g. "40,120"
    #[arg(long, value_parser = parse_band)]
    optimal_separation: Option<Band>,

    /// Acceptable hip–shoulder separation band (ms), e.g. "0,200"
    #[arg(long, value_parser = parse_band)]
    wide_separation: Option<Band>,

    /// What the pelvis must open past for foot-down
    #[arg(long, value_enum)]
    foot_down: Option<FootDownArg>,

    /// Bat speed cap (mph)
    #[arg(long)]
    bat_speed_cap: Option<f64>,

    /// Share of bat length used as lever
    #[arg(long)]
    barrel_fraction: Option<f64>,

    /// Share of arm length used as lever
    #[arg(long)]
    arm_axis_fraction: Option<f64>,
}

impl Overrides {
    fn apply(&self, c: &mut AnalysisConfig) {
        fn set<T: Copy>(slot: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *slot = v;
            }
        }
        set(&mut c.window.width_ms, self.window_ms);
        set(&mut c.window.min_duration_ms, self.min_window_ms);
        set(&mut c.window.max_duration_ms, self.max_window_ms);
        set(&mut c.window.min_peak_velocity_mps, self.min_peak_velocity);
        set(&mut c.events.min_phase_gap_ms, self.min_phase_gap_ms);
        set(&mut c.events.tempo_min, self.tempo_min);
        set(&mut c.events.tempo_max, self.tempo_max);
        set(&mut c.events.optimal_tempo, self.optimal_tempo);
        set(&mut c.events.foot_down_reference, self.foot_down.map(Into::into));
        set(&mut c.scoring.optimal_separation_ms, self.optimal_separation);
        set(&mut c.scoring.wide_separation_ms, self.wide_separation);
        set(&mut c.physics.bat_speed_cap_mph, self.bat_speed_cap);
        set(&mut c.physics.barrel_fraction, self.barrel_fraction);
        set(&mut c.physics.arm_axis_fraction, self.arm_axis_fraction);
    }
}

fn parse_band(s: &str) -> std::result::Result<Band, String> {
    let (low, high) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LOW,HIGH, got '{s}'"))?;
    let low: f64 = low.trim().parse().map_err(|e| format!("bad low bound: {e}"))?;
    let high: f64 = high.trim().parse().map_err(|e| format!("bad high bound: {e}"))?;
    if low > high {
        return Err(format!("low bound {low} exceeds high bound {high}"));
    }
    Ok(Band::new(low, high))
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one recording and print (or write) the result as JSON
    Analyze {
        /// Recording JSON file
        input: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Analyze every recording under the given files/directories in parallel
    Batch {
        /// Files or directories to walk for *.json recordings
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Directory for results (defaults to config output_dir, else next to each input)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Show the anthropometric model and bat-speed capacity for an athlete
    Profile {
        /// Height (inches)
        #[arg(long)]
        height: f64,

        /// Weight (lbs)
        #[arg(long)]
        weight: f64,

        /// Age (years)
        #[arg(long)]
        age: u32,

        /// Wingspan (inches)
        #[arg(long)]
        wingspan: Option<f64>,

        /// Bat length (inches)
        #[arg(long, default_value = "33")]
        bat_length: f64,

        /// Bat weight (oz)
        #[arg(long, default_value = "30")]
        bat_weight: f64,

        /// Batting side
        #[arg(long, value_enum, default_value = "right")]
        bats: BatsArg,

        /// Print the full model as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Explicit --config must parse; the default location falls back to defaults.
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path).context("Failed to load config")?,
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Analyze {
            input,
            out,
            pretty,
            overrides,
        } => {
            let mut analysis = config.analysis.clone();
            overrides.apply(&mut analysis);
            analysis.validate().context("Invalid analysis settings")?;

            let outcome = analyzer::analyze_file(&input, &analysis)
                .with_context(|| format!("Failed to analyze {}", input.display()))?;

            match &out {
                Some(path) => {
                    analyzer::write_outcome(path, &outcome, pretty).context("Failed to write result")?;
                    println!("Wrote {}", path.display());
                }
                None => {
                    let text = analyzer::render_outcome(&outcome, pretty)
                        .context("Failed to serialize result")?;
                    println!("{text}");
                }
            }

            match &outcome {
                AnalysisOutcome::Swing(a) => log::info!(
                    "tempo {:.2}, bat {}, overall {:.0}, KRS {:.0} ({:?})",
                    a.scores.tempo.ratio,
                    a.bat_speed
                        .map(|b| format!("{:.1} mph", b.mph))
                        .unwrap_or_else(|| "n/a".into()),
                    a.scores.overall_score,
                    a.scores.krs.total,
                    a.scores.krs.level
                ),
                AnalysisOutcome::NoSwing { reason } => log::info!("No swing: {}", reason),
            }
        }

        Commands::Batch {
            paths,
            jobs,
            out_dir,
            overrides,
        } => {
            let mut analysis = config.analysis.clone();
            overrides.apply(&mut analysis);
            analysis.validate().context("Invalid analysis settings")?;

            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };
            let out_dir = out_dir.or(config.output_dir.clone());
            let recordings = swingtrace::scanner::find_recordings(&paths);
            if recordings.is_empty() {
                anyhow::bail!("No *.json recordings found under the given paths.");
            }

            let result = analyzer::analyze_files(&recordings, &analysis, workers, out_dir.as_deref())
                .context("Batch analysis failed")?;
            println!(
                "Batch complete: {} analyzed, {} no swing, {} failed",
                result.analyzed, result.no_swing, result.failed
            );
        }

        Commands::Profile {
            height,
            weight,
            age,
            wingspan,
            bat_length,
            bat_weight,
            bats,
            json,
        } => {
            let profile = AthleteProfile {
                height_inches: height,
                weight_lbs: weight,
                age,
                wingspan_inches: wingspan,
                bat_length_inches: bat_length,
                bat_weight_oz: bat_weight,
                bats: match bats {
                    BatsArg::Right => Handedness::Right,
                    BatsArg::Left => Handedness::Left,
                },
            };
            let model = AnthropometricModel::new(&profile).context("Invalid athlete profile")?;
            let summary = model.summary();

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary).context("Failed to serialize profile")?
                );
                return Ok(());
            }

            println!(
                "Athlete: {:.2} m, {:.1} kg, age {}{}",
                summary.height_m,
                summary.weight_kg,
                summary.age,
                if summary.youth_ratios { " (youth ratios)" } else { "" }
            );
            println!();
            println!(
                "{:<10} {:>3} {:>9} {:>9} {:>9} {:>12}",
                "Segment", "n", "Mass kg", "Length m", "CoM m", "I kg·m²"
            );
            println!("{}", "-".repeat(57));
            for s in &summary.segments {
                println!(
                    "{:<10} {:>3} {:>9.2} {:>9.3} {:>9.3} {:>12.4}",
                    s.segment.name(),
                    s.count,
                    s.mass_kg,
                    s.length_m,
                    s.com_m,
                    s.inertia_kg_m2
                );
            }
            println!();
            println!(
                "Arm length:    {:.3} m ({:?})",
                summary.arm_length.metres, summary.arm_length.source
            );
            println!("Torso length:  {:.3} m", summary.torso_length_m);
            println!("Leg length:    {:.3} m", summary.leg_length_m);
            println!("Pelvis I:      {:.4} kg·m²", summary.pelvis_inertia_kg_m2);
            println!("Torso I:       {:.4} kg·m²", summary.torso_inertia_kg_m2);
            println!("Arm I:         {:.4} kg·m² (each, about shoulder)", summary.arm_inertia_kg_m2);
            println!("Bat I:         {:.4} kg·m² (about knob)", summary.bat_inertia_kg_m2);
            println!();
            println!(
                "Bat-speed capacity: {:.1} mph (weight ×{:.3}, arm ×{:.3}, age ×{:.3}, bat ×{:.3}, height ×{:.3})",
                summary.capacity.bat_speed_mph,
                summary.capacity.weight_factor,
                summary.capacity.arm_factor,
                summary.capacity.age_factor,
                summary.capacity.bat_factor,
                summary.capacity.height_calibration
            );
        }

        Commands::Config => {
            if let Some(path) = cli.config.clone().or_else(AppConfig::config_path) {
                log::info!("Config path: {}", path.display());
            }
            let text = toml::to_string_pretty(&config).context("Failed to render config")?;
            print!("{text}");
        }
    }

    Ok(())
}
