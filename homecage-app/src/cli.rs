use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use homecage_core::{Arrangement, LayoutConfig, Placement, SizeSpec, StimulusSource};
use homecage_trial::{LogFormat, TrialConfig};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Csv,
    Jsonl,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Csv => LogFormat::Csv,
            LogFormatArg::Jsonl => LogFormat::JsonLines,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "homecage")]
#[command(about = "Two-plate touchscreen trial controller with reward pulse and curriculum")]
pub struct Cli {
    /// Load every trial parameter from a JSON file; trial flags below are then ignored
    #[arg(long)]
    pub config: Option<PathBuf>,

    // display
    #[arg(long)]
    pub fullscreen: bool,
    /// Fullscreen with the cursor hidden
    #[arg(long)]
    pub kiosk: bool,
    #[arg(long, default_value_t = 1280)]
    pub window_w: u32,
    #[arg(long, default_value_t = 720)]
    pub window_h: u32,
    /// Ignore mouse input
    #[arg(long)]
    pub touch_only: bool,
    /// Outline plates and hit margins
    #[arg(long)]
    pub show_box: bool,
    #[arg(long, num_args = 3, value_names = ["R", "G", "B"], default_values_t = [0, 0, 0])]
    pub bg_rgb: Vec<u8>,
    #[arg(long, num_args = 3, value_names = ["R", "G", "B"], default_values_t = [96, 96, 96])]
    pub plate_rgb: Vec<u8>,

    // stimuli
    /// Directory with stim_<N>_r.png and optional stim_<N>_nr.png
    #[arg(long)]
    pub stim_dir: Option<PathBuf>,
    /// Plates only, no images
    #[arg(long)]
    pub no_images: bool,
    /// Placeholder sets used with --no-images or when no images are found
    #[arg(long, default_value_t = 1)]
    pub dummy_sets: u32,
    #[arg(long)]
    pub stim_px: Option<u32>,
    #[arg(long)]
    pub stim_w: Option<u32>,
    #[arg(long)]
    pub stim_h: Option<u32>,
    /// Image side as a fraction of the short screen side
    #[arg(long)]
    pub stim_frac: Option<f32>,
    #[arg(long)]
    pub plate_px: Option<u32>,
    #[arg(long)]
    pub plate_w: Option<u32>,
    #[arg(long)]
    pub plate_h: Option<u32>,
    #[arg(long, default_value_t = 300)]
    pub center_offset_px: u32,
    #[arg(long, default_value_t = 16)]
    pub edge_margin_px: u32,
    /// One centred plate instead of a left/right pair
    #[arg(long)]
    pub single_plate: bool,
    /// Place the single plate at a random position each trial
    #[arg(long, requires = "single_plate")]
    pub random_placement: bool,

    // reward and audio
    #[arg(long)]
    pub serial_port: Option<String>,
    #[arg(long, default_value_t = 115_200)]
    pub serial_baud: u32,
    #[arg(long, default_value = "PULSE")]
    pub pulse_token: String,
    /// Log reward pulses instead of writing to a serial port
    #[arg(long)]
    pub dry_run_pulse: bool,
    /// Ring the terminal bell on a correct touch
    #[arg(long)]
    pub beep: bool,

    // timing
    #[arg(long, default_value_t = 1000)]
    pub iti_min_ms: i64,
    #[arg(long, default_value_t = 1000)]
    pub iti_max_ms: i64,
    #[arg(long)]
    pub iti_correct_min_ms: Option<i64>,
    #[arg(long)]
    pub iti_correct_max_ms: Option<i64>,
    #[arg(long)]
    pub iti_error_min_ms: Option<i64>,
    #[arg(long)]
    pub iti_error_max_ms: Option<i64>,
    #[arg(long, default_value_t = 2000)]
    pub wait_release_timeout_ms: u64,
    /// Continuous release required before the next trial after a touch during the ITI; 0 disables
    #[arg(long, default_value_t = 2000)]
    pub min_release_ms_after_iti_touch: u64,

    // task
    #[arg(long, default_value_t = 5)]
    pub max_outside_before_fail: u32,
    #[arg(long, default_value_t = 0)]
    pub hit_margin_px: u32,
    #[arg(long, default_value_t = 20)]
    pub sliding_n: usize,
    /// Advance when window accuracy is strictly above this
    #[arg(long, default_value_t = 0.8)]
    pub acc_threshold: f64,
    #[arg(long)]
    pub correction_mode: bool,
    #[arg(long)]
    pub exclude_correction_from_acc: bool,

    // run
    #[arg(long, default_value = "logs")]
    pub out_dir: PathBuf,
    #[arg(long, value_enum, default_value_t = LogFormatArg::Csv)]
    pub log_format: LogFormatArg,
    #[arg(long, default_value = "STOP")]
    pub stop_file: PathBuf,
    #[arg(long, default_value_t = 240)]
    pub tick_hz: u32,
}

fn rgb(values: &[u8]) -> [u8; 3] {
    match values {
        [r, g, b] => [*r, *g, *b],
        _ => [0, 0, 0],
    }
}

impl Cli {
    pub fn background(&self) -> [u8; 3] {
        rgb(&self.bg_rgb)
    }

    pub fn plate_color(&self) -> [u8; 3] {
        rgb(&self.plate_rgb)
    }

    /// Builds and validates the trial configuration.
    pub fn trial_config(&self) -> Result<TrialConfig> {
        let config = match &self.config {
            Some(path) => TrialConfig::from_json_file(path)?,
            None => self.config_from_flags()?,
        };
        config.validated().context("invalid trial configuration")
    }

    fn config_from_flags(&self) -> Result<TrialConfig> {
        let stimuli = match (&self.stim_dir, self.no_images) {
            (_, true) => StimulusSource::Placeholder {
                count: self.dummy_sets,
            },
            (Some(path), false) => StimulusSource::Directory {
                path: path.clone(),
                dummy_sets: self.dummy_sets,
            },
            (None, false) => bail!("either --stim-dir or --no-images is required"),
        };

        let mut config = TrialConfig {
            layout: self.layout(),
            hit_margin_px: self.hit_margin_px,
            max_outside_before_fail: self.max_outside_before_fail,
            stimuli,
            ..TrialConfig::default()
        };
        config.iti.base_min_ms = self.iti_min_ms;
        config.iti.base_max_ms = self.iti_max_ms;
        config.iti.correct_min_ms = self.iti_correct_min_ms;
        config.iti.correct_max_ms = self.iti_correct_max_ms;
        config.iti.error_min_ms = self.iti_error_min_ms;
        config.iti.error_max_ms = self.iti_error_max_ms;
        config.release.min_release_after_iti_touch_ms = self.min_release_ms_after_iti_touch;
        config.release.wait_release_timeout_ms = self.wait_release_timeout_ms;
        config.progression.sliding_n = self.sliding_n;
        config.progression.acc_threshold = self.acc_threshold;
        config.progression.correction_mode = self.correction_mode;
        config.progression.exclude_correction_from_acc = self.exclude_correction_from_acc;
        config.log.out_dir = self.out_dir.clone();
        config.log.format = self.log_format.into();
        config.run.stop_file = self.stop_file.clone();
        config.run.tick_hz = self.tick_hz;
        Ok(config)
    }

    fn layout(&self) -> LayoutConfig {
        let image_size = if let Some(frac) = self.stim_frac {
            SizeSpec::ScreenFraction(frac)
        } else if let Some(px) = self.stim_px {
            SizeSpec::Square(px)
        } else if self.stim_w.is_some() || self.stim_h.is_some() {
            SizeSpec::Rect {
                width: self.stim_w.unwrap_or(240),
                height: self.stim_h.unwrap_or(240),
            }
        } else {
            SizeSpec::Square(240)
        };
        // a plate given on one axis only falls back to the image size
        let plate_size = match (self.plate_px, self.plate_w, self.plate_h) {
            (Some(px), _, _) => Some(SizeSpec::Square(px)),
            (None, Some(width), Some(height)) => Some(SizeSpec::Rect { width, height }),
            (None, _, _) => None,
        };
        LayoutConfig {
            arrangement: if self.single_plate {
                Arrangement::Single
            } else {
                Arrangement::Pair
            },
            placement: if self.random_placement {
                Placement::Random
            } else {
                Placement::Fixed
            },
            image_size,
            plate_size,
            center_offset_px: self.center_offset_px,
            edge_margin_px: self.edge_margin_px,
            ..LayoutConfig::default()
        }
    }
}
