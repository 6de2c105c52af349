mod app;
mod audio;
mod cli;
mod pacing;
mod render;
mod serial;

use anyhow::{Context, Result};
use clap::Parser;
use homecage_core::{Curriculum, FallbackReason};
use homecage_trial::{Peripherals, RewardPulse};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use app::{App, DisplayOptions};
use cli::Cli;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(env_filter)
        .init();
}

fn peripherals(cli: &Cli) -> Result<Peripherals> {
    let reward: Box<dyn RewardPulse> = if cli.dry_run_pulse {
        Box::new(serial::DryRunPulse::default())
    } else {
        let device = cli
            .serial_port
            .as_deref()
            .context("--serial-port is required unless --dry-run-pulse is set")?;
        Box::new(serial::open(device, cli.serial_baud, &cli.pulse_token)?)
    };
    let mut peripherals = Peripherals::new(reward);
    if cli.beep {
        peripherals = peripherals.with_audio(Box::new(audio::TerminalBell::stderr()));
    }
    Ok(peripherals)
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.trial_config()?;

    let curriculum = Curriculum::load(&config.stimuli);
    match &curriculum.fallback {
        Some(FallbackReason::Unreadable(err)) => {
            warn!(%err, sets = curriculum.sets.len(), "using placeholder stimulus sets");
        }
        Some(FallbackReason::NoImages(path)) => {
            warn!(
                dir = %path.display(),
                sets = curriculum.sets.len(),
                "no stimulus images found, using placeholder sets"
            );
        }
        None => {}
    }
    info!(
        sets = curriculum.sets.len(),
        first = ?curriculum.sets.first().map(|s| s.label()),
        "curriculum loaded"
    );

    let peripherals = peripherals(&cli).context("reward pulse unavailable")?;
    let options = DisplayOptions {
        fullscreen: cli.fullscreen,
        kiosk: cli.kiosk,
        window: (cli.window_w, cli.window_h),
        touch_only: cli.touch_only,
        show_box: cli.show_box,
        background: cli.background(),
        plate: cli.plate_color(),
    };
    App::new(options, config, curriculum.sets, peripherals).run()
}
