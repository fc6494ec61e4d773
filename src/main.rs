use chrono::{DateTime, Local};
use clap::{Parser, Subcommand, ValueEnum};
use shutterlapse::client::CameraClient;
use shutterlapse::shutter::ShutterActuator;
use shutterlapse::{cancel, capability, exposure, monitor, schedule};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Log verbosity, mirroring the four levels the controller actually uses.
#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "ERROR")]
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "shutterlapse")]
#[command(about = "Timelapse controller for Canon cameras over CCAPI")]
#[command(long_about = "\
Timelapse controller for Canon cameras over CCAPI

Drives a camera's shutter across the local network to take scheduled,
unattended exposures. On startup the controller discovers the camera's
capability index, resolves the best shutter endpoint (preferring the manual
variant), and checks that the shot interval exceeds the current exposure
time. It then presses and releases the shutter on a fixed cadence until the
stop time passes or you press Ctrl-C, and finishes with a success/total
summary.

A stuck shutter (pressed but not released) is recovered automatically by
trying a sequence of release payloads; a camera that stays stuck is logged
loudly but does not end the run.

The camera's self-signed HTTPS certificate is accepted without verification.")]
#[command(version)]
struct Cli {
    /// Camera IP address or hostname
    #[arg(long, default_value = "192.168.12.98", global = true)]
    host: String,

    /// CCAPI port (the camera menu can change this)
    #[arg(long, default_value_t = 443, global = true)]
    port: u16,

    /// Logging level
    #[arg(long, value_enum, default_value = "INFO", global = true)]
    level: LogLevel,

    /// Mirror the log to this file in addition to stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the timelapse: discover, validate, then shoot on an interval
    Run(RunArgs),
    /// Probe the camera's shooting settings and exit
    Settings,
    /// Watch the camera's event feed (long poll) until Ctrl-C
    Monitor,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Seconds between shots
    #[arg(long, short = 'i', default_value_t = 10.0, value_parser = parse_interval)]
    interval: f64,

    /// Stop time as HH:MM; a time already passed today rolls to tomorrow
    #[arg(long, value_parser = schedule::parse_stop_time)]
    stop_at: Option<DateTime<Local>>,

    /// Enable autofocus on the first press attempt (manual focus by default)
    #[arg(long)]
    af: bool,
}

fn parse_interval(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("invalid interval '{raw}'"))?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err("interval must be positive".to_string())
    }
}

fn init_logging(level: LogLevel, log_file: Option<&Path>) -> std::io::Result<()> {
    let filter = EnvFilter::new(level.directive());
    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::io::stderr.and(std::sync::Mutex::new(file)))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.level, cli.log_file.as_deref()) {
        eprintln!("could not open log file: {err}");
        std::process::exit(1);
    }

    let client = match CameraClient::new(&cli.host, cli.port) {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(error = %err, "could not build HTTP client");
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Command::Run(args) => run_timelapse(&client, &args),
        Command::Settings => probe_settings(&client),
        Command::Monitor => run_monitor(&client),
    };
    std::process::exit(code);
}

/// Full timelapse session. Startup failures (unreachable API, no shutter
/// endpoint, interval validation) return 1 before any scheduling; a
/// completed or interrupted run returns 0.
fn run_timelapse(client: &CameraClient, args: &RunArgs) -> i32 {
    let index = match capability::discover(client) {
        Ok(index) => index,
        Err(err) => {
            tracing::error!(error = %err, "could not reach the camera API");
            return 1;
        }
    };

    let Some(endpoint) = capability::resolve_shutter_endpoint(&index) else {
        tracing::error!(
            "no POST-capable shutter endpoint found — make sure the camera \
             is in a shooting mode (not playback) and try again"
        );
        return 1;
    };
    tracing::info!(path = %endpoint.path, "using shutter endpoint");
    let shutter_path = endpoint.path.clone();

    let exposure_setting = exposure::read_exposure(client, &index);
    if !exposure::validate_interval(args.interval, &exposure_setting) {
        tracing::error!("interval validation failed — exiting");
        return 1;
    }

    let cancel = match cancel::install_ctrlc() {
        Ok(token) => token,
        Err(err) => {
            tracing::error!(error = %err, "could not install signal handler");
            return 1;
        }
    };

    let mut actuator = ShutterActuator::new(client, shutter_path);
    let mut session = schedule::Schedule::new(Duration::from_secs_f64(args.interval), args.stop_at);
    schedule::run(&mut session, &mut actuator, args.af, &cancel);
    0
}

/// Probe-only mode: fetch and report the shooting settings, exit 0.
fn probe_settings(client: &CameraClient) -> i32 {
    tracing::info!("testing camera settings API");
    let index = match capability::discover(client) {
        Ok(index) => index,
        Err(err) => {
            tracing::error!(error = %err, "could not reach the camera API");
            return 1;
        }
    };
    let setting = exposure::read_exposure(client, &index);
    match setting.seconds {
        Some(seconds) => {
            tracing::info!(value = %setting.raw, seconds, "detected shutter speed");
        }
        None => tracing::warn!("could not parse shutter speed from settings"),
    }
    tracing::info!("probe complete");
    0
}

/// Event monitor mode: reachability check, then long-poll until Ctrl-C.
fn run_monitor(client: &CameraClient) -> i32 {
    if !client.check_camera() {
        return 1;
    }
    let cancel = match cancel::install_ctrlc() {
        Ok(token) => token,
        Err(err) => {
            tracing::error!(error = %err, "could not install signal handler");
            return 1;
        }
    };
    monitor::run(client, &cancel);
    0
}
