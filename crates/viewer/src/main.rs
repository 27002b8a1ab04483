use std::env;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use worldview_engine::{run_app, LoopConfig, ViewerConfig};

#[derive(Debug, Default, PartialEq, Eq)]
struct CliOptions {
    follow: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    no_fallback: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    Help,
    Run(CliOptions),
}

fn main() -> ExitCode {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let options = match parse_args(&args) {
        Ok(CliCommand::Help) => {
            println!("{}", usage_text());
            return ExitCode::SUCCESS;
        }
        Ok(CliCommand::Run(options)) => options,
        Err(message) => {
            eprintln!("{message}\n\n{}", usage_text());
            return ExitCode::from(2);
        }
    };

    init_tracing();
    info!("=== World Viewer Startup ===");

    let mut viewer = match ViewerConfig::from_env() {
        Ok(viewer) => viewer,
        Err(err) => {
            error!(error = %err, "config_invalid");
            return ExitCode::from(1);
        }
    };
    let mut loop_config = LoopConfig::default();
    apply_options(options, &mut viewer, &mut loop_config);

    if let Err(err) = run_app(viewer, loop_config) {
        error!(error = %err, "startup_failed");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_args(args: &[String]) -> Result<CliCommand, String> {
    let mut options = CliOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => return Ok(CliCommand::Help),
            "--follow" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --follow".to_string())?;
                let name = value.trim();
                if name.is_empty() {
                    return Err("--follow requires a non-empty name".to_string());
                }
                options.follow = Some(name.to_string());
                index += 2;
            }
            "--width" => {
                options.width = Some(parse_dimension(args, index, "--width")?);
                index += 2;
            }
            "--height" => {
                options.height = Some(parse_dimension(args, index, "--height")?);
                index += 2;
            }
            "--no-fallback" => {
                options.no_fallback = true;
                index += 1;
            }
            other => return Err(format!("unknown argument '{other}'")),
        }
    }
    Ok(CliCommand::Run(options))
}

fn parse_dimension(args: &[String], index: usize, flag: &str) -> Result<u32, String> {
    let value = args
        .get(index + 1)
        .ok_or_else(|| format!("missing value for {flag}"))?;
    value
        .parse::<u32>()
        .ok()
        .filter(|pixels| *pixels > 0)
        .ok_or_else(|| format!("invalid {flag} value '{value}' (expected positive u32)"))
}

/// Command-line flags win over the environment.
fn apply_options(options: CliOptions, viewer: &mut ViewerConfig, loop_config: &mut LoopConfig) {
    if options.follow.is_some() {
        viewer.follow = options.follow;
    }
    if options.no_fallback {
        viewer.fallback_fetch = false;
    }
    if let Some(width) = options.width {
        loop_config.window_width = width;
    }
    if let Some(height) = options.height {
        loop_config.window_height = height;
    }
}

fn usage_text() -> String {
    [
        "usage: worldviewer [--follow NAME] [--width PX] [--height PX] [--no-fallback]",
        "",
        "  --follow NAME   start in play mode following NAME",
        "  --width PX      initial window width",
        "  --height PX     initial window height",
        "  --no-fallback   never fetch the world over http",
        "",
        "environment: WORLDVIEW_STREAM_URL, WORLDVIEW_SNAPSHOT_URL, WORLDVIEW_SPRITE_BASE_URL,",
        "             WORLDVIEW_ASSET_DIR, WORLDVIEW_FOLLOW, WORLDVIEW_FALLBACK_FETCH,",
        "             WORLDVIEW_REQUEST_TIMEOUT_MS, RUST_LOG",
    ]
    .join("\n")
}
