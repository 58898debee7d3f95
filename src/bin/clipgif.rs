use std::{
    path::{Path, PathBuf},
    time::Duration,
};

#[cfg(feature = "server")]
use std::net::SocketAddr;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use clipgif::{
    ConversionRequest, Converter, ConverterOptions, FfmpegBackend, FfmpegLogLevel, parse_timecode,
};
use serde_json::json;

#[cfg(feature = "server")]
use clipgif::{AccessGate, ServerOptions};

const CLI_AFTER_HELP: &str = "Examples:\n  clipgif convert clip.mp4 --start 2 --end 7 --fps 10 --width 320\n  clipgif probe clip.mp4 --json\n  CLIPGIF_SECRET=hunter2 clipgif serve --bind 0.0.0.0:8080\n  clipgif completions zsh > _clipgif";

#[derive(Debug, Parser)]
#[command(
    name = "clipgif",
    version,
    about = "Convert video clips into animated GIFs",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory for scratch files (defaults to the system temp directory).
    #[arg(long, global = true)]
    temp_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert a video file to an animated GIF.
    #[command(
        about = "Convert a video to GIF",
        after_help = "Examples:\n  clipgif convert clip.mp4\n  clipgif convert clip.avi --out loop.gif --start 00:02 --end 00:07 --fps 15 --speed 2"
    )]
    Convert {
        /// Input video path.
        input: PathBuf,
        /// Output path (defaults to the input name with a .gif extension).
        #[arg(long)]
        out: Option<PathBuf>,
        /// Start time (seconds, MM:SS or HH:MM:SS).
        #[arg(long, default_value = "0")]
        start: String,
        /// End time; omit to run to the end of the clip.
        #[arg(long)]
        end: Option<String>,
        /// Output frame rate.
        #[arg(long, default_value_t = 10)]
        fps: u32,
        /// Output width in pixels (0 keeps the source width).
        #[arg(long, default_value_t = 0)]
        width: u32,
        /// Playback speed factor.
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
        /// Loop count (0 loops forever).
        #[arg(long = "loop", default_value_t = 0)]
        loop_count: u16,
        /// Write full frames instead of inter-frame deltas.
        #[arg(long)]
        no_optimize: bool,
        /// Print a machine-readable summary.
        #[arg(long)]
        json: bool,
    },

    /// Print stream information for a video file.
    #[command(
        about = "Print video information",
        visible_alias = "info",
        after_help = "Examples:\n  clipgif probe clip.mp4\n  clipgif probe clip.mp4 --json"
    )]
    Probe {
        /// Input video path.
        input: PathBuf,
        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Serve the upload form over HTTP.
    #[cfg(feature = "server")]
    #[command(about = "Run the HTTP upload service")]
    Serve {
        /// Listen address.
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
        /// Shared access secret.
        #[arg(long, env = "CLIPGIF_SECRET", hide_env_values = true)]
        secret: Option<String>,
        /// Read the shared access secret from a file.
        #[arg(long, conflicts_with = "secret")]
        secret_file: Option<PathBuf>,
        /// Per-conversion timeout in seconds (0 disables it).
        #[arg(long, default_value_t = 300)]
        timeout: u64,
        /// Largest accepted upload in MiB.
        #[arg(long, default_value_t = 512)]
        max_upload_mb: u64,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn default_output_path(input: &Path) -> PathBuf {
    let name = clipgif::derive_file_name(&input.to_string_lossy());
    input.with_file_name(name)
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let default_filter = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    if let Some(level) = &global.log_level {
        let parsed: FfmpegLogLevel = level
            .parse()
            .map_err(|_| format!("unsupported --log-level: {level}"))?;
        clipgif::set_ffmpeg_log_level(parsed);
    }

    Ok(())
}

fn converter_options(global: &GlobalOptions) -> ConverterOptions {
    let options = ConverterOptions::new();
    match &global.temp_dir {
        Some(directory) => options.with_temp_directory(directory),
        None => options,
    }
}

fn spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]") {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

#[cfg(feature = "server")]
fn read_secret(
    secret: Option<String>,
    secret_file: Option<PathBuf>,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    match secret_file {
        Some(path) => {
            let contents = std::fs::read_to_string(&path)
                .map_err(|error| format!("cannot read {}: {error}", path.display()))?;
            Ok(Some(contents.trim_end_matches(['\r', '\n']).to_string()))
        }
        None => Ok(secret),
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Convert {
            input,
            out,
            start,
            end,
            fps,
            width,
            speed,
            loop_count,
            no_optimize,
            json,
        } => {
            let output = out.unwrap_or_else(|| default_output_path(&input));
            ensure_writable_path(&output, cli.global.overwrite)?;

            let end_seconds = match &end {
                Some(end) => parse_timecode(end)?,
                None => 0.0,
            };
            let request = ConversionRequest::new()
                .with_range(parse_timecode(&start)?, end_seconds)
                .with_frames_per_second(fps)
                .with_target_width(width)
                .with_speed(speed)
                .with_loop_count(loop_count)
                .with_optimize(!no_optimize);

            let converter = Converter::new(FfmpegBackend::new(), converter_options(&cli.global));
            let bar = spinner(format!("converting {}", input.display()));
            let result = converter.convert(&input, &request);
            bar.finish_and_clear();
            let gif = result?;
            gif.save(&output)?;

            if json {
                let payload = json!({
                    "output": output.display().to_string(),
                    "width": gif.size().width,
                    "height": gif.size().height,
                    "frames": gif.frame_count(),
                    "duration_seconds": gif.duration().as_secs_f64(),
                    "bytes": gif.bytes().len(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} {} ({}, {} frames, {} bytes)",
                    "saved".green().bold(),
                    output.display(),
                    gif.size(),
                    gif.frame_count(),
                    gif.bytes().len(),
                );
            }
        }
        Commands::Probe { input, json } => {
            let converter = Converter::new(FfmpegBackend::new(), converter_options(&cli.global));
            let info = converter.probe(&input)?;
            if json {
                let payload = json!({
                    "format": info.format,
                    "codec": info.codec,
                    "width": info.frame_size.width,
                    "height": info.frame_size.height,
                    "fps": info.frames_per_second,
                    "duration_seconds": info.duration.as_secs_f64(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Format: {}", info.format);
                println!("Duration: {:.3}s", info.duration.as_secs_f64());
                println!(
                    "Video: {} @ {:.2} fps [{}]",
                    info.frame_size, info.frames_per_second, info.codec,
                );
            }
        }
        #[cfg(feature = "server")]
        Commands::Serve {
            bind,
            secret,
            secret_file,
            timeout,
            max_upload_mb,
        } => {
            let gate = AccessGate::from_optional(read_secret(secret, secret_file)?)?;
            let max_upload_bytes = max_upload_mb.saturating_mul(1024 * 1024);
            let options =
                converter_options(&cli.global).with_max_upload_bytes(Some(max_upload_bytes));
            let converter = Converter::new(FfmpegBackend::new(), options);
            let server_options = ServerOptions::new()
                .with_bind(bind)
                .with_timeout((timeout > 0).then(|| Duration::from_secs(timeout)))
                // Multipart framing and the text fields need a little headroom.
                .with_body_limit(usize::try_from(max_upload_bytes)?.saturating_add(1024 * 1024));

            println!("{} http://{}", "listening on".green().bold(), bind);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(clipgif::server::serve(gate, converter, server_options))?;
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "clipgif", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
