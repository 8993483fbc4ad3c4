use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use skyreel::{
    Canvas as _, ChartCanvas, ChartSession, ChartStyle, Fps, LayerCommand, OutputMode,
    PlaybackOpts, PlaybackOutcome, Query, RasterOpts,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "skyreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Draw the whole query and save the chart as a PNG.
    Still(StillArgs),
    /// Replay the query hour by hour, as a paced preview or an MP4 (requires `ffmpeg` on PATH).
    Animate(AnimateArgs),
}

#[derive(Args, Debug)]
struct ChartArgs {
    /// Input query JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Layer shortcut to hide before drawing (B, L, M, T, G). Repeatable.
    #[arg(long = "hide")]
    hide: Vec<char>,

    /// Threshold guide altitude in degrees.
    #[arg(long)]
    threshold: Option<f64>,

    /// Lowest altitude shown.
    #[arg(long, allow_hyphen_values = true)]
    alt_min: Option<f64>,

    /// Highest altitude shown.
    #[arg(long, allow_hyphen_values = true)]
    alt_max: Option<f64>,

    /// Frame width in pixels.
    #[arg(long, default_value_t = 1920)]
    width: u32,

    /// Frame height in pixels.
    #[arg(long, default_value_t = 1080)]
    height: u32,
}

#[derive(Parser, Debug)]
struct StillArgs {
    #[command(flatten)]
    chart: ChartArgs,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct AnimateArgs {
    #[command(flatten)]
    chart: ChartArgs,

    /// Output MP4 path. Without it the run is previewed in real time.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Days visible at once (1..=days in the query). Defaults to all of them.
    #[arg(long)]
    day_cap: Option<i32>,

    /// Frames per second.
    #[arg(long, default_value_t = 50)]
    fps: u32,

    /// Walk the run without drawing or pacing frames.
    #[arg(long, conflicts_with = "out")]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Still(args) => cmd_still(args),
        Command::Animate(args) => cmd_animate(args),
    }
}

fn present(args: &ChartArgs) -> anyhow::Result<(ChartSession<ChartCanvas>, Query)> {
    let query = Query::load(&args.in_path)?;

    let style = ChartStyle {
        raster: RasterOpts {
            width: args.width,
            height: args.height,
            ..RasterOpts::default()
        },
        ..ChartStyle::default()
    };
    let canvas = ChartCanvas::new(style.raster);
    let mut session = ChartSession::new(canvas, style)?;

    for key in &args.hide {
        let cmd = session
            .layers()
            .command_for_key(*key)
            .with_context(|| format!("no layer has the shortcut '{key}'"))?;
        session.apply(LayerCommand::Hide(cmd.layer()))?;
    }
    if let Some(value) = args.threshold {
        session.set_threshold(value)?;
    }
    if args.alt_min.is_some() || args.alt_max.is_some() {
        let (min, max) = session.style().altitude_range;
        session.set_altitude_range(args.alt_min.unwrap_or(min), args.alt_max.unwrap_or(max))?;
    }

    session.present(&query)?;
    Ok((session, query))
}

fn cmd_still(args: StillArgs) -> anyhow::Result<()> {
    let (mut session, _) = present(&args.chart)?;
    let frame = session.canvas_mut().capture()?;

    skyreel::encode::ffmpeg::ensure_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_animate(args: AnimateArgs) -> anyhow::Result<()> {
    let (mut session, query) = present(&args.chart)?;
    let fps = Fps::new(args.fps, 1)?;

    let output = match (&args.out, args.dry_run) {
        (_, true) => OutputMode::DryRun,
        (Some(path), false) => OutputMode::Export {
            path: path.clone(),
            fps,
            hold_frames: None,
        },
        (None, false) => OutputMode::Preview { fps },
    };
    let opts = PlaybackOpts {
        day_cap: Some(
            args.day_cap
                .unwrap_or_else(|| i32::try_from(query.total_days()).unwrap_or(i32::MAX)),
        ),
        output,
    };

    let mut frames = opts.frame_out();
    match session.animate(&opts, frames.as_mut(), None)? {
        PlaybackOutcome::Completed(stats) => {
            eprintln!(
                "replayed {} days: {} frames, {} expiries",
                query.total_days(),
                stats.frames,
                stats.expiries
            );
            if let Some(out) = &args.out {
                eprintln!("wrote {}", out.display());
            }
        }
        PlaybackOutcome::Cancelled => eprintln!("playback cancelled"),
    }
    Ok(())
}
