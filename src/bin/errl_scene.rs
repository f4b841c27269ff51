use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "errl-scene", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a new base scene.
    New(NewArgs),
    /// Import and validate a scene, printing a summary.
    Validate(ValidateArgs),
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
}

#[derive(Parser, Debug)]
struct NewArgs {
    /// Output scene JSON.
    #[arg(long)]
    out: PathBuf,

    /// Scene name.
    #[arg(long, default_value = "Untitled Scene")]
    name: String,

    /// Asset id of an entity to seed the main layer with.
    #[arg(long)]
    seed_asset: Option<String>,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Asset manifest JSON; file paths resolve relative to its directory.
    #[arg(long)]
    registry: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Playback time in milliseconds.
    #[arg(long, default_value_t = 0.0)]
    time_ms: f64,

    /// Output width in pixels.
    #[arg(long, default_value_t = 1920)]
    width: u32,

    /// Output height in pixels.
    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Render without background.
    #[arg(long, default_value_t = false)]
    transparent: bool,

    /// Max time to wait for asset loads.
    #[arg(long, default_value_t = 5000)]
    wait_ms: u64,

    /// Asset loader threads.
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::New(args) => cmd_new(args),
        Command::Validate(args) => cmd_validate(args),
        Command::Frame(args) => cmd_frame(args),
    }
}

fn cmd_new(args: NewArgs) -> anyhow::Result<()> {
    let scene = errl_scene::create_base_scene(&args.name, args.seed_asset.as_deref());
    create_parent_dir(&args.out)?;
    errl_scene::save_scene(&args.out, &scene)
        .with_context(|| format!("write scene '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let scene = errl_scene::load_scene(&args.in_path)
        .with_context(|| format!("validate '{}'", args.in_path.display()))?;
    println!(
        "ok: {} ({}) {}x{} layers={} entities={} fx={} weather={}",
        scene.name,
        scene.id,
        scene.viewport.width,
        scene.viewport.height,
        scene.layers.len(),
        scene.entities.len(),
        scene.fx.global_fx.len(),
        scene.weather.len(),
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let scene = errl_scene::load_scene(&args.in_path)
        .with_context(|| format!("load scene '{}'", args.in_path.display()))?;
    let registry = errl_scene::StaticAssetRegistry::from_path(&args.registry)
        .with_context(|| format!("load registry '{}'", args.registry.display()))?;
    let assets_root = args.registry.parent().unwrap_or_else(|| Path::new("."));
    let source = errl_scene::FsAssetSource::new(assets_root);

    let opts = errl_scene::RendererOpts {
        loader_threads: args.threads,
        ..errl_scene::RendererOpts::default()
    };
    let mut renderer = errl_scene::SceneRenderer::new(Arc::new(registry), Arc::new(source), opts)?;
    let export = errl_scene::ImageExportOpts {
        width: args.width,
        height: args.height,
        transparent_bg: args.transparent,
        asset_wait: Duration::from_millis(args.wait_ms),
    };
    let (frame, report) = renderer.render_frame(&scene, args.time_ms, &export)?;
    if !report.is_complete() {
        tracing::warn!(?report, "frame rendered with placeholders");
    }

    create_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &frame.to_straight_rgba(),
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn create_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}
