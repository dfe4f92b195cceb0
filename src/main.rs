mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

use streamforge::{
    config,
    encode::FfmpegEncoder,
    ladder,
    notify::Notifier,
    pipeline::Pipeline,
    probe::{FfprobeProber, Prober},
    queue::{AdmissionController, TaskRegistry, WorkerPool},
    server::{self, AppContext},
    store::S3Store,
    tools::ToolRegistry,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on the
    // verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "streamforge=trace,tower_http=debug".to_string()
        } else {
            "streamforge=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Serve { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve(host, port, cli.config.as_deref()))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, cli.config.as_deref()))
        }
        Commands::Plan { file } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(plan_file(&file, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("streamforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn serve(host: String, port: u16, config_path: Option<&std::path::Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;
    config.server.host = host;
    config.server.port = port;

    for warning in config.validate() {
        tracing::warn!("config: {}", warning);
    }
    if config.store.bucket.is_empty() {
        anyhow::bail!("store.bucket must be configured to serve");
    }

    let tools = ToolRegistry::discover(&config.tools);
    let ffmpeg = tools
        .require("ffmpeg")
        .context("ffmpeg is required to serve")?
        .to_path_buf();
    let ffprobe = tools
        .require("ffprobe")
        .context("ffprobe is required to serve")?
        .to_path_buf();

    let slots = config.queue.slots();
    tracing::info!(slots, "starting worker pool");

    let registry = Arc::new(TaskRegistry::new());
    let admission = Arc::new(AdmissionController::new(slots, Arc::clone(&registry)));
    let notifier = Arc::new(Notifier::new(&config.notify));
    let store = Arc::new(S3Store::new(&config.store));
    let prober = Arc::new(FfprobeProber::new(
        ffprobe,
        Duration::from_secs(config.encoding.probe_timeout_secs),
    ));
    let encoder = Arc::new(FfmpegEncoder::new(ffmpeg));

    let pipeline = Arc::new(Pipeline::new(
        &config,
        Arc::clone(&registry),
        store,
        prober,
        encoder,
        notifier,
    )?);

    let workers = Arc::new(WorkerPool::spawn(
        slots,
        slots * config.queue.queue_depth_per_slot,
        pipeline,
        Arc::clone(&admission),
        Arc::clone(&registry),
    ));

    let ctx = AppContext {
        config: Arc::new(config.clone()),
        registry,
        admission,
        workers,
    };

    server::start_server(config, ctx).await
}

async fn probe_file(
    file: &std::path::Path,
    json: bool,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let prober = build_prober(&config)?;
    let media = prober.probe(file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&media)?);
    } else {
        println!("File: {}", file.display());
        println!(
            "Video: {} {}x{} @ {:.3} fps",
            media.video_codec.as_deref().unwrap_or("unknown"),
            media.width,
            media.height,
            media.frame_rate
        );
        let secs = media.duration_secs as u64;
        println!("Duration: {:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60);
        println!("Audio: {}", if media.has_audio { "yes" } else { "no" });
    }

    Ok(())
}

async fn plan_file(file: &std::path::Path, config_path: Option<&std::path::Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let prober = build_prober(&config)?;
    let media = prober.probe(file).await?;

    let ladder = ladder::resolve_ladder(&config.encoding)?;
    let renditions =
        ladder::select_renditions(&ladder, &media, config.encoding.short_source_secs);

    println!("Source: {}x{}, {:.1}s", media.width, media.height, media.duration_secs);
    println!("Renditions:");
    for p in renditions {
        println!(
            "  {:>6}  {}x{}  video {}k  audio {}k",
            p.name, p.width, p.height, p.video_kbps, p.audio_kbps
        );
    }

    Ok(())
}

fn build_prober(config: &config::Config) -> Result<FfprobeProber> {
    let tools = ToolRegistry::discover(&config.tools);
    let ffprobe = tools.require("ffprobe").context("ffprobe is required")?;
    Ok(FfprobeProber::new(
        ffprobe.to_path_buf(),
        Duration::from_secs(config.encoding.probe_timeout_secs),
    ))
}

fn check_tools(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools);

    let mut all_ok = true;
    for info in tools.check_all() {
        if info.available {
            println!(
                "✓ {} at {} ({})",
                info.name,
                info.path
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                info.version.unwrap_or_else(|| "unknown version".into())
            );
        } else {
            println!("✗ {} not found", info.name);
            all_ok = false;
        }
    }

    if !all_ok {
        anyhow::bail!("Some required tools are missing");
    }
    Ok(())
}

fn validate_config(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    // Resolving the ladder catches typos in rendition names.
    ladder::resolve_ladder(&config.encoding)?;

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("Configuration is valid.");
    } else {
        println!("Configuration loaded with {} warning(s):", warnings.len());
        for w in &warnings {
            println!("  - {}", w);
        }
    }

    Ok(())
}
