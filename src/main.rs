use crate::assets::MAX_DELAY_SECS;
use crate::capture::{CaptureOpts, FrameSource, SyntheticSource};
use crate::config::{Config, app_name, version};
use crate::display::{FixedSurface, FrameTransform, LogSink, MirrorFlip, RenderSink};
use crate::pipeline::{PipelineController, PipelineSignal};
use clap::{Arg, Command, value_parser};
use log::{error, info};
use std::time::Duration;
use std::{panic, process};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

pub mod assets;
pub mod capture;
pub mod config;
pub mod display;
pub mod pipeline;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let matches = Command::new(app_name())
        .version(version())
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("delay")
                .short('d')
                .long("delay")
                .value_name("SECONDS")
                .help(format!("Playback delay in seconds (0..={}).", MAX_DELAY_SECS))
                .value_parser(value_parser!(i64)),
        )
        .arg(
            Arg::new("fps")
                .long("fps")
                .value_name("FPS")
                .help("Capture rate cap.")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .value_name("PIXELS")
                .help("Capture width.")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("height")
                .long("height")
                .value_name("PIXELS")
                .help("Capture height.")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("duration")
                .long("duration")
                .value_name("SECONDS")
                .help("Stop after this many seconds; runs until Ctrl-C when absent.")
                .value_parser(value_parser!(u64)),
        )
        .get_matches();

    let mut config = Config::new();
    if let Some(delay) = matches.get_one::<i64>("delay") {
        config.delay_secs = *delay;
    }
    if let Some(fps) = matches.get_one::<u32>("fps") {
        config.fps = *fps;
    }
    if let Some(width) = matches.get_one::<u32>("width") {
        config.width = *width;
    }
    if let Some(height) = matches.get_one::<u32>("height") {
        config.height = *height;
    }
    config.duration_secs = matches.get_one::<u64>("duration").copied();

    // kill the main thread as soon as a secondary thread panics
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // invoke the default handler and exit the process
        orig_hook(panic_info);
        process::exit(105);
    }));

    // gracefully stop the pipeline when receiving SIGINT, SIGTERM, or SIGHUP
    let shutdown = CancellationToken::new();
    let shutdown_handle = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_handle.cancel();
    })
    .expect("Error setting Ctrl-C handler");

    if let Err(e) = run(config, shutdown).await {
        error!("{} failed: {}", app_name(), e);
        process::exit(1);
    }
}

async fn run(config: Config, shutdown: CancellationToken) -> anyhow::Result<()> {
    let mut controller = PipelineController::new(config.delay_secs)?;

    let (frame_tx, frame_rx) = mpsc::channel(128);
    let mut delayed_rx = controller.launch_pipeline(frame_rx)?;

    let mut source = SyntheticSource::new(controller.clock().clone(), config.width, config.height);
    let (_opts_tx, opts_rx) = watch::channel(CaptureOpts {
        paused: false,
        max_fps: config.fps,
    });
    if let Err(e) = source.start_capture(frame_tx, opts_rx).await {
        let _ = controller
            .signal_sender()
            .send(PipelineSignal::DeviceError(e.to_string()))
            .await;
        return Err(e);
    }

    // Headless host: the drawing surface exists up front
    controller.bind_surface(FixedSurface::new(1));
    controller.play()?;
    info!(
        "Playing {}x{} at up to {}fps, delayed {}s",
        config.width, config.height, config.fps, config.delay_secs
    );

    let mirror = MirrorFlip::new(1);
    let mut sink = LogSink::new();
    let mut attached = false;

    let deadline = config
        .duration_secs
        .map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));

    loop {
        tokio::select! {
            frame = delayed_rx.recv() => {
                let Some(frame) = frame else { break };
                if !attached && let Some(handle) = controller.surface_binding().handle() {
                    sink.attach(handle);
                    attached = true;
                }
                if attached {
                    sink.draw(mirror.apply(frame));
                }
            }
            _ = shutdown.cancelled() => {
                info!("Interrupted");
                break;
            }
            _ = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            } => {
                info!("Run duration reached");
                break;
            }
        }
    }

    controller.stop();
    source.stop_capture().await?;
    info!(
        "Drew {} delayed frames; {}",
        sink.frames_drawn(),
        controller.health().summary()
    );
    controller.shutdown();
    Ok(())
}
