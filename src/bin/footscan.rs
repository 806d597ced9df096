//! footscan - classify a photo or detect abnormal areas in it

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;

use footscan::ingest::CameraSource;
use footscan::ui::{ConsoleView, Ui};
use footscan::{
    build_registry, AppConfig, Dispatcher, LocalImageSource, Mode, OverlayOptions, PickRequest,
    Screen, Session, SessionHandle, UiEvent,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Inference mode: classify or detect (defaults to the configured mode).
    #[arg(long)]
    mode: Option<Mode>,
    /// Photo to analyse.
    #[arg(long)]
    image: Option<PathBuf>,
    /// Take the photo with the camera; falls back to --image without one.
    #[arg(long)]
    camera: bool,
    /// Where the displayed picture (with any overlay) is written.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Inference backend (stub or tract).
    #[arg(long, env = "FOOTSCAN_BACKEND")]
    backend: Option<String>,
    /// Progress output: plain or pretty.
    #[arg(long)]
    ui: Option<String>,
    /// Read commands from stdin instead of running once.
    #[arg(long)]
    interactive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = AppConfig::load()?;
    if let Some(backend) = args.backend.as_deref() {
        cfg.backend = backend.to_string();
        cfg.validate()?;
    }
    if let Some(out) = args.out.clone() {
        cfg.overlay_path = out;
    }
    let mode = args.mode.unwrap_or(cfg.default_mode);

    let registry = match build_registry(&cfg) {
        Ok(registry) => registry,
        Err(e) => {
            log::error!("startup failed: {:#}", e);
            return Err(e);
        }
    };
    let dispatcher = Dispatcher::new(Arc::new(registry));

    let camera = match cfg.camera.clone() {
        Some(camera_cfg) => Some(CameraSource::new(camera_cfg).context("camera setup failed")?),
        None => None,
    };
    let source = LocalImageSource::new(camera);

    let ui = Ui::from_args(args.ui.as_deref(), std::io::stderr().is_terminal());
    let view = ConsoleView::new(ui, cfg.overlay_path.clone());
    let screen = Screen::new(mode).with_overlay_options(OverlayOptions {
        scale: cfg.overlay_scale,
    });
    let (session, handle) = Session::new(screen, dispatcher, source, view);

    if args.interactive {
        spawn_stdin_reader(handle);
    } else {
        let request = one_shot_request(&args)?;
        handle.send(UiEvent::Pick(request)).await?;
        drop(handle);
    }

    let (screen, _view) = session.run().await?;
    if let Some(alert) = screen.alert() {
        if !args.interactive {
            return Err(anyhow!("{}", alert.message));
        }
    }
    Ok(())
}

fn one_shot_request(args: &Args) -> Result<PickRequest> {
    match (args.camera, args.image.clone()) {
        (true, image) => Ok(PickRequest::camera_or(image)),
        (false, Some(image)) => Ok(PickRequest::library(image)),
        (false, None) => Err(anyhow!(
            "nothing to analyse: pass --image <path>, --camera or --interactive"
        )),
    }
}

/// Feed stdin lines to the session from a plain thread so a pending read
/// never holds up shutdown.
fn spawn_stdin_reader(handle: SessionHandle) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    log::warn!("stdin read failed: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<UiEvent>() {
                Ok(event) => {
                    let quit = event == UiEvent::Quit;
                    if handle.blocking_send(event).is_err() || quit {
                        break;
                    }
                }
                Err(e) => eprintln!("{}", e),
            }
        }
    });
}
