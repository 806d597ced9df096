use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::controller::{Phase, Screen};
use crate::session::View;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty && !matches!(self.mode, UiMode::Plain)
    }

    /// Start a progress stage. It ends when the guard is finished or dropped.
    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(name.to_string());
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Terminal rendering of the screen.
///
/// The results label goes to stdout, alerts to stderr, and the displayed
/// picture is written to `image_path` whenever it changes.
pub struct ConsoleView {
    ui: Ui,
    image_path: PathBuf,
    stage: Option<StageGuard>,
    shown_label: Option<String>,
    shown_image: Option<String>,
    shown_alert: bool,
}

impl ConsoleView {
    pub fn new(ui: Ui, image_path: PathBuf) -> Self {
        Self {
            ui,
            image_path,
            stage: None,
            shown_label: None,
            shown_image: None,
            shown_alert: false,
        }
    }
}

impl View for ConsoleView {
    fn render(&mut self, screen: &Screen) -> Result<()> {
        match (screen.alert(), self.shown_alert) {
            (Some(alert), false) => {
                eprintln!("[{}] {}", alert.title, alert.message);
                self.shown_alert = true;
            }
            (None, true) => self.shown_alert = false,
            _ => {}
        }

        let label = screen.label().map(str::to_string);
        if screen.phase() == Phase::ImageSelected {
            if self.stage.is_none() || label != self.shown_label {
                self.stage = None;
                self.stage = label.as_deref().map(|text| self.ui.stage(text));
            }
        } else {
            self.stage = None;
            if screen.results_visible() && label.is_some() && label != self.shown_label {
                println!("{}", label.as_deref().unwrap_or_default());
            }
        }
        self.shown_label = label;

        let image = screen.image().map(|picture| picture.fingerprint());
        if image.is_some() && image != self.shown_image {
            if let Some(picture) = screen.image() {
                picture.save_png(&self.image_path)?;
                log::info!("display image written to {}", self.image_path.display());
            }
        }
        self.shown_image = image;
        Ok(())
    }
}
