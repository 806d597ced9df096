//! Event loop tying the picker, the dispatcher and the controller together.
//!
//! One task owns the `Screen`. UI events arrive on one channel, inference
//! completions on another; both are applied in arrival order on this task only.
//! Workers never touch the screen, they just send their `Completion` back.
//! Picking (file open and decode) runs on a blocking worker too; the loop waits
//! for it before taking the next event.

use anyhow::{anyhow, Result};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::controller::{InferenceTicket, Mode, Screen};
use crate::infer::{Completion, Dispatcher};
use crate::ingest::{ImageSource, PickOutcome, PickRequest};
use crate::picture::Picture;

/// Input from the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiEvent {
    ChangeMode(Mode),
    Pick(PickRequest),
    DismissAlert,
    Quit,
}

impl FromStr for UiEvent {
    type Err = anyhow::Error;

    /// Parse one interactive command line.
    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };
        match (command, arg) {
            ("mode", arg) if !arg.is_empty() => Ok(UiEvent::ChangeMode(arg.parse()?)),
            ("pick", "") => Ok(UiEvent::Pick(PickRequest::dismissed())),
            ("pick", path) => Ok(UiEvent::Pick(PickRequest::library(path))),
            ("camera", "") => Ok(UiEvent::Pick(PickRequest::camera())),
            ("camera", path) => Ok(UiEvent::Pick(PickRequest::camera_or(Some(path.into())))),
            ("cancel", "") => Ok(UiEvent::Pick(PickRequest::dismissed())),
            ("dismiss", "") => Ok(UiEvent::DismissAlert),
            ("quit", "") | ("exit", "") => Ok(UiEvent::Quit),
            _ => Err(anyhow!(
                "unknown command '{}' (try: mode classify|detect, pick <path>, camera, cancel, dismiss, quit)",
                line
            )),
        }
    }
}

/// Something that shows the screen to the user.
pub trait View: Send {
    fn render(&mut self, screen: &Screen) -> Result<()>;
}

/// Sender half handed to whatever produces UI events.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<UiEvent>,
}

impl SessionHandle {
    pub async fn send(&self, event: UiEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| anyhow!("session has stopped"))
    }

    pub fn blocking_send(&self, event: UiEvent) -> Result<()> {
        self.tx
            .blocking_send(event)
            .map_err(|_| anyhow!("session has stopped"))
    }
}

pub struct Session<S, V> {
    screen: Screen,
    dispatcher: Dispatcher,
    source: Arc<Mutex<S>>,
    view: V,
    events: mpsc::Receiver<UiEvent>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl<S: ImageSource + 'static, V: View> Session<S, V> {
    pub fn new(screen: Screen, dispatcher: Dispatcher, source: S, view: V) -> (Self, SessionHandle) {
        let (tx, events) = mpsc::channel(64);
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let session = Self {
            screen,
            dispatcher,
            source: Arc::new(Mutex::new(source)),
            view,
            events,
            completions_tx,
            completions,
            in_flight: 0,
        };
        (session, SessionHandle { tx })
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Run until `Quit`, or until every handle is dropped and no inference is
    /// still running. Returns the final screen and the view.
    pub async fn run(mut self) -> Result<(Screen, V)> {
        self.view.render(&self.screen)?;
        let mut ui_open = true;
        loop {
            if !ui_open && self.in_flight == 0 {
                break;
            }
            tokio::select! {
                event = self.events.recv(), if ui_open => match event {
                    Some(UiEvent::Quit) => break,
                    Some(event) => self.handle_event(event).await?,
                    None => ui_open = false,
                },
                Some(completion) = self.completions.recv(), if self.in_flight > 0 => {
                    self.in_flight -= 1;
                    self.handle_completion(completion)?;
                }
            }
        }
        log::info!("session finished in {} mode", self.screen.mode());
        Ok((self.screen, self.view))
    }

    /// Apply one UI event.
    pub async fn handle_event(&mut self, event: UiEvent) -> Result<()> {
        match event {
            UiEvent::ChangeMode(mode) => {
                log::info!("mode changed to {}", mode);
                self.update(|screen| screen.change_mode(mode));
            }
            UiEvent::Pick(request) => self.pick(request).await,
            UiEvent::DismissAlert => self.update(Screen::dismiss_alert),
            UiEvent::Quit => {}
        }
        self.view.render(&self.screen)
    }

    /// Apply one finished inference.
    pub fn handle_completion(&mut self, completion: Completion) -> Result<()> {
        self.update(|screen| screen.inference_completed(completion));
        self.view.render(&self.screen)
    }

    async fn pick(&mut self, request: PickRequest) {
        let source = Arc::clone(&self.source);
        let picked = tokio::task::spawn_blocking(move || {
            let mut source = source
                .lock()
                .map_err(|_| anyhow!("image source lock poisoned"))?;
            source.pick(&request)
        })
        .await
        .map_err(|e| anyhow!("image picker failed: {}", e))
        .and_then(|outcome| outcome);
        match picked {
            Ok(PickOutcome::Picked(picture)) => {
                let screen = std::mem::take(&mut self.screen);
                let (screen, ticket) = screen.select_image(picture.clone());
                self.screen = screen;
                self.dispatch(ticket, picture);
            }
            Ok(PickOutcome::Cancelled) => {}
            Err(e) => self.update(|screen| screen.image_load_failed(&e)),
        }
    }

    fn dispatch(&mut self, ticket: InferenceTicket, picture: Picture) {
        let dispatcher = self.dispatcher.clone();
        let tx = self.completions_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let completion = dispatcher.infer(ticket, picture).await;
            if tx.send(completion).is_err() {
                log::debug!("session gone; dropping {} #{}", ticket.mode, ticket.generation);
            }
        });
    }

    fn update(&mut self, f: impl FnOnce(Screen) -> Screen) {
        let screen = std::mem::take(&mut self.screen);
        self.screen = f(screen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_interactive_commands() {
        assert_eq!(
            "mode detect".parse::<UiEvent>().unwrap(),
            UiEvent::ChangeMode(Mode::Detect)
        );
        assert_eq!(
            "  pick photos/left foot.jpg ".parse::<UiEvent>().unwrap(),
            UiEvent::Pick(PickRequest::library("photos/left foot.jpg"))
        );
        assert_eq!(
            "camera".parse::<UiEvent>().unwrap(),
            UiEvent::Pick(PickRequest::camera())
        );
        assert_eq!(
            "camera fallback.png".parse::<UiEvent>().unwrap(),
            UiEvent::Pick(PickRequest::camera_or(Some(PathBuf::from("fallback.png"))))
        );
        assert_eq!(
            "cancel".parse::<UiEvent>().unwrap(),
            UiEvent::Pick(PickRequest::dismissed())
        );
        assert_eq!("dismiss".parse::<UiEvent>().unwrap(), UiEvent::DismissAlert);
        assert_eq!("quit".parse::<UiEvent>().unwrap(), UiEvent::Quit);
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!("mode".parse::<UiEvent>().is_err());
        assert!("mode segment".parse::<UiEvent>().is_err());
        assert!("quit now".parse::<UiEvent>().is_err());
        assert!("zoom".parse::<UiEvent>().is_err());
    }
}
