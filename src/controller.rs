//! Presentation state machine.
//!
//! `Screen` is the whole visible state of the app: mode, displayed picture,
//! results text, results panel visibility and any pending alert. Every
//! transition consumes a `Screen` and returns the next one; nothing is mutated
//! from outside the event loop.
//!
//! ```text
//! Idle --select_image--> ImageSelected --inference_completed--> ResultsReady
//!  ^                                                                 |
//!  +---------------------------- change_mode ------------------------+
//! ```
//!
//! Each `select_image` hands out an `InferenceTicket` carrying the mode and a
//! generation number. A completion is applied only if its ticket still matches
//! the screen; anything else is a stale result and is dropped.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use serde::Deserialize;

use crate::format::{format_classifications, format_detections, CLASSIFYING, DETECTING};
use crate::infer::{Completion, InferenceOutcome};
use crate::overlay::{render_overlay, OverlayOptions};
use crate::picture::Picture;

pub const LOAD_ERROR_TITLE: &str = "Error";
pub const LOAD_ERROR_MESSAGE: &str =
    "An error occured when loading image, please choose another image.";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Classify,
    Detect,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Classify => write!(f, "classify"),
            Mode::Detect => write!(f, "detect"),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "classify" | "classification" => Ok(Mode::Classify),
            "detect" | "detection" => Ok(Mode::Detect),
            other => Err(anyhow!("unknown mode '{}' (expected classify or detect)", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ImageSelected,
    ResultsReady,
}

/// Identifies one dispatched inference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InferenceTicket {
    pub mode: Mode,
    pub generation: u64,
}

/// Blocking message the user has to acknowledge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct Screen {
    mode: Mode,
    phase: Phase,
    generation: u64,
    image: Option<Picture>,
    label: Option<String>,
    results_visible: bool,
    alert: Option<Alert>,
    overlay: OverlayOptions,
}

impl Screen {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            phase: Phase::Idle,
            generation: 0,
            image: None,
            label: None,
            results_visible: false,
            alert: None,
            overlay: OverlayOptions::default(),
        }
    }

    pub fn with_overlay_options(mut self, overlay: OverlayOptions) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn image(&self) -> Option<&Picture> {
        self.image.as_ref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn results_visible(&self) -> bool {
        self.results_visible
    }

    pub fn alert(&self) -> Option<&Alert> {
        self.alert.as_ref()
    }

    /// Show a newly picked picture and issue the ticket for its inference.
    pub fn select_image(mut self, picture: Picture) -> (Self, InferenceTicket) {
        self.generation += 1;
        self.phase = Phase::ImageSelected;
        self.image = Some(picture);
        self.results_visible = true;
        self.label = Some(
            match self.mode {
                Mode::Classify => CLASSIFYING,
                Mode::Detect => DETECTING,
            }
            .to_string(),
        );
        let ticket = InferenceTicket {
            mode: self.mode,
            generation: self.generation,
        };
        (self, ticket)
    }

    /// Apply a finished inference, or drop it if it no longer matches.
    pub fn inference_completed(self, completion: Completion) -> Self {
        let Completion { ticket, outcome } = completion;
        if !self.accepts(ticket) {
            log::debug!(
                "discarding stale {} result #{} (screen is {} #{}, {:?})",
                ticket.mode,
                ticket.generation,
                self.mode,
                self.generation,
                self.phase
            );
            return self;
        }

        match outcome {
            Ok(InferenceOutcome::Classified(classifications)) if self.mode == Mode::Classify => {
                match format_classifications(&classifications) {
                    Ok(text) => self.show_results(text),
                    Err(e) => self.show_failure(e),
                }
            }
            Ok(InferenceOutcome::Detected(detections)) if self.mode == Mode::Detect => {
                match format_detections(&detections) {
                    Ok(summary) => {
                        let next = if summary.overlay.is_empty() {
                            self
                        } else {
                            self.apply_overlay(&summary.overlay)
                        };
                        next.show_results(summary.text)
                    }
                    Err(e) => self.show_failure(e),
                }
            }
            Ok(other) => {
                log::warn!("got {} for {} ticket #{}", other, ticket.mode, ticket.generation);
                self.show_failure(anyhow!("backend returned {} in {} mode", other, ticket.mode))
            }
            Err(e) => self.show_failure(e),
        }
    }

    /// Switch mode. Always returns to `Idle` with nothing displayed.
    pub fn change_mode(mut self, mode: Mode) -> Self {
        self.generation += 1;
        self.mode = mode;
        self.phase = Phase::Idle;
        self.image = None;
        self.label = None;
        self.results_visible = false;
        self
    }

    /// The picked media could not be turned into a picture.
    pub fn image_load_failed(mut self, reason: &Error) -> Self {
        log::warn!("error loading image: {:#}", reason);
        self.generation += 1;
        self.phase = Phase::Idle;
        self.image = None;
        self.label = None;
        self.results_visible = false;
        self.alert = Some(Alert {
            title: LOAD_ERROR_TITLE.to_string(),
            message: LOAD_ERROR_MESSAGE.to_string(),
        });
        self
    }

    pub fn dismiss_alert(mut self) -> Self {
        self.alert = None;
        self
    }

    /// Composite detection boxes onto the displayed picture. Without a
    /// displayed picture this does nothing.
    pub fn apply_overlay(mut self, detections: &[crate::infer::Detection]) -> Self {
        match self.image.take() {
            Some(image) => {
                self.image = Some(render_overlay(&image, detections, self.overlay));
            }
            None => log::debug!("no display image; overlay skipped"),
        }
        self
    }

    fn accepts(&self, ticket: InferenceTicket) -> bool {
        self.phase == Phase::ImageSelected
            && ticket.mode == self.mode
            && ticket.generation == self.generation
    }

    fn show_results(mut self, text: String) -> Self {
        self.phase = Phase::ResultsReady;
        self.label = Some(text);
        self
    }

    fn show_failure(self, error: Error) -> Self {
        let prefix = match self.mode {
            Mode::Classify => "Unable to classify image.",
            Mode::Detect => "Unable to detect anything.",
        };
        let text = format!("{}\n{}", prefix, error);
        self.show_results(text)
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::{Classification, Detection, NormalizedRect};
    use image::{Rgba, RgbaImage};

    fn picture() -> Picture {
        Picture::new(RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255])))
    }

    fn classified(ticket: InferenceTicket, items: Vec<Classification>) -> Completion {
        Completion {
            ticket,
            outcome: Ok(InferenceOutcome::Classified(items)),
        }
    }

    fn detected(ticket: InferenceTicket, items: Vec<Detection>) -> Completion {
        Completion {
            ticket,
            outcome: Ok(InferenceOutcome::Detected(items)),
        }
    }

    #[test]
    fn starts_idle() {
        let screen = Screen::default();
        assert_eq!(screen.phase(), Phase::Idle);
        assert_eq!(screen.mode(), Mode::Classify);
        assert!(screen.image().is_none());
        assert!(screen.label().is_none());
        assert!(!screen.results_visible());
    }

    #[test]
    fn selecting_shows_progress_label() {
        let (screen, ticket) = Screen::new(Mode::Classify).select_image(picture());
        assert_eq!(screen.phase(), Phase::ImageSelected);
        assert_eq!(screen.label(), Some("Classifying..."));
        assert!(screen.results_visible());
        assert_eq!(ticket.mode, Mode::Classify);
        assert_eq!(ticket.generation, screen.generation());

        let (screen, _) = Screen::new(Mode::Detect).select_image(picture());
        assert_eq!(screen.label(), Some("Detecting..."));
    }

    #[test]
    fn classification_results_are_shown() {
        let (screen, ticket) = Screen::new(Mode::Classify).select_image(picture());
        let source = screen.image().cloned().unwrap();
        let screen = screen.inference_completed(classified(
            ticket,
            vec![Classification::new("healthy", 0.91)],
        ));
        assert_eq!(screen.phase(), Phase::ResultsReady);
        assert_eq!(
            screen.label(),
            Some("Classification:\nConfidence of healthy: 0.91 ")
        );
        assert!(screen.image().unwrap().shares_pixels_with(&source));
    }

    #[test]
    fn detections_replace_image_with_overlay() {
        let (screen, ticket) = Screen::new(Mode::Detect).select_image(picture());
        let source = screen.image().cloned().unwrap();
        let screen = screen.inference_completed(detected(
            ticket,
            vec![Detection::new("ulcer", 0.8, NormalizedRect::full())],
        ));
        assert_eq!(screen.label(), Some("Total 1 abnormal area detected."));
        let shown = screen.image().unwrap();
        assert_ne!(shown, &source);
        assert_eq!(shown.dimensions(), source.dimensions());
        assert_eq!(source.pixels().get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn empty_detections_leave_image_alone() {
        let (screen, ticket) = Screen::new(Mode::Detect).select_image(picture());
        let source = screen.image().cloned().unwrap();
        let screen = screen.inference_completed(detected(ticket, vec![]));
        assert_eq!(screen.label(), Some("Nothing detected."));
        assert!(screen.image().unwrap().shares_pixels_with(&source));
    }

    #[test]
    fn inference_error_is_shown_in_label() {
        let (screen, ticket) = Screen::new(Mode::Classify).select_image(picture());
        let screen = screen.inference_completed(Completion {
            ticket,
            outcome: Err(anyhow!("model crashed")),
        });
        assert_eq!(screen.phase(), Phase::ResultsReady);
        assert_eq!(screen.label(), Some("Unable to classify image.\nmodel crashed"));

        let (screen, ticket) = Screen::new(Mode::Detect).select_image(picture());
        let screen = screen.inference_completed(Completion {
            ticket,
            outcome: Err(anyhow!("model crashed")),
        });
        assert_eq!(screen.label(), Some("Unable to detect anything.\nmodel crashed"));
    }

    #[test]
    fn out_of_range_confidence_is_surfaced() {
        let (screen, ticket) = Screen::new(Mode::Classify).select_image(picture());
        let screen =
            screen.inference_completed(classified(ticket, vec![Classification::new("x", 3.0)]));
        let label = screen.label().unwrap();
        assert!(label.starts_with("Unable to classify image.\n"));
        assert!(label.contains("outside [0, 1]"));
    }

    #[test]
    fn wrong_kind_of_outcome_ends_in_failure_label() {
        let source = picture();
        let (screen, ticket) = Screen::new(Mode::Classify).select_image(source.clone());
        let screen = screen.inference_completed(detected(
            ticket,
            vec![Detection::new("ulcer", 0.9, NormalizedRect::full())],
        ));
        assert_eq!(screen.phase(), Phase::ResultsReady);
        assert_eq!(
            screen.label(),
            Some("Unable to classify image.\nbackend returned 1 detection(s) in classify mode")
        );
        assert!(screen.image().unwrap().shares_pixels_with(&source));
    }

    #[test]
    fn change_mode_clears_everything() {
        let (screen, ticket) = Screen::new(Mode::Classify).select_image(picture());
        let screen =
            screen.inference_completed(classified(ticket, vec![Classification::new("a", 0.5)]));
        assert_eq!(screen.phase(), Phase::ResultsReady);

        let screen = screen.change_mode(Mode::Detect);
        assert_eq!(screen.phase(), Phase::Idle);
        assert_eq!(screen.mode(), Mode::Detect);
        assert!(screen.label().is_none());
        assert!(screen.image().is_none());
        assert!(!screen.results_visible());
    }

    #[test]
    fn stale_result_after_mode_change_is_discarded() {
        let (screen, ticket) = Screen::new(Mode::Classify).select_image(picture());
        let screen = screen.change_mode(Mode::Detect);
        let screen =
            screen.inference_completed(classified(ticket, vec![Classification::new("a", 0.5)]));
        assert_eq!(screen.phase(), Phase::Idle);
        assert_eq!(screen.mode(), Mode::Detect);
        assert!(screen.label().is_none());
        assert!(screen.image().is_none());
    }

    #[test]
    fn stale_result_after_toggling_back_is_discarded() {
        let (screen, old) = Screen::new(Mode::Classify).select_image(picture());
        let screen = screen.change_mode(Mode::Detect).change_mode(Mode::Classify);
        let (screen, current) = screen.select_image(picture());
        let screen =
            screen.inference_completed(classified(old, vec![Classification::new("old", 0.5)]));
        assert_eq!(screen.phase(), Phase::ImageSelected);
        assert_eq!(screen.label(), Some("Classifying..."));

        let screen =
            screen.inference_completed(classified(current, vec![Classification::new("new", 0.5)]));
        assert!(screen.label().unwrap().contains("new"));
    }

    #[test]
    fn superseded_selection_is_discarded() {
        let (screen, first) = Screen::new(Mode::Detect).select_image(picture());
        let (screen, _second) = screen.select_image(picture());
        let screen = screen.inference_completed(detected(
            first,
            vec![Detection::new("a", 0.5, NormalizedRect::full())],
        ));
        assert_eq!(screen.phase(), Phase::ImageSelected);
        assert_eq!(screen.label(), Some("Detecting..."));
    }

    #[test]
    fn duplicate_completion_is_ignored() {
        let (screen, ticket) = Screen::new(Mode::Classify).select_image(picture());
        let screen =
            screen.inference_completed(classified(ticket, vec![Classification::new("a", 0.5)]));
        let label = screen.label().map(str::to_string);
        let screen =
            screen.inference_completed(classified(ticket, vec![Classification::new("b", 0.5)]));
        assert_eq!(screen.label().map(str::to_string), label);
    }

    #[test]
    fn load_failure_alerts_and_returns_to_idle() {
        let (screen, ticket) = Screen::new(Mode::Classify).select_image(picture());
        let screen = screen.image_load_failed(&anyhow!("not an image"));
        assert_eq!(screen.phase(), Phase::Idle);
        assert!(screen.image().is_none());
        let alert = screen.alert().unwrap();
        assert_eq!(alert.title, "Error");
        assert_eq!(alert.message, LOAD_ERROR_MESSAGE);

        let screen =
            screen.inference_completed(classified(ticket, vec![Classification::new("a", 0.5)]));
        assert!(screen.label().is_none());
        assert!(screen.dismiss_alert().alert().is_none());
    }

    #[test]
    fn overlay_without_image_is_a_no_op() {
        let screen = Screen::new(Mode::Detect)
            .apply_overlay(&[Detection::new("a", 0.5, NormalizedRect::full())]);
        assert!(screen.image().is_none());
        assert_eq!(screen.phase(), Phase::Idle);
    }

    #[test]
    fn mode_parses_from_text() {
        assert_eq!("classify".parse::<Mode>().unwrap(), Mode::Classify);
        assert_eq!(" Detect ".parse::<Mode>().unwrap(), Mode::Detect);
        assert!("segment".parse::<Mode>().is_err());
    }
}
