use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use tokio::task::JoinHandle;

use crate::controller::{InferenceTicket, Mode};
use crate::infer::registry::BackendRegistry;
use crate::infer::result::InferenceOutcome;
use crate::picture::Picture;

/// Result of one dispatched inference, still tagged with the ticket it was issued under.
#[derive(Debug)]
pub struct Completion {
    pub ticket: InferenceTicket,
    pub outcome: Result<InferenceOutcome>,
}

/// Runs inference off the event loop.
///
/// Each call gets its own blocking worker. There is no cancellation: a request
/// that has become stale still runs to completion and is handed back tagged
/// with its ticket so the controller can discard it.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<BackendRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Run inference for `mode` on the calling thread.
    pub fn run_blocking(&self, mode: Mode, picture: &Picture) -> Result<InferenceOutcome> {
        match mode {
            Mode::Classify => self.registry.classify(picture).map(InferenceOutcome::Classified),
            Mode::Detect => self.registry.detect(picture).map(InferenceOutcome::Detected),
        }
    }

    /// Start inference on a blocking worker and return a handle to its completion.
    pub fn spawn(&self, ticket: InferenceTicket, picture: Picture) -> JoinHandle<Completion> {
        let dispatcher = self.clone();
        log::info!(
            "dispatching {} #{} for picture {}",
            ticket.mode,
            ticket.generation,
            picture.short_id()
        );
        tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let outcome = dispatcher.run_blocking(ticket.mode, &picture);
            match &outcome {
                Ok(result) => log::info!(
                    "{} #{} finished in {:?}: {}",
                    ticket.mode,
                    ticket.generation,
                    started.elapsed(),
                    result
                ),
                Err(e) => log::warn!("{} #{} failed: {:#}", ticket.mode, ticket.generation, e),
            }
            Completion { ticket, outcome }
        })
    }

    /// Dispatch and wait for the completion.
    pub async fn infer(&self, ticket: InferenceTicket, picture: Picture) -> Completion {
        match self.spawn(ticket, picture).await {
            Ok(completion) => completion,
            Err(e) => Completion {
                ticket,
                outcome: Err(anyhow!("inference worker failed: {}", e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::backends::StubBackend;
    use crate::infer::result::{Classification, Detection, NormalizedRect};
    use image::RgbaImage;

    fn dispatcher() -> Dispatcher {
        let mut registry = BackendRegistry::new();
        registry.register(
            StubBackend::new()
                .with_classifications(vec![Classification::new("healthy", 0.8)])
                .with_detections(vec![Detection::new("ulcer", 0.7, NormalizedRect::full())]),
        );
        Dispatcher::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn infer_routes_by_mode() {
        let dispatcher = dispatcher();
        let picture = Picture::new(RgbaImage::new(8, 8));

        let ticket = InferenceTicket {
            mode: Mode::Classify,
            generation: 1,
        };
        let completion = dispatcher.infer(ticket, picture.clone()).await;
        assert_eq!(completion.ticket, ticket);
        assert!(matches!(
            completion.outcome,
            Ok(InferenceOutcome::Classified(ref c)) if c.len() == 1
        ));

        let ticket = InferenceTicket {
            mode: Mode::Detect,
            generation: 2,
        };
        let completion = dispatcher.infer(ticket, picture).await;
        assert!(matches!(
            completion.outcome,
            Ok(InferenceOutcome::Detected(ref d)) if d.len() == 1
        ));
    }

    #[tokio::test]
    async fn split_backends_serve_their_own_mode() {
        let mut registry = BackendRegistry::new();
        registry.register(
            StubBackend::named("classifier")
                .classify_only()
                .with_classifications(vec![Classification::new("healthy", 0.6)]),
        );
        registry.register(
            StubBackend::named("detector")
                .detect_only()
                .with_detections(vec![Detection::new("ulcer", 0.9, NormalizedRect::full())]),
        );
        let dispatcher = Dispatcher::new(Arc::new(registry));
        assert_eq!(dispatcher.registry().list(), vec!["classifier", "detector"]);

        let picture = Picture::new(RgbaImage::new(4, 4));
        let detect = InferenceTicket {
            mode: Mode::Detect,
            generation: 1,
        };
        let completion = dispatcher.infer(detect, picture.clone()).await;
        assert!(matches!(
            completion.outcome,
            Ok(InferenceOutcome::Detected(ref d)) if d[0].label == "ulcer"
        ));

        let classify = InferenceTicket {
            mode: Mode::Classify,
            generation: 2,
        };
        let completion = dispatcher.infer(classify, picture).await;
        assert!(matches!(
            completion.outcome,
            Ok(InferenceOutcome::Classified(ref c)) if c[0].label == "healthy"
        ));
    }

    #[tokio::test]
    async fn backend_error_is_returned_once() {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::new().failing("runtime unavailable"));
        let dispatcher = Dispatcher::new(Arc::new(registry));

        let ticket = InferenceTicket {
            mode: Mode::Detect,
            generation: 7,
        };
        let completion = dispatcher
            .infer(ticket, Picture::new(RgbaImage::new(2, 2)))
            .await;
        let err = completion.outcome.unwrap_err();
        assert_eq!(err.to_string(), "runtime unavailable");
    }
}
