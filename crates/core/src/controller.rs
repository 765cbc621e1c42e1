//! Interaction controller.
//!
//! The [`Controller`] owns the selected image, the style prompt and the
//! lifecycle of the current generation attempt. It never performs network
//! I/O itself: [`Controller::generate`] hands a request snapshot to the
//! [`GenerationClient`] on a tokio runtime, and finished requests come back
//! over a channel that the owner drains with [`Controller::poll`].
//!
//! # Ordering
//!
//! Every accepted `generate()` gets a new request id. Only the completion
//! carrying the most recently issued id is applied; anything older is
//! dropped on arrival. Selecting a new image also retires the in-flight id.

use crate::error::Result;
use crate::gemini::{GenerationClient, GenerationRequest};
use crate::image_processing::{ResultImage, SelectedImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tokio::runtime::Handle;

/// File name used when exporting the result.
pub const DOWNLOAD_FILE_NAME: &str = "styled-image.png";

/// Shown when generation is triggered without an image.
pub const MISSING_IMAGE_MESSAGE: &str = "Please upload an image first.";

/// Shown when generation is triggered with an empty prompt.
pub const MISSING_PROMPT_MESSAGE: &str = "Please select a style or enter a prompt.";

/// Phase of the current generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Loading,
    Succeeded,
    Failed,
}

/// What the presentation layer should render. Exactly one applies at a time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewState<'a> {
    /// No image selected yet.
    Empty,
    /// Image selected, nothing generated.
    Ready,
    Loading,
    Result(&'a ResultImage),
    Error(&'a str),
}

// The result lives inside the phase so a loading controller cannot also
// hold a result, and success and failure cannot coexist.
#[derive(Debug)]
enum Phase {
    Idle,
    Loading,
    Succeeded(ResultImage),
    Failed(String),
}

impl Phase {
    fn lifecycle(&self) -> LifecycleState {
        match self {
            Phase::Idle => LifecycleState::Idle,
            Phase::Loading => LifecycleState::Loading,
            Phase::Succeeded(_) => LifecycleState::Succeeded,
            Phase::Failed(_) => LifecycleState::Failed,
        }
    }
}

/// A finished client call, tagged with the request it belongs to.
struct Completion {
    request_id: u64,
    outcome: Result<ResultImage>,
}

type Listener = Box<dyn FnMut(LifecycleState) + Send>;
type Waker = Arc<dyn Fn() + Send + Sync>;

pub struct Controller {
    client: Arc<GenerationClient>,
    runtime: Handle,

    selected: Option<SelectedImage>,
    prompt: String,
    phase: Phase,
    latest_request: u64,

    tx: Sender<Completion>,
    rx: Receiver<Completion>,

    listeners: Vec<Listener>,
    waker: Option<Waker>,
}

impl Controller {
    /// Creates a controller that runs client calls on `runtime`.
    pub fn new(client: GenerationClient, runtime: Handle) -> Self {
        let (tx, rx) = channel();
        Self {
            client: Arc::new(client),
            runtime,
            selected: None,
            prompt: String::new(),
            phase: Phase::Idle,
            latest_request: 0,
            tx,
            rx,
            listeners: Vec::new(),
            waker: None,
        }
    }

    /// Registers a listener invoked with the new state on every transition.
    pub fn subscribe(&mut self, listener: impl FnMut(LifecycleState) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Registers a callback run on the runtime whenever a request finishes,
    /// so the owner knows to call [`Controller::poll`].
    pub fn on_completion(&mut self, waker: impl Fn() + Send + Sync + 'static) {
        self.waker = Some(Arc::new(waker));
    }

    pub fn selected_image(&self) -> Option<&SelectedImage> {
        self.selected.as_ref()
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.phase.lifecycle()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading)
    }

    pub fn result(&self) -> Option<&ResultImage> {
        match &self.phase {
            Phase::Succeeded(image) => Some(image),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            Phase::Failed(message) => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn view(&self) -> ViewState<'_> {
        match (&self.phase, &self.selected) {
            (Phase::Loading, _) => ViewState::Loading,
            (Phase::Succeeded(image), _) => ViewState::Result(image),
            (Phase::Failed(message), _) => ViewState::Error(message.as_str()),
            (Phase::Idle, None) => ViewState::Empty,
            (Phase::Idle, Some(_)) => ViewState::Ready,
        }
    }

    /// Replaces the selected image and returns to `Idle`.
    ///
    /// The previous image and its preview are dropped, any displayed result
    /// or error is cleared, and a request still in flight is retired.
    pub fn select_image(&mut self, image: SelectedImage) {
        tracing::info!(
            file = %image.file_name(),
            media_type = image.media_type().mime_type(),
            bytes = image.bytes().len(),
            "image selected"
        );
        self.selected = Some(image);
        self.retire_in_flight();
        self.set_phase(Phase::Idle);
    }

    /// Removes the selected image and returns to `Idle`.
    pub fn clear_image(&mut self) {
        self.selected = None;
        self.retire_in_flight();
        self.set_phase(Phase::Idle);
    }

    /// Overwrites the prompt. An empty prompt is allowed but blocks generation.
    pub fn set_prompt(&mut self, value: impl Into<String>) {
        self.prompt = value.into();
    }

    /// Starts a generation for the current image and prompt.
    ///
    /// Returns the request id, or `None` when the input was incomplete or no
    /// credential is configured. In that case the controller is `Failed` with
    /// a guidance message and no backend call was made.
    pub fn generate(&mut self) -> Option<u64> {
        let Some(image) = &self.selected else {
            self.fail(MISSING_IMAGE_MESSAGE);
            return None;
        };
        if self.prompt.trim().is_empty() {
            self.fail(MISSING_PROMPT_MESSAGE);
            return None;
        }
        let request = GenerationRequest::new(image, self.prompt.clone());
        if let Err(e) = self.client.ensure_configured() {
            self.fail(e.to_string());
            return None;
        }

        self.latest_request += 1;
        let request_id = self.latest_request;
        self.set_phase(Phase::Loading);
        tracing::info!(request_id, prompt = %request.prompt, "generation started");

        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        let waker = self.waker.clone();
        self.runtime.spawn(async move {
            let outcome = client.generate(&request).await;
            // The controller may be gone already; nothing to deliver to then
            let _ = tx.send(Completion {
                request_id,
                outcome,
            });
            if let Some(wake) = waker {
                wake();
            }
        });

        Some(request_id)
    }

    /// Applies finished requests. Returns whether the state changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(completion) = self.rx.try_recv() {
            changed |= self.apply_completion(completion);
        }
        changed
    }

    /// Blocks until one request finishes or `timeout` elapses, then applies
    /// it (and anything else already queued). Returns whether a request
    /// finished.
    pub fn wait_for_completion(&mut self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(completion) => {
                self.apply_completion(completion);
                self.poll();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Writes the result image to `dir` under [`DOWNLOAD_FILE_NAME`].
    ///
    /// Does nothing and returns `Ok(None)` unless the controller is
    /// `Succeeded`.
    pub fn download(&self, dir: impl AsRef<Path>) -> Result<Option<PathBuf>> {
        let Phase::Succeeded(image) = &self.phase else {
            tracing::debug!(state = ?self.lifecycle(), "download ignored, no result");
            return Ok(None);
        };

        let path = dir.as_ref().join(DOWNLOAD_FILE_NAME);
        std::fs::write(&path, image.bytes())?;
        tracing::info!(path = %path.display(), bytes = image.bytes().len(), "result saved");
        Ok(Some(path))
    }

    fn apply_completion(&mut self, completion: Completion) -> bool {
        let Completion {
            request_id,
            outcome,
        } = completion;

        if request_id != self.latest_request || !self.is_loading() {
            tracing::debug!(
                request_id,
                latest = self.latest_request,
                "discarding superseded generation result"
            );
            return false;
        }

        match outcome {
            Ok(image) => {
                tracing::info!(request_id, bytes = image.bytes().len(), "generation succeeded");
                self.set_phase(Phase::Succeeded(image));
            }
            Err(e) => {
                tracing::warn!(request_id, "generation failed: {e}");
                self.set_phase(Phase::Failed(e.to_string()));
            }
        }
        true
    }

    fn retire_in_flight(&mut self) {
        if self.is_loading() {
            tracing::debug!(request_id = self.latest_request, "retiring in-flight request");
            self.latest_request += 1;
        }
    }

    fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(%message, "generation rejected");
        self.set_phase(Phase::Failed(message));
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        let state = self.phase.lifecycle();
        for listener in &mut self.listeners {
            listener(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::AppError;
    use crate::gemini::{BackendRequest, ContentPart, GenerationBackend};
    use crate::image_processing::MediaType;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Never answers, so requests stay in flight until a test completes them.
    struct PendingBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerationBackend for PendingBackend {
        async fn generate(&self, _request: BackendRequest) -> Result<Vec<ContentPart>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    fn controller_with(config: Config) -> (Controller, Arc<PendingBackend>, tokio::runtime::Runtime) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let backend = Arc::new(PendingBackend {
            calls: AtomicUsize::new(0),
        });
        let client = GenerationClient::with_backend(config, backend.clone());
        let controller = Controller::new(client, runtime.handle().clone());
        (controller, backend, runtime)
    }

    fn configured() -> Config {
        Config::builder().with_api_key("test-key").build().unwrap()
    }

    fn image() -> SelectedImage {
        SelectedImage::from_bytes("photo.png", MediaType::Png, b"png-bytes".to_vec())
    }

    fn result(bytes: &[u8]) -> ResultImage {
        let data = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes);
        ResultImage::from_base64("image/png", &data).unwrap()
    }

    #[test]
    fn starts_empty_and_idle() {
        let (controller, _, _rt) = controller_with(configured());
        assert_eq!(controller.lifecycle(), LifecycleState::Idle);
        assert_eq!(controller.view(), ViewState::Empty);
        assert_eq!(controller.prompt(), "");
    }

    #[test]
    fn stale_completion_is_discarded() {
        let (mut controller, _, _rt) = controller_with(configured());
        controller.select_image(image());
        controller.set_prompt("Watercolor");

        let first = controller.generate().unwrap();
        let second = controller.generate().unwrap();
        assert!(second > first);

        let applied = controller.apply_completion(Completion {
            request_id: first,
            outcome: Ok(result(b"old")),
        });
        assert!(!applied);
        assert_eq!(controller.lifecycle(), LifecycleState::Loading);

        let applied = controller.apply_completion(Completion {
            request_id: second,
            outcome: Ok(result(b"new")),
        });
        assert!(applied);
        assert_eq!(controller.result().unwrap().bytes(), b"new");
    }

    #[test]
    fn failure_outcome_shows_error_message() {
        let (mut controller, _, _rt) = controller_with(configured());
        controller.select_image(image());
        controller.set_prompt("Pop art");
        let id = controller.generate().unwrap();

        controller.apply_completion(Completion {
            request_id: id,
            outcome: Err(AppError::generation("nope")),
        });
        assert_eq!(controller.lifecycle(), LifecycleState::Failed);
        assert_eq!(controller.view(), ViewState::Error("nope"));
        assert!(controller.result().is_none());
    }

    #[test]
    fn selecting_an_image_retires_the_in_flight_request() {
        let (mut controller, _, _rt) = controller_with(configured());
        controller.select_image(image());
        controller.set_prompt("Cyberpunk");
        let id = controller.generate().unwrap();

        controller.select_image(image());
        assert_eq!(controller.lifecycle(), LifecycleState::Idle);

        let applied = controller.apply_completion(Completion {
            request_id: id,
            outcome: Ok(result(b"late")),
        });
        assert!(!applied);
        assert_eq!(controller.view(), ViewState::Ready);
    }

    #[test]
    fn whitespace_prompt_is_rejected() {
        let (mut controller, backend, _rt) = controller_with(configured());
        controller.select_image(image());
        controller.set_prompt("   ");

        assert_eq!(controller.generate(), None);
        assert_eq!(controller.error(), Some(MISSING_PROMPT_MESSAGE));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listeners_see_every_transition() {
        let (mut controller, _, _rt) = controller_with(configured());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        controller.subscribe(move |state| sink.lock().unwrap().push(state));

        controller.generate();
        controller.select_image(image());
        controller.set_prompt("Pixel art");
        controller.generate();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                LifecycleState::Failed,
                LifecycleState::Idle,
                LifecycleState::Loading,
            ]
        );
    }

    #[test]
    fn download_is_a_no_op_without_result() {
        let (controller, _, _rt) = controller_with(configured());
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(controller.download(dir.path()).unwrap(), None);
        assert!(!dir.path().join(DOWNLOAD_FILE_NAME).exists());
    }

    #[test]
    fn clear_image_returns_to_empty() {
        let (mut controller, _, _rt) = controller_with(configured());
        controller.select_image(image());
        controller.clear_image();
        assert!(controller.selected_image().is_none());
        assert_eq!(controller.view(), ViewState::Empty);
    }
}
