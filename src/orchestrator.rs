use crate::{
    image_handle::ImageHandle,
    model::{MultimodalModel, MultimodalPrompt},
};
use std::{
    error::Error,
    sync::{Mutex, MutexGuard, PoisonError, TryLockError},
};

/// Instruction sent ahead of every invoice image.
pub const SYSTEM_PROMPT: &str = "You are an expert in understanding invoices. \
We will upload an image of invoice and you will have to answer any question based on that";

pub const MISSING_IMAGE_MESSAGE: &str = "Please upload an invoice image first.";

pub const INFERENCE_ERROR_PREFIX: &str = "An error occurred while getting response from Gemini: ";

/// Classification of a failed submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    MissingInput,
    InferenceError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MissingInput => "missing_input",
            FailureKind::InferenceError => "inference_error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AnswerError {
    #[error("{}", MISSING_IMAGE_MESSAGE)]
    MissingInput,

    #[error("{}{}", INFERENCE_ERROR_PREFIX, .details)]
    Inference { details: String },
}

impl AnswerError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AnswerError::MissingInput => FailureKind::MissingInput,
            AnswerError::Inference { .. } => FailureKind::InferenceError,
        }
    }

    /// The user-facing message.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Outcome of one submission: the model's text, untouched, or a classified failure.
pub type AnswerResult = Result<String, AnswerError>;

/// Represents the current state of the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrchestratorState {
    /// No submission in flight.
    Idle,
    /// A call to the model is in flight.
    Invoking,
}

impl OrchestratorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorState::Idle => "idle",
            OrchestratorState::Invoking => "invoking",
        }
    }
}

/// Where failed invocations are reported for operators.
pub trait DiagnosticSink {
    fn record(&self, message: &str);
}

/// Reports through the `log` facade at error level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn record(&self, message: &str) {
        log::error!("{message}");
    }
}

/// Turns one (question, image) submission into an [`AnswerResult`].
///
/// The model is injected once at startup and reused for every submission.
/// Calls are serialized: a second caller waits until the first one returns.
pub struct AnswerOrchestrator<M: MultimodalModel, S: DiagnosticSink = LogSink> {
    model: Mutex<M>,
    sink: S,
    state: Mutex<OrchestratorState>,
}

impl<M: MultimodalModel> AnswerOrchestrator<M, LogSink> {
    pub fn new(model: M) -> Self {
        Self::with_sink(model, LogSink)
    }
}

impl<M: MultimodalModel, S: DiagnosticSink> AnswerOrchestrator<M, S> {
    pub fn with_sink(model: M, sink: S) -> Self {
        Self {
            model: Mutex::new(model),
            sink,
            state: Mutex::new(OrchestratorState::Idle),
        }
    }

    /// Returns the current state of the orchestrator.
    pub fn state(&self) -> OrchestratorState {
        *lock(&self.state)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Answers `question` about `image`.
    ///
    /// Without an image the model is never called. The question is forwarded
    /// verbatim, including when empty. Waits for any call already in flight.
    pub fn answer(&self, question: &str, image: Option<&ImageHandle>) -> AnswerResult {
        let Some(image) = image else {
            log::debug!("Submission without an image, skipping the model");
            return Err(AnswerError::MissingInput);
        };

        let mut model = lock(&self.model);
        self.invoke(&mut model, question, image)
    }

    /// Like [`answer`](Self::answer), but returns `None` instead of waiting
    /// when another call is already in flight.
    pub fn try_answer(&self, question: &str, image: Option<&ImageHandle>) -> Option<AnswerResult> {
        let Some(image) = image else {
            log::debug!("Submission without an image, skipping the model");
            return Some(Err(AnswerError::MissingInput));
        };

        let mut model = match self.model.try_lock() {
            Ok(model) => model,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                log::debug!("Model busy, rejecting submission");
                return None;
            }
        };
        Some(self.invoke(&mut model, question, image))
    }

    fn invoke(&self, model: &mut M, question: &str, image: &ImageHandle) -> AnswerResult {
        let prompt = MultimodalPrompt::invoice(SYSTEM_PROMPT, image, question);
        let _invoking = InvokingGuard::enter(&self.state);

        log::debug!(
            "Invoking model with a {}x{} {} image",
            image.width(),
            image.height(),
            image.format()
        );

        match model.generate(&prompt) {
            Ok(response) => {
                log::debug!("Model answered with {} bytes", response.text.len());
                Ok(response.text)
            }
            Err(e) => {
                let err = AnswerError::Inference {
                    details: describe(&e),
                };
                self.sink.record(&err.message());
                Err(err)
            }
        }
    }
}

/// Joins an error with its sources, skipping causes already spelled out by their parent.
fn describe(err: &(dyn Error + 'static)) -> String {
    let mut details = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !text.is_empty() && !details.contains(&text) {
            details.push_str(": ");
            details.push_str(&text);
        }
        source = cause.source();
    }
    details
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// Flips the state to `Invoking` and back to `Idle` when dropped, panics included.
struct InvokingGuard<'a> {
    state: &'a Mutex<OrchestratorState>,
}

impl<'a> InvokingGuard<'a> {
    fn enter(state: &'a Mutex<OrchestratorState>) -> Self {
        *lock(state) = OrchestratorState::Invoking;
        Self { state }
    }
}

impl Drop for InvokingGuard<'_> {
    fn drop(&mut self) {
        *lock(self.state) = OrchestratorState::Idle;
    }
}
