//! Ask questions about an invoice image using a hosted multimodal model.
//!
//! The crate is organized around [`AnswerOrchestrator`], which takes one
//! question and an optional decoded image, builds a three-part prompt
//! (system instruction, image, question) and hands it to a
//! [`MultimodalModel`]. [`GeminiClient`] is the production model; tests and
//! other front ends can plug in their own.
//!
//! ```no_run
//! use invoice_extractor::{AnswerOrchestrator, GeminiClient, GeminiConfig, ImageHandle};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GeminiClient::new(GeminiConfig::from_env()?)?;
//! let orchestrator = AnswerOrchestrator::new(client);
//!
//! let image = ImageHandle::open("invoice.png")?;
//! match orchestrator.answer("What is the due date?", Some(&image)) {
//!     Ok(text) => println!("{text}"),
//!     Err(e) => eprintln!("{e}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod gemini;
pub mod image_handle;
pub mod model;
pub mod orchestrator;
pub mod page;

pub use config::ConfigError;
pub use gemini::{GeminiClient, GeminiConfig, GeminiError};
pub use image_handle::{ALLOWED_FORMATS, ImageDecodeError, ImageFormat, ImageHandle};
pub use model::{ModelResponse, MultimodalModel, MultimodalPrompt, PromptPart};
pub use orchestrator::{
    AnswerError, AnswerOrchestrator, AnswerResult, DiagnosticSink, FailureKind, LogSink,
    OrchestratorState, SYSTEM_PROMPT,
};
