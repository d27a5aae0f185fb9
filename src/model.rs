use crate::image_handle::ImageHandle;

/// A single piece of a multimodal prompt.
#[derive(Clone, Copy, Debug)]
pub enum PromptPart<'a> {
    Text(&'a str),
    Image(&'a ImageHandle),
}

/// Ordered list of parts sent to the model in one call.
///
/// The order is significant and is preserved all the way to the wire.
#[derive(Clone, Debug, Default)]
pub struct MultimodalPrompt<'a> {
    parts: Vec<PromptPart<'a>>,
}

impl<'a> MultimodalPrompt<'a> {
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Builds the invoice prompt: system instruction, then the image, then the question.
    pub fn invoice(system_prompt: &'a str, image: &'a ImageHandle, question: &'a str) -> Self {
        Self::new()
            .text(system_prompt)
            .image(image)
            .text(question)
    }

    pub fn text(mut self, text: &'a str) -> Self {
        self.parts.push(PromptPart::Text(text));
        self
    }

    pub fn image(mut self, image: &'a ImageHandle) -> Self {
        self.parts.push(PromptPart::Image(image));
        self
    }

    pub fn parts(&self) -> &[PromptPart<'a>] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelResponse {
    pub text: String,
}

/// Trait for hosted (or local) models able to answer a multimodal prompt.
///
/// Implementors own whatever connection state they need; the orchestrator
/// holds exactly one instance for the process lifetime.
pub trait MultimodalModel {
    /// The error type that can be returned during generation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs one generation for the given prompt.
    fn generate(&mut self, prompt: &MultimodalPrompt<'_>) -> Result<ModelResponse, Self::Error>;
}
