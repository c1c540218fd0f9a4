//! Completion model trait for text generation backends.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

/// An ordered sequence of generated text fragments.
///
/// The stream terminates when the backend signals its stop condition or
/// exhausts its output. Dropping the stream cancels the underlying request
/// at the next awaited read.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// A text generation service offering single-shot and incremental completion.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Generate the full completion for `prompt` in one call.
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String>;

    /// Generate a completion incrementally, yielding text fragments in the
    /// exact order the backend produces them.
    async fn complete_stream(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<TokenStream>;
}
