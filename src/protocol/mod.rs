//! Wire types and the remote generation service contract.

use anyhow::Result;
use async_trait::async_trait;

pub mod types;

pub use types::{
    CodeReference, ConversationId, FileReview, GenerationFailure, GenerationId, GenerationRequest,
    GenerationStatus, NewFileContent, ResultArchive, StatusReport, UploadId,
};

/// Remote code-generation service.
///
/// Implementations are injected into a session; nothing in this crate keeps a
/// process-wide client. Errors are returned as-is and never retried here.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn start_conversation(&self) -> Result<ConversationId>;

    /// Register the workspace snapshot for `conversation`.
    async fn create_upload(&self, conversation: &ConversationId) -> Result<UploadId>;

    async fn start_generation(
        &self,
        conversation: &ConversationId,
        upload: &UploadId,
        request: &GenerationRequest,
    ) -> Result<GenerationId>;

    async fn get_generation_status(
        &self,
        conversation: &ConversationId,
        generation: &GenerationId,
    ) -> Result<StatusReport>;

    async fn fetch_result_archive(
        &self,
        conversation: &ConversationId,
        generation: &GenerationId,
    ) -> Result<ResultArchive>;
}
