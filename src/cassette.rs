//! Scripted stand-in for the remote generation service.
//!
//! A cassette is a TOML file describing the handshake ids and, for every
//! generation, the status answers and the result archive the service gives.
//! [`ReplayService`] plays it back and keeps a log of the calls it received.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::protocol::{
    ConversationId, GenerationId, GenerationRequest, GenerationService, ResultArchive,
    StatusReport, UploadId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cassette {
    #[serde(default = "default_conversation_id")]
    pub conversation_id: ConversationId,
    #[serde(default = "default_upload_id")]
    pub upload_id: UploadId,
    /// Messages sent in order when the cassette is replayed from the CLI.
    #[serde(default)]
    pub messages: Vec<String>,
    /// Makes `start_conversation` fail with this text.
    #[serde(default)]
    pub handshake_error: Option<String>,
    /// Consumed one per `start_generation` call.
    #[serde(default)]
    pub generations: Vec<ScriptedGeneration>,
}

fn default_conversation_id() -> ConversationId {
    ConversationId::from("conv-replay")
}

fn default_upload_id() -> UploadId {
    UploadId::from("upload-replay")
}

fn default_generation_id() -> GenerationId {
    GenerationId::from("gen-replay")
}

impl Default for Cassette {
    fn default() -> Self {
        Self {
            conversation_id: default_conversation_id(),
            upload_id: default_upload_id(),
            messages: Vec::new(),
            handshake_error: None,
            generations: Vec::new(),
        }
    }
}

impl Cassette {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read cassette {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse cassette {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedGeneration {
    #[serde(default = "default_generation_id")]
    pub generation_id: GenerationId,
    /// Answers to successive status queries; the last one repeats. Empty
    /// means the generation never leaves `InProgress`.
    #[serde(default)]
    pub statuses: Vec<StatusReport>,
    #[serde(default)]
    pub archive: ResultArchive,
    /// Makes `start_generation` fail with this text.
    #[serde(default)]
    pub start_error: Option<String>,
    /// Makes `fetch_result_archive` fail with this text.
    #[serde(default)]
    pub archive_error: Option<String>,
}

impl Default for ScriptedGeneration {
    fn default() -> Self {
        Self {
            generation_id: default_generation_id(),
            statuses: Vec::new(),
            archive: ResultArchive::default(),
            start_error: None,
            archive_error: None,
        }
    }
}

/// One call received by a [`ReplayService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    StartConversation,
    CreateUpload,
    StartGeneration { message: String, iteration: u32 },
    GetGenerationStatus(GenerationId),
    FetchResultArchive(GenerationId),
}

#[derive(Default)]
struct Playback {
    next_generation: usize,
    /// Generation index and number of status answers served, by id.
    started: HashMap<GenerationId, (usize, usize)>,
    calls: Vec<RecordedCall>,
    last_request: Option<GenerationRequest>,
}

pub struct ReplayService {
    cassette: Cassette,
    playback: Mutex<Playback>,
}

impl ReplayService {
    pub fn new(cassette: Cassette) -> Self {
        Self {
            cassette,
            playback: Mutex::new(Playback::default()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.playback().calls.clone()
    }

    /// The request carried by the most recent `start_generation` call.
    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.playback().last_request.clone()
    }

    fn playback(&self) -> MutexGuard<'_, Playback> {
        self.playback.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Playback {
    fn started(&self, id: &GenerationId) -> Result<(usize, usize)> {
        self.started
            .get(id)
            .copied()
            .with_context(|| format!("generation {id} was never started"))
    }
}

impl std::fmt::Debug for ReplayService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayService")
            .field("conversation_id", &self.cassette.conversation_id)
            .field("generations", &self.cassette.generations.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GenerationService for ReplayService {
    async fn start_conversation(&self) -> Result<ConversationId> {
        self.playback().calls.push(RecordedCall::StartConversation);
        if let Some(error) = &self.cassette.handshake_error {
            anyhow::bail!("{error}");
        }
        Ok(self.cassette.conversation_id.clone())
    }

    async fn create_upload(&self, _conversation: &ConversationId) -> Result<UploadId> {
        self.playback().calls.push(RecordedCall::CreateUpload);
        Ok(self.cassette.upload_id.clone())
    }

    async fn start_generation(
        &self,
        _conversation: &ConversationId,
        _upload: &UploadId,
        request: &GenerationRequest,
    ) -> Result<GenerationId> {
        let mut playback = self.playback();
        playback.calls.push(RecordedCall::StartGeneration {
            message: request.message.clone(),
            iteration: request.iteration,
        });
        playback.last_request = Some(request.clone());

        let index = playback.next_generation;
        let scripted = self
            .cassette
            .generations
            .get(index)
            .with_context(|| format!("cassette has no generation #{}", index + 1))?;
        playback.next_generation += 1;
        if let Some(error) = &scripted.start_error {
            anyhow::bail!("{error}");
        }
        playback
            .started
            .insert(scripted.generation_id.clone(), (index, 0));
        Ok(scripted.generation_id.clone())
    }

    async fn get_generation_status(
        &self,
        _conversation: &ConversationId,
        generation: &GenerationId,
    ) -> Result<StatusReport> {
        let mut playback = self.playback();
        playback
            .calls
            .push(RecordedCall::GetGenerationStatus(generation.clone()));
        let (index, served) = playback.started(generation)?;
        playback
            .started
            .insert(generation.clone(), (index, served + 1));

        let statuses = &self.cassette.generations[index].statuses;
        let report = statuses
            .get(served)
            .or_else(|| statuses.last())
            .cloned()
            .unwrap_or_else(StatusReport::in_progress);
        Ok(report)
    }

    async fn fetch_result_archive(
        &self,
        _conversation: &ConversationId,
        generation: &GenerationId,
    ) -> Result<ResultArchive> {
        let mut playback = self.playback();
        playback
            .calls
            .push(RecordedCall::FetchResultArchive(generation.clone()));
        let (index, _) = playback.started(generation)?;
        let scripted = &self.cassette.generations[index];
        if let Some(error) = &scripted.archive_error {
            anyhow::bail!("{error}");
        }
        Ok(scripted.archive.clone())
    }
}
