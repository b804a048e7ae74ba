use crate::chat::{ChatMessage, GenerationRequest};
use crate::event::AppEvent;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::{mpsc, Arc};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::RwLock;

pub mod openai;

pub use openai::OpenAiAssistant;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssistantError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("invalid assistant configuration: {0}")]
    Configuration(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("provider returned {status}: {message}")]
    Provider { status: u16, message: String },
    #[error("unreadable assistant response: {0}")]
    InvalidResponse(String),
}

/// A completed generation. Buffers the assistant did not touch are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub text: String,
    pub markup: Option<String>,
    pub style: Option<String>,
    pub script: Option<String>,
    pub consumed_units: u64,
    pub cost: Decimal,
}

pub type GenerationOutcome = Result<AssistantReply, AssistantError>;

#[async_trait]
pub trait Assistant: Send + Sync {
    async fn generate(&self, transcript: &[ChatMessage]) -> GenerationOutcome;

    /// Checks that the credentials are accepted by the provider.
    async fn verify(&self) -> Result<(), AssistantError>;
}

/// Runs assistant calls on the tokio runtime and reports each completion back
/// to the UI thread as an `AppEvent`.
#[derive(Clone)]
pub struct AssistantClient {
    tx: mpsc::Sender<AppEvent>,
    assistant: Arc<RwLock<Option<Arc<dyn Assistant>>>>,
    runtime_handle: Handle,
}

impl AssistantClient {
    pub fn new(tx: mpsc::Sender<AppEvent>, runtime_handle: Handle) -> Self {
        Self {
            tx,
            assistant: Arc::new(RwLock::new(None)),
            runtime_handle,
        }
    }

    /// Verifies the candidate and, if the provider accepts it, makes it the
    /// assistant used for later requests.
    pub fn verify_and_install(&self, api_key: String, candidate: Arc<dyn Assistant>) {
        let tx = self.tx.clone();
        let slot = Arc::clone(&self.assistant);

        self.runtime_handle.spawn(async move {
            let result = candidate.verify().await;
            match &result {
                Ok(()) => {
                    let mut guard = slot.write().await;
                    *guard = Some(candidate);
                    tracing::info!("assistant credentials accepted");
                }
                Err(err) => tracing::warn!(error = %err, "assistant credentials rejected"),
            }
            let _ = tx.send(AppEvent::ApiKeyChecked { api_key, result });
        });
    }

    pub fn send(&self, request: GenerationRequest) {
        let tx = self.tx.clone();
        let slot = Arc::clone(&self.assistant);

        self.runtime_handle.spawn(async move {
            let assistant = {
                let guard = slot.read().await;
                guard.clone()
            };

            let outcome = match assistant {
                Some(assistant) => assistant.generate(&request.transcript).await,
                None => Err(AssistantError::MissingApiKey),
            };
            if let Err(err) = &outcome {
                tracing::warn!(request_id = request.request_id, error = %err, "generation failed");
            }
            let _ = tx.send(AppEvent::GenerationFinished {
                request_id: request.request_id,
                outcome,
            });
        });
    }
}
