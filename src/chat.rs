use crate::assistant::GenerationOutcome;
use crate::error::{Result, WorkspaceError};
use crate::project::Project;
use crate::usage::UsageTotals;
use crate::workspace::WorkspaceState;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One transcript entry together with the code it refers to: what the user
/// was looking at when asking, or what the assistant produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    pub project_at_send: Project,
    pub timestamp: String,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>, project_at_send: Project) -> Self {
        Self {
            role,
            text: text.into(),
            project_at_send,
            timestamp: timestamp(),
        }
    }
}

fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs().to_string(),
        Err(_) => "0".to_string(),
    }
}

/// Everything the assistant needs for one generation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub request_id: u64,
    pub transcript: Vec<ChatMessage>,
}

/// Append-only conversation with at most one outstanding generation.
#[derive(Debug, Default)]
pub struct ChatSession {
    transcript: Vec<ChatMessage>,
    pending: Option<u64>,
    next_request_id: u64,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn append_user_message(
        &mut self,
        text: &str,
        project: &Project,
    ) -> Result<GenerationRequest> {
        if self.is_busy() {
            return Err(WorkspaceError::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(WorkspaceError::EmptyMessage);
        }

        self.transcript
            .push(ChatMessage::new(Role::User, text, project.clone()));
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        self.pending = Some(request_id);
        tracing::debug!(request_id, turns = self.transcript.len(), "generation requested");

        Ok(GenerationRequest {
            request_id,
            transcript: self.transcript.clone(),
        })
    }

    /// Applies the outcome of the outstanding request. A reply is appended to
    /// the transcript, replaces the buffers it carries and adds its usage; a
    /// failure only releases the busy flag and is handed back to the caller.
    pub fn complete(
        &mut self,
        request_id: u64,
        outcome: GenerationOutcome,
        workspace: &mut WorkspaceState,
        usage: &mut UsageTotals,
    ) -> Result<()> {
        if self.pending != Some(request_id) {
            tracing::warn!(request_id, "ignoring completion for a request that is not outstanding");
            return Ok(());
        }
        self.pending = None;

        let reply = outcome?;
        workspace.apply_reply_buffers(
            reply.markup.as_deref(),
            reply.style.as_deref(),
            reply.script.as_deref(),
        );
        self.transcript.push(ChatMessage::new(
            Role::Assistant,
            reply.text,
            workspace.project().clone(),
        ));
        usage.add(reply.consumed_units, reply.cost);
        Ok(())
    }
}
