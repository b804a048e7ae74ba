use crate::assistant::{AssistantError, GenerationOutcome};

#[derive(Debug, Clone)]
pub enum AppEvent {
    GenerationFinished {
        request_id: u64,
        outcome: GenerationOutcome,
    },
    ApiKeyChecked {
        api_key: String,
        result: Result<(), AssistantError>,
    },
}
