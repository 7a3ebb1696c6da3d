//! Error types for the voice picker.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PickerError {
    /// Navigation pointed at a character that is not in the catalog.
    #[error("Unknown character: {0}")]
    UnknownCharacter(String),

    #[error("{0}")]
    Validation(String),

    #[error("Suggestion failed: {0}")]
    Gateway(String),

    /// A dialogue was appended to a character that does not exist.
    #[error("Cannot add a dialogue to unknown character '{0}'")]
    Mutation(String),

    #[error("Not available: {0}")]
    NotAvailable(String),

    #[error("A suggestion is already being generated")]
    SuggestionInFlight,

    #[error("Unknown playback session: {0}")]
    UnknownSession(u64),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),
}
