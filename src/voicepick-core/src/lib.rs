//! Voicepick Core Library
//!
//! Character catalog, dialogue search, exclusive playback, page navigation
//! and the add-dialogue workflow.

pub mod app;
pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod navigation;
pub mod playback;
pub mod suggestion;
pub mod workflow;

pub use app::{DialogueEntry, PickerCallback, PickerEvent, VoicePicker};
pub use catalog::CatalogStore;
pub use config::{Config, default_config};
pub use error::PickerError;
pub use model::{AudioRef, Character, Dialogue, Intonation};
pub use navigation::{NavigationEvent, NavigationMachine, NavigationState, Page, TransitionPhase};
pub use playback::{
    AudioCommand, AudioOutput, PlaybackCoordinator, PlaybackState, RecordingOutput, SessionHandle,
};
pub use suggestion::{
    OpenAiSuggestionGateway, SuggestionGateway, SuggestionRequest, SuggestionResponse,
};
pub use workflow::{AddDialogueWorkflow, AdminMode, FormState, SuggestionOutcome, SuggestionTicket};
