//! Add-dialogue form.
//!
//! Only reachable in admin mode from a character's detail page. Fields are
//! validated when the form is submitted, not while they are edited.

use crate::catalog::CatalogStore;
use crate::error::PickerError;
use crate::model::{AudioRef, Dialogue, Intonation};
use crate::navigation::{NavigationState, Page};
use crate::suggestion::{SuggestionGateway, SuggestionRequest, SuggestionResponse};

const MISSING_FIELDS: &str = "Veuillez remplir la phrase et sélectionner un fichier audio.";

/// Whether catalog mutations are reachable at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminMode {
    Enabled,
    Disabled,
}

impl AdminMode {
    pub fn is_enabled(&self) -> bool {
        matches!(self, AdminMode::Enabled)
    }
}

impl From<bool> for AdminMode {
    fn from(enabled: bool) -> Self {
        if enabled {
            AdminMode::Enabled
        } else {
            AdminMode::Disabled
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Closed,
    Open,
    SubmittingSuggestion,
    /// Open, with an error message on display.
    Error,
}

/// Proof that a suggestion was requested by a given form instance.
#[derive(Debug, Clone)]
pub struct SuggestionTicket {
    generation: u64,
    request: SuggestionRequest,
}

impl SuggestionTicket {
    pub fn request(&self) -> &SuggestionRequest {
        &self.request
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionOutcome {
    /// The text field now holds the suggestion.
    Applied(String),
    /// The gateway failed; the message is shown on the form.
    Failed(String),
    /// The form was cancelled or reopened while waiting.
    Discarded,
}

#[derive(Debug)]
pub struct AddDialogueWorkflow {
    admin: AdminMode,
    state: FormState,
    character_id: Option<String>,
    text: String,
    audio: Option<AudioRef>,
    intonation: Intonation,
    error: Option<String>,
    /// Bumped each time the form opens or closes.
    generation: u64,
}

impl AddDialogueWorkflow {
    pub fn new(admin: AdminMode) -> Self {
        Self {
            admin,
            state: FormState::Closed,
            character_id: None,
            text: String::new(),
            audio: None,
            intonation: Intonation::default(),
            error: None,
            generation: 0,
        }
    }

    pub fn admin(&self) -> AdminMode {
        self.admin
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != FormState::Closed
    }

    pub fn character_id(&self) -> Option<&str> {
        self.character_id.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn audio(&self) -> Option<&AudioRef> {
        self.audio.as_ref()
    }

    pub fn intonation(&self) -> Intonation {
        self.intonation
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Open an empty form for the character on the detail page.
    pub fn open(&mut self, navigation: &NavigationState) -> Result<(), PickerError> {
        if !self.admin.is_enabled() {
            return Err(PickerError::NotAvailable(
                "adding dialogues requires admin mode".to_string(),
            ));
        }
        let character_id = match (navigation.page(), navigation.character_id()) {
            (Page::Detail, Some(id)) => id.to_string(),
            _ => {
                return Err(PickerError::NotAvailable(
                    "select a character first".to_string(),
                ));
            }
        };
        if self.is_open() {
            return Err(PickerError::NotAvailable("the form is already open".to_string()));
        }

        self.reset();
        self.character_id = Some(character_id);
        self.state = FormState::Open;
        Ok(())
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> Result<(), PickerError> {
        self.ensure_open()?;
        self.text = text.into();
        Ok(())
    }

    pub fn set_audio(&mut self, audio: Option<AudioRef>) -> Result<(), PickerError> {
        self.ensure_open()?;
        self.audio = audio;
        Ok(())
    }

    pub fn set_intonation(&mut self, intonation: Intonation) -> Result<(), PickerError> {
        self.ensure_open()?;
        self.intonation = intonation;
        Ok(())
    }

    pub fn dismiss_error(&mut self) {
        if self.state == FormState::Error {
            self.state = FormState::Open;
        }
        self.error = None;
    }

    /// Enter the suggesting state and build the gateway request.
    pub fn begin_suggestion(
        &mut self,
        catalog: &CatalogStore,
    ) -> Result<SuggestionTicket, PickerError> {
        match self.state {
            FormState::Closed => {
                return Err(PickerError::NotAvailable("the form is closed".to_string()));
            }
            FormState::SubmittingSuggestion => return Err(PickerError::SuggestionInFlight),
            FormState::Open | FormState::Error => {}
        }

        let character_id = self.character_id.as_deref().unwrap_or_default();
        let character = catalog
            .find_character(character_id)
            .ok_or_else(|| PickerError::UnknownCharacter(character_id.to_string()))?;

        self.error = None;
        self.state = FormState::SubmittingSuggestion;
        Ok(SuggestionTicket {
            generation: self.generation,
            request: SuggestionRequest::from(character),
        })
    }

    /// Apply a gateway result, unless the form it was meant for is gone.
    pub fn complete_suggestion(
        &mut self,
        ticket: SuggestionTicket,
        result: Result<SuggestionResponse, PickerError>,
    ) -> SuggestionOutcome {
        if ticket.generation != self.generation || self.state != FormState::SubmittingSuggestion {
            tracing::debug!("Discarding suggestion for a closed form");
            return SuggestionOutcome::Discarded;
        }

        let result = result.and_then(|response| {
            let text = response.suggested_text.trim().to_string();
            if text.is_empty() {
                Err(PickerError::Gateway("empty suggestion".to_string()))
            } else {
                Ok(text)
            }
        });

        match result {
            Ok(text) => {
                self.text = text.clone();
                self.state = FormState::Open;
                SuggestionOutcome::Applied(text)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dialogue suggestion failed");
                let message = e.to_string();
                self.error = Some(message.clone());
                self.state = FormState::Error;
                SuggestionOutcome::Failed(message)
            }
        }
    }

    /// Ask the gateway for a line and put it in the text field.
    pub async fn request_suggestion(
        &mut self,
        gateway: &dyn SuggestionGateway,
        catalog: &CatalogStore,
    ) -> Result<SuggestionOutcome, PickerError> {
        let ticket = self.begin_suggestion(catalog)?;
        let result = gateway.suggest(ticket.request().clone()).await;
        Ok(self.complete_suggestion(ticket, result))
    }

    /// Validate the fields and add the dialogue to the catalog.
    pub fn submit(&mut self, catalog: &mut CatalogStore) -> Result<Dialogue, PickerError> {
        self.ensure_open()?;

        let text = self.text.trim().to_string();
        let audio = match (&self.audio, text.is_empty()) {
            (Some(audio), false) => audio.clone(),
            _ => {
                self.error = Some(MISSING_FIELDS.to_string());
                self.state = FormState::Error;
                return Err(PickerError::Validation(MISSING_FIELDS.to_string()));
            }
        };

        let character_id = self.character_id.clone().unwrap_or_default();
        match catalog.append_dialogue(&character_id, text, audio, self.intonation) {
            Ok(dialogue) => {
                self.cancel();
                Ok(dialogue)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                self.state = FormState::Error;
                Err(e)
            }
        }
    }

    /// Close the form from any state, discarding its fields.
    pub fn cancel(&mut self) {
        self.reset();
        self.state = FormState::Closed;
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.character_id = None;
        self.text.clear();
        self.audio = None;
        self.intonation = Intonation::default();
        self.error = None;
    }

    fn ensure_open(&self) -> Result<(), PickerError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(PickerError::NotAvailable("the form is closed".to_string()))
        }
    }
}
