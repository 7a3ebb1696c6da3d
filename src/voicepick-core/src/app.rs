//! Application state: ties the catalog, navigation, playback and the
//! add-dialogue form together.
//!
//! Entering a character's detail page registers one playback session per
//! dialogue; leaving it drops them.

use std::collections::HashMap;

use tokio::time::Instant;

use crate::catalog::CatalogStore;
use crate::config::Config;
use crate::error::PickerError;
use crate::filter::filter;
use crate::model::{Character, Dialogue};
use crate::navigation::{NavigationEvent, NavigationMachine, NavigationState, Page, TransitionPhase};
use crate::playback::{AudioOutput, PlaybackCoordinator, PlaybackState, SessionHandle};
use crate::suggestion::SuggestionGateway;
use crate::workflow::{AddDialogueWorkflow, AdminMode, SuggestionOutcome};

/// Callback for picker events.
pub type PickerCallback = Box<dyn Fn(PickerEvent) + Send + Sync>;

/// Events emitted while the picker runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerEvent {
    /// A page transition was committed.
    PageCommitted {
        page: Page,
        character_id: Option<String>,
    },
    /// A detail page was requested for a character that does not exist.
    CharacterNotFound { character_id: String },
    PlaybackStarted { dialogue_id: u64 },
    PlaybackStopped { dialogue_id: u64 },
    DialogueAdded {
        character_id: String,
        dialogue: Dialogue,
    },
}

/// A dialogue as shown on the detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueEntry<'a> {
    pub dialogue: &'a Dialogue,
    pub session: SessionHandle,
    pub state: PlaybackState,
}

pub struct VoicePicker {
    catalog: CatalogStore,
    navigation: NavigationMachine,
    playback: PlaybackCoordinator,
    form: AddDialogueWorkflow,
    search_term: String,
    /// Playback sessions of the current detail page, by dialogue id.
    sessions: HashMap<u64, SessionHandle>,
    callback: Option<PickerCallback>,
}

impl VoicePicker {
    pub fn new(
        config: &Config,
        admin: AdminMode,
        output: Box<dyn AudioOutput>,
    ) -> Result<Self, PickerError> {
        let catalog = CatalogStore::from_seed(config.characters.clone())?;
        tracing::info!(
            characters = catalog.list_characters().len(),
            admin = admin.is_enabled(),
            "Catalog loaded"
        );

        Ok(Self {
            catalog,
            navigation: NavigationMachine::new(config.navigation.transition()),
            playback: PlaybackCoordinator::new(output, config.playback.stop_ack_timeout()),
            form: AddDialogueWorkflow::new(admin),
            search_term: String::new(),
            sessions: HashMap::new(),
            callback: None,
        })
    }

    /// Set a callback for picker events.
    pub fn with_callback(mut self, callback: PickerCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn navigation(&self) -> &NavigationState {
        self.navigation.state()
    }

    pub fn phase(&self) -> TransitionPhase {
        self.navigation.phase()
    }

    pub fn admin(&self) -> AdminMode {
        self.form.admin()
    }

    /// Characters for the selection page.
    pub fn characters(&self) -> &[Character] {
        self.catalog.list_characters()
    }

    pub fn current_character(&self) -> Option<&Character> {
        self.navigation.selected_character(&self.catalog)
    }

    pub fn select_character(&mut self, id: impl Into<String>, now: Instant) {
        self.navigation.select_character(id, now);
    }

    pub fn back(&mut self, now: Instant) {
        self.navigation.back(now);
    }

    /// Earliest instant at which [`poll`](Self::poll) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.navigation.next_deadline(), self.playback.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Advance timers: commit due page transitions and start playback that
    /// was waiting on stop acknowledgements.
    pub fn poll(&mut self, now: Instant) {
        if let Some(event) = self.navigation.poll(now, &self.catalog) {
            if let NavigationEvent::FellBack { missing } = &event {
                self.emit_event(PickerEvent::CharacterNotFound {
                    character_id: missing.clone(),
                });
            }
            self.enter_page();
        }

        let before = self.playback.playing();
        if self.playback.poll(now).is_some() {
            self.emit_transition(before);
        }
    }

    /// Reset page-local state and register sessions for the new page.
    fn enter_page(&mut self) {
        if let Some(dialogue_id) = self.playback.playing().and_then(|h| self.dialogue_for(h)) {
            self.emit_event(PickerEvent::PlaybackStopped { dialogue_id });
        }
        self.playback.clear();
        self.sessions.clear();
        self.search_term.clear();
        self.form.cancel();

        if let Some(character) = self.navigation.selected_character(&self.catalog) {
            for dialogue in &character.dialogues {
                let handle = self.playback.register(dialogue.audio_src.clone());
                self.sessions.insert(dialogue.id, handle);
            }
        }

        let state = self.navigation.state();
        self.emit_event(PickerEvent::PageCommitted {
            page: state.page(),
            character_id: state.character_id().map(str::to_string),
        });
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    /// Dialogues of the current character matching the search term.
    pub fn visible_dialogues(&self) -> Vec<DialogueEntry<'_>> {
        let Some(character) = self.current_character() else {
            return Vec::new();
        };

        filter(&character.dialogues, &self.search_term)
            .into_iter()
            .filter_map(|dialogue| {
                let session = *self.sessions.get(&dialogue.id)?;
                let state = self.playback.state(session)?;
                Some(DialogueEntry {
                    dialogue,
                    session,
                    state,
                })
            })
            .collect()
    }

    pub fn session_for(&self, dialogue_id: u64) -> Option<SessionHandle> {
        self.sessions.get(&dialogue_id).copied()
    }

    /// Id of the dialogue currently playing.
    pub fn playing_dialogue(&self) -> Option<u64> {
        self.playback.playing().and_then(|h| self.dialogue_for(h))
    }

    fn dialogue_for(&self, handle: SessionHandle) -> Option<u64> {
        self.sessions
            .iter()
            .find(|(_, h)| **h == handle)
            .map(|(id, _)| *id)
    }

    fn session_or_err(&self, dialogue_id: u64) -> Result<SessionHandle, PickerError> {
        self.session_for(dialogue_id).ok_or_else(|| {
            PickerError::NotAvailable(format!("dialogue {} is not on this page", dialogue_id))
        })
    }

    /// Play a dialogue, stopping whatever else is playing.
    pub fn play(&mut self, dialogue_id: u64, now: Instant) -> Result<PlaybackState, PickerError> {
        let handle = self.session_or_err(dialogue_id)?;
        let before = self.playback.playing();
        let state = self.playback.request_play(handle, now)?;
        self.emit_transition(before);
        Ok(state)
    }

    pub fn pause(&mut self, dialogue_id: u64) -> Result<(), PickerError> {
        let handle = self.session_or_err(dialogue_id)?;
        let before = self.playback.playing();
        self.playback.request_pause(handle)?;
        self.emit_transition(before);
        Ok(())
    }

    /// Play/pause button.
    pub fn toggle(&mut self, dialogue_id: u64, now: Instant) -> Result<PlaybackState, PickerError> {
        let handle = self.session_or_err(dialogue_id)?;
        let before = self.playback.playing();
        let state = self.playback.toggle(handle, now)?;
        self.emit_transition(before);
        Ok(state)
    }

    /// Audio output callback: playback reached the end.
    pub fn on_natural_end(&mut self, handle: SessionHandle) {
        let before = self.playback.playing();
        self.playback.on_natural_end(handle);
        self.emit_transition(before);
    }

    /// Audio output callback: the output paused.
    pub fn on_external_pause(&mut self, handle: SessionHandle) {
        let before = self.playback.playing();
        self.playback.on_external_pause(handle);
        self.emit_transition(before);
    }

    pub fn form(&self) -> &AddDialogueWorkflow {
        &self.form
    }

    /// Field editing on the open form.
    pub fn form_mut(&mut self) -> &mut AddDialogueWorkflow {
        &mut self.form
    }

    pub fn open_form(&mut self) -> Result<(), PickerError> {
        self.form.open(self.navigation.state())
    }

    pub fn cancel_form(&mut self) {
        self.form.cancel();
    }

    pub async fn request_suggestion(
        &mut self,
        gateway: &dyn SuggestionGateway,
    ) -> Result<SuggestionOutcome, PickerError> {
        self.form.request_suggestion(gateway, &self.catalog).await
    }

    /// Submit the form; the new dialogue gets its own playback session.
    pub fn submit_form(&mut self) -> Result<Dialogue, PickerError> {
        let character_id = self.form.character_id().map(str::to_string);
        let dialogue = self.form.submit(&mut self.catalog)?;

        if character_id.as_deref() == self.navigation.state().character_id() {
            let handle = self.playback.register(dialogue.audio_src.clone());
            self.sessions.insert(dialogue.id, handle);
        }

        self.emit_event(PickerEvent::DialogueAdded {
            character_id: character_id.unwrap_or_default(),
            dialogue: dialogue.clone(),
        });
        Ok(dialogue)
    }

    /// Report a change of the playing session.
    fn emit_transition(&self, before: Option<SessionHandle>) {
        let after = self.playback.playing();
        if before == after {
            return;
        }
        if let Some(dialogue_id) = before.and_then(|h| self.dialogue_for(h)) {
            self.emit_event(PickerEvent::PlaybackStopped { dialogue_id });
        }
        if let Some(dialogue_id) = after.and_then(|h| self.dialogue_for(h)) {
            self.emit_event(PickerEvent::PlaybackStarted { dialogue_id });
        }
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: PickerEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}
