//! Page navigation with an exit/enter transition.
//!
//! A trigger does not change the page right away: the machine enters an
//! exiting phase, and the next [`NavigationMachine::poll`] after the
//! transition delay commits the most recently requested target.

use std::time::Duration;

use tokio::time::Instant;

use crate::catalog::CatalogStore;
use crate::model::Character;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Selection,
    Detail,
}

/// Which page is shown. A character id is present exactly on the detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    page: Page,
    character_id: Option<String>,
}

impl NavigationState {
    pub fn selection() -> Self {
        Self {
            page: Page::Selection,
            character_id: None,
        }
    }

    pub fn detail(character_id: impl Into<String>) -> Self {
        Self {
            page: Page::Detail,
            character_id: Some(character_id.into()),
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn character_id(&self) -> Option<&str> {
        self.character_id.as_deref()
    }
}

impl Default for NavigationState {
    fn default() -> Self {
        Self::selection()
    }
}

/// Presentation phase of the current transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Idle,
    Exiting,
    Entering,
}

/// Result of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    Committed(NavigationState),
    /// The requested character was not in the catalog; the selection page
    /// was committed instead.
    FellBack { missing: String },
}

#[derive(Debug, Clone)]
struct PendingTransition {
    target: NavigationState,
    due: Instant,
}

#[derive(Debug)]
pub struct NavigationMachine {
    state: NavigationState,
    pending: Option<PendingTransition>,
    entering_until: Option<Instant>,
    transition: Duration,
}

impl NavigationMachine {
    pub fn new(transition: Duration) -> Self {
        Self {
            state: NavigationState::selection(),
            pending: None,
            entering_until: None,
            transition,
        }
    }

    /// The committed state.
    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn phase(&self) -> TransitionPhase {
        if self.pending.is_some() {
            TransitionPhase::Exiting
        } else if self.entering_until.is_some() {
            TransitionPhase::Entering
        } else {
            TransitionPhase::Idle
        }
    }

    /// Target waiting for the exit phase to finish.
    pub fn pending_target(&self) -> Option<&NavigationState> {
        self.pending.as_ref().map(|p| &p.target)
    }

    /// When [`poll`](Self::poll) next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .as_ref()
            .map(|p| p.due)
            .or(self.entering_until)
    }

    pub fn select_character(&mut self, id: impl Into<String>, now: Instant) {
        self.request(NavigationState::detail(id), now);
    }

    pub fn back(&mut self, now: Instant) {
        self.request(NavigationState::selection(), now);
    }

    /// Schedule a transition, replacing any transition still exiting.
    fn request(&mut self, target: NavigationState, now: Instant) {
        if let Some(previous) = &self.pending {
            tracing::debug!(
                previous = ?previous.target,
                target = ?target,
                "Pending transition superseded"
            );
        }
        self.entering_until = None;
        self.pending = Some(PendingTransition {
            target,
            due: now + self.transition,
        });
    }

    /// Advance the transition clock. Returns the commit when one happens.
    pub fn poll(&mut self, now: Instant, catalog: &CatalogStore) -> Option<NavigationEvent> {
        if self.entering_until.is_some_and(|until| until <= now) {
            self.entering_until = None;
        }

        let due = self.pending.as_ref().is_some_and(|p| p.due <= now);
        if !due {
            return None;
        }
        let target = self.pending.take()?.target;

        let missing = target
            .character_id()
            .filter(|id| !catalog.contains(id))
            .map(str::to_string);

        let event = match missing {
            Some(id) => {
                tracing::warn!(character_id = %id, "Unknown character, showing selection page");
                self.state = NavigationState::selection();
                NavigationEvent::FellBack { missing: id }
            }
            None => {
                self.state = target;
                NavigationEvent::Committed(self.state.clone())
            }
        };

        tracing::info!(page = ?self.state.page(), character_id = ?self.state.character_id(), "Page committed");
        self.entering_until = Some(now + self.transition);
        Some(event)
    }

    /// The character shown on the detail page, if it exists.
    pub fn selected_character<'a>(&self, catalog: &'a CatalogStore) -> Option<&'a Character> {
        match (self.state.page(), self.state.character_id()) {
            (Page::Detail, Some(id)) => catalog.find_character(id),
            _ => None,
        }
    }
}
