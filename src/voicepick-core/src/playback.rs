//! Exclusive audio playback.
//!
//! Every rendered dialogue registers a session with the coordinator. Starting
//! one session pauses all the others, so at most one session is ever in the
//! `Playing` state.
//!
//! Sessions paused by a stop-all are expected to confirm through
//! [`PlaybackCoordinator::on_external_pause`]. Until every confirmation has
//! arrived, or the acknowledgement timeout has elapsed, the requested session
//! waits in `Pending` and no `play` command is issued for it.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::PickerError;
use crate::model::AudioRef;

/// Opaque identifier of one playback instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionHandle(u64);

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Logical state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    /// Waiting for other sessions to confirm they stopped.
    Pending,
    Playing,
}

/// The audio primitive the coordinator drives.
pub trait AudioOutput {
    fn play(&mut self, handle: SessionHandle, src: &AudioRef);
    fn pause(&mut self, handle: SessionHandle);
}

#[derive(Debug)]
struct Session {
    src: AudioRef,
    state: PlaybackState,
    /// Deadline for the output to confirm a pause we issued during a stop-all.
    awaiting_ack: Option<Instant>,
}

pub struct PlaybackCoordinator {
    output: Box<dyn AudioOutput>,
    sessions: BTreeMap<SessionHandle, Session>,
    next_handle: u64,
    ack_timeout: Duration,
}

impl PlaybackCoordinator {
    pub fn new(output: Box<dyn AudioOutput>, ack_timeout: Duration) -> Self {
        Self {
            output,
            sessions: BTreeMap::new(),
            next_handle: 1,
            ack_timeout,
        }
    }

    pub fn register(&mut self, src: AudioRef) -> SessionHandle {
        let handle = SessionHandle(self.next_handle);
        self.next_handle += 1;
        tracing::debug!(session = %handle, src = %src, "Playback session registered");
        self.sessions.insert(
            handle,
            Session {
                src,
                state: PlaybackState::Stopped,
                awaiting_ack: None,
            },
        );
        handle
    }

    /// Drop a session, pausing it first if it is playing.
    pub fn unregister(&mut self, handle: SessionHandle) -> Result<(), PickerError> {
        let session = self
            .sessions
            .remove(&handle)
            .ok_or(PickerError::UnknownSession(handle.id()))?;
        if session.state == PlaybackState::Playing {
            self.output.pause(handle);
        }
        tracing::debug!(session = %handle, "Playback session unregistered");
        self.promote_pending();
        Ok(())
    }

    /// Drop every session, pausing the one that is playing.
    pub fn clear(&mut self) {
        if let Some(handle) = self.playing() {
            self.output.pause(handle);
        }
        tracing::debug!(count = self.sessions.len(), "Playback sessions cleared");
        self.sessions.clear();
        self.promote_pending();
    }

    pub fn state(&self, handle: SessionHandle) -> Option<PlaybackState> {
        self.sessions.get(&handle).map(|s| s.state)
    }

    pub fn is_playing(&self, handle: SessionHandle) -> bool {
        self.state(handle) == Some(PlaybackState::Playing)
    }

    /// The session currently playing, if any.
    pub fn playing(&self) -> Option<SessionHandle> {
        self.sessions
            .iter()
            .find(|(_, s)| s.state == PlaybackState::Playing)
            .map(|(h, _)| *h)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Earliest pending acknowledgement deadline, for timer-driven callers.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.sessions.values().filter_map(|s| s.awaiting_ack).min()
    }

    /// Stop every other session, then start `handle`.
    pub fn request_play(
        &mut self,
        handle: SessionHandle,
        now: Instant,
    ) -> Result<PlaybackState, PickerError> {
        let state = self
            .state(handle)
            .ok_or(PickerError::UnknownSession(handle.id()))?;
        if state == PlaybackState::Playing {
            return Ok(state);
        }

        self.expire_acks(now);
        self.stop_all_except(handle, now);

        if self.acks_outstanding() {
            self.set_state(handle, PlaybackState::Pending);
            tracing::debug!(session = %handle, "Playback pending stop acknowledgements");
            return Ok(PlaybackState::Pending);
        }

        self.start(handle);
        Ok(PlaybackState::Playing)
    }

    /// Stop this session only.
    pub fn request_pause(&mut self, handle: SessionHandle) -> Result<(), PickerError> {
        let state = self
            .state(handle)
            .ok_or(PickerError::UnknownSession(handle.id()))?;
        match state {
            PlaybackState::Playing => {
                self.output.pause(handle);
                self.set_state(handle, PlaybackState::Stopped);
                tracing::debug!(session = %handle, "Playback paused");
            }
            PlaybackState::Pending => self.set_state(handle, PlaybackState::Stopped),
            PlaybackState::Stopped => {}
        }
        Ok(())
    }

    /// Play/pause button semantics.
    pub fn toggle(
        &mut self,
        handle: SessionHandle,
        now: Instant,
    ) -> Result<PlaybackState, PickerError> {
        match self.state(handle) {
            None => Err(PickerError::UnknownSession(handle.id())),
            Some(PlaybackState::Stopped) => self.request_play(handle, now),
            Some(_) => {
                self.request_pause(handle)?;
                Ok(PlaybackState::Stopped)
            }
        }
    }

    /// The output finished playing on its own. Returns whether the session
    /// changed state.
    pub fn on_natural_end(&mut self, handle: SessionHandle) -> bool {
        match self.sessions.get_mut(&handle) {
            Some(session) if session.state == PlaybackState::Playing => {
                session.state = PlaybackState::Stopped;
                tracing::debug!(session = %handle, "Playback ended");
                true
            }
            _ => false,
        }
    }

    /// The output reports a pause. Either confirms a stop-all we issued, or
    /// reflects a pause we did not ask for; neither triggers another stop-all.
    pub fn on_external_pause(&mut self, handle: SessionHandle) -> bool {
        let Some(session) = self.sessions.get_mut(&handle) else {
            return false;
        };

        let acknowledged = session.awaiting_ack.take().is_some();
        if acknowledged {
            tracing::debug!(session = %handle, "Stop acknowledged");
        }
        let paused = session.state == PlaybackState::Playing;
        if paused {
            session.state = PlaybackState::Stopped;
            tracing::debug!(session = %handle, "Playback paused externally");
        }

        self.promote_pending();
        acknowledged || paused
    }

    /// Expire overdue acknowledgements and start any pending session that
    /// can now play. Returns the session that started, if one did.
    pub fn poll(&mut self, now: Instant) -> Option<SessionHandle> {
        self.expire_acks(now);
        self.promote_pending()
    }

    fn expire_acks(&mut self, now: Instant) {
        for (handle, session) in self.sessions.iter_mut() {
            if session.awaiting_ack.is_some_and(|deadline| deadline <= now) {
                tracing::debug!(session = %handle, "Stop acknowledgement timed out");
                session.awaiting_ack = None;
            }
        }
    }

    fn stop_all_except(&mut self, keep: SessionHandle, now: Instant) {
        let deadline = now + self.ack_timeout;
        for (handle, session) in self.sessions.iter_mut() {
            if *handle == keep {
                continue;
            }
            match session.state {
                PlaybackState::Playing => {
                    self.output.pause(*handle);
                    session.state = PlaybackState::Stopped;
                    session.awaiting_ack = Some(deadline);
                }
                PlaybackState::Pending => session.state = PlaybackState::Stopped,
                PlaybackState::Stopped => {}
            }
        }
    }

    fn acks_outstanding(&self) -> bool {
        self.sessions.values().any(|s| s.awaiting_ack.is_some())
    }

    fn promote_pending(&mut self) -> Option<SessionHandle> {
        if self.acks_outstanding() {
            return None;
        }
        let handle = self
            .sessions
            .iter()
            .find(|(_, s)| s.state == PlaybackState::Pending)
            .map(|(h, _)| *h)?;
        self.start(handle);
        Some(handle)
    }

    fn start(&mut self, handle: SessionHandle) {
        if let Some(session) = self.sessions.get_mut(&handle) {
            self.output.play(handle, &session.src);
            session.state = PlaybackState::Playing;
            session.awaiting_ack = None;
            tracing::info!(session = %handle, src = %session.src, "Playback started");
        }
    }

    fn set_state(&mut self, handle: SessionHandle, state: PlaybackState) {
        if let Some(session) = self.sessions.get_mut(&handle) {
            session.state = state;
        }
    }
}

/// A command issued to an [`AudioOutput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCommand {
    Play(SessionHandle, AudioRef),
    Pause(SessionHandle),
}

/// Output that only records what it was asked to do, for front ends with
/// no audio device of their own.
#[derive(Debug, Clone, Default)]
pub struct RecordingOutput {
    log: Rc<RefCell<Vec<AudioCommand>>>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands issued since the last drain, oldest first.
    pub fn drain(&self) -> Vec<AudioCommand> {
        self.log.borrow_mut().drain(..).collect()
    }

    pub fn commands(&self) -> Vec<AudioCommand> {
        self.log.borrow().clone()
    }
}

impl AudioOutput for RecordingOutput {
    fn play(&mut self, handle: SessionHandle, src: &AudioRef) {
        self.log
            .borrow_mut()
            .push(AudioCommand::Play(handle, src.clone()));
    }

    fn pause(&mut self, handle: SessionHandle) {
        self.log.borrow_mut().push(AudioCommand::Pause(handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACK: Duration = Duration::from_millis(250);

    fn coordinator() -> (PlaybackCoordinator, RecordingOutput) {
        let output = RecordingOutput::default();
        (
            PlaybackCoordinator::new(Box::new(output.clone()), ACK),
            output,
        )
    }

    fn playing_count(c: &PlaybackCoordinator) -> usize {
        c.sessions
            .values()
            .filter(|s| s.state == PlaybackState::Playing)
            .count()
    }

    #[test]
    fn test_first_play_starts_immediately() {
        let (mut c, output) = coordinator();
        let a = c.register(AudioRef::new("a.mp3"));
        let now = Instant::now();

        assert_eq!(c.request_play(a, now).unwrap(), PlaybackState::Playing);
        assert_eq!(
            output.commands(),
            vec![AudioCommand::Play(a, AudioRef::new("a.mp3"))]
        );
    }

    #[test]
    fn test_play_b_stops_a_before_b_plays() {
        let (mut c, output) = coordinator();
        let a = c.register(AudioRef::new("a.mp3"));
        let b = c.register(AudioRef::new("b.mp3"));
        let now = Instant::now();

        c.request_play(a, now).unwrap();
        let state = c.request_play(b, now).unwrap();

        assert_eq!(state, PlaybackState::Pending);
        assert_eq!(c.state(a), Some(PlaybackState::Stopped));
        assert_eq!(playing_count(&c), 0);

        assert!(c.on_external_pause(a));
        assert_eq!(c.state(b), Some(PlaybackState::Playing));
        assert_eq!(c.state(a), Some(PlaybackState::Stopped));
        assert_eq!(
            output.commands(),
            vec![
                AudioCommand::Play(a, AudioRef::new("a.mp3")),
                AudioCommand::Pause(a),
                AudioCommand::Play(b, AudioRef::new("b.mp3")),
            ]
        );

        assert!(c.on_natural_end(b));
        assert_eq!(c.state(a), Some(PlaybackState::Stopped));
        assert_eq!(c.state(b), Some(PlaybackState::Stopped));
    }

    #[test]
    fn test_pending_promoted_after_ack_timeout() {
        let (mut c, _output) = coordinator();
        let a = c.register(AudioRef::new("a.mp3"));
        let b = c.register(AudioRef::new("b.mp3"));
        let now = Instant::now();

        c.request_play(a, now).unwrap();
        c.request_play(b, now).unwrap();
        assert_eq!(c.next_deadline(), Some(now + ACK));

        assert_eq!(c.poll(now + Duration::from_millis(100)), None);
        assert_eq!(c.state(b), Some(PlaybackState::Pending));

        assert_eq!(c.poll(now + ACK), Some(b));
        assert!(c.is_playing(b));
        assert_eq!(c.next_deadline(), None);
    }

    #[test]
    fn test_at_most_one_playing_under_any_sequence() {
        let (mut c, _output) = coordinator();
        let handles: Vec<SessionHandle> = (0..5)
            .map(|i| c.register(AudioRef::new(format!("{i}.mp3"))))
            .collect();
        let start = Instant::now();

        for step in 0..60u64 {
            let now = start + Duration::from_millis(step * 40);
            let handle = handles[(step as usize * 7 + 3) % handles.len()];
            match step % 4 {
                0 | 1 => {
                    c.request_play(handle, now).unwrap();
                }
                2 => {
                    c.on_external_pause(handles[step as usize % handles.len()]);
                }
                _ => {
                    c.poll(now);
                }
            }
            assert!(playing_count(&c) <= 1, "step {step}");
        }
    }

    #[test]
    fn test_toggle_playing_stops() {
        let (mut c, _output) = coordinator();
        let a = c.register(AudioRef::new("a.mp3"));
        let now = Instant::now();

        assert_eq!(c.toggle(a, now).unwrap(), PlaybackState::Playing);
        assert_eq!(c.toggle(a, now).unwrap(), PlaybackState::Stopped);
        assert_eq!(c.state(a), Some(PlaybackState::Stopped));
        // The output's own pause report for a coordinator pause is a no-op.
        assert!(!c.on_external_pause(a));
        assert_eq!(c.toggle(a, now).unwrap(), PlaybackState::Playing);
    }

    #[test]
    fn test_external_pause_does_not_stop_others() {
        let (mut c, output) = coordinator();
        let a = c.register(AudioRef::new("a.mp3"));
        let _b = c.register(AudioRef::new("b.mp3"));
        c.request_play(a, Instant::now()).unwrap();

        assert!(c.on_external_pause(a));
        assert_eq!(c.state(a), Some(PlaybackState::Stopped));
        assert_eq!(output.commands().len(), 1);
    }

    #[test]
    fn test_natural_end_fires_once() {
        let (mut c, _output) = coordinator();
        let a = c.register(AudioRef::new("a.mp3"));
        c.request_play(a, Instant::now()).unwrap();

        assert!(c.on_natural_end(a));
        assert!(!c.on_natural_end(a));
        assert_eq!(c.state(a), Some(PlaybackState::Stopped));
    }

    #[test]
    fn test_switching_back_waits_for_ack() {
        let (mut c, _output) = coordinator();
        let a = c.register(AudioRef::new("a.mp3"));
        let b = c.register(AudioRef::new("b.mp3"));
        let now = Instant::now();

        c.request_play(a, now).unwrap();
        c.request_play(b, now).unwrap();
        c.on_external_pause(a);
        assert!(c.is_playing(b));

        assert_eq!(c.request_play(a, now).unwrap(), PlaybackState::Pending);
        assert!(!c.is_playing(b));
        c.on_external_pause(b);
        assert!(c.is_playing(a));
    }

    #[test]
    fn test_unregister_playing_session_pauses_it() {
        let (mut c, output) = coordinator();
        let a = c.register(AudioRef::new("a.mp3"));
        c.request_play(a, Instant::now()).unwrap();

        c.unregister(a).unwrap();
        assert_eq!(c.state(a), None);
        assert_eq!(output.commands().last(), Some(&AudioCommand::Pause(a)));
        assert!(matches!(
            c.unregister(a),
            Err(PickerError::UnknownSession(_))
        ));
    }

    #[test]
    fn test_toggle_pending_cancels_play() {
        let (mut c, output) = coordinator();
        let a = c.register(AudioRef::new("a.mp3"));
        let b = c.register(AudioRef::new("b.mp3"));
        let now = Instant::now();

        c.request_play(a, now).unwrap();
        assert_eq!(c.request_play(b, now).unwrap(), PlaybackState::Pending);
        assert_eq!(c.toggle(b, now).unwrap(), PlaybackState::Stopped);

        assert!(c.on_external_pause(a));
        assert_eq!(c.state(b), Some(PlaybackState::Stopped));
        assert_eq!(c.poll(now + ACK), None);
        assert_eq!(playing_count(&c), 0);
        assert!(!output
            .commands()
            .contains(&AudioCommand::Play(b, AudioRef::new("b.mp3"))));
    }

    #[test]
    fn test_play_after_expired_ack_without_poll() {
        let (mut c, _output) = coordinator();
        let a = c.register(AudioRef::new("a.mp3"));
        let b = c.register(AudioRef::new("b.mp3"));
        let now = Instant::now();

        c.request_play(a, now).unwrap();
        c.request_play(b, now).unwrap();
        let later = now + Duration::from_millis(300);

        assert_eq!(c.request_play(a, later).unwrap(), PlaybackState::Playing);
        assert_eq!(c.state(b), Some(PlaybackState::Stopped));
        assert_eq!(c.next_deadline(), None);

        assert!(c.on_external_pause(a));
        assert_eq!(c.state(a), Some(PlaybackState::Stopped));
        assert_eq!(playing_count(&c), 0);
    }

    #[test]
    fn test_external_pause_while_playing_with_own_ack() {
        let (mut c, _output) = coordinator();
        let a = c.register(AudioRef::new("a.mp3"));
        c.sessions.get_mut(&a).unwrap().state = PlaybackState::Playing;
        c.sessions.get_mut(&a).unwrap().awaiting_ack = Some(Instant::now() + ACK);

        assert!(c.on_external_pause(a));
        assert_eq!(c.state(a), Some(PlaybackState::Stopped));
        assert_eq!(c.next_deadline(), None);
    }

    #[test]
    fn test_clear_pauses_playing_and_drops_all() {
        let (mut c, output) = coordinator();
        let a = c.register(AudioRef::new("a.mp3"));
        let b = c.register(AudioRef::new("b.mp3"));
        c.request_play(a, Instant::now()).unwrap();

        c.clear();
        assert_eq!(c.session_count(), 0);
        assert_eq!(c.state(b), None);
        assert_eq!(output.commands().last(), Some(&AudioCommand::Pause(a)));
    }

    #[test]
    fn test_unknown_session() {
        let (mut c, _output) = coordinator();
        let ghost = SessionHandle(99);
        assert!(c.request_play(ghost, Instant::now()).is_err());
        assert!(c.request_pause(ghost).is_err());
        assert!(!c.on_natural_end(ghost));
        assert!(!c.on_external_pause(ghost));
    }
}
