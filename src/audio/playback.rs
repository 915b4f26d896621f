//! Speech playback controller
//!
//! Owns the single active clip. Starting a new clip always stops the previous
//! one first; pressing the button bound to the active clip stops it without
//! starting anything. Audio comes from the [`AudioCache`] when possible and
//! from the tutor's text-to-speech action otherwise.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;
use tokio::sync::oneshot;

use super::cache::{AudioCache, cache_key};
use super::output::{AudioOutput, Clip};
use crate::gateway::{Action, ApiGateway, response_audio};
use crate::schema::ScriptLine;
use crate::view::{ControlId, View};
use crate::{Error, Result};

/// Default pause between lines of a script
pub const DEFAULT_LINE_GAP: Duration = Duration::from_millis(300);

/// Controls currently marked as playing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub button: Option<ControlId>,
    pub line: Option<ControlId>,
}

impl PlaybackState {
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.button.is_none() && self.line.is_none()
    }
}

/// The request currently owning playback
struct Active {
    id: u64,
    button: Option<ControlId>,
    clip: Option<Arc<dyn Clip>>,
    stopped: oneshot::Sender<()>,
}

impl Active {
    /// Pause the clip and wake the request that owns it
    fn stop(self) {
        if let Some(clip) = &self.clip {
            clip.pause();
        }
        let _ = self.stopped.send(());
    }
}

/// Plays text as speech, one clip at a time
pub struct PlaybackController {
    gateway: ApiGateway,
    cache: AudioCache,
    output: Arc<dyn AudioOutput>,
    view: Arc<dyn View>,
    active: Mutex<Option<Active>>,
    state: Mutex<PlaybackState>,
    next_id: AtomicU64,
    script_running: AtomicBool,
    line_gap: Duration,
}

impl PlaybackController {
    #[must_use]
    pub fn new(
        gateway: ApiGateway,
        cache: AudioCache,
        output: Arc<dyn AudioOutput>,
        view: Arc<dyn View>,
    ) -> Self {
        Self {
            gateway,
            cache,
            output,
            view,
            active: Mutex::new(None),
            state: Mutex::new(PlaybackState::default()),
            next_id: AtomicU64::new(1),
            script_running: AtomicBool::new(false),
            line_gap: DEFAULT_LINE_GAP,
        }
    }

    /// Override the pause between script lines
    #[must_use]
    pub const fn with_line_gap(mut self, gap: Duration) -> Self {
        self.line_gap = gap;
        self
    }

    /// Audio cache backing this controller
    #[must_use]
    pub const fn cache(&self) -> &AudioCache {
        &self.cache
    }

    /// Controls currently marked as playing
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        lock(&self.state).clone()
    }

    /// Whether a clip is active or being fetched
    #[must_use]
    pub fn is_playing(&self) -> bool {
        lock(&self.active).is_some()
    }

    /// Whether a script is being played end to end
    #[must_use]
    pub fn is_script_running(&self) -> bool {
        self.script_running.load(Ordering::SeqCst)
    }

    /// Speak `text`
    ///
    /// Resolves when the clip ends. When `button` is the button already bound
    /// to the active clip, the clip is stopped and this returns `Ok` at once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PlaybackStopped`] if a newer request or [`Self::stop`]
    /// interrupts this one; any other error has already been shown to the user
    pub async fn play_tts(
        &self,
        text: &str,
        button: Option<&ControlId>,
        line: Option<&ControlId>,
        speaker: Option<&str>,
    ) -> Result<()> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (stopped_tx, mut stopped_rx) = oneshot::channel();

        {
            let mut active = lock(&self.active);
            if let Some(previous) = active.take() {
                let same_button = button.is_some() && previous.button.as_ref() == button;
                tracing::debug!(previous = previous.id, same_button, "stopping active clip");
                previous.stop();

                if same_button {
                    drop(active);
                    self.set_state(PlaybackState::default());
                    return Ok(());
                }
            }

            *active = Some(Active {
                id,
                button: button.cloned(),
                clip: None,
                stopped: stopped_tx,
            });
        }

        self.set_state(PlaybackState {
            button: button.cloned(),
            line: line.cloned(),
        });

        let result = tokio::select! {
            r = self.fetch_and_play(id, text, speaker) => r,
            _ = &mut stopped_rx => Err(Error::PlaybackStopped),
        };

        let still_owner = {
            let mut active = lock(&self.active);
            if active.as_ref().is_some_and(|a| a.id == id) {
                *active = None;
                true
            } else {
                false
            }
        };
        if still_owner {
            self.set_state(PlaybackState::default());
        }

        match &result {
            Ok(()) => tracing::debug!(id, "clip finished"),
            Err(e) if e.is_stopped() => tracing::debug!(id, "clip stopped"),
            Err(e) => {
                tracing::error!(id, error = %e, "speech playback failed");
                self.view.alert(&e.user_message());
            }
        }

        result
    }

    /// Stop the active clip and any running script
    pub fn stop(&self) {
        self.script_running.store(false, Ordering::SeqCst);
        let previous = lock(&self.active).take();
        if let Some(previous) = previous {
            tracing::debug!(id = previous.id, "playback stopped");
            previous.stop();
        }
        self.set_state(PlaybackState::default());
    }

    /// Play script lines in order with a pause between them
    ///
    /// Pressing the same control while a script is running stops it. A stop
    /// ends the loop quietly; other errors end it and are returned.
    ///
    /// # Errors
    ///
    /// Returns the first playback failure other than a stop
    pub async fn play_script(&self, control: &ControlId, lines: &[ScriptLine]) -> Result<()> {
        if self.script_running.swap(true, Ordering::SeqCst) {
            tracing::debug!(%control, "script toggle: stopping");
            self.stop();
            return Ok(());
        }

        self.view.render_script(control, true);
        tracing::info!(%control, lines = lines.len(), "playing script");

        let mut outcome = Ok(());
        for (index, line) in lines.iter().enumerate() {
            if !self.script_running.load(Ordering::SeqCst) {
                tracing::debug!(%control, index, "script aborted");
                break;
            }

            let line_id = ControlId::line(control, index);
            match self
                .play_tts(&line.text, None, Some(&line_id), Some(&line.speaker))
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_stopped() => break,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }

            if index + 1 < lines.len() {
                tokio::time::sleep(self.line_gap).await;
            }
        }

        self.script_running.store(false, Ordering::SeqCst);
        self.view.render_script(control, false);
        outcome
    }

    async fn fetch_and_play(&self, id: u64, text: &str, speaker: Option<&str>) -> Result<()> {
        let key = cache_key(speaker, text);
        let encoded = match self.cache.lookup(&key) {
            Some((audio, tier)) => {
                tracing::debug!(key, ?tier, "speaking from cache");
                audio
            }
            None => {
                let audio = self.synthesize(text, speaker).await?;
                self.cache.insert(&key, &audio);
                audio
            }
        };

        let bytes = BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| Error::Playback(format!("invalid audio encoding: {e}")))?;

        let clip = {
            let mut active = lock(&self.active);
            let Some(owner) = active.as_mut().filter(|a| a.id == id) else {
                return Err(Error::PlaybackStopped);
            };
            let clip = self.output.play(&bytes)?;
            owner.clip = Some(Arc::clone(&clip));
            clip
        };

        clip.finished().await
    }

    async fn synthesize(&self, text: &str, speaker: Option<&str>) -> Result<String> {
        let payload = json!({ "text": text, "speaker": speaker });
        let response = self.gateway.call(Action::TextToSpeech, payload).await?;
        response_audio(&response)
            .ok_or_else(|| Error::Parse("text-to-speech reply has no audio".to_string()))
    }

    fn set_state(&self, next: PlaybackState) {
        let mut state = lock(&self.state);
        if *state != next {
            *state = next;
            self.view.render_playback(&state);
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
