//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use hanzi_deck::audio::{AudioCache, AudioOutput, Clip, PlaybackController, PlaybackState};
use hanzi_deck::db::{self, AudioStore};
use hanzi_deck::gateway::{ApiGateway, Transport, TransportResponse};
use hanzi_deck::speech::{RecognitionEvent, Recognizer};
use hanzi_deck::{ControlId, DbPool, Error, FieldId, PatternSet, Result, Tutor, View};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Scripted answer of the mock transport
#[derive(Debug, Clone)]
pub enum Reply {
    /// HTTP answer with a status and body
    Status(u16, String),
    /// Never answers
    Pending,
    /// Connection failure
    NetworkError,
}

/// Transport that replays scripted answers and records requests
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Option<Reply>,
    bodies: Mutex<Vec<Value>>,
    calls: AtomicUsize,
}

impl MockTransport {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Answer used once the script runs out
    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }

    pub fn last_body(&self) -> Value {
        self.bodies().last().cloned().expect("no request sent")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(&self, body: &Value) -> Result<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies.lock().unwrap().push(body.clone());

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone());

        match reply {
            Some(Reply::Status(status, body)) => Ok(TransportResponse { status, body }),
            Some(Reply::Pending) => std::future::pending().await,
            Some(Reply::NetworkError) => Err(Error::Network("connection reset".to_string())),
            None => Err(Error::Network("no scripted reply".to_string())),
        }
    }
}

/// Successful reply carrying generated text
pub fn text_reply(text: &str) -> Reply {
    let body = json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    });
    Reply::Status(200, body.to_string())
}

/// Successful reply carrying audio bytes
pub fn tts_reply(audio: &[u8]) -> Reply {
    let body = json!({
        "candidates": [{
            "content": { "parts": [{ "inlineData": { "mimeType": "audio/pcm", "data": BASE64.encode(audio) } }] }
        }]
    });
    Reply::Status(200, body.to_string())
}

/// Failure reply with a JSON error message
pub fn error_reply(status: u16, message: &str) -> Reply {
    Reply::Status(status, json!({ "error": message }).to_string())
}

/// Audio output that records plays and pauses
///
/// Clips are numbered from 1 in the order they start.
pub struct RecordingOutput {
    events: Arc<Mutex<Vec<String>>>,
    started: AtomicUsize,
    clip_length: Option<Duration>,
    fail: bool,
}

impl RecordingOutput {
    /// Clips that end on their own after `length`
    pub fn finishing(length: Duration) -> Self {
        Self {
            events: Arc::default(),
            started: AtomicUsize::new(0),
            clip_length: Some(length),
            fail: false,
        }
    }

    /// Clips that only end when paused
    pub fn endless() -> Self {
        Self {
            clip_length: None,
            ..Self::finishing(Duration::ZERO)
        }
    }

    /// Device that cannot play anything
    pub fn broken() -> Self {
        Self {
            fail: true,
            ..Self::finishing(Duration::ZERO)
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl AudioOutput for RecordingOutput {
    fn play(&self, _audio: &[u8]) -> Result<Arc<dyn Clip>> {
        if self.fail {
            return Err(Error::Playback("device unavailable".to_string()));
        }

        let n = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.lock().unwrap().push(format!("play:{n}"));
        Ok(Arc::new(RecordingClip {
            n,
            events: Arc::clone(&self.events),
            length: self.clip_length,
        }))
    }
}

struct RecordingClip {
    n: usize,
    events: Arc<Mutex<Vec<String>>>,
    length: Option<Duration>,
}

#[async_trait]
impl Clip for RecordingClip {
    fn pause(&self) {
        self.events.lock().unwrap().push(format!("pause:{}", self.n));
    }

    async fn finished(&self) -> Result<()> {
        match self.length {
            Some(length) => {
                tokio::time::sleep(length).await;
                Ok(())
            }
            None => std::future::pending().await,
        }
    }
}

/// View that records every projection as a string
#[derive(Default)]
pub struct RecordingView {
    events: Mutex<Vec<String>>,
}

impl RecordingView {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("alert:").map(ToString::to_string))
            .collect()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl View for RecordingView {
    fn render_playback(&self, state: &PlaybackState) {
        let id = |c: &Option<ControlId>| c.as_ref().map_or("-".to_string(), ToString::to_string);
        self.push(format!("playback:{}:{}", id(&state.button), id(&state.line)));
    }

    fn render_script(&self, control: &ControlId, running: bool) {
        self.push(format!("script:{control}:{running}"));
    }

    fn render_listening(&self, active: Option<&ControlId>) {
        self.push(format!(
            "listening:{}",
            active.map_or("-".to_string(), ToString::to_string)
        ));
    }

    fn fill_field(&self, field: &FieldId, text: &str) {
        self.push(format!("fill:{field:?}:{text}"));
    }

    fn submit_field(&self, field: &FieldId) {
        self.push(format!("submit:{field:?}"));
    }

    fn alert(&self, message: &str) {
        self.push(format!("alert:{message}"));
    }
}

/// Recognition engine that replays one scripted event list per session
///
/// A session whose script does not end with [`RecognitionEvent::End`] stays
/// open until `stop` is called.
#[derive(Default)]
pub struct MockRecognizer {
    sessions: Mutex<VecDeque<Vec<RecognitionEvent>>>,
    open: Mutex<Option<mpsc::UnboundedSender<RecognitionEvent>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl MockRecognizer {
    pub fn new(sessions: impl IntoIterator<Item = Vec<RecognitionEvent>>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Recognizer for MockRecognizer {
    fn start(&self, events: mpsc::UnboundedSender<RecognitionEvent>) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let script = self.sessions.lock().unwrap().pop_front().unwrap_or_default();
        let ends = script.last() == Some(&RecognitionEvent::End);
        for event in script {
            let _ = events.send(event);
        }
        if !ends {
            *self.open.lock().unwrap() = Some(events);
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(tx) = self.open.lock().unwrap().take() {
            let _ = tx.send(RecognitionEvent::End);
        }
    }
}

/// Gateway over a mock transport
pub fn gateway(transport: &Arc<MockTransport>) -> ApiGateway {
    ApiGateway::new(Arc::clone(transport) as Arc<dyn Transport>)
}

/// Audio cache over a database
pub fn audio_cache(pool: &DbPool) -> AudioCache {
    AudioCache::new(
        AudioStore::new(pool.clone()),
        NonZeroUsize::new(16).expect("non-zero"),
    )
}

/// Playback controller wired to test doubles
pub fn playback(
    transport: &Arc<MockTransport>,
    pool: &DbPool,
    output: &Arc<RecordingOutput>,
    view: &Arc<RecordingView>,
) -> Arc<PlaybackController> {
    Arc::new(PlaybackController::new(
        gateway(transport),
        audio_cache(pool),
        Arc::clone(output) as Arc<dyn AudioOutput>,
        Arc::clone(view) as Arc<dyn View>,
    ))
}

/// Tutor over a fresh database and the given transport
pub fn tutor(transport: &Arc<MockTransport>, pool: &DbPool) -> Tutor {
    let output = Arc::new(RecordingOutput::finishing(Duration::from_millis(100)));
    let view = Arc::new(RecordingView::default());
    Tutor::new(
        gateway(transport),
        PatternSet::bundled().expect("bundled patterns"),
        pool.clone(),
        playback(transport, pool, &output, &view),
    )
    .expect("failed to create tutor")
}

/// Poll `done` until it holds, letting paused time advance in between
pub async fn wait_until(done: impl Fn() -> bool) {
    for _ in 0..1000 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
