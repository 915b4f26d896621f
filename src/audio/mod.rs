//! Speech audio: caching, output and playback control

mod cache;
mod output;
mod playback;

pub use cache::{AudioCache, CacheTier, DEFAULT_MEMORY_CAPACITY, DEFAULT_SPEAKER, cache_key};
pub use output::{AudioOutput, Clip, Decoded, PCM_SAMPLE_RATE, SpeakerOutput, decode};
pub use playback::{DEFAULT_LINE_GAP, PlaybackController, PlaybackState};
