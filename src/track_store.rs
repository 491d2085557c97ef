//! Decoded, zero-padded PCM buffers for every track in the session.

use std::path::PathBuf;

use log::{debug, info, warn};

use crate::audio::audio_decoder::{DecodedAudio, TrackDecoder};
use crate::config::milliseconds_to_frames;
use crate::error::{AppError, AppResult};
use crate::shuffle::Shuffler;

/// One rendition of the passage under test.
#[derive(Debug, Clone)]
pub struct Track {
    name: String,
    /// Interleaved, frame-major samples including trailing silence.
    pcm: Vec<f32>,
    channels: usize,
    sample_rate: u32,
    source_frames: usize,
}

impl Track {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pcm(&self) -> &[f32] {
        &self.pcm
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames in the buffer, padding included.
    pub fn frames(&self) -> usize {
        self.pcm.len() / self.channels
    }

    /// Frames produced by the decoder, before padding.
    pub fn source_frames(&self) -> usize {
        self.source_frames
    }
}

/// All tracks of a session. Channel count and sample rate are uniform.
///
/// The first admitted track is the reference: it fixes the session length,
/// channel count, and sample rate. Every buffer is padded with silence to at
/// least `reference_length + padding_frames` frames, so a read of one fade
/// window starting anywhere inside the reference length stays in bounds.
#[derive(Debug, Clone, Default)]
pub struct TrackStore {
    tracks: Vec<Track>,
    reference_length: usize,
    channels: usize,
    sample_rate: u32,
    padding_frames: usize,
}

impl TrackStore {
    /// Decodes `paths` in order and admits each result.
    pub fn load<D: TrackDecoder>(
        paths: &[PathBuf],
        decoder: &D,
        fade_ms: u32,
    ) -> AppResult<Self> {
        if paths.is_empty() {
            return Err(AppError::Configuration("no input files".to_string()));
        }
        let mut store = Self::default();
        for path in paths {
            info!("Loading {}", path.display());
            let decoded = decoder.decode(path)?;
            store.admit(decoded, fade_ms)?;
        }
        Ok(store)
    }

    /// Builds a store from already decoded buffers.
    pub fn from_decoded(decoded: Vec<DecodedAudio>, fade_ms: u32) -> AppResult<Self> {
        if decoded.is_empty() {
            return Err(AppError::Configuration("no input files".to_string()));
        }
        let mut store = Self::default();
        for track in decoded {
            store.admit(track, fade_ms)?;
        }
        Ok(store)
    }

    fn admit(&mut self, decoded: DecodedAudio, fade_ms: u32) -> AppResult<()> {
        let DecodedAudio {
            name,
            channels,
            sample_rate,
            duration_secs,
            samples,
        } = decoded;
        let channels = usize::from(channels);
        if channels == 0 || sample_rate == 0 {
            return Err(AppError::format(name, "invalid audio file"));
        }
        let source_frames = samples.len() / channels;

        if self.tracks.is_empty() {
            self.reference_length = source_frames;
            self.channels = channels;
            self.sample_rate = sample_rate;
            self.padding_frames = milliseconds_to_frames(fade_ms, sample_rate).max(1);
            debug!(
                "TrackStore: reference length={} channels={} rate={} padding={}",
                source_frames, channels, sample_rate, self.padding_frames
            );
        } else {
            if channels != self.channels {
                return Err(AppError::format(
                    name,
                    format!(
                        "channel mismatch, got {}, expected {}",
                        channels, self.channels
                    ),
                ));
            }
            if sample_rate != self.sample_rate {
                return Err(AppError::format(
                    name,
                    format!(
                        "samplerate mismatch, got {}, expected {}",
                        sample_rate, self.sample_rate
                    ),
                ));
            }
            if source_frames != self.reference_length {
                warn!(
                    "{}: length mismatch, got {}, expected {}",
                    name, source_frames, self.reference_length
                );
            }
        }

        let padded_frames = source_frames.max(self.reference_length) + self.padding_frames;
        let mut pcm = samples;
        // Drop a trailing partial frame so the buffer stays frame-aligned.
        pcm.truncate(source_frames * channels);
        pcm.reserve_exact(padded_frames * channels - pcm.len());
        pcm.resize(padded_frames * channels, 0.0);
        debug!(
            "TrackStore: admitted {} ({:.2}s, {} frames, buffer {} frames)",
            name, duration_secs, source_frames, padded_frames
        );

        self.tracks.push(Track {
            name,
            pcm,
            channels,
            sample_rate,
            source_frames,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Length of the reference track in frames, without padding.
    pub fn reference_length(&self) -> usize {
        self.reference_length
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn padding_frames(&self) -> usize {
        self.padding_frames
    }

    /// Randomizes track order for a blind test, optionally keeping track 0 in place.
    pub fn shuffle(&mut self, shuffler: &mut Shuffler, keep_reference: bool) {
        shuffler.shuffle(&mut self.tracks, keep_reference);
    }
}
