//! Everything a listening session shares between the audio callback and the
//! control loop.

use log::debug;

use crate::audio::crossfade::CrossfadeWindow;
use crate::config::{milliseconds_to_frames, PlaybackConfig};
use crate::player::Player;
use crate::track_store::TrackStore;

/// Immutable tracks and fade window plus the atomically updated player state.
///
/// Built once after loading and shared behind an `Arc`.
#[derive(Debug)]
pub struct Session {
    tracks: TrackStore,
    player: Player,
    window: CrossfadeWindow,
    block_frames: usize,
    step_frames: usize,
}

impl Session {
    pub fn new(tracks: TrackStore, playback: &PlaybackConfig) -> Self {
        let sample_rate = tracks.sample_rate();
        let channels = tracks.channels();
        let fade_frames = milliseconds_to_frames(playback.fade_ms, sample_rate).max(1);
        let step_frames = milliseconds_to_frames(playback.loop_step_ms, sample_rate).max(1);
        let player = Player::new(tracks.reference_length(), channels, sample_rate);
        let window = CrossfadeWindow::generate(fade_frames, channels);
        debug!(
            "Session: fade window {} frames x {} channels, nudge step {} frames",
            window.frames(),
            window.channels(),
            step_frames
        );

        Self {
            window,
            tracks,
            player,
            // One block per fade window, so every fade completes inside one callback.
            block_frames: fade_frames,
            step_frames,
        }
    }

    pub fn tracks(&self) -> &TrackStore {
        &self.tracks
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn window(&self) -> &CrossfadeWindow {
        &self.window
    }

    /// Frames per audio callback requested from the output device.
    pub fn block_frames(&self) -> usize {
        self.block_frames
    }

    /// Loop nudge quantum in frames.
    pub fn step_frames(&self) -> usize {
        self.step_frames
    }
}

#[cfg(test)]
mod tests {
    use super::Session;
    use crate::config::PlaybackConfig;
    use crate::track_store::{tests::decoded, TrackStore};

    #[test]
    fn test_session_derives_frame_counts_from_rate() {
        let store = TrackStore::from_decoded(vec![decoded("a.wav", 2, 48_000, 4_800)], 20)
            .expect("store should build");
        let session = Session::new(store, &PlaybackConfig::default());

        assert_eq!(session.block_frames(), 960);
        assert_eq!(session.window().frames(), 960);
        assert_eq!(session.window().coefficients().len(), 1_920);
        assert_eq!(session.step_frames(), 2_400);
        assert_eq!(session.player().length(), 4_800);
        assert_eq!(session.player().loop_region().end, 4_800);
        assert_eq!(session.player().channels(), 2);
    }
}
