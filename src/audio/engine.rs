//! Real-time sample production for the output stream.
//!
//! [`PlaybackEngine::render`] runs on the audio thread once per callback. It never
//! blocks, allocates, logs, or fails: missing source material is rendered as
//! silence and every state change goes through the player's atomics.

use std::sync::Arc;

use crate::session::Session;

pub struct PlaybackEngine {
    session: Arc<Session>,
}

impl PlaybackEngine {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Fills `output` with interleaved frames and advances the play position.
    ///
    /// Order of operations per call:
    /// 1. paused: silence, position unchanged
    /// 2. copy from the current track at `pos`
    /// 3. armed switch: cross-fade to the next track at the same `pos`, commit it
    /// 4. `pos += frames`
    /// 5. `pos > end`: cross-fade to the current track at `start`, `pos = start + frames`
    ///
    /// Steps 3 and 5 may both fire; the wrap fade is then applied on top of the
    /// switch fade's result.
    pub fn render(&mut self, output: &mut [f32]) {
        let session = &*self.session;
        let player = session.player();
        if player.is_paused() {
            output.fill(0.0);
            return;
        }

        let channels = player.channels();
        let frames = output.len() / channels;
        let window = session.window();
        let pos = player.position();
        let mut current = player.current_track();

        copy_frames(output, self.source(current, pos));

        let next = player.next_track();
        if next != current && next < session.tracks().len() {
            window.crossfade_into(output, self.source(next, pos));
            player.commit_switch(next);
            current = next;
        }

        let region = player.loop_region();
        let mut pos = pos + frames;
        if pos > region.end {
            window.crossfade_into(output, self.source(current, region.start));
            pos = region.start + frames;
        }
        player.set_position(pos);
    }

    /// Interleaved samples of `track` from frame `frame` to the end of its buffer.
    fn source(&self, track: usize, frame: usize) -> &[f32] {
        let Some(track) = self.session.tracks().get(track) else {
            return &[];
        };
        let pcm = track.pcm();
        let offset = frame.saturating_mul(track.channels()).min(pcm.len());
        &pcm[offset..]
    }
}

fn copy_frames(output: &mut [f32], source: &[f32]) {
    let available = source.len().min(output.len());
    output[..available].copy_from_slice(&source[..available]);
    output[available..].fill(0.0);
}

#[cfg(test)]
mod tests {
    use super::PlaybackEngine;
    use crate::audio::audio_decoder::DecodedAudio;
    use crate::config::PlaybackConfig;
    use crate::session::Session;
    use crate::track_store::TrackStore;
    use std::sync::Arc;

    const RATE: u32 = 1_000;
    const FADE_MS: u32 = 80;
    const BLOCK: usize = 200;

    fn ramp(name: &str, channels: u16, frames: usize, offset: f32) -> DecodedAudio {
        let samples = (0..frames * usize::from(channels))
            .map(|i| offset + i as f32 / 10_000.0)
            .collect();
        DecodedAudio {
            name: name.to_string(),
            channels,
            sample_rate: RATE,
            duration_secs: frames as f64 / f64::from(RATE),
            samples,
        }
    }

    fn session(tracks: Vec<DecodedAudio>) -> Arc<Session> {
        let playback = PlaybackConfig {
            fade_ms: FADE_MS,
            loop_step_ms: 10,
            ..PlaybackConfig::default()
        };
        let store = TrackStore::from_decoded(tracks, FADE_MS).expect("store should build");
        Arc::new(Session::new(store, &playback))
    }

    fn two_mono_tracks() -> Arc<Session> {
        session(vec![
            ramp("a.wav", 1, 1_000, 0.0),
            ramp("b.wav", 1, 1_000, 0.5),
        ])
    }

    fn pcm(session: &Session, track: usize) -> &[f32] {
        session.tracks().get(track).unwrap().pcm()
    }

    fn sample_at(buffer: &[f32], index: usize) -> f32 {
        buffer.get(index).copied().unwrap_or(0.0)
    }

    fn assert_close(actual: f32, expected: f32, context: &str) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "{}: actual={} expected={}",
            context,
            actual,
            expected
        );
    }

    #[test]
    fn test_plain_playback_copies_current_track_and_advances() {
        let session = two_mono_tracks();
        let mut engine = PlaybackEngine::new(session.clone());
        let mut output = vec![0.0; BLOCK];

        engine.render(&mut output);
        assert_eq!(output.as_slice(), &pcm(&session, 0)[..BLOCK]);
        assert_eq!(session.player().position(), BLOCK);

        engine.render(&mut output);
        assert_eq!(output.as_slice(), &pcm(&session, 0)[BLOCK..2 * BLOCK]);
        assert_eq!(session.player().position(), 2 * BLOCK);
    }

    #[test]
    fn test_loop_wraps_once_position_exceeds_end() {
        let session = two_mono_tracks();
        let mut engine = PlaybackEngine::new(session.clone());
        let mut output = vec![0.0; BLOCK];

        for call in 1..=5 {
            engine.render(&mut output);
            assert_eq!(session.player().position(), call * BLOCK);
        }
        assert_eq!(session.player().position(), 1_000);

        // Reading from 1000 hits padding; the wrap fades it into the loop start.
        engine.render(&mut output);
        let window = session.window().coefficients();
        let track = pcm(&session, 0);
        for k in 0..BLOCK {
            let expected = if k < window.len() {
                window[k] * 0.0 + (1.0 - window[k]) * track[k]
            } else {
                track[k]
            };
            assert_close(output[k], expected, &format!("frame {}", k));
        }
        assert_eq!(session.player().position(), BLOCK);
    }

    #[test]
    fn test_wrap_uses_loop_start_and_skips_replayed_frames() {
        let session = two_mono_tracks();
        let player = session.player();
        player.set_position(300);
        player.apply_loop_command(crate::loop_controller::LoopCommand::SetStart, 10);
        player.set_position(500);
        player.apply_loop_command(crate::loop_controller::LoopCommand::SetEnd, 10);
        player.set_position(400);
        let mut engine = PlaybackEngine::new(session.clone());
        let mut output = vec![0.0; BLOCK];

        engine.render(&mut output);

        let window = session.window().coefficients();
        let track = pcm(&session, 0);
        for k in 0..BLOCK {
            let expected = if k < window.len() {
                window[k] * track[400 + k] + (1.0 - window[k]) * track[300 + k]
            } else {
                track[300 + k]
            };
            assert_close(output[k], expected, &format!("frame {}", k));
        }
        assert_eq!(player.position(), 500);
    }

    #[test]
    fn test_pause_outputs_silence_and_resumes_at_same_position() {
        let session = two_mono_tracks();
        let mut engine = PlaybackEngine::new(session.clone());
        let mut output = vec![0.0; BLOCK];
        engine.render(&mut output);

        session.player().toggle_pause();
        for _ in 0..3 {
            output.fill(1.0);
            engine.render(&mut output);
            assert!(output.iter().all(|sample| *sample == 0.0));
            assert_eq!(session.player().position(), BLOCK);
        }

        session.player().toggle_pause();
        engine.render(&mut output);
        assert_eq!(output.as_slice(), &pcm(&session, 0)[BLOCK..2 * BLOCK]);
        assert_eq!(session.player().position(), 2 * BLOCK);
    }

    #[test]
    fn test_armed_switch_crossfades_at_same_position() {
        let session = two_mono_tracks();
        session.player().set_position(400);
        session.player().arm_switch(1);
        let mut engine = PlaybackEngine::new(session.clone());
        let mut output = vec![0.0; BLOCK];

        engine.render(&mut output);

        let window = session.window().coefficients();
        let old = pcm(&session, 0);
        let new = pcm(&session, 1);
        for k in 0..BLOCK {
            let expected = if k < window.len() {
                window[k] * old[400 + k] + (1.0 - window[k]) * new[400 + k]
            } else {
                new[400 + k]
            };
            assert_close(output[k], expected, &format!("frame {}", k));
        }
        assert_eq!(session.player().current_track(), 1);
        assert_eq!(session.player().position(), 600);

        engine.render(&mut output);
        assert_eq!(output.as_slice(), &new[600..800]);
    }

    #[test]
    fn test_switch_to_unloaded_track_is_ignored() {
        let session = two_mono_tracks();
        session.player().arm_switch(5);
        let mut engine = PlaybackEngine::new(session.clone());
        let mut output = vec![0.0; BLOCK];

        engine.render(&mut output);

        assert_eq!(output.as_slice(), &pcm(&session, 0)[..BLOCK]);
        assert_eq!(session.player().current_track(), 0);
    }

    #[test]
    fn test_switch_and_wrap_in_same_call_apply_both_fades_in_order() {
        let session = two_mono_tracks();
        session.player().set_position(900);
        session.player().arm_switch(1);
        let mut engine = PlaybackEngine::new(session.clone());
        let mut output = vec![0.0; BLOCK];

        engine.render(&mut output);

        let window = session.window().coefficients();
        let old = pcm(&session, 0);
        let new = pcm(&session, 1);
        for k in 0..BLOCK {
            let switched = if k < window.len() {
                window[k] * old[900 + k] + (1.0 - window[k]) * new[900 + k]
            } else {
                // The new track's padding ends at frame 1080.
                sample_at(new, 900 + k)
            };
            let expected = if k < window.len() {
                window[k] * switched + (1.0 - window[k]) * new[k]
            } else {
                new[k]
            };
            assert_close(output[k], expected, &format!("frame {}", k));
        }
        assert_eq!(session.player().current_track(), 1);
        assert_eq!(session.player().position(), BLOCK);
    }

    #[test]
    fn test_short_track_never_reads_out_of_bounds_near_loop_end() {
        let session = session(vec![
            ramp("reference.wav", 1, 1_000, 0.0),
            ramp("short.wav", 1, 700, 0.5),
        ]);
        let mut engine = PlaybackEngine::new(session.clone());
        let mut output = vec![0.0; BLOCK];

        for start in [921, 960, 999, 1_000] {
            session.player().set_position(start);
            session.player().arm_switch(1);
            engine.render(&mut output);
            session.player().arm_switch(0);
            engine.render(&mut output);
        }

        session.player().arm_switch(1);
        engine.render(&mut output);
        session.player().set_position(990);
        engine.render(&mut output);
        let short = pcm(&session, 1);
        let window = session.window().coefficients();
        for k in 0..BLOCK {
            let expected = if k < window.len() {
                (1.0 - window[k]) * short[k]
            } else {
                short[k]
            };
            assert_close(output[k], expected, &format!("frame {}", k));
        }
    }

    #[test]
    fn test_callback_longer_than_padding_fills_with_silence() {
        let session = two_mono_tracks();
        session.player().set_position(950);
        let mut engine = PlaybackEngine::new(session.clone());
        let mut output = vec![1.0; 400];

        engine.render(&mut output);

        assert_eq!(output.len(), 400);
        assert_eq!(session.player().position(), 400);
    }

    #[test]
    fn test_shrinking_end_below_position_wraps_on_next_call() {
        let session = two_mono_tracks();
        let mut engine = PlaybackEngine::new(session.clone());
        let mut output = vec![0.0; BLOCK];
        engine.render(&mut output);
        engine.render(&mut output);

        session.player().set_position(400);
        session
            .player()
            .apply_loop_command(crate::loop_controller::LoopCommand::SetEnd, 10);
        session.player().set_position(450);
        engine.render(&mut output);

        assert_eq!(session.player().position(), BLOCK);
    }

    #[test]
    fn test_stereo_frames_stay_interleaved() {
        let session = session(vec![
            ramp("a.wav", 2, 1_000, 0.0),
            ramp("b.wav", 2, 1_000, 0.5),
        ]);
        let mut engine = PlaybackEngine::new(session.clone());
        let mut output = vec![0.0; BLOCK * 2];

        engine.render(&mut output);
        assert_eq!(output.as_slice(), &pcm(&session, 0)[..BLOCK * 2]);
        assert_eq!(session.player().position(), BLOCK);

        session.player().arm_switch(1);
        engine.render(&mut output);
        let window = session.window().coefficients();
        let old = &pcm(&session, 0)[BLOCK * 2..];
        let new = &pcm(&session, 1)[BLOCK * 2..];
        for slot in 0..BLOCK * 2 {
            let expected = if slot < window.len() {
                window[slot] * old[slot] + (1.0 - window[slot]) * new[slot]
            } else {
                new[slot]
            };
            assert_close(output[slot], expected, &format!("slot {}", slot));
        }
        assert_eq!(window[0], window[1]);
    }

    #[test]
    fn test_position_stays_within_loop_over_many_calls() {
        let session = two_mono_tracks();
        let player = session.player();
        player.set_position(100);
        player.apply_loop_command(crate::loop_controller::LoopCommand::SetStart, 10);
        let mut engine = PlaybackEngine::new(session.clone());
        let mut output = vec![0.0; BLOCK];

        for call in 0..100 {
            if call % 7 == 3 {
                player.arm_switch(call % 2);
            }
            engine.render(&mut output);
            let snapshot = player.snapshot();
            assert!(snapshot.start <= snapshot.pos, "call {}: {:?}", call, snapshot);
            assert!(snapshot.pos <= snapshot.end, "call {}: {:?}", call, snapshot);
            assert!(snapshot.end <= snapshot.length, "call {}: {:?}", call, snapshot);
        }
    }

    #[test]
    fn test_loop_shorter_than_block_restarts_one_block_past_start() {
        let session = two_mono_tracks();
        let player = session.player();
        player.set_position(100);
        player.apply_loop_command(crate::loop_controller::LoopCommand::SetStart, 10);
        player.set_position(150);
        player.apply_loop_command(crate::loop_controller::LoopCommand::SetEnd, 10);
        player.set_position(100);
        let mut engine = PlaybackEngine::new(session.clone());
        let mut output = vec![0.0; BLOCK];
        let window = session.window().coefficients();
        let track = pcm(&session, 0);

        for call in 0..5 {
            engine.render(&mut output);
            // Every call wraps and lands one block past start, beyond the loop end.
            assert_eq!(player.position(), 100 + BLOCK, "call {}", call);
            for k in window.len()..BLOCK {
                assert_close(output[k], track[100 + k], &format!("call {} frame {}", call, k));
            }
        }
        assert_eq!(player.loop_region().end, 150);
    }
}
