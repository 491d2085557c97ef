//! Keystroke handling for a running session.
//!
//! The control loop polls one key at a time with a bounded timeout, maps it to a
//! [`Command`], and mutates the shared player state. Track switches are only
//! armed here; the audio callback performs them under a cross-fade.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::config::MAX_TRACKS;
use crate::error::AppResult;
use crate::loop_controller::LoopCommand;
use crate::player::PlayerSnapshot;
use crate::session::Session;

/// Digit keys in track-slot order: `1` selects the first track, `0` the tenth.
const TRACK_KEYS: [char; MAX_TRACKS] = ['1', '2', '3', '4', '5', '6', '7', '8', '9', '0'];

/// One polled input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    /// External cancellation (Ctrl-C in raw mode).
    Interrupt,
}

/// Yields at most one key per poll, or `None` once `timeout` elapses.
pub trait InputSource {
    fn poll_key(&mut self, timeout: Duration) -> AppResult<Option<KeyInput>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectTrack(usize),
    TogglePause,
    Loop(LoopCommand),
    Quit,
}

/// Track slot for a digit key.
pub fn track_for_key(key: char) -> Option<usize> {
    TRACK_KEYS.iter().position(|candidate| *candidate == key)
}

pub fn command_for_key(key: char) -> Option<Command> {
    if let Some(track) = track_for_key(key) {
        return Some(Command::SelectTrack(track));
    }
    let command = match key {
        ' ' => Command::TogglePause,
        'q' => Command::Quit,
        's' => Command::Loop(LoopCommand::SetStart),
        'x' => Command::Loop(LoopCommand::ClearStart),
        'd' => Command::Loop(LoopCommand::SetEnd),
        'c' => Command::Loop(LoopCommand::ClearEnd),
        'i' => Command::Loop(LoopCommand::NudgeStartDown),
        'o' => Command::Loop(LoopCommand::NudgeStartUp),
        'k' => Command::Loop(LoopCommand::NudgeEndDown),
        'l' => Command::Loop(LoopCommand::NudgeEndUp),
        _ => return None,
    };
    Some(command)
}

pub struct ControlLoop {
    session: Arc<Session>,
    poll_timeout: Duration,
}

impl ControlLoop {
    pub fn new(session: Arc<Session>, poll_timeout: Duration) -> Self {
        Self {
            session,
            poll_timeout,
        }
    }

    pub fn apply(&self, command: Command) {
        let player = self.session.player();
        match command {
            Command::SelectTrack(track) => {
                // Slots beyond the loaded tracks are ignored.
                if track < self.session.tracks().len() {
                    debug!("Control: arming switch to track {}", track + 1);
                    player.arm_switch(track);
                }
            }
            Command::TogglePause => {
                let paused = player.toggle_pause();
                debug!("Control: paused={}", paused);
            }
            Command::Loop(loop_command) => {
                let region = player.apply_loop_command(loop_command, self.session.step_frames());
                debug!(
                    "Control: {:?} -> loop [{}, {})",
                    loop_command, region.start, region.end
                );
            }
            Command::Quit => player.stop(),
        }
    }

    pub fn handle(&self, input: KeyInput) {
        match input {
            KeyInput::Char(key) => {
                if let Some(command) = command_for_key(key) {
                    self.apply(command);
                }
            }
            KeyInput::Interrupt => self.apply(Command::Quit),
        }
    }

    /// Polls until the player stops running, calling `on_tick` with fresh player
    /// state after every poll, whether or not a key arrived.
    pub fn run<I, F>(&self, input: &mut I, mut on_tick: F) -> AppResult<()>
    where
        I: InputSource,
        F: FnMut(&PlayerSnapshot) -> AppResult<()>,
    {
        let player = self.session.player();
        while player.is_running() {
            if let Some(key) = input.poll_key(self.poll_timeout)? {
                self.handle(key);
            }
            on_tick(&player.snapshot())?;
        }
        debug!("Control: loop finished");
        Ok(())
    }
}
