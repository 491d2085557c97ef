//! Shared player state read and written by both the audio callback and the
//! control loop.
//!
//! Each field is its own atomic with exactly one writing side:
//! - audio callback: `current`, `pos`
//! - control loop: `next`, `start`, `end`, `paused`, `running`
//!
//! No lock guards the group, so a reader may observe fields from two different
//! callback periods. Cross-field consistency is eventual.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::loop_controller::{LoopCommand, LoopRegion};

#[derive(Debug)]
pub struct Player {
    current: AtomicUsize,
    next: AtomicUsize,
    pos: AtomicUsize,
    start: AtomicUsize,
    end: AtomicUsize,
    running: AtomicBool,
    paused: AtomicBool,
    length: usize,
    channels: usize,
    sample_rate: u32,
}

/// Point-in-time copy of the player fields, used for display and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub current: usize,
    pub next: usize,
    pub pos: usize,
    pub start: usize,
    pub end: usize,
    pub length: usize,
    pub paused: bool,
}

impl Player {
    pub fn new(length: usize, channels: usize, sample_rate: u32) -> Self {
        let region = LoopRegion::full(length);
        Self {
            current: AtomicUsize::new(0),
            next: AtomicUsize::new(0),
            pos: AtomicUsize::new(region.start),
            start: AtomicUsize::new(region.start),
            end: AtomicUsize::new(region.end),
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            length,
            channels: channels.max(1),
            sample_rate,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn current_track(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    pub fn next_track(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }

    pub fn position(&self) -> usize {
        self.pos.load(Ordering::Relaxed)
    }

    pub fn loop_region(&self) -> LoopRegion {
        LoopRegion {
            start: self.start.load(Ordering::Relaxed),
            end: self.end.load(Ordering::Relaxed),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Arms a switch to `track`; the audio callback consumes it with a cross-fade.
    pub fn arm_switch(&self, track: usize) {
        self.next.store(track, Ordering::Relaxed);
    }

    pub fn toggle_pause(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Applies a loop edit against the current play position.
    pub fn apply_loop_command(&self, command: LoopCommand, step: usize) -> LoopRegion {
        let region = self
            .loop_region()
            .apply(command, self.position(), self.length, step);
        self.start.store(region.start, Ordering::Relaxed);
        self.end.store(region.end, Ordering::Relaxed);
        region
    }

    pub(crate) fn commit_switch(&self, track: usize) {
        self.current.store(track, Ordering::Relaxed);
    }

    pub(crate) fn set_position(&self, pos: usize) {
        self.pos.store(pos, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let region = self.loop_region();
        PlayerSnapshot {
            current: self.current_track(),
            next: self.next_track(),
            pos: self.position(),
            start: region.start,
            end: region.end,
            length: self.length(),
            paused: self.is_paused(),
        }
    }
}
