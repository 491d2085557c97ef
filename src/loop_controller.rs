//! Loop boundary editing.
//!
//! Every command is a pure transition over a [`LoopRegion`]; the caller reads the
//! current play position and track length, applies the command, and stores the
//! result back into the shared player state.

/// Listener commands that move the loop boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCommand {
    SetStart,
    ClearStart,
    SetEnd,
    ClearEnd,
    NudgeStartDown,
    NudgeStartUp,
    NudgeEndDown,
    NudgeEndUp,
}

/// Loop boundaries in frames. `start <= end` after every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopRegion {
    pub start: usize,
    pub end: usize,
}

impl LoopRegion {
    pub fn full(length: usize) -> Self {
        Self {
            start: 0,
            end: length,
        }
    }

    /// Returns the region after `command`, given the play position, the
    /// session length, and the nudge step (all in frames).
    pub fn apply(self, command: LoopCommand, pos: usize, length: usize, step: usize) -> Self {
        let Self { start, end } = self;
        match command {
            LoopCommand::SetStart => Self {
                start: pos.min(end),
                end,
            },
            LoopCommand::ClearStart => Self { start: 0, end },
            LoopCommand::SetEnd => Self {
                start,
                end: pos.clamp(start, length),
            },
            LoopCommand::ClearEnd => Self { start, end: length },
            LoopCommand::NudgeStartDown => Self {
                start: start.saturating_sub(step),
                end,
            },
            LoopCommand::NudgeStartUp => Self {
                start: start.saturating_add(step).min(end),
                end,
            },
            LoopCommand::NudgeEndDown => Self {
                start,
                end: end.saturating_sub(step).max(start),
            },
            LoopCommand::NudgeEndUp => Self {
                start,
                end: end.saturating_add(step).min(length),
            },
        }
    }
}
