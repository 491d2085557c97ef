//! Raw-mode terminal handling: key polling, the info screen, and the progress line.

use std::io::{self, Write};
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType};
use log::{warn, LevelFilter};

use crate::control::{InputSource, KeyInput};
use crate::error::AppResult;
use crate::player::PlayerSnapshot;

pub const PROGRESS_WIDTH: usize = 80;

/// Most verbose log level allowed while the session screen is up.
///
/// Log records end in a bare `\n`, which raw mode does not return to column 0,
/// so debug chatter would break up the progress line.
pub fn raw_mode_log_level(level: LevelFilter) -> LevelFilter {
    level.min(LevelFilter::Warn)
}

/// Puts the terminal into raw mode with a hidden cursor until dropped.
///
/// Console logging is capped by [`raw_mode_log_level`] for the same span.
pub struct TerminalGuard {
    saved_log_level: LevelFilter,
}

impl TerminalGuard {
    pub fn enter() -> AppResult<Self> {
        enable_raw_mode()?;
        let saved_log_level = log::max_level();
        log::set_max_level(raw_mode_log_level(saved_log_level));
        let guard = Self { saved_log_level };
        execute!(io::stdout(), Hide)?;
        Ok(guard)
    }

    pub fn clear(&self) -> AppResult<()> {
        execute!(io::stdout(), MoveTo(0, 0), Clear(ClearType::FromCursorDown))?;
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(err) = execute!(io::stdout(), Show) {
            warn!("Terminal: failed to show cursor: {}", err);
        }
        if let Err(err) = disable_raw_mode() {
            warn!("Terminal: failed to leave raw mode: {}", err);
        }
        println!();
        log::set_max_level(self.saved_log_level);
    }
}

/// Key source backed by crossterm events. Only key presses are reported.
pub struct CrosstermInput;

impl InputSource for CrosstermInput {
    fn poll_key(&mut self, timeout: Duration) -> AppResult<Option<KeyInput>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        let Event::Key(key) = event::read()? else {
            return Ok(None);
        };
        if key.kind != KeyEventKind::Press {
            return Ok(None);
        }
        let input = match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(KeyInput::Interrupt)
            }
            KeyCode::Char(ch) => Some(KeyInput::Char(ch)),
            _ => None,
        };
        Ok(input)
    }
}

/// Renders the loop region and play position scaled onto `width` columns.
///
/// The play position wins over the loop markers when they share a column.
pub fn progress_line(snapshot: &PlayerSnapshot, width: usize) -> String {
    let length = snapshot.length.max(1);
    let column = |frame: usize| frame.saturating_mul(width) / length;
    let pos = column(snapshot.pos);
    let start = column(snapshot.start);
    let end = column(snapshot.end.saturating_sub(1));
    let track_digit = char::from_digit(((snapshot.current + 1) % 10) as u32, 10).unwrap_or('?');

    (0..width)
        .map(|i| {
            if i == pos {
                track_digit
            } else if i == start {
                '['
            } else if i == end {
                ']'
            } else {
                '-'
            }
        })
        .collect()
}

/// Numbered file list. Blind sessions hide names, and a pinned reference keeps
/// its slot labelled as such.
pub fn file_lines<S: AsRef<str>>(names: &[S], reference: bool, blind: bool) -> Vec<String> {
    names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let slot = (index + 1) % 10;
            if reference && index == 0 {
                format!("[{}] reference", slot)
            } else if blind {
                format!("[{}] ???", slot)
            } else {
                format!("[{}] {}", slot, name.as_ref())
            }
        })
        .collect()
}

pub fn info_lines<S: AsRef<str>>(
    names: &[S],
    reference: bool,
    blind: bool,
    channels: usize,
    sample_rate: u32,
) -> Vec<String> {
    let rule = "-".repeat(PROGRESS_WIDTH);
    let mut lines = vec![rule.clone()];
    lines.extend(file_lines(names, reference, blind));
    lines.push(rule);
    lines.push(format!(
        "{:<69}{} channels",
        "[s] start  [x] clear  [i/o] adjust  [q]     quit", channels
    ));
    lines.push(format!(
        "{:<69}{} Hz",
        "[d] end    [c] clear  [k/l] adjust  [space] pause", sample_rate
    ));
    lines
}

/// Writes whole lines with `\r\n`, which raw mode requires.
pub fn write_lines<W: Write, S: AsRef<str>>(out: &mut W, lines: &[S]) -> AppResult<()> {
    for line in lines {
        write!(out, "{}\r\n", line.as_ref())?;
    }
    out.flush()?;
    Ok(())
}

/// Overwrites the current row with the progress line.
pub fn write_progress<W: Write>(out: &mut W, snapshot: &PlayerSnapshot) -> AppResult<()> {
    write!(out, "{}\r", progress_line(snapshot, PROGRESS_WIDTH))?;
    out.flush()?;
    Ok(())
}
