//! Audio subsystem modules (decode, cross-fade, rendering, and device output).

pub(crate) mod audio_decoder;
pub(crate) mod audio_output;
pub(crate) mod crossfade;
pub(crate) mod engine;
