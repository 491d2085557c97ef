//! Output device discovery and the CPAL stream that drives the playback engine.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error, warn};

use crate::audio::engine::PlaybackEngine;
use crate::error::{AppError, AppResult};
use crate::session::Session;

/// Names of all output devices, in host enumeration order.
pub fn list_output_devices(host: &cpal::Host) -> AppResult<Vec<String>> {
    let devices = host
        .output_devices()
        .map_err(|err| AppError::Resource(format!("audio init failed: {}", err)))?;
    Ok(devices
        .map(|device| {
            device
                .name()
                .unwrap_or_else(|_| "Unknown Device".to_string())
        })
        .collect())
}

/// Picks the output device at `index` in [`list_output_devices`] order, or the
/// host default.
pub fn select_output_device(host: &cpal::Host, index: Option<usize>) -> AppResult<cpal::Device> {
    match index {
        Some(index) => host
            .output_devices()
            .map_err(|err| AppError::Resource(format!("audio init failed: {}", err)))?
            .nth(index)
            .ok_or_else(|| AppError::Resource(format!("invalid device index: {}", index))),
        None => host
            .default_output_device()
            .ok_or_else(|| AppError::Resource("no output device available".to_string())),
    }
}

/// Whether any supported range offers `f32` output at this channel count and rate.
fn supports_f32_output(
    ranges: &[cpal::SupportedStreamConfigRange],
    channels: u16,
    sample_rate: u32,
) -> bool {
    ranges.iter().any(|range| {
        range.channels() == channels
            && range.sample_format() == cpal::SampleFormat::F32
            && range.min_sample_rate().0 <= sample_rate
            && range.max_sample_rate().0 >= sample_rate
    })
}

/// Requests `block_frames` per callback, clamped to what the device reports.
fn choose_buffer_size(
    ranges: &[cpal::SupportedStreamConfigRange],
    channels: u16,
    block_frames: u32,
) -> cpal::BufferSize {
    let supported = ranges
        .iter()
        .filter(|range| {
            range.channels() == channels && range.sample_format() == cpal::SampleFormat::F32
        })
        .find_map(|range| match range.buffer_size() {
            cpal::SupportedBufferSize::Range { min, max } => Some((*min, *max)),
            cpal::SupportedBufferSize::Unknown => None,
        });
    match supported {
        Some((min, max)) => cpal::BufferSize::Fixed(block_frames.clamp(min, max)),
        None => cpal::BufferSize::Fixed(block_frames),
    }
}

/// Opens and starts an `f32` output stream whose callback renders `session`.
///
/// The stream plays until it is dropped.
pub fn start_output_stream(
    device: &cpal::Device,
    session: Arc<Session>,
) -> AppResult<cpal::Stream> {
    let channels = session.player().channels() as u16;
    let sample_rate = session.player().sample_rate();
    let block_frames = session.block_frames() as u32;
    let device_name = device
        .name()
        .unwrap_or_else(|_| "Unknown Device".to_string());

    let ranges = match device.supported_output_configs() {
        Ok(configs) => configs.collect::<Vec<_>>(),
        Err(err) => {
            return Err(AppError::Resource(format!(
                "error getting device configs: {}",
                err
            )))
        }
    };
    if !supports_f32_output(&ranges, channels, sample_rate) {
        warn!(
            "AudioOutput: '{}' reports no f32 config for {} channels at {} Hz, trying anyway",
            device_name, channels, sample_rate
        );
    }

    let buffer_size = choose_buffer_size(&ranges, channels, block_frames);
    if buffer_size != cpal::BufferSize::Fixed(block_frames) {
        warn!(
            "AudioOutput: requested {} frames per callback, device allows {:?}",
            block_frames, buffer_size
        );
    }
    let config = cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size,
    };

    let mut engine = PlaybackEngine::new(session);
    let stream = device
        .build_output_stream(
            &config,
            move |output_buffer: &mut [f32], _: &cpal::OutputCallbackInfo| {
                engine.render(output_buffer);
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|err| AppError::Resource(format!("stream open failed: {}", err)))?;
    stream
        .play()
        .map_err(|err| AppError::Resource(format!("stream start failed: {}", err)))?;

    debug!(
        "AudioOutput: stream started: device='{}' sr={} channels={} buffer={:?}",
        device_name, sample_rate, channels, config.buffer_size
    );
    Ok(stream)
}
