//! File decoding into interleaved `f32` PCM, with optional resampling.

use std::fs::File;
use std::path::Path;

use log::{debug, warn};
use rubato::{
    FftFixedIn, Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::config::ResamplerQuality;
use crate::error::{AppError, AppResult};

const RESAMPLER_CHUNK_FRAMES: usize = 1024;

/// A fully decoded input file.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Display name, the path as given on the command line.
    pub name: String,
    pub channels: u16,
    pub sample_rate: u32,
    pub duration_secs: f64,
    /// Interleaved samples, frame-major.
    pub samples: Vec<f32>,
}

/// Source of decoded tracks.
pub trait TrackDecoder {
    fn decode(&self, path: &Path) -> AppResult<DecodedAudio>;
}

/// Decodes with symphonia and resamples with rubato when an output rate is set.
#[derive(Debug, Clone)]
pub struct SymphoniaDecoder {
    target_sample_rate: Option<u32>,
    quality: ResamplerQuality,
    max_track_secs: u32,
}

impl SymphoniaDecoder {
    pub fn new(
        target_sample_rate: Option<u32>,
        quality: ResamplerQuality,
        max_track_secs: u32,
    ) -> Self {
        Self {
            target_sample_rate,
            quality,
            max_track_secs,
        }
    }

    fn check_duration(&self, name: &str, duration_secs: f64) -> AppResult<()> {
        if duration_secs > f64::from(self.max_track_secs) {
            return Err(AppError::format(name, "too long"));
        }
        Ok(())
    }
}

impl TrackDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path) -> AppResult<DecodedAudio> {
        let name = path.display().to_string();
        let file = File::open(path).map_err(|err| AppError::format(&name, err.to_string()))?;
        let media_source = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                media_source,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|_| AppError::format(&name, "invalid audio file"))?;
        let mut format_reader = probed.format;

        let Some(track) = format_reader.default_track() else {
            return Err(AppError::format(&name, "invalid audio file"));
        };
        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);
        let sample_rate = codec_params.sample_rate.unwrap_or(0);
        if sample_rate == 0 {
            return Err(AppError::format(&name, "invalid audio file"));
        }
        if let Some(n_frames) = codec_params.n_frames {
            self.check_duration(&name, n_frames as f64 / f64::from(sample_rate))?;
        }

        debug!(
            "AudioDecoder: {} sample_rate={} channels={} n_frames={:?}",
            name, sample_rate, channels, codec_params.n_frames
        );

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|err| AppError::format(&name, err.to_string()))?;

        let mut samples = Vec::new();
        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(err) => return Err(AppError::format(&name, err.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    if channels == 0 {
                        channels = spec.channels.count();
                    }
                    let duration = decoded.capacity() as u64;

                    let mut sample_buffer = SampleBuffer::<f32>::new(duration, spec);
                    sample_buffer.copy_interleaved_ref(decoded);

                    samples.extend_from_slice(sample_buffer.samples());
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    warn!("AudioDecoder: {}: skipping corrupt packet: {}", name, err);
                }
                Err(err) => return Err(AppError::format(&name, err.to_string())),
            }
        }

        if channels == 0 {
            return Err(AppError::format(&name, "invalid audio file"));
        }
        let frames = samples.len() / channels;
        let duration_secs = frames as f64 / f64::from(sample_rate);
        self.check_duration(&name, duration_secs)?;

        let (samples, sample_rate) = match self.target_sample_rate {
            Some(target) if target != sample_rate => {
                debug!(
                    "AudioDecoder: resampling {} from {} to {} Hz",
                    name, sample_rate, target
                );
                let resampled =
                    resample_interleaved(&samples, channels, sample_rate, target, self.quality)
                        .map_err(|reason| AppError::format(&name, reason))?;
                (resampled, target)
            }
            _ => (samples, sample_rate),
        };

        debug!("AudioDecoder: decoded {} samples from {}", samples.len(), name);
        Ok(DecodedAudio {
            name,
            channels: channels as u16,
            sample_rate,
            duration_secs,
            samples,
        })
    }
}

/// Resamples interleaved PCM, trimming the resampler delay so the output lines
/// up with the input and has `ceil(frames * to / from)` frames.
pub fn resample_interleaved(
    samples: &[f32],
    channels: usize,
    from: u32,
    to: u32,
    quality: ResamplerQuality,
) -> Result<Vec<f32>, String> {
    match quality {
        ResamplerQuality::High => {
            let resampler = FftFixedIn::<f32>::new(
                from as usize,
                to as usize,
                RESAMPLER_CHUNK_FRAMES,
                2,
                channels,
            )
            .map_err(|err| err.to_string())?;
            run_resampler(resampler, samples, channels, from, to)
        }
        ResamplerQuality::Highest => {
            let params = SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Cubic,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            };
            let resampler = SincFixedIn::<f32>::new(
                f64::from(to) / f64::from(from),
                1.0,
                params,
                RESAMPLER_CHUNK_FRAMES,
                channels,
            )
            .map_err(|err| err.to_string())?;
            run_resampler(resampler, samples, channels, from, to)
        }
    }
}

fn run_resampler<R: Resampler<f32>>(
    mut resampler: R,
    samples: &[f32],
    channels: usize,
    from: u32,
    to: u32,
) -> Result<Vec<f32>, String> {
    let frames = samples.len() / channels;
    let expected_frames = (frames as u64 * u64::from(to)).div_ceil(u64::from(from)) as usize;
    let delay = resampler.output_delay();

    let planar: Vec<Vec<f32>> = (0..channels)
        .map(|channel| {
            samples
                .iter()
                .skip(channel)
                .step_by(channels)
                .take(frames)
                .copied()
                .collect()
        })
        .collect();
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected_frames + delay); channels];

    let mut cursor = 0;
    while frames - cursor >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let chunk: Vec<&[f32]> = planar
            .iter()
            .map(|channel| &channel[cursor..cursor + needed])
            .collect();
        let resampled = resampler
            .process(&chunk, None)
            .map_err(|err| err.to_string())?;
        append_planar(&mut output, resampled);
        cursor += needed;
    }
    if cursor < frames {
        let chunk: Vec<&[f32]> = planar.iter().map(|channel| &channel[cursor..]).collect();
        let resampled = resampler
            .process_partial(Some(chunk.as_slice()), None)
            .map_err(|err| err.to_string())?;
        append_planar(&mut output, resampled);
    }
    while output[0].len() < expected_frames + delay {
        let resampled = resampler
            .process_partial::<Vec<f32>>(None, None)
            .map_err(|err| err.to_string())?;
        if resampled[0].is_empty() {
            break;
        }
        append_planar(&mut output, resampled);
    }

    let available = output[0].len().saturating_sub(delay).min(expected_frames);
    let mut interleaved = Vec::with_capacity(available * channels);
    for frame in delay..delay + available {
        for channel in &output {
            interleaved.push(channel[frame]);
        }
    }
    Ok(interleaved)
}

fn append_planar(output: &mut [Vec<f32>], resampled: Vec<Vec<f32>>) {
    for (channel, samples) in output.iter_mut().zip(resampled) {
        channel.extend_from_slice(&samples);
    }
}
