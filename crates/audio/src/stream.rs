use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream};
use crossbeam_channel::{Receiver, Sender};
use rubato::{FftFixedIn, Resampler as RubatoResampler};

use crate::SAMPLE_RATE;

/// Where to capture audio from.
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// Named input device, or the default input when `None`.
    Input { device_id: Option<String> },
    /// System audio via an installed loopback device.
    SystemLoopback,
}

/// Live capture stream delivering mono f32 frames at [`SAMPLE_RATE`].
///
/// Frames arrive on an unbounded channel in capture order. Dropping the
/// stream stops the device callback; the channel disconnects once the
/// last frame is drained.
pub struct CaptureStream {
    _stream: Stream,
    receiver: Option<Receiver<Vec<f32>>>,
}

impl CaptureStream {
    pub fn new(source: CaptureSource) -> crate::Result<Self> {
        let host = cpal::default_host();
        let device = match source {
            CaptureSource::Input { device_id } => get_device(&host, device_id.as_deref())?,
            CaptureSource::SystemLoopback => {
                let loopback = crate::find_loopback_device()?.ok_or_else(|| {
                    crate::AudioError::DeviceNotFound(
                        "no loopback device found (BlackHole/VB-Cable/monitor source)".to_string(),
                    )
                })?;
                get_device(&host, Some(&loopback.id))?
            }
        };

        let (tx, rx) = crossbeam_channel::unbounded::<Vec<f32>>();
        let stream = build_stream(device, tx)?;
        Ok(Self {
            _stream: stream,
            receiver: Some(rx),
        })
    }

    /// Take the frame receiver out of this stream (can only be called once).
    pub fn take_receiver(&mut self) -> Option<Receiver<Vec<f32>>> {
        self.receiver.take()
    }
}

fn get_device(host: &cpal::Host, device_id: Option<&str>) -> crate::Result<Device> {
    match device_id {
        Some(id) => host
            .input_devices()?
            .find(|d| d.name().ok().as_deref() == Some(id))
            .ok_or_else(|| crate::AudioError::DeviceNotFound(id.to_string())),
        None => host
            .default_input_device()
            .ok_or_else(|| crate::AudioError::DeviceNotFound("default".to_string())),
    }
}

fn build_stream(device: Device, tx: Sender<Vec<f32>>) -> crate::Result<Stream> {
    let config = device.default_input_config().map_err(|e| {
        crate::AudioError::StreamError(format!("failed to get default config: {e}"))
    })?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    tracing::info!(sample_rate, channels, format = ?config.sample_format(), "capture stream config");

    // Sinc resampler for quality; linear fallback if it cannot be built.
    let resampler = if sample_rate != SAMPLE_RATE {
        SincResampler::new(sample_rate, SAMPLE_RATE).map(|r| Arc::new(Mutex::new(r)))
    } else {
        None
    };

    let stream = match config.sample_format() {
        SampleFormat::F32 => {
            let resampler = resampler.clone();
            device.build_input_stream(
                &config.into(),
                move |data: &[f32], _| {
                    let samples = process_frame(data, channels, sample_rate, resampler.as_deref());
                    let _ = tx.send(samples);
                },
                |err| tracing::error!("capture stream error: {}", err),
                None,
            )?
        }
        SampleFormat::I16 => {
            let resampler = resampler.clone();
            device.build_input_stream(
                &config.into(),
                move |data: &[i16], _| {
                    let float: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                    let samples = process_frame(&float, channels, sample_rate, resampler.as_deref());
                    let _ = tx.send(samples);
                },
                |err| tracing::error!("capture stream error: {}", err),
                None,
            )?
        }
        format => {
            return Err(crate::AudioError::StreamError(format!(
                "unsupported sample format: {format:?}"
            )));
        }
    };

    stream
        .play()
        .map_err(|e| crate::AudioError::StreamError(format!("failed to start stream: {e}")))?;

    Ok(stream)
}

/// Downmix to mono and resample to [`SAMPLE_RATE`].
fn process_frame(
    samples: &[f32],
    channels: usize,
    from_rate: u32,
    resampler: Option<&Mutex<SincResampler>>,
) -> Vec<f32> {
    let mono = if channels > 1 {
        to_mono(samples, channels)
    } else {
        samples.to_vec()
    };

    if from_rate == SAMPLE_RATE {
        return mono;
    }
    match resampler.and_then(|r| r.lock().ok().map(|mut r| r.process(&mono))) {
        Some(resampled) => resampled,
        None => resample_linear(&mono, from_rate, SAMPLE_RATE),
    }
}

#[inline]
fn to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    let mut output = Vec::with_capacity(samples.len() / channels);
    let inv_channels = 1.0 / channels as f32;
    for frame in samples.chunks_exact(channels) {
        output.push(frame.iter().sum::<f32>() * inv_channels);
    }
    output
}

/// Linear interpolation resampling (stateless fallback).
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = src_idx.fract() as f32;
        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }
    output
}

/// Rubato sinc resampler with buffering for variable input sizes.
struct SincResampler {
    resampler: FftFixedIn<f32>,
    input_buffer: Vec<f32>,
    chunk_size: usize,
}

impl SincResampler {
    fn new(from_rate: u32, to_rate: u32) -> Option<Self> {
        let chunk_size = 256;
        let resampler =
            FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, chunk_size, 2, 1).ok()?;

        Some(Self {
            resampler,
            input_buffer: Vec::with_capacity(chunk_size * 2),
            chunk_size,
        })
    }

    /// Process input samples and return whatever full chunks resampled to.
    fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        self.input_buffer.extend_from_slice(samples);

        let mut output = Vec::new();
        while self.input_buffer.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.input_buffer.drain(..self.chunk_size).collect();
            if let Ok(resampled) = self.resampler.process(&[chunk], None) {
                if !resampled.is_empty() {
                    output.extend_from_slice(&resampled[0]);
                }
            }
        }
        output
    }
}
