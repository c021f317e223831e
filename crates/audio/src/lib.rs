mod device;
mod stream;

pub use device::{find_device_by_id, find_loopback_device, list_devices, AudioDevice, DeviceType};
pub use stream::{CaptureSource, CaptureStream};

/// Capture output rate; frames leave the stream as mono f32 at this rate.
pub use livecap_pcm::TARGET_SAMPLE_RATE as SAMPLE_RATE;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("stream error: {0}")]
    StreamError(String),
    #[error("device error: {0}")]
    DeviceError(#[from] cpal::DevicesError),
    #[error("build stream error: {0}")]
    BuildStreamError(#[from] cpal::BuildStreamError),
}

pub type Result<T> = std::result::Result<T, AudioError>;
