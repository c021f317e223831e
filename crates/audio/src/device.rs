use cpal::traits::{DeviceTrait, HostTrait};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DeviceType {
    Physical,
    /// Loopback/virtual device carrying system or browser audio.
    Loopback,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub device_type: DeviceType,
}

impl AudioDevice {
    pub fn is_loopback(&self) -> bool {
        self.device_type == DeviceType::Loopback
    }
}

const LOOPBACK_DEVICE_PATTERNS: &[&str] = &[
    "blackhole",
    "soundflower",
    "loopback",
    "virtual",
    "vb-audio",
    "voicemeeter",
    "cable",
    "monitor",
];

fn detect_device_type(name: &str) -> DeviceType {
    let lower = name.to_lowercase();
    if LOOPBACK_DEVICE_PATTERNS.iter().any(|p| lower.contains(p)) {
        DeviceType::Loopback
    } else {
        DeviceType::Physical
    }
}

pub fn list_devices() -> crate::Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    for device in host.input_devices()? {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        devices.push(AudioDevice {
            id: name.clone(),
            is_default: default_name.as_ref() == Some(&name),
            device_type: detect_device_type(&name),
            name,
        });
    }

    Ok(devices)
}

/// Loopback device carrying system audio, if one is installed.
pub fn find_loopback_device() -> crate::Result<Option<AudioDevice>> {
    let devices = list_devices()?;
    Ok(devices.into_iter().find(|d| d.is_loopback()))
}

pub fn find_device_by_id(id: &str) -> crate::Result<Option<AudioDevice>> {
    let devices = list_devices()?;
    Ok(devices.into_iter().find(|d| d.id == id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_device_type() {
        assert_eq!(detect_device_type("MacBook Pro Microphone"), DeviceType::Physical);
        assert_eq!(detect_device_type("BlackHole 2ch"), DeviceType::Loopback);
        assert_eq!(
            detect_device_type("Monitor of Built-in Audio"),
            DeviceType::Loopback
        );
        assert_eq!(detect_device_type("VB-Audio Cable A"), DeviceType::Loopback);
    }
}
