//! Compute device detection.

use std::fmt;
use std::path::Path;

/// Compute device available for the embedding model.
///
/// Reported for diagnostics only. The model always runs on fastembed's
/// default execution provider, so vectors do not depend on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    /// Host CPU.
    Cpu,
    /// NVIDIA GPU via CUDA.
    Cuda,
}

impl Device {
    /// Detects the available device.
    ///
    /// Reports CUDA when the NVIDIA driver is loaded and
    /// `CUDA_VISIBLE_DEVICES` does not hide every GPU.
    #[must_use]
    pub fn detect() -> Self {
        let hidden = std::env::var("CUDA_VISIBLE_DEVICES")
            .is_ok_and(|v| v.trim().is_empty() || v.trim() == "-1");
        if !hidden && Path::new("/proc/driver/nvidia/version").exists() {
            tracing::info!("CUDA detected");
            return Self::Cuda;
        }
        tracing::debug!("No GPU detected");
        Self::Cpu
    }

    /// Parses a device string (`cpu`, `cuda`, `gpu`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Some(Self::Cpu),
            "cuda" | "gpu" => Some(Self::Cuda),
            _ => None,
        }
    }

    /// Returns the device as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Device::parse("CPU"), Some(Device::Cpu));
        assert_eq!(Device::parse("gpu"), Some(Device::Cuda));
        assert_eq!(Device::parse("tpu"), None);
    }

    #[test]
    fn test_display_roundtrip() {
        for device in [Device::Cpu, Device::Cuda] {
            assert_eq!(Device::parse(&device.to_string()), Some(device));
        }
    }
}
