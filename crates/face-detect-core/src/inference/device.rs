//! Device selection for inference.

use std::str::FromStr;

use candle_core::Device;
use tracing::info;

/// Where the model should run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DevicePreference {
    /// Use a GPU when one was compiled in and is present, else the CPU.
    #[default]
    Auto,
    /// Always run on the CPU.
    Cpu,
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            other => Err(format!("unknown device '{other}', expected 'auto' or 'cpu'")),
        }
    }
}

impl DevicePreference {
    /// Resolves the preference to a concrete device.
    ///
    /// GPU backends are only probed when the `metal` or `cuda` feature is enabled.
    #[must_use]
    pub fn resolve(self) -> Device {
        if self == Self::Cpu {
            info!("Using CPU for inference (forced)");
            return Device::Cpu;
        }

        #[cfg(feature = "metal")]
        {
            match Device::new_metal(0) {
                Ok(device) => {
                    info!("Using Metal device for inference");
                    return device;
                }
                Err(e) => tracing::warn!("Metal unavailable: {e}"),
            }
        }

        #[cfg(feature = "cuda")]
        {
            match Device::new_cuda(0) {
                Ok(device) => {
                    info!("Using CUDA device for inference");
                    return device;
                }
                Err(e) => tracing::warn!("CUDA unavailable: {e}"),
            }
        }

        info!("Using CPU for inference");
        Device::Cpu
    }
}
