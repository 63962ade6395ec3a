//! Linux sysfs GPIO control output.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::recovery::{ControlOutput, Level, OutputError};

/// A GPIO pin driven through `/sys/class/gpio`.
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    pin: u32,
    value_path: PathBuf,
}

impl SysfsGpio {
    /// Export `pin` under `root` if needed and configure it as an output.
    pub async fn open(root: impl AsRef<Path>, pin: u32) -> Result<Self, OutputError> {
        let root = root.as_ref();
        let pin_dir = root.join(format!("gpio{}", pin));

        if !tokio::fs::try_exists(&pin_dir).await.unwrap_or(false) {
            info!("Exporting GPIO {}", pin);
            write(&root.join("export"), &pin.to_string()).await?;
        }

        write(&pin_dir.join("direction"), "out").await?;
        debug!(pin, "GPIO configured as output");

        Ok(Self {
            pin,
            value_path: pin_dir.join("value"),
        })
    }
}

impl ControlOutput for SysfsGpio {
    async fn set_level(&mut self, level: Level) -> Result<(), OutputError> {
        write(&self.value_path, level.as_value()).await?;
        debug!(pin = self.pin, %level, "GPIO level set");
        Ok(())
    }
}

async fn write(path: &Path, contents: &str) -> Result<(), OutputError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| OutputError::Io {
            path: path.display().to_string(),
            source,
        })
}
