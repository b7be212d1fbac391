//! Startup checks.

use crate::config::ServerConfig;

/// Refuse to start on a configuration that cannot work.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.storage.data_dir.trim().is_empty() {
        anyhow::bail!("Storage data_dir is empty in configuration.");
    }
    if config.serial.max_attempts == 0 {
        anyhow::bail!("serial.max_attempts must be at least 1.");
    }
    if config.submission.max_photo_bytes == 0 {
        anyhow::bail!("submission.max_photo_bytes must be greater than zero.");
    }
    config.local_offset()?;
    Ok(())
}
