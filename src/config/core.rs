use super::DmarcConfig;
use crate::extract::{MAX_FILE_SIZE, MAX_FILES_IN_ARCHIVE, MAX_UNCOMPRESSED_SIZE};
use anyhow::{Context, Result, bail, ensure};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::Path;
use tracing_subscriber::EnvFilter;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Environment variable prefix; `__` separates nested keys
pub const ENV_PREFIX: &str = "DMARCGUARD_";

impl DmarcConfig {
    /// Load and validate configuration.
    ///
    /// Priority, lowest first: embedded defaults, the file at `path` (which
    /// must exist when given), then `DMARCGUARD_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        tracing::trace!("CONFIG LOAD: Starting");

        let config: DmarcConfig = Self::figment(path)?
            .extract()
            .context("Failed to parse configuration")?;
        config.validate()?;

        tracing::trace!("CONFIG LOAD: {:?}", config);
        Ok(config)
    }

    /// The provider chain behind [`DmarcConfig::load`]
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        if let Some(path) = path {
            ensure!(path.is_file(), "Config file not found: {}", path.display());
            tracing::debug!("Loading config file {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Reject limits above the fixed ceilings and out-of-range settings
    pub fn validate(&self) -> Result<()> {
        let limits = &self.limits;
        check_limit("limits.max_file_size", limits.max_file_size, MAX_FILE_SIZE)?;
        check_limit(
            "limits.max_uncompressed_size",
            limits.max_uncompressed_size,
            MAX_UNCOMPRESSED_SIZE,
        )?;
        check_limit(
            "limits.max_files_in_archive",
            limits.max_files_in_archive as u64,
            MAX_FILES_IN_ARCHIVE as u64,
        )?;

        let pct = self.ingest.thread_percentage;
        ensure!(
            (1..=100).contains(&pct),
            "ingest.thread_percentage must be between 1 and 100, got {}",
            pct
        );

        EnvFilter::try_new(&self.logging.level)
            .with_context(|| format!("Invalid logging.level: {:?}", self.logging.level))?;

        Ok(())
    }
}

fn check_limit(name: &str, value: u64, ceiling: u64) -> Result<()> {
    if value == 0 {
        bail!("{} must be greater than zero", name);
    }
    if value > ceiling {
        bail!("{} = {} exceeds the maximum of {}", name, value, ceiling);
    }
    Ok(())
}
