use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryConfig;
use crate::upload::{FileUploadOptions, UploadLimits, DEFAULT_MAX_CONCURRENT_PARTS};

/// Retry parameters (optional `[retry]` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the first attempt (0 = a single attempt).
    pub max_retries: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
    /// Random spread applied to each delay, in [0, 1).
    pub jitter_factor: f64,
    /// Wait for the server's Retry-After when it sends one.
    pub respect_server_hint: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let d = RetryConfig::default();
        Self {
            max_retries: d.max_retries(),
            base_delay_secs: d.base_delay().as_secs_f64(),
            max_delay_secs: d.max_delay().as_secs(),
            jitter_factor: d.jitter_factor(),
            respect_server_hint: d.respect_server_hint(),
        }
    }
}

/// Upload limits and part concurrency (optional `[upload]` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub min_part_size: u64,
    pub max_part_size: u64,
    pub max_parts: u32,
    /// Payloads of at least this many bytes are sent in parts.
    pub multipart_threshold: u64,
    pub enable_concurrent_parts: bool,
    pub max_concurrent_parts: usize,
    /// Per-attempt timeout for part calls, in seconds.
    pub part_timeout_secs: Option<u64>,
}

impl Default for UploadSettings {
    fn default() -> Self {
        let l = UploadLimits::default();
        Self {
            min_part_size: l.min_part_size,
            max_part_size: l.max_part_size,
            max_parts: l.max_parts,
            multipart_threshold: l.multipart_threshold,
            enable_concurrent_parts: true,
            max_concurrent_parts: DEFAULT_MAX_CONCURRENT_PARTS,
            part_timeout_secs: None,
        }
    }
}

/// Client settings as written in TOML. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SteadyConfig {
    /// Per-attempt timeout for ordinary API calls, in seconds.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetrySettings>,
    #[serde(default)]
    pub upload: Option<UploadSettings>,
}

impl SteadyConfig {
    /// Parse settings from TOML text.
    pub fn from_toml_str(data: &str) -> Result<Self> {
        let cfg: SteadyConfig = toml::from_str(data).context("invalid steady config")?;
        cfg.retry_config()?;
        cfg.upload_limits()?;
        Ok(cfg)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Runtime retry policy. Rejects negative or non-finite delays and jitter outside [0, 1).
    pub fn retry_config(&self) -> Result<RetryConfig> {
        let Some(r) = &self.retry else {
            return Ok(RetryConfig::default());
        };
        if !r.base_delay_secs.is_finite() || r.base_delay_secs < 0.0 {
            bail!("retry.base_delay_secs must be a non-negative number, got {}", r.base_delay_secs);
        }
        if !(0.0..1.0).contains(&r.jitter_factor) {
            bail!("retry.jitter_factor must be in [0, 1), got {}", r.jitter_factor);
        }
        let base = Duration::from_secs_f64(r.base_delay_secs);
        let max = Duration::from_secs(r.max_delay_secs);
        if base > max {
            bail!(
                "retry.base_delay_secs ({}) exceeds retry.max_delay_secs ({})",
                r.base_delay_secs,
                r.max_delay_secs
            );
        }
        Ok(RetryConfig::new()
            .with_max_retries(r.max_retries)
            .with_max_delay(max)
            .with_base_delay(base)
            .with_jitter_factor(r.jitter_factor)
            .with_respect_server_hint(r.respect_server_hint))
    }

    pub fn upload_limits(&self) -> Result<UploadLimits> {
        let u = self.upload.clone().unwrap_or_default();
        if u.min_part_size == 0 {
            bail!("upload.min_part_size must be > 0");
        }
        if u.max_parts == 0 {
            bail!("upload.max_parts must be > 0");
        }
        if u.min_part_size > u.max_part_size {
            bail!(
                "upload.min_part_size ({}) exceeds upload.max_part_size ({})",
                u.min_part_size,
                u.max_part_size
            );
        }
        Ok(UploadLimits {
            min_part_size: u.min_part_size,
            max_part_size: u.max_part_size,
            max_parts: u.max_parts,
            multipart_threshold: u.multipart_threshold,
        })
    }

    /// Upload options for `filename` built from the `[upload]` table.
    pub fn upload_options(&self, filename: impl Into<String>) -> Result<FileUploadOptions> {
        let u = self.upload.clone().unwrap_or_default();
        let mut options = FileUploadOptions::new(filename)
            .with_limits(self.upload_limits()?)
            .with_concurrent_parts(u.enable_concurrent_parts)
            .with_max_concurrent_parts(u.max_concurrent_parts);
        if let Some(secs) = u.part_timeout_secs {
            options = options.with_part_timeout(Duration::from_secs(secs));
        }
        Ok(options)
    }
}
