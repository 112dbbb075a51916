use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Parameters substituted into rewrite rule templates (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteTargets {
    /// Target display width in CSS pixels (`%w`).
    pub width: u32,
    /// Target display height in CSS pixels (`%h`).
    pub height: u32,
    /// Target encoder quality (`%q`).
    pub quality: u32,
    /// Target image format token, lowercase (`%f`).
    pub format: String,
}

impl Default for RewriteTargets {
    fn default() -> Self {
        // Fixed to the 411px-wide mobile viewport the measurements were taken on.
        Self {
            width: 411,
            height: 411,
            quality: 85,
            format: "webp".to_string(),
        }
    }
}

/// Which rewrite table to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSetKind {
    /// `width=`, `height=`, `quality=`, `format=` query parameters only.
    #[default]
    Reduced,
    /// Full table of CDN resize/quality/format URL conventions.
    Extended,
}

/// Reflection compositing parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionConfig {
    /// Gaussian blur sigma for the flipped copy, in pixels.
    pub blur_sigma: f32,
    /// JPEG quality for the exported payload (1-100).
    pub jpeg_quality: u8,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 8.0,
            jpeg_quality: 92,
        }
    }
}

/// Quiet-period settings handed to the page-audit collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSettings {
    pub max_wait_for_load_ms: u64,
    pub pause_after_load_ms: u64,
    pub network_quiet_threshold_ms: u64,
    pub cpu_quiet_threshold_ms: u64,
    /// Report categories to collect.
    pub only_categories: Vec<String>,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            max_wait_for_load_ms: 5000,
            pause_after_load_ms: 5000,
            network_quiet_threshold_ms: 5000,
            cpu_quiet_threshold_ms: 5000,
            only_categories: vec!["performance".to_string()],
        }
    }
}

/// Global configuration loaded from `~/.config/rangelite/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteConfig {
    /// Share of each image's total length requested by the progressive fetch, in (0, 1].
    pub fraction: f64,
    /// Composite a blurred reflection; when false the fetched bytes are applied as-is.
    pub reflect: bool,
    /// Rewrite image URLs with the rule table before the progressive fetch.
    pub rewrite: bool,
    /// Intercept image requests at all. When false every request passes through.
    pub intercept: bool,
    /// Size of the initial probe range in bytes.
    pub probe_bytes: u64,
    /// Rewrite table: "reduced" (default) or "extended".
    #[serde(default)]
    pub rule_set: RuleSetKind,
    /// Optional rewrite parameters; if missing, built-in defaults are used.
    #[serde(default)]
    pub rewrite_targets: Option<RewriteTargets>,
    /// Optional reflection parameters; if missing, built-in defaults are used.
    #[serde(default)]
    pub reflection: Option<ReflectionConfig>,
    /// Optional audit quiet-period settings; if missing, built-in defaults are used.
    #[serde(default)]
    pub audit: Option<AuditSettings>,
}

impl Default for LiteConfig {
    fn default() -> Self {
        Self {
            fraction: 0.5,
            reflect: true,
            rewrite: true,
            intercept: true,
            probe_bytes: 2048,
            rule_set: RuleSetKind::Reduced,
            rewrite_targets: None,
            reflection: None,
            audit: None,
        }
    }
}

impl LiteConfig {
    /// Rejects values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.fraction > 0.0 && self.fraction <= 1.0) {
            anyhow::bail!("fraction must be in (0, 1], got {}", self.fraction);
        }
        if self.probe_bytes == 0 {
            anyhow::bail!("probe_bytes must be at least 1");
        }
        let quality = self.reflection_config().jpeg_quality;
        if !(1..=100).contains(&quality) {
            anyhow::bail!("reflection.jpeg_quality must be in 1..=100, got {}", quality);
        }
        Ok(())
    }

    pub fn rewrite_targets(&self) -> RewriteTargets {
        self.rewrite_targets.clone().unwrap_or_default()
    }

    pub fn reflection_config(&self) -> ReflectionConfig {
        self.reflection.clone().unwrap_or_default()
    }

    pub fn audit_settings(&self) -> AuditSettings {
        self.audit.clone().unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rangelite")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<LiteConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = LiteConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: LiteConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}
