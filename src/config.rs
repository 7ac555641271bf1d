use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Top-level run configuration, read from TOML.
///
/// Every section is optional; missing keys take the defaults of the typed
/// configurations they convert into.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Global RNG seed for frequency adaptation and rotation sampling.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Grouping settings.
    #[serde(default)]
    pub group: GroupToml,

    /// Univariate method settings.
    #[serde(default)]
    pub adjust: AdjustToml,

    /// Adjust-time lookup settings.
    #[serde(default)]
    pub options: OptionsToml,

    /// Quantile estimator settings.
    #[serde(default)]
    pub quantile: QuantileToml,

    /// Multivariate settings.
    #[serde(default)]
    pub mbcn: MbcnToml,
}

impl RunConfig {
    /// Parses a configuration from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("failed to parse TOML config")
    }

    /// Reads and parses a configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let toml_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&toml_str)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        debug!(path = %path.display(), "loaded run configuration");
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupToml {
    /// `"full_period"`, `"month"`, `"dayofyear"` or `"<n>day"`.
    #[serde(default = "default_group_key")]
    pub key: String,
    #[serde(default = "default_window")]
    pub window: usize,
    /// Non-time axes merged into the sample.
    #[serde(default)]
    pub pooled: Vec<String>,
}

impl Default for GroupToml {
    fn default() -> Self {
        Self {
            key: default_group_key(),
            window: default_window(),
            pooled: Vec::new(),
        }
    }
}

fn default_group_key() -> String {
    "full_period".to_string()
}
fn default_window() -> usize {
    1
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdjustToml {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_n_quantiles")]
    pub n_quantiles: usize,
    pub adapt_freq_thresh: Option<f64>,
    pub jitter_under_thresh: Option<f64>,
    pub jitter_over_thresh: Option<f64>,
    pub jitter_over_upper_bound: Option<f64>,
    #[serde(default = "default_detrend_degree")]
    pub detrend_degree: usize,
    /// Wet-day threshold; required by `loci`.
    pub loci_thresh: Option<f64>,
}

impl Default for AdjustToml {
    fn default() -> Self {
        Self {
            method: default_method(),
            kind: default_kind(),
            n_quantiles: default_n_quantiles(),
            adapt_freq_thresh: None,
            jitter_under_thresh: None,
            jitter_over_thresh: None,
            jitter_over_upper_bound: None,
            detrend_degree: default_detrend_degree(),
            loci_thresh: None,
        }
    }
}

fn default_method() -> String {
    "eqm".to_string()
}
fn default_kind() -> String {
    "additive".to_string()
}
fn default_n_quantiles() -> usize {
    20
}
fn default_detrend_degree() -> usize {
    1
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsToml {
    #[serde(default = "default_interp")]
    pub interp: String,
    #[serde(default = "default_extrapolation")]
    pub extrapolation: String,
}

impl Default for OptionsToml {
    fn default() -> Self {
        Self {
            interp: default_interp(),
            extrapolation: default_extrapolation(),
        }
    }
}

fn default_interp() -> String {
    "nearest".to_string()
}
fn default_extrapolation() -> String {
    "constant".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuantileToml {
    /// Hyndman-Fan type: 5, 6, 7, 8 or 9.
    #[serde(default = "default_quantile_type")]
    pub method: u8,
    #[serde(default = "default_backend")]
    pub backend: String,
}

impl Default for QuantileToml {
    fn default() -> Self {
        Self {
            method: default_quantile_type(),
            backend: default_backend(),
        }
    }
}

fn default_quantile_type() -> u8 {
    7
}
fn default_backend() -> String {
    "sort".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MbcnToml {
    #[serde(default = "default_n_iter")]
    pub n_iter: usize,
    /// Points in the energy score: `"all"`, `"skip"` or a count.
    #[serde(default)]
    pub n_escore: EscoreToml,
    #[serde(default = "default_variable_axis")]
    pub variable_axis: String,
    /// Base method name; its parameters come from `[adjust]`.
    #[serde(default = "default_base_method")]
    pub base: String,
    /// Base-method kind per variable; unlisted variables are additive.
    #[serde(default)]
    pub kinds: BTreeMap<String, String>,
}

impl Default for MbcnToml {
    fn default() -> Self {
        Self {
            n_iter: default_n_iter(),
            n_escore: EscoreToml::default(),
            variable_axis: default_variable_axis(),
            base: default_base_method(),
            kinds: BTreeMap::new(),
        }
    }
}

fn default_n_iter() -> usize {
    20
}
fn default_variable_axis() -> String {
    boreas_mbcn::DEFAULT_VARIABLE_AXIS.to_string()
}
fn default_base_method() -> String {
    "qdm".to_string()
}

/// Either a keyword or a point count.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EscoreToml {
    Count(usize),
    Keyword(String),
}

impl Default for EscoreToml {
    fn default() -> Self {
        EscoreToml::Keyword("all".to_string())
    }
}
