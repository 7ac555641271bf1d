//! Method and training configuration.

use boreas_group::Grouper;
use boreas_quantile::{QuantileEngine, QuantileLevels};
use serde::{Deserialize, Serialize};

use crate::error::AdjustError;
use crate::kind::Kind;

/// Parameters shared by the quantile-mapping methods.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QmParams {
    /// Quantile levels of the trained tables.
    pub quantiles: QuantileLevels,
    /// Threshold below which values count as the "dry" class; enables
    /// frequency adaptation when set.
    #[serde(default)]
    pub adapt_freq_thresh: Option<f64>,
    /// Historical values below this are replaced by noise in `(0, thresh)`
    /// before estimation.
    #[serde(default)]
    pub jitter_under_thresh: Option<f64>,
    /// Historical values at or above this are replaced by noise up to
    /// `jitter_over_upper_bound`. Both or neither must be set.
    #[serde(default)]
    pub jitter_over_thresh: Option<f64>,
    /// Upper bound of the over-threshold noise.
    #[serde(default)]
    pub jitter_over_upper_bound: Option<f64>,
}

impl QmParams {
    /// Creates parameters with the given levels, no jitter and no frequency
    /// adaptation.
    pub fn new(quantiles: QuantileLevels) -> Self {
        Self {
            quantiles,
            ..Self::default()
        }
    }

    /// Enables frequency adaptation below `thresh`.
    pub fn with_adapt_freq(mut self, thresh: f64) -> Self {
        self.adapt_freq_thresh = Some(thresh);
        self
    }

    /// Jitters historical values below `thresh` during training.
    pub fn with_jitter_under(mut self, thresh: f64) -> Self {
        self.jitter_under_thresh = Some(thresh);
        self
    }

    /// Jitters historical values in `[thresh, upper_bound)` during training.
    pub fn with_jitter_over(mut self, thresh: f64, upper_bound: f64) -> Self {
        self.jitter_over_thresh = Some(thresh);
        self.jitter_over_upper_bound = Some(upper_bound);
        self
    }

    /// Whether training draws random numbers.
    pub fn is_randomised(&self) -> bool {
        self.adapt_freq_thresh.is_some()
            || self.jitter_under_thresh.is_some()
            || self.jitter_over_thresh.is_some()
    }

    fn validate(&self, kind: Kind) -> Result<(), AdjustError> {
        if let Some(t) = self.adapt_freq_thresh {
            if !t.is_finite() {
                return Err(invalid(format!("adapt_freq_thresh must be finite, got {t}")));
            }
            if kind == Kind::Multiplicative && t < 0.0 {
                return Err(invalid(format!(
                    "adapt_freq_thresh must be >= 0 for multiplicative kind, got {t}"
                )));
            }
        }
        if let Some(t) = self.jitter_under_thresh {
            if !(t.is_finite() && t > 0.0) {
                return Err(invalid(format!("jitter_under_thresh must be positive, got {t}")));
            }
        }
        match (self.jitter_over_thresh, self.jitter_over_upper_bound) {
            (None, None) => Ok(()),
            (Some(t), Some(u)) if t.is_finite() && u.is_finite() && t < u => Ok(()),
            (Some(t), Some(u)) => Err(invalid(format!(
                "jitter_over_thresh must be below jitter_over_upper_bound, got {t} and {u}"
            ))),
            _ => Err(invalid(
                "jitter_over_thresh and jitter_over_upper_bound must be set together".to_string(),
            )),
        }
    }
}

fn invalid(reason: String) -> AdjustError {
    AdjustError::InvalidConfiguration { reason }
}

/// Univariate adjustment method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Method {
    /// One location factor per group.
    Scaling,
    /// Empirical quantile mapping: factors read at the value's position on
    /// the historical quantiles.
    Eqm(QmParams),
    /// Quantile delta mapping: factors read at the value's rank within the
    /// simulation itself.
    Qdm(QmParams),
    /// Detrended quantile mapping: mean scaling, then quantile mapping of
    /// the anomalies around a polynomial trend.
    Dqm {
        /// Shared quantile-mapping parameters.
        params: QmParams,
        /// Degree of the trend polynomial.
        detrend_degree: usize,
    },
    /// Local intensity scaling: values above the wet-day threshold are
    /// scaled so the mean wet intensity matches the reference. Output is
    /// clipped at zero. The correction kind does not apply.
    Loci {
        /// Wet-day threshold in reference units.
        thresh: f64,
    },
}

impl Method {
    /// Short identifier stored with trained parameters.
    pub fn name(&self) -> &'static str {
        match self {
            Method::Scaling => "scaling",
            Method::Eqm(_) => "eqm",
            Method::Qdm(_) => "qdm",
            Method::Dqm { .. } => "dqm",
            Method::Loci { .. } => "loci",
        }
    }

    /// Quantile-mapping parameters, if the method has any.
    pub fn qm_params(&self) -> Option<&QmParams> {
        match self {
            Method::Scaling | Method::Loci { .. } => None,
            Method::Eqm(p) | Method::Qdm(p) => Some(p),
            Method::Dqm { params, .. } => Some(params),
        }
    }

    /// Frequency-adaptation threshold, if enabled.
    pub fn adapt_freq_thresh(&self) -> Option<f64> {
        self.qm_params().and_then(|p| p.adapt_freq_thresh)
    }

    /// Replaces the quantile-mapping parameters of the methods that have
    /// them; other methods are returned unchanged.
    pub fn with_qm_params(self, params: QmParams) -> Self {
        match self {
            Method::Eqm(_) => Method::Eqm(params),
            Method::Qdm(_) => Method::Qdm(params),
            Method::Dqm { detrend_degree, .. } => Method::Dqm {
                params,
                detrend_degree,
            },
            other => other,
        }
    }
}

/// Everything `train` needs besides the data.
///
/// # Example
///
/// ```
/// use boreas_adjust::{AdjustConfig, Kind, Method, QmParams};
/// use boreas_group::{GroupKey, Grouper};
///
/// let config = AdjustConfig::new(Method::Qdm(QmParams::default()))
///     .with_kind(Kind::Multiplicative)
///     .with_grouper(Grouper::new(GroupKey::DayOfYear, 31)?)
///     .with_seed(7);
/// assert!(config.validate().is_ok());
/// # Ok::<(), boreas_group::GroupError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustConfig {
    method: Method,
    kind: Kind,
    grouper: Grouper,
    engine: QuantileEngine,
    seed: Option<u64>,
}

impl AdjustConfig {
    /// Creates a configuration with defaults: `kind = Additive`, full-period
    /// grouping, type-7 quantiles, no seed.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            kind: Kind::Additive,
            grouper: Grouper::full_period(),
            engine: QuantileEngine::new(),
            seed: None,
        }
    }

    /// Sets the correction kind.
    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the grouping.
    pub fn with_grouper(mut self, grouper: Grouper) -> Self {
        self.grouper = grouper;
        self
    }

    /// Sets the quantile estimator.
    pub fn with_engine(mut self, engine: QuantileEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Sets the seed for randomised training steps.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Returns the method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the correction kind.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Returns the grouping.
    pub fn grouper(&self) -> &Grouper {
        &self.grouper
    }

    /// Returns the quantile estimator.
    pub fn engine(&self) -> QuantileEngine {
        self.engine
    }

    /// Returns the training seed.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Validates parameter combinations.
    ///
    /// # Errors
    ///
    /// [`AdjustError::InvalidConfiguration`] for:
    /// - a non-finite frequency-adaptation threshold, or a negative one with
    ///   the multiplicative kind
    /// - a non-positive under-threshold jitter
    /// - an over-threshold jitter missing its bound, or with the bound below
    ///   the threshold
    /// - a trend degree above 5
    /// - a non-finite LOCI threshold
    pub fn validate(&self) -> Result<(), AdjustError> {
        if let Some(params) = self.method.qm_params() {
            params.validate(self.kind)?;
        }
        match self.method {
            Method::Dqm { detrend_degree, .. } if detrend_degree > MAX_DETREND_DEGREE => {
                Err(invalid(format!(
                    "detrend_degree must be <= {MAX_DETREND_DEGREE}, got {detrend_degree}"
                )))
            }
            Method::Loci { thresh } if !thresh.is_finite() => {
                Err(invalid(format!("LOCI threshold must be finite, got {thresh}")))
            }
            _ => Ok(()),
        }
    }
}

/// Highest accepted trend degree for detrended quantile mapping.
pub const MAX_DETREND_DEGREE: usize = 5;
