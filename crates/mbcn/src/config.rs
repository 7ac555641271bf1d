//! MBCn configuration.

use std::collections::BTreeMap;

use boreas_adjust::{AdjustConfig, Kind, Method, QmParams};
use boreas_group::Grouper;
use boreas_quantile::{Extrapolation, Interp, QuantileEngine};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::MbcnError;
use crate::rotation::check_rotation;

/// Default name of the variable axis of a stacked multivariate series.
pub const DEFAULT_VARIABLE_AXIS: &str = "multivar";

/// How many points enter the per-iteration energy score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscoreSampling {
    /// No trace; every entry is NaN.
    Skip,
    /// Every point of the group.
    #[default]
    All,
    /// About this many points, taken at an even stride.
    Subsample(usize),
}

impl EscoreSampling {
    /// Column stride for a sample of `n` points, `None` when skipped.
    pub fn stride(self, n: usize) -> Option<usize> {
        match self {
            EscoreSampling::Skip => None,
            EscoreSampling::All | EscoreSampling::Subsample(0) => Some(1),
            EscoreSampling::Subsample(k) => Some(n.div_ceil(k).max(1)),
        }
    }
}

/// Configuration of an [`crate::Mbcn`] adjustment.
///
/// ```
/// use boreas_adjust::Kind;
/// use boreas_mbcn::{EscoreSampling, MbcnConfig};
///
/// let config = MbcnConfig::new()
///     .with_n_iter(30)
///     .with_escore(EscoreSampling::Subsample(500))
///     .with_kind("pr", Kind::Multiplicative)
///     .with_seed(42);
/// assert_eq!(config.kind_of("pr"), Kind::Multiplicative);
/// assert_eq!(config.kind_of("tasmax"), Kind::Additive);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MbcnConfig {
    n_iter: usize,
    escore: EscoreSampling,
    variable_axis: String,
    kinds: BTreeMap<String, Kind>,
    base: QmParams,
    base_method: Method,
    grouper: Grouper,
    engine: QuantileEngine,
    npdf_interp: Interp,
    npdf_extrapolation: Extrapolation,
    rotations: Option<Vec<DMatrix<f64>>>,
    seed: Option<u64>,
}

impl MbcnConfig {
    /// Creates a configuration with defaults: 20 iterations, escore on all
    /// points, variable axis `"multivar"`, additive kinds, 20 quantile
    /// levels, QDM as the base method, full-period grouping, nearest/constant
    /// npdf lookups, sampled rotations, no seed.
    pub fn new() -> Self {
        Self {
            n_iter: 20,
            escore: EscoreSampling::All,
            variable_axis: DEFAULT_VARIABLE_AXIS.to_string(),
            kinds: BTreeMap::new(),
            base: QmParams::default(),
            base_method: Method::Qdm(QmParams::default()),
            grouper: Grouper::full_period(),
            engine: QuantileEngine::new(),
            npdf_interp: Interp::Nearest,
            npdf_extrapolation: Extrapolation::Constant,
            rotations: None,
            seed: None,
        }
    }

    /// Sets the number of rotation iterations.
    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    /// Sets the energy-score sampling.
    pub fn with_escore(mut self, escore: EscoreSampling) -> Self {
        self.escore = escore;
        self
    }

    /// Sets the name of the variable axis.
    pub fn with_variable_axis(mut self, name: impl Into<String>) -> Self {
        self.variable_axis = name.into();
        self
    }

    /// Sets the base-method kind for one variable.
    pub fn with_kind(mut self, variable: impl Into<String>, kind: Kind) -> Self {
        self.kinds.insert(variable.into(), kind);
        self
    }

    /// Sets the quantile levels (and optional jitter or frequency
    /// adaptation) used by both the base method and the npdf transform.
    pub fn with_base(mut self, base: QmParams) -> Self {
        self.base_method = self.base_method.with_qm_params(base.clone());
        self.base = base;
        self
    }

    /// Sets the univariate method run per variable before reordering. A
    /// quantile method also sets the npdf levels from its parameters.
    pub fn with_base_method(mut self, method: Method) -> Self {
        if let Some(params) = method.qm_params() {
            self.base = params.clone();
        }
        self.base_method = method;
        self
    }

    /// Sets the grouping. Pooling is rejected by [`MbcnConfig::validate`].
    pub fn with_grouper(mut self, grouper: Grouper) -> Self {
        self.grouper = grouper;
        self
    }

    /// Sets the quantile estimator.
    pub fn with_engine(mut self, engine: QuantileEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Sets the lookups used inside the npdf transform.
    pub fn with_npdf_lookup(mut self, interp: Interp, extrapolation: Extrapolation) -> Self {
        self.npdf_interp = interp;
        self.npdf_extrapolation = extrapolation;
        self
    }

    /// Supplies the rotations instead of sampling them; also sets the
    /// iteration count.
    pub fn with_rotations(mut self, rotations: Vec<DMatrix<f64>>) -> Self {
        self.n_iter = rotations.len();
        self.rotations = Some(rotations);
        self
    }

    /// Sets the seed for rotation sampling and frequency adaptation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Number of iterations.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Energy-score sampling.
    pub fn escore(&self) -> EscoreSampling {
        self.escore
    }

    /// Name of the variable axis.
    pub fn variable_axis(&self) -> &str {
        &self.variable_axis
    }

    /// Base-method kind of `variable`, additive unless set.
    pub fn kind_of(&self, variable: &str) -> Kind {
        self.kinds.get(variable).copied().unwrap_or_default()
    }

    /// Base quantile-mapping parameters.
    pub fn base(&self) -> &QmParams {
        &self.base
    }

    /// Univariate method run per variable.
    pub fn base_method(&self) -> &Method {
        &self.base_method
    }

    /// Grouping.
    pub fn grouper(&self) -> &Grouper {
        &self.grouper
    }

    /// Quantile estimator.
    pub fn engine(&self) -> QuantileEngine {
        self.engine
    }

    /// Interpolation inside the npdf transform.
    pub fn npdf_interp(&self) -> Interp {
        self.npdf_interp
    }

    /// Extrapolation inside the npdf transform.
    pub fn npdf_extrapolation(&self) -> Extrapolation {
        self.npdf_extrapolation
    }

    /// Supplied rotations, if any.
    pub fn rotations(&self) -> Option<&[DMatrix<f64>]> {
        self.rotations.as_deref()
    }

    /// Seed.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Validates what can be checked without data.
    ///
    /// # Errors
    ///
    /// Invalid configuration for zero iterations, an empty variable axis
    /// name, pooled axes, or a base method that fails
    /// [`AdjustConfig::validate`] for one of the kinds;
    /// [`MbcnError::InvalidRotation`] for a supplied matrix that is not
    /// square and orthonormal.
    pub fn validate(&self) -> Result<(), MbcnError> {
        if self.n_iter == 0 {
            return Err(MbcnError::config("n_iter must be at least 1"));
        }
        if self.variable_axis.is_empty() {
            return Err(MbcnError::config("variable_axis must not be empty"));
        }
        if !self.grouper.pooled().is_empty() {
            return Err(MbcnError::config(format!(
                "pooling {:?} is not supported by MBCn",
                self.grouper.pooled()
            )));
        }
        let kinds = self.kinds.values().copied().chain([Kind::Additive]);
        for kind in kinds {
            AdjustConfig::new(self.base_method.clone())
                .with_kind(kind)
                .validate()?;
        }
        if let Some(rots) = &self.rotations {
            for (i, r) in rots.iter().enumerate() {
                check_rotation(i, r, r.nrows())?;
            }
        }
        Ok(())
    }
}

impl Default for MbcnConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let c = MbcnConfig::new();
        assert_eq!(c.n_iter(), 20);
        assert_eq!(c.variable_axis(), "multivar");
        assert_eq!(c.escore(), EscoreSampling::All);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn pooling_is_rejected() {
        let c = MbcnConfig::new().with_grouper(Grouper::full_period().with_pooled(["location"]));
        assert!(c.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        assert!(MbcnConfig::new().with_n_iter(0).validate().is_err());
    }

    #[test]
    fn supplied_rotations_set_iterations() {
        let c = MbcnConfig::new().with_rotations(vec![DMatrix::identity(2, 2); 3]);
        assert_eq!(c.n_iter(), 3);
        assert!(c.validate().is_ok());
        let bad = MbcnConfig::new().with_rotations(vec![DMatrix::from_element(2, 2, 1.0)]);
        assert!(matches!(bad.validate(), Err(MbcnError::InvalidRotation { index: 0, .. })));
    }

    #[test]
    fn base_method_follows_base_params() {
        let levels = boreas_quantile::QuantileLevels::equally_spaced(7).unwrap();
        let c = MbcnConfig::new()
            .with_base_method(Method::Eqm(QmParams::default()))
            .with_base(QmParams::new(levels));
        assert_eq!(c.base_method().name(), "eqm");
        assert_eq!(c.base_method().qm_params().map(|p| p.quantiles.len()), Some(7));
        assert_eq!(c.base().quantiles.len(), 7);

        let bad = MbcnConfig::new().with_base(QmParams::default().with_jitter_over(5.0, 1.0));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn escore_strides() {
        assert_eq!(EscoreSampling::Skip.stride(100), None);
        assert_eq!(EscoreSampling::All.stride(100), Some(1));
        assert_eq!(EscoreSampling::Subsample(30).stride(100), Some(4));
        assert_eq!(EscoreSampling::Subsample(500).stride(100), Some(1));
    }
}
