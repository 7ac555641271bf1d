//! The train → adjust lifecycle.

use boreas_group::LabeledSeries;
use tracing::info;

use crate::apply::adjust_series;
use crate::config::AdjustConfig;
use crate::error::AdjustError;
use crate::options::AdjustOptions;
use crate::params::TrainedParameters;
use crate::train::train_parameters;

/// A univariate bias adjustment, untrained until [`Adjustment::train`] runs.
///
/// Training consumes the untrained value and returns a trained one, so a
/// trained adjustment is never retrained in place. `adjust` borrows the
/// trained parameters immutably and can run from several threads at once.
///
/// ```
/// use boreas_adjust::{AdjustConfig, AdjustOptions, Adjustment, Method};
/// use boreas_group::LabeledSeries;
/// use chrono::{Days, NaiveDate};
///
/// let t0 = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
/// let times: Vec<_> = (0..5).map(|i| t0 + Days::new(i)).collect();
/// let reference = LabeledSeries::from_values(times.clone(), vec![1.0, 2.0, 3.0, 4.0, 5.0])?;
/// let hist = LabeledSeries::from_values(times, vec![2.0, 4.0, 6.0, 8.0, 10.0])?;
///
/// let scaling = Adjustment::new(AdjustConfig::new(Method::Scaling))?.train(&reference, &hist)?;
/// let out = scaling.adjust(&hist, &AdjustOptions::new())?;
/// assert_eq!(out.values().column(0).to_vec(), vec![-1.0, 1.0, 3.0, 5.0, 7.0]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    config: AdjustConfig,
    trained: Option<TrainedParameters>,
}

impl Adjustment {
    /// Creates an untrained adjustment.
    ///
    /// # Errors
    ///
    /// [`AdjustError::InvalidConfiguration`] when `config` fails validation.
    pub fn new(config: AdjustConfig) -> Result<Self, AdjustError> {
        config.validate()?;
        Ok(Self {
            config,
            trained: None,
        })
    }

    /// Rebuilds a trained adjustment from stored parameters.
    pub fn from_parameters(params: TrainedParameters) -> Self {
        let config = AdjustConfig::new(params.method().clone())
            .with_kind(params.kind())
            .with_grouper(params.grouper().clone())
            .with_engine(params.engine());
        Self {
            config,
            trained: Some(params),
        }
    }

    /// Learns the correction from `reference` to `historical`.
    ///
    /// # Errors
    ///
    /// - [`AdjustError::InvalidConfiguration`] when already trained.
    /// - [`AdjustError::ShapeMismatch`] when the two series have different
    ///   auxiliary axes or populate different groups.
    /// - [`AdjustError::DegenerateGroup`] when no group has valid data.
    /// - [`AdjustError::MissingSeed`] when frequency adaptation is configured
    ///   without a seed.
    #[tracing::instrument(skip_all, fields(method = self.config.method().name()))]
    pub fn train(
        self,
        reference: &LabeledSeries,
        historical: &LabeledSeries,
    ) -> Result<Self, AdjustError> {
        if self.trained.is_some() {
            return Err(AdjustError::InvalidConfiguration {
                reason: "adjustment is already trained".to_string(),
            });
        }
        let params = train_parameters(&self.config, reference, historical)?;
        info!(
            module = "adjust",
            groups = params.group_labels().len(),
            cells = params.n_cells(),
            arrays = params.arrays().len(),
            "trained"
        );
        Ok(Self {
            config: self.config,
            trained: Some(params),
        })
    }

    /// Applies the trained correction to `sim`.
    ///
    /// # Errors
    ///
    /// - [`AdjustError::Untrained`] before [`Adjustment::train`].
    /// - [`AdjustError::ShapeMismatch`] when `sim` has different auxiliary
    ///   axes than the training data.
    /// - [`AdjustError::Extrapolation`] with [`boreas_quantile::Extrapolation::Error`]
    ///   and a value outside a trained table.
    /// - [`AdjustError::MissingSeed`] when frequency adaptation was trained
    ///   and `options` carries no seed.
    #[tracing::instrument(skip(self, sim), fields(method = self.config.method().name()))]
    pub fn adjust(
        &self,
        sim: &LabeledSeries,
        options: &AdjustOptions,
    ) -> Result<LabeledSeries, AdjustError> {
        let params = self.trained.as_ref().ok_or(AdjustError::Untrained)?;
        adjust_series(params, sim, options)
    }

    /// The configuration.
    pub fn config(&self) -> &AdjustConfig {
        &self.config
    }

    /// The trained parameters, if any.
    pub fn parameters(&self) -> Option<&TrainedParameters> {
        self.trained.as_ref()
    }

    /// Consumes the adjustment, returning its trained parameters.
    ///
    /// # Errors
    ///
    /// [`AdjustError::Untrained`] before [`Adjustment::train`].
    pub fn into_parameters(self) -> Result<TrainedParameters, AdjustError> {
        self.trained.ok_or(AdjustError::Untrained)
    }

    /// Whether [`Adjustment::train`] has run.
    pub fn is_trained(&self) -> bool {
        self.trained.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Method;
    use chrono::{Days, NaiveDate};

    fn series(values: &[f64]) -> LabeledSeries {
        let t0 = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let times = (0..values.len() as u64).map(|i| t0 + Days::new(i)).collect();
        LabeledSeries::from_values(times, values.to_vec()).unwrap()
    }

    #[test]
    fn adjust_before_train_fails() {
        let a = Adjustment::new(AdjustConfig::new(Method::Scaling)).unwrap();
        assert!(!a.is_trained());
        let err = a.adjust(&series(&[1.0]), &AdjustOptions::new()).unwrap_err();
        assert_eq!(err, AdjustError::Untrained);
    }

    #[test]
    fn retraining_is_rejected() {
        let x = series(&[1.0, 2.0, 3.0]);
        let a = Adjustment::new(AdjustConfig::new(Method::Scaling))
            .unwrap()
            .train(&x, &x)
            .unwrap();
        assert!(matches!(
            a.train(&x, &x),
            Err(AdjustError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn from_parameters_is_trained() {
        let x = series(&[1.0, 2.0, 3.0]);
        let a = Adjustment::new(AdjustConfig::new(Method::Scaling))
            .unwrap()
            .train(&x, &x)
            .unwrap();
        let b = Adjustment::from_parameters(a.parameters().unwrap().clone());
        assert!(b.is_trained());
        assert_eq!(b.config().method(), &Method::Scaling);
    }
}
