//! Pure conversion functions: TOML config structs -> crate API config types.

use anyhow::{Context, Result, bail};

use crate::config::*;

use boreas_adjust::{AdjustConfig, AdjustOptions, Kind, Method, QmParams};
use boreas_group::{GroupKey, Grouper};
use boreas_mbcn::{EscoreSampling, MbcnConfig};
use boreas_quantile::{
    Extrapolation, Interp, QuantileBackend, QuantileEngine, QuantileLevels, QuantileMethod,
};

/// Parses a group key: `full_period` (or `none`), `month`, `dayofyear`, or
/// `<n>day` for bins of `n` days.
pub fn parse_group_key(s: &str) -> Result<GroupKey> {
    let s = s.to_lowercase();
    match s.as_str() {
        "full_period" | "none" => Ok(GroupKey::FullPeriod),
        "month" => Ok(GroupKey::Month),
        "dayofyear" => Ok(GroupKey::DayOfYear),
        other => match other.strip_suffix("day").map(str::parse::<u16>) {
            Some(Ok(n)) if n > 0 => Ok(GroupKey::NDayBin(n)),
            _ => bail!("unknown group key: {other:?}"),
        },
    }
}

/// Parses a correction kind: `additive` (`+`) or `multiplicative` (`*`).
pub fn parse_kind(s: &str) -> Result<Kind> {
    match s.to_lowercase().as_str() {
        "additive" | "+" => Ok(Kind::Additive),
        "multiplicative" | "*" => Ok(Kind::Multiplicative),
        other => bail!("unknown kind: {other:?}"),
    }
}

/// Parses a table lookup name.
pub fn parse_interp(s: &str) -> Result<Interp> {
    match s.to_lowercase().as_str() {
        "nearest" => Ok(Interp::Nearest),
        "linear" => Ok(Interp::Linear),
        other => bail!("unknown interpolation: {other:?}"),
    }
}

/// Parses an extrapolation policy name.
pub fn parse_extrapolation(s: &str) -> Result<Extrapolation> {
    match s.to_lowercase().as_str() {
        "constant" => Ok(Extrapolation::Constant),
        "nan" => Ok(Extrapolation::Nan),
        "error" => Ok(Extrapolation::Error),
        other => bail!("unknown extrapolation: {other:?}"),
    }
}

/// Maps a Hyndman-Fan type number to the estimator.
pub fn parse_quantile_method(t: u8) -> Result<QuantileMethod> {
    match t {
        5 => Ok(QuantileMethod::Hazen),
        6 => Ok(QuantileMethod::Weibull),
        7 => Ok(QuantileMethod::Linear),
        8 => Ok(QuantileMethod::MedianUnbiased),
        9 => Ok(QuantileMethod::NormalUnbiased),
        other => bail!("unsupported quantile type: {other} (expected 5-9)"),
    }
}

/// Parses a quantile back-end name.
pub fn parse_backend(s: &str) -> Result<QuantileBackend> {
    match s.to_lowercase().as_str() {
        "sort" => Ok(QuantileBackend::Sort),
        "select" => Ok(QuantileBackend::Select),
        other => bail!("unknown quantile backend: {other:?}"),
    }
}

/// Converts the energy-score setting.
pub fn parse_escore(e: &EscoreToml) -> Result<EscoreSampling> {
    match e {
        EscoreToml::Count(n) => Ok(EscoreSampling::Subsample(*n)),
        EscoreToml::Keyword(k) => match k.to_lowercase().as_str() {
            "all" => Ok(EscoreSampling::All),
            "skip" => Ok(EscoreSampling::Skip),
            other => bail!("unknown n_escore: {other:?}"),
        },
    }
}

/// Builds a [`Grouper`] from the `[group]` section.
pub fn build_grouper(group: &GroupToml) -> Result<Grouper> {
    let key = parse_group_key(&group.key)?;
    let grouper = Grouper::new(key, group.window)
        .with_context(|| format!("invalid [group] section (key {:?})", group.key))?;
    Ok(grouper.with_pooled(group.pooled.iter()))
}

/// Builds a [`QuantileEngine`] from the `[quantile]` section.
pub fn build_engine(quantile: &QuantileToml) -> Result<QuantileEngine> {
    Ok(QuantileEngine::new()
        .with_method(parse_quantile_method(quantile.method)?)
        .with_backend(parse_backend(&quantile.backend)?))
}

/// Builds the shared quantile-mapping parameters from the `[adjust]` section.
///
/// Jitter bounds are passed through as given; [`AdjustConfig::validate`]
/// rejects an over-threshold jitter without its upper bound.
pub fn build_qm_params(adjust: &AdjustToml) -> Result<QmParams> {
    let levels = QuantileLevels::equally_spaced(adjust.n_quantiles)
        .context("invalid adjust.n_quantiles")?;
    let mut params = QmParams::new(levels);
    params.adapt_freq_thresh = adjust.adapt_freq_thresh;
    params.jitter_under_thresh = adjust.jitter_under_thresh;
    params.jitter_over_thresh = adjust.jitter_over_thresh;
    params.jitter_over_upper_bound = adjust.jitter_over_upper_bound;
    Ok(params)
}

/// Parses the method name of the `[adjust]` section.
pub fn build_method(adjust: &AdjustToml) -> Result<Method> {
    build_named_method(&adjust.method, adjust)
}

/// Builds method `name` with its parameters taken from `[adjust]`.
pub fn build_named_method(name: &str, adjust: &AdjustToml) -> Result<Method> {
    match name.to_lowercase().as_str() {
        "scaling" => Ok(Method::Scaling),
        "eqm" => Ok(Method::Eqm(build_qm_params(adjust)?)),
        "qdm" => Ok(Method::Qdm(build_qm_params(adjust)?)),
        "dqm" => Ok(Method::Dqm {
            params: build_qm_params(adjust)?,
            detrend_degree: adjust.detrend_degree,
        }),
        "loci" => match adjust.loci_thresh {
            Some(thresh) => Ok(Method::Loci { thresh }),
            None => bail!("method \"loci\" needs adjust.loci_thresh"),
        },
        other => bail!("unknown method: {other:?}"),
    }
}

/// Builds a validated [`AdjustConfig`] for the univariate methods.
pub fn build_adjust_config(cfg: &RunConfig) -> Result<AdjustConfig> {
    let mut config = AdjustConfig::new(build_method(&cfg.adjust)?)
        .with_kind(parse_kind(&cfg.adjust.kind)?)
        .with_grouper(build_grouper(&cfg.group)?)
        .with_engine(build_engine(&cfg.quantile)?);
    if let Some(seed) = cfg.seed {
        config = config.with_seed(seed);
    }
    config.validate().context("invalid adjustment configuration")?;
    Ok(config)
}

/// Builds the adjust-time [`AdjustOptions`].
pub fn build_adjust_options(cfg: &RunConfig) -> Result<AdjustOptions> {
    let mut options = AdjustOptions::new()
        .with_interp(parse_interp(&cfg.options.interp)?)
        .with_extrapolation(parse_extrapolation(&cfg.options.extrapolation)?);
    if let Some(seed) = cfg.seed {
        options = options.with_seed(seed);
    }
    Ok(options)
}

/// Builds a validated [`MbcnConfig`].
///
/// The base method is named by `[mbcn] base` and takes its parameters from
/// `[adjust]`; the `[adjust]` method and kind are not used.
pub fn build_mbcn_config(cfg: &RunConfig) -> Result<MbcnConfig> {
    let base = build_named_method(&cfg.mbcn.base, &cfg.adjust).context("invalid mbcn.base")?;
    let mut config = MbcnConfig::new()
        .with_n_iter(cfg.mbcn.n_iter)
        .with_escore(parse_escore(&cfg.mbcn.n_escore)?)
        .with_variable_axis(&cfg.mbcn.variable_axis)
        .with_base(build_qm_params(&cfg.adjust)?)
        .with_base_method(base)
        .with_grouper(build_grouper(&cfg.group)?)
        .with_engine(build_engine(&cfg.quantile)?);
    for (variable, kind) in &cfg.mbcn.kinds {
        let kind = parse_kind(kind).with_context(|| format!("mbcn.kinds.{variable}"))?;
        config = config.with_kind(variable, kind);
    }
    if let Some(seed) = cfg.seed {
        config = config.with_seed(seed);
    }
    config.validate().context("invalid MBCn configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_keys() {
        assert_eq!(parse_group_key("Month").unwrap(), GroupKey::Month);
        assert_eq!(parse_group_key("none").unwrap(), GroupKey::FullPeriod);
        assert_eq!(parse_group_key("5day").unwrap(), GroupKey::NDayBin(5));
        assert!(parse_group_key("0day").is_err());
        assert!(parse_group_key("season").is_err());
    }

    #[test]
    fn quantile_types() {
        assert_eq!(parse_quantile_method(8).unwrap(), QuantileMethod::MedianUnbiased);
        assert!(parse_quantile_method(4).is_err());
    }

    #[test]
    fn kinds_accept_symbols() {
        assert_eq!(parse_kind("*").unwrap(), Kind::Multiplicative);
        assert_eq!(parse_kind("Additive").unwrap(), Kind::Additive);
        assert!(parse_kind("log").is_err());
    }

    #[test]
    fn escore_keywords() {
        assert_eq!(
            parse_escore(&EscoreToml::Count(10)).unwrap(),
            EscoreSampling::Subsample(10)
        );
        assert_eq!(
            parse_escore(&EscoreToml::Keyword("skip".into())).unwrap(),
            EscoreSampling::Skip
        );
        assert!(parse_escore(&EscoreToml::Keyword("some".into())).is_err());
    }

    #[test]
    fn default_run_builds_eqm() {
        let cfg = RunConfig::default();
        let adjust = build_adjust_config(&cfg).unwrap();
        assert_eq!(adjust.method().name(), "eqm");
        assert_eq!(adjust.kind(), Kind::Additive);
        assert_eq!(adjust.grouper().n_groups(), 1);
    }

    #[test]
    fn unknown_method_is_named() {
        let mut cfg = RunConfig::default();
        cfg.adjust.method = "isimip".to_string();
        let err = build_adjust_config(&cfg).unwrap_err();
        assert!(format!("{err}").contains("isimip"));
    }

    #[test]
    fn loci_needs_a_threshold() {
        let mut cfg = RunConfig::default();
        cfg.adjust.method = "loci".to_string();
        let err = build_adjust_config(&cfg).unwrap_err();
        assert!(format!("{err}").contains("loci_thresh"));
        cfg.adjust.loci_thresh = Some(0.1);
        assert_eq!(build_adjust_config(&cfg).unwrap().method(), &Method::Loci { thresh: 0.1 });
    }

    #[test]
    fn jitter_settings_reach_the_method() {
        let mut cfg = RunConfig::default();
        cfg.seed = Some(1);
        cfg.adjust.jitter_under_thresh = Some(0.01);
        cfg.adjust.jitter_over_thresh = Some(100.0);
        let err = build_adjust_config(&cfg).unwrap_err();
        assert!(format!("{err:#}").contains("set together"));
        cfg.adjust.jitter_over_upper_bound = Some(120.0);
        let params = build_adjust_config(&cfg).unwrap().method().qm_params().cloned().unwrap();
        assert_eq!(params.jitter_under_thresh, Some(0.01));
        assert_eq!(params.jitter_over_upper_bound, Some(120.0));
    }

    #[test]
    fn mbcn_base_method_is_configurable() {
        let mut cfg = RunConfig::default();
        cfg.seed = Some(2);
        assert_eq!(build_mbcn_config(&cfg).unwrap().base_method().name(), "qdm");
        cfg.mbcn.base = "eqm".to_string();
        cfg.adjust.n_quantiles = 10;
        let mbcn = build_mbcn_config(&cfg).unwrap();
        assert_eq!(mbcn.base_method().name(), "eqm");
        assert_eq!(mbcn.base().quantiles.len(), 10);
        cfg.mbcn.base = "bogus".to_string();
        assert!(build_mbcn_config(&cfg).is_err());
    }

    #[test]
    fn window_on_full_period_is_rejected() {
        let mut cfg = RunConfig::default();
        cfg.group.window = 31;
        assert!(build_adjust_config(&cfg).is_err());
    }
}
