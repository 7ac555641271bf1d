use approx::assert_relative_eq;
use boreas_adjust::{AdjustConfig, AdjustError, AdjustOptions, Adjustment, Method, QmParams};
use boreas_group::{GroupKey, Grouper, LabeledSeries};
use boreas_mbcn::{EscoreSampling, Mbcn, MbcnConfig, MbcnError, MbcnParameters};
use boreas_stats::rank_fraction;
use chrono::{Datelike, Days, NaiveDate};
use nalgebra::DMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

const N: usize = 730;

fn times() -> Vec<NaiveDate> {
    let t0 = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap();
    (0..N as u64).map(|i| t0 + Days::new(i)).collect()
}

/// Two variables with correlation `rho`, means `mu` and spread `sd`.
fn stacked(rho: f64, mu: (f64, f64), sd: f64, seed: u64) -> LabeledSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let z = Normal::new(0.0, 1.0).unwrap();
    let (mut a, mut b) = (Vec::with_capacity(N), Vec::with_capacity(N));
    for _ in 0..N {
        let u: f64 = z.sample(&mut rng);
        let w: f64 = z.sample(&mut rng);
        a.push(mu.0 + sd * u);
        b.push(mu.1 + sd * (rho * u + (1.0 - rho * rho).sqrt() * w));
    }
    let tas = LabeledSeries::from_values(times(), a).unwrap();
    let pr = LabeledSeries::from_values(times(), b).unwrap();
    let parts = [("tas".to_string(), tas), ("pr".to_string(), pr)];
    LabeledSeries::stack("multivar", &parts).unwrap()
}

fn spearman(s: &LabeledSeries) -> f64 {
    let ra = rank_fraction(&s.values().column(0).to_vec());
    let rb = rank_fraction(&s.values().column(1).to_vec());
    let ma = ra.iter().sum::<f64>() / ra.len() as f64;
    let mb = rb.iter().sum::<f64>() / rb.len() as f64;
    let cov: f64 = ra.iter().zip(&rb).map(|(x, y)| (x - ma) * (y - mb)).sum();
    let va: f64 = ra.iter().map(|x| (x - ma).powi(2)).sum();
    let vb: f64 = rb.iter().map(|y| (y - mb).powi(2)).sum();
    cov / (va * vb).sqrt()
}

fn sorted(v: Vec<f64>) -> Vec<f64> {
    let mut v = v;
    v.sort_by(f64::total_cmp);
    v
}

fn trained(seed: u64) -> (Mbcn, LabeledSeries, LabeledSeries) {
    let reference = stacked(0.8, (10.0, 5.0), 1.0, 100);
    let hist = stacked(0.0, (8.0, 3.0), 2.0, 200);
    let config = MbcnConfig::new()
        .with_n_iter(30)
        .with_escore(EscoreSampling::Subsample(200))
        .with_seed(seed);
    let m = Mbcn::new(config).unwrap().train(&reference, &hist).unwrap();
    (m, reference, hist)
}

#[test]
fn marginals_are_the_base_qdm_ones() {
    let (m, reference, hist) = trained(1);
    let out = m.adjust(&hist, &AdjustOptions::new()).unwrap();
    assert_eq!(out.axes(), hist.axes());

    let parts = reference.unstack("multivar").unwrap();
    let hist_parts = hist.unstack("multivar").unwrap();
    for (v, ((_, r), (_, h))) in parts.iter().zip(&hist_parts).enumerate() {
        let qdm = Adjustment::new(AdjustConfig::new(Method::Qdm(QmParams::default())))
            .unwrap()
            .train(r, h)
            .unwrap()
            .adjust(h, &AdjustOptions::new())
            .unwrap();
        assert_eq!(
            sorted(out.values().column(v).to_vec()),
            sorted(qdm.values().column(0).to_vec())
        );
    }
}

#[test]
fn dependence_follows_the_reference() {
    let (m, reference, hist) = trained(2);
    let out = m.adjust(&hist, &AdjustOptions::new()).unwrap();
    assert!(spearman(&hist).abs() < 0.2);
    assert!(spearman(&reference) > 0.7);
    assert!(spearman(&out) > 0.5, "spearman {}", spearman(&out));
}

#[test]
fn escore_trends_down_over_seeded_runs() {
    let mut decreasing = 0;
    for seed in 0..5 {
        let (m, _, _) = trained(seed);
        let trace = m.parameters().unwrap().escores(0, 0).to_vec();
        assert_eq!(trace.len(), 30);
        assert!(trace.iter().all(|e| e.is_finite() && *e >= 0.0));
        if trace[trace.len() - 1] < trace[0] {
            decreasing += 1;
        }
    }
    assert!(decreasing >= 4, "only {decreasing} of 5 runs decreased");
}

#[test]
fn sampling_rotations_needs_a_seed() {
    let reference = stacked(0.8, (10.0, 5.0), 1.0, 1);
    let err = Mbcn::new(MbcnConfig::new())
        .unwrap()
        .train(&reference, &reference)
        .unwrap_err();
    assert!(matches!(err, MbcnError::Adjust(AdjustError::MissingSeed { .. })));
}

#[test]
fn supplied_rotations_are_checked_against_variables() {
    let reference = stacked(0.8, (10.0, 5.0), 1.0, 1);
    let err = Mbcn::new(MbcnConfig::new().with_rotations(vec![DMatrix::identity(3, 3)]))
        .unwrap()
        .train(&reference, &reference)
        .unwrap_err();
    assert!(matches!(err, MbcnError::InvalidRotation { index: 0, .. }));

    let ok = Mbcn::new(MbcnConfig::new().with_rotations(vec![DMatrix::identity(2, 2); 2]))
        .unwrap()
        .train(&reference, &reference)
        .unwrap();
    assert_eq!(ok.parameters().unwrap().n_iter(), 2);
}

#[test]
fn pooling_and_untrained_are_rejected() {
    let pooled = MbcnConfig::new().with_grouper(Grouper::full_period().with_pooled(["multivar"]));
    assert!(Mbcn::new(pooled).is_err());

    let m = Mbcn::new(MbcnConfig::new().with_seed(1)).unwrap();
    let reference = stacked(0.8, (10.0, 5.0), 1.0, 1);
    assert!(matches!(
        m.adjust(&reference, &AdjustOptions::new()),
        Err(MbcnError::Adjust(AdjustError::Untrained))
    ));
}

#[test]
fn variable_axis_must_lead_and_match() {
    let (m, _, hist) = trained(3);
    let flat = hist.unstack("multivar").unwrap().remove(0).1;
    assert!(matches!(
        m.adjust(&flat, &AdjustOptions::new()),
        Err(MbcnError::VariableAxis { .. })
    ));

    let parts = hist.unstack("multivar").unwrap();
    let renamed: Vec<(String, LabeledSeries)> = parts
        .into_iter()
        .zip(["tasmax", "pr"])
        .map(|((_, s), n)| (n.to_string(), s))
        .collect();
    let other = LabeledSeries::stack("multivar", &renamed).unwrap();
    assert!(matches!(
        m.adjust(&other, &AdjustOptions::new()),
        Err(MbcnError::VariableAxis { .. })
    ));
}

#[test]
fn parameters_survive_json() {
    let (m, _, hist) = trained(4);
    let params = m.parameters().unwrap();
    let restored = MbcnParameters::from_json(&params.to_json().unwrap()).unwrap();
    assert_eq!(restored.variables(), params.variables());
    assert_eq!(restored.n_iter(), params.n_iter());

    let a = m.adjust(&hist, &AdjustOptions::new()).unwrap();
    let b = Mbcn::from_parameters(restored).adjust(&hist, &AdjustOptions::new()).unwrap();
    for (x, y) in a.values().iter().zip(b.values().iter()) {
        assert_relative_eq!(*x, *y, max_relative = 1e-9);
    }
}

/// Standalone adjustment of every variable with `config`, in axis order.
fn univariate(
    config: &AdjustConfig,
    reference: &LabeledSeries,
    hist: &LabeledSeries,
) -> Vec<Vec<f64>> {
    let parts = reference.unstack("multivar").unwrap();
    let hist_parts = hist.unstack("multivar").unwrap();
    parts
        .iter()
        .zip(&hist_parts)
        .map(|((_, r), (_, h))| {
            let out = Adjustment::new(config.clone())
                .unwrap()
                .train(r, h)
                .unwrap()
                .adjust(h, &AdjustOptions::new())
                .unwrap();
            out.values().column(0).to_vec()
        })
        .collect()
}

#[test]
fn base_method_is_configurable() {
    let reference = stacked(0.8, (10.0, 5.0), 1.0, 100);
    let hist = stacked(0.0, (8.0, 3.0), 2.0, 200);
    let config = MbcnConfig::new()
        .with_n_iter(10)
        .with_base_method(Method::Eqm(QmParams::default()))
        .with_seed(6);
    let m = Mbcn::new(config).unwrap().train(&reference, &hist).unwrap();
    let params = m.parameters().unwrap();
    assert_eq!(params.base_method().map(Method::name), Some("eqm"));

    let out = m.adjust(&hist, &AdjustOptions::new()).unwrap();
    let eqm = univariate(&AdjustConfig::new(Method::Eqm(QmParams::default())), &reference, &hist);
    for (v, expected) in eqm.into_iter().enumerate() {
        assert_eq!(sorted(out.values().column(v).to_vec()), sorted(expected));
    }

    let restored = Mbcn::from_parameters(params.clone());
    assert_eq!(restored.config().base_method().name(), "eqm");
    assert_eq!(restored.adjust(&hist, &AdjustOptions::new()).unwrap(), out);
}

#[test]
fn windowed_months_keep_their_own_marginals() {
    let reference = stacked(0.8, (10.0, 5.0), 1.0, 300);
    let hist = stacked(0.0, (8.0, 3.0), 2.0, 400);
    let grouper = Grouper::new(GroupKey::Month, 3).unwrap();
    let config = MbcnConfig::new()
        .with_n_iter(10)
        .with_escore(EscoreSampling::Subsample(200))
        .with_grouper(grouper.clone())
        .with_seed(8);
    let m = Mbcn::new(config).unwrap().train(&reference, &hist).unwrap();
    let out = m.adjust(&hist, &AdjustOptions::new()).unwrap();
    assert!(out.values().iter().all(|v| !v.is_nan()));

    let qdm = AdjustConfig::new(Method::Qdm(QmParams::default())).with_grouper(grouper);
    let expected = univariate(&qdm, &reference, &hist);
    let months: Vec<u32> = times().iter().map(|t| t.month()).collect();
    for (v, qdm_values) in expected.iter().enumerate() {
        let column = out.values().column(v).to_vec();
        for month in 1..=12 {
            let pick = |values: &[f64]| -> Vec<f64> {
                let picked = values
                    .iter()
                    .zip(&months)
                    .filter(|(_, m)| **m == month)
                    .map(|(x, _)| *x)
                    .collect();
                sorted(picked)
            };
            assert_eq!(pick(&column), pick(qdm_values), "variable {v}, month {month}");
        }
    }
    assert!(spearman(&out) > 0.3, "spearman {}", spearman(&out));
}

#[test]
fn inconsistent_parameter_json_is_an_error() {
    let (m, _, _) = trained(5);
    let json = m.parameters().unwrap().to_json().unwrap();
    let edit = |f: &dyn Fn(&mut serde_json::Value)| {
        let mut v: serde_json::Value = serde_json::from_str(&json).unwrap();
        f(&mut v);
        MbcnParameters::from_json(&v.to_string())
    };

    let fewer_rotations = edit(&|v| {
        v["rotations"].as_array_mut().unwrap().pop();
    });
    assert!(matches!(
        fewer_rotations,
        Err(MbcnError::Adjust(AdjustError::ShapeMismatch { .. }))
    ));

    let mixed_methods = edit(&|v| v["base"][1]["method"]["name"] = serde_json::json!("eqm"));
    assert!(matches!(
        mixed_methods,
        Err(MbcnError::Adjust(AdjustError::ShapeMismatch { .. }))
    ));

    let short_values = edit(&|v| v["af_q"]["values"] = serde_json::json!([1.0]));
    assert!(matches!(
        short_values,
        Err(MbcnError::Adjust(AdjustError::Serialization { .. }))
    ));
}
