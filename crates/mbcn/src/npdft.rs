//! N-dimensional pdf transform: repeated rotation and per-axis delta
//! mapping on standardized data.

use boreas_quantile::{Extrapolation, Interp, QuantileEngine, interp_on_quantiles};
use boreas_stats::{rank_fraction, standardize};
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::config::EscoreSampling;
use crate::error::MbcnError;
use crate::escore::escore;

/// Lookup settings shared by training and adjustment.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Npdft<'a> {
    pub levels: &'a [f64],
    pub engine: QuantileEngine,
    pub interp: Interp,
    pub extrap: Extrapolation,
}

/// Factors and score trace of one training run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NpdftFit {
    /// Flattened `[iteration][variable][level]`.
    pub af_q: Vec<f64>,
    /// One entry per iteration.
    pub escores: Vec<f64>,
}

impl Npdft<'_> {
    /// Learns the per-iteration factors that carry `hist` onto `reference`.
    /// Both are `variables × points`.
    pub fn train(
        &self,
        reference: &DMatrix<f64>,
        hist: &DMatrix<f64>,
        rotations: &[DMatrix<f64>],
        sampling: EscoreSampling,
    ) -> Result<NpdftFit, MbcnError> {
        let mut r = standardize_rows(reference);
        let mut h = standardize_rows(hist);
        let strides = sampling.stride(r.ncols()).zip(sampling.stride(h.ncols()));
        let d = r.nrows();
        let mut af_q = Vec::with_capacity(rotations.len() * d * self.levels.len());
        let mut escores = Vec::with_capacity(rotations.len());

        for i in 0..rotations.len() {
            let rot = step(rotations, i);
            r = &rot * &r;
            h = &rot * &h;
            let afs: Vec<Vec<f64>> = (0..d)
                .into_par_iter()
                .map(|v| {
                    let ref_q = self.engine.quantiles(&row(&r, v), self.levels);
                    let hist_q = self.engine.quantiles(&row(&h, v), self.levels);
                    ref_q.iter().zip(&hist_q).map(|(a, b)| a - b).collect()
                })
                .collect();
            self.shift(&mut h, &afs)?;
            escores.push(match strides {
                Some((rs, hs)) => escore(&strided(&r, rs), &strided(&h, hs))?,
                None => f64::NAN,
            });
            af_q.extend(afs.into_iter().flatten());
        }
        Ok(NpdftFit { af_q, escores })
    }

    /// Replays trained factors on `sim` and rotates back.
    pub fn adjust(
        &self,
        sim: &DMatrix<f64>,
        af_q: &[f64],
        rotations: &[DMatrix<f64>],
    ) -> Result<DMatrix<f64>, MbcnError> {
        let d = sim.nrows();
        let n_q = self.levels.len();
        let mut x = standardize_rows(sim);
        for i in 0..rotations.len() {
            x = &step(rotations, i) * &x;
            let afs: Vec<Vec<f64>> = (0..d)
                .map(|v| {
                    let start = (i * d + v) * n_q;
                    af_q[start..start + n_q].to_vec()
                })
                .collect();
            self.shift(&mut x, &afs)?;
        }
        Ok(match rotations.last() {
            Some(last) => last.transpose() * x,
            None => x,
        })
    }

    /// Adds to every axis the factor at each value's own rank.
    fn shift(&self, m: &mut DMatrix<f64>, afs: &[Vec<f64>]) -> Result<(), MbcnError> {
        let src: &DMatrix<f64> = m;
        let rows = (0..src.nrows())
            .into_par_iter()
            .map(|v| {
                let x = row(src, v);
                rank_fraction(&x)
                    .iter()
                    .zip(&x)
                    .map(|(&q, &xi)| -> Result<f64, MbcnError> {
                        let af = interp_on_quantiles(
                            q,
                            self.levels,
                            &afs[v],
                            self.interp,
                            self.extrap,
                        )?;
                        Ok(xi + af)
                    })
                    .collect::<Result<Vec<f64>, MbcnError>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        for (v, values) in rows.iter().enumerate() {
            for (j, &x) in values.iter().enumerate() {
                m[(v, j)] = x;
            }
        }
        Ok(())
    }
}

/// Rotation taking iteration `i − 1`'s space to iteration `i`'s.
fn step(rotations: &[DMatrix<f64>], i: usize) -> DMatrix<f64> {
    if i == 0 {
        rotations[0].clone()
    } else {
        &rotations[i] * rotations[i - 1].transpose()
    }
}

fn row(m: &DMatrix<f64>, v: usize) -> Vec<f64> {
    m.row(v).iter().copied().collect()
}

fn standardize_rows(m: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = m.clone();
    for v in 0..m.nrows() {
        let (z, _, _) = standardize(&row(m, v));
        for (j, x) in z.into_iter().enumerate() {
            out[(v, j)] = x;
        }
    }
    out
}

fn strided(m: &DMatrix<f64>, stride: usize) -> DMatrix<f64> {
    let cols: Vec<usize> = (0..m.ncols()).step_by(stride.max(1)).collect();
    DMatrix::from_fn(m.nrows(), cols.len(), |i, j| m[(i, cols[j])])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::random_rotations;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    fn cloud(n: usize, rho: f64, seed: u64) -> DMatrix<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let z = Normal::new(0.0, 1.0).unwrap();
        let mut m = DMatrix::zeros(2, n);
        for j in 0..n {
            let a: f64 = z.sample(&mut rng);
            let b: f64 = z.sample(&mut rng);
            m[(0, j)] = a;
            m[(1, j)] = rho * a + (1.0 - rho * rho).sqrt() * b;
        }
        m
    }

    fn settings(levels: &[f64]) -> Npdft<'_> {
        Npdft {
            levels,
            engine: QuantileEngine::new(),
            interp: Interp::Nearest,
            extrap: Extrapolation::Constant,
        }
    }

    #[test]
    fn identical_clouds_need_no_correction() {
        let levels: Vec<f64> = (0..10).map(|i| (i as f64 + 0.5) / 10.0).collect();
        let x = cloud(200, 0.5, 1);
        let rots = random_rotations(4, 2, &mut StdRng::seed_from_u64(2));
        let fit = settings(&levels).train(&x, &x, &rots, EscoreSampling::All).unwrap();
        assert_eq!(fit.af_q.len(), 4 * 2 * 10);
        for af in &fit.af_q {
            assert_abs_diff_eq!(*af, 0.0, epsilon = 1e-9);
        }
        for e in &fit.escores {
            assert_abs_diff_eq!(*e, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn adjust_replays_the_training_path() {
        let levels: Vec<f64> = (0..20).map(|i| (i as f64 + 0.5) / 20.0).collect();
        let reference = cloud(300, 0.8, 3);
        let hist = cloud(300, 0.0, 4);
        let rots = random_rotations(10, 2, &mut StdRng::seed_from_u64(5));
        let s = settings(&levels);
        let fit = s.train(&reference, &hist, &rots, EscoreSampling::Skip).unwrap();
        assert!(fit.escores.iter().all(|e| e.is_nan()));

        let out = s.adjust(&hist, &fit.af_q, &rots).unwrap();
        assert_eq!(out.shape(), (2, 300));
        assert!(out.iter().all(|v| v.is_finite()));
    }
}
