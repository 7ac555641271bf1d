use nalgebra::{DMatrix, DVector};

/// Least-squares polynomial trend `y ≈ Σ c_k t^k` with `t` rescaled to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PolyTrend {
    coefficients: Vec<f64>,
    x_min: f64,
    x_range: f64,
}

impl PolyTrend {
    /// Fits a polynomial of the given degree to the pairs where both `x` and
    /// `y` are non-NaN.
    ///
    /// Returns `None` when there are not more valid pairs than the degree or
    /// the least-squares system cannot be solved.
    pub fn fit(x: &[f64], y: &[f64], degree: usize) -> Option<Self> {
        let pairs: Vec<(f64, f64)> = x
            .iter()
            .zip(y)
            .filter(|(a, b)| !a.is_nan() && !b.is_nan())
            .map(|(&a, &b)| (a, b))
            .collect();
        let n_coef = degree + 1;
        if pairs.len() < n_coef {
            return None;
        }

        let x_min = pairs.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let x_max = pairs.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let x_range = if (x_max - x_min).abs() > 1e-15 {
            x_max - x_min
        } else {
            1.0
        };

        let design = DMatrix::from_fn(pairs.len(), n_coef, |i, j| {
            ((pairs[i].0 - x_min) / x_range).powi(j as i32)
        });
        let rhs = DVector::from_iterator(pairs.len(), pairs.iter().map(|p| p.1));
        let coefs = design.svd(true, true).solve(&rhs, 1e-12).ok()?;

        Some(Self {
            coefficients: coefs.iter().copied().collect(),
            x_min,
            x_range,
        })
    }

    /// Evaluates the trend at `x`. NaN in, NaN out.
    pub fn eval(&self, x: f64) -> f64 {
        let t = (x - self.x_min) / self.x_range;
        // Horner
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * t + c)
    }

    /// Polynomial degree.
    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }
}
