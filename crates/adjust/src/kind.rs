//! Additive and multiplicative correction kinds.

use serde::{Deserialize, Serialize};

/// How a factor combines with a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// `value + factor`, factor = target − source.
    #[default]
    Additive,
    /// `value × factor`, factor = target / source.
    Multiplicative,
}

impl Kind {
    /// Factor that takes `source` to `target`.
    ///
    /// Division by zero and any other non-finite ratio become NaN.
    pub fn factor(self, target: f64, source: f64) -> f64 {
        match self {
            Kind::Additive => target - source,
            Kind::Multiplicative => finite_or_nan(target / source),
        }
    }

    /// Applies `factor` to `value`.
    pub fn apply(self, value: f64, factor: f64) -> f64 {
        match self {
            Kind::Additive => value + factor,
            Kind::Multiplicative => value * factor,
        }
    }

    /// Removes `base` from `value`: the inverse of [`Kind::apply`].
    pub fn remove(self, value: f64, base: f64) -> f64 {
        match self {
            Kind::Additive => value - base,
            Kind::Multiplicative => finite_or_nan(value / base),
        }
    }

    /// Conventional one-character symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Kind::Additive => "+",
            Kind::Multiplicative => "*",
        }
    }
}

fn finite_or_nan(x: f64) -> f64 {
    if x.is_finite() { x } else { f64::NAN }
}
