//! Trained MBCn state.

use boreas_adjust::{AdjustError, Method, ParamArray, TrainedParameters};
use boreas_group::{Axis, Grouper};
use boreas_quantile::{Extrapolation, Interp, QuantileLevels};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::MbcnError;
use crate::rotation::{from_rows, to_rows};

/// Everything `adjust` needs: one base adjustment per variable, the rotation
/// sequence, and the npdf factors per `(group, cell)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MbcnParameters {
    variable_axis: String,
    variables: Vec<String>,
    grouper: Grouper,
    levels: QuantileLevels,
    npdf_interp: Interp,
    npdf_extrapolation: Extrapolation,
    rotations: Vec<Vec<f64>>,
    base: Vec<TrainedParameters>,
    af_q: ParamArray,
    escores: ParamArray,
}

impl MbcnParameters {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        variable_axis: String,
        variables: Vec<String>,
        grouper: Grouper,
        levels: QuantileLevels,
        npdf: (Interp, Extrapolation),
        rotations: &[DMatrix<f64>],
        base: Vec<TrainedParameters>,
        af_q: ParamArray,
        escores: ParamArray,
    ) -> Self {
        Self {
            variable_axis,
            variables,
            grouper,
            levels,
            npdf_interp: npdf.0,
            npdf_extrapolation: npdf.1,
            rotations: rotations.iter().map(to_rows).collect(),
            base,
            af_q,
            escores,
        }
    }

    /// Name of the variable axis.
    pub fn variable_axis(&self) -> &str {
        &self.variable_axis
    }

    /// Variable labels in axis order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Grouping shared by the base step and the npdf transform.
    pub fn grouper(&self) -> &Grouper {
        &self.grouper
    }

    /// Quantile levels of the npdf factor tables.
    pub fn levels(&self) -> &QuantileLevels {
        &self.levels
    }

    /// Interpolation inside the npdf transform.
    pub fn npdf_interp(&self) -> Interp {
        self.npdf_interp
    }

    /// Extrapolation inside the npdf transform.
    pub fn npdf_extrapolation(&self) -> Extrapolation {
        self.npdf_extrapolation
    }

    /// Number of iterations.
    pub fn n_iter(&self) -> usize {
        self.rotations.len()
    }

    /// The rotation of every iteration.
    pub fn rotations(&self) -> Result<Vec<DMatrix<f64>>, MbcnError> {
        self.rotations.iter().map(|r| from_rows(r)).collect()
    }

    /// Trained base adjustment of each variable.
    pub fn base(&self) -> &[TrainedParameters] {
        &self.base
    }

    /// Univariate method of the base adjustments.
    pub fn base_method(&self) -> Option<&Method> {
        self.base.first().map(TrainedParameters::method)
    }

    /// Auxiliary axes besides the variable axis.
    pub fn cell_axes(&self) -> &[Axis] {
        self.base.first().map(TrainedParameters::cell_axes).unwrap_or(&[])
    }

    /// npdf factors, `[group, cell, iteration, variable, level]`.
    pub fn af_q(&self) -> &ParamArray {
        &self.af_q
    }

    /// Energy-score trace of group `g`, cell `c`: one entry per iteration.
    pub fn escores(&self, g: usize, c: usize) -> &[f64] {
        self.escores.row(g, c)
    }

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> Result<String, MbcnError> {
        serde_json::to_string_pretty(self).map_err(|e| serialization(e.to_string()))
    }

    /// Parses JSON written by [`MbcnParameters::to_json`] and checks every
    /// array against the variables, groups, cells and iterations.
    pub fn from_json(json: &str) -> Result<Self, MbcnError> {
        let p: Self = serde_json::from_str(json).map_err(|e| serialization(e.to_string()))?;
        p.check_shapes()?;
        Ok(p)
    }

    fn check_shapes(&self) -> Result<(), MbcnError> {
        let d = self.variables.len();
        if self.base.len() != d {
            return Err(MbcnError::shape(format!(
                "{} base adjustments for {d} variables",
                self.base.len()
            )));
        }
        let method = self.base_method().map(Method::name);
        for base in &self.base {
            base.check_shapes()?;
            if Some(base.method().name()) != method {
                return Err(MbcnError::shape(
                    "base adjustments use different methods".to_string(),
                ));
            }
            if base.grouper() != &self.grouper || base.cell_axes() != self.cell_axes() {
                return Err(MbcnError::shape(
                    "base adjustments disagree on grouping or cell axes".to_string(),
                ));
            }
        }
        if self.rotations.iter().any(|r| r.len() != d * d) {
            return Err(MbcnError::shape(format!("rotations must be {d}x{d}")));
        }
        let n_groups = self.grouper.n_groups();
        let n_cells: usize = self.cell_axes().iter().map(Axis::len).product();
        let n_iter = self.n_iter();
        let trailing = [n_iter, d, self.levels.len()];
        self.af_q.check_leading("af_q", n_groups, n_cells, Some(&trailing[..]))?;
        self.escores.check_leading("escores", n_groups, n_cells, Some(&[n_iter][..]))?;
        Ok(())
    }
}

fn serialization(reason: String) -> MbcnError {
    MbcnError::Adjust(AdjustError::Serialization { reason })
}
