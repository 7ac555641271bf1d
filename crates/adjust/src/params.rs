//! Trained parameters and their persisted form.

use std::collections::BTreeMap;

use boreas_group::{Axis, Grouper};
use boreas_quantile::QuantileEngine;
use serde::{Deserialize, Serialize};

use crate::config::Method;
use crate::error::AdjustError;
use crate::kind::Kind;

/// A named numeric array laid out row-major over `dims`.
///
/// The first two dims are always the group axis and the kept-cell axis.
/// Deserialization goes through [`ParamArray::new`], so a parsed array
/// always fills its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParamArray")]
pub struct ParamArray {
    dims: Vec<String>,
    shape: Vec<usize>,
    #[serde(serialize_with = "nan_as_null::serialize")]
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct RawParamArray {
    dims: Vec<String>,
    shape: Vec<usize>,
    #[serde(deserialize_with = "nan_as_null::deserialize")]
    values: Vec<f64>,
}

impl TryFrom<RawParamArray> for ParamArray {
    type Error = AdjustError;

    fn try_from(raw: RawParamArray) -> Result<Self, Self::Error> {
        ParamArray::new(raw.dims, raw.shape, raw.values)
    }
}

impl ParamArray {
    /// Creates an array, checking that `values` fills `shape`.
    pub fn new(
        dims: Vec<String>,
        shape: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self, AdjustError> {
        if dims.len() != shape.len() || dims.len() < 2 {
            return Err(AdjustError::ShapeMismatch {
                reason: format!("dims {dims:?} do not match shape {shape:?}"),
            });
        }
        let n: usize = shape.iter().product();
        if n != values.len() {
            return Err(AdjustError::ShapeMismatch {
                reason: format!("shape {shape:?} needs {n} values, got {}", values.len()),
            });
        }
        Ok(Self { dims, shape, values })
    }

    /// Dimension names.
    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    /// Dimension lengths.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Flat values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Length of one `(group, cell)` row.
    pub fn inner_len(&self) -> usize {
        self.shape[2..].iter().product()
    }

    /// Checks the group and cell dims, and the trailing dims when given.
    pub fn check_leading(
        &self,
        name: &str,
        n_groups: usize,
        n_cells: usize,
        trailing: Option<&[usize]>,
    ) -> Result<(), AdjustError> {
        let leading_ok = self.shape[..2] == [n_groups, n_cells];
        let trailing_ok = trailing.is_none_or(|t| &self.shape[2..] == t);
        if leading_ok && trailing_ok {
            return Ok(());
        }
        Err(AdjustError::ShapeMismatch {
            reason: format!(
                "array {name:?} has shape {:?}, expected ({n_groups}, {n_cells}, {})",
                self.shape,
                trailing.map_or("..".to_string(), |t| format!("{t:?}"))
            ),
        })
    }

    /// The values of group `g`, cell `c`: one scalar for a 2-D array, one
    /// table row for a 3-D array.
    pub fn row(&self, g: usize, c: usize) -> &[f64] {
        let k = self.inner_len();
        let start = (g * self.shape[1] + c) * k;
        &self.values[start..start + k]
    }

    /// Scalar at group `g`, cell `c` of a 2-D array; NaN for an empty row.
    pub fn at(&self, g: usize, c: usize) -> f64 {
        self.row(g, c).first().copied().unwrap_or(f64::NAN)
    }
}

/// Everything `train` learned, plus the configuration that produced it.
///
/// Immutable once built; `adjust` only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedParameters {
    method: Method,
    kind: Kind,
    grouper: Grouper,
    engine: QuantileEngine,
    group_labels: Vec<u16>,
    cell_axes: Vec<Axis>,
    arrays: BTreeMap<String, ParamArray>,
}

impl TrainedParameters {
    pub(crate) fn new(
        method: Method,
        kind: Kind,
        grouper: Grouper,
        engine: QuantileEngine,
        cell_axes: Vec<Axis>,
        arrays: BTreeMap<String, ParamArray>,
    ) -> Self {
        Self {
            method,
            kind,
            group_labels: grouper.labels(),
            grouper,
            engine,
            cell_axes,
            arrays,
        }
    }

    /// The method that was trained.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Correction kind.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Grouping used in training; `adjust` uses the same one.
    pub fn grouper(&self) -> &Grouper {
        &self.grouper
    }

    /// Quantile estimator used in training.
    pub fn engine(&self) -> QuantileEngine {
        self.engine
    }

    /// Label of each group along the first array dimension.
    pub fn group_labels(&self) -> &[u16] {
        &self.group_labels
    }

    /// Auxiliary axes that were not pooled.
    pub fn cell_axes(&self) -> &[Axis] {
        &self.cell_axes
    }

    /// Number of kept cells along the second array dimension.
    pub fn n_cells(&self) -> usize {
        self.cell_axes.iter().map(Axis::len).product()
    }

    /// Named parameter arrays.
    pub fn arrays(&self) -> &BTreeMap<String, ParamArray> {
        &self.arrays
    }

    /// Looks up an array by name.
    pub fn array(&self, name: &str) -> Option<&ParamArray> {
        self.arrays.get(name)
    }

    /// Looks up an array the method cannot do without.
    pub fn require(&self, name: &str) -> Result<&ParamArray, AdjustError> {
        self.array(name).ok_or_else(|| AdjustError::ShapeMismatch {
            reason: format!("trained parameters lack array {name:?}"),
        })
    }

    /// Serializes to pretty JSON. Missing values are written as `null`.
    pub fn to_json(&self) -> Result<String, AdjustError> {
        serde_json::to_string_pretty(self).map_err(|e| AdjustError::Serialization {
            reason: e.to_string(),
        })
    }

    /// Parses JSON written by [`TrainedParameters::to_json`] and checks that
    /// every array matches the group and cell counts.
    pub fn from_json(json: &str) -> Result<Self, AdjustError> {
        let p: Self = serde_json::from_str(json).map_err(|e| AdjustError::Serialization {
            reason: e.to_string(),
        })?;
        p.check_shapes()?;
        Ok(p)
    }

    /// Checks every array against the group count, the cell count and, for
    /// quantile tables, the number of levels.
    pub fn check_shapes(&self) -> Result<(), AdjustError> {
        let n_groups = self.grouper.n_groups();
        if self.group_labels.len() != n_groups {
            return Err(AdjustError::ShapeMismatch {
                reason: format!(
                    "{} group labels for a grouper with {n_groups} groups",
                    self.group_labels.len()
                ),
            });
        }
        let n_q = self.method.qm_params().map(|p| [p.quantiles.len()]);
        for (name, a) in &self.arrays {
            let trailing: &[usize] = match (name.as_str(), &n_q) {
                ("af" | "hist_q", Some(q)) => &q[..],
                _ => &[][..],
            };
            a.check_leading(name, n_groups, self.n_cells(), Some(trailing))?;
        }
        Ok(())
    }
}

mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(values.iter().map(|x| if x.is_nan() { None } else { Some(*x) }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        let v: Vec<Option<f64>> = Vec::deserialize(d)?;
        Ok(v.into_iter().map(|x| x.unwrap_or(f64::NAN)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr() -> ParamArray {
        ParamArray::new(
            vec!["month".into(), "cell".into(), "quantiles".into()],
            vec![2, 1, 3],
            vec![1.0, 2.0, 3.0, f64::NAN, 5.0, 6.0],
        )
        .unwrap()
    }

    #[test]
    fn rows_are_group_major() {
        let a = arr();
        assert_eq!(a.row(0, 0), &[1.0, 2.0, 3.0]);
        assert_eq!(a.row(1, 0)[2], 6.0);
    }

    #[test]
    fn shape_is_checked() {
        let dims = vec!["g".into(), "cell".into()];
        assert!(ParamArray::new(dims, vec![2, 2], vec![0.0; 3]).is_err());
        assert!(ParamArray::new(vec!["g".into()], vec![2], vec![0.0; 2]).is_err());
    }

    #[test]
    fn parsing_rejects_short_values() {
        let json = r#"{"dims":["month","cell","quantiles"],"shape":[2,1,3],"values":[1.0,2.0]}"#;
        let err = serde_json::from_str::<ParamArray>(json).unwrap_err();
        assert!(err.to_string().contains("needs 6 values"));
    }

    #[test]
    fn parsing_rejects_one_dimension() {
        let json = r#"{"dims":["group"],"shape":[1],"values":[1.0]}"#;
        assert!(serde_json::from_str::<ParamArray>(json).is_err());
    }

    #[test]
    fn leading_dims_are_checked() {
        let a = arr();
        assert!(a.check_leading("af", 2, 1, Some(&[3][..])).is_ok());
        assert!(a.check_leading("af", 2, 1, None).is_ok());
        assert!(a.check_leading("af", 12, 1, None).is_err());
        assert!(a.check_leading("af", 2, 1, Some(&[4][..])).is_err());
    }

    #[test]
    fn nan_round_trips_through_null() {
        let json = serde_json::to_string(&arr()).unwrap();
        assert!(json.contains("null"));
        let back: ParamArray = serde_json::from_str(&json).unwrap();
        assert!(back.values()[3].is_nan());
        assert_eq!(back.values()[4], 5.0);
    }
}
