//! Time-indexed numeric arrays with named auxiliary axes.

use chrono::NaiveDate;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::GroupError;

/// A named auxiliary axis (e.g. `location`, `realization`, `multivar`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axis {
    name: String,
    labels: Vec<String>,
}

impl Axis {
    /// Creates an axis from a name and its coordinate labels.
    pub fn new(name: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            name: name.into(),
            labels,
        }
    }

    /// Creates an axis labelled `0..len`.
    pub fn indexed(name: impl Into<String>, len: usize) -> Self {
        Self::new(name, (0..len).map(|i| i.to_string()).collect())
    }

    /// Axis name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Coordinate labels.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of coordinates.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` if the axis has no coordinates.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// An n-dimensional array with one time axis and zero or more auxiliary axes.
///
/// Values are stored as a `(time, cell)` matrix where a cell is one
/// combination of auxiliary coordinates, flattened row-major (last axis
/// fastest). Missing values are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSeries {
    times: Vec<NaiveDate>,
    axes: Vec<Axis>,
    values: Array2<f64>,
}

/// Split of a series' cells into kept cells and the cells pooled into each.
#[derive(Debug, Clone, PartialEq)]
pub struct CellLayout {
    /// Axes that survive pooling, in their original order.
    pub kept_axes: Vec<Axis>,
    /// For each kept cell, the flat cell indices merged into it, ordered
    /// row-major over the pooled axes.
    pub members: Vec<Vec<usize>>,
}

impl CellLayout {
    /// Number of kept cells.
    pub fn n_cells(&self) -> usize {
        self.members.len()
    }
}

impl LabeledSeries {
    /// Creates a series, checking that time is strictly increasing and that
    /// `values` is `(times.len(), product of axis lengths)`.
    pub fn new(
        times: Vec<NaiveDate>,
        axes: Vec<Axis>,
        values: Array2<f64>,
    ) -> Result<Self, GroupError> {
        if let Some(i) = times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(GroupError::NonMonotonicTime { index: i + 1 });
        }
        for (i, a) in axes.iter().enumerate() {
            if axes[..i].iter().any(|b| b.name == a.name) {
                return Err(GroupError::InvalidAxis {
                    name: a.name.clone(),
                    reason: "duplicate axis name".to_string(),
                });
            }
            if a.name == "time" {
                return Err(GroupError::InvalidAxis {
                    name: a.name.clone(),
                    reason: "\"time\" is reserved for the time axis".to_string(),
                });
            }
        }
        let n_cells = axes.iter().map(Axis::len).product::<usize>();
        let expected = (times.len(), n_cells);
        if values.dim() != expected {
            return Err(GroupError::ShapeMismatch {
                expected,
                got: values.dim(),
            });
        }
        Ok(Self {
            times,
            axes,
            values,
        })
    }

    /// Creates a series without auxiliary axes.
    pub fn from_values(times: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self, GroupError> {
        let n = values.len();
        let arr = Array2::from_shape_vec((n, 1), values).map_err(|_| GroupError::ShapeMismatch {
            expected: (times.len(), 1),
            got: (n, 1),
        })?;
        Self::new(times, Vec::new(), arr)
    }

    /// Timestamps.
    pub fn times(&self) -> &[NaiveDate] {
        &self.times
    }

    /// Auxiliary axes.
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Values as a `(time, cell)` matrix.
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of timestamps.
    pub fn n_times(&self) -> usize {
        self.times.len()
    }

    /// Number of flattened auxiliary cells.
    pub fn n_cells(&self) -> usize {
        self.values.ncols()
    }

    /// Looks up an axis by name, returning its position and definition.
    pub fn axis(&self, name: &str) -> Option<(usize, &Axis)> {
        self.axes.iter().enumerate().find(|(_, a)| a.name == name)
    }

    /// One cell's time series.
    pub fn column(&self, cell: usize) -> ArrayView1<'_, f64> {
        self.values.column(cell)
    }

    /// Returns a series with the same coordinates and new values.
    pub fn with_values(&self, values: Array2<f64>) -> Result<Self, GroupError> {
        if values.dim() != self.values.dim() {
            return Err(GroupError::ShapeMismatch {
                expected: self.values.dim(),
                got: values.dim(),
            });
        }
        Ok(Self {
            times: self.times.clone(),
            axes: self.axes.clone(),
            values,
        })
    }

    /// Splits cells into those kept and those pooled along `pooled` axes.
    pub fn cell_layout<S: AsRef<str>>(&self, pooled: &[S]) -> Result<CellLayout, GroupError> {
        for p in pooled {
            if self.axis(p.as_ref()).is_none() {
                return Err(GroupError::UnknownAxis {
                    name: p.as_ref().to_string(),
                });
            }
        }
        let is_pooled: Vec<bool> = self
            .axes
            .iter()
            .map(|a| pooled.iter().any(|p| p.as_ref() == a.name))
            .collect();
        let kept_axes: Vec<Axis> = self
            .axes
            .iter()
            .zip(&is_pooled)
            .filter(|(_, p)| !**p)
            .map(|(a, _)| a.clone())
            .collect();
        let n_kept = kept_axes.iter().map(Axis::len).product::<usize>();
        let mut members = vec![Vec::new(); n_kept];

        for cell in 0..self.n_cells() {
            let mut rem = cell;
            let mut kept = 0;
            let mut kept_stride = 1;
            for (a, &p) in self.axes.iter().zip(&is_pooled).rev() {
                let i = rem % a.len();
                rem /= a.len();
                if !p {
                    kept += i * kept_stride;
                    kept_stride *= a.len();
                }
            }
            members[kept].push(cell);
        }
        Ok(CellLayout { kept_axes, members })
    }

    /// Stacks same-shaped series along a new leading axis named `axis_name`.
    pub fn stack(axis_name: &str, parts: &[(String, LabeledSeries)]) -> Result<Self, GroupError> {
        let Some((_, first)) = parts.first() else {
            return Err(GroupError::InvalidAxis {
                name: axis_name.to_string(),
                reason: "nothing to stack".to_string(),
            });
        };
        for (_, p) in parts {
            if p.times != first.times || p.axes != first.axes {
                return Err(GroupError::ShapeMismatch {
                    expected: first.values.dim(),
                    got: p.values.dim(),
                });
            }
        }
        let n_inner = first.n_cells();
        let mut values = Array2::zeros((first.n_times(), n_inner * parts.len()));
        for (k, (_, p)) in parts.iter().enumerate() {
            for c in 0..n_inner {
                values.column_mut(k * n_inner + c).assign(&p.values.column(c));
            }
        }
        let mut axes = vec![Axis::new(
            axis_name,
            parts.iter().map(|(n, _)| n.clone()).collect(),
        )];
        axes.extend(first.axes.iter().cloned());
        Self::new(first.times.clone(), axes, values)
    }

    /// Inverse of [`LabeledSeries::stack`]: splits along the leading axis.
    pub fn unstack(&self, axis_name: &str) -> Result<Vec<(String, LabeledSeries)>, GroupError> {
        match self.axes.first() {
            Some(a) if a.name == axis_name => {}
            _ => {
                return Err(GroupError::UnknownAxis {
                    name: axis_name.to_string(),
                });
            }
        }
        let labels = self.axes[0].labels.clone();
        let inner_axes: Vec<Axis> = self.axes[1..].to_vec();
        let n_inner = self.n_cells() / labels.len().max(1);
        labels
            .into_iter()
            .enumerate()
            .map(|(k, name)| {
                let mut v = Array2::zeros((self.n_times(), n_inner));
                for c in 0..n_inner {
                    v.column_mut(c).assign(&self.values.column(k * n_inner + c));
                }
                Ok((name, Self::new(self.times.clone(), inner_axes.clone(), v)?))
            })
            .collect()
    }
}
