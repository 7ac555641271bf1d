//! MBCn multivariate bias adjustment.
//!
//! The N-dimensional pdf transform alternates a random rotation of the
//! variable space, a quantile delta mapping along every rotated axis, and
//! the inverse rotation. After enough iterations the transformed
//! historical series shares the reference's joint distribution. Adjustment
//! then reorders a per-variable base adjustment of the simulation (QDM by
//! default) so its ranks follow the transformed simulation, which keeps
//! each marginal exact.
//!
//! # Data layout
//!
//! Inputs are [`boreas_group::LabeledSeries`] whose leading auxiliary axis
//! lists the variables (default name `"multivar"`); build them with
//! [`boreas_group::LabeledSeries::stack`]. Other auxiliary axes are
//! adjusted independently per cell; pooling is not supported.
//!
//! # Reproducibility
//!
//! Rotations are drawn from a seeded source, or supplied. They are stored
//! in [`MbcnParameters`] so `adjust` replays the exact training path.
//! The per-iteration energy score is kept as a diagnostic only.

mod config;
mod engine;
mod error;
mod escore;
mod npdft;
mod params;
mod rotation;

pub use config::{DEFAULT_VARIABLE_AXIS, EscoreSampling, MbcnConfig};
pub use engine::Mbcn;
pub use error::MbcnError;
pub use escore::escore;
pub use params::MbcnParameters;
pub use rotation::{ORTHONORMAL_TOLERANCE, check_rotation, random_rotation, random_rotations};
