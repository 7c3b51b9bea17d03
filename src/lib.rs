//! Monte Carlo estimate of shallow landslide probability.
//!
//! Each core node of a grid is run through repeated trials of a steady-state
//! recharge wetness model and an infinite-slope stability model. Recharge and
//! cohesion are drawn from their configured distributions, and transmissivity,
//! friction angle and thickness from triangles around each node's value. The fraction of
//! failed trials and the mean relative wetness are written back as node fields.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod fields;
pub mod io;
pub mod sampler;
pub mod stability;
pub mod wetness;

pub use aggregate::{Accumulator, LandslideOutputs};
pub use config::{LandslideConfig, RechargeDistribution, RechargeSource, SourceShare};
pub use engine::LandslideProbability;
pub use error::{LandslideError, Result};
pub use fields::{FieldAccessor, NodeFields};
