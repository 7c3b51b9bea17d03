//! Random draws for the uncertain inputs.
//!
//! Every (node, iteration) pair gets its own ChaCha8 stream seeded from an xxh64
//! hash of the run seed, node index and iteration index. Within one stream the
//! draw order is fixed: recharge, transmissivity, cohesion, friction angle,
//! thickness.

use crate::config::RechargeDistribution;
use crate::error::{LandslideError, Result};
use rand::distributions::Uniform;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, LogNormal, Normal, Triangular};
use std::collections::HashMap;
use xxhash_rust::xxh64::xxh64;

const MM_PER_M: f64 = 1000.0;

pub fn node_rng(seed: u64, node: usize, iteration: usize) -> ChaCha8Rng {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&(node as u64).to_le_bytes());
    key[8..].copy_from_slice(&(iteration as u64).to_le_bytes());
    ChaCha8Rng::seed_from_u64(xxh64(&key, seed))
}

/// Triangular distribution over one node's (min, mode, max) total cohesion.
pub fn cohesion_distribution(min: f64, mode: f64, max: f64) -> Result<Triangular<f64>> {
    if !(min.is_finite() && mode.is_finite() && max.is_finite()) {
        return Err(LandslideError::config(format!(
            "cohesion bounds must be finite, got ({}, {}, {})",
            min, mode, max
        )));
    }
    Triangular::new(min, max, mode).map_err(|e| {
        LandslideError::config(format!(
            "cohesion (min {}, mode {}, max {}) is not ordered: {}",
            min, mode, max, e
        ))
    })
}

/// Fractional (below, above) spread of the triangle drawn around a node's
/// transmissivity, friction angle and thickness.
pub const TRANSMISSIVITY_SPREAD: (f64, f64) = (0.3, 0.3);
pub const FRICTION_ANGLE_SPREAD: (f64, f64) = (0.18, 0.32);
pub const THICKNESS_SPREAD: (f64, f64) = (0.3, 0.1);
// tan(phi) diverges past this
const MAX_FRICTION_ANGLE: f64 = 90.0;

/// Triangle with its mode at `mode`, spanning `spread` fractions below and above it.
pub fn spread_distribution(mode: f64, spread: (f64, f64)) -> Result<Triangular<f64>> {
    let (below, above) = spread;
    let min = mode - below * mode;
    let max = mode + above * mode;
    Triangular::new(min, max, mode).map_err(|e| {
        LandslideError::config(format!(
            "spread ({}, {}) around {} is not a valid triangle: {}",
            below, above, mode, e
        ))
    })
}

/// Friction angle triangle, capped at 90 degrees.
pub fn friction_angle_distribution(mode: f64) -> Result<Triangular<f64>> {
    let (below, above) = FRICTION_ANGLE_SPREAD;
    let max = (mode + above * mode).min(MAX_FRICTION_ANGLE);
    Triangular::new(mode - below * mode, max, mode).map_err(|e| {
        LandslideError::config(format!(
            "friction angle {} does not give a valid triangle: {}",
            mode, e
        ))
    })
}

// Arithmetic mean/stdev of recharge to the parameters of the underlying normal
fn lognormal_from_moments(mean: f64, stdev: f64) -> Result<LogNormal<f64>> {
    if !(mean.is_finite() && mean > 0.0 && stdev.is_finite() && stdev >= 0.0) {
        return Err(LandslideError::config(format!(
            "lognormal recharge needs a positive mean and non-negative stdev, got ({}, {})",
            mean, stdev
        )));
    }
    let variance = stdev * stdev;
    let mu = (mean * mean / (variance + mean * mean).sqrt()).ln();
    let sigma = (variance / (mean * mean) + 1.0).ln().sqrt();
    LogNormal::new(mu, sigma).map_err(|e| {
        LandslideError::config(format!(
            "lognormal recharge (mean {}, stdev {}) is invalid: {}",
            mean, stdev, e
        ))
    })
}

/// Inverse of the empirical CDF of a set of recharge observations.
///
/// Probabilities below the first ECDF step map to the smallest observation;
/// between steps the quantile is interpolated linearly.
#[derive(Debug, Clone, PartialEq)]
pub struct EmpiricalQuantile {
    probabilities: Vec<f64>,
    values: Vec<f64>,
}

impl EmpiricalQuantile {
    pub fn from_records(records: &[f64]) -> Result<Self> {
        if records.is_empty() {
            return Err(LandslideError::config("recharge source has no records"));
        }
        let mut sorted = records.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len() as f64;
        let mut probabilities: Vec<f64> = Vec::with_capacity(sorted.len());
        let mut values: Vec<f64> = Vec::with_capacity(sorted.len());
        for (i, &value) in sorted.iter().enumerate() {
            let p = (i + 1) as f64 / n;
            // ties share the ECDF value of their last occurrence
            if values.last() == Some(&value) {
                if let Some(last) = probabilities.last_mut() {
                    *last = p;
                }
            } else {
                probabilities.push(p);
                values.push(value);
            }
        }
        Ok(EmpiricalQuantile {
            probabilities,
            values,
        })
    }

    pub fn quantile(&self, u: f64) -> f64 {
        let first = self.probabilities[0];
        if u < first {
            return self.values[0];
        }
        let upper = self.probabilities.partition_point(|&p| p <= u);
        if upper >= self.values.len() {
            return self.values[self.values.len() - 1];
        }
        let lower = upper - 1;
        let (p0, p1) = (self.probabilities[lower], self.probabilities[upper]);
        let (v0, v1) = (self.values[lower], self.values[upper]);
        v0 + (u - p0) * (v1 - v0) / (p1 - p0)
    }
}

// Recharge distribution prepared for sampling; draws are returned in m/day
#[derive(Debug, Clone)]
pub enum RechargeSampler {
    Uniform(Uniform<f64>),
    Lognormal(LogNormal<f64>),
    LognormalSpatial(Vec<LogNormal<f64>>),
    Normal(Normal<f64>),
    Fixed(Vec<f64>),
    DataDriven {
        sources: Vec<EmpiricalQuantile>,
        node_shares: Vec<Vec<(usize, f64)>>,
    },
}

impl RechargeSampler {
    pub fn new(distribution: &RechargeDistribution) -> Result<Self> {
        let sampler = match distribution {
            RechargeDistribution::Uniform { min, max } => {
                if !(min.is_finite() && max.is_finite()) || min > max {
                    return Err(LandslideError::config(format!(
                        "uniform recharge bounds ({}, {}) are not a finite ordered range",
                        min, max
                    )));
                }
                RechargeSampler::Uniform(Uniform::new_inclusive(*min, *max))
            }
            RechargeDistribution::Lognormal { mean, stdev } => {
                RechargeSampler::Lognormal(lognormal_from_moments(*mean, *stdev)?)
            }
            RechargeDistribution::LognormalSpatial { mean, stdev } => RechargeSampler::LognormalSpatial(
                mean.iter()
                    .zip(stdev)
                    .map(|(&m, &s)| lognormal_from_moments(m, s))
                    .collect::<Result<Vec<_>>>()?,
            ),
            RechargeDistribution::Normal { mean, stdev } => {
                RechargeSampler::Normal(Normal::new(*mean, *stdev).map_err(|e| {
                    LandslideError::config(format!(
                        "normal recharge (mean {}, stdev {}) is invalid: {}",
                        mean, stdev, e
                    ))
                })?)
            }
            RechargeDistribution::Fixed { values } => RechargeSampler::Fixed(values.clone()),
            RechargeDistribution::DataDriven {
                sources,
                node_sources,
            } => {
                let mut index = HashMap::new();
                let mut tables = Vec::with_capacity(sources.len());
                for source in sources {
                    index.insert(source.id, tables.len());
                    tables.push(EmpiricalQuantile::from_records(&source.records)?);
                }
                let node_shares = node_sources
                    .iter()
                    .enumerate()
                    .map(|(node, shares)| {
                        shares
                            .iter()
                            .map(|share| match index.get(&share.source) {
                                Some(&table) => Ok((table, share.fraction)),
                                None => Err(LandslideError::config(format!(
                                    "node {} references unknown recharge source {}",
                                    node, share.source
                                ))),
                            })
                            .collect::<Result<Vec<_>>>()
                    })
                    .collect::<Result<Vec<_>>>()?;
                RechargeSampler::DataDriven {
                    sources: tables,
                    node_shares,
                }
            }
        };
        Ok(sampler)
    }

    /// Number of nodes the sampler carries parameters for, if it is spatial.
    pub fn spatial_len(&self) -> Option<usize> {
        match self {
            RechargeSampler::LognormalSpatial(per_node) => Some(per_node.len()),
            RechargeSampler::DataDriven { node_shares, .. } => Some(node_shares.len()),
            _ => None,
        }
    }

    /// Recharge for one node-iteration, converted from mm/day to m/day.
    pub fn sample<R: Rng + ?Sized>(&self, node: usize, iteration: usize, rng: &mut R) -> f64 {
        let mm_per_day = match self {
            RechargeSampler::Uniform(dist) => dist.sample(rng),
            RechargeSampler::Lognormal(dist) => dist.sample(rng),
            RechargeSampler::LognormalSpatial(per_node) => per_node[node].sample(rng),
            RechargeSampler::Normal(dist) => dist.sample(rng),
            RechargeSampler::Fixed(values) => values[iteration],
            RechargeSampler::DataDriven {
                sources,
                node_shares,
            } => {
                let u: f64 = rng.gen_range(0.0..1.0);
                node_shares[node]
                    .iter()
                    .map(|&(source, fraction)| sources[source].quantile(u) * fraction)
                    .sum()
            }
        };
        mm_per_day / MM_PER_M
    }
}
