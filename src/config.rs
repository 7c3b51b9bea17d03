use crate::error::{LandslideError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

pub const DEFAULT_ITERATIONS: usize = 250;
pub const DEFAULT_RECHARGE_MIN: f64 = 20.0;
pub const DEFAULT_RECHARGE_MAX: f64 = 120.0;
// standard gravity, m/s2
pub const STANDARD_GRAVITY: f64 = 9.80665;

fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}

fn default_gravity() -> f64 {
    STANDARD_GRAVITY
}

// Observed recharge records of one source (hydrologic source domain)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RechargeSource {
    pub id: u32,
    pub records: Vec<f64>,
}

// Share of one recharge source (hydrologic source domain) draining to a node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceShare {
    pub source: u32,
    pub fraction: f64,
}

const DISTRIBUTION_KEY: &str = "groundwater__recharge_distribution";
const MEAN_KEY: &str = "groundwater__recharge_mean";
const STDEV_KEY: &str = "groundwater__recharge_standard_deviation";
const VALUES_KEY: &str = "groundwater__recharge_values";
const SOURCES_KEY: &str = "groundwater__recharge_sources";
const NODE_SOURCES_KEY: &str = "groundwater__recharge_node_sources";

/// Groundwater recharge distribution, in mm/day.
///
/// Serialized with the distribution name under `groundwater__recharge_distribution`
/// and the parameters as sibling keys. When the name is absent the distribution
/// is uniform over the default range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "groundwater__recharge_distribution",
    rename_all = "snake_case",
    try_from = "RechargeKeys"
)]
pub enum RechargeDistribution {
    Uniform {
        #[serde(rename = "groundwater__recharge_min_value")]
        min: f64,
        #[serde(rename = "groundwater__recharge_max_value")]
        max: f64,
    },
    Lognormal {
        #[serde(rename = "groundwater__recharge_mean")]
        mean: f64,
        #[serde(rename = "groundwater__recharge_standard_deviation")]
        stdev: f64,
    },
    LognormalSpatial {
        #[serde(rename = "groundwater__recharge_mean")]
        mean: Vec<f64>,
        #[serde(rename = "groundwater__recharge_standard_deviation")]
        stdev: Vec<f64>,
    },
    Normal {
        #[serde(rename = "groundwater__recharge_mean")]
        mean: f64,
        #[serde(rename = "groundwater__recharge_standard_deviation")]
        stdev: f64,
    },
    // Externally supplied series, one value per iteration
    Fixed {
        #[serde(rename = "groundwater__recharge_values")]
        values: Vec<f64>,
    },
    DataDriven {
        #[serde(rename = "groundwater__recharge_sources")]
        sources: Vec<RechargeSource>,
        #[serde(rename = "groundwater__recharge_node_sources")]
        node_sources: Vec<Vec<SourceShare>>,
    },
}

impl Default for RechargeDistribution {
    fn default() -> Self {
        RechargeDistribution::Uniform {
            min: DEFAULT_RECHARGE_MIN,
            max: DEFAULT_RECHARGE_MAX,
        }
    }
}

// Value of a mean or standard deviation key: one number, or one per node
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Parameter {
    Scalar(f64),
    Spatial(Vec<f64>),
}

// Every recharge key, all optional
#[derive(Debug, Deserialize)]
struct RechargeKeys {
    #[serde(rename = "groundwater__recharge_distribution", default)]
    distribution: Option<String>,
    #[serde(rename = "groundwater__recharge_min_value", default)]
    min: Option<f64>,
    #[serde(rename = "groundwater__recharge_max_value", default)]
    max: Option<f64>,
    #[serde(rename = "groundwater__recharge_mean", default)]
    mean: Option<Parameter>,
    #[serde(rename = "groundwater__recharge_standard_deviation", default)]
    stdev: Option<Parameter>,
    #[serde(rename = "groundwater__recharge_values", default)]
    values: Option<Vec<f64>>,
    #[serde(rename = "groundwater__recharge_sources", default)]
    sources: Option<Vec<RechargeSource>>,
    #[serde(rename = "groundwater__recharge_node_sources", default)]
    node_sources: Option<Vec<Vec<SourceShare>>>,
}

fn required<T>(value: Option<T>, key: &str) -> std::result::Result<T, String> {
    value.ok_or_else(|| format!("missing field `{}`", key))
}

fn scalar(value: Option<Parameter>, key: &str) -> std::result::Result<f64, String> {
    match required(value, key)? {
        Parameter::Scalar(v) => Ok(v),
        Parameter::Spatial(_) => Err(format!("`{}` must be a single number", key)),
    }
}

fn spatial(value: Option<Parameter>, key: &str) -> std::result::Result<Vec<f64>, String> {
    match required(value, key)? {
        Parameter::Spatial(v) => Ok(v),
        Parameter::Scalar(_) => Err(format!("`{}` must be an array with one value per node", key)),
    }
}

impl TryFrom<RechargeKeys> for RechargeDistribution {
    type Error = String;

    fn try_from(keys: RechargeKeys) -> std::result::Result<Self, String> {
        let kind = keys.distribution.as_deref().unwrap_or("uniform");
        let distribution = match kind {
            "uniform" => RechargeDistribution::Uniform {
                min: keys.min.unwrap_or(DEFAULT_RECHARGE_MIN),
                max: keys.max.unwrap_or(DEFAULT_RECHARGE_MAX),
            },
            "lognormal" => RechargeDistribution::Lognormal {
                mean: scalar(keys.mean, MEAN_KEY)?,
                stdev: scalar(keys.stdev, STDEV_KEY)?,
            },
            "lognormal_spatial" => RechargeDistribution::LognormalSpatial {
                mean: spatial(keys.mean, MEAN_KEY)?,
                stdev: spatial(keys.stdev, STDEV_KEY)?,
            },
            "normal" => RechargeDistribution::Normal {
                mean: scalar(keys.mean, MEAN_KEY)?,
                stdev: scalar(keys.stdev, STDEV_KEY)?,
            },
            "fixed" => RechargeDistribution::Fixed {
                values: required(keys.values, VALUES_KEY)?,
            },
            "data_driven" => RechargeDistribution::DataDriven {
                sources: required(keys.sources, SOURCES_KEY)?,
                node_sources: required(keys.node_sources, NODE_SOURCES_KEY)?,
            },
            other => {
                return Err(format!(
                    "unsupported `{}` value `{}`",
                    DISTRIBUTION_KEY, other
                ));
            }
        };
        Ok(distribution)
    }
}

impl RechargeDistribution {
    pub fn kind(&self) -> &'static str {
        match self {
            RechargeDistribution::Uniform { .. } => "uniform",
            RechargeDistribution::Lognormal { .. } => "lognormal",
            RechargeDistribution::LognormalSpatial { .. } => "lognormal_spatial",
            RechargeDistribution::Normal { .. } => "normal",
            RechargeDistribution::Fixed { .. } => "fixed",
            RechargeDistribution::DataDriven { .. } => "data_driven",
        }
    }

    // Length of per-node parameters, if the distribution carries any
    pub fn spatial_len(&self) -> Option<usize> {
        match self {
            RechargeDistribution::LognormalSpatial { mean, .. } => Some(mean.len()),
            RechargeDistribution::DataDriven { node_sources, .. } => Some(node_sources.len()),
            _ => None,
        }
    }

    pub fn validate(&self, number_of_iterations: usize) -> Result<()> {
        match self {
            RechargeDistribution::Uniform { min, max } => {
                check_finite("groundwater__recharge_min_value", *min)?;
                check_finite("groundwater__recharge_max_value", *max)?;
                if min > max {
                    return Err(LandslideError::config(format!(
                        "uniform recharge minimum {} exceeds maximum {}",
                        min, max
                    )));
                }
            }
            RechargeDistribution::Lognormal { mean, stdev } => {
                check_lognormal(*mean, *stdev)?;
            }
            RechargeDistribution::LognormalSpatial { mean, stdev } => {
                if mean.len() != stdev.len() {
                    return Err(LandslideError::config(format!(
                        "lognormal_spatial has {} means but {} standard deviations",
                        mean.len(),
                        stdev.len()
                    )));
                }
                for (&m, &s) in mean.iter().zip(stdev) {
                    check_lognormal(m, s)?;
                }
            }
            RechargeDistribution::Normal { mean, stdev } => {
                check_finite("groundwater__recharge_mean", *mean)?;
                check_stdev(*stdev)?;
            }
            RechargeDistribution::Fixed { values } => {
                if values.len() != number_of_iterations {
                    return Err(LandslideError::config(format!(
                        "fixed recharge series has {} values for {} iterations",
                        values.len(),
                        number_of_iterations
                    )));
                }
                for &value in values {
                    check_finite("groundwater__recharge_values", value)?;
                }
            }
            RechargeDistribution::DataDriven {
                sources,
                node_sources,
            } => {
                let mut ids = BTreeSet::new();
                for source in sources {
                    if !ids.insert(source.id) {
                        return Err(LandslideError::config(format!(
                            "recharge source {} is declared twice",
                            source.id
                        )));
                    }
                    if source.records.is_empty() {
                        return Err(LandslideError::config(format!(
                            "recharge source {} has no records",
                            source.id
                        )));
                    }
                    for &value in &source.records {
                        check_finite("groundwater__recharge_sources", value)?;
                    }
                }
                for (node, shares) in node_sources.iter().enumerate() {
                    for share in shares {
                        if !ids.contains(&share.source) {
                            return Err(LandslideError::config(format!(
                                "node {} references unknown recharge source {}",
                                node, share.source
                            )));
                        }
                        if !share.fraction.is_finite() || share.fraction < 0.0 {
                            return Err(LandslideError::config(format!(
                                "node {} has invalid fraction {} for source {}",
                                node, share.fraction, share.source
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(LandslideError::config(format!("{} must be finite, got {}", name, value)))
    }
}

fn check_stdev(stdev: f64) -> Result<()> {
    if stdev.is_finite() && stdev >= 0.0 {
        Ok(())
    } else {
        Err(LandslideError::config(format!(
            "groundwater__recharge_standard_deviation must be non-negative, got {}",
            stdev
        )))
    }
}

fn check_lognormal(mean: f64, stdev: f64) -> Result<()> {
    if !(mean.is_finite() && mean > 0.0) {
        return Err(LandslideError::config(format!(
            "lognormal recharge mean must be positive, got {}",
            mean
        )));
    }
    check_stdev(stdev)
}

// Construction-time parameters of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandslideConfig {
    #[serde(default = "default_iterations")]
    pub number_of_iterations: usize,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_gravity")]
    pub g: f64,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(flatten)]
    pub recharge: RechargeDistribution,
}

impl Default for LandslideConfig {
    fn default() -> Self {
        LandslideConfig {
            number_of_iterations: DEFAULT_ITERATIONS,
            seed: 0,
            g: STANDARD_GRAVITY,
            threads: None,
            recharge: RechargeDistribution::default(),
        }
    }
}

impl LandslideConfig {
    pub fn new(number_of_iterations: usize, recharge: RechargeDistribution) -> Self {
        LandslideConfig {
            number_of_iterations,
            recharge,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Parse a JSON configuration. Values are checked by `validate`, which
    /// `LandslideProbability::new` calls once any overrides are applied.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| LandslideError::config(format!("invalid configuration: {}", e)))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            LandslideError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.number_of_iterations == 0 {
            return Err(LandslideError::config(
                "number_of_iterations must be a positive integer",
            ));
        }
        if !(self.g.is_finite() && self.g > 0.0) {
            return Err(LandslideError::config(format!(
                "gravitational acceleration must be positive, got {}",
                self.g
            )));
        }
        if self.threads == Some(0) {
            return Err(LandslideError::config("threads must be at least 1"));
        }
        self.recharge.validate(self.number_of_iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_defaults_fill_missing_bounds() {
        let config = LandslideConfig::from_json(
            r#"{"number_of_iterations": 10, "groundwater__recharge_distribution": "uniform"}"#,
        )
        .unwrap();
        assert_eq!(config.number_of_iterations, 10);
        assert_eq!(config.seed, 0);
        assert_eq!(config.recharge, RechargeDistribution::default());
    }

    #[test]
    fn missing_distribution_defaults_to_uniform() {
        let config = LandslideConfig::from_json(r#"{"number_of_iterations": 10}"#).unwrap();
        assert_eq!(config.recharge, RechargeDistribution::default());

        let config = LandslideConfig::from_json(r#"{"groundwater__recharge_max_value": 80}"#)
            .unwrap();
        assert_eq!(
            config.recharge,
            RechargeDistribution::Uniform {
                min: DEFAULT_RECHARGE_MIN,
                max: 80.0
            }
        );
        assert_eq!(LandslideConfig::from_json("{}").unwrap(), LandslideConfig::default());
    }

    #[test]
    fn written_configuration_reads_back() {
        let config = LandslideConfig::new(
            4,
            RechargeDistribution::LognormalSpatial {
                mean: vec![30.0, 40.0],
                stdev: vec![5.0, 6.0],
            },
        )
        .with_seed(12);
        let text = serde_json::to_string(&config).unwrap();
        assert!(text.contains(r#""groundwater__recharge_distribution":"lognormal_spatial""#));
        assert_eq!(LandslideConfig::from_json(&text).unwrap(), config);
    }

    #[test]
    fn missing_parameters_are_configuration_errors() {
        let err = LandslideConfig::from_json(
            r#"{"groundwater__recharge_distribution": "normal", "groundwater__recharge_mean": 5}"#,
        )
        .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("groundwater__recharge_standard_deviation"));

        // a per-node array where one value is expected
        let err = LandslideConfig::from_json(
            r#"{
                "groundwater__recharge_distribution": "lognormal",
                "groundwater__recharge_mean": [30.0, 40.0],
                "groundwater__recharge_standard_deviation": 2.0
            }"#,
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn parsing_defers_validation_until_overrides_apply() {
        // the series length matches the iteration count set later, not the default
        let mut config = LandslideConfig::from_json(
            r#"{
                "groundwater__recharge_distribution": "fixed",
                "groundwater__recharge_values": [10.0, 20.0, 30.0]
            }"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
        config.number_of_iterations = 3;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn lognormal_parameters_parse() {
        let config = LandslideConfig::from_json(
            r#"{
                "seed": 7,
                "groundwater__recharge_distribution": "lognormal",
                "groundwater__recharge_mean": 30.0,
                "groundwater__recharge_standard_deviation": 0.25
            }"#,
        )
        .unwrap();
        assert_eq!(config.number_of_iterations, DEFAULT_ITERATIONS);
        assert_eq!(
            config.recharge,
            RechargeDistribution::Lognormal {
                mean: 30.0,
                stdev: 0.25
            }
        );
    }

    #[test]
    fn data_driven_sources_parse() {
        let config = LandslideConfig::from_json(
            r#"{
                "groundwater__recharge_distribution": "data_driven",
                "groundwater__recharge_sources": [
                    {"id": 1, "records": [10.0, 20.0]},
                    {"id": 2, "records": [5.0]}
                ],
                "groundwater__recharge_node_sources": [
                    [{"source": 1, "fraction": 0.5}, {"source": 2, "fraction": 0.5}],
                    []
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.recharge.kind(), "data_driven");
        assert_eq!(config.recharge.spatial_len(), Some(2));
    }

    #[test]
    fn unsupported_distribution_is_a_configuration_error() {
        let err = LandslideConfig::from_json(
            r#"{"groundwater__recharge_distribution": "weibull"}"#,
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = LandslideConfig::new(0, RechargeDistribution::default());
        assert!(config.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn inverted_uniform_bounds_rejected() {
        let recharge = RechargeDistribution::Uniform {
            min: 120.0,
            max: 20.0,
        };
        assert!(recharge.validate(10).is_err());
    }

    #[test]
    fn fixed_series_must_cover_every_iteration() {
        let recharge = RechargeDistribution::Fixed {
            values: vec![10.0, 20.0],
        };
        assert!(recharge.validate(2).is_ok());
        assert!(recharge.validate(3).is_err());
    }

    #[test]
    fn unknown_source_reference_rejected() {
        let recharge = RechargeDistribution::DataDriven {
            sources: vec![RechargeSource {
                id: 1,
                records: vec![10.0],
            }],
            node_sources: vec![vec![SourceShare {
                source: 9,
                fraction: 1.0,
            }]],
        };
        assert!(recharge.validate(5).is_err());
    }
}
