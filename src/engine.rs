//! Monte Carlo driver: validation, iterations and accumulation.

use crate::aggregate::{Accumulator, LandslideOutputs, NodeOutcome};
use crate::config::LandslideConfig;
use crate::error::{LandslideError, Result};
use crate::fields::{self, FieldAccessor};
use crate::sampler::{
    RechargeSampler, THICKNESS_SPREAD, TRANSMISSIVITY_SPREAD, cohesion_distribution,
    friction_angle_distribution, node_rng, spread_distribution,
};
use crate::stability::{SoilColumn, is_failure};
use crate::wetness::relative_wetness;
use indicatif::ProgressBar;
use rand_distr::{Distribution, Triangular};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

fn read_field<'a, F: FieldAccessor + ?Sized>(grid: &'a F, name: &str) -> Result<&'a [f64]> {
    let values = grid.get_field(name)?;
    if values.len() != grid.node_count() {
        return Err(LandslideError::FieldLength {
            field: name.to_string(),
            expected: grid.node_count(),
            actual: values.len(),
        });
    }
    Ok(values)
}

// Everything fixed about one core node for the duration of a run
#[derive(Debug, Clone)]
pub struct NodeInputs {
    pub node: usize,
    // modal soil column, as read from the grid
    pub column: SoilColumn,
    pub transmissivity: Triangular<f64>,
    pub cohesion: Triangular<f64>,
    pub friction_angle: Triangular<f64>,
    pub thickness: Triangular<f64>,
}

/// Monte Carlo landslide probability over the nodes of a grid.
pub struct LandslideProbability {
    config: LandslideConfig,
    recharge: RechargeSampler,
    progress: Option<Arc<ProgressBar>>,
}

impl LandslideProbability {
    pub const NAME: &'static str = "Landslide Probability";

    pub fn new(config: LandslideConfig) -> Result<Self> {
        config.validate()?;
        let recharge = RechargeSampler::new(&config.recharge)?;
        Ok(LandslideProbability {
            config,
            recharge,
            progress: None,
        })
    }

    /// Tick `pb` once per completed iteration.
    pub fn with_progress(mut self, pb: Arc<ProgressBar>) -> Self {
        self.progress = Some(pb);
        self
    }

    pub fn config(&self) -> &LandslideConfig {
        &self.config
    }

    pub fn number_of_iterations(&self) -> usize {
        self.config.number_of_iterations
    }

    /// Run the full simulation and write the output fields onto `grid`.
    ///
    /// Inputs are validated before the first iteration; on error nothing is
    /// written.
    pub fn calculate_landslide_probability<F: FieldAccessor + ?Sized>(
        &self,
        grid: &mut F,
    ) -> Result<LandslideOutputs> {
        let node_count = grid.node_count();
        let nodes = self.read_inputs(&*grid)?;

        info!(
            nodes = node_count,
            core_nodes = nodes.len(),
            iterations = self.config.number_of_iterations,
            recharge = self.config.recharge.kind(),
            seed = self.config.seed,
            "starting landslide probability simulation"
        );
        let start = Instant::now();

        let accumulator = self.simulate(&nodes, node_count)?;
        let outputs = accumulator.finish()?;
        outputs.write_to(grid)?;

        if !nodes.is_empty() {
            let mean_probability = nodes
                .iter()
                .map(|n| outputs.probability_of_failure[n.node])
                .sum::<f64>()
                / nodes.len() as f64;
            debug!(mean_probability, "core node failure probability");
        }
        info!(elapsed = ?start.elapsed(), "landslide probability simulation complete");
        Ok(outputs)
    }

    /// Read and validate the fixed inputs of every core node.
    pub fn read_inputs<F: FieldAccessor + ?Sized>(&self, grid: &F) -> Result<Vec<NodeInputs>> {
        let node_count = grid.node_count();
        for spec in &fields::INPUT_FIELDS {
            read_field(grid, spec.name)?;
        }

        if let Some(len) = self.recharge.spatial_len() {
            if len != node_count {
                return Err(LandslideError::config(format!(
                    "{} recharge carries parameters for {} nodes, grid has {}",
                    self.config.recharge.kind(),
                    len,
                    node_count
                )));
            }
        }

        let slope = read_field(grid, fields::SLOPE)?;
        let area = read_field(grid, fields::CONTRIBUTING_AREA)?;
        let transmissivity = read_field(grid, fields::TRANSMISSIVITY)?;
        let min_cohesion = read_field(grid, fields::MIN_COHESION)?;
        let mode_cohesion = read_field(grid, fields::MODE_COHESION)?;
        let max_cohesion = read_field(grid, fields::MAX_COHESION)?;
        let friction_angle = read_field(grid, fields::FRICTION_ANGLE)?;
        let density = read_field(grid, fields::DENSITY)?;
        let thickness = read_field(grid, fields::THICKNESS)?;

        let mut nodes = Vec::new();
        let mut dry_nodes = 0;
        for node in (0..node_count).filter(|&node| grid.is_core_node(node)) {
            let column = SoilColumn {
                slope: slope[node],
                contributing_area: area[node],
                transmissivity: transmissivity[node],
                friction_angle: friction_angle[node],
                density: density[node],
                thickness: thickness[node],
            };
            column.validate(node)?;
            if min_cohesion[node] < 0.0 {
                return Err(LandslideError::Domain {
                    field: fields::MIN_COHESION.to_string(),
                    node,
                    value: min_cohesion[node],
                    reason: "cohesion must be non-negative",
                });
            }
            let cohesion =
                cohesion_distribution(min_cohesion[node], mode_cohesion[node], max_cohesion[node])
                    .map_err(|e| match e {
                        LandslideError::Configuration(msg) => {
                            LandslideError::config(format!("node {}: {}", node, msg))
                        }
                        other => other,
                    })?;
            if column.transmissivity == 0.0 {
                dry_nodes += 1;
            }
            nodes.push(NodeInputs {
                node,
                column,
                transmissivity: spread_distribution(column.transmissivity, TRANSMISSIVITY_SPREAD)?,
                cohesion,
                friction_angle: friction_angle_distribution(column.friction_angle)?,
                thickness: spread_distribution(column.thickness, THICKNESS_SPREAD)?,
            });
        }
        if dry_nodes > 0 {
            warn!(
                nodes = dry_nodes,
                "zero transmissivity; these nodes are treated as saturated"
            );
        }
        Ok(nodes)
    }

    /// One Monte Carlo trial of `inputs` in `iteration`.
    pub fn trial(&self, inputs: &NodeInputs, iteration: usize) -> NodeOutcome {
        let mut rng = node_rng(self.config.seed, inputs.node, iteration);
        // draw order: recharge, transmissivity, cohesion, friction angle, thickness
        let recharge = self.recharge.sample(inputs.node, iteration, &mut rng);
        let transmissivity = inputs.transmissivity.sample(&mut rng);
        let cohesion = inputs.cohesion.sample(&mut rng);
        let friction_angle = inputs.friction_angle.sample(&mut rng);
        let thickness = inputs.thickness.sample(&mut rng);

        let column = SoilColumn {
            transmissivity,
            friction_angle,
            thickness,
            ..inputs.column
        };
        let wetness = relative_wetness(
            recharge,
            column.transmissivity,
            column.slope,
            column.contributing_area,
        );
        let fs = column.factor_of_safety(cohesion, wetness.relative, self.config.g);

        NodeOutcome {
            failed: is_failure(fs),
            saturated: wetness.is_saturated(),
            relative_wetness: wetness.relative,
        }
    }

    /// Run every iteration over `nodes` and return the running totals.
    pub fn simulate(&self, nodes: &[NodeInputs], node_count: usize) -> Result<Accumulator> {
        let threads = self.config.threads.unwrap_or_else(num_cpus::get);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| LandslideError::config(format!("failed to build thread pool: {}", e)))?;

        let mut accumulator = Accumulator::new(node_count);
        pool.install(|| {
            for iteration in 0..self.config.number_of_iterations {
                let outcomes: Vec<(usize, NodeOutcome)> = nodes
                    .par_iter()
                    .map(|inputs| (inputs.node, self.trial(inputs, iteration)))
                    .collect();
                accumulator.record_iteration(&outcomes);

                if let Some(pb) = &self.progress {
                    pb.inc(1);
                }
            }
        });
        if let Some(pb) = &self.progress {
            pb.finish();
        }
        Ok(accumulator)
    }
}
