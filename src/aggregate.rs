use crate::error::{LandslideError, Result};
use crate::fields::{self, FieldAccessor};

// Outcome of one node in one iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeOutcome {
    pub failed: bool,
    pub saturated: bool,
    pub relative_wetness: f64,
}

/// Running per-node totals for one simulation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    failure_counts: Vec<u64>,
    saturation_counts: Vec<u64>,
    wetness_sums: Vec<f64>,
    iterations: usize,
}

impl Accumulator {
    pub fn new(node_count: usize) -> Self {
        Accumulator {
            failure_counts: vec![0; node_count],
            saturation_counts: vec![0; node_count],
            wetness_sums: vec![0.0; node_count],
            iterations: 0,
        }
    }

    pub fn node_count(&self) -> usize {
        self.failure_counts.len()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn record(&mut self, node: usize, outcome: &NodeOutcome) {
        if outcome.failed {
            self.failure_counts[node] += 1;
        }
        if outcome.saturated {
            self.saturation_counts[node] += 1;
        }
        self.wetness_sums[node] += outcome.relative_wetness;
    }

    /// Fold one iteration's `(node, outcome)` pairs into the totals.
    pub fn record_iteration(&mut self, outcomes: &[(usize, NodeOutcome)]) {
        for (node, outcome) in outcomes {
            self.record(*node, outcome);
        }
        self.iterations += 1;
    }

    /// Element-wise sum with an accumulator covering a disjoint set of iterations.
    pub fn merge(mut self, other: Accumulator) -> Result<Accumulator> {
        if self.node_count() != other.node_count() {
            return Err(LandslideError::config(format!(
                "cannot merge accumulators over {} and {} nodes",
                self.node_count(),
                other.node_count()
            )));
        }
        for (a, b) in self.failure_counts.iter_mut().zip(other.failure_counts) {
            *a += b;
        }
        for (a, b) in self.saturation_counts.iter_mut().zip(other.saturation_counts) {
            *a += b;
        }
        for (a, b) in self.wetness_sums.iter_mut().zip(other.wetness_sums) {
            *a += b;
        }
        self.iterations += other.iterations;
        Ok(self)
    }

    pub fn failure_count(&self, node: usize) -> u64 {
        self.failure_counts[node]
    }

    /// Divide the totals by the number of recorded iterations.
    pub fn finish(&self) -> Result<LandslideOutputs> {
        if self.iterations == 0 {
            return Err(LandslideError::config("no iterations were recorded"));
        }
        let n = self.iterations as f64;
        Ok(LandslideOutputs {
            probability_of_failure: self
                .failure_counts
                .iter()
                .map(|&count| count as f64 / n)
                .collect(),
            mean_relative_wetness: self.wetness_sums.iter().map(|&sum| sum / n).collect(),
            probability_of_saturation: self
                .saturation_counts
                .iter()
                .map(|&count| count as f64 / n)
                .collect(),
        })
    }
}

// Final per-node output fields
#[derive(Debug, Clone, PartialEq)]
pub struct LandslideOutputs {
    pub probability_of_failure: Vec<f64>,
    pub mean_relative_wetness: Vec<f64>,
    pub probability_of_saturation: Vec<f64>,
}

impl LandslideOutputs {
    pub fn node_count(&self) -> usize {
        self.probability_of_failure.len()
    }

    pub fn fields(&self) -> [(&'static str, &[f64]); 3] {
        [
            (
                fields::PROBABILITY_OF_FAILURE,
                self.probability_of_failure.as_slice(),
            ),
            (
                fields::MEAN_RELATIVE_WETNESS,
                self.mean_relative_wetness.as_slice(),
            ),
            (
                fields::PROBABILITY_OF_SATURATION,
                self.probability_of_saturation.as_slice(),
            ),
        ]
    }

    /// Write every output field, or none of them if any has the wrong length.
    pub fn write_to<F: FieldAccessor + ?Sized>(&self, accessor: &mut F) -> Result<()> {
        let expected = accessor.node_count();
        for (name, values) in self.fields() {
            if values.len() != expected {
                return Err(LandslideError::FieldLength {
                    field: name.to_string(),
                    expected,
                    actual: values.len(),
                });
            }
        }
        for (name, values) in self.fields() {
            accessor.set_field(name, values.to_vec())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::NodeFields;

    fn outcome(failed: bool, relative_wetness: f64) -> NodeOutcome {
        NodeOutcome {
            failed,
            saturated: relative_wetness >= 1.0,
            relative_wetness,
        }
    }

    #[test]
    fn counts_become_fractions_of_iterations() {
        let mut acc = Accumulator::new(2);
        acc.record_iteration(&[(0, outcome(true, 1.0)), (1, outcome(false, 0.2))]);
        acc.record_iteration(&[(0, outcome(false, 0.5)), (1, outcome(false, 0.4))]);
        assert_eq!(acc.iterations(), 2);

        let out = acc.finish().unwrap();
        assert_eq!(out.probability_of_failure, vec![0.5, 0.0]);
        assert_eq!(out.mean_relative_wetness, vec![0.75, 0.30000000000000004]);
        assert_eq!(out.probability_of_saturation, vec![0.5, 0.0]);
    }

    #[test]
    fn merge_sums_disjoint_iterations() {
        let mut a = Accumulator::new(1);
        a.record_iteration(&[(0, outcome(true, 0.5))]);
        let mut b = Accumulator::new(1);
        b.record_iteration(&[(0, outcome(true, 0.25))]);
        b.record_iteration(&[(0, outcome(false, 0.25))]);

        let merged = a.merge(b).unwrap();
        assert_eq!(merged.iterations(), 3);
        assert_eq!(merged.failure_count(0), 2);
        assert_eq!(merged.finish().unwrap().mean_relative_wetness, vec![1.0 / 3.0]);
    }

    #[test]
    fn probabilities_never_exceed_one() {
        let mut acc = Accumulator::new(1);
        for _ in 0..3 {
            acc.record_iteration(&[(0, outcome(true, 1.0))]);
        }
        let out = acc.finish().unwrap();
        assert_eq!(out.probability_of_failure, vec![1.0]);
        assert_eq!(out.probability_of_saturation, vec![1.0]);
        assert!(Accumulator::new(1).finish().unwrap_err().is_configuration());
    }

    #[test]
    fn merge_rejects_mismatched_shapes() {
        assert!(Accumulator::new(1).merge(Accumulator::new(2)).is_err());
    }

    #[test]
    fn outputs_are_written_all_or_nothing() {
        let mut grid = NodeFields::new(3);
        let short = LandslideOutputs {
            probability_of_failure: vec![0.0; 3],
            mean_relative_wetness: vec![0.0; 3],
            probability_of_saturation: vec![0.0; 2],
        };
        assert!(short.write_to(&mut grid).is_err());
        assert!(!grid.has_field(fields::PROBABILITY_OF_FAILURE));

        let mut acc = Accumulator::new(3);
        acc.record_iteration(&[]);
        let outputs = acc.finish().unwrap();
        outputs.write_to(&mut grid).unwrap();
        for name in fields::output_var_names() {
            assert_eq!(grid.get_field(name).unwrap(), &[0.0; 3]);
        }
    }
}
