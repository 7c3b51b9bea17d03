use crate::error::{LandslideError, Result};
use std::collections::HashMap;

pub const SLOPE: &str = "topographic__slope";
pub const CONTRIBUTING_AREA: &str = "topographic__specific_contributing_area";
pub const TRANSMISSIVITY: &str = "soil__transmissivity";
pub const MODE_COHESION: &str = "soil__mode_total_cohesion";
pub const MIN_COHESION: &str = "soil__minimum_total_cohesion";
pub const MAX_COHESION: &str = "soil__maximum_total_cohesion";
pub const FRICTION_ANGLE: &str = "soil__internal_friction_angle";
pub const DENSITY: &str = "soil__density";
pub const THICKNESS: &str = "soil__thickness";

pub const PROBABILITY_OF_FAILURE: &str = "landslide__probability_of_failure";
pub const MEAN_RELATIVE_WETNESS: &str = "soil__mean_relative_wetness";
pub const PROBABILITY_OF_SATURATION: &str = "soil__probability_of_saturation";

// Declared metadata for one node field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub units: &'static str,
    pub description: &'static str,
}

pub const INPUT_FIELDS: [FieldSpec; 9] = [
    FieldSpec {
        name: SLOPE,
        units: "tan theta",
        description: "gradient of the ground surface",
    },
    FieldSpec {
        name: CONTRIBUTING_AREA,
        units: "m",
        description: "specific contributing (upslope area/cell face) that drains to node",
    },
    FieldSpec {
        name: TRANSMISSIVITY,
        units: "m2/day",
        description: "mode rate of water transmitted through a unit width of saturated soil",
    },
    FieldSpec {
        name: MODE_COHESION,
        units: "Pa or kg/m-s2",
        description: "mode of combined root and soil cohesion at node",
    },
    FieldSpec {
        name: MIN_COHESION,
        units: "Pa or kg/m-s2",
        description: "minimum of combined root and soil cohesion at node",
    },
    FieldSpec {
        name: MAX_COHESION,
        units: "Pa or kg/m-s2",
        description: "maximum of combined root and soil cohesion at node",
    },
    FieldSpec {
        name: FRICTION_ANGLE,
        units: "degrees",
        description: "critical angle just before failure due to friction between particles",
    },
    FieldSpec {
        name: DENSITY,
        units: "kg/m3",
        description: "wet bulk density of soil",
    },
    FieldSpec {
        name: THICKNESS,
        units: "m",
        description: "soil depth to restrictive layer",
    },
];

pub const OUTPUT_FIELDS: [FieldSpec; 3] = [
    FieldSpec {
        name: PROBABILITY_OF_FAILURE,
        units: "None",
        description: "number of times FS is <=1 out of number of iterations user selected",
    },
    FieldSpec {
        name: MEAN_RELATIVE_WETNESS,
        units: "None",
        description: "indicator of soil wetness; relative depth perched water table within the soil layer",
    },
    FieldSpec {
        name: PROBABILITY_OF_SATURATION,
        units: "None",
        description: "number of times relative wetness is >=1 out of number of iterations user selected",
    },
];

pub fn input_var_names() -> impl Iterator<Item = &'static str> {
    INPUT_FIELDS.iter().map(|spec| spec.name)
}

pub fn output_var_names() -> impl Iterator<Item = &'static str> {
    OUTPUT_FIELDS.iter().map(|spec| spec.name)
}

pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    INPUT_FIELDS
        .iter()
        .chain(OUTPUT_FIELDS.iter())
        .find(|spec| spec.name == name)
}

pub fn var_units(name: &str) -> Option<&'static str> {
    field_spec(name).map(|spec| spec.units)
}

/// Access to named per-node arrays on a grid.
///
/// The engine reads its inputs and writes its outputs exclusively through this
/// trait, so any grid representation can host the simulation.
pub trait FieldAccessor {
    fn node_count(&self) -> usize;

    fn get_field(&self, name: &str) -> Result<&[f64]>;

    /// Create or overwrite `name`; `values` must hold one entry per node.
    fn set_field(&mut self, name: &str, values: Vec<f64>) -> Result<()>;

    fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_ok()
    }

    /// Boundary nodes are skipped by the simulation and receive zero outputs.
    fn is_core_node(&self, _node: usize) -> bool {
        true
    }
}

// In-memory node fields with an optional core-node mask
#[derive(Debug, Clone, Default)]
pub struct NodeFields {
    node_count: usize,
    fields: HashMap<String, Vec<f64>>,
    core_mask: Option<Vec<bool>>,
}

impl NodeFields {
    pub fn new(node_count: usize) -> Self {
        NodeFields {
            node_count,
            fields: HashMap::new(),
            core_mask: None,
        }
    }

    /// Row-major raster whose perimeter nodes are boundary nodes.
    pub fn raster(rows: usize, cols: usize) -> Self {
        let mask = (0..rows * cols)
            .map(|node| {
                let (row, col) = (node / cols, node % cols);
                row > 0 && row + 1 < rows && col > 0 && col + 1 < cols
            })
            .collect();
        NodeFields {
            node_count: rows * cols,
            fields: HashMap::new(),
            core_mask: Some(mask),
        }
    }

    pub fn with_core_mask(mut self, mask: Vec<bool>) -> Result<Self> {
        if mask.len() != self.node_count {
            return Err(LandslideError::FieldLength {
                field: "core mask".to_string(),
                expected: self.node_count,
                actual: mask.len(),
            });
        }
        self.core_mask = Some(mask);
        Ok(self)
    }

    pub fn core_nodes(&self) -> Vec<usize> {
        (0..self.node_count)
            .filter(|&node| self.is_core_node(node))
            .collect()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl FieldAccessor for NodeFields {
    fn node_count(&self) -> usize {
        self.node_count
    }

    fn get_field(&self, name: &str) -> Result<&[f64]> {
        self.fields
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| LandslideError::MissingField(name.to_string()))
    }

    fn set_field(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.node_count {
            return Err(LandslideError::FieldLength {
                field: name.to_string(),
                expected: self.node_count,
                actual: values.len(),
            });
        }
        self.fields.insert(name.to_string(), values);
        Ok(())
    }

    fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    fn is_core_node(&self, node: usize) -> bool {
        match &self.core_mask {
            Some(mask) => mask.get(node).copied().unwrap_or(false),
            None => node < self.node_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_names_match_declared_set() {
        let mut names: Vec<_> = input_var_names().collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "soil__density",
                "soil__internal_friction_angle",
                "soil__maximum_total_cohesion",
                "soil__minimum_total_cohesion",
                "soil__mode_total_cohesion",
                "soil__thickness",
                "soil__transmissivity",
                "topographic__slope",
                "topographic__specific_contributing_area",
            ]
        );
    }

    #[test]
    fn units_are_declared_for_every_field() {
        assert_eq!(var_units(SLOPE), Some("tan theta"));
        assert_eq!(var_units(CONTRIBUTING_AREA), Some("m"));
        assert_eq!(var_units(TRANSMISSIVITY), Some("m2/day"));
        assert_eq!(var_units(MIN_COHESION), Some("Pa or kg/m-s2"));
        assert_eq!(var_units(FRICTION_ANGLE), Some("degrees"));
        assert_eq!(var_units(DENSITY), Some("kg/m3"));
        assert_eq!(var_units(THICKNESS), Some("m"));
        assert_eq!(var_units(PROBABILITY_OF_FAILURE), Some("None"));
        assert_eq!(var_units(MEAN_RELATIVE_WETNESS), Some("None"));
        assert_eq!(var_units("not_a_var_name"), None);
    }

    #[test]
    fn missing_field_is_reported_by_name() {
        let fields = NodeFields::new(4);
        assert_eq!(
            fields.get_field("not_a_var_name"),
            Err(LandslideError::MissingField("not_a_var_name".to_string()))
        );
    }

    #[test]
    fn set_field_rejects_wrong_length() {
        let mut fields = NodeFields::new(4);
        let err = fields.set_field(SLOPE, vec![0.0; 3]).unwrap_err();
        assert!(err.is_configuration());
        assert!(!fields.has_field(SLOPE));
    }

    #[test]
    fn raster_marks_perimeter_as_boundary() {
        let fields = NodeFields::raster(5, 4);
        assert_eq!(fields.node_count(), 20);
        assert_eq!(fields.core_nodes(), vec![5, 6, 9, 10, 13, 14]);
    }
}
