//! Infinite-slope factor of safety.

use crate::error::{LandslideError, Result};
use crate::fields;

// kg/m3
pub const WATER_DENSITY: f64 = 1000.0;
/// Reported for flat ground, which has no gravitational driving shear.
pub const STABLE_FACTOR_OF_SAFETY: f64 = f64::MAX;

// Fixed, non-sampled properties of one node's soil column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoilColumn {
    pub slope: f64,             // tan theta
    pub contributing_area: f64, // m
    pub transmissivity: f64,    // m2/day
    pub friction_angle: f64,    // degrees
    pub density: f64,           // kg/m3
    pub thickness: f64,         // m
}

fn domain(field: &str, node: usize, value: f64, reason: &'static str) -> LandslideError {
    LandslideError::Domain {
        field: field.to_string(),
        node,
        value,
        reason,
    }
}

impl SoilColumn {
    pub fn validate(&self, node: usize) -> Result<()> {
        let checks = [
            (fields::SLOPE, self.slope),
            (fields::CONTRIBUTING_AREA, self.contributing_area),
            (fields::TRANSMISSIVITY, self.transmissivity),
            (fields::FRICTION_ANGLE, self.friction_angle),
            (fields::DENSITY, self.density),
            (fields::THICKNESS, self.thickness),
        ];
        for (field, value) in checks {
            if !value.is_finite() {
                return Err(domain(field, node, value, "value must be finite"));
            }
        }
        if self.slope < 0.0 {
            return Err(domain(fields::SLOPE, node, self.slope, "slope must be non-negative"));
        }
        if self.contributing_area < 0.0 {
            return Err(domain(
                fields::CONTRIBUTING_AREA,
                node,
                self.contributing_area,
                "contributing area must be non-negative",
            ));
        }
        if self.transmissivity < 0.0 {
            return Err(domain(
                fields::TRANSMISSIVITY,
                node,
                self.transmissivity,
                "transmissivity must be non-negative",
            ));
        }
        if !(0.0..=90.0).contains(&self.friction_angle) {
            return Err(domain(
                fields::FRICTION_ANGLE,
                node,
                self.friction_angle,
                "friction angle must lie within [0, 90] degrees",
            ));
        }
        if self.density <= 0.0 {
            return Err(domain(fields::DENSITY, node, self.density, "density must be positive"));
        }
        if self.thickness <= 0.0 {
            return Err(domain(
                fields::THICKNESS,
                node,
                self.thickness,
                "thickness must be positive",
            ));
        }
        Ok(())
    }

    /// Factor of safety for one draw of cohesion (Pa) and relative wetness.
    ///
    /// FS = C / (rho g h sin) + cos tan(phi) (1 - w rho_w / rho) / sin
    pub fn factor_of_safety(&self, cohesion: f64, wetness: f64, g: f64) -> f64 {
        if self.slope <= 0.0 {
            return STABLE_FACTOR_OF_SAFETY;
        }
        let theta = self.slope.atan();
        let (sin, cos) = theta.sin_cos();

        let dimensionless_cohesion = cohesion / (self.thickness * self.density * g);
        let friction = self.friction_angle.to_radians().tan()
            * (1.0 - wetness * WATER_DENSITY / self.density);

        let fs = dimensionless_cohesion / sin + cos * friction / sin;
        fs.max(0.0)
    }
}

pub fn is_failure(factor_of_safety: f64) -> bool {
    factor_of_safety <= 1.0
}
