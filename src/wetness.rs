/// Steady-state relative wetness of the soil column.
///
/// `index` is the unclamped ratio of recharge-driven flux to lateral flow capacity
/// and `relative` is that ratio clamped to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wetness {
    pub index: f64,
    pub relative: f64,
}

impl Wetness {
    pub fn is_saturated(&self) -> bool {
        self.index >= 1.0
    }
}

/// Zero transmissivity always saturates. Flat ground with some transmissivity
/// saturates only under positive flux and is otherwise dry.
pub fn relative_wetness(
    recharge: f64,          // groundwater recharge (m/day)
    transmissivity: f64,    // soil transmissivity (m2/day)
    slope: f64,             // topographic slope (tan theta)
    contributing_area: f64, // specific contributing area (m)
) -> Wetness {
    const SATURATED: Wetness = Wetness {
        index: f64::INFINITY,
        relative: 1.0,
    };

    // Flow capacity exhausted
    if transmissivity <= 0.0 {
        return SATURATED;
    }

    let flux = recharge * contributing_area;
    let capacity = transmissivity * slope.atan().sin();

    // Flat ground: any positive flux saturates the column
    if !(capacity > 0.0) {
        return if flux > 0.0 {
            SATURATED
        } else {
            Wetness {
                index: 0.0,
                relative: 0.0,
            }
        };
    }

    let index = flux / capacity;
    Wetness {
        index,
        relative: index.clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_wetness_is_ratio_of_flux_to_capacity() {
        // slope 0.75 -> sin(theta) = 0.6
        let w = relative_wetness(0.05, 10.0, 0.75, 60.0);
        assert!((w.index - 0.5).abs() < 1e-12);
        assert_eq!(w.index, w.relative);
        assert!(!w.is_saturated());
    }

    #[test]
    fn excess_recharge_is_clamped_to_saturation() {
        let w = relative_wetness(0.1, 5.0, 0.75, 300.0);
        assert!(w.index > 1.0);
        assert_eq!(w.relative, 1.0);
        assert!(w.is_saturated());
    }

    #[test]
    fn negative_recharge_maps_to_dry() {
        let w = relative_wetness(-0.02, 10.0, 0.5, 100.0);
        assert!(w.index < 0.0);
        assert_eq!(w.relative, 0.0);
    }

    #[test]
    fn zero_transmissivity_saturates_without_nan() {
        let w = relative_wetness(0.05, 0.0, 0.5, 100.0);
        assert_eq!(w.relative, 1.0);
        assert!(w.is_saturated());
    }

    #[test]
    fn zero_transmissivity_saturates_regardless_of_flux() {
        let no_area = relative_wetness(0.05, 0.0, 0.5, 0.0);
        assert_eq!(no_area.relative, 1.0);
        assert!(no_area.is_saturated());

        let losing = relative_wetness(-0.01, 0.0, 0.5, 100.0);
        assert_eq!(losing.relative, 1.0);
        assert!(losing.is_saturated());

        assert_eq!(relative_wetness(0.0, 0.0, 0.0, 0.0).relative, 1.0);
    }

    #[test]
    fn flat_ground_saturates_under_recharge() {
        let w = relative_wetness(0.05, 10.0, 0.0, 100.0);
        assert_eq!(w.relative, 1.0);
        let dry = relative_wetness(0.05, 10.0, 0.0, 0.0);
        assert_eq!(dry.relative, 0.0);
        assert!(!dry.relative.is_nan());
    }
}
