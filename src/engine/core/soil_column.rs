// ABOUTME: Per-cell soil column data model - layered moisture/temperature state and soil class table
// ABOUTME: Brooks-Corey parameters are indexed by soil class, shared across every cell of that class

use crate::engine::error::{CoreError, CoreResult};

/// Static Brooks-Corey properties for one soil class, shared by every cell
/// whose `soil_class_id` points at it.
#[derive(Clone, Debug)]
pub struct SoilClass {
    pub id: u32,
    pub porosity: Vec<f32>,
    pub field_capacity: Vec<f32>,
    /// Residual moisture; DHSVM assumes 0.0 throughout.
    pub residual: f32,
    pub ks_vertical: Vec<f32>,
    pub pore_size_index: Vec<f32>,
    pub ks_lateral: f32,
    pub ks_lateral_exponent: f32,
    pub depth_threshold: f32,
    /// Static infiltration capacity (m/s), used when the configured
    /// infiltration scheme is `static`.
    pub max_infiltration: f32,
}

/// State of one soil layer (root-zone or deep).
#[derive(Clone, Copy, Debug, Default)]
pub struct SoilLayer {
    pub moisture: f32,
    pub temperature: f32,
    pub thickness: f32,
    pub percolation_area_fraction: f32,
    /// Previous step's drainage, retained for the Crank-Nicolson-style
    /// smoothing in `engine::physics::soil_water`.
    pub prev_drainage: f32,
}

/// Full per-cell soil column: an ordered list of root-zone layers plus one
/// deep layer beneath the deepest root layer.
#[derive(Clone, Debug)]
pub struct SoilColumn {
    pub soil_class_id: u32,
    pub total_depth: f32,
    pub root_layers: Vec<SoilLayer>,
    pub deep_layer: SoilLayer,
    /// Cumulative infiltration since the current storm began, used by the
    /// dynamic Parlange-Smith infiltration capacity.
    pub storm_cumulative_infiltration: f32,
    pub surface_ponding: f32,
}

impl SoilColumn {
    /// Total water-table depth: distance from the surface to the top of the
    /// saturated zone. Returns a negative value for
    /// ponding (caller converts this to `surface_ponding`).
    pub fn water_table_depth(&self, class: &SoilClass) -> f32 {
        let mut excess_above_fcap = 0.0f32;

        for (i, layer) in self.root_layers.iter().enumerate() {
            let fcap = class.field_capacity[i];
            if layer.moisture > fcap {
                excess_above_fcap += (layer.moisture - fcap) * layer.thickness;
            }
        }
        // Deep layer: any excess above field capacity there is saturation that
        // reaches upward (DHSVM's WaterTableDepth.c dual algorithm).
        let deep_fcap = *class.field_capacity.last().unwrap_or(&0.0);
        if self.deep_layer.moisture > deep_fcap {
            excess_above_fcap += (self.deep_layer.moisture - deep_fcap) * self.deep_layer.thickness;
        }

        if excess_above_fcap <= 0.0 {
            return self.total_depth;
        }

        // Search from the bottom for the shallowest level at which the
        // saturated column above it accounts for all of excess_above_fcap.
        let mut remaining = excess_above_fcap;
        let mut level_depth = self.total_depth;
        for (i, layer) in self.root_layers.iter().enumerate().rev() {
            let por = class.porosity[i];
            let fcap = class.field_capacity[i];
            let capacity = (por - fcap) * layer.thickness;
            if remaining <= capacity {
                return (level_depth - (remaining / (por - fcap).max(1e-6))).max(depth_prefix_sum(
                    &self.root_layers,
                    i,
                ));
            }
            remaining -= capacity;
            level_depth -= layer.thickness;
        }
        // Excess exceeds total root-zone capacity: ponding at the surface.
        -(remaining / 1.0)
    }

    /// 0 <= moisture[i] <= porosity[i] for every root layer plus the deep
    /// layer.
    pub fn check_bounds(&self, class: &SoilClass) -> CoreResult<()> {
        for (i, layer) in self.root_layers.iter().enumerate() {
            if layer.moisture < -1e-5 || layer.moisture > class.porosity[i] + 1e-5 {
                return Err(CoreError::Supersaturated { y: 0, x: 0 });
            }
        }
        Ok(())
    }
}

fn depth_prefix_sum(layers: &[SoilLayer], up_to_exclusive: usize) -> f32 {
    layers[..up_to_exclusive].iter().map(|l| l.thickness).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_class() -> SoilClass {
        SoilClass {
            id: 1,
            porosity: vec![0.45, 0.45],
            field_capacity: vec![0.30, 0.30],
            residual: 0.0,
            ks_vertical: vec![1e-5, 1e-5],
            pore_size_index: vec![0.3, 0.3],
            ks_lateral: 1e-4,
            ks_lateral_exponent: 0.0,
            depth_threshold: 1.0,
            max_infiltration: 1e-5,
        }
    }

    #[test]
    fn water_table_at_total_depth_when_unsaturated() {
        let class = sample_class();
        let column = SoilColumn {
            soil_class_id: 1,
            total_depth: 2.0,
            root_layers: vec![
                SoilLayer {
                    moisture: 0.30,
                    thickness: 1.0,
                    ..Default::default()
                },
                SoilLayer {
                    moisture: 0.30,
                    thickness: 1.0,
                    ..Default::default()
                },
            ],
            deep_layer: SoilLayer {
                moisture: 0.30,
                thickness: 1.0,
                ..Default::default()
            },
            storm_cumulative_infiltration: 0.0,
            surface_ponding: 0.0,
        };
        assert_eq!(column.water_table_depth(&class), 2.0);
    }

    #[test]
    fn bounds_check_rejects_supersaturation() {
        let class = sample_class();
        let column = SoilColumn {
            soil_class_id: 1,
            total_depth: 1.0,
            root_layers: vec![SoilLayer {
                moisture: 0.9,
                thickness: 1.0,
                ..Default::default()
            }],
            deep_layer: SoilLayer::default(),
            storm_cumulative_infiltration: 0.0,
            surface_ponding: 0.0,
        };
        assert!(column.check_bounds(&class).is_err());
    }
}
