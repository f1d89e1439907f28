// ABOUTME: Process-wide saturated-vapor-pressure lookup table, built once via OnceLock
// ABOUTME: Shared resource, read-only once initialized, no mutable global state

use std::sync::OnceLock;

const TABLE_MIN_C: f32 = -60.0;
const TABLE_MAX_C: f32 = 60.0;
const TABLE_STEP_C: f32 = 0.5;

fn saturation_vapor_pressure_pa(temp_c: f32) -> f32 {
    // Bolton (1980) approximation, matches the accuracy DHSVM assumes
    // for its svp lookup, here evaluated directly and cached in a table
    // for O(1) lookups.
    611.2 * ((17.67 * temp_c) / (temp_c + 243.5)).exp()
}

struct VaporPressureTable {
    values: Vec<f32>,
}

impl VaporPressureTable {
    fn build() -> Self {
        let n = (((TABLE_MAX_C - TABLE_MIN_C) / TABLE_STEP_C).round() as usize) + 1;
        let values = (0..n)
            .map(|i| saturation_vapor_pressure_pa(TABLE_MIN_C + i as f32 * TABLE_STEP_C))
            .collect();
        Self { values }
    }

    fn lookup(&self, temp_c: f32) -> f32 {
        let clamped = temp_c.clamp(TABLE_MIN_C, TABLE_MAX_C);
        let idx = ((clamped - TABLE_MIN_C) / TABLE_STEP_C).round() as usize;
        self.values[idx.min(self.values.len() - 1)]
    }
}

static TABLE: OnceLock<VaporPressureTable> = OnceLock::new();

/// Saturation vapor pressure (Pa) at `temp_c`, from the process-wide lookup
/// table initialized on first use.
pub fn saturation_vapor_pressure(temp_c: f32) -> f32 {
    TABLE.get_or_init(VaporPressureTable::build).lookup(temp_c)
}

/// Slope of the saturation vapor pressure curve (Pa/°C) at `temp_c`, used by
/// the Penman combination equation in `engine::physics::canopy_et`.
pub fn slope_of_saturation_pressure(temp_c: f32) -> f32 {
    let h = 0.1;
    (saturation_vapor_pressure(temp_c + h) - saturation_vapor_pressure(temp_c - h)) / (2.0 * h)
}

/// Vapor pressure deficit (Pa) given air temperature and relative humidity
/// in [0, 100]. Returns exactly 0 at RH == 100, never negative.
pub fn vapor_pressure_deficit(temp_c: f32, relative_humidity_pct: f32) -> f32 {
    if relative_humidity_pct >= 100.0 {
        return 0.0;
    }
    let es = saturation_vapor_pressure(temp_c);
    let ea = es * (relative_humidity_pct / 100.0);
    (es - ea).max(0.0)
}

/// Psychrometric constant (Pa/°C) at a given atmospheric pressure (Pa).
pub fn psychrometric_constant(pressure_pa: f32, specific_heat_moist_air: f32) -> f32 {
    const LATENT_HEAT_VAPORIZATION: f32 = 2_501_000.0;
    const EPS: f32 = 0.622;
    (specific_heat_moist_air * pressure_pa) / (EPS * LATENT_HEAT_VAPORIZATION)
}
