// ABOUTME: Canopy interception/ET kernel - Penman combination, wet/dry split, stomatal resistance
// ABOUTME: Soil evaporation from the top layer is desorption-limited per Brooks-Corey sorptivity

use crate::engine::physics::vapor_pressure::{
    psychrometric_constant, slope_of_saturation_pressure, vapor_pressure_deficit,
};

/// Potential evaporation (m/s) via the Penman combination equation.
pub fn penman_potential_evaporation(
    net_radiation: f32,
    air_temp_c: f32,
    vpd_pa: f32,
    aerodynamic_resistance: f32,
    air_pressure_pa: f32,
    specific_heat_moist_air: f32,
    water_density: f32,
    latent_heat_vaporization: f32,
) -> f32 {
    let slope = slope_of_saturation_pressure(air_temp_c);
    let gamma = psychrometric_constant(air_pressure_pa, specific_heat_moist_air);

    let aero_demand = if aerodynamic_resistance > 0.0 {
        (specific_heat_moist_air * 1.2 * vpd_pa) / (gamma * aerodynamic_resistance)
    } else {
        0.0 // zero wind -> infinite resistance -> no turbulent flux
    };

    let numerator = slope * net_radiation.max(0.0) + gamma * aero_demand;
    let denominator = (slope + gamma) * water_density * latent_heat_vaporization;
    if denominator > 0.0 {
        (numerator / denominator).max(0.0)
    } else {
        0.0
    }
}

/// Aerodynamic resistance (s/m), stability-uncorrected baseline. Zero wind
/// sets aerodynamic resistance to infinity, so turbulent fluxes vanish
/// instead of producing a division by zero.
pub fn aerodynamic_resistance(wind_ms: f32, reference_height: f32, z0: f32, von_karman: f32) -> f32 {
    if wind_ms <= 0.0 {
        return f32::INFINITY;
    }
    let d0 = 0.63 * z0 / 0.13;
    let ln_term = ((reference_height - d0) / z0).ln();
    (ln_term * ln_term) / (von_karman * von_karman * wind_ms)
}

/// Wet-leaf fraction: `(intercepted_rain / max_interception)^(2/3)`.
pub fn wet_leaf_fraction(intercepted_rain: f32, max_interception: f32) -> f32 {
    if max_interception <= 0.0 {
        return 0.0;
    }
    (intercepted_rain / max_interception).clamp(0.0, 1.0).powf(2.0 / 3.0)
}

/// Soil-moisture stress factor: ramps linearly from 0 at wilting point to 1
/// at `threshold`.
pub fn soil_moisture_stress(moisture: f32, wilting_point: f32, threshold: f32) -> f32 {
    if threshold <= wilting_point {
        return if moisture >= threshold { 1.0 } else { 0.0 };
    }
    ((moisture - wilting_point) / (threshold - wilting_point)).clamp(0.0, 1.0)
}

/// Canopy (stomatal) resistance as a function of LAI, radiation, VPD, soil
/// temperature and a root-weighted soil-moisture stress factor.
#[allow(clippy::too_many_arguments)]
pub fn canopy_resistance(
    lai: f32,
    min_stomatal_resistance: f32,
    max_stomatal_resistance: f32,
    net_radiation: f32,
    radiation_half_saturation: f32,
    vpd_pa: f32,
    vpd_sensitivity: f32,
    soil_temp_c: f32,
    root_fractions: &[f32],
    layer_moisture: &[f32],
    wilting_point: &[f32],
    moisture_threshold: &[f32],
) -> f32 {
    if lai <= 0.0 {
        return f32::INFINITY;
    }
    let radiation_factor = if net_radiation > 0.0 {
        (net_radiation / (net_radiation + radiation_half_saturation)).clamp(0.0, 1.0)
    } else {
        1e-4
    };
    let vpd_factor = (1.0 - vpd_sensitivity * vpd_pa / 1000.0).clamp(0.05, 1.0);
    let temp_factor = if soil_temp_c <= 0.0 { 0.05 } else { 1.0 };

    let moisture_factor: f32 = root_fractions
        .iter()
        .zip(layer_moisture.iter())
        .zip(wilting_point.iter())
        .zip(moisture_threshold.iter())
        .map(|(((&rf, &m), &wp), &th)| rf * soil_moisture_stress(m, wp, th))
        .sum();
    let moisture_factor = moisture_factor.max(1e-4);

    let r_leaf_min = min_stomatal_resistance / lai;
    let combined = radiation_factor * vpd_factor * temp_factor * moisture_factor;
    (r_leaf_min / combined.max(1e-4)).min(max_stomatal_resistance)
}

/// Desorption-limited soil evaporation from the top layer, active only when
/// no snow and no understory. Sorptivity scales with
/// `(porosity - moisture)` per Brooks-Corey.
pub fn soil_evaporation(
    potential_evaporation: f32,
    porosity: f32,
    moisture: f32,
    pore_size_index: f32,
) -> f32 {
    let saturation = (moisture / porosity.max(1e-6)).clamp(0.0, 1.0);
    let sorptivity_factor = (1.0 - saturation).powf(1.0 + pore_size_index);
    potential_evaporation * sorptivity_factor
}

/// Splits potential ET demand into wet-leaf evaporation and dry-leaf
/// transpiration, truncating each to available storage.
pub fn split_wet_dry_demand(
    potential_demand: f32,
    wet_fraction: f32,
    intercepted_water: f32,
    canopy_resistance_term: f32,
    aerodynamic_resistance_term: f32,
) -> (f32, f32) {
    let wet_demand = (potential_demand * wet_fraction).min(intercepted_water);
    let transpiration_suppression = if canopy_resistance_term > 0.0 {
        aerodynamic_resistance_term / (aerodynamic_resistance_term + canopy_resistance_term)
    } else {
        1.0
    };
    let dry_demand = potential_demand * (1.0 - wet_fraction) * transpiration_suppression;
    (wet_demand, dry_demand)
}
