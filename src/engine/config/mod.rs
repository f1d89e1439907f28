// ABOUTME: Populated configuration-options record deserialized from an external config parser
// ABOUTME: Each configuration choice is a typed enum, not a bare string

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Bin,
    Byteswap,
    Netcdf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Extent {
    Point,
    Basin,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GradientSource {
    Topography,
    Watertable,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlowRouting {
    Network,
    Unit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationScheme {
    Invdist,
    Nearest,
    Varcress,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InfiltrationScheme {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CanopyAttenuation {
    Fixed,
    Variable,
}

/// Physical constants used throughout the physics kernels, loaded once at
/// init and passed by reference (design notes: "Global mutable state" ->
/// avoid process-wide mutables, package as an immutable record).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhysicsParameters {
    pub ch_ice: f32,
    pub ch_water: f32,
    pub stefan_boltzmann: f32,
    pub von_karman: f32,
    pub water_density: f32,
    pub latent_heat_fusion: f32,
    pub max_surface_swe: f32,
    pub liquid_water_capacity: f32,
    pub min_interception_storage: f32,
    pub min_rain_temp: f32,
    pub max_snow_temp: f32,
    pub lai_snow_multiplier: f32,
    pub lai_water_multiplier: f32,
    pub alb_max: f32,
    pub alb_acc_lambda: f32,
    pub alb_melt_lambda: f32,
    pub alb_acc_min: f32,
    pub alb_melt_min: f32,
    pub precip_lapse: f32,
    pub temp_lapse: f32,
    pub z0_ground: f32,
    pub z0_snow: f32,
    pub solar_constant: f32,
    pub canopy_extinction_coefficient: f32,
    pub leaf_angle_constant: f32,
}

impl Default for PhysicsParameters {
    /// Values taken from the original model's `constants.h` / `InitConstants.c`
    /// defaults.
    fn default() -> Self {
        Self {
            ch_ice: 2_100_000.0,
            ch_water: 4_186_800.0,
            stefan_boltzmann: 5.6696e-8,
            von_karman: 0.4,
            water_density: 1000.0,
            latent_heat_fusion: 333_700.0,
            max_surface_swe: 0.125,
            liquid_water_capacity: 0.04,
            min_interception_storage: 0.005,
            min_rain_temp: -1.0,
            max_snow_temp: 1.0,
            lai_snow_multiplier: 0.0005,
            lai_water_multiplier: 0.0001,
            alb_max: 0.85,
            alb_acc_lambda: 0.008,
            alb_melt_lambda: 0.12,
            alb_acc_min: 0.6,
            alb_melt_min: 0.4,
            precip_lapse: 0.0,
            temp_lapse: -0.0065,
            z0_ground: 0.02,
            z0_snow: 0.01,
            solar_constant: 1360.0,
            canopy_extinction_coefficient: 0.5,
            leaf_angle_constant: 0.5,
        }
    }
}

/// Root-finder bracket/iteration tuning exposed through configuration (reuses
/// `engine::core::rootfind::RootFinderTolerances`).
pub use crate::engine::core::rootfind::RootFinderTolerances;

/// Populated options record the core receives from the (out-of-scope)
/// configuration-file parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    pub file_format: FileFormat,
    pub extent: Extent,
    pub gradient: GradientSource,
    pub flow_routing: FlowRouting,
    pub interpolation: InterpolationScheme,
    pub interpolation_radius: f32,
    pub interpolation_min_stations: u32,
    pub infiltration: InfiltrationScheme,
    pub shading_enabled: bool,
    pub canopy_attenuation: CanopyAttenuation,
    pub stream_temperature_enabled: bool,
    pub canopy_gapping_enabled: bool,
    pub snow_sliding_enabled: bool,
    pub gap_view_factor_iterations: u32,
    pub mass_balance_step_tolerance: f64,
    pub mass_balance_cumulative_tolerance: f64,
    pub physics: PhysicsParameters,
    pub root_finder: RootFinderTolerances,
    pub step_seconds: i64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            file_format: FileFormat::Bin,
            extent: Extent::Basin,
            gradient: GradientSource::Topography,
            flow_routing: FlowRouting::Network,
            interpolation: InterpolationScheme::Invdist,
            interpolation_radius: 5000.0,
            interpolation_min_stations: 1,
            infiltration: InfiltrationScheme::Static,
            shading_enabled: false,
            canopy_attenuation: CanopyAttenuation::Fixed,
            stream_temperature_enabled: false,
            canopy_gapping_enabled: false,
            snow_sliding_enabled: false,
            gap_view_factor_iterations: 32,
            mass_balance_step_tolerance: 1e-4,
            mass_balance_cumulative_tolerance: 1e-3,
            physics: PhysicsParameters::default(),
            root_finder: RootFinderTolerances::default(),
            step_seconds: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_roundtrip_through_yaml() {
        let opts = Options::default();
        let yaml = serde_yaml::to_string(&opts).unwrap();
        let back: Options = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.step_seconds, opts.step_seconds);
        assert_eq!(back.infiltration, opts.infiltration);
    }
}
