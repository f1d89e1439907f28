// ABOUTME: Radiation kernel - shortwave attenuation through canopy, longwave balance, shading
// ABOUTME: Direct/diffuse split by clearness index; canopy-gap submodel with view-factor integral

use crate::engine::config::{CanopyAttenuation, PhysicsParameters};

/// Direct/diffuse decomposition of incoming shortwave.
#[derive(Clone, Copy, Debug)]
pub struct ShortwaveSplit {
    pub direct: f32,
    pub diffuse: f32,
}

/// Splits incoming shortwave into direct/diffuse using the Erbs-style
/// clearness-index relationship. `clearness_index` is
/// incoming / extraterrestrial shortwave, in [0, 1].
pub fn split_direct_diffuse(incoming: f32, clearness_index: f32) -> ShortwaveSplit {
    let kt = clearness_index.clamp(0.0, 1.0);
    let diffuse_fraction = if kt <= 0.22 {
        1.0 - 0.09 * kt
    } else if kt <= 0.8 {
        0.9511 - 0.1604 * kt + 4.388 * kt.powi(2) - 16.638 * kt.powi(3) + 12.336 * kt.powi(4)
    } else {
        0.165
    };
    let diffuse_fraction = diffuse_fraction.clamp(0.0, 1.0);
    ShortwaveSplit {
        direct: incoming * (1.0 - diffuse_fraction),
        diffuse: incoming * diffuse_fraction,
    }
}

/// Canopy attenuation transmissivity `tau = exp(-k * LAI * path_correction)`.
/// `path_correction` is `1 / sin(solar_altitude)` for the
/// direct beam and 1.0 for diffuse, when `scheme` is `Variable`.
pub fn canopy_transmissivity(
    scheme: CanopyAttenuation,
    extinction_k: f32,
    lai: f32,
    solar_altitude_sin: f32,
    leaf_angle_const: f32,
) -> f32 {
    let path_correction = match scheme {
        CanopyAttenuation::Fixed => 1.0,
        CanopyAttenuation::Variable => {
            let s = solar_altitude_sin.max(0.01);
            (leaf_angle_const / s).min(20.0)
        }
    };
    (-extinction_k * lai * path_correction).exp()
}

/// Net shortwave for up to two canopy layers and the ground, using
/// layer albedos, with snow substituting the ground albedo when present.
/// Layers ordered outermost (overstory) first.
pub fn net_shortwave_layers(
    incoming: f32,
    layer_transmissivities: &[f32],
    layer_albedos: &[f32],
    ground_albedo: f32,
    snow_albedo: Option<f32>,
) -> (Vec<f32>, f32) {
    let mut remaining = incoming;
    let mut layer_net = Vec::with_capacity(layer_transmissivities.len());
    for (&tau, &albedo) in layer_transmissivities.iter().zip(layer_albedos.iter()) {
        let absorbed = remaining * (1.0 - tau) * (1.0 - albedo);
        layer_net.push(absorbed);
        remaining *= tau;
    }
    let ground = snow_albedo.unwrap_or(ground_albedo);
    let ground_net = remaining * (1.0 - ground);
    (layer_net, ground_net)
}

/// Longwave balance for a present layer: emits `sigma * T^4`, receives
/// downwelling longwave plus the other layer's emission weighted by cover
/// fraction and sky-view factor.
pub fn longwave_balance(
    physics: &PhysicsParameters,
    layer_temp_c: f32,
    incoming_longwave: f32,
    other_layer_emission: Option<f32>,
    cover_fraction: f32,
    sky_view_factor: f32,
) -> f32 {
    let temp_k = layer_temp_c + 273.15;
    let emitted = physics.stefan_boltzmann * temp_k.powi(4);
    let received_sky = incoming_longwave * sky_view_factor;
    let received_other = other_layer_emission.unwrap_or(0.0) * cover_fraction * (1.0 - sky_view_factor);
    received_sky + received_other - emitted
}

/// Topographic-shading direct-beam multiplier lookup, supplied externally
/// as a (time-of-day, cell) table; this crate only defines the application.
pub fn apply_shading(direct: f32, shading_multiplier: Option<f32>) -> f32 {
    direct * shading_multiplier.unwrap_or(1.0)
}

pub fn apply_sky_view(diffuse: f32, sky_view_factor: Option<f32>) -> f32 {
    diffuse * sky_view_factor.unwrap_or(1.0)
}

/// Canopy-gap radiation: an idealized cylindrical opening of `diameter`
/// centered on the cell. Returns the gap's own (direct, diffuse) budget,
/// computed via a sky-view integral for diffuse and a ray-length integral
/// for attenuated direct beam, with the iteration count exposed as
/// `iterations` rather than a hard-coded constant.
pub fn canopy_gap_radiation(
    diameter: f32,
    canopy_height: f32,
    solar_altitude_sin: f32,
    extinction_k: f32,
    lai: f32,
    incoming_direct: f32,
    incoming_diffuse: f32,
    iterations: u32,
) -> (f32, f32) {
    // Sky-view factor for a cylindrical gap: fraction of hemisphere visible
    // from the gap center, integrated over azimuth.
    let radius = diameter / 2.0;
    let n = iterations.max(1);
    let mut view_sum = 0.0f32;
    for _ in 0..n {
        // horizontal ray length to the gap edge at this azimuth
        let ray_len = radius;
        let elevation_angle = (canopy_height / ray_len.max(1e-3)).atan();
        let visible_fraction = (1.0 - elevation_angle / (std::f32::consts::PI / 2.0)).max(0.0);
        view_sum += visible_fraction;
    }
    let sky_view_factor = (view_sum / n as f32).clamp(0.0, 1.0);

    let altitude = solar_altitude_sin.asin_or_zero();
    let path_len = if altitude > 0.01 {
        (canopy_height - 0.0) / altitude.sin()
    } else {
        canopy_height * 100.0
    };
    let attenuation = if path_len > radius {
        (-extinction_k * lai * (path_len - radius) / canopy_height.max(0.1)).exp()
    } else {
        1.0
    };

    let gap_direct = incoming_direct * attenuation;
    let gap_diffuse = incoming_diffuse * sky_view_factor;
    (gap_direct, gap_diffuse)
}

trait AsinOrZero {
    fn asin_or_zero(&self) -> f32;
}
impl AsinOrZero for f32 {
    fn asin_or_zero(&self) -> f32 {
        self.clamp(-1.0, 1.0).asin()
    }
}

/// Crude diurnal solar-altitude sine from hour-of-day, used to drive the
/// variable canopy-attenuation path-correction where no full solar-position
/// ephemeris is supplied (that geometry lives in the out-of-scope
/// topographic-shading collaborator). Zero at and outside [6, 18] local
/// hour, peaking at solar noon.
pub fn solar_altitude_sin_from_hour(hour: u32) -> f32 {
    let h = hour as f32;
    if !(6.0..=18.0).contains(&h) {
        return 0.0;
    }
    (std::f32::consts::PI * (h - 6.0) / 12.0).sin().max(0.0)
}

/// Area-weights the gap and forested portions of a cell's radiation budget.
pub fn area_weight_gap(
    gap_fraction: f32,
    gap_value: f32,
    forest_value: f32,
) -> f32 {
    let gap_fraction = gap_fraction.clamp(0.0, 1.0);
    gap_fraction * gap_value + (1.0 - gap_fraction) * forest_value
}
