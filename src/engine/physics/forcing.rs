// ABOUTME: Forcing interpolator - station weighting schemes and per-cell meteorology production
// ABOUTME: INVDIST/NEAREST/VARCRESS weight grids quantized to u8 fractions of 255, per CalcWeights.c

use crate::engine::config::InterpolationScheme;
use crate::engine::error::{CoreError, CoreResult};

/// One forcing station: its grid location, elevation, and a handle to its
/// timestamp-ordered record stream (the stream itself is owned by the
/// out-of-scope forcing-file reader; this crate only needs location data to
/// compute weights).
#[derive(Clone, Copy, Debug)]
pub struct Station {
    pub x: usize,
    pub y: usize,
    pub elevation: f32,
}

/// A forcing record for one station at the current step, already parsed by
/// the out-of-scope forcing-file reader.
#[derive(Clone, Copy, Debug)]
pub struct ForcingRecord {
    pub air_temp_c: f32,
    pub wind_ms: f32,
    pub relative_humidity_pct: f32,
    pub incoming_shortwave: f32,
    pub incoming_longwave: f32,
    pub soil_layer_temps: Option<[f32; 3]>,
    pub precipitation_m: Option<f32>,
    pub precip_lapse_rate: Option<f32>,
    pub temp_lapse_rate: Option<f32>,
    pub wind_direction_index: Option<u8>,
}

/// Meteorology interpolated to a specific cell and elevation.
#[derive(Clone, Copy, Debug)]
pub struct CellMeteorology {
    pub air_temp_c: f32,
    pub wind_ms: f32,
    pub relative_humidity_pct: f32,
    pub incoming_shortwave: f32,
    pub incoming_longwave: f32,
    pub rain_m: f32,
    pub snow_m: f32,
}

const MAX_SHORTWAVE: f32 = 1380.0;

/// Per-cell station weights, quantized to `u8` fractions of 255.
#[derive(Clone, Debug)]
pub struct WeightRow {
    pub station_weights: Vec<(usize, u8)>,
}

/// Precomputed per-cell weight grid, built once at init from the station
/// layout and the chosen interpolation scheme.
#[derive(Clone, Debug)]
pub struct WeightGrid {
    pub rows: Vec<WeightRow>, // indexed by cell id (y * width + x)
}

impl WeightGrid {
    /// Builds the weight grid for every active cell listed in `cells`
    /// (cell id -> (x, y)) against `stations`, using `scheme`.
    pub fn build(
        cells: &[(usize, usize)],
        stations: &[Station],
        scheme: InterpolationScheme,
        radius: f32,
        min_stations: u32,
    ) -> CoreResult<Self> {
        let mut rows = Vec::with_capacity(cells.len());
        for &(cx, cy) in cells {
            let weights = match scheme {
                InterpolationScheme::Invdist => inverse_distance_squared(cx, cy, stations),
                InterpolationScheme::Nearest => nearest_station(cx, cy, stations),
                InterpolationScheme::Varcress => {
                    variable_radius_cressman(cx, cy, stations, radius, min_stations)
                }
            };
            rows.push(quantize(weights));
        }
        let grid = Self { rows };
        grid.verify_sums()?;
        Ok(grid)
    }

    /// Verifies every cell's weights sum to 255 within ±2.
    fn verify_sums(&self) -> CoreResult<()> {
        for row in &self.rows {
            let sum: i32 = row.station_weights.iter().map(|&(_, w)| w as i32).sum();
            if (sum - 255).abs() > 2 {
                return Err(CoreError::OutOfRange {
                    field: "weight_grid_sum".into(),
                    value: sum.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn inverse_distance_squared(cx: usize, cy: usize, stations: &[Station]) -> Vec<(usize, f32)> {
    let mut weights: Vec<(usize, f32)> = stations
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let dx = cx as f32 - s.x as f32;
            let dy = cy as f32 - s.y as f32;
            let d2 = (dx * dx + dy * dy).max(1e-6);
            (i, 1.0 / d2)
        })
        .collect();
    normalize(&mut weights);
    weights
}

fn nearest_station(cx: usize, cy: usize, stations: &[Station]) -> Vec<(usize, f32)> {
    let nearest = stations
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let da = ((cx as f32 - a.x as f32).powi(2) + (cy as f32 - a.y as f32).powi(2)).sqrt();
            let db = ((cx as f32 - b.x as f32).powi(2) + (cy as f32 - b.y as f32).powi(2)).sqrt();
            da.partial_cmp(&db).unwrap()
        })
        .map(|(i, _)| i);
    match nearest {
        Some(i) => vec![(i, 1.0)],
        None => vec![],
    }
}

fn variable_radius_cressman(
    cx: usize,
    cy: usize,
    stations: &[Station],
    radius: f32,
    min_stations: u32,
) -> Vec<(usize, f32)> {
    let mut r = radius;
    let mut weights;
    loop {
        weights = stations
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                let dx = cx as f32 - s.x as f32;
                let dy = cy as f32 - s.y as f32;
                let d2 = dx * dx + dy * dy;
                let r2 = r * r;
                if d2 <= r2 {
                    Some((i, ((r2 - d2) / (r2 + d2)).max(0.0)))
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();
        if weights.len() as u32 >= min_stations.max(1) || stations.is_empty() {
            break;
        }
        r *= 1.5;
        if r > radius * 100.0 {
            break; // give up growing; fall back to whatever's in range
        }
    }
    normalize(&mut weights);
    weights
}

fn normalize(weights: &mut Vec<(usize, f32)>) {
    let total: f32 = weights.iter().map(|&(_, w)| w).sum();
    if total > 0.0 {
        for w in weights.iter_mut() {
            w.1 /= total;
        }
    } else if !weights.is_empty() {
        let n = weights.len() as f32;
        for w in weights.iter_mut() {
            w.1 = 1.0 / n;
        }
    }
}

fn quantize(weights: Vec<(usize, f32)>) -> WeightRow {
    let mut quantized: Vec<(usize, u8)> = weights
        .iter()
        .map(|&(i, w)| (i, (w * 255.0).round().clamp(0.0, 255.0) as u8))
        .collect();
    // Adjust for rounding drift so the sum lands as close to 255 as possible,
    // matching DHSVM's `Round(... * MAXUCHAR)` then normalizing convention.
    let sum: i32 = quantized.iter().map(|&(_, w)| w as i32).sum();
    if let Some(last) = quantized.last_mut() {
        let drift = 255 - sum;
        let adjusted = last.1 as i32 + drift;
        last.1 = adjusted.clamp(0, 255) as u8;
    }
    WeightRow {
        station_weights: quantized,
    }
}

/// Interpolates meteorology for one cell at `elevation`, applying lapse
/// rates, RH clamping, shortwave clamping, and rain/snow partitioning.
pub fn interpolate_cell(
    weights: &WeightRow,
    records: &[ForcingRecord],
    stations: &[Station],
    cell_elevation: f32,
    default_precip_lapse: f32,
    default_temp_lapse: f32,
    min_rain_temp: f32,
    max_snow_temp: f32,
    rh_override_on_precip: bool,
) -> CoreResult<CellMeteorology> {
    if weights.station_weights.is_empty() {
        return Err(CoreError::OutOfRange {
            field: "forcing_weights".into(),
            value: "no contributing stations".into(),
        });
    }

    let mut air_temp = 0.0f32;
    let mut wind = 0.0f32;
    let mut rh = 0.0f32;
    let mut sw = 0.0f32;
    let mut lw = 0.0f32;
    let mut precip = 0.0f32;
    let total_weight: f32 = weights
        .station_weights
        .iter()
        .map(|&(_, w)| w as f32)
        .sum::<f32>()
        .max(1.0);

    for &(station_idx, w) in &weights.station_weights {
        let frac = w as f32 / total_weight;
        let rec = &records[station_idx];
        let station = &stations[station_idx];
        let dz = cell_elevation - station.elevation;

        let t_lapse = rec.temp_lapse_rate.unwrap_or(default_temp_lapse);
        let p_lapse = rec.precip_lapse_rate.unwrap_or(default_precip_lapse);

        air_temp += frac * (rec.air_temp_c + t_lapse * dz);
        wind += frac * rec.wind_ms;
        rh += frac * rec.relative_humidity_pct;
        sw += frac * rec.incoming_shortwave;
        lw += frac * rec.incoming_longwave;
        if let Some(p) = rec.precipitation_m {
            precip += frac * (p * (1.0 + p_lapse * dz).max(0.0));
        }
    }

    if !(0.0..=100.0).contains(&rh) {
        rh = rh.clamp(0.0, 100.0);
    }
    sw = sw.clamp(0.0, MAX_SHORTWAVE);

    if rh_override_on_precip && precip > 0.0 {
        rh = 100.0;
    }

    let (rain, snow) = partition_precipitation(precip, air_temp, min_rain_temp, max_snow_temp);

    Ok(CellMeteorology {
        air_temp_c: air_temp,
        wind_ms: wind,
        relative_humidity_pct: rh,
        incoming_shortwave: sw,
        incoming_longwave: lw,
        rain_m: rain,
        snow_m: snow,
    })
}

/// Splits total precipitation into rain/snow by linear interpolation over
/// `[min_rain_temp, max_snow_temp]`; outside the window, precipitation is
/// entirely one phase.
pub fn partition_precipitation(
    precip: f32,
    air_temp_c: f32,
    min_rain_temp: f32,
    max_snow_temp: f32,
) -> (f32, f32) {
    if precip <= 0.0 {
        return (0.0, 0.0);
    }
    if air_temp_c <= min_rain_temp {
        return (0.0, precip);
    }
    if air_temp_c >= max_snow_temp {
        return (precip, 0.0);
    }
    let snow_fraction = (max_snow_temp - air_temp_c) / (max_snow_temp - min_rain_temp);
    (precip * (1.0 - snow_fraction), precip * snow_fraction)
}
