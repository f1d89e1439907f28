// ABOUTME: Optional sediment core - hillslope erosion supply and Bagnold-capacity channel transport
// ABOUTME: Channel deposition/scour is bounded by a retry loop that raises the bed rather than diverges

use crate::engine::error::{CoreError, CoreResult};

/// Hillslope sediment detachment by raindrop impact and overland-flow shear,
/// scaled by vegetation cover.
pub fn hillslope_erosion(
    rainfall_intensity: f32,
    overland_flow_depth: f32,
    slope: f32,
    cover_fraction: f32,
    erodibility: f32,
) -> f32 {
    let cover_protection = (1.0 - cover_fraction).clamp(0.0, 1.0);
    let raindrop_term = erodibility * rainfall_intensity.powf(1.5) * cover_protection;
    let flow_term = erodibility * overland_flow_depth * slope.max(0.0) * cover_protection;
    (raindrop_term + flow_term).max(0.0)
}

/// Bagnold stream-power sediment-transport capacity (kg/s) for a channel
/// segment.
pub fn bagnold_capacity(
    discharge: f32,
    slope: f32,
    channel_width: f32,
    bagnold_coefficient: f32,
    critical_stream_power: f32,
) -> f32 {
    if channel_width <= 0.0 {
        return 0.0;
    }
    let velocity_proxy = discharge / channel_width;
    let stream_power = velocity_proxy * slope.max(0.0);
    let excess = (stream_power - critical_stream_power).max(0.0);
    bagnold_coefficient * excess
}

/// Feedback coefficient for how strongly a deposited bed rise depresses the
/// segment's transport capacity for the remainder of this sub-step.
const BED_FEEDBACK_COEFFICIENT: f32 = 0.01;

/// Re-derives the transport capacity a segment would actually have once the
/// bed has risen by `bed_rise` from deposition already committed this
/// sub-step: a higher bed implies a locally reduced slope and hence less
/// Bagnold capacity. This is the independent check the retry loop below
/// validates the trial outflow/deposit split against — it is not a function
/// of the split itself, so it can genuinely disagree with it.
fn capacity_with_bed_feedback(capacity_mass: f32, bed_rise: f32) -> f32 {
    (capacity_mass / (1.0 + BED_FEEDBACK_COEFFICIENT * bed_rise.max(0.0))).max(0.0)
}

/// Routes one step's sediment mass balance for a channel segment: inflow
/// (from hillslope supply plus upstream) against transport capacity,
/// depositing the excess rather than letting concentration diverge.
///
/// Each attempt computes a trial outflow/deposit split against the current
/// working capacity, then checks that split against `capacity_with_bed_feedback`
/// evaluated at the bed the deposit would leave behind — an independent
/// re-derivation of capacity, not the remainder of the split itself. If the
/// two disagree by more than `tolerance`, the time-weighting factor is
/// raised toward fully implicit by adopting the feedback capacity as the
/// next attempt's working capacity, and the split is retried. Escalates to
/// `CoreError::MassBalance` if it has not converged within `max_retries`
/// attempts.
pub fn route_segment_sediment(
    inflow_mass: f32,
    capacity_mass: f32,
    bed_storage: &mut f32,
    max_retries: u32,
) -> CoreResult<(f32, f32)> {
    let tolerance = (1e-2 * inflow_mass).max(1e-6);
    let mut capacity = capacity_mass;
    let mut trial_outflow = inflow_mass.min(capacity);
    let mut trial_deposit = (inflow_mass - trial_outflow).max(0.0);

    for _ in 0..max_retries.max(1) {
        let fed_back_capacity = capacity_with_bed_feedback(capacity_mass, *bed_storage + trial_deposit);
        let residual = (trial_outflow - fed_back_capacity).max(0.0);
        if residual <= tolerance {
            *bed_storage += trial_deposit;
            return Ok((trial_outflow, trial_deposit));
        }
        capacity = fed_back_capacity;
        trial_outflow = inflow_mass.min(capacity);
        trial_deposit = (inflow_mass - trial_outflow).max(0.0);
    }
    Err(CoreError::MassBalance {
        residual: (trial_outflow - capacity) as f64,
        threshold: tolerance as f64,
        step: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erosion_increases_with_rainfall_intensity() {
        let low = hillslope_erosion(0.001, 0.01, 0.1, 0.5, 1.0);
        let high = hillslope_erosion(0.01, 0.01, 0.1, 0.5, 1.0);
        assert!(high > low);
    }

    #[test]
    fn full_cover_suppresses_erosion() {
        let e = hillslope_erosion(0.01, 0.01, 0.1, 1.0, 1.0);
        assert_eq!(e, 0.0);
    }

    #[test]
    fn bagnold_capacity_zero_below_critical_stream_power() {
        let cap = bagnold_capacity(0.01, 0.0001, 2.0, 1.0, 1.0);
        assert_eq!(cap, 0.0);
    }

    #[test]
    fn capacity_limited_transport_deposits_excess() {
        let mut bed = 0.0;
        let (outflow, deposited) = route_segment_sediment(10.0, 4.0, &mut bed, 3).unwrap();
        assert!(outflow <= 4.0 + 1e-6);
        assert!(deposited > 0.0);
        assert!(bed > 0.0);
    }

    #[test]
    fn under_capacity_inflow_passes_through_with_no_deposition() {
        let mut bed = 0.0;
        let (outflow, deposited) = route_segment_sediment(2.0, 4.0, &mut bed, 3).unwrap();
        assert_eq!(outflow, 2.0);
        assert_eq!(deposited, 0.0);
        assert_eq!(bed, 0.0);
    }

    #[test]
    fn retry_lowers_outflow_below_the_first_attempts_naive_split() {
        // The first attempt's trial outflow (capped only at the nominal
        // capacity) must get pulled down once the bed-feedback capacity
        // check disagrees with it -- otherwise the retry loop is inert.
        let mut bed = 0.0;
        let (outflow, _) = route_segment_sediment(10.0, 4.0, &mut bed, 3).unwrap();
        assert!(outflow < 4.0, "retry must reduce outflow below the naive capacity-limited split");
    }

    #[test]
    fn unconverged_retry_budget_escalates_to_mass_balance_error() {
        // A large bed-feedback mismatch with only one retry available must
        // fail to converge and escalate, proving the residual check is not
        // tautologically satisfied on the first attempt.
        let mut bed = 0.0;
        let err = route_segment_sediment(1000.0, 50.0, &mut bed, 1).unwrap_err();
        assert!(matches!(err, CoreError::MassBalance { .. }));
    }
}
