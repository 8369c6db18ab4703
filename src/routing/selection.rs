//! Weighted random destination selection.

use crate::models::WeightedDestination;
use crate::random::RandomSource;

/// Picks one destination with probability proportional to its weight.
///
/// Destinations with a weight of zero or below are ineligible. Returns
/// `None` when nothing is eligible.
pub fn pick_weighted<'a>(
    destinations: &'a [WeightedDestination],
    rng: &dyn RandomSource,
) -> Option<&'a WeightedDestination> {
    let total: u64 = destinations
        .iter()
        .filter(|d| d.weight > 0)
        .map(|d| u64::from(d.weight.unsigned_abs()))
        .sum();
    if total == 0 {
        return None;
    }

    let draw = rng.below(total);
    let mut cumulative = 0u64;
    destinations
        .iter()
        .filter(|d| d.weight > 0)
        .find(|d| {
            cumulative += u64::from(d.weight.unsigned_abs());
            draw < cumulative
        })
}
