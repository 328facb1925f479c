//! Conversions between chrono values and resolution ticks.

use chrono::{DateTime, TimeDelta, Utc};

use crate::scheme::Resolution;

const NANOS_PER_SEC: i128 = 1_000_000_000;

pub(crate) fn delta_nanos(delta: &TimeDelta) -> i128 {
    delta.num_seconds() as i128 * NANOS_PER_SEC + delta.subsec_nanos() as i128
}

pub(crate) fn delta_from_nanos(nanos: i128) -> Option<TimeDelta> {
    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SEC)).ok()?;
    let sub = nanos.rem_euclid(NANOS_PER_SEC) as u32;
    TimeDelta::new(secs, sub)
}

pub(crate) fn point_nanos(point: &DateTime<Utc>) -> i128 {
    point.timestamp() as i128 * NANOS_PER_SEC + point.timestamp_subsec_nanos() as i128
}

pub(crate) fn point_from_nanos(nanos: i128) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SEC)).ok()?;
    let sub = nanos.rem_euclid(NANOS_PER_SEC) as u32;
    DateTime::from_timestamp(secs, sub)
}

/// Whole ticks in `nanos`, truncated toward zero.
pub(crate) fn nanos_to_ticks(nanos: i128, resolution: Resolution) -> Option<i128> {
    let (num, den) = resolution.nanos_ratio();
    nanos.checked_mul(den).map(|n| n / num)
}

pub(crate) fn ticks_to_nanos(ticks: i128, resolution: Resolution) -> Option<i128> {
    let (num, den) = resolution.nanos_ratio();
    ticks.checked_mul(num).map(|n| n / den)
}

/// Fractional ticks for floating point storage.
pub(crate) fn nanos_to_ticks_f64(nanos: i128, resolution: Resolution) -> f64 {
    let (num, den) = resolution.nanos_ratio();
    nanos as f64 * den as f64 / num as f64
}

pub(crate) fn ticks_to_nanos_f64(ticks: f64, resolution: Resolution) -> Option<i128> {
    let (num, den) = resolution.nanos_ratio();
    let nanos = ticks * num as f64 / den as f64;
    (nanos.is_finite() && nanos.abs() < i128::MAX as f64).then(|| nanos.round() as i128)
}
