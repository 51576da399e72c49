//! Trend extremum detection over a series of expected price deviations.

use crate::utils::error::{Error, Result};

/// Find the first local extremum in the direction of the first element.
///
/// Starting at `series[0]`, the scan keeps walking while each following value
/// lies strictly farther from zero in the same direction as the first one.
/// The running extreme is returned at the first position where that trend
/// breaks. A series whose trend never breaks yields its last element. A
/// leading `0.0` has no direction and is returned as is.
pub fn find_next_extremum(series: &[f64]) -> Result<(usize, f64)> {
    let first = *series
        .first()
        .ok_or_else(|| Error::InvalidArgument("extremum search needs a non-empty series".into()))?;

    let sign = if first > 0.0 {
        1.0
    } else if first < 0.0 {
        -1.0
    } else {
        return Ok((0, first));
    };

    let mut idx = 0;
    let mut extreme = first;
    for (i, &value) in series.iter().enumerate().skip(1) {
        // NaN compares false and ends the trend
        if sign * value > sign * extreme {
            idx = i;
            extreme = value;
        } else {
            return Ok((idx, extreme));
        }
    }
    Ok((idx, extreme))
}
