//! Resampling of a series onto a fixed time grid.

use super::ReducerFn;
use crate::compute::ledger::{ComputationError, Series};
use crate::store::{Point, TimeRange};
use chrono::Duration;
use std::str::FromStr;

/// How a grid slot with no source samples is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsampler {
    /// Repeat the last seen sample.
    Pad,
    /// Take the next sample after the slot.
    Backfilling,
    /// Leave the slot null.
    FillNa,
}

impl FromStr for Upsampler {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pad" => Ok(Self::Pad),
            "backfilling" => Ok(Self::Backfilling),
            "fillna" => Ok(Self::FillNa),
            _ => Err(format!("upsampling '{s}' is not implemented")),
        }
    }
}

/// Parses a window such as `500ms`, `10s`, `5m`, `1h` or `1d`.
pub fn parse_window(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = s.split_at(split);
    let n: i64 = digits.parse().ok()?;
    let window = match unit {
        "ms" => Duration::try_milliseconds(n),
        "s" => Duration::try_seconds(n),
        "m" => Duration::try_minutes(n),
        "h" => Duration::try_hours(n),
        "d" => Duration::try_days(n),
        "w" => Duration::try_weeks(n),
        _ => None,
    }?;
    (window > Duration::zero()).then_some(window)
}

/// Upper bound on the number of points one resampled series may have.
pub const MAX_RESAMPLE_POINTS: i64 = 100_000;

/// Number of grid intervals of `window` in `range`. Fails when the range is
/// shorter than one window or the grid would exceed [`MAX_RESAMPLE_POINTS`].
pub fn slot_count(window: Duration, range: TimeRange) -> Result<i64, ComputationError> {
    let span = range.to - range.from;
    let slots = span.num_milliseconds().checked_div(window.num_milliseconds()).unwrap_or(0);
    if slots <= 0 {
        return Err(ComputationError::ResampleRange);
    }
    if slots >= MAX_RESAMPLE_POINTS {
        return Err(ComputationError::ResampleTooManyPoints { points: slots.saturating_add(1), limit: MAX_RESAMPLE_POINTS });
    }
    Ok(slots)
}

/// Resamples `series` onto `range.from, range.from + window, ..., <= range.to`.
///
/// Source samples at or before a grid slot (and after the previous one) are
/// reduced with `downsampler`; empty slots are filled by `upsampler`.
pub fn resample(
    series: &Series,
    window: Duration,
    downsampler: &ReducerFn,
    upsampler: Upsampler,
    range: TimeRange,
) -> Result<Series, ComputationError> {
    let slots = slot_count(window, range)?;

    let src = &series.points;
    let mut points = Vec::with_capacity(slots as usize + 1);
    let mut bookmark = 0;
    let mut last_seen: Option<f64> = None;
    let mut t = range.from;

    for _ in 0..=slots {
        if t > range.to {
            break;
        }
        let start = bookmark;
        while bookmark < src.len() && src[bookmark].time <= t {
            last_seen = src[bookmark].value;
            bookmark += 1;
        }
        let bucket = &src[start..bookmark];

        let value = if bucket.is_empty() {
            match upsampler {
                Upsampler::Pad => last_seen,
                Upsampler::Backfilling => src.get(bookmark).and_then(|p| p.value),
                Upsampler::FillNa => None,
            }
        } else {
            downsampler(bucket)
        };

        points.push(Point::new(t, value));
        t += window;
    }

    Ok(Series::new(series.name.clone(), series.labels.clone(), points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::reducer;
    use crate::store::Labels;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn t(s: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(s, 0).unwrap()
    }

    fn range(from: i64, to: i64) -> TimeRange {
        TimeRange { from: t(from), to: t(to) }
    }

    fn source() -> Series {
        Series::new("A", Labels::new(), vec![
            Point::new(t(1), Some(1.0)),
            Point::new(t(2), Some(3.0)),
            Point::new(t(6), Some(10.0)),
        ])
    }

    #[test]
    fn test_parse_window() {
        assert_eq!(parse_window("5s"), Some(Duration::seconds(5)));
        assert_eq!(parse_window("250ms"), Some(Duration::milliseconds(250)));
        assert_eq!(parse_window("1h"), Some(Duration::hours(1)));
        assert_eq!(parse_window("0s"), None);
        assert_eq!(parse_window("5"), None);
        assert_eq!(parse_window("s"), None);
        assert_eq!(parse_window("5y"), None);
        assert_eq!(parse_window("9999999999999999s"), None);
        assert_eq!(parse_window("9999999999999999w"), None);
        assert_eq!(parse_window("99999999999999999999ms"), None);
    }

    #[test]
    fn test_downsample_and_pad() {
        let mean: ReducerFn = Arc::new(reducer::avg);
        let out = resample(&source(), Duration::seconds(2), &mean, Upsampler::Pad, range(0, 8)).unwrap();
        let values: Vec<_> = out.points.iter().map(|p| p.value).collect();
        // Slots 0,2,4,6,8: nothing, mean(1,3), pad, 10, pad.
        assert_eq!(values, vec![None, Some(2.0), Some(3.0), Some(10.0), Some(10.0)]);
        assert_eq!(out.points[1].time, t(2));
    }

    #[test]
    fn test_backfilling_and_fillna() {
        let last: ReducerFn = Arc::new(reducer::last);
        let back = resample(&source(), Duration::seconds(2), &last, Upsampler::Backfilling, range(0, 8)).unwrap();
        let values: Vec<_> = back.points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![Some(1.0), Some(3.0), Some(10.0), Some(10.0), None]);

        let na = resample(&source(), Duration::seconds(2), &last, Upsampler::FillNa, range(0, 8)).unwrap();
        assert_eq!(na.points[2].value, None);
    }

    #[test]
    fn test_range_shorter_than_window() {
        let last: ReducerFn = Arc::new(reducer::last);
        let err = resample(&source(), Duration::seconds(10), &last, Upsampler::Pad, range(0, 5)).unwrap_err();
        assert_eq!(err, ComputationError::ResampleRange);
    }

    #[test]
    fn test_grid_size_is_bounded() {
        let last: ReducerFn = Arc::new(reducer::last);
        let decades = TimeRange { from: t(0), to: t(30 * 365 * 24 * 3600) };
        let err = resample(&source(), Duration::milliseconds(1), &last, Upsampler::Pad, decades).unwrap_err();
        assert!(matches!(err, ComputationError::ResampleTooManyPoints { limit: MAX_RESAMPLE_POINTS, .. }));
        assert_eq!(slot_count(Duration::seconds(1), range(0, 60)), Ok(60));
    }
}
