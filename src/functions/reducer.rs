//! Built-in series reducers.
//!
//! Null and NaN samples are skipped. A series with no usable samples reduces
//! to an absent value, except `count` which always counts samples.

use crate::store::Point;

fn valid(points: &[Point]) -> impl Iterator<Item = f64> + '_ {
    points.iter().filter_map(Point::valid)
}

pub fn avg(points: &[Point]) -> Option<f64> {
    let (sum, n) = valid(points).fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

pub fn sum(points: &[Point]) -> Option<f64> {
    valid(points).fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

pub fn min(points: &[Point]) -> Option<f64> {
    valid(points).fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.min(v))))
}

pub fn max(points: &[Point]) -> Option<f64> {
    valid(points).fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
}

pub fn count(points: &[Point]) -> Option<f64> {
    (!points.is_empty()).then_some(points.len() as f64)
}

pub fn count_non_null(points: &[Point]) -> Option<f64> {
    let n = valid(points).count();
    (n > 0).then_some(n as f64)
}

pub fn last(points: &[Point]) -> Option<f64> {
    points.iter().rev().find_map(Point::valid)
}

pub fn median(points: &[Point]) -> Option<f64> {
    let mut values: Vec<f64> = valid(points).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();
    Some(if n % 2 == 1 { values[n / 2] } else { (values[n / 2 - 1] + values[n / 2]) / 2.0 })
}

pub fn diff(points: &[Point]) -> Option<f64> {
    newest_vs_oldest(points, |newest, oldest| newest - oldest)
}

pub fn diff_abs(points: &[Point]) -> Option<f64> {
    newest_vs_oldest(points, |newest, oldest| (newest - oldest).abs())
}

pub fn percent_diff(points: &[Point]) -> Option<f64> {
    newest_vs_oldest(points, |newest, oldest| (newest - oldest) / oldest.abs() * 100.0)
}

pub fn percent_diff_abs(points: &[Point]) -> Option<f64> {
    newest_vs_oldest(points, |newest, oldest| ((newest - oldest) / oldest * 100.0).abs())
}

/// Compares the newest usable sample with the oldest usable sample before it.
/// With a single usable sample the difference is `0`.
fn newest_vs_oldest(points: &[Point], f: impl Fn(f64, f64) -> f64) -> Option<f64> {
    let (idx, newest) = points.iter().enumerate().rev().find_map(|(i, p)| p.valid().map(|v| (i, v)))?;
    let oldest = points[..idx].iter().find_map(Point::valid);
    Some(oldest.map_or(0.0, |o| f(newest, o)))
}
