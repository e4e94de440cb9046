//! Reduction of a metric series to the single value reported for a scrape.

use crate::model::Point;

/// Returns the value of the latest point by timestamp, or `None` if there are no points.
///
/// Points may arrive in any order. The result is the same as stable-sorting the points
/// by timestamp and taking the last one; in particular, if several points share the maximum
/// timestamp, the one appearing last in `points` wins.
pub fn latest_value(points: &[Point]) -> Option<f64> {
    // `max_by_key()` returns the last of equal maximums.
    points
        .iter()
        .max_by_key(|point| point.timestamp)
        .map(|point| point.value)
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn points(raw: &[(i64, f64)]) -> Vec<Point> {
        raw.iter()
            .map(|&(secs, value)| Point {
                timestamp: at(secs),
                value,
            })
            .collect()
    }

    #[test]
    fn empty_series_has_no_value() {
        assert_eq!(latest_value(&[]), None);
    }

    #[test]
    fn latest_point_wins_regardless_of_order() {
        let ordered = points(&[(10, 5.0), (20, 9.0), (30, 7.0)]);
        assert_eq!(latest_value(&ordered), Some(7.0));

        let shuffled = points(&[(30, 7.0), (10, 5.0), (20, 9.0)]);
        assert_eq!(latest_value(&shuffled), Some(7.0));

        let reversed = points(&[(30, 7.0), (20, 9.0), (10, 5.0)]);
        assert_eq!(latest_value(&reversed), Some(7.0));
    }

    #[test]
    fn single_point() {
        assert_eq!(latest_value(&points(&[(42, -1.5)])), Some(-1.5));
    }

    #[test]
    fn ties_resolve_to_last_in_input() {
        let tied = points(&[(20, 1.0), (10, 0.0), (20, 2.0), (5, 3.0)]);
        for _ in 0..10 {
            assert_eq!(latest_value(&tied), Some(2.0));
        }

        // Equivalent to a stable sort followed by taking the last element.
        let mut sorted = tied.clone();
        sorted.sort_by_key(|point| point.timestamp);
        assert_eq!(latest_value(&tied), sorted.last().map(|point| point.value));
    }
}
