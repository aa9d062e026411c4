//! Trapezoidal integration of a trend series with explicit gap handling.
//! Feeding in power samples (kW) yields consumption (kWh).

use chrono::{DateTime, Utc};

use crate::model::{TrendEvent, TrendSample, TrendSeries};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Total area under the series, in value-hours.
///
/// Between two consecutive samples the value is assumed to move in a
/// straight line. Around a hole the last known value is held flat up to
/// the hole's start, the interior counts for nothing, and the next
/// sample's value is held flat back to the hole's end; nothing is ever
/// interpolated across a gap. Bookends and the time before the first
/// event or after the last sample are excluded entirely.
///
/// An empty series totals exactly 0.0, as does a series with a single
/// sample and no holes (there is no second endpoint to integrate against).
pub fn integrate(series: &TrendSeries) -> f64 {
    let mut total = 0.0;
    let mut last_sample: Option<TrendSample> = None;
    let mut resume_at: Option<DateTime<Utc>> = None;

    for event in &series.events {
        match *event {
            TrendEvent::Sample(sample) => {
                if let Some(prev) = last_sample {
                    total += step_area(prev.timestamp, prev.value, sample.timestamp, sample.value);
                } else if let Some(hole_end) = resume_at.take() {
                    // First sample after a hole: hold its value flat back
                    // to where the hole ended.
                    total += step_area(hole_end, sample.value, sample.timestamp, sample.value);
                }
                last_sample = Some(sample);
            }
            TrendEvent::Hole { start, end } => {
                if let Some(prev) = last_sample.take() {
                    // Hold the last known value flat up to the hole.
                    total += step_area(prev.timestamp, prev.value, start, prev.value);
                }
                resume_at = Some(end);
            }
        }
    }

    total
}

/// Area of one straight-line slice, evaluated symmetrically so it is
/// invariant to argument order.
fn step_area(t0: DateTime<Utc>, v0: f64, t1: DateTime<Utc>, v1: f64) -> f64 {
    let min = v0.min(v1);
    let max = v0.max(v1);
    let hours = (t1 - t0).num_milliseconds() as f64 / MILLIS_PER_HOUR;
    (min + (max - min) / 2.0) * hours
}
