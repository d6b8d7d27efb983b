//! OHLCV resampling to a coarser frequency.
//!
//! Open is the first observed open, High the max, Low the min, Close the
//! last observed close, Volume the sum. Missing sub-bars are skipped; a
//! bucket with no observation at all stays NaN.

use super::array::PriceArray;
use super::field::PriceField;
use crate::time::Frequency;
use chrono::NaiveDateTime;
use std::ops::Range;

/// Resample `array` into `target` buckets, labelled by bucket start.
///
/// Dates must already be sorted, which `PriceArray` guarantees.
pub fn aggregate(array: &PriceArray, target: Frequency) -> PriceArray {
    let mut labels: Vec<NaiveDateTime> = Vec::new();
    let mut groups: Vec<Range<usize>> = Vec::new();
    for (d, date) in array.dates().iter().enumerate() {
        let label = target.bucket_start(*date);
        if labels.last() == Some(&label) {
            if let Some(group) = groups.last_mut() {
                group.end = d + 1;
            }
        } else {
            labels.push(label);
            groups.push(d..d + 1);
        }
    }

    let mut out = PriceArray::empty(
        labels,
        array.instruments().to_vec(),
        array.fields().to_vec(),
    );
    for (g, rows) in groups.iter().enumerate() {
        for i in 0..array.instruments().len() {
            for (f, field) in array.fields().iter().enumerate() {
                let value = combine(*field, rows.clone().map(|d| array.get(d, i, f)));
                out.set(g, i, f, value);
            }
        }
    }
    out
}

/// Combine one field over the sub-bars of a bucket.
pub fn combine(field: PriceField, values: impl Iterator<Item = f64>) -> f64 {
    let mut observed = values.filter(|v| !v.is_nan());
    match field {
        PriceField::Open => observed.next().unwrap_or(f64::NAN),
        PriceField::Close => observed.last().unwrap_or(f64::NAN),
        PriceField::High => observed.fold(f64::NAN, f64::max),
        PriceField::Low => observed.fold(f64::NAN, f64::min),
        PriceField::Volume => observed
            .fold(None, |acc: Option<f64>, v| Some(acc.unwrap_or(0.0) + v))
            .unwrap_or(f64::NAN),
    }
}
