//! Resampling one-minute data into coarser intraday bars.
//!
//! For an N-minute bucket: Open is the first minute's open, Close the last
//! minute's close, High/Low the extremes and Volume the sum over the bucket.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use simclock_core::data::{PresetSource, PriceBundleBuilder, PriceField, PriceSource};
use simclock_core::domain::Bar;
use simclock_core::time::Frequency;

fn session_open() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(13, 30, 0)
        .unwrap()
}

fn minute_bars(n: usize) -> Vec<Bar> {
    let mut price = 100.0;
    (0..n)
        .map(|i| {
            let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
            price += ((seed >> 33) % 21) as f64 * 0.05 - 0.5;
            Bar {
                time: session_open() + Duration::minutes(i as i64),
                open: price,
                high: price + 0.25 + (i % 3) as f64 * 0.1,
                low: price - 0.25 - (i % 4) as f64 * 0.1,
                close: price + 0.1,
                volume: 100.0 + i as f64,
            }
        })
        .collect()
}

fn source(bars: &[Bar]) -> PresetSource {
    let mut builder = PriceBundleBuilder::new(Frequency::Min1);
    builder.add_bars("SPY", bars.iter().cloned());
    PresetSource::new(builder.build().unwrap())
}

#[test]
fn n_minute_bars_match_their_one_minute_parts() {
    let bars = minute_bars(390);
    let src = source(&bars);
    let start = session_open();
    let end = start + Duration::minutes(389);

    for (frequency, n) in [(Frequency::Min5, 5), (Frequency::Min15, 15), (Frequency::Min60, 60)] {
        let array = src
            .get_price(&["SPY"], &PriceField::ALL, start, end, frequency)
            .unwrap();

        for label in array.dates() {
            let parts: Vec<&Bar> = bars
                .iter()
                .filter(|b| b.time >= *label && b.time < *label + Duration::minutes(n))
                .collect();
            assert!(!parts.is_empty(), "{frequency} bucket {label} has no minutes");

            let get = |field| array.value(*label, "SPY", field).unwrap();
            assert_eq!(get(PriceField::Open), parts[0].open, "{frequency} {label}");
            assert_eq!(get(PriceField::Close), parts[parts.len() - 1].close, "{frequency} {label}");
            let high = parts.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let low = parts.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            assert_eq!(get(PriceField::High), high);
            assert_eq!(get(PriceField::Low), low);
            let volume: f64 = parts.iter().map(|b| b.volume).sum();
            assert!((get(PriceField::Volume) - volume).abs() < 1e-9);
        }

        // every minute lands in exactly one bucket
        let covered: usize = array
            .dates()
            .iter()
            .map(|label| {
                let until = *label + Duration::minutes(n);
                bars.iter().filter(|b| b.time >= *label && b.time < until).count()
            })
            .sum();
        assert_eq!(covered, bars.len(), "{frequency}");
    }
}

#[test]
fn buckets_are_labelled_by_their_start() {
    let src = source(&minute_bars(30));
    let array = src
        .get_price(
            &["SPY"],
            &[PriceField::Close],
            session_open(),
            session_open() + Duration::minutes(29),
            Frequency::Min15,
        )
        .unwrap();
    assert_eq!(
        array.dates(),
        &[session_open(), session_open() + Duration::minutes(15)]
    );
}

#[test]
fn missing_minutes_are_skipped_not_zeroed() {
    let mut bars = minute_bars(10);
    bars.remove(0);
    bars.remove(3);
    let src = source(&bars);
    let array = src
        .get_price(
            &["SPY"],
            &[PriceField::Open, PriceField::Volume],
            session_open(),
            session_open() + Duration::minutes(9),
            Frequency::Min5,
        )
        .unwrap();
    assert_eq!(array.value(session_open(), "SPY", PriceField::Open), Some(bars[0].open));
    let volume: f64 = bars[..3].iter().map(|b| b.volume).sum();
    assert_eq!(array.value(session_open(), "SPY", PriceField::Volume), Some(volume));
}

#[test]
fn intraday_does_not_aggregate_into_daily() {
    let src = source(&minute_bars(10));
    assert!(src
        .get_price(&["SPY"], &[PriceField::Close], session_open(), session_open(), Frequency::Daily)
        .is_err());
}
