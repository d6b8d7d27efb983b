//! CSV bar loading.
//!
//! Expected header: `symbol,time,open,high,low,close,volume`. `time` is the
//! bar label, either a date (`2024-01-02`) or a timestamp
//! (`2024-01-02 13:30:00` / `2024-01-02T13:30:00`).

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use simclock_core::data::{PriceBundle, PriceBundleBuilder};
use simclock_core::domain::Bar;
use simclock_core::time::Frequency;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct CsvBarRow {
    symbol: String,
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub fn parse_time(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(ts);
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("unrecognised time '{s}'"))?;
    Ok(date.and_time(NaiveTime::MIN))
}

/// Read every row of `path` into a bundle at `frequency`.
///
/// Rows failing the OHLC sanity check are skipped with a warning.
pub fn load_csv(path: &Path, frequency: Frequency) -> Result<PriceBundle> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("open bars csv: {}", path.display()))?;
    let mut builder = PriceBundleBuilder::new(frequency);
    let mut rows = 0usize;
    let mut skipped = 0usize;

    for (line, rec) in rdr.deserialize::<CsvBarRow>().enumerate() {
        let row = rec.with_context(|| format!("{}: row {}", path.display(), line + 2))?;
        let bar = Bar {
            time: parse_time(&row.time)?,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        };
        if !bar.is_sane() {
            warn!(symbol = %row.symbol, time = %bar.time, "insane bar skipped");
            skipped += 1;
            continue;
        }
        builder.add_bar(row.symbol, bar);
        rows += 1;
    }
    if rows == 0 {
        bail!("{}: no usable bars", path.display());
    }
    let bundle = builder.build()?;
    debug!(
        rows,
        skipped,
        instruments = bundle.instruments().len(),
        dates = bundle.dates().len(),
        "bars loaded"
    );
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use simclock_core::data::PriceField;
    use std::io::Write;

    fn write_csv(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "symbol,time,open,high,low,close,volume").unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_dates_and_timestamps() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(parse_time("2024-01-02").unwrap(), day.and_time(NaiveTime::MIN));
        assert_eq!(
            parse_time("2024-01-02T13:30:00").unwrap(),
            day.and_hms_opt(13, 30, 0).unwrap()
        );
        assert_eq!(
            parse_time("2024-01-02 13:31").unwrap(),
            day.and_hms_opt(13, 31, 0).unwrap()
        );
        assert!(parse_time("02/01/2024").is_err());
    }

    #[test]
    fn loads_daily_bars_for_several_symbols() {
        let file = write_csv(
            "SPY,2024-01-02,470,472,468,471,1000\n\
             SPY,2024-01-03,471,473,469,472,1100\n\
             QQQ,2024-01-03,400,401,398,399,900\n",
        );
        let bundle = load_csv(file.path(), Frequency::Daily).unwrap();
        assert_eq!(bundle.instruments().len(), 2);
        assert_eq!(bundle.dates().len(), 2);
        let jan3 = parse_time("2024-01-03").unwrap();
        assert_eq!(bundle.value(jan3, "QQQ", PriceField::Close), Some(399.0));
        let jan2 = parse_time("2024-01-02").unwrap();
        assert!(bundle.value(jan2, "QQQ", PriceField::Close).unwrap().is_nan());
    }

    #[test]
    fn skips_insane_rows() {
        let file = write_csv(
            "SPY,2024-01-02,470,472,468,471,1000\n\
             SPY,2024-01-03,471,460,469,472,1100\n",
        );
        let bundle = load_csv(file.path(), Frequency::Daily).unwrap();
        assert_eq!(bundle.dates().len(), 1);
    }

    #[test]
    fn malformed_number_names_the_row() {
        let file = write_csv("SPY,2024-01-02,abc,472,468,471,1000\n");
        let err = load_csv(file.path(), Frequency::Daily).unwrap_err();
        assert!(format!("{err:#}").contains("row 2"));
    }

    #[test]
    fn empty_file_is_an_error() {
        let file = write_csv("");
        assert!(load_csv(file.path(), Frequency::Daily).is_err());
    }
}
