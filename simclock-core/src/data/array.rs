//! PriceArray: a dense `(date × instrument × field)` block of values.
//!
//! Missing observations are NaN. Dates are bar labels, sorted ascending.

use super::field::PriceField;
use super::source::DataError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceArray {
    dates: Vec<NaiveDateTime>,
    instruments: Vec<String>,
    fields: Vec<PriceField>,
    /// Row-major: date, then instrument, then field.
    values: Vec<f64>,
}

impl PriceArray {
    /// An all-NaN array over the given axes.
    pub fn empty(
        dates: Vec<NaiveDateTime>,
        instruments: Vec<String>,
        fields: Vec<PriceField>,
    ) -> Self {
        let len = dates.len() * instruments.len() * fields.len();
        Self {
            dates,
            instruments,
            fields,
            values: vec![f64::NAN; len],
        }
    }

    pub fn from_parts(
        dates: Vec<NaiveDateTime>,
        instruments: Vec<String>,
        fields: Vec<PriceField>,
        values: Vec<f64>,
    ) -> Result<Self, DataError> {
        let expected = dates.len() * instruments.len() * fields.len();
        if values.len() != expected {
            return Err(DataError::InvalidBundle(format!(
                "{} values for a {}×{}×{} array",
                values.len(),
                dates.len(),
                instruments.len(),
                fields.len()
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DataError::InvalidBundle(
                "dates must be strictly increasing".into(),
            ));
        }
        Ok(Self {
            dates,
            instruments,
            fields,
            values,
        })
    }

    pub fn dates(&self) -> &[NaiveDateTime] {
        &self.dates
    }

    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    pub fn fields(&self) -> &[PriceField] {
        &self.fields
    }

    /// Number of dates.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn instrument_index(&self, instrument: &str) -> Option<usize> {
        self.instruments.iter().position(|s| s == instrument)
    }

    pub fn field_index(&self, field: PriceField) -> Option<usize> {
        self.fields.iter().position(|f| *f == field)
    }

    pub fn date_index(&self, date: NaiveDateTime) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    fn offset(&self, date: usize, instrument: usize, field: usize) -> usize {
        (date * self.instruments.len() + instrument) * self.fields.len() + field
    }

    /// Value by position. Panics on out-of-range indices, like slice indexing.
    pub fn get(&self, date: usize, instrument: usize, field: usize) -> f64 {
        self.values[self.offset(date, instrument, field)]
    }

    pub(crate) fn set(&mut self, date: usize, instrument: usize, field: usize, value: f64) {
        let offset = self.offset(date, instrument, field);
        self.values[offset] = value;
    }

    /// Value by label. `None` when a label is not on an axis; NaN when the
    /// observation is missing.
    pub fn value(&self, date: NaiveDateTime, instrument: &str, field: PriceField) -> Option<f64> {
        Some(self.get(
            self.date_index(date)?,
            self.instrument_index(instrument)?,
            self.field_index(field)?,
        ))
    }

    /// The full column for one instrument and field, NaN included.
    pub fn series(&self, instrument: &str, field: PriceField) -> Option<Vec<(NaiveDateTime, f64)>> {
        let i = self.instrument_index(instrument)?;
        let f = self.field_index(field)?;
        Some(
            self.dates
                .iter()
                .enumerate()
                .map(|(d, date)| (*date, self.get(d, i, f)))
                .collect(),
        )
    }

    /// Latest non-NaN observation of one column.
    pub fn last_valid(&self, instrument: &str, field: PriceField) -> Option<(NaiveDateTime, f64)> {
        let i = self.instrument_index(instrument)?;
        let f = self.field_index(field)?;
        (0..self.dates.len())
            .rev()
            .map(|d| (self.dates[d], self.get(d, i, f)))
            .find(|(_, v)| !v.is_nan())
    }

    fn row_is_empty(&self, date: usize) -> bool {
        let width = self.instruments.len() * self.fields.len();
        let start = date * width;
        self.values[start..start + width].iter().all(|v| v.is_nan())
    }

    /// Drop dates on which every value is NaN.
    pub fn drop_empty_dates(self) -> Self {
        let keep: Vec<usize> = (0..self.dates.len())
            .filter(|d| !self.row_is_empty(*d))
            .collect();
        self.select_dates(&keep)
    }

    /// Keep only the last `n` dates.
    pub fn tail(self, n: usize) -> Self {
        let from = self.dates.len().saturating_sub(n);
        let keep: Vec<usize> = (from..self.dates.len()).collect();
        self.select_dates(&keep)
    }

    fn select_dates(self, keep: &[usize]) -> Self {
        if keep.len() == self.dates.len() {
            return self;
        }
        let width = self.instruments.len() * self.fields.len();
        let mut dates = Vec::with_capacity(keep.len());
        let mut values = Vec::with_capacity(keep.len() * width);
        for &d in keep {
            dates.push(self.dates[d]);
            values.extend_from_slice(&self.values[d * width..(d + 1) * width]);
        }
        Self {
            dates,
            instruments: self.instruments,
            fields: self.fields,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample() -> PriceArray {
        // 3 dates × 2 instruments × 1 field
        PriceArray::from_parts(
            vec![day(2), day(3), day(4)],
            vec!["SPY".into(), "QQQ".into()],
            vec![PriceField::Close],
            vec![100.0, 200.0, f64::NAN, f64::NAN, 102.0, f64::NAN],
        )
        .unwrap()
    }

    #[test]
    fn value_by_label() {
        let a = sample();
        assert_eq!(a.value(day(2), "QQQ", PriceField::Close), Some(200.0));
        assert!(a.value(day(3), "SPY", PriceField::Close).unwrap().is_nan());
        assert_eq!(a.value(day(5), "SPY", PriceField::Close), None);
        assert_eq!(a.value(day(2), "IWM", PriceField::Close), None);
    }

    #[test]
    fn last_valid_skips_trailing_nan() {
        let a = sample();
        assert_eq!(a.last_valid("SPY", PriceField::Close), Some((day(4), 102.0)));
        assert_eq!(a.last_valid("QQQ", PriceField::Close), Some((day(2), 200.0)));
    }

    #[test]
    fn drop_empty_dates_removes_all_nan_rows() {
        let a = sample().drop_empty_dates();
        assert_eq!(a.dates(), &[day(2), day(4)]);
        assert_eq!(a.value(day(4), "SPY", PriceField::Close), Some(102.0));
    }

    #[test]
    fn tail_keeps_latest_dates() {
        let a = sample().tail(2);
        assert_eq!(a.dates(), &[day(3), day(4)]);
        assert_eq!(sample().tail(10).len(), 3);
    }

    #[test]
    fn mismatched_shape_is_rejected() {
        let err = PriceArray::from_parts(
            vec![day(2)],
            vec!["SPY".into()],
            vec![PriceField::Close, PriceField::Open],
            vec![1.0],
        );
        assert!(matches!(err, Err(DataError::InvalidBundle(_))));
    }
}
