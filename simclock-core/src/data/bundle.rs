//! PriceBundle: the immutable in-memory store behind [`PresetSource`](super::preset::PresetSource).
//!
//! Every symbol is aligned to the union of all bar labels; a symbol with no
//! bar at a label gets NaN in every field. Nothing is forward-filled here.

use super::array::PriceArray;
use super::field::PriceField;
use super::source::DataError;
use crate::domain::Bar;
use crate::time::Frequency;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct PriceBundle {
    frequency: Frequency,
    array: PriceArray,
    date_index: HashMap<NaiveDateTime, usize>,
    instrument_index: HashMap<String, usize>,
    field_index: HashMap<PriceField, usize>,
}

impl PriceBundle {
    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn dates(&self) -> &[NaiveDateTime] {
        self.array.dates()
    }

    pub fn instruments(&self) -> &[String] {
        self.array.instruments()
    }

    pub fn first_date(&self) -> Option<NaiveDateTime> {
        self.array.dates().first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDateTime> {
        self.array.dates().last().copied()
    }

    pub fn contains(&self, instrument: &str) -> bool {
        self.instrument_index.contains_key(instrument)
    }

    /// O(1) point lookup. `None` when a label is not on an axis.
    pub fn value(&self, date: NaiveDateTime, instrument: &str, field: PriceField) -> Option<f64> {
        Some(self.array.get(
            *self.date_index.get(&date)?,
            *self.instrument_index.get(instrument)?,
            *self.field_index.get(&field)?,
        ))
    }

    /// Copy out labels in `[start, end)` for the requested instruments and fields.
    pub fn slice(
        &self,
        instruments: &[&str],
        fields: &[PriceField],
        start: NaiveDateTime,
        end_exclusive: NaiveDateTime,
    ) -> Result<PriceArray, DataError> {
        let columns: Vec<usize> = instruments
            .iter()
            .map(|s| {
                self.instrument_index
                    .get(*s)
                    .copied()
                    .ok_or_else(|| DataError::UnknownInstrument(s.to_string()))
            })
            .collect::<Result<_, _>>()?;
        let field_columns: Vec<Option<usize>> = fields
            .iter()
            .map(|f| self.field_index.get(f).copied())
            .collect();

        let dates = self.array.dates();
        let from = dates.partition_point(|d| *d < start);
        let to = dates.partition_point(|d| *d < end_exclusive);
        let selected: Vec<NaiveDateTime> = dates[from..to.max(from)].to_vec();

        let mut out = PriceArray::empty(
            selected,
            instruments.iter().map(|s| s.to_string()).collect(),
            fields.to_vec(),
        );
        for (row, d) in (from..to.max(from)).enumerate() {
            for (i, &col) in columns.iter().enumerate() {
                for (f, fcol) in field_columns.iter().enumerate() {
                    if let Some(fcol) = *fcol {
                        out.set(row, i, f, self.array.get(d, col, fcol));
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Collects bars per symbol and builds an aligned [`PriceBundle`].
#[derive(Debug, Clone)]
pub struct PriceBundleBuilder {
    frequency: Frequency,
    bars: BTreeMap<String, BTreeMap<NaiveDateTime, Bar>>,
}

impl PriceBundleBuilder {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            bars: BTreeMap::new(),
        }
    }

    pub fn add_bar(&mut self, symbol: impl Into<String>, bar: Bar) -> &mut Self {
        self.bars.entry(symbol.into()).or_default().insert(bar.time, bar);
        self
    }

    pub fn add_bars(&mut self, symbol: &str, bars: impl IntoIterator<Item = Bar>) -> &mut Self {
        let series = self.bars.entry(symbol.to_string()).or_default();
        for bar in bars {
            series.insert(bar.time, bar);
        }
        self
    }

    /// Align all symbols on the union of labels. A later bar with the same
    /// label replaces the earlier one.
    pub fn build(&self) -> Result<PriceBundle, DataError> {
        if self.bars.is_empty() {
            return Err(DataError::NoData);
        }
        let mut all_dates = BTreeSet::new();
        for (symbol, series) in &self.bars {
            for time in series.keys() {
                if self.frequency.bucket_start(*time) != *time {
                    return Err(DataError::InvalidBundle(format!(
                        "{symbol}: bar label {time} is not aligned to {}",
                        self.frequency
                    )));
                }
                all_dates.insert(*time);
            }
        }
        let dates: Vec<NaiveDateTime> = all_dates.into_iter().collect();
        let instruments: Vec<String> = self.bars.keys().cloned().collect();
        let fields = PriceField::ALL.to_vec();

        let date_index: HashMap<NaiveDateTime, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
        let mut array = PriceArray::empty(dates, instruments.clone(), fields.clone());
        for (i, series) in self.bars.values().enumerate() {
            for (time, bar) in series {
                let d = date_index[time];
                array.set(d, i, 0, bar.open);
                array.set(d, i, 1, bar.high);
                array.set(d, i, 2, bar.low);
                array.set(d, i, 3, bar.close);
                array.set(d, i, 4, bar.volume);
            }
        }

        Ok(PriceBundle {
            frequency: self.frequency,
            array,
            date_index,
            instrument_index: instruments
                .into_iter()
                .enumerate()
                .map(|(i, s)| (s, i))
                .collect(),
            field_index: fields.into_iter().enumerate().map(|(i, f)| (f, i)).collect(),
        })
    }
}
