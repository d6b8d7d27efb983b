//! In-memory price source backed by a shared [`PriceBundle`].

use super::aggregate::aggregate;
use super::array::PriceArray;
use super::bundle::PriceBundle;
use super::field::PriceField;
use super::source::{DataError, PriceSource};
use crate::time::Frequency;
use chrono::NaiveDateTime;
use std::sync::Arc;

/// Serves the bundle's native frequency and any coarser multiple of it.
#[derive(Debug, Clone)]
pub struct PresetSource {
    name: String,
    bundle: Arc<PriceBundle>,
}

impl PresetSource {
    pub fn new(bundle: PriceBundle) -> Self {
        Self::shared(Arc::new(bundle))
    }

    pub fn shared(bundle: Arc<PriceBundle>) -> Self {
        Self {
            name: "preset".into(),
            bundle,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn bundle(&self) -> &Arc<PriceBundle> {
        &self.bundle
    }
}

impl PriceSource for PresetSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn native_frequency(&self) -> Frequency {
        self.bundle.frequency()
    }

    fn available_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        Some((self.bundle.first_date()?, self.bundle.last_date()?))
    }

    fn instruments(&self) -> Vec<String> {
        self.bundle.instruments().to_vec()
    }

    fn get_price(
        &self,
        instruments: &[&str],
        fields: &[PriceField],
        start: NaiveDateTime,
        end: NaiveDateTime,
        frequency: Frequency,
    ) -> Result<PriceArray, DataError> {
        let native = self.bundle.frequency();
        if frequency != native && !frequency.is_multiple_of(native) {
            return Err(DataError::UnsupportedFrequency {
                requested: frequency,
                native,
            });
        }
        if let Some(unknown) = instruments.iter().find(|s| !self.bundle.contains(s)) {
            return Err(DataError::UnknownInstrument(unknown.to_string()));
        }
        let from = frequency.bucket_start(start);
        let last_label = frequency.bucket_start(end);
        let owned: Vec<String> = instruments.iter().map(|s| s.to_string()).collect();
        if last_label < from {
            return Ok(PriceArray::empty(Vec::new(), owned, fields.to_vec()));
        }

        let (available_start, available_end) = self.available_range().ok_or(DataError::NoData)?;
        let until = frequency.next_bucket(last_label);
        if from > available_end || until <= available_start {
            return Err(DataError::OutOfRange {
                instruments: owned,
                frequency,
                start,
                end,
                available_start,
                available_end,
            });
        }

        let raw = self.bundle.slice(instruments, fields, from, until)?;
        if frequency == native {
            Ok(raw)
        } else {
            Ok(aggregate(&raw, frequency))
        }
    }
}
