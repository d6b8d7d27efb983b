//! Market data: storage, raw sources, resampling and look-ahead-safe access.

pub mod aggregate;
pub mod array;
pub mod bundle;
pub mod field;
pub mod handler;
pub mod preset;
pub mod source;

pub use aggregate::aggregate;
pub use array::PriceArray;
pub use bundle::{PriceBundle, PriceBundleBuilder};
pub use field::PriceField;
pub use handler::{DataHandler, PriceMap, FORWARD_FILL_DAYS};
pub use preset::PresetSource;
pub use source::{DataError, PriceSource};
