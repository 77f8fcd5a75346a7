//! Data model shared by every component: points, series, validity windows.

pub mod point;
pub mod series;

pub use point::{
    add_months, month_ordinal, month_start, month_timestamp, months_between, Frequency,
    MeasurementPoint,
};
pub use series::{SeriesError, SiteSeries, ValidityWindow};
