use std::collections::HashMap;
use std::io;

use csv::Error as CsvError;
use thiserror::Error;

/// Raised only by [`crate::period::Period::new`] for an out-of-range month.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PeriodError {
    #[error("month must be between 1 and 12, got {0}")]
    MonthOutOfRange(u32),
}

/// Raised when a site constant fails its bounds check during construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstantsError {
    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfBounds {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Unrecoverable failure of a balance run.
///
/// This is the *only* error path that surfaces out of the core: every
/// calculator degrades internally and records the degradation in
/// [`crate::quality::DataQualityFlags`] instead of raising. This type is
/// reserved for failures that prevent assembling any `BalanceResult` at
/// all (a corrupt period, a repository contract violation, an invariant
/// that cannot be worked around).
#[derive(Error, Debug)]
#[error("calculation failed in {component}: {message}")]
pub struct CalculationError {
    pub message: String,
    pub component: String,
    pub details: HashMap<String, String>,
}

impl CalculationError {
    pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            component: component.into(),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Failures exporting a report to CSV (monthly timeline, component
/// breakdown). Never raised by the calculation path itself.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("report cannot be exported because {0}")]
    CannotExportCsv(String),
}

impl From<CsvError> for ReportError {
    fn from(value: CsvError) -> Self {
        ReportError::CannotExportCsv(value.to_string())
    }
}

impl From<io::Error> for ReportError {
    fn from(value: io::Error) -> Self {
        ReportError::CannotExportCsv(value.to_string())
    }
}
