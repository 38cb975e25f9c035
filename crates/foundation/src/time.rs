use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Calendar dates travel as `YYYY-MM-DD` strings on every wire we talk to.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    Unparseable(String),
    Inverted { start: NaiveDate, end: NaiveDate },
}

impl std::fmt::Display for DateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateError::Unparseable(raw) => write!(f, "not a YYYY-MM-DD date: {raw:?}"),
            DateError::Inverted { start, end } => {
                write!(f, "date range ends before it starts: {start} > {end}")
            }
        }
    }
}

impl std::error::Error for DateError {}

pub fn parse_date(raw: &str) -> Result<NaiveDate, DateError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| DateError::Unparseable(raw.to_string()))
}

/// Inclusive calendar range.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateError> {
        if start > end {
            return Err(DateError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, DateError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }
}

/// Inclusive span of years used by hotspot analysis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearWindow {
    pub start_year: i32,
    pub end_year: i32,
}

impl YearWindow {
    pub fn new(start_year: i32, end_year: i32) -> Self {
        Self {
            start_year: start_year.min(end_year),
            end_year: start_year.max(end_year),
        }
    }
}

/// The three key dates of a flood event: before, at peak, after.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateTriple {
    pub pre: NaiveDate,
    pub peak: NaiveDate,
    pub post: NaiveDate,
}

impl DateTriple {
    pub fn pair(&self) -> DatePair {
        DatePair {
            pre: self.pre,
            peak: self.peak,
        }
    }
}

/// The (pre, peak) dates that key an impact assessment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatePair {
    pub pre: NaiveDate,
    pub peak: NaiveDate,
}
