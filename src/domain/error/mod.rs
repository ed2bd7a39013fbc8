use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("date window starts on {start} which is after its end {end}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },
    #[error("amounts add up to more than can be represented")]
    Overflow,
}

pub type Result<T> = std::result::Result<T, Error>;
