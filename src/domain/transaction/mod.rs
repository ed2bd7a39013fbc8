use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer};

/// Name used for transactions that carry no usable category.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Separator between the levels of a category path, e.g. `Debt/Loan`.
pub const CATEGORY_SEPARATOR: char = '/';

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y"];

/// One row of a transaction export.
///
/// A date that could not be read is kept as `None` so the row can still be
/// accounted for as skipped when the flow is built.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
pub struct Transaction {
    #[serde(rename = "Date", deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "Category", default)]
    pub category: Option<String>,
    #[serde(rename = "Amount", deserialize_with = "amount")]
    pub amount: Decimal,
}

impl Transaction {
    #[cfg(test)]
    pub fn new(date: Option<NaiveDate>, category: Option<&str>, amount: Decimal) -> Self {
        Self {
            date,
            category: category.map(str::to_owned),
            amount,
        }
    }

    /// The first segment of the category path, or [`UNKNOWN_CATEGORY`].
    pub fn top_level_category(&self) -> &str {
        self.category
            .as_deref()
            .and_then(|category| category.split(CATEGORY_SEPARATOR).next())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_CATEGORY)
    }
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

/// Parses a signed amount, tolerating currency symbols and thousands
/// separators such as `-$1,234.50`.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();

    Decimal::from_str(&cleaned).ok()
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_date))
}

fn amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_amount(&raw).ok_or_else(|| de::Error::custom(format!("invalid amount {raw:?}")))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use super::*;

    #[rstest]
    #[case(Some("Debt/Loan"), "Debt")]
    #[case(Some("Food"), "Food")]
    #[case(Some(" Housing / Rent"), "Housing")]
    #[case(Some(""), UNKNOWN_CATEGORY)]
    #[case(Some("/Orphan"), UNKNOWN_CATEGORY)]
    #[case(None, UNKNOWN_CATEGORY)]
    fn top_level_category(#[case] category: Option<&str>, #[case] expected: &str) {
        let tx = Transaction::new(None, category, dec!(1));
        assert_eq!(tx.top_level_category(), expected);
    }

    #[rstest]
    #[case("2024-01-05", Some((2024, 1, 5)))]
    #[case("01/05/2024", Some((2024, 1, 5)))]
    #[case("2024/01/05", Some((2024, 1, 5)))]
    #[case("05.01.2024", Some((2024, 1, 5)))]
    #[case("not a date", None)]
    #[case("2024-02-30", None)]
    fn dates(#[case] raw: &str, #[case] expected: Option<(i32, u32, u32)>) {
        let expected = expected.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        assert_eq!(parse_date(raw), expected);
    }

    #[rstest]
    #[case("-300", Some(dec!(-300)))]
    #[case("2000.50", Some(dec!(2000.50)))]
    #[case("-$1,234.56", Some(dec!(-1234.56)))]
    #[case("", None)]
    #[case("twelve", None)]
    fn amounts(#[case] raw: &str, #[case] expected: Option<Decimal>) {
        assert_eq!(parse_amount(raw), expected);
    }
}
