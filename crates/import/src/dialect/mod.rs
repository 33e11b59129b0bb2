use serde::{Deserialize, Serialize};
use std::path::Path;
use umsatz_core::{Amount, Record};

use crate::csv::{CsvError, CsvLayout, CsvRow, Encoding, Statement};

mod dkb;
mod ing;
mod sparkasse;

pub use dkb::Dkb;
pub use ing::Ing;
pub use sparkasse::SparkasseCamt;

/// Institution-specific knowledge about one CSV export format.
///
/// A dialect only converts rows; augmentation happens in the pipeline that
/// the importer composes around [`BankDialect::row_to_record`].
pub trait BankDialect: Send + Sync {
    fn name(&self) -> &'static str;

    fn layout(&self) -> &CsvLayout;

    /// IBAN of the account the statement belongs to, used to identify files.
    fn owner_iban(&self, statement: &Statement) -> Option<String>;

    fn row_to_record(&self, row: &CsvRow, statement: &Statement) -> Result<Record, CsvError>;

    /// Closing balance stated somewhere around the data rows.
    fn balance(&self, _statement: &Statement) -> Result<Option<Amount>, CsvError> {
        Ok(None)
    }

    /// Archive file name following the bank's naming convention.
    fn file_name(&self, _path: &Path) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialectKind {
    SparkasseCamt,
    Dkb,
    Ing,
}

/// Per-importer overrides for a dialect's defaults.
#[derive(Debug, Clone, Default)]
pub struct DialectOptions {
    pub currency: String,
    pub date_format: Option<String>,
    pub encoding: Option<Encoding>,
}

impl DialectKind {
    pub fn build(self, options: DialectOptions) -> Box<dyn BankDialect> {
        match self {
            DialectKind::SparkasseCamt => Box::new(SparkasseCamt::new(options)),
            DialectKind::Dkb => Box::new(Dkb::new(options)),
            DialectKind::Ing => Box::new(Ing::new(options)),
        }
    }
}

/// Parse `"1.234,56 EUR"` style cells.
pub(crate) fn parse_amount_with_currency(text: &str) -> Result<Amount, CsvError> {
    let mut parts = text.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(number), Some(currency)) => Ok(Amount::new(
            crate::csv::parse_amount(number)?,
            currency,
        )),
        _ => Err(CsvError::InvalidAmount(text.to_string())),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn amount_with_currency() {
        let a = parse_amount_with_currency("1.234,56 EUR").unwrap();
        assert_eq!(a.number, Decimal::from_str("1234.56").unwrap());
        assert_eq!(a.currency, "EUR");
    }

    #[test]
    fn amount_without_currency_is_rejected() {
        assert!(parse_amount_with_currency("1.234,56").is_err());
    }

    #[test]
    fn kinds_deserialize_from_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            dialect: DialectKind,
        }
        let w: Wrapper = toml::from_str("dialect = \"sparkasse_camt\"").unwrap();
        assert_eq!(w.dialect, DialectKind::SparkasseCamt);
        let w: Wrapper = toml::from_str("dialect = \"ing\"").unwrap();
        assert_eq!(w.dialect, DialectKind::Ing);
    }

    #[test]
    fn build_picks_matching_dialect() {
        let options = DialectOptions {
            currency: "EUR".to_string(),
            ..Default::default()
        };
        assert_eq!(DialectKind::Dkb.build(options.clone()).name(), "dkb");
        assert_eq!(DialectKind::Ing.build(options.clone()).name(), "ing");
        assert_eq!(DialectKind::SparkasseCamt.build(options).name(), "sparkasse_camt");
    }
}
