use umsatz_core::{Amount, Record};

use super::{parse_amount_with_currency, BankDialect, DialectOptions};
use crate::csv::{parse_amount, parse_date, CsvError, CsvLayout, CsvRow, Statement};

const COLUMNS: [&str; 11] = [
    "Buchungstag",
    "Wertstellung",
    "Buchungstext",
    "Auftraggeber / Begünstigter",
    "Verwendungszweck",
    "Kontonummer",
    "BLZ",
    "Betrag (EUR)",
    "Gläubiger-ID",
    "Mandatsreferenz",
    "Kundenreferenz",
];

/// DKB giro account export. The account and closing balance live in the
/// preamble above the header:
///
/// ```text
/// "Kontonummer:";"DE12120300000012345678 / Girokonto";
/// "Kontostand vom 31.03.2024:";"1.234,56 EUR";
/// ```
pub struct Dkb {
    layout: CsvLayout,
    date_format: String,
    currency: String,
}

impl Dkb {
    pub const DEFAULT_DATE_FORMAT: &'static str = "%d.%m.%Y";

    pub fn new(options: DialectOptions) -> Self {
        let mut layout = CsvLayout::new(&COLUMNS);
        layout.trailing_delimiter = true;
        if let Some(encoding) = options.encoding {
            layout.encoding = encoding;
        }
        Self {
            layout,
            date_format: options
                .date_format
                .unwrap_or_else(|| Self::DEFAULT_DATE_FORMAT.to_string()),
            currency: options.currency,
        }
    }

    fn preamble_value(&self, statement: &Statement, label: impl Fn(&str) -> bool) -> Option<String> {
        statement.surrounding_lines().find_map(|line| {
            let cells = self.layout.split_line(line);
            match cells.as_slice() {
                [key, value, ..] if label(key.as_str()) => Some(value.clone()),
                _ => None,
            }
        })
    }
}

impl BankDialect for Dkb {
    fn name(&self) -> &'static str {
        "dkb"
    }

    fn layout(&self) -> &CsvLayout {
        &self.layout
    }

    fn owner_iban(&self, statement: &Statement) -> Option<String> {
        let account = self.preamble_value(statement, |key| key == "Kontonummer:")?;
        account.split(" / ").next().map(|iban| iban.trim().to_string())
    }

    fn row_to_record(&self, row: &CsvRow, statement: &Statement) -> Result<Record, CsvError> {
        let owner_iban = self.owner_iban(statement).unwrap_or_default();
        let mut record = Record::new(
            owner_iban,
            parse_date(row.field("Buchungstag")?, &self.date_format)?,
            parse_amount(row.field("Betrag (EUR)")?)?,
            self.currency.as_str(),
        );
        record.posting_type = row.field("Buchungstext")?.to_string();
        record.reference = row.field("Verwendungszweck")?.to_string();
        record.payee_name = row.field("Auftraggeber / Begünstigter")?.to_string();
        record.payee_iban = row.field("Kontonummer")?.to_string();
        record.payee_bic = row.field("BLZ")?.to_string();
        Ok(record)
    }

    fn balance(&self, statement: &Statement) -> Result<Option<Amount>, CsvError> {
        self.preamble_value(statement, |key| key.starts_with("Kontostand vom"))
            .map(|cell| parse_amount_with_currency(&cell))
            .transpose()
    }
}
