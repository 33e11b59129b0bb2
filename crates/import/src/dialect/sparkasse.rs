use std::path::Path;
use umsatz_core::Record;

use super::{BankDialect, DialectOptions};
use crate::csv::{parse_amount, parse_date, CsvError, CsvLayout, CsvRow, Statement};
use crate::util::re;

const COLUMNS: [&str; 17] = [
    "Auftragskonto",
    "Buchungstag",
    "Valutadatum",
    "Buchungstext",
    "Verwendungszweck",
    "Glaeubiger ID",
    "Mandatsreferenz",
    "Kundenreferenz (End-to-End)",
    "Sammlerreferenz",
    "Lastschrift Ursprungsbetrag",
    "Auslagenersatz Ruecklastschrift",
    "Beguenstigter/Zahlungspflichtiger",
    "Kontonummer/IBAN",
    "BIC (SWIFT-Code)",
    "Betrag",
    "Waehrung",
    "Info",
];

re!(re_export_name, r"\d{8}-(\d{7})-umsatz");

/// CSV-CAMT export of the German Sparkassen.
pub struct SparkasseCamt {
    layout: CsvLayout,
    date_format: String,
}

impl SparkasseCamt {
    pub const DEFAULT_DATE_FORMAT: &'static str = "%d.%m.%y";

    pub fn new(options: DialectOptions) -> Self {
        let mut layout = CsvLayout::new(&COLUMNS);
        if let Some(encoding) = options.encoding {
            layout.encoding = encoding;
        }
        Self {
            layout,
            date_format: options
                .date_format
                .unwrap_or_else(|| Self::DEFAULT_DATE_FORMAT.to_string()),
        }
    }
}

impl BankDialect for SparkasseCamt {
    fn name(&self) -> &'static str {
        "sparkasse_camt"
    }

    fn layout(&self) -> &CsvLayout {
        &self.layout
    }

    fn owner_iban(&self, statement: &Statement) -> Option<String> {
        let first = statement.rows.first()?;
        first.field("Auftragskonto").ok().map(str::to_string)
    }

    fn row_to_record(&self, row: &CsvRow, _statement: &Statement) -> Result<Record, CsvError> {
        let mut record = Record::new(
            row.field("Auftragskonto")?,
            parse_date(row.field("Buchungstag")?, &self.date_format)?,
            parse_amount(row.field("Betrag")?)?,
            row.field("Waehrung")?,
        );
        record.posting_type = row.field("Buchungstext")?.to_string();
        record.reference = row.field("Verwendungszweck")?.to_string();
        record.payee_name = row.field("Beguenstigter/Zahlungspflichtiger")?.to_string();
        record.payee_iban = row.field("Kontonummer/IBAN")?.to_string();
        record.payee_bic = row.field("BIC (SWIFT-Code)")?.to_string();
        Ok(record)
    }

    fn file_name(&self, path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        let caps = re_export_name().captures(name)?;
        Some(format!("{}.camt.csv", &caps[1]))
    }
}
