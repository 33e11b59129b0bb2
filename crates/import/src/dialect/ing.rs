use umsatz_core::{Amount, Record};

use super::{BankDialect, DialectOptions};
use crate::csv::{parse_amount, parse_date, CsvError, CsvLayout, CsvRow, Statement};

// "Währung" appears twice, so rows are read by position.
const COLUMNS: [&str; 9] = [
    "Buchung",
    "Valuta",
    "Auftraggeber/Empfänger",
    "Buchungstext",
    "Verwendungszweck",
    "Saldo",
    "Währung",
    "Betrag",
    "Währung",
];

const DATE: usize = 0;
const PAYEE: usize = 2;
const POSTING_TYPE: usize = 3;
const REFERENCE: usize = 4;
const AMOUNT: usize = 7;
const CURRENCY: usize = 8;

/// ING giro account export with an unquoted header.
pub struct Ing {
    layout: CsvLayout,
    date_format: String,
}

impl Ing {
    pub const DEFAULT_DATE_FORMAT: &'static str = "%d.%m.%Y";

    pub fn new(options: DialectOptions) -> Self {
        let mut layout = CsvLayout::new(&COLUMNS);
        layout.quoted_header = false;
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

    fn preamble_cells(&self, statement: &Statement, key: &str) -> Option<Vec<String>> {
        statement
            .preamble
            .iter()
            .map(|line| self.layout.split_line(line))
            .find(|cells| cells.first().map(String::as_str) == Some(key))
    }
}

impl BankDialect for Ing {
    fn name(&self) -> &'static str {
        "ing"
    }

    fn layout(&self) -> &CsvLayout {
        &self.layout
    }

    fn owner_iban(&self, statement: &Statement) -> Option<String> {
        let cells = self.preamble_cells(statement, "IBAN")?;
        cells.get(1).map(|iban| iban.trim().to_string())
    }

    fn row_to_record(&self, row: &CsvRow, statement: &Statement) -> Result<Record, CsvError> {
        let mut record = Record::new(
            self.owner_iban(statement).unwrap_or_default(),
            parse_date(row.at(DATE)?, &self.date_format)?,
            parse_amount(row.at(AMOUNT)?)?,
            row.at(CURRENCY)?,
        );
        record.posting_type = row.at(POSTING_TYPE)?.to_string();
        record.reference = row.at(REFERENCE)?.to_string();
        record.payee_name = row.at(PAYEE)?.to_string();
        Ok(record)
    }

    fn balance(&self, statement: &Statement) -> Result<Option<Amount>, CsvError> {
        let Some(cells) = self.preamble_cells(statement, "Saldo") else {
            return Ok(None);
        };
        match cells.as_slice() {
            [_, number, currency, ..] => Ok(Some(Amount::new(parse_amount(number)?, currency.trim()))),
            _ => Err(CsvError::InvalidAmount(cells.join(";"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv::read_statement;
    use crate::dialect::testing::latin1;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const EXPORT: &str = "\
Umsatzanzeige;Datei erstellt am: 02.04.2024 10:00

IBAN;DE12 5001 0517 0648 4898 90
Kontoname;Girokonto
Bank;ING
Kunde;Erika Mustermann
Zeitraum;01.03.2024 - 31.03.2024
Saldo;1.234,56;EUR

Sortierung;Datum absteigend

Buchung;Valuta;Auftraggeber/Empfänger;Buchungstext;Verwendungszweck;Saldo;Währung;Betrag;Währung
28.03.2024;28.03.2024;REWE Markt GmbH;Lastschrift;REWE SAGT DANKE;1.234,56;EUR;-45,10;EUR
27.03.2024;27.03.2024;Stadtwerke;Gutschrift;Erstattung 2023;1.279,66;EUR;100,00;EUR
";

    fn dialect() -> Ing {
        Ing::new(DialectOptions {
            currency: "EUR".to_string(),
            ..Default::default()
        })
    }

    fn statement() -> Statement {
        let d = dialect();
        let bytes = latin1(EXPORT);
        let text = d.layout().encoding.decode(&bytes).unwrap();
        read_statement(&text, d.layout()).unwrap()
    }

    #[test]
    fn header_is_unquoted() {
        assert!(dialect()
            .layout()
            .expected_header()
            .starts_with("Buchung;Valuta;Auftraggeber/Empfänger;"));
    }

    #[test]
    fn rows_and_line_numbers() {
        let st = statement();
        assert_eq!(st.rows.len(), 2);
        assert_eq!(st.rows[0].line, 13);
        assert_eq!(st.rows[1].line, 14);
    }

    #[test]
    fn owner_iban_keeps_grouping() {
        assert_eq!(
            dialect().owner_iban(&statement()).as_deref(),
            Some("DE12 5001 0517 0648 4898 90")
        );
    }

    #[test]
    fn balance_from_saldo_line() {
        let balance = dialect().balance(&statement()).unwrap().unwrap();
        assert_eq!(balance.number, Decimal::from_str("1234.56").unwrap());
        assert_eq!(balance.currency, "EUR");
    }

    #[test]
    fn row_to_record_uses_positions() {
        let st = statement();
        let r = dialect().row_to_record(&st.rows[0], &st).unwrap();
        assert_eq!(r.date(), NaiveDate::from_ymd_opt(2024, 3, 28).unwrap());
        assert_eq!(r.payee_name, "REWE Markt GmbH");
        assert_eq!(r.posting_type, "Lastschrift");
        assert_eq!(r.reference, "REWE SAGT DANKE");
        assert_eq!(r.amount(), Decimal::from_str("-45.10").unwrap());
        assert_eq!(r.currency(), "EUR");
        assert_eq!(r.payee_iban, "");
        assert_eq!(r.owner_iban(), "DE12 5001 0517 0648 4898 90");
    }

    #[test]
    fn malformed_saldo_line_is_an_error() {
        let d = dialect();
        let text = format!("Saldo;1.234,56\n{}\n", d.layout().expected_header());
        let st = read_statement(&text, d.layout()).unwrap();
        assert!(d.balance(&st).is_err());
    }
}
