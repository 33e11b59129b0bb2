use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] ::csv::Error),
    #[error("File is not valid {0}")]
    Encoding(Encoding),
    #[error("Header line not found: {0}")]
    HeaderNotFound(String),
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    #[error("Invalid date '{value}' (expected format {format})")]
    InvalidDate { value: String, format: String },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "iso-8859-1")]
    Latin1,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Utf8 => write!(f, "UTF-8"),
            Encoding::Latin1 => write!(f, "ISO-8859-1"),
        }
    }
}

impl Encoding {
    pub fn decode<'a>(self, data: &'a [u8]) -> Result<Cow<'a, str>, CsvError> {
        match self {
            Encoding::Utf8 => {
                let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
                std::str::from_utf8(data)
                    .map(Cow::Borrowed)
                    .map_err(|_| CsvError::Encoding(self))
            }
            // Every byte is the code point of the same value.
            Encoding::Latin1 => Ok(Cow::Owned(data.iter().map(|&b| char::from(b)).collect())),
        }
    }
}

/// Physical shape of one institution's CSV export.
#[derive(Debug, Clone)]
pub struct CsvLayout {
    pub delimiter: u8,
    pub quote: u8,
    pub encoding: Encoding,
    pub columns: Vec<String>,
    pub quoted_header: bool,
    pub trailing_delimiter: bool,
}

impl CsvLayout {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            delimiter: b';',
            quote: b'"',
            encoding: Encoding::Latin1,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            quoted_header: true,
            trailing_delimiter: false,
        }
    }

    /// The header line exactly as the bank writes it.
    pub fn expected_header(&self) -> String {
        let delimiter = char::from(self.delimiter);
        let quote = char::from(self.quote);
        let mut header = self
            .columns
            .iter()
            .map(|c| {
                if self.quoted_header {
                    format!("{quote}{c}{quote}")
                } else {
                    c.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(&delimiter.to_string());
        if self.trailing_delimiter {
            header.push(delimiter);
        }
        header
    }

    /// Split a single non-data line (preamble or footer) into its cells.
    pub fn split_line(&self, line: &str) -> Vec<String> {
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .from_reader(line.as_bytes());
        match reader.records().next() {
            Some(Ok(record)) => record.iter().map(|s| s.to_string()).collect(),
            _ => Vec::new(),
        }
    }
}

/// One data row together with its 1-based line number in the file.
#[derive(Debug, Clone)]
pub struct CsvRow {
    pub line: usize,
    columns: Vec<String>,
    fields: Vec<String>,
}

impl CsvRow {
    pub fn field(&self, column: &str) -> Result<&str, CsvError> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.fields.get(idx))
            .map(String::as_str)
            .ok_or_else(|| CsvError::MissingColumn(column.to_string()))
    }

    pub fn at(&self, idx: usize) -> Result<&str, CsvError> {
        self.fields
            .get(idx)
            .map(String::as_str)
            .ok_or_else(|| CsvError::MissingColumn(format!("column {idx}")))
    }
}

/// A decoded export split into the lines around the data and the data rows.
#[derive(Debug, Clone, Default)]
pub struct Statement {
    pub preamble: Vec<String>,
    pub rows: Vec<CsvRow>,
    pub footer: Vec<String>,
}

impl Statement {
    pub fn surrounding_lines(&self) -> impl Iterator<Item = &str> {
        self.preamble
            .iter()
            .chain(self.footer.iter())
            .map(String::as_str)
    }
}

pub fn read_statement(text: &str, layout: &CsvLayout) -> Result<Statement, CsvError> {
    let expected = layout.expected_header();
    let lines: Vec<&str> = text.lines().collect();
    let header_idx = lines
        .iter()
        .position(|l| l.trim() == expected)
        .ok_or(CsvError::HeaderNotFound(expected))?;

    let body = lines[header_idx + 1..].join("\n");
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(layout.delimiter)
        .quote(layout.quote)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    // First short row: (line, field count). Everything from there on is footer.
    let mut footer_start: Option<(usize, usize)> = None;
    for result in reader.records() {
        let record = result?;
        let line = physical_line(&lines, header_idx, &record);
        let width = record.len();
        if let Some((start, found)) = footer_start {
            if width >= layout.columns.len() {
                return Err(CsvError::MissingColumn(format!(
                    "line {start} has {found} of {} columns, data continues on line {line}",
                    layout.columns.len()
                )));
            }
            continue;
        }
        if width < layout.columns.len() {
            footer_start = Some((line, width));
            continue;
        }
        rows.push(CsvRow {
            line,
            columns: layout.columns.clone(),
            fields: record.iter().map(|s| s.to_string()).collect(),
        });
    }

    let footer = footer_start
        .map(|(start, _)| lines[start - 1..].iter().map(|l| l.to_string()).collect())
        .unwrap_or_default();

    Ok(Statement {
        preamble: lines[..header_idx].iter().map(|l| l.to_string()).collect(),
        rows,
        footer,
    })
}

/// 1-based line of `record` in the whole file. The reader skips blank lines
/// but reports the position where it started looking, so step over them.
fn physical_line(lines: &[&str], header_idx: usize, record: &::csv::StringRecord) -> usize {
    let offset = record.position().map_or(1, |p| p.line() as usize);
    // Header sits on line header_idx + 1; the body starts right after it.
    let mut line = header_idx + 1 + offset;
    while lines.get(line - 1).is_some_and(|l| l.is_empty()) {
        line += 1;
    }
    line
}

/// Parse an amount in German notation: `.` groups thousands, `,` is the decimal mark.
pub fn parse_amount(s: &str) -> Result<Decimal, CsvError> {
    let s = s.trim();
    let normalized = s.replace(['.', ' '], "").replace(',', ".");
    Decimal::from_str(&normalized).map_err(|_| CsvError::InvalidAmount(s.to_string()))
}

pub fn parse_date(s: &str, format: &str) -> Result<NaiveDate, CsvError> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, format).map_err(|_| CsvError::InvalidDate {
        value: s.to_string(),
        format: format.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_amount ──────────────────────────────────────────────────────────

    #[test]
    fn parse_amount_german_comma() {
        assert_eq!(parse_amount("-23,91").unwrap(), Decimal::from_str("-23.91").unwrap());
    }

    #[test]
    fn parse_amount_thousands_separator() {
        assert_eq!(parse_amount("1.234,56").unwrap(), Decimal::from_str("1234.56").unwrap());
        assert_eq!(
            parse_amount("-1.000.000,00").unwrap(),
            Decimal::from_str("-1000000.00").unwrap()
        );
    }

    #[test]
    fn parse_amount_keeps_scale() {
        assert_eq!(parse_amount("0,00").unwrap().to_string(), "0.00");
        assert_eq!(parse_amount("12,5").unwrap().to_string(), "12.5");
    }

    #[test]
    fn parse_amount_whole_number() {
        assert_eq!(parse_amount("100").unwrap(), Decimal::from(100));
    }

    #[test]
    fn parse_amount_invalid() {
        assert!(matches!(parse_amount("abc"), Err(CsvError::InvalidAmount(_))));
        assert!(parse_amount("").is_err());
    }

    // ── parse_date ────────────────────────────────────────────────────────────

    #[test]
    fn parse_date_two_digit_year() {
        assert_eq!(
            parse_date("01.01.99", "%d.%m.%y").unwrap(),
            NaiveDate::from_ymd_opt(1999, 1, 1).unwrap()
        );
        assert_eq!(
            parse_date("15.03.24", "%d.%m.%y").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
    }

    #[test]
    fn parse_date_invalid() {
        assert!(matches!(
            parse_date("2024-03-15", "%d.%m.%Y"),
            Err(CsvError::InvalidDate { .. })
        ));
    }

    // ── encoding ──────────────────────────────────────────────────────────────

    #[test]
    fn latin1_maps_bytes_to_code_points() {
        let text = Encoding::Latin1.decode(b"Gl\xe4ubiger").unwrap();
        assert_eq!(text, "Gläubiger");
    }

    #[test]
    fn utf8_strips_bom_and_rejects_garbage() {
        assert_eq!(Encoding::Utf8.decode(b"\xEF\xBB\xBFabc").unwrap(), "abc");
        assert!(matches!(
            Encoding::Utf8.decode(b"Gl\xe4ubiger"),
            Err(CsvError::Encoding(Encoding::Utf8))
        ));
    }

    // ── layout ────────────────────────────────────────────────────────────────

    #[test]
    fn expected_header_variants() {
        let mut layout = CsvLayout::new(&["A", "B"]);
        assert_eq!(layout.expected_header(), "\"A\";\"B\"");
        layout.trailing_delimiter = true;
        assert_eq!(layout.expected_header(), "\"A\";\"B\";");
        layout.quoted_header = false;
        assert_eq!(layout.expected_header(), "A;B;");
    }

    #[test]
    fn split_line_unquotes_cells() {
        let layout = CsvLayout::new(&["A"]);
        assert_eq!(
            layout.split_line("\"Kontostand vom 31.03.2024:\";\"1.234,56 EUR\";"),
            ["Kontostand vom 31.03.2024:", "1.234,56 EUR", ""]
        );
    }

    // ── read_statement ────────────────────────────────────────────────────────

    #[test]
    fn read_statement_splits_preamble_rows_and_footer() {
        let layout = CsvLayout::new(&["Datum", "Betrag"]);
        let text = "\
\"Konto:\";\"DE12\"

\"Datum\";\"Betrag\"
\"01.03.2024\";\"-1,00\"
\"02.03.2024\";\"2,50\"

\"Alter Kontostand: 10,00\"
\"Neuer Kontostand: 11,50\"
";
        let st = read_statement(text, &layout).unwrap();
        assert_eq!(st.preamble, ["\"Konto:\";\"DE12\"", ""]);
        assert_eq!(st.rows.len(), 2);
        assert_eq!(st.rows[0].line, 4);
        assert_eq!(st.rows[1].line, 5);
        assert_eq!(st.rows[1].field("Betrag").unwrap(), "2,50");
        assert_eq!(
            st.footer,
            ["\"Alter Kontostand: 10,00\"", "\"Neuer Kontostand: 11,50\""]
        );
    }

    #[test]
    fn blank_lines_between_rows_keep_physical_line_numbers() {
        let layout = CsvLayout::new(&["Datum", "Betrag"]);
        let text = "\"Datum\";\"Betrag\"\n\"01.03.2024\";\"-1,00\"\n\n\"02.03.2024\";\"2,50\"\n";
        let st = read_statement(text, &layout).unwrap();
        let lines: Vec<_> = st.rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, [2, 4]);
        assert!(st.footer.is_empty());
    }

    #[test]
    fn short_row_between_data_rows_is_an_error() {
        let layout = CsvLayout::new(&["Datum", "Betrag", "Info"]);
        let text = "\
\"Datum\";\"Betrag\";\"Info\"
\"01.03.2024\";\"-1,00\";\"a\"
\"02.03.2024\";\"2,50\"
\"03.03.2024\";\"4,00\";\"c\"
";
        match read_statement(text, &layout) {
            Err(CsvError::MissingColumn(msg)) => {
                assert!(msg.contains("line 3"), "{msg}");
                assert!(msg.contains("line 4"), "{msg}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn read_statement_without_footer() {
        let layout = CsvLayout::new(&["Datum", "Betrag"]);
        let text = "\"Datum\";\"Betrag\"\n\"01.03.2024\";\"-1,00\"\n";
        let st = read_statement(text, &layout).unwrap();
        assert!(st.preamble.is_empty());
        assert!(st.footer.is_empty());
        assert_eq!(st.rows[0].line, 2);
        assert_eq!(st.rows[0].at(0).unwrap(), "01.03.2024");
    }

    #[test]
    fn read_statement_requires_exact_header() {
        let layout = CsvLayout::new(&["Datum", "Betrag"]);
        let text = "\"Betrag\";\"Datum\"\n\"-1,00\";\"01.03.2024\"\n";
        assert!(matches!(
            read_statement(text, &layout),
            Err(CsvError::HeaderNotFound(_))
        ));
    }

    #[test]
    fn missing_column_is_reported() {
        let layout = CsvLayout::new(&["Datum", "Betrag"]);
        let text = "\"Datum\";\"Betrag\"\n\"01.03.2024\";\"-1,00\"\n";
        let st = read_statement(text, &layout).unwrap();
        assert!(matches!(
            st.rows[0].field("Waehrung"),
            Err(CsvError::MissingColumn(_))
        ));
        assert!(st.rows[0].at(5).is_err());
    }
}
