use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use thiserror::Error;
use umsatz_core::{assemble, balance_directive, Account, Balance, Directive, Flag, Source, Transaction};

use crate::csv::{read_statement, CsvError, Statement};
use crate::dialect::BankDialect;
use crate::pipeline::Pipeline;
use crate::rules::RuleError;
use crate::util::normalize_iban;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Csv(#[from] CsvError),
    #[error("Line {line}: {source}")]
    Row { line: usize, source: CsvError },
    #[error("Line {line}: {source}")]
    Hook { line: usize, source: RuleError },
}

/// Everything extracted from one statement file.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub transactions: Vec<Transaction>,
    pub balance: Option<Balance>,
}

impl Extraction {
    pub fn directives(self) -> Vec<Directive> {
        self.transactions
            .into_iter()
            .map(Directive::Transaction)
            .chain(self.balance.map(Directive::Balance))
            .collect()
    }
}

/// One bank account: a dialect, the hooks applied to its records and the
/// ledger account the transactions are booked on.
pub struct Importer {
    dialect: Box<dyn BankDialect>,
    iban: String,
    account: Account,
    flag: Flag,
    pipeline: Pipeline,
}

impl Importer {
    pub fn new(
        dialect: Box<dyn BankDialect>,
        iban: impl Into<String>,
        account: Account,
        pipeline: Pipeline,
    ) -> Self {
        Self {
            dialect,
            iban: iban.into(),
            account,
            flag: Flag::default(),
            pipeline,
        }
    }

    pub fn with_flag(mut self, flag: Flag) -> Self {
        self.flag = flag;
        self
    }

    pub fn name(&self) -> &'static str {
        self.dialect.name()
    }

    pub fn iban(&self) -> &str {
        &self.iban
    }

    pub fn flag(&self) -> Flag {
        self.flag
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn read(&self, path: &Path) -> Result<Statement, ImportError> {
        let bytes = std::fs::read(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let layout = self.dialect.layout();
        let text = layout.encoding.decode(&bytes)?;
        Ok(read_statement(&text, layout)?)
    }

    /// Whether `path` is an export of this importer's account.
    pub fn identify(&self, path: &Path) -> bool {
        let statement = match self.read(path) {
            Ok(statement) => statement,
            Err(e) => {
                tracing::debug!("{} cannot handle {}: {e}", self.name(), path.display());
                return false;
            }
        };
        let expected = normalize_iban(&self.iban);
        let found = self.dialect.owner_iban(&statement);
        let matches = found.as_deref().map(normalize_iban).as_deref() == Some(expected.as_str());
        tracing::debug!(
            importer = self.name(),
            path = %path.display(),
            owner_iban = ?found,
            matches,
            "identify"
        );
        matches
    }

    pub fn extract(&self, path: &Path) -> Result<Extraction, ImportError> {
        let statement = self.read(path)?;
        let filename = path.display().to_string();

        let mut transactions = Vec::with_capacity(statement.rows.len());
        for row in &statement.rows {
            let record = self
                .dialect
                .row_to_record(row, &statement)
                .map_err(|source| ImportError::Row {
                    line: row.line,
                    source,
                })?;
            let record = self.pipeline.run(record).map_err(|source| ImportError::Hook {
                line: row.line,
                source,
            })?;
            let source = Source {
                filename: &filename,
                lineno: row.line,
            };
            transactions.push(assemble(record, &self.account, self.flag, source));
        }

        let last_date = transactions.iter().map(|t| t.date).max();
        let balance = match (self.dialect.balance(&statement)?, last_date) {
            (Some(amount), Some(date)) => Some(balance_directive(&self.account, date, amount)),
            _ => None,
        };

        tracing::info!(
            "Extracted {} transactions from {}",
            transactions.len(),
            path.display()
        );
        Ok(Extraction {
            transactions,
            balance,
        })
    }

    pub fn file_account(&self) -> &Account {
        &self.account
    }

    /// Date of the latest transaction in the file.
    pub fn file_date(&self, path: &Path) -> Result<Option<NaiveDate>, ImportError> {
        let extraction = self.extract(path)?;
        Ok(extraction.transactions.iter().map(|t| t.date).max())
    }

    pub fn file_name(&self, path: &Path) -> Option<String> {
        self.dialect.file_name(path)
    }
}
