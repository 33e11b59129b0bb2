use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::ledger::Flag;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("Unknown record field: '{0}'")]
    UnknownField(String),
    #[error("Record field '{0}' is read-only")]
    ReadOnlyField(RecordField),
}

/// The string fields of a [`Record`] that can be addressed by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    OwnerIban,
    PostingType,
    Reference,
    PayeeName,
    PayeeIban,
    PayeeBic,
    Currency,
}

impl RecordField {
    pub const ALL: [RecordField; 7] = [
        RecordField::OwnerIban,
        RecordField::PostingType,
        RecordField::Reference,
        RecordField::PayeeName,
        RecordField::PayeeIban,
        RecordField::PayeeBic,
        RecordField::Currency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordField::OwnerIban => "owner_iban",
            RecordField::PostingType => "posting_type",
            RecordField::Reference => "reference",
            RecordField::PayeeName => "payee_name",
            RecordField::PayeeIban => "payee_iban",
            RecordField::PayeeBic => "payee_bic",
            RecordField::Currency => "currency",
        }
    }

    /// Owner IBAN and currency are fixed once the dialect adapter built the record.
    pub fn is_writable(self) -> bool {
        !matches!(self, RecordField::OwnerIban | RecordField::Currency)
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordField {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| RecordError::UnknownField(s.to_string()))
    }
}

/// A zero-amount posting requested by the augmentation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InducedPosting {
    pub flag: Flag,
    pub account: String,
}

/// One imported bank transaction while it travels through the hook pipeline.
///
/// Date, amount, currency and owner IBAN are fixed at construction; the text
/// fields stay public so processors can rewrite them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    owner_iban: String,
    date: NaiveDate,
    amount: Decimal,
    currency: String,
    pub posting_type: String,
    pub reference: String,
    pub payee_name: String,
    pub payee_iban: String,
    pub payee_bic: String,
    pub meta: BTreeMap<String, String>,
    pub induced_postings: Vec<InducedPosting>,
}

impl Record {
    pub fn new(
        owner_iban: impl Into<String>,
        date: NaiveDate,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Record {
            owner_iban: owner_iban.into(),
            date,
            amount,
            currency: currency.into(),
            posting_type: String::new(),
            reference: String::new(),
            payee_name: String::new(),
            payee_iban: String::new(),
            payee_bic: String::new(),
            meta: BTreeMap::new(),
            induced_postings: Vec::new(),
        }
    }

    pub fn owner_iban(&self) -> &str {
        &self.owner_iban
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn get(&self, field: RecordField) -> &str {
        match field {
            RecordField::OwnerIban => &self.owner_iban,
            RecordField::PostingType => &self.posting_type,
            RecordField::Reference => &self.reference,
            RecordField::PayeeName => &self.payee_name,
            RecordField::PayeeIban => &self.payee_iban,
            RecordField::PayeeBic => &self.payee_bic,
            RecordField::Currency => &self.currency,
        }
    }

    pub fn set(&mut self, field: RecordField, value: impl Into<String>) -> Result<(), RecordError> {
        let slot = match field {
            RecordField::PostingType => &mut self.posting_type,
            RecordField::Reference => &mut self.reference,
            RecordField::PayeeName => &mut self.payee_name,
            RecordField::PayeeIban => &mut self.payee_iban,
            RecordField::PayeeBic => &mut self.payee_bic,
            RecordField::OwnerIban | RecordField::Currency => {
                return Err(RecordError::ReadOnlyField(field))
            }
        };
        *slot = value.into();
        Ok(())
    }

    pub fn insert_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.insert(key.into(), value.into());
    }

    pub fn induce(&mut self, flag: Flag, account: impl Into<String>) {
        self.induced_postings.push(InducedPosting {
            flag,
            account: account.into(),
        });
    }
}
