use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::account::Account;
use super::money::Amount;
use super::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Flag {
    #[default]
    #[serde(rename = "*")]
    Confirmed,
    #[serde(rename = "!")]
    NeedsReview,
}

impl Flag {
    pub fn as_str(self) -> &'static str {
        match self {
            Flag::Confirmed => "*",
            Flag::NeedsReview => "!",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "*" => Ok(Flag::Confirmed),
            "!" => Ok(Flag::NeedsReview),
            other => Err(format!("Unknown flag: '{other}'")),
        }
    }
}

/// Provenance plus the key/value pairs collected during augmentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub filename: String,
    pub lineno: usize,
    pub entries: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub account: String,
    pub units: Option<Amount>,
    pub flag: Option<Flag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub flag: Flag,
    pub payee: Option<String>,
    pub narration: String,
    pub meta: Meta,
    pub postings: Vec<Posting>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub date: NaiveDate,
    pub account: Account,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    Transaction(Transaction),
    Balance(Balance),
}

/// Where a record came from in its input file.
#[derive(Debug, Clone, Copy)]
pub struct Source<'a> {
    pub filename: &'a str,
    pub lineno: usize,
}

/// Turn a fully augmented record into a transaction booked against `account`.
pub fn assemble(record: Record, account: &Account, flag: Flag, source: Source<'_>) -> Transaction {
    let units = Amount::new(record.amount(), record.currency());
    let mut postings = vec![Posting {
        account: account.to_string(),
        units: Some(units),
        flag: None,
    }];
    postings.extend(record.induced_postings.iter().map(|induced| Posting {
        account: induced.account.clone(),
        units: None,
        flag: Some(induced.flag),
    }));

    let payee = collapse_whitespace(&record.payee_name);

    Transaction {
        date: record.date(),
        flag,
        payee: (!payee.is_empty()).then_some(payee),
        narration: collapse_whitespace(&record.reference),
        meta: Meta {
            filename: source.filename.to_string(),
            lineno: source.lineno,
            entries: record.meta,
        },
        postings,
    }
}

/// Balance assertion for the day after `last_date`.
pub fn balance_directive(account: &Account, last_date: NaiveDate, amount: Amount) -> Balance {
    Balance {
        date: last_date
            .checked_add_days(Days::new(1))
            .unwrap_or(last_date),
        account: account.clone(),
        amount,
    }
}

/// Replace every run of whitespace with a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
