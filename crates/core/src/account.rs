use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    Assets,
    Liabilities,
    Equity,
    Income,
    Expenses,
}

impl AccountType {
    pub fn name(self) -> &'static str {
        match self {
            AccountType::Assets => "Assets",
            AccountType::Liabilities => "Liabilities",
            AccountType::Equity => "Equity",
            AccountType::Income => "Income",
            AccountType::Expenses => "Expenses",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AccountType {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Assets" => Ok(AccountType::Assets),
            "Liabilities" => Ok(AccountType::Liabilities),
            "Equity" => Ok(AccountType::Equity),
            "Income" => Ok(AccountType::Income),
            "Expenses" => Ok(AccountType::Expenses),
            other => Err(AccountError::UnknownRoot(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("Account name is empty")]
    Empty,
    #[error("Unknown account root '{0}'")]
    UnknownRoot(String),
    #[error("Invalid account component '{component}' in '{account}'")]
    InvalidComponent { account: String, component: String },
}

/// A colon-separated ledger account name such as `Assets:DE:Sparkasse:Giro`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Account(String);

impl Account {
    pub fn new(name: &str) -> Result<Self, AccountError> {
        let mut components = name.split(':');
        let root = components.next().filter(|c| !c.is_empty()).ok_or(AccountError::Empty)?;
        root.parse::<AccountType>()?;

        for component in components {
            let valid = component
                .chars()
                .next()
                .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
                && component
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
            if !valid {
                return Err(AccountError::InvalidComponent {
                    account: name.to_string(),
                    component: component.to_string(),
                });
            }
        }

        Ok(Account(name.to_string()))
    }

    pub fn account_type(&self) -> AccountType {
        // Validated in `new`.
        self.0
            .split(':')
            .next()
            .and_then(|root| root.parse().ok())
            .unwrap_or(AccountType::Assets)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Account {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Account::new(s)
    }
}

impl TryFrom<String> for Account {
    type Error = AccountError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Account::new(&s)
    }
}

impl From<Account> for String {
    fn from(account: Account) -> Self {
        account.0
    }
}
