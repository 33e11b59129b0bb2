use std::fmt;
use std::io::{self, Write};

use crate::ledger::{Balance, Directive, Posting, Transaction};

/// Write `directives` as Beancount text, one blank line between entries.
pub fn render<W: Write>(w: &mut W, directives: &[Directive]) -> io::Result<()> {
    for directive in directives {
        writeln!(w, "{directive}")?;
    }
    Ok(())
}

struct Quoted<'a>(&'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        for c in self.0.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                c => write!(f, "{c}")?,
            }
        }
        f.write_str("\"")
    }
}

impl fmt::Display for Posting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("  ")?;
        if let Some(flag) = self.flag {
            write!(f, "{flag} ")?;
        }
        f.write_str(&self.account)?;
        if let Some(units) = &self.units {
            write!(f, "  {units}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.flag)?;
        if let Some(payee) = &self.payee {
            write!(f, " {}", Quoted(payee))?;
        }
        writeln!(f, " {}", Quoted(&self.narration))?;
        writeln!(f, "  filename: {}", Quoted(&self.meta.filename))?;
        writeln!(f, "  lineno: {}", self.meta.lineno)?;
        for (key, value) in &self.meta.entries {
            writeln!(f, "  {key}: {}", Quoted(value))?;
        }
        for posting in &self.postings {
            writeln!(f, "{posting}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} balance {}  {}", self.date, self.account, self.amount)
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Transaction(tx) => tx.fmt(f),
            Directive::Balance(balance) => balance.fmt(f),
        }
    }
}
