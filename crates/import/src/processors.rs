use serde::{Deserialize, Serialize};
use std::fmt;
use umsatz_core::Record;

use crate::pipeline::Hook;
use crate::rules::RuleError;
use crate::util::{cut, re};

// ── Compiled regex cache ─────────────────────────────────────────────────────

re!(re_amazon_payee, r"(?i)amazon|audible");
re!(re_amazon_reference,
    r"^(?P<order>[A-Z0-9]{3}-\d{7}-\d{7}) (?P<product>.+?) ?(?P<code>[A-Za-z0-9]{16})\s*$");

re!(re_paypal_payee, r"(?i)paypal");
re!(re_paypal_reference,
    r"^(?:PP\.\d+\.PP)?\s*\.\s*(?P<payee>.*?)\s*,\s*Ihr Einkauf bei\s*(?:,\s*)?(?P<rest>.*?)\s*$");

re!(re_card_timestamp, r"^(?P<ts>\d{4}-\d{2}-\d{2}T\d{2}:\d{2})\s+Debitk");
re!(re_sumup_payee, r"(?i)^SumUp\s*\.\s*(?P<merchant>.+?)//");

re!(re_db_payee, r"(?i)^DB Vertrieb GmbH");
re!(re_db_ticket, r"Fahrschein\s+(?P<ticket>[A-Z0-9]+)");

re!(re_telefonica_payee, r"(?i)^Telefonica Germany");
re!(re_telefonica_reference,
    r"Kd-Nr\.:\s*\d+,\s*Rg-Nr\.:\s*(?P<invoice>[\d/]+),\s*Ihre\s+(?P<rest>.*?)\s*$");

re!(re_tele_columbus_payee, r"(?i)^(?P<name>Tele Columbus .*?\bKG)\b");
re!(re_tele_columbus_reference,
    r"(?i)^KD-NR\s*\.\s*\d+,\s*RG-NR\s*\.\s*(?P<invoice>\d+),\s*Faelligkeit[^,]*,\s*Mandats-ID[^,]*,\s*Glaeubiger-ID\s*\S+\s*$");

const TELEFONICA: &str = "Telefonica Germany GmbH + Co. OHG";
const DEUTSCHE_BAHN: &str = "DB Vertrieb GmbH";

// ── Built-in processors ──────────────────────────────────────────────────────

/// Fixed-logic processors selectable by name in the importer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Builtin {
    PayeeIban,
    PayeeBic,
    PostingType,
    Amazon,
    Paypal,
    DebitCard,
    CashWithdrawal,
    DeutscheBahn,
    Telefonica,
    TeleColumbus,
}

impl Builtin {
    /// Canonical order, used when a configuration does not pick its own.
    pub const ALL: [Builtin; 10] = [
        Builtin::PayeeIban,
        Builtin::PayeeBic,
        Builtin::PostingType,
        Builtin::Amazon,
        Builtin::Paypal,
        Builtin::DebitCard,
        Builtin::CashWithdrawal,
        Builtin::DeutscheBahn,
        Builtin::Telefonica,
        Builtin::TeleColumbus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Builtin::PayeeIban => "payee_iban",
            Builtin::PayeeBic => "payee_bic",
            Builtin::PostingType => "posting_type",
            Builtin::Amazon => "amazon",
            Builtin::Paypal => "paypal",
            Builtin::DebitCard => "debit_card",
            Builtin::CashWithdrawal => "cash_withdrawal",
            Builtin::DeutscheBahn => "deutsche_bahn",
            Builtin::Telefonica => "telefonica",
            Builtin::TeleColumbus => "tele_columbus",
        }
    }

    pub fn process(self, record: &mut Record) {
        match self {
            Builtin::PayeeIban => payee_iban(record),
            Builtin::PayeeBic => payee_bic(record),
            Builtin::PostingType => posting_type(record),
            Builtin::Amazon => amazon(record),
            Builtin::Paypal => paypal(record),
            Builtin::DebitCard => debit_card(record),
            Builtin::CashWithdrawal => cash_withdrawal(record),
            Builtin::DeutscheBahn => deutsche_bahn(record),
            Builtin::Telefonica => telefonica(record),
            Builtin::TeleColumbus => tele_columbus(record),
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Hook for Builtin {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn apply(&self, mut record: Record) -> Result<Record, RuleError> {
        self.process(&mut record);
        Ok(record)
    }
}

pub fn payee_iban(record: &mut Record) {
    if !record.payee_iban.is_empty() {
        record.insert_meta("payee_iban", record.payee_iban.clone());
    }
}

pub fn payee_bic(record: &mut Record) {
    if !record.payee_bic.is_empty() {
        record.insert_meta("payee_bic", record.payee_bic.clone());
    }
}

pub fn posting_type(record: &mut Record) {
    if !record.posting_type.is_empty() {
        record.insert_meta("posting_type", record.posting_type.clone());
    }
}

/// Amazon and Audible direct debits: `<order id> <product> <16 character code>`.
pub fn amazon(record: &mut Record) {
    if !re_amazon_payee().is_match(&record.payee_name) {
        return;
    }
    let Some(caps) = re_amazon_reference().captures(&record.reference) else {
        return;
    };
    let order = caps["order"].to_string();
    let product = caps["product"].trim().to_string();

    record.insert_meta("order_number", order);
    if product.contains("AMZN Mktp") {
        record.insert_meta("amazon_platform", "marketplace");
    } else if product.contains("AMZNPrime") {
        record.insert_meta("amazon_platform", "prime");
    }
    record.payee_name = product;
    record.reference.clear();
}

/// PayPal debits name the actual merchant inside the reference.
pub fn paypal(record: &mut Record) {
    if !re_paypal_payee().is_match(&record.payee_name) {
        return;
    }
    let Some(caps) = re_paypal_reference().captures(&record.reference) else {
        return;
    };
    let merchant = caps["payee"].to_string();
    let rest = caps["rest"].to_string();

    record.insert_meta("via", "paypal");
    if merchant == rest {
        record.reference.clear();
    } else if !rest.is_empty() {
        record.reference = rest;
    }
    if !merchant.is_empty() {
        record.payee_name = merchant;
    }
}

pub fn debit_card(record: &mut Record) {
    if record.posting_type != "KARTENZAHLUNG" {
        return;
    }
    let Some(caps) = re_card_timestamp().captures(&record.reference) else {
        return;
    };
    let timestamp = caps["ts"].to_string();

    record.insert_meta("payment_date", timestamp);
    if let Some(caps) = re_sumup_payee().captures(&record.payee_name) {
        let merchant = caps["merchant"].trim().to_string();
        record.insert_meta("via", "sumup");
        record.payee_name = merchant;
    }
    record.reference.clear();
}

pub fn cash_withdrawal(record: &mut Record) {
    if record.posting_type != "BARGELDAUSZAHLUNG" {
        return;
    }
    let Some(caps) = re_card_timestamp().captures(&record.reference) else {
        return;
    };
    let timestamp = caps["ts"].to_string();

    record.insert_meta("withdrawal_date", timestamp);
    record.reference.clear();
}

pub fn deutsche_bahn(record: &mut Record) {
    if !re_db_payee().is_match(&record.payee_name) {
        return;
    }
    let Some(caps) = re_db_ticket().captures(&record.reference) else {
        return;
    };
    let ticket = caps["ticket"].to_string();
    let rest = caps.get(0).map(|m| cut(&record.reference, m.range()));

    record.payee_name = DEUTSCHE_BAHN.to_string();
    record.insert_meta("ticket_number", ticket);
    record.reference = rest.unwrap_or_default();
}

pub fn telefonica(record: &mut Record) {
    if !re_telefonica_payee().is_match(&record.payee_name) {
        return;
    }
    let Some(caps) = re_telefonica_reference().captures(&record.reference) else {
        return;
    };
    let invoice = caps["invoice"].to_string();
    let rest = caps["rest"].to_string();

    record.payee_name = TELEFONICA.to_string();
    record.insert_meta("invoice_number", invoice);
    record.reference = rest;
}

pub fn tele_columbus(record: &mut Record) {
    let Some(payee) = re_tele_columbus_payee().captures(&record.payee_name) else {
        return;
    };
    let Some(caps) = re_tele_columbus_reference().captures(&record.reference) else {
        return;
    };
    let name = payee["name"].to_string();
    let invoice = caps["invoice"].to_string();

    record.payee_name = name;
    record.insert_meta("invoice_number", invoice);
    record.reference.clear();
}
