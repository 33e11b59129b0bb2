use std::ops::Range;

use umsatz_core::collapse_whitespace;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static ::regex::Regex {
            static R: ::std::sync::OnceLock<::regex::Regex> = ::std::sync::OnceLock::new();
            R.get_or_init(|| ::regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}

pub(crate) use re;

// ── Text helpers ─────────────────────────────────────────────────────────────

/// IBAN without grouping spaces, upper-cased.
pub fn normalize_iban(iban: &str) -> String {
    iban.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// `text` with `span` cut out and the remainder's whitespace collapsed.
pub fn cut(text: &str, span: Range<usize>) -> String {
    let mut rest = String::with_capacity(text.len());
    rest.push_str(&text[..span.start]);
    rest.push(' ');
    rest.push_str(&text[span.end..]);
    collapse_whitespace(&rest)
}
