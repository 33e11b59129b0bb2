use std::sync::Arc;
use tracing::trace;
use umsatz_core::{Account, Flag, Record, RecordField};

use crate::pipeline::Hook;
use crate::rules::{depth, Capture, Rule, RuleError, RuleSet};

/// Capture group whose values become the meta value of a one-level identifier.
pub const META_GROUP: &str = "meta";

/// What a rule hook does with a record once one of an identifier's rules matched.
pub trait Augment: Send + Sync {
    fn name(&self) -> &'static str;

    fn augment(
        &self,
        identifier: &str,
        rule: &Rule,
        captures: Vec<Capture>,
        record: &mut Record,
    ) -> Result<(), RuleError>;
}

/// Evaluates a [`RuleSet`] against every record.
///
/// Identifiers are visited in rule-set order against the running record, so a
/// field rewritten for one identifier is what the next one sees. Within one
/// identifier only the first matching rule is applied.
pub struct RuleHook<A> {
    rules: Arc<RuleSet>,
    augment: A,
}

impl RuleHook<AccountTagger> {
    pub fn accounts(rules: Arc<RuleSet>) -> Result<Self, RuleError> {
        for identifier in rules.identifiers() {
            Account::new(identifier).map_err(|source| RuleError::InvalidAccount {
                identifier: identifier.to_string(),
                source,
            })?;
        }
        Ok(Self {
            rules,
            augment: AccountTagger,
        })
    }
}

impl RuleHook<MetaTagger> {
    pub fn meta(rules: Arc<RuleSet>) -> Result<Self, RuleError> {
        for identifier in rules.identifiers() {
            let depth = depth(identifier);
            if depth > 2 {
                return Err(RuleError::IdentifierDepth {
                    identifier: identifier.to_string(),
                    depth,
                });
            }
        }
        Ok(Self {
            rules,
            augment: MetaTagger,
        })
    }
}

impl<A: Augment> Hook for RuleHook<A> {
    fn name(&self) -> &str {
        self.augment.name()
    }

    fn apply(&self, mut record: Record) -> Result<Record, RuleError> {
        for (identifier, rules) in self.rules.iter() {
            let matched = rules
                .iter()
                .find_map(|rule| rule.captures(&record).map(|captures| (rule, captures)));
            if let Some((rule, captures)) = matched {
                trace!(tagger = self.augment.name(), identifier, "rule matched");
                self.augment.augment(identifier, rule, captures, &mut record)?;
            }
        }
        Ok(record)
    }
}

// ── Account tagger ───────────────────────────────────────────────────────────

/// Books a flagged counter posting on the identifier's account.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountTagger;

impl Augment for AccountTagger {
    fn name(&self) -> &'static str {
        "accounts"
    }

    fn augment(
        &self,
        identifier: &str,
        _rule: &Rule,
        _captures: Vec<Capture>,
        record: &mut Record,
    ) -> Result<(), RuleError> {
        record.induce(Flag::NeedsReview, identifier);
        Ok(())
    }
}

// ── Meta tagger ──────────────────────────────────────────────────────────────

/// Derives meta entries from identifiers and writes named captures back to
/// the record fields of the same name.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaTagger;

impl Augment for MetaTagger {
    fn name(&self) -> &'static str {
        "meta"
    }

    fn augment(
        &self,
        identifier: &str,
        rule: &Rule,
        captures: Vec<Capture>,
        record: &mut Record,
    ) -> Result<(), RuleError> {
        for group in rule.group_names().filter(|g| *g != META_GROUP) {
            writable_field(identifier, group)?;
        }

        let mut meta_values = Vec::new();
        let mut overwrites: Vec<(RecordField, Vec<String>)> = Vec::new();
        for capture in captures {
            if capture.name == META_GROUP {
                meta_values.push(capture.value);
                continue;
            }
            let field = writable_field(identifier, &capture.name)?;
            let value = capture.value.trim().to_string();
            match overwrites.iter_mut().find(|(f, _)| *f == field) {
                Some((_, values)) => values.push(value),
                None => overwrites.push((field, vec![value])),
            }
        }
        for (field, values) in overwrites {
            record.set(field, values.join(" "))?;
        }

        match identifier.split_once(':') {
            Some((key, value)) if !key.is_empty() => record.insert_meta(key, value),
            Some(_) => {}
            None if !identifier.is_empty() && !meta_values.is_empty() => {
                record.insert_meta(identifier, meta_values.join(" ").to_uppercase())
            }
            None => {}
        }
        Ok(())
    }
}

fn writable_field(identifier: &str, group: &str) -> Result<RecordField, RuleError> {
    let field = group
        .parse::<RecordField>()
        .map_err(|_| RuleError::UnknownCaptureGroup {
            identifier: identifier.to_string(),
            group: group.to_string(),
        })?;
    if !field.is_writable() {
        return Err(RuleError::ReadOnlyCapture {
            identifier: identifier.to_string(),
            field,
        });
    }
    Ok(field)
}
