use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use umsatz_core::{Account, Flag};

use crate::csv::Encoding;
use crate::dialect::{DialectKind, DialectOptions};
use crate::importer::Importer;
use crate::pipeline::{Hook, Pipeline};
use crate::processors::Builtin;
use crate::rules::{RuleError, RuleSet};
use crate::tagger::RuleHook;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Rules {path}: {source}")]
    Rules { path: PathBuf, source: RuleError },
}

/// Top-level importer configuration file.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ImportConfig {
    #[serde(default)]
    pub importers: Vec<ImporterConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ImporterConfig {
    pub dialect: DialectKind,
    pub iban: String,
    pub account: Account,
    #[serde(default = "ImporterConfig::default_currency")]
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<Encoding>,
    #[serde(default)]
    pub flag: Flag,
    #[serde(default = "ImporterConfig::default_builtins")]
    pub builtins: Vec<Builtin>,
    #[serde(default)]
    pub hooks: Vec<HookConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    Meta,
    Account,
}

/// A rule file evaluated by a meta or account tagger.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct HookConfig {
    pub kind: HookKind,
    /// Relative paths resolve against the configuration file's directory.
    pub rules: PathBuf,
}

impl ImportConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Build every importer. Rule files are loaded and validated here, so a
    /// broken rule set fails before any statement is read.
    pub fn build(&self, base_dir: &Path) -> Result<Vec<Importer>, ConfigError> {
        self.importers
            .iter()
            .map(|importer| importer.build(base_dir))
            .collect()
    }
}

impl ImporterConfig {
    fn default_currency() -> String {
        "EUR".to_string()
    }

    fn default_builtins() -> Vec<Builtin> {
        Builtin::ALL.to_vec()
    }

    pub fn build(&self, base_dir: &Path) -> Result<Importer, ConfigError> {
        let dialect = self.dialect.build(DialectOptions {
            currency: self.currency.clone(),
            date_format: self.date_format.clone(),
            encoding: self.encoding,
        });

        let mut pipeline = Pipeline::default();
        for builtin in &self.builtins {
            pipeline.push(Box::new(*builtin));
        }
        for hook in &self.hooks {
            pipeline.push(hook.build(base_dir)?);
        }
        tracing::debug!(
            "{} importer for {} with hooks: {}",
            dialect.name(),
            self.account,
            pipeline.names().collect::<Vec<_>>().join(", ")
        );

        Ok(Importer::new(dialect, self.iban.clone(), self.account.clone(), pipeline).with_flag(self.flag))
    }
}

impl HookConfig {
    pub fn build(&self, base_dir: &Path) -> Result<Box<dyn Hook>, ConfigError> {
        let path = base_dir.join(&self.rules);
        let wrap = |source| ConfigError::Rules {
            path: path.clone(),
            source,
        };
        let rules = Arc::new(RuleSet::from_path(&path).map_err(wrap)?);
        let hook: Box<dyn Hook> = match self.kind {
            HookKind::Account => Box::new(RuleHook::accounts(rules).map_err(wrap)?),
            HookKind::Meta => Box::new(RuleHook::meta(rules).map_err(wrap)?),
        };
        Ok(hook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
[[importers]]
dialect = "sparkasse_camt"
iban = "DE12 3456 7890 1234 5678 90"
account = "Assets:DE:Sparkasse:Giro"
flag = "!"
builtins = ["payee_iban", "amazon"]

[[importers.hooks]]
kind = "meta"
rules = "rules/meta.toml"

[[importers.hooks]]
kind = "account"
rules = "rules/accounts.toml"

[[importers]]
dialect = "dkb"
iban = "DE12120300000012345678"
account = "Assets:DE:DKB:Giro"
currency = "USD"
date_format = "%Y-%m-%d"
encoding = "utf-8"
"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn workspace() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let config = write(&dir, "umsatz.toml", CONFIG);
        write(
            &dir,
            "rules/meta.toml",
            r#"[category]
Rent = [{ payee_iban = "landlord_iban" }]
"#,
        );
        write(
            &dir,
            "rules/accounts.toml",
            r#""Expenses:Housing:Rent" = [{ payee_iban = "landlord_iban" }]"#,
        );
        (dir, config)
    }

    // ── parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn parses_full_config() {
        let (_dir, path) = workspace();
        let config = ImportConfig::from_path(&path).unwrap();
        assert_eq!(config.importers.len(), 2);

        let spk = &config.importers[0];
        assert_eq!(spk.dialect, DialectKind::SparkasseCamt);
        assert_eq!(spk.currency, "EUR");
        assert_eq!(spk.flag, Flag::NeedsReview);
        assert_eq!(spk.builtins, [Builtin::PayeeIban, Builtin::Amazon]);
        assert_eq!(spk.hooks.len(), 2);
        assert_eq!(spk.hooks[0].kind, HookKind::Meta);

        let dkb = &config.importers[1];
        assert_eq!(dkb.currency, "USD");
        assert_eq!(dkb.encoding, Some(Encoding::Utf8));
        assert_eq!(dkb.date_format.as_deref(), Some("%Y-%m-%d"));
        assert_eq!(dkb.flag, Flag::Confirmed);
        assert_eq!(dkb.builtins, Builtin::ALL);
        assert!(dkb.hooks.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let text = r#"
[[importers]]
dialect = "dkb"
iban = "DE12"
account = "Assets:DE:DKB:Giro"
colour = "blue"
"#;
        assert!(toml::from_str::<ImportConfig>(text).is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let base = "iban = \"DE12\"\naccount = \"Assets:DE:DKB:Giro\"\n";
        for bad in [
            format!("[[importers]]\ndialect = \"postbank\"\n{base}"),
            "[[importers]]\ndialect = \"dkb\"\niban = \"DE12\"\naccount = \"Giro\"\n".to_string(),
            format!("[[importers]]\ndialect = \"dkb\"\n{base}flag = \"?\"\n"),
            format!("[[importers]]\ndialect = \"dkb\"\n{base}builtins = [\"sparkasse\"]\n"),
            format!("[[importers]]\ndialect = \"dkb\"\n{base}encoding = \"utf-16\"\n"),
        ] {
            assert!(toml::from_str::<ImportConfig>(&bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn missing_config_is_io_error() {
        assert!(matches!(
            ImportConfig::from_path(Path::new("/nonexistent/umsatz.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    // ── building ──────────────────────────────────────────────────────────────

    #[test]
    fn builds_importers_with_pipeline() {
        let (dir, path) = workspace();
        let importers = ImportConfig::from_path(&path)
            .unwrap()
            .build(dir.path())
            .unwrap();
        assert_eq!(importers.len(), 2);

        let spk = &importers[0];
        assert_eq!(spk.name(), "sparkasse_camt");
        assert_eq!(spk.flag(), Flag::NeedsReview);
        assert_eq!(
            spk.pipeline().names().collect::<Vec<_>>(),
            ["payee_iban", "amazon", "meta", "accounts"]
        );

        let dkb = &importers[1];
        assert_eq!(dkb.name(), "dkb");
        assert_eq!(dkb.pipeline().len(), Builtin::ALL.len());
        assert_eq!(dkb.file_account().as_str(), "Assets:DE:DKB:Giro");
    }

    #[test]
    fn missing_rule_file_fails_build() {
        let (dir, path) = workspace();
        fs::remove_file(dir.path().join("rules/accounts.toml")).unwrap();
        let err = ImportConfig::from_path(&path)
            .unwrap()
            .build(dir.path())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ConfigError::Rules {
                source: RuleError::Io { .. },
                ..
            }
        ));
    }

    #[test]
    fn too_deep_meta_rules_fail_build() {
        let (dir, path) = workspace();
        write(&dir, "rules/meta.toml", r#""a:b:c" = [{ reference = "x" }]"#);
        let err = ImportConfig::from_path(&path)
            .unwrap()
            .build(dir.path())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ConfigError::Rules {
                source: RuleError::IdentifierDepth { .. },
                ..
            }
        ));
    }

    #[test]
    fn account_rules_must_name_accounts() {
        let (dir, path) = workspace();
        write(&dir, "rules/accounts.toml", r#"groceries = [{ payee_name = "edeka" }]"#);
        let err = ImportConfig::from_path(&path)
            .unwrap()
            .build(dir.path())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ConfigError::Rules {
                source: RuleError::InvalidAccount { .. },
                ..
            }
        ));
    }

    #[test]
    fn empty_config_has_no_importers() {
        let config: ImportConfig = toml::from_str("").unwrap();
        assert!(config.build(Path::new(".")).unwrap().is_empty());
    }
}
