pub mod config;
pub mod csv;
pub mod dialect;
pub mod importer;
pub mod pipeline;
pub mod processors;
pub mod rules;
pub mod tagger;
pub(crate) mod util;

pub use config::{ConfigError, HookConfig, HookKind, ImportConfig, ImporterConfig};
pub use crate::csv::{CsvError, CsvLayout, CsvRow, Encoding, Statement};
pub use dialect::{BankDialect, DialectKind, DialectOptions};
pub use importer::{Extraction, ImportError, Importer};
pub use pipeline::{Hook, Pipeline};
pub use processors::Builtin;
pub use rules::{Capture, Condition, Rule, RuleError, RuleSet};
pub use tagger::{AccountTagger, Augment, MetaTagger, RuleHook};
