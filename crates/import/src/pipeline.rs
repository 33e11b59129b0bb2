use tracing::debug;
use umsatz_core::Record;

use crate::rules::RuleError;

/// One augmentation step. Receives the record by value and hands it back,
/// possibly with rewritten text fields, new meta entries or induced postings.
pub trait Hook: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, record: Record) -> Result<Record, RuleError>;
}

/// Hooks applied in order to every record of a file.
#[derive(Default)]
pub struct Pipeline {
    hooks: Vec<Box<dyn Hook>>,
}

impl Pipeline {
    pub fn new(hooks: Vec<Box<dyn Hook>>) -> Self {
        Self { hooks }
    }

    pub fn push(&mut self, hook: Box<dyn Hook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.iter().map(|h| h.name())
    }

    pub fn run(&self, record: Record) -> Result<Record, RuleError> {
        self.hooks.iter().try_fold(record, |record, hook| {
            debug!(hook = hook.name(), "applying hook");
            hook.apply(record)
        })
    }
}
