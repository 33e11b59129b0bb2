pub mod account;
pub mod ledger;
pub mod money;
pub mod record;
pub mod render;

pub use account::{Account, AccountError, AccountType};
pub use ledger::{
    assemble, balance_directive, collapse_whitespace, Balance, Directive, Flag, Meta, Posting,
    Source, Transaction,
};
pub use money::Amount;
pub use record::{InducedPosting, Record, RecordError, RecordField};
pub use render::render;
