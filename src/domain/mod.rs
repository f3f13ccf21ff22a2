pub mod entities;
pub mod ledger;
pub mod merge;
pub mod retry_policy;
pub mod value_objects;
