//! Data model for the pull-request crawl
//!
//! - `Collection`: the repository being crawled, also used to namespace on-disk state
//! - `PullRequest`, `SubResourceSet`: raw API shapes, parsed leniently
//! - `Record`: the flattened unit written to the record log

mod collection;
mod pull_request;
mod record;

pub use collection::Collection;
pub use pull_request::{Actor, PullRequest, SubResourceEntry, SubResourceKind, SubResourceSet};
pub use record::Record;
