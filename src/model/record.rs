use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Flattened, persisted representation of one pull request
///
/// Actor sets are ordered sets: they never hold duplicates and serialize in
/// sorted order, so two records built from the same data are byte-identical
/// regardless of the order the API returned entries in. Absent optional
/// fields serialize as explicit `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub pr_number: u64,
    pub title: Option<String>,
    pub state: Option<String>,
    pub created_at: String,
    pub closed_at: Option<String>,
    pub merged_at: Option<String>,
    pub author: Option<String>,
    pub merged_by: Option<String>,
    pub assignees: BTreeSet<String>,
    pub reviewers: BTreeSet<String>,
    pub commit_authors: BTreeSet<String>,
    pub comment_authors: BTreeSet<String>,
    pub review_comment_authors: BTreeSet<String>,
}
