//! Projection of a pull request and its sub-resources into a flat record

use crate::model::{Actor, PullRequest, Record, SubResourceEntry, SubResourceSet};
use std::collections::BTreeSet;

/// Builds the persisted record for one pull request
///
/// Pure and total: lifecycle and identity fields are copied verbatim, nested
/// actors are flattened to their logins, and each sub-resource list becomes
/// the set of distinct logins found in it. Entries without an identifiable
/// actor are dropped.
pub fn extract_record(item: &PullRequest, subresources: &SubResourceSet) -> Record {
    Record {
        pr_number: item.number,
        title: item.title.clone(),
        state: item.state.clone(),
        created_at: item.created_at.clone(),
        closed_at: item.closed_at.clone(),
        merged_at: item.merged_at.clone(),
        author: login_of(item.user.as_ref()),
        merged_by: login_of(item.merged_by.as_ref()),
        assignees: actor_logins(item.assignees.as_deref().unwrap_or_default()),
        reviewers: actor_logins(item.requested_reviewers.as_deref().unwrap_or_default()),
        commit_authors: entry_logins(&subresources.commits),
        comment_authors: entry_logins(&subresources.comments),
        review_comment_authors: entry_logins(&subresources.review_comments),
    }
}

fn login_of(actor: Option<&Actor>) -> Option<String> {
    actor
        .and_then(|a| a.login.as_deref())
        .filter(|login| !login.is_empty())
        .map(str::to_string)
}

fn actor_logins(actors: &[Actor]) -> BTreeSet<String> {
    actors.iter().filter_map(|a| login_of(Some(a))).collect()
}

fn entry_logins(entries: &[SubResourceEntry]) -> BTreeSet<String> {
    entries
        .iter()
        .filter_map(SubResourceEntry::actor_login)
        .map(str::to_string)
        .collect()
}
