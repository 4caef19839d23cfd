//! Raw pull-request and sub-resource shapes as returned by the API
//!
//! Only the fields the crawl needs are modelled. Everything optional on the
//! wire is optional here, so an entry with odd or missing data still parses
//! and the extractor decides what to drop.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// An API identity attached to a pull request or sub-resource entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Actor {
    #[serde(default)]
    pub login: Option<String>,
}

/// One entry of the paginated pull-request listing
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    pub created_at: String,

    #[serde(default)]
    pub closed_at: Option<String>,

    #[serde(default)]
    pub merged_at: Option<String>,

    /// Author of the pull request
    #[serde(default)]
    pub user: Option<Actor>,

    #[serde(default)]
    pub merged_by: Option<Actor>,

    #[serde(default)]
    pub assignees: Option<Vec<Actor>>,

    #[serde(default)]
    pub requested_reviewers: Option<Vec<Actor>>,

    pub commits_url: String,
    pub comments_url: String,
    pub review_comments_url: String,
}

impl PullRequest {
    /// Parses `created_at` as an RFC 3339 timestamp
    ///
    /// Returns `None` when the timestamp is unparsable; such items are
    /// treated as malformed by the page fetcher.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Returns the URL of the given sub-resource list
    pub fn sub_resource_url(&self, kind: SubResourceKind) -> &str {
        match kind {
            SubResourceKind::Commits => &self.commits_url,
            SubResourceKind::Comments => &self.comments_url,
            SubResourceKind::ReviewComments => &self.review_comments_url,
        }
    }
}

/// The three per-item lists fetched for every retained pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubResourceKind {
    Commits,
    Comments,
    ReviewComments,
}

impl SubResourceKind {
    pub const ALL: [SubResourceKind; 3] = [Self::Commits, Self::Comments, Self::ReviewComments];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Commits => "commits",
            Self::Comments => "comments",
            Self::ReviewComments => "review comments",
        }
    }
}

/// One entry of a sub-resource list
///
/// Comments carry their actor in `user`; commits carry the linked account in
/// `author` (which is `null` when the commit email maps to no account).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubResourceEntry {
    #[serde(default)]
    pub user: Option<Actor>,

    #[serde(default)]
    pub author: Option<Actor>,
}

impl SubResourceEntry {
    /// Login of the entry's actor, preferring `user` over `author`
    pub fn actor_login(&self) -> Option<&str> {
        [&self.user, &self.author]
            .into_iter()
            .flatten()
            .find_map(|actor| actor.login.as_deref())
            .filter(|login| !login.is_empty())
    }
}

/// Sub-resource lists for one pull request
#[derive(Debug, Clone, Default)]
pub struct SubResourceSet {
    pub commits: Vec<SubResourceEntry>,
    pub comments: Vec<SubResourceEntry>,
    pub review_comments: Vec<SubResourceEntry>,
}

impl SubResourceSet {
    pub fn set(&mut self, kind: SubResourceKind, entries: Vec<SubResourceEntry>) {
        match kind {
            SubResourceKind::Commits => self.commits = entries,
            SubResourceKind::Comments => self.comments = entries,
            SubResourceKind::ReviewComments => self.review_comments = entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pr_json() -> serde_json::Value {
        json!({
            "number": 42,
            "title": "Fix flaky test",
            "state": "closed",
            "created_at": "2019-03-04T05:06:07Z",
            "closed_at": "2019-03-05T00:00:00Z",
            "merged_at": null,
            "user": {"login": "alice"},
            "merged_by": null,
            "assignees": [{"login": "bob"}],
            "requested_reviewers": [],
            "commits_url": "https://api.example.com/pulls/42/commits",
            "comments_url": "https://api.example.com/issues/42/comments",
            "review_comments_url": "https://api.example.com/pulls/42/comments"
        })
    }

    #[test]
    fn test_parse_pull_request() {
        let pr: PullRequest = serde_json::from_value(pr_json()).unwrap();
        assert_eq!(pr.number, 42);
        assert_eq!(pr.user.unwrap().login.as_deref(), Some("alice"));
        assert!(pr.merged_by.is_none());
        assert!(pr.merged_at.is_none());
    }

    #[test]
    fn test_created_timestamp() {
        let mut pr: PullRequest = serde_json::from_value(pr_json()).unwrap();
        let created = pr.created().unwrap();
        assert_eq!(created.to_rfc3339(), "2019-03-04T05:06:07+00:00");

        pr.created_at = "last tuesday".to_string();
        assert!(pr.created().is_none());
    }

    #[test]
    fn test_missing_required_field_fails() {
        let mut value = pr_json();
        value.as_object_mut().unwrap().remove("created_at");
        assert!(serde_json::from_value::<PullRequest>(value).is_err());
    }

    #[test]
    fn test_null_lists_are_accepted() {
        let mut value = pr_json();
        value["assignees"] = serde_json::Value::Null;
        let pr: PullRequest = serde_json::from_value(value).unwrap();
        assert!(pr.assignees.is_none());
    }

    #[test]
    fn test_entry_actor_login() {
        let comment: SubResourceEntry =
            serde_json::from_value(json!({"user": {"login": "carol"}})).unwrap();
        assert_eq!(comment.actor_login(), Some("carol"));

        let commit: SubResourceEntry =
            serde_json::from_value(json!({"author": {"login": "dave"}, "commit": {}})).unwrap();
        assert_eq!(commit.actor_login(), Some("dave"));

        let orphan: SubResourceEntry =
            serde_json::from_value(json!({"author": null, "sha": "abc"})).unwrap();
        assert_eq!(orphan.actor_login(), None);
    }
}
