//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the pull-request API and run
//! whole collections through the coordinator against a temporary data dir.

use pr_crawler::config::{Config, Credentials};
use pr_crawler::crawler::{
    ApiClient, CollectionOutcome, Coordinator, PageFetcher, RetryPolicy,
};
use pr_crawler::model::{Collection, Record};
use pr_crawler::output::{csv_export_path, export_records_to_csv};
use pr_crawler::storage::{CheckpointStore, FileCheckpointStore};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LIST_PATH: &str = "/repos/octo/widgets/pulls";

fn collection() -> Collection {
    Collection::parse("octo/widgets").unwrap()
}

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, data_dir: &Path) -> Config {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.crawler.start_date = "2018-01-01".to_string();
    config.crawler.end_date = "2023-12-31".to_string();
    config.crawler.max_retries = 1;
    config.crawler.backoff_seconds = 1;
    config.crawler.rate_limit_floor_seconds = 0;
    config.crawler.item_delay_ms = 0;
    config.crawler.max_concurrent_items = 2;
    config.output.data_dir = data_dir.display().to_string();
    config.collections = vec![collection()];
    config
}

/// Coordinator with millisecond backoff and no rate-limit floor
fn fast_coordinator(server: &MockServer, data_dir: &Path) -> Coordinator<FileCheckpointStore> {
    let config = create_test_config(&server.uri(), data_dir);
    let client = ApiClient::new(&config.api, &Credentials::new("test-token"))
        .unwrap()
        .with_rate_limit_floor(Duration::ZERO);
    let fetcher = PageFetcher::new(client, &config.crawler)
        .unwrap()
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(10)));

    Coordinator::with_fetcher(fetcher, FileCheckpointStore::new(data_dir))
}

fn pull_request(server: &MockServer, number: u64, created_at: &str) -> Value {
    let base = format!("{}{}/{}", server.uri(), LIST_PATH, number);
    json!({
        "number": number,
        "title": format!("PR {}", number),
        "state": "open",
        "created_at": created_at,
        "closed_at": null,
        "merged_at": null,
        "user": {"login": "author"},
        "merged_by": null,
        "assignees": [{"login": "assignee"}],
        "requested_reviewers": [],
        "commits_url": format!("{}/commits", base),
        "comments_url": format!("{}/comments", base),
        "review_comments_url": format!("{}/review_comments", base)
    })
}

async fn mount_list_page(server: &MockServer, page: u32, body: Value) {
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_sub_resources(server: &MockServer, number: u64) {
    let base = format!("{}/{}", LIST_PATH, number);

    Mock::given(method("GET"))
        .and(path(format!("{}/commits", base)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"author": {"login": "alice"}},
            {"author": {"login": "alice"}},
            {"author": null, "commit": {"author": {"name": "unlinked"}}}
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/comments", base)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"user": {"login": "bob"}},
            {"user": {"login": "carol"}}
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{}/review_comments", base)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

fn read_records(data_dir: &Path) -> Vec<Record> {
    let store = FileCheckpointStore::new(data_dir);
    fs::read_to_string(store.record_log_path(&collection()))
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn last_completed_page(data_dir: &Path) -> Option<u32> {
    FileCheckpointStore::new(data_dir)
        .checkpoint_state(&collection())
        .unwrap()
        .map(|state| state.last_completed_page)
}

#[tokio::test]
async fn test_window_filter_and_termination() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("page", "1"))
        .and(query_param("state", "all"))
        .and(query_param("per_page", "100"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            pull_request(&server, 1, "2020-06-01T12:00:00Z"),
            pull_request(&server, 2, "2017-12-31T23:59:59Z")
        ])))
        .expect(1)
        .mount(&server)
        .await;
    mount_list_page(&server, 2, json!([])).await;
    mount_sub_resources(&server, 1).await;

    // the out-of-window item never has its sub-resources fetched
    Mock::given(method("GET"))
        .and(path(format!("{}/2/commits", LIST_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), dir.path());
    let store = FileCheckpointStore::new(dir.path());
    let mut coordinator =
        Coordinator::new(&config, &Credentials::new("test-token"), store).unwrap();

    let summaries = coordinator.run(&config.collections).await;
    assert_eq!(summaries.len(), 1);

    let summary = &summaries[0];
    assert_eq!(summary.outcome, CollectionOutcome::Completed);
    assert_eq!(summary.records_written, 1);
    assert_eq!(summary.items_out_of_window, 1);
    assert!(summary.skipped_pages.is_empty());

    let records = read_records(dir.path());
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.pr_number, 1);
    assert_eq!(record.author.as_deref(), Some("author"));
    assert_eq!(record.commit_authors.iter().collect::<Vec<_>>(), vec!["alice"]);
    assert_eq!(
        record.comment_authors.iter().collect::<Vec<_>>(),
        vec!["bob", "carol"]
    );
    assert!(record.review_comment_authors.is_empty());

    assert_eq!(last_completed_page(dir.path()), Some(2));
    assert!(coordinator
        .store()
        .skipped_pages(&collection())
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_resume_starts_after_checkpoint() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    {
        let mut store = FileCheckpointStore::new(dir.path());
        store.advance(&collection(), 1).unwrap();
    }

    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    mount_list_page(
        &server,
        2,
        json!([pull_request(&server, 3, "2021-01-01T00:00:00Z")]),
    )
    .await;
    mount_list_page(&server, 3, json!([])).await;
    mount_sub_resources(&server, 3).await;

    let mut coordinator = fast_coordinator(&server, dir.path());
    let summaries = coordinator.run(&[collection()]).await;

    assert_eq!(summaries[0].start_page, 2);
    assert_eq!(summaries[0].records_written, 1);
    assert_eq!(last_completed_page(dir.path()), Some(3));
}

#[tokio::test]
async fn test_rerun_of_finished_crawl_keeps_checkpoint() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_list_page(
        &server,
        1,
        json!([pull_request(&server, 5, "2022-05-05T00:00:00Z")]),
    )
    .await;
    mount_list_page(&server, 2, json!([])).await;
    mount_list_page(&server, 3, json!([])).await;
    mount_sub_resources(&server, 5).await;

    let mut coordinator = fast_coordinator(&server, dir.path());
    let first = coordinator.run(&[collection()]).await;
    assert_eq!(first[0].outcome, CollectionOutcome::Completed);
    assert_eq!(last_completed_page(dir.path()), Some(2));

    for _ in 0..2 {
        let mut coordinator = fast_coordinator(&server, dir.path());
        let again = coordinator.run(&[collection()]).await;
        assert_eq!(again[0].outcome, CollectionOutcome::Completed);
        assert_eq!(again[0].start_page, 3);
        assert_eq!(again[0].records_written, 0);
        assert_eq!(last_completed_page(dir.path()), Some(2));
    }
    assert_eq!(read_records(dir.path()).len(), 1);
}

#[tokio::test]
async fn test_interrupted_page_is_not_duplicated() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // first run: page 1 fully processed, stopped by the page limit
    mount_list_page(
        &server,
        1,
        json!([
            pull_request(&server, 10, "2020-01-01T00:00:00Z"),
            pull_request(&server, 11, "2020-01-02T00:00:00Z")
        ]),
    )
    .await;
    mount_list_page(&server, 2, json!([])).await;
    mount_sub_resources(&server, 10).await;
    mount_sub_resources(&server, 11).await;

    let mut first = fast_coordinator(&server, dir.path()).with_max_pages(Some(1));
    let summaries = first.run(&[collection()]).await;
    assert_eq!(summaries[0].outcome, CollectionOutcome::PageLimit);
    assert_eq!(last_completed_page(dir.path()), Some(1));

    // simulate a crash between append and advance on page 1
    {
        let mut store = FileCheckpointStore::new(dir.path());
        store.advance(&collection(), 0).unwrap();
    }

    let mut second = fast_coordinator(&server, dir.path());
    let summaries = second.run(&[collection()]).await;

    assert_eq!(summaries[0].outcome, CollectionOutcome::Completed);
    assert_eq!(summaries[0].records_written, 0);
    assert_eq!(summaries[0].duplicates_skipped, 2);

    let numbers: Vec<u64> = read_records(dir.path()).iter().map(|r| r.pr_number).collect();
    assert_eq!(numbers, vec![10, 11]);
    assert_eq!(last_completed_page(dir.path()), Some(2));
}

#[tokio::test]
async fn test_server_errors_skip_page_after_retries() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;
    mount_list_page(
        &server,
        2,
        json!([pull_request(&server, 20, "2022-02-02T00:00:00Z")]),
    )
    .await;
    mount_list_page(&server, 3, json!([])).await;
    mount_sub_resources(&server, 20).await;

    let mut coordinator = fast_coordinator(&server, dir.path());
    let summaries = coordinator.run(&[collection()]).await;

    let summary = &summaries[0];
    assert_eq!(summary.outcome, CollectionOutcome::Completed);
    assert_eq!(summary.skipped_pages, vec![1]);
    assert_eq!(summary.records_written, 1);
    assert_eq!(
        coordinator.store().skipped_pages(&collection()).unwrap(),
        vec![1]
    );
    assert_eq!(last_completed_page(dir.path()), Some(3));
}

#[tokio::test]
async fn test_permanent_error_is_not_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_list_page(&server, 2, json!([])).await;

    let mut coordinator = fast_coordinator(&server, dir.path());
    let summaries = coordinator.run(&[collection()]).await;

    assert_eq!(summaries[0].skipped_pages, vec![1]);
    assert_eq!(summaries[0].outcome, CollectionOutcome::Completed);
}

#[tokio::test]
async fn test_transient_error_recovers() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_list_page(
        &server,
        1,
        json!([pull_request(&server, 30, "2019-07-07T07:07:07Z")]),
    )
    .await;
    mount_list_page(&server, 2, json!([])).await;
    mount_sub_resources(&server, 30).await;

    let mut coordinator = fast_coordinator(&server, dir.path());
    let summaries = coordinator.run(&[collection()]).await;

    assert!(summaries[0].skipped_pages.is_empty());
    assert_eq!(summaries[0].records_written, 1);
}

#[tokio::test]
async fn test_rate_limit_is_waited_out() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let reset = (chrono::Utc::now().timestamp() - 10).to_string();
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(403).insert_header("x-ratelimit-reset", reset.as_str()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_list_page(
        &server,
        1,
        json!([pull_request(&server, 40, "2023-12-31T20:00:00Z")]),
    )
    .await;
    mount_list_page(&server, 2, json!([])).await;
    mount_sub_resources(&server, 40).await;

    let mut coordinator = fast_coordinator(&server, dir.path());
    let summaries = coordinator.run(&[collection()]).await;

    assert!(summaries[0].skipped_pages.is_empty());
    assert_eq!(read_records(dir.path())[0].pr_number, 40);
}

#[tokio::test]
async fn test_failed_sub_resource_degrades_to_empty() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = format!("{}/50", LIST_PATH);

    mount_list_page(
        &server,
        1,
        json!([pull_request(&server, 50, "2020-01-01T00:00:00Z")]),
    )
    .await;
    mount_list_page(&server, 2, json!([])).await;

    Mock::given(method("GET"))
        .and(path(format!("{}/commits", base)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"author": {"login": "dev"}}])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/comments", base)))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/review_comments", base)))
        .respond_with(ResponseTemplate::new(200).set_body_string("{truncated"))
        .mount(&server)
        .await;

    let mut coordinator = fast_coordinator(&server, dir.path());
    let summaries = coordinator.run(&[collection()]).await;

    assert_eq!(summaries[0].degraded_sub_resources, 2);
    assert!(summaries[0].skipped_pages.is_empty());

    let records = read_records(dir.path());
    assert_eq!(records.len(), 1);
    assert!(records[0].commit_authors.contains("dev"));
    assert!(records[0].comment_authors.is_empty());
    assert!(records[0].review_comment_authors.is_empty());
}

#[tokio::test]
async fn test_forbidden_with_quota_left_is_not_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let base = format!("{}/60", LIST_PATH);

    mount_list_page(
        &server,
        1,
        json!([pull_request(&server, 60, "2020-01-01T00:00:00Z")]),
    )
    .await;
    mount_list_page(&server, 2, json!([])).await;

    Mock::given(method("GET"))
        .and(path(format!("{}/commits", base)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/comments", base)))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "4999")
                .insert_header("x-ratelimit-reset", "4102444800"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/review_comments", base)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let mut coordinator = fast_coordinator(&server, dir.path());
    let summaries = coordinator.run(&[collection()]).await;

    assert_eq!(summaries[0].outcome, CollectionOutcome::Completed);
    assert_eq!(summaries[0].degraded_sub_resources, 1);
    assert_eq!(read_records(dir.path()).len(), 1);
}

#[tokio::test]
async fn test_rerun_pages_clears_skip_without_moving_checkpoint() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    {
        let mut store = FileCheckpointStore::new(dir.path());
        store.mark_skipped(&collection(), 4).unwrap();
        store.advance(&collection(), 9).unwrap();
    }

    mount_list_page(
        &server,
        4,
        json!([pull_request(&server, 60, "2020-01-01T00:00:00Z")]),
    )
    .await;
    mount_sub_resources(&server, 60).await;

    let mut coordinator = fast_coordinator(&server, dir.path());
    let summary = coordinator.retry_skipped(&collection()).await;

    assert_eq!(summary.records_written, 1);
    assert!(summary.skipped_pages.is_empty());
    assert!(coordinator
        .store()
        .skipped_pages(&collection())
        .unwrap()
        .is_empty());
    assert_eq!(last_completed_page(dir.path()), Some(9));
}

#[tokio::test]
async fn test_repeated_skips_end_collection() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&server)
        .await;

    let mut coordinator = fast_coordinator(&server, dir.path()).with_max_consecutive_skips(3);
    let summaries = coordinator.run(&[collection()]).await;

    assert_eq!(summaries[0].outcome, CollectionOutcome::SkipLimit);
    assert!(summaries[0].outcome.is_failure());
    assert_eq!(summaries[0].skipped_pages, vec![1, 2, 3]);
    assert_eq!(last_completed_page(dir.path()), None);
}

#[tokio::test]
async fn test_stop_before_start_fetches_nothing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let mut coordinator = fast_coordinator(&server, dir.path());
    coordinator.stop_signal().request_stop();
    let summaries = coordinator.run(&[collection()]).await;

    assert_eq!(summaries[0].outcome, CollectionOutcome::Interrupted);
    assert_eq!(last_completed_page(dir.path()), None);
}

#[tokio::test]
async fn test_crawl_then_export_csv() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_list_page(
        &server,
        1,
        json!([pull_request(&server, 70, "2020-01-01T00:00:00Z")]),
    )
    .await;
    mount_list_page(&server, 2, json!([])).await;
    mount_sub_resources(&server, 70).await;

    let mut coordinator = fast_coordinator(&server, dir.path());
    coordinator.run(&[collection()]).await;

    let store = coordinator.into_store();
    let config = create_test_config(&server.uri(), dir.path());
    let window = pr_crawler::config::CrawlWindow::parse(
        &config.crawler.start_date,
        &config.crawler.end_date,
    )
    .unwrap();
    let csv_path = csv_export_path(dir.path(), &collection(), &window);

    let rows = export_records_to_csv(&store.record_log_path(&collection()), &csv_path).unwrap();
    assert_eq!(rows, 1);
    assert!(csv_path.ends_with("octo/widgets/octo_widgets_prs_2018_2023.csv"));

    let content = fs::read_to_string(&csv_path).unwrap();
    assert!(content.contains("\"['bob', 'carol']\""));
}
