//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for an issue tracker's search and
//! issue endpoints and drive whole harvest runs end-to-end.

use issue_harvest::config::{parse_config, Config};
use issue_harvest::crawler::{
    run_sources, sources_from_config, CrawlSettings, ManualClock, ShutdownFlag, Transport,
};
use issue_harvest::output::{RunSummary, SourceOutcome};
use issue_harvest::state::Checkpoint;
use issue_harvest::storage::{CheckpointStore, FileCheckpointStore, JsonlSink};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const SEARCH: &str = "/rest/api/2/search";
const ISSUE_PREFIX: &str = "/rest/api/2/issue/";

/// Serves `keys` as a paginated search result honoring startAt/maxResults
struct PagedSearch {
    keys: Vec<String>,
}

impl PagedSearch {
    fn new(project: &str, count: usize) -> Self {
        Self {
            keys: keys(project, 1..=count),
        }
    }
}

impl Respond for PagedSearch {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let param = |name: &str| {
            request
                .url
                .query_pairs()
                .find(|(k, _)| k == name)
                .and_then(|(_, v)| v.parse::<usize>().ok())
        };
        let start = param("startAt").unwrap_or(0);
        let max = param("maxResults").unwrap_or(50);
        let issues: Vec<Value> = self
            .keys
            .iter()
            .skip(start)
            .take(max)
            .map(|key| json!({"key": key}))
            .collect();

        ResponseTemplate::new(200).set_body_json(json!({
            "startAt": start,
            "maxResults": max,
            "total": self.keys.len(),
            "issues": issues
        }))
    }
}

/// Serves an issue body for whatever key the path names
struct IssueDetail;

impl Respond for IssueDetail {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let key = request.url.path().trim_start_matches(ISSUE_PREFIX);
        ResponseTemplate::new(200).set_body_json(issue_body(key))
    }
}

/// Serves issue bodies like `IssueDetail`, requesting shutdown when `trigger_key` is fetched
struct InterruptingDetail {
    trigger_key: String,
    shutdown: ShutdownFlag,
}

impl Respond for InterruptingDetail {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let key = request.url.path().trim_start_matches(ISSUE_PREFIX);
        if key == self.trigger_key {
            self.shutdown.trigger();
        }
        ResponseTemplate::new(200).set_body_json(issue_body(key))
    }
}

fn issue_body(key: &str) -> Value {
    let project = key.split('-').next().unwrap_or_default();
    json!({
        "id": format!("id-{}", key),
        "key": key,
        "fields": {
            "summary": format!("Summary of {}", key),
            "description": "Steps to reproduce",
            "project": {"key": project},
            "status": {"name": "Open"},
            "comment": {"comments": [
                {"author": {"displayName": "Dev"}, "created": "2021-01-01", "body": "Looking"}
            ]}
        }
    })
}

fn keys(project: &str, range: std::ops::RangeInclusive<usize>) -> Vec<String> {
    range.map(|i| format!("{}-{}", project, i)).collect()
}

struct Harness {
    _tmp: TempDir,
    config: Config,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new(server: &MockServer, sources: &[&str], requests_per_minute: u32) -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().display().to_string();
        let source_tables: String = sources
            .iter()
            .map(|key| format!("\n[[source]]\nkey = \"{}\"\n", key))
            .collect();

        let config = parse_config(&format!(
            r#"
[crawler]
page-size = 50
requests-per-minute = {rpm}
max-attempts = 2
backoff-base-ms = 10
backoff-max-secs = 1
rate-limit-fallback-secs = 30
page-retries = 1
page-retry-delay-secs = 1
request-timeout-secs = 5

[user-agent]
crawler-name = "TestHarvest"
crawler-version = "1.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[remote]
base-url = "{base}"
fields = "summary,description,comment"

[output]
output-dir = "{root}/out"
state-dir = "{root}/state"
{source_tables}"#,
            rpm = requests_per_minute,
            base = server.uri(),
            root = root,
            source_tables = source_tables
        ))
        .unwrap();

        Self {
            _tmp: tmp,
            config,
            clock: Arc::new(ManualClock::new()),
        }
    }

    fn store(&self) -> FileCheckpointStore {
        FileCheckpointStore::new(&self.config.output.state_dir)
    }

    fn sink(&self) -> JsonlSink {
        JsonlSink::new(&self.config.output.output_dir)
    }

    async fn run_with(&self, shutdown: &ShutdownFlag) -> RunSummary {
        let mut transport = Transport::from_config(
            &self.config.crawler,
            &self.config.user_agent,
            self.clock.clone(),
        )
        .unwrap();
        let mut store = self.store();
        let sink = self.sink();

        run_sources(
            &sources_from_config(&self.config),
            CrawlSettings::from_config(&self.config.crawler),
            &mut transport,
            &mut store,
            &sink,
            shutdown,
        )
        .await
    }

    async fn run(&self) -> RunSummary {
        self.run_with(&ShutdownFlag::new()).await
    }

    fn raw_keys(&self, source: &str) -> Vec<String> {
        read_lines(&self.sink().raw_path(source))
            .iter()
            .map(|v| v["key"].as_str().unwrap().to_string())
            .collect()
    }

    fn transformed_keys(&self, source: &str) -> Vec<String> {
        read_lines(&self.sink().transformed_path(source))
            .iter()
            .map(|v| v["metadata"]["issue_key"].as_str().unwrap().to_string())
            .collect()
    }
}

fn read_lines(path: &Path) -> Vec<Value> {
    match std::fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect(),
        Err(_) => Vec::new(),
    }
}

async fn detail_requests(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter_map(|r| r.url.path().strip_prefix(ISSUE_PREFIX).map(str::to_string))
        .collect()
}

async fn search_offsets(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == SEARCH)
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "startAt")
                .map(|(_, v)| v.into_owned())
        })
        .collect()
}

async fn mount_details(server: &MockServer) {
    Mock::given(path_regex(r"^/rest/api/2/issue/[^/]+$"))
        .respond_with(IssueDetail)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_harvest_single_source() {
    let server = MockServer::start().await;
    Mock::given(path(SEARCH))
        .respond_with(PagedSearch::new("HADOOP", 120))
        .expect(3)
        .mount(&server)
        .await;
    mount_details(&server).await;

    let harness = Harness::new(&server, &["HADOOP"], 0);
    let summary = harness.run().await;

    assert_eq!(summary.sources.len(), 1);
    let report = &summary.sources[0];
    assert_eq!(report.outcome, SourceOutcome::Completed);
    assert_eq!(report.written, 120);
    assert_eq!(report.pages, 3);
    assert_eq!(report.final_cursor, 120);

    let expected = keys("HADOOP", 1..=120);
    assert_eq!(harness.raw_keys("HADOOP"), expected);
    assert_eq!(harness.transformed_keys("HADOOP"), expected);
    assert_eq!(search_offsets(&server).await, vec!["0", "50", "100"]);

    let checkpoint = harness.store().load("HADOOP").unwrap();
    assert_eq!(checkpoint.cursor, 120);
    assert_eq!(checkpoint.seen.len(), 120);
    assert!(checkpoint.failed.is_empty());
}

#[tokio::test]
async fn test_transformed_record_shape() {
    let server = MockServer::start().await;
    Mock::given(path(SEARCH))
        .respond_with(PagedSearch::new("SPARK", 1))
        .mount(&server)
        .await;
    mount_details(&server).await;

    let harness = Harness::new(&server, &["SPARK"], 0);
    harness.run().await;

    let transformed = read_lines(&harness.sink().transformed_path("SPARK"));
    assert_eq!(transformed.len(), 1);
    let record = &transformed[0];
    assert_eq!(record["title"], "Summary of SPARK-1");
    assert_eq!(record["metadata"]["project"], "SPARK");
    assert_eq!(record["metadata"]["status"], "Open");
    assert_eq!(record["comments"], json!(["Dev (2021-01-01): Looking"]));
    assert_eq!(record["derived"]["summarization"]["task"], "summarization");
    assert_eq!(record["derived"]["qna"]["task"], "qa");
    assert_eq!(record["raw_issue_id"], "id-SPARK-1");

    let raw = read_lines(&harness.sink().raw_path("SPARK"));
    assert_eq!(raw[0], issue_body("SPARK-1"));
}

#[tokio::test]
async fn test_rerun_after_completion_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(path(SEARCH))
        .respond_with(PagedSearch::new("HADOOP", 60))
        .mount(&server)
        .await;
    mount_details(&server).await;

    let harness = Harness::new(&server, &["HADOOP"], 0);
    harness.run().await;
    let first = harness.store().load("HADOOP").unwrap();

    let summary = harness.run().await;

    assert_eq!(summary.sources[0].outcome, SourceOutcome::Completed);
    assert_eq!(summary.sources[0].written, 0);
    assert_eq!(harness.raw_keys("HADOOP").len(), 60);
    assert_eq!(detail_requests(&server).await.len(), 60);

    let second = harness.store().load("HADOOP").unwrap();
    assert_eq!(second, first);
}

#[tokio::test]
async fn test_resume_from_checkpoint() {
    let server = MockServer::start().await;
    Mock::given(path(SEARCH))
        .respond_with(PagedSearch::new("HADOOP", 120))
        .mount(&server)
        .await;
    mount_details(&server).await;

    let harness = Harness::new(&server, &["HADOOP"], 0);
    let mut checkpoint = Checkpoint::new();
    checkpoint.advance_to(50);
    for key in keys("HADOOP", 1..=50) {
        checkpoint.mark_seen(&key);
    }
    harness.store().save("HADOOP", &checkpoint).unwrap();

    let summary = harness.run().await;

    assert_eq!(summary.sources[0].start_cursor, 50);
    assert_eq!(summary.sources[0].written, 70);
    assert_eq!(search_offsets(&server).await, vec!["50", "100"]);
    assert_eq!(harness.raw_keys("HADOOP"), keys("HADOOP", 51..=120));
    assert_eq!(detail_requests(&server).await.len(), 70);
}

#[tokio::test]
async fn test_interrupted_run_resumes_at_page_boundary() {
    let server = MockServer::start().await;
    Mock::given(path(SEARCH))
        .respond_with(PagedSearch::new("HADOOP", 120))
        .mount(&server)
        .await;
    let shutdown = ShutdownFlag::new();
    Mock::given(path_regex(r"^/rest/api/2/issue/[^/]+$"))
        .respond_with(InterruptingDetail {
            trigger_key: "HADOOP-25".to_string(),
            shutdown: shutdown.clone(),
        })
        .mount(&server)
        .await;

    let harness = Harness::new(&server, &["HADOOP"], 0);
    let first = harness.run_with(&shutdown).await;

    // The page in flight is finished and persisted before stopping
    assert_eq!(first.sources[0].outcome, SourceOutcome::Interrupted);
    assert_eq!(first.sources[0].final_cursor, 50);
    assert_eq!(harness.store().load("HADOOP").unwrap().cursor, 50);
    assert_eq!(harness.raw_keys("HADOOP"), keys("HADOOP", 1..=50));
    assert_eq!(search_offsets(&server).await, vec!["0"]);

    let second = harness.run().await;

    assert_eq!(second.sources[0].outcome, SourceOutcome::Completed);
    assert_eq!(second.sources[0].start_cursor, 50);
    assert_eq!(search_offsets(&server).await, vec!["0", "50", "100"]);
    assert_eq!(harness.raw_keys("HADOOP"), keys("HADOOP", 1..=120));
    assert_eq!(detail_requests(&server).await.len(), 120);
}

#[tokio::test]
async fn test_resume_accepts_legacy_state_file() {
    let server = MockServer::start().await;
    Mock::given(path(SEARCH))
        .respond_with(PagedSearch::new("KAFKA", 4))
        .mount(&server)
        .await;
    mount_details(&server).await;

    let harness = Harness::new(&server, &["KAFKA"], 0);
    let state_dir = Path::new(&harness.config.output.state_dir);
    std::fs::create_dir_all(state_dir).unwrap();
    std::fs::write(
        state_dir.join("KAFKA.json"),
        r#"{"startAt": 2, "seen_issue_keys": ["KAFKA-1", "KAFKA-2"]}"#,
    )
    .unwrap();

    harness.run().await;

    assert_eq!(harness.raw_keys("KAFKA"), keys("KAFKA", 3..=4));
    assert_eq!(harness.store().load("KAFKA").unwrap().cursor, 4);
}

#[tokio::test]
async fn test_seen_items_are_not_refetched() {
    let server = MockServer::start().await;
    Mock::given(path(SEARCH))
        .respond_with(PagedSearch::new("HIVE", 5))
        .mount(&server)
        .await;
    mount_details(&server).await;

    let harness = Harness::new(&server, &["HIVE"], 0);
    let mut checkpoint = Checkpoint::new();
    checkpoint.mark_seen("HIVE-2");
    checkpoint.mark_seen("HIVE-4");
    harness.store().save("HIVE", &checkpoint).unwrap();

    let summary = harness.run().await;

    assert_eq!(summary.sources[0].skipped_seen, 2);
    assert_eq!(
        harness.raw_keys("HIVE"),
        vec!["HIVE-1", "HIVE-3", "HIVE-5"]
    );
    let fetched = detail_requests(&server).await;
    assert!(!fetched.contains(&"HIVE-2".to_string()));
    assert!(!fetched.contains(&"HIVE-4".to_string()));
}

#[tokio::test]
async fn test_shifted_pages_write_each_record_once() {
    let server = MockServer::start().await;
    Mock::given(path(SEARCH))
        .and(query_param("startAt", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "startAt": 0, "total": 4,
            "issues": [{"key": "PIG-1"}, {"key": "PIG-2"}]
        })))
        .mount(&server)
        .await;
    Mock::given(path(SEARCH))
        .and(query_param("startAt", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "startAt": 2, "total": 4,
            "issues": [{"key": "PIG-2"}, {"key": "PIG-3"}]
        })))
        .mount(&server)
        .await;
    mount_details(&server).await;

    let harness = Harness::new(&server, &["PIG"], 0);
    let summary = harness.run().await;

    assert_eq!(summary.sources[0].skipped_seen, 1);
    assert_eq!(harness.raw_keys("PIG"), vec!["PIG-1", "PIG-2", "PIG-3"]);
    assert_eq!(detail_requests(&server).await.len(), 3);
}

#[tokio::test]
async fn test_failing_source_does_not_stop_others() {
    let server = MockServer::start().await;
    Mock::given(path(SEARCH))
        .and(query_param("jql", "project = BROKEN ORDER BY created ASC"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path(SEARCH))
        .and(query_param("jql", "project = GOOD ORDER BY created ASC"))
        .respond_with(PagedSearch::new("GOOD", 3))
        .mount(&server)
        .await;
    mount_details(&server).await;

    let harness = Harness::new(&server, &["BROKEN", "GOOD"], 0);
    let summary = harness.run().await;

    assert_eq!(summary.sources.len(), 2);
    assert!(summary.sources[0].is_failed());
    assert_eq!(summary.sources[1].outcome, SourceOutcome::Completed);
    assert_eq!(summary.sources[1].written, 3);
    assert_eq!(summary.failed_sources().len(), 1);

    assert!(harness.raw_keys("BROKEN").is_empty());
    assert_eq!(harness.raw_keys("GOOD"), keys("GOOD", 1..=3));
    assert_eq!(harness.store().load("BROKEN").unwrap(), Checkpoint::new());
}

#[tokio::test]
async fn test_failed_item_is_retried_on_next_run() {
    let server = MockServer::start().await;
    Mock::given(path(SEARCH))
        .respond_with(PagedSearch::new("YARN", 3))
        .mount(&server)
        .await;
    Mock::given(path("/rest/api/2/issue/YARN-2"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_details(&server).await;

    let harness = Harness::new(&server, &["YARN"], 0);
    let first = harness.run().await;

    assert_eq!(first.sources[0].failed_items, vec!["YARN-2".to_string()]);
    assert_eq!(harness.raw_keys("YARN"), vec!["YARN-1", "YARN-3"]);
    let checkpoint = harness.store().load("YARN").unwrap();
    assert_eq!(checkpoint.cursor, 3);
    assert!(checkpoint.failed.contains("YARN-2"));

    let second = harness.run().await;

    assert_eq!(second.sources[0].recovered, 1);
    assert!(second.sources[0].failed_items.is_empty());
    assert_eq!(harness.raw_keys("YARN"), vec!["YARN-1", "YARN-3", "YARN-2"]);
    assert_eq!(harness.transformed_keys("YARN"), harness.raw_keys("YARN"));
    let checkpoint = harness.store().load("YARN").unwrap();
    assert!(checkpoint.failed.is_empty());
    assert!(checkpoint.is_seen("YARN-2"));
}

#[tokio::test]
async fn test_rate_limited_search_waits_and_continues() {
    let server = MockServer::start().await;
    Mock::given(path(SEARCH))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(path(SEARCH))
        .respond_with(PagedSearch::new("HBASE", 2))
        .mount(&server)
        .await;
    mount_details(&server).await;

    let harness = Harness::new(&server, &["HBASE"], 0);
    let summary = harness.run().await;

    assert_eq!(summary.sources[0].written, 2);
    assert_eq!(harness.clock.sleeps(), vec![Duration::from_secs(2)]);
    assert_eq!(search_offsets(&server).await, vec!["0", "0"]);
}

#[tokio::test]
async fn test_requests_are_paced_across_sources() {
    let server = MockServer::start().await;
    Mock::given(path(SEARCH))
        .and(query_param("jql", "project = A ORDER BY created ASC"))
        .respond_with(PagedSearch::new("A", 1))
        .mount(&server)
        .await;
    Mock::given(path(SEARCH))
        .and(query_param("jql", "project = B ORDER BY created ASC"))
        .respond_with(PagedSearch::new("B", 1))
        .mount(&server)
        .await;
    mount_details(&server).await;

    let harness = Harness::new(&server, &["A", "B"], 60);
    harness.run().await;

    // four requests, one shared pacing clock: three 1s gaps
    assert_eq!(
        harness.clock.sleeps(),
        vec![Duration::from_secs(1); 3]
    );
}

#[tokio::test]
async fn test_shutdown_before_start_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(path(SEARCH))
        .respond_with(PagedSearch::new("HADOOP", 10))
        .expect(0)
        .mount(&server)
        .await;

    let harness = Harness::new(&server, &["HADOOP"], 0);
    let shutdown = ShutdownFlag::new();
    shutdown.trigger();
    let summary = harness.run_with(&shutdown).await;

    assert!(summary.sources.is_empty());
    assert!(harness.raw_keys("HADOOP").is_empty());
}
