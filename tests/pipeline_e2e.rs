//! End-to-end pipeline runs.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jobs_crawler::error::{AdapterError, FetchError, NotifyError};
use jobs_crawler::fetch::{Fetch, FetchRequest, ResilientFetcher};
use jobs_crawler::models::{
    Config, CrawlerConfig, ErrorKind, HtmlSource, JobRecord, JsonSource, RawJob, Recipient,
    RetryConfig, SourceConfig, SourceKind,
};
use jobs_crawler::notify::NotificationSink;
use jobs_crawler::pipeline::{RunContext, run_pipeline};
use jobs_crawler::sources::{SourceAdapter, SourceRegistry, SourceResult};
use jobs_crawler::storage::LocalStorage;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixed(Vec<RawJob>);

#[async_trait]
impl SourceAdapter for Fixed {
    async fn run(&self, _fetch: &dyn Fetch) -> SourceResult {
        Ok(self.0.clone())
    }
}

struct Failing;

#[async_trait]
impl SourceAdapter for Failing {
    async fn run(&self, fetch: &dyn Fetch) -> SourceResult {
        fetch.fetch(FetchRequest::get("https://down.test/jobs")).await?;
        Err(AdapterError::parse("no listings container"))
    }
}

struct Offline;

#[async_trait]
impl Fetch for Offline {
    async fn fetch(&self, request: FetchRequest) -> Result<String, FetchError> {
        Err(FetchError::Http {
            url: request.url,
            status: 503,
        })
    }
}

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(String, Vec<String>)>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, address: &str, records: &[JobRecord]) -> Result<(), NotifyError> {
        let titles = records.iter().map(|r| r.vacancy.clone()).collect();
        self.sent.lock().unwrap().push((address.to_string(), titles));
        Ok(())
    }
}

#[tokio::test]
async fn failing_source_and_duplicates_are_isolated() {
    let tmp = TempDir::new().unwrap();
    let storage = LocalStorage::new(tmp.path());
    let sink = RecordingSink::default();
    let recipients = vec![
        Recipient::new("audit@example.com", ["audit"]),
        Recipient::new("pilot@example.com", ["pilot"]),
    ];

    let mut registry = SourceRegistry::new();
    registry
        .register(
            "alpha",
            Arc::new(Fixed(vec![
                RawJob::new("Acme", "Senior Auditor", "https://acme.test/1"),
                RawJob::new("Acme", "Sales Manager", "https://acme.test/2"),
            ])),
        )
        .unwrap();
    registry.register("broken", Arc::new(Failing)).unwrap();
    registry
        .register(
            "mirror",
            Arc::new(Fixed(vec![RawJob::new(
                " ACME ",
                "senior auditor",
                "https://acme.test/1",
            )])),
        )
        .unwrap();

    let summary = run_pipeline(RunContext {
        registry: &registry,
        fetch: Arc::new(Offline),
        deadline: Duration::from_secs(30),
        recipients: &recipients,
        storage: Some(&storage),
        sink: Some(&sink),
    })
    .await
    .unwrap();

    assert_eq!(summary.raw_records, 3);
    assert_eq!(summary.dataset.len(), 2);
    assert!(summary.dataset.iter().all(|r| r.source == "alpha"));
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].name, "broken");
    assert_eq!(summary.errors[0].kind, ErrorKind::Http(503));
    assert_eq!(summary.sources_ok(), 2);

    let csv = std::fs::read_to_string(tmp.path().join("jobs.csv")).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(tmp.path().join("scrape_errors.json").exists());

    let sent = sink.sent.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![(
            "audit@example.com".to_string(),
            vec!["Senior Auditor".to_string()]
        )]
    );
    assert_eq!(summary.notified, vec!["audit@example.com".to_string()]);
}

#[tokio::test]
async fn storage_failure_still_notifies() {
    let tmp = TempDir::new().unwrap();
    let blocked = tmp.path().join("output");
    std::fs::write(&blocked, "not a directory").unwrap();
    let storage = LocalStorage::new(blocked.clone());
    let sink = RecordingSink::default();
    let recipients = vec![Recipient::new("audit@example.com", ["audit"])];

    let mut registry = SourceRegistry::new();
    registry
        .register(
            "alpha",
            Arc::new(Fixed(vec![RawJob::new(
                "Acme",
                "Internal Auditor",
                "https://acme.test/3",
            )])),
        )
        .unwrap();

    let summary = run_pipeline(RunContext {
        registry: &registry,
        fetch: Arc::new(Offline),
        deadline: Duration::from_secs(30),
        recipients: &recipients,
        storage: Some(&storage),
        sink: Some(&sink),
    })
    .await
    .unwrap();

    assert!(summary.write.is_none());
    assert!(summary.store_error.is_some());
    assert_eq!(summary.dataset.len(), 1);
    assert_eq!(summary.notified, vec!["audit@example.com".to_string()]);
    assert_eq!(sink.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn empty_run_skips_storage_and_notification() {
    let tmp = TempDir::new().unwrap();
    let storage = LocalStorage::new(tmp.path());
    let sink = RecordingSink::default();
    let recipients = vec![Recipient::new("audit@example.com", ["audit"])];

    let summary = run_pipeline(RunContext {
        registry: &SourceRegistry::new(),
        fetch: Arc::new(Offline),
        deadline: Duration::from_secs(1),
        recipients: &recipients,
        storage: Some(&storage),
        sink: Some(&sink),
    })
    .await
    .unwrap();

    assert!(summary.dataset.is_empty());
    assert!(summary.write.is_none());
    assert!(sink.sent.lock().unwrap().is_empty());
    assert!(!tmp.path().join("jobs.csv").exists());
}

#[tokio::test]
async fn configured_sources_run_against_http_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/careers"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<ul>
                 <li class="job"><a href="/careers/risk">Risk Analyst</a><span>Baku</span></li>
                 <li class="job"><a href="/careers/hr">HR Partner</a><span>Ganja</span></li>
               </ul>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/vacancies"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"result": {"items": [{"id": 7, "name": "Data Engineer", "org": "Kapital"}]}}"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/vacancies"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"result": {"items": []}}"#),
        )
        .mount(&server)
        .await;

    let mut config = Config {
        sources: vec![
            SourceConfig {
                name: "board".into(),
                enabled: true,
                kind: SourceKind::Html(HtmlSource {
                    url: format!("{}/careers", server.uri()),
                    pages: None,
                    row_selector: "li.job".into(),
                    title_selector: "a".into(),
                    link_selector: None,
                    link_attr: "href".into(),
                    company: Some("Board Co".into()),
                    company_selector: None,
                    extra_selectors: BTreeMap::from([("location".into(), "span".into())]),
                    stop_on_empty: true,
                    verify_tls: true,
                    headers: BTreeMap::new(),
                }),
            },
            SourceConfig {
                name: "api".into(),
                enabled: true,
                kind: SourceKind::Json(JsonSource {
                    url: format!("{}/api/vacancies", server.uri()),
                    page_param: Some("page".into()),
                    start_page: 1,
                    max_pages: 5,
                    items_path: "result.items".into(),
                    title_field: "name".into(),
                    link_field: None,
                    link_template: Some(format!("{}/vacancy/{{id}}", server.uri())),
                    company: None,
                    company_field: Some("org".into()),
                    query: BTreeMap::new(),
                    headers: BTreeMap::new(),
                    verify_tls: true,
                }),
            },
        ],
        ..Config::default()
    };
    config.crawler = CrawlerConfig {
        calls_per_second: 0.0,
        ..CrawlerConfig::default()
    };
    config.retry = RetryConfig {
        max_attempts: 1,
        base_delay_ms: 10,
        jitter: false,
    };
    config.validate().unwrap();

    let registry = SourceRegistry::from_config(&config).unwrap();
    let fetcher = ResilientFetcher::new(&config.crawler, &config.retry).unwrap();

    let summary = run_pipeline(RunContext {
        registry: &registry,
        fetch: Arc::new(fetcher),
        deadline: Duration::from_secs(30),
        recipients: &[],
        storage: None,
        sink: None,
    })
    .await
    .unwrap();

    assert!(summary.errors.is_empty(), "{:?}", summary.errors);
    let titles: Vec<_> = summary.dataset.iter().map(|r| r.vacancy.as_str()).collect();
    assert_eq!(titles, vec!["Risk Analyst", "HR Partner", "Data Engineer"]);

    let first = &summary.dataset[0];
    assert_eq!(first.apply_link, format!("{}/careers/risk", server.uri()));
    assert_eq!(first.company, "Board Co");
    assert_eq!(first.extras.get("location").map(String::as_str), Some("Baku"));

    let api = &summary.dataset[2];
    assert_eq!(api.source, "api");
    assert_eq!(api.company, "Kapital");
    assert_eq!(api.apply_link, format!("{}/vacancy/7", server.uri()));
}
