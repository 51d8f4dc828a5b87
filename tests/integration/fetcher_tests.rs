//! HTTP fetching against a mock server

use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_spider::config::{SchedulerConfig, UserAgentConfig};
use sumi_spider::{FetchError, Fetcher, HttpFetcher, Scheduler};
use tokio::time::Instant;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn create_fetcher() -> HttpFetcher {
    HttpFetcher::from_config(&user_agent()).expect("Failed to build HTTP client")
}

fn page_url(server: &MockServer, page: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), page)).expect("Failed to parse mock URL")
}

#[tokio::test]
async fn test_fetch_returns_body_and_sends_user_agent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header(
            "user-agent",
            "TestBot/1.0.0 (+https://example.com/contact; test@example.com)",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>hello</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let body = create_fetcher()
        .fetch(&page_url(&server, "/page"))
        .await
        .unwrap();

    assert_eq!(body, "<html>hello</html>");
}

#[tokio::test]
async fn test_fetch_reports_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let fetcher = create_fetcher();

    let result = fetcher.fetch(&page_url(&server, "/missing")).await;
    assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));

    let result = fetcher.fetch(&page_url(&server, "/broken")).await;
    assert!(matches!(result, Err(FetchError::Status { status: 503, .. })));
}

#[tokio::test]
async fn test_fetch_follows_redirects() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
        .mount(&server)
        .await;

    let body = create_fetcher()
        .fetch(&page_url(&server, "/old"))
        .await
        .unwrap();

    assert_eq!(body, "moved");
}

#[tokio::test]
async fn test_scheduler_spaces_real_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/one"))
        .respond_with(ResponseTemplate::new(200).set_body_string("one"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(ResponseTemplate::new(200).set_body_string("two"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&server)
        .await;

    let scheduler = Scheduler::new(
        &SchedulerConfig::with_interval(200),
        Arc::new(create_fetcher()),
    );
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let start = Instant::now();

    for page in ["/one", "/gone", "/two"] {
        let bodies = Arc::clone(&bodies);
        let url = page_url(&server, page);
        let accepted = scheduler
            .add_task(url.as_str(), move |body: String| {
                bodies.lock().unwrap().push(body)
            })
            .unwrap();
        assert!(accepted);
    }

    scheduler.shutdown(false);
    scheduler.await_termination().await;

    // Third slot for the same host is two intervals out
    assert!(start.elapsed() >= Duration::from_millis(400));
    assert_eq!(*bodies.lock().unwrap(), vec!["one", "two"]);
}
