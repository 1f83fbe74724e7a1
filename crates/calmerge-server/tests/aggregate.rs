//! End-to-end tests: mock upstream feeds, the real router on a local port,
//! and an HTTP client reading the merged calendar.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use calmerge_feeds::{FeedSource, FetcherConfig, HttpFetcher};
use calmerge_server::{Aggregator, ServerConfig, SignalHandler, bind};
use serde_json::Value;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Running {
    addr: SocketAddr,
    signals: SignalHandler,
    task: JoinHandle<calmerge_server::ServerResult<()>>,
    client: reqwest::Client,
}

impl Running {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    async fn status(&self) -> Value {
        let body = self.get("/status").await.text().await.unwrap();
        serde_json::from_str(&body).unwrap()
    }

    /// Polls `/status` until `check` holds.
    async fn wait_for(&self, check: impl Fn(&Value) -> bool) -> Value {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let status = self.status().await;
            if check(&status) {
                return status;
            }
            assert!(Instant::now() < deadline, "timed out, last status: {status}");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    async fn wait_warm(&self) -> Value {
        self.wait_for(|s| s["warm"] == true).await
    }

    async fn shutdown(self) {
        self.signals.trigger_shutdown();
        let result = tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}

async fn start(config: ServerConfig) -> Running {
    let fetcher = Arc::new(HttpFetcher::new(&config.fetcher).unwrap());
    let listener = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let aggregator = Aggregator::new(config, fetcher).unwrap();

    let signals = SignalHandler::new();
    let task = tokio::spawn(aggregator.serve(listener, signals.shutdown(), signals.reload()));

    Running {
        addr,
        signals,
        task,
        client: reqwest::Client::new(),
    }
}

fn ics(events: &[(&str, &str, &str)]) -> String {
    let body: String = events
        .iter()
        .map(|(uid, start, title)| {
            format!("BEGIN:VEVENT\r\nUID:{uid}\r\nDTSTART:{start}\r\nSUMMARY:{title}\r\nEND:VEVENT\r\n")
        })
        .collect();
    format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//test//EN\r\n{body}END:VCALENDAR\r\n")
}

async fn serve_feed(upstream: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(upstream)
        .await;
}

fn source(upstream: &MockServer, id: &str) -> FeedSource {
    FeedSource::with_id(id, &format!("{}/{id}.ics", upstream.uri())).unwrap()
}

fn config(sources: Vec<FeedSource>) -> ServerConfig {
    ServerConfig::new(sources)
        .with_refresh_interval(Duration::from_secs(300))
        .with_fetcher(FetcherConfig::default().with_timeout(Duration::from_secs(5)))
}

#[tokio::test]
async fn merges_feeds_in_start_order() {
    let upstream = MockServer::start().await;
    serve_feed(&upstream, "/a.ics", ics(&[("abc", "20240101T100000Z", "Standup")])).await;
    serve_feed(&upstream, "/b.ics", ics(&[("def", "20240101T090000Z", "Planning")])).await;

    let running = start(config(vec![source(&upstream, "a"), source(&upstream, "b")])).await;
    running.wait_warm().await;

    let response = running.get("/calendar.ics").await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "text/calendar; charset=utf-8"
    );
    assert!(response.headers().contains_key("etag"));

    let body = response.text().await.unwrap();
    assert!(body.starts_with("BEGIN:VCALENDAR\r\n"));
    assert!(body.ends_with("END:VCALENDAR\r\n"));

    let planning = body.find("SUMMARY:Planning").unwrap();
    let standup = body.find("SUMMARY:Standup").unwrap();
    assert!(planning < standup);

    assert!(body.contains("UID:a/abc\r\n"));
    assert!(body.contains("UID:b/def\r\n"));
    assert!(body.contains("X-CALENDAR-SOURCE:a\r\n"));
    assert!(body.contains("X-CALENDAR-SOURCE:b\r\n"));

    running.shutdown().await;
}

#[tokio::test]
async fn cold_cache_answers_503_with_retry_after() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.ics"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(ics(&[("1", "20240101T100000Z", "Later")]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&upstream)
        .await;

    let running = start(config(vec![source(&upstream, "slow")])).await;

    let response = running.get("/calendar.ics").await;
    assert_eq!(response.status(), 503);
    assert_eq!(response.headers()["retry-after"], "5");

    let response = running.get("/calendar.json").await;
    assert_eq!(response.status(), 503);
    assert_eq!(response.headers()["retry-after"], "5");
    let body: Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
    assert_eq!(body["retry_after_seconds"], 5);

    let status = running.status().await;
    assert_eq!(status["warm"], false);

    running.wait_warm().await;
    assert_eq!(running.get("/calendar.ics").await.status(), 200);

    running.shutdown().await;
}

#[tokio::test]
async fn warm_reads_do_not_wait_for_upstream() {
    let upstream = MockServer::start().await;
    serve_feed(&upstream, "/a.ics", ics(&[("1", "20240101T100000Z", "Sync")])).await;

    let running = start(config(vec![source(&upstream, "a")])).await;
    running.wait_warm().await;

    for _ in 0..5 {
        let started = Instant::now();
        let response = running.get("/calendar.ics").await;
        assert_eq!(response.status(), 200);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    running.shutdown().await;
}

#[tokio::test]
async fn if_none_match_returns_304() {
    let upstream = MockServer::start().await;
    serve_feed(&upstream, "/a.ics", ics(&[("1", "20240101T100000Z", "Sync")])).await;

    let running = start(config(vec![source(&upstream, "a")])).await;
    running.wait_warm().await;

    let first = running.get("/calendar.ics").await;
    let etag = first.headers()["etag"].to_str().unwrap().to_string();

    let second = running
        .client
        .get(running.url("/calendar.ics"))
        .header("if-none-match", &etag)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 304);
    assert_eq!(second.headers()["etag"], etag.as_str());

    running.shutdown().await;
}

#[tokio::test]
async fn status_and_json_report_partial_failure() {
    let upstream = MockServer::start().await;
    serve_feed(
        &upstream,
        "/a.ics",
        ics(&[
            ("1", "20240101T100000Z", "One"),
            ("2", "20240102T100000Z", "Two"),
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/b.ics"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;

    let running = start(config(vec![source(&upstream, "a"), source(&upstream, "b")])).await;
    let status = running.wait_warm().await;

    assert_eq!(status["event_count"], 2);
    assert_eq!(status["cycles_swapped"], 1);
    let sources = status["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0]["source_id"], "a");
    assert_eq!(sources[0]["event_count"], 2);
    assert!(sources[0]["error"].is_null());
    assert_eq!(sources[1]["source_id"], "b");
    assert_eq!(sources[1]["error"]["kind"], "http_status");

    let json: Value =
        serde_json::from_str(&running.get("/calendar.json").await.text().await.unwrap()).unwrap();
    assert_eq!(json["name"], "Merged Calendar");
    let events = json["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["uid"], "a/1");
    assert_eq!(events[0]["title"], "One");

    running.shutdown().await;
}

#[tokio::test]
async fn total_failure_keeps_serving_previous_calendar() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.ics"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(ics(&[("1", "20240101T100000Z", "Kept")])),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/a.ics"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&upstream)
        .await;

    let running = start(config(vec![source(&upstream, "a")])).await;
    running.wait_warm().await;
    let before = running.get("/calendar.ics").await;
    let etag = before.headers()["etag"].clone();
    let body = before.text().await.unwrap();

    running.signals.trigger_reload();
    let status = running.wait_for(|s| s["cycles_failed"] == 1).await;
    assert_eq!(status["warm"], true);
    assert!(status["last_error"].as_str().unwrap().contains("all"));

    let after = running.get("/calendar.ics").await;
    assert_eq!(after.status(), 200);
    assert_eq!(after.headers()["etag"], etag);
    assert_eq!(after.text().await.unwrap(), body);

    running.shutdown().await;
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let upstream = MockServer::start().await;
    serve_feed(&upstream, "/a.ics", ics(&[("1", "20240101T100000Z", "Sync")])).await;

    let running = start(config(vec![source(&upstream, "a")]).with_path("/team.ics")).await;
    running.wait_warm().await;

    assert_eq!(running.get("/team.ics").await.status(), 200);
    assert_eq!(running.get("/calendar.ics").await.status(), 404);

    running.shutdown().await;
}
