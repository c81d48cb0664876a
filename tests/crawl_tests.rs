//! End-to-end tests driving the crawl engine against in-process sites

use admin_crawler::config::{Config, ExhaustedPolicy};
use admin_crawler::crawler::{CrawlEngine, FetchError, FetchedResource, Fetcher, HttpFetcher};
use admin_crawler::legal::{
    Escalator, LegalStatus, RenderError, RenderedPage, Renderer, UnavailableRenderer,
};
use admin_crawler::storage::load_checkpoint;
use admin_crawler::{fingerprint, CrawlError, Payload, ResourceKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOME: &str = "https://astra.example/de/home.html";

/// In-memory site; URLs without a page fail with a connection error
#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, (String, Vec<u8>)>,
    hanging: Vec<String>,
    requests: Mutex<Vec<String>>,
}

impl FakeSite {
    fn page(mut self, url: &str, content_type: &str, body: &str) -> Self {
        self.pages
            .insert(url.to_string(), (content_type.to_string(), body.as_bytes().to_vec()));
        self
    }

    fn hang_on(mut self, url: &str) -> Self {
        self.hanging.push(url.to_string());
        self
    }

    fn requests_for(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|requested| requested.as_str() == url)
            .count()
    }

    fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for FakeSite {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());

        if self.hanging.iter().any(|hanging| hanging == url) {
            std::future::pending::<()>().await;
        }

        match self.pages.get(url) {
            Some((content_type, body)) => Ok(FetchedResource {
                url: url.to_string(),
                final_url: url.to_string(),
                status: 200,
                content_type: Some(content_type.clone()),
                body: body.clone(),
            }),
            None => Err(FetchError::Connect(format!("connection refused: {}", url))),
        }
    }
}

/// Renderer reporting a fixed status for every page
struct StatusRenderer {
    banner: &'static str,
    renders: AtomicUsize,
}

#[async_trait]
impl Renderer for StatusRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(RenderedPage {
            html: format!("<app-in-force-status>{}</app-in-force-status>", self.banner),
            final_url: url.to_string(),
        })
    }
}

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.crawler.start_urls = vec![HOME.to_string()];
    config.crawler.scope = vec![];
    config.crawler.retries = 1;
    config.crawler.retry_delay_ms = 1;
    config.crawler.workers = 3;
    config.crawler.checkpoint_interval = 400;
    config.filter.enabled = true;
    config.filter.pattern = "astra\\.example".to_string();
    config.output.write_dir = dir.path().to_string_lossy().into_owned();
    config
}

fn escalator(renderer: Arc<dyn Renderer>) -> Escalator {
    Escalator::new(renderer, Duration::from_secs(2))
}

#[tokio::test]
async fn test_scenario_a_internal_links_only() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(
        FakeSite::default()
            .page(
                HOME,
                "text/html",
                r#"<html><body>
                    <a href="/de/a.html">A</a>
                    <a href="https://astra.example/de/b.html">B</a>
                    <a href="https://external.example/page.html">External</a>
                </body></html>"#,
            )
            .page("https://astra.example/de/a.html", "text/html", "<p>A</p>")
            .page("https://astra.example/de/b.html", "text/html", "<p>B</p>"),
    );

    let mut engine = CrawlEngine::new(
        &test_config(&dir),
        site.clone(),
        escalator(Arc::new(UnavailableRenderer)),
    )
    .unwrap();
    engine.restore_or_seed(true).unwrap();
    let report = engine.run().await.unwrap();

    assert_eq!(engine.frontier().discovered_len(), 3);
    assert_eq!(engine.frontier().done_len(), 3);
    assert!(engine.frontier().is_drained());
    assert!(!engine.frontier().is_discovered("https://external.example/page.html"));
    assert_eq!(site.requests_for("https://external.example/page.html"), 0);

    assert_eq!(report.completed, 3);
    assert_eq!(report.links_enqueued, 2);
    assert!(!report.interrupted);

    let home = engine.store().get(HOME).unwrap();
    assert_eq!(home.kind, ResourceKind::Html);
    assert_eq!(
        home.outbound_links,
        vec![
            "https://astra.example/de/a.html".to_string(),
            "https://astra.example/de/b.html".to_string(),
        ]
    );
    assert!(dir.path().join("html/home.html").is_file());
}

#[tokio::test]
async fn test_scenario_b_gated_page_not_in_force() {
    let dir = TempDir::new().unwrap();
    let gated = "https://astra.example/de/sr/741.html";
    let site = Arc::new(
        FakeSite::default()
            .page(HOME, "text/html", r#"<a href="/de/sr/741.html">SR 741</a>"#)
            .page(
                gated,
                "text/html",
                "<body><p>Diese Seite ist\n\nnur mit einem Javascript-fähigen Browser nutzbar.</p></body>",
            ),
    );
    let renderer = Arc::new(StatusRenderer {
        banner: "Dieser Text ist nicht in Kraft",
        renders: AtomicUsize::new(0),
    });

    let mut engine =
        CrawlEngine::new(&test_config(&dir), site, escalator(renderer.clone())).unwrap();
    engine.restore_or_seed(true).unwrap();
    let report = engine.run().await.unwrap();

    let entry = engine.store().get(gated).unwrap();
    assert_eq!(entry.kind, ResourceKind::Other);
    assert!(entry.outbound_links.is_empty());
    assert_eq!(
        entry.escalation.as_ref().map(|e| e.status),
        Some(LegalStatus::NotInForce)
    );
    assert_eq!(renderer.renders.load(Ordering::SeqCst), 1);
    assert_eq!(report.completed, 2);
    assert_eq!(report.legal_documents, 0);
}

#[tokio::test]
async fn test_gated_page_in_force_resolves_document() {
    let dir = TempDir::new().unwrap();
    let gated = "https://astra.example/de/sr/741.html";

    struct InForceRenderer;

    #[async_trait]
    impl Renderer for InForceRenderer {
        async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
            Ok(RenderedPage {
                html: r#"
                    <app-in-force-status>Dieser Text ist in Kraft</app-in-force-status>
                    <div class="well well-white"><h4>Alle Fassungen</h4><table><tr>
                        <td><span class="soft-green">01.02.2024</span></td>
                        <td><a href="/filestore/741.xml" aria-label="XML">XML</a></td>
                    </tr></table></div>"#
                    .to_string(),
                final_url: format!("{}#final", url),
            })
        }
    }

    let site = Arc::new(
        FakeSite::default()
            .page(HOME, "text/html", r#"<a href="/de/sr/741.html">SR 741</a>"#)
            .page(gated, "text/html", "<p>nur mit einem Javascript-fähigen Browser</p>")
            .page("https://astra.example/filestore/741.xml", "application/xml", "<akomaNtoso><p>Art. 1</p></akomaNtoso>"),
    );

    let mut engine =
        CrawlEngine::new(&test_config(&dir), site, escalator(Arc::new(InForceRenderer))).unwrap();
    engine.restore_or_seed(true).unwrap();
    let report = engine.run().await.unwrap();

    let entry = engine.store().get(gated).unwrap();
    assert_eq!(entry.kind, ResourceKind::Legal);
    assert_eq!(
        entry.outbound_links,
        vec!["https://astra.example/de/sr/741.html#final".to_string()]
    );
    let escalation = entry.escalation.as_ref().unwrap();
    assert_eq!(escalation.resolved_url, "https://astra.example/filestore/741.xml");
    assert_eq!(escalation.publication_date.as_deref(), Some("01.02.2024"));
    assert_eq!(entry.fingerprint, fingerprint(Payload::Text("Art. 1")));

    // The final URI is recorded but never crawled
    assert!(!engine.frontier().is_discovered("https://astra.example/de/sr/741.html#final"));
    assert_eq!(report.legal_documents, 1);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("legal/crawled_legaldoc_0.xml")).unwrap(),
        "<akomaNtoso><p>Art. 1</p></akomaNtoso>"
    );
}

#[tokio::test]
async fn test_scenario_c_exhausted_retries_skip_and_continue() {
    let dir = TempDir::new().unwrap();
    let broken = "https://astra.example/de/broken.html";
    let site = Arc::new(
        FakeSite::default()
            .page(
                HOME,
                "text/html",
                r#"<a href="/de/broken.html">x</a><a href="/de/ok.html">y</a>"#,
            )
            .page("https://astra.example/de/ok.html", "text/html", "<p>ok</p>"),
    );

    let mut engine = CrawlEngine::new(
        &test_config(&dir),
        site.clone(),
        escalator(Arc::new(UnavailableRenderer)),
    )
    .unwrap();
    engine.restore_or_seed(true).unwrap();
    let report = engine.run().await.unwrap();

    // One retry: two attempts in a row
    assert_eq!(site.requests_for(broken), 2);
    assert_eq!(report.completed, 2);
    assert_eq!(report.skipped, 1);

    let skip = engine.store().get_skip(broken).unwrap();
    assert_eq!(skip.attempts, 2);
    assert!(engine.store().get(broken).is_none());
    assert!(engine.frontier().is_done(broken));
    assert!(engine.store().contains("https://astra.example/de/ok.html"));
}

#[tokio::test]
async fn test_abort_policy_stops_crawl_with_checkpoint() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(FakeSite::default());

    let mut config = test_config(&dir);
    config.crawler.on_exhausted = ExhaustedPolicy::Abort;

    let mut engine =
        CrawlEngine::new(&config, site, escalator(Arc::new(UnavailableRenderer))).unwrap();
    engine.restore_or_seed(true).unwrap();

    let result = engine.run().await;
    assert!(matches!(result, Err(CrawlError::Transport { .. })));
    assert!(load_checkpoint(&engine.layout().checkpoint_path())
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_resume_does_not_refetch_done_urls() {
    let dir = TempDir::new().unwrap();
    let pages = || {
        FakeSite::default()
            .page(HOME, "text/html", r#"<a href="/de/a.html">A</a>"#)
            .page("https://astra.example/de/a.html", "text/html", "<p>A</p>")
    };

    let first_site = Arc::new(pages());
    let mut first = CrawlEngine::new(
        &test_config(&dir),
        first_site.clone(),
        escalator(Arc::new(UnavailableRenderer)),
    )
    .unwrap();
    first.restore_or_seed(true).unwrap();
    first.run().await.unwrap();
    assert_eq!(first_site.total_requests(), 2);

    let second_site = Arc::new(pages());
    let mut second = CrawlEngine::new(
        &test_config(&dir),
        second_site.clone(),
        escalator(Arc::new(UnavailableRenderer)),
    )
    .unwrap();
    assert!(second.restore_or_seed(false).unwrap());
    assert_eq!(second.store(), first.store());

    let report = second.run().await.unwrap();
    assert_eq!(report.completed, 0);
    assert_eq!(second_site.total_requests(), 0);
}

#[tokio::test]
async fn test_shutdown_keeps_in_flight_urls_pending() {
    let dir = TempDir::new().unwrap();
    let slow = "https://astra.example/de/slow.html";
    let site = Arc::new(
        FakeSite::default()
            .page(HOME, "text/html", r#"<a href="/de/slow.html">slow</a>"#)
            .hang_on(slow),
    );

    let mut engine = CrawlEngine::new(
        &test_config(&dir),
        site,
        escalator(Arc::new(UnavailableRenderer)),
    )
    .unwrap();
    engine.restore_or_seed(true).unwrap();

    let report = engine
        .run_until(tokio::time::sleep(Duration::from_millis(200)))
        .await
        .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.completed, 1);

    let state = load_checkpoint(&engine.layout().checkpoint_path())
        .unwrap()
        .unwrap();
    assert_eq!(state.frontier.pending, vec![slow.to_string()]);
    assert_eq!(state.frontier.done, vec![HOME.to_string()]);
}

#[tokio::test]
async fn test_http_fetcher_end_to_end() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/astra/de/home.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(
                    r#"<a href="bericht.pdf">Bericht</a><a href="/astra/fr/home.html">FR</a>"#,
                ),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/astra/de/bericht.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(b"%PDF-1.7".to_vec()),
        )
        .mount(&server)
        .await;

    let home = format!("{}/astra/de/home.html", server.uri());
    let mut config = test_config(&dir);
    config.crawler.start_urls = vec![home.clone()];
    config.filter.pattern = "astra/de".to_string();

    let fetcher = Arc::new(HttpFetcher::new(&config.crawler).unwrap());
    let mut engine =
        CrawlEngine::new(&config, fetcher, escalator(Arc::new(UnavailableRenderer))).unwrap();
    engine.restore_or_seed(true).unwrap();
    let report = engine.run().await.unwrap();

    assert_eq!(report.completed, 2);
    assert_eq!(
        engine.store().get(&home).unwrap().outbound_links,
        vec![format!("{}/astra/de/bericht.pdf", server.uri())]
    );
    assert_eq!(std::fs::read(dir.path().join("pdf/bericht.pdf")).unwrap(), b"%PDF-1.7");

    let state = load_checkpoint(&engine.layout().checkpoint_path())
        .unwrap()
        .unwrap();
    assert_eq!(&state.store, engine.store());
}
