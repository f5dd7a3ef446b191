//! Integration tests for the crawler
//!
//! These tests drive full crawls through the public API: wiremock serves
//! the web side, tempfile holds the local trees and databases.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use sumi_trawl::config::{parse_config, Config};
use sumi_trawl::crawler::{run_crawl, ContentHandlerFactory, RunOptions};
use sumi_trawl::output::{load_statistics, ContentSink, MemorySink, SinkResult, SqliteSink};
use sumi_trawl::source::{AdapterRegistry, ContentStream, FilesystemAdapter, FilesystemOptions};
use sumi_trawl::tracker::MemoryChangeTracker;
use sumi_trawl::{
    CancellationToken, CrawlContext, CrawlEngine, DataEntity, DomainFilter, ModificationState,
    SourceKind,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing into `dir`
fn create_test_config(dir: &TempDir, crawler: &str, filter: &str, sources: &[(&str, String)]) -> Config {
    let sources: String = sources
        .iter()
        .map(|(kind, location)| {
            format!("[[source]]\nkind = \"{}\"\nlocation = \"{}\"\n\n", kind, location)
        })
        .collect();

    parse_config(&format!(
        r#"
[crawler]
{crawler}

[filter]
{filter}

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "{db}"
summary-path = "{summary}"

{sources}
"#,
        crawler = crawler,
        filter = filter,
        db = dir.path().join("trawl.db").display(),
        summary = dir.path().join("summary.md").display(),
        sources = sources,
    ))
    .expect("test config should be valid")
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_raw(body, "text/html")
}

async fn mount_site(server: &MockServer) {
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<html><head><title>Home</title></head><body>
            <a href="{0}/page1">Page 1</a>
            <a href="/private/secret">Secret</a>
            <a href="/feed.xml">Feed</a>
            </body></html>"#,
            base
        )))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html(r#"<a href="/page2">deeper</a>"#.to_string()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html(r#"<a href="/page3">too deep</a>"#.to_string()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(html("never".to_string()))
        .expect(0)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<rss><channel></channel></rss>", "application/rss+xml"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_mixed_sources_end_to_end() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let base = server.uri();

    let dir = TempDir::new().unwrap();
    let tree = dir.path().join("tree");
    std::fs::create_dir_all(tree.join("nested")).unwrap();
    std::fs::write(tree.join("notes.txt"), "some notes").unwrap();
    std::fs::write(tree.join("nested/deep.txt"), "deep").unwrap();

    let list = dir.path().join("targets.txt");
    std::fs::write(
        &list,
        format!("# targets\n{}/page1\n{}\n", base, tree.join("notes.txt").display()),
    )
    .unwrap();

    let config = create_test_config(
        &dir,
        "max-depth = 2",
        &format!("exclude = [\"{}/private\"]", base),
        &[
            ("hyperlink", format!("{}/", base)),
            ("filesystem", tree.display().to_string()),
            ("flat-list", list.display().to_string()),
        ],
    );

    let summary = run_crawl(&config, "itest", &RunOptions::default(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, "completed");
    assert_eq!(summary.reports.len(), 3);
    assert_eq!(summary.total_errors(), 0);

    // Site: /, /page1, /page2, /feed.xml; /private is filtered, /page3 is too deep
    let site = &summary.reports[0];
    assert_eq!(site.visited, 4);
    assert_eq!(site.filtered, 1);

    // Tree: root, nested/, deep.txt, notes.txt
    assert_eq!(summary.reports[1].visited, 4);

    // List: the list, /page1 and /page2 again (pages carry no fingerprint),
    // notes.txt unchanged since the tree crawl
    let listed = &summary.reports[2];
    assert_eq!(listed.visited, 4);
    assert_eq!(listed.materialized, 3);
    assert_eq!(listed.unmodified, 1);

    let sink = SqliteSink::open(&dir.path().join("trawl.db"), 0).unwrap();
    let stats = load_statistics(&sink, summary.run_id).unwrap();
    assert_eq!(stats.count(ModificationState::Error), 0);
    assert_eq!(stats.records_by_kind.get("hyperlink"), Some(&6));

    let markdown = std::fs::read_to_string(dir.path().join("summary.md")).unwrap();
    assert!(markdown.contains("# Sumi-Trawl Crawl Summary"));
}

#[tokio::test]
async fn test_broken_pages_become_error_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/ok">ok</a><a href="/gone">gone</a><a href="/flaky">flaky</a>"#.to_string(),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(html("fine".to_string()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "", "", &[("hyperlink", server.uri())]);

    let summary = run_crawl(&config, "itest", &RunOptions::default(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.total_errors(), 2);
    assert_eq!(summary.total_materialized(), 2);

    let sink = SqliteSink::open(&dir.path().join("trawl.db"), 0).unwrap();
    let stats = load_statistics(&sink, summary.run_id).unwrap();
    assert_eq!(stats.count(ModificationState::Error), 2);
    assert!(stats.sample_errors.iter().any(|(id, msg)| id.ends_with("/gone") && msg.contains("404")));
}

/// Sink that cancels the crawl after a fixed number of accepted records
struct CancellingSink {
    inner: MemorySink,
    after: usize,
    seen: AtomicUsize,
    token: CancellationToken,
}

#[async_trait]
impl ContentSink for CancellingSink {
    async fn accept(&self, entity: DataEntity, content: Option<ContentStream>) -> SinkResult<()> {
        self.inner.accept(entity, content).await?;
        if self.seen.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.token.cancel();
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_cancellation_stops_large_directory() {
    let dir = TempDir::new().unwrap();
    for i in 0..200 {
        std::fs::write(dir.path().join(format!("file-{:03}.txt", i)), "x").unwrap();
    }

    let token = CancellationToken::new();
    let sink = Arc::new(CancellingSink {
        inner: MemorySink::new(),
        after: 10,
        seen: AtomicUsize::new(0),
        token: token.clone(),
    });

    let registry = AdapterRegistry::new().with(Arc::new(FilesystemAdapter::new(
        FilesystemOptions::default(),
    )));
    let engine = CrawlEngine::new(registry, Arc::new(MemoryChangeTracker::new()));
    let ctx = CrawlContext::new(ContentHandlerFactory::shared(sink.clone()))
        .with_cancellation(token.clone());

    let root = FilesystemAdapter::root_entity(dir.path()).unwrap();
    let report = engine.run(root, &ctx).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.materialized, 10);
    assert_eq!(sink.inner.records().len(), 10);
    assert!(token.is_settled());
}

#[tokio::test]
async fn test_filter_applies_to_filesystem_prefixes() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("keep")).unwrap();
    std::fs::create_dir_all(dir.path().join("skip")).unwrap();
    std::fs::write(dir.path().join("keep/a.txt"), "a").unwrap();
    std::fs::write(dir.path().join("skip/b.txt"), "b").unwrap();

    let filter = DomainFilter::new(&[], &[dir.path().join("skip").display().to_string()]).unwrap();
    let registry = AdapterRegistry::new().with(Arc::new(FilesystemAdapter::new(
        FilesystemOptions::default(),
    )));
    let engine = CrawlEngine::new(registry, Arc::new(MemoryChangeTracker::new()));
    let sink = Arc::new(MemorySink::new());
    let ctx = CrawlContext::new(ContentHandlerFactory::shared(sink.clone())).with_domain_filter(filter);

    let root = FilesystemAdapter::root_entity(dir.path()).unwrap();
    let report = engine.run(root, &ctx).await.unwrap();

    assert_eq!(report.filtered, 1);
    assert!(sink.records().iter().all(|r| r.entity.kind == SourceKind::Filesystem));
    assert!(sink
        .find(&dir.path().join("keep/a.txt").display().to_string())
        .is_some());
    assert!(sink
        .find(&dir.path().join("skip/b.txt").display().to_string())
        .is_none());
}
