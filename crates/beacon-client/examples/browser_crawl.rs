/// Smoke-test for `ChromiumRenderer`.
///
/// Launches a headless Chromium, crawls <https://example.com> through the
/// full feature extractor, and prints the resulting snapshot.
///
/// Run with:
///   cargo run --example browser_crawl --features browser
use beacon_client::{ChromiumRenderer, FeatureExtractor};
use beacon_core::job::AnalysisOptions;
use beacon_core::traits::Crawler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    println!("Launching headless browser…");
    let renderer = ChromiumRenderer::new().await?;
    let extractor = FeatureExtractor::new(renderer);

    let url = "https://example.com";
    println!("Crawling {url} …");
    let snapshot = extractor.crawl(url, &AnalysisOptions::default()).await?;

    // Basic sanity checks
    assert_eq!(snapshot.performance.status_code, 200);
    assert!(
        snapshot.content.word_count > 0,
        "Expected visible prose on the page"
    );

    println!("OK — title: {:?}", snapshot.seo.title);
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
