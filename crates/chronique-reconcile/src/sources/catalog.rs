use std::time::Duration;

use async_trait::async_trait;
use chronique_core::FetchConfig;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::error::Result;
use crate::sources::CanonicalSource;

static OG_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).expect("valid selector"));
static OG_PUBLISHER: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="books:publisher"]"#).expect("valid selector"));
static ITEMPROP_PUBLISHER: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[itemprop="publisher"]"#).expect("valid selector"));
static PAGE_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid selector"));

/// Fetches canonical title/publisher from the catalog page behind an
/// identity key. Network-bound; every request carries the configured
/// timeout so a dead catalog degrades a merge instead of stalling the
/// whole batch.
pub struct CatalogSource {
    client: reqwest::Client,
}

impl CatalogSource {
    pub fn new(cfg: &FetchConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(&cfg.user_agent)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .gzip(true)
            .build()
            .expect("failed to build reqwest client");
        Self { client }
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let response = response.error_for_status()?;
        Ok(response.text().await?)
    }

    fn meta_content(doc: &Html, selector: &Selector) -> Option<String> {
        doc.select(selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
    }

    fn extract_title(doc: &Html) -> Option<String> {
        Self::meta_content(doc, &OG_TITLE).or_else(|| {
            doc.select(&PAGE_TITLE)
                .next()
                .map(|el| el.text().collect::<String>())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
    }

    fn extract_publisher(doc: &Html) -> Option<String> {
        Self::meta_content(doc, &OG_PUBLISHER).or_else(|| {
            doc.select(&ITEMPROP_PUBLISHER)
                .next()
                .map(|el| {
                    el.value()
                        .attr("content")
                        .map(ToOwned::to_owned)
                        .unwrap_or_else(|| el.text().collect::<String>())
                })
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
    }
}

#[async_trait]
impl CanonicalSource for CatalogSource {
    async fn fetch_title(&self, identity_key: &str) -> Option<String> {
        match self.fetch_page(identity_key).await {
            Ok(body) => Self::extract_title(&Html::parse_document(&body)),
            Err(err) => {
                tracing::warn!(identity_key, error = %err, "title fetch failed, using local data");
                None
            }
        }
    }

    async fn fetch_publisher(&self, identity_key: &str) -> Option<String> {
        match self.fetch_page(identity_key).await {
            Ok(body) => Self::extract_publisher(&Html::parse_document(&body)),
            Err(err) => {
                tracing::warn!(identity_key, error = %err, "publisher fetch failed, using local data");
                None
            }
        }
    }
}
