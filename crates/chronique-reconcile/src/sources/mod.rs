use async_trait::async_trait;

pub mod catalog;

pub use catalog::CatalogSource;

/// Authoritative bibliographic source, addressed by identity key
/// (a catalog URL). Implementations degrade to `None` on network
/// failure instead of raising; the merge protocol falls back to
/// local data.
#[async_trait]
pub trait CanonicalSource: Send + Sync {
    async fn fetch_title(&self, identity_key: &str) -> Option<String>;
    async fn fetch_publisher(&self, identity_key: &str) -> Option<String>;
}
