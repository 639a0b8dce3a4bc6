use anyhow::Result;
use async_trait::async_trait;

/// Something that can turn a search page URL into its rendered HTML.
/// Lets the pipeline run against headless Chrome, plain HTTP, or canned pages.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the fully rendered HTML of a page
    async fn fetch(&self, url: &str) -> Result<String>;

    /// Get the name of the page source
    fn source_name(&self) -> &'static str;
}
