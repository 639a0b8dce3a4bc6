pub mod browser;
pub mod extractor;
pub mod fields;
pub mod http;
pub mod traits;
pub mod types;

pub use browser::ChromePageSource;
pub use extractor::{PageExtractor, PostingSelectors};
pub use http::HttpPageSource;
pub use traits::PageSource;
pub use types::{PageRange, RenderTiming, ScrapeTarget};
