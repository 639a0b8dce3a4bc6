use std::fmt;
use std::time::Duration;

use crate::error::ScoutError;
use crate::models::{ListingKind, UrlVariant};

/// Site base URL; posting links are relative to it
pub const BASE_URL: &str = "https://www.imovelweb.com.br";

/// Search page URLs for every listing kind and template variant
#[derive(Debug, Clone)]
pub struct ScrapeTarget {
    pub base_url: String,
    /// `{}` is replaced with the page number
    pub buy_template: String,
    pub rent_template: String,
    pub buy_last_day_template: String,
    pub rent_last_day_template: String,
}

impl Default for ScrapeTarget {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            buy_template: format!("{BASE_URL}/apartamentos-venda-belo-horizonte-mg-pagina-{{}}.html"),
            rent_template: format!("{BASE_URL}/apartamentos-aluguel-belo-horizonte-mg-pagina-{{}}.html"),
            buy_last_day_template: format!(
                "{BASE_URL}/apartamentos-venda-belo-horizonte-mg-publicado-hace-menos-de-1-dia-pagina-{{}}.html"
            ),
            rent_last_day_template: format!(
                "{BASE_URL}/apartamentos-aluguel-belo-horizonte-mg-publicado-hace-menos-de-1-dia-pagina-{{}}.html"
            ),
        }
    }
}

impl ScrapeTarget {
    pub fn page_url(&self, kind: ListingKind, variant: UrlVariant, page: u32) -> String {
        let template = match (kind, variant) {
            (ListingKind::Buy, UrlVariant::Normal) => &self.buy_template,
            (ListingKind::Rent, UrlVariant::Normal) => &self.rent_template,
            (ListingKind::Buy, UrlVariant::LastDay) => &self.buy_last_day_template,
            (ListingKind::Rent, UrlVariant::LastDay) => &self.rent_last_day_template,
        };
        template.replace("{}", &page.to_string())
    }
}

/// Pages to scrape: a single page, or `start..end` with `end` excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    start: u32,
    end: Option<u32>,
}

impl PageRange {
    pub fn new(start: u32, end: Option<u32>) -> Result<Self, ScoutError> {
        if start == 0 {
            return Err(ScoutError::config("start page cannot be zero"));
        }
        if let Some(end) = end {
            if end <= start {
                return Err(ScoutError::config(format!(
                    "end page {end} must be greater than start page {start}"
                )));
            }
        }
        Ok(Self { start, end })
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.last()
    }

    fn last(&self) -> u32 {
        // end > start, so this never underflows
        self.end.map_or(self.start, |end| end - 1)
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(_) => write!(f, "{}-{}", self.start, self.last()),
            None => write!(f, "{}", self.start),
        }
    }
}

/// Waits that let the results page finish client-side rendering
#[derive(Debug, Clone)]
pub struct RenderTiming {
    pub initial_wait: Duration,
    pub scroll_steps: u32,
    pub scroll_px: u32,
    pub step_wait: Duration,
}

impl Default for RenderTiming {
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_secs(6),
            scroll_steps: 17,
            scroll_px: 350,
            step_wait: Duration::from_millis(500),
        }
    }
}
