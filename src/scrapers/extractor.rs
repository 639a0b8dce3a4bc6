use crate::error::ScoutError;
use crate::models::Listing;
use crate::scrapers::fields;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

/// CSS selectors for one posting card. Everything except `posting` is
/// matched inside the posting container.
#[derive(Debug, Clone)]
pub struct PostingSelectors {
    pub posting: String,
    /// Attribute of the posting container holding the relative posting path
    pub link_attr: String,
    pub image: String,
    pub location: String,
    pub address: String,
    pub features: String,
    pub price: String,
}

impl Default for PostingSelectors {
    fn default() -> Self {
        Self {
            posting: r#"[data-qa="posting PROPERTY"]"#.to_string(),
            link_attr: "data-to-posting".to_string(),
            image: ".flickity-slider img".to_string(),
            location: r#"[data-qa="POSTING_CARD_LOCATION"]"#.to_string(),
            address: ".sc-ge2uzh-0".to_string(),
            features: r#"[data-qa="POSTING_CARD_FEATURES"]"#.to_string(),
            price: r#".sc-12dh9kl-0, [data-qa="POSTING_CARD_PRICE"]"#.to_string(),
        }
    }
}

struct CompiledSelectors {
    posting: Selector,
    image: Selector,
    location: Selector,
    address: Selector,
    features: Selector,
    price: Selector,
}

/// Turns a rendered results page into listings, one posting card at a time.
pub struct PageExtractor {
    selectors: CompiledSelectors,
    link_attr: String,
    base_url: String,
}

impl PageExtractor {
    pub fn new(selectors: PostingSelectors, base_url: impl Into<String>) -> Result<Self, ScoutError> {
        Ok(Self {
            selectors: CompiledSelectors {
                posting: compile(&selectors.posting)?,
                image: compile(&selectors.image)?,
                location: compile(&selectors.location)?,
                address: compile(&selectors.address)?,
                features: compile(&selectors.features)?,
                price: compile(&selectors.price)?,
            },
            link_attr: selectors.link_attr,
            base_url: base_url.into(),
        })
    }

    /// Extract every posting on the page.
    ///
    /// Sub-elements are looked up inside each posting container, so a card
    /// missing one of them cannot shift data between postings. Such a card
    /// fails the whole page with `ExtractionMismatch`.
    pub fn extract(&self, html: &str, page: u32) -> Result<Vec<Listing>, ScoutError> {
        let document = Html::parse_document(html);
        let postings: Vec<ElementRef> = document.select(&self.selectors.posting).collect();
        info!(page, postings = postings.len(), "Found posting cards");

        postings
            .into_iter()
            .enumerate()
            .map(|(idx, posting)| self.extract_posting(posting, page, idx))
            .collect()
    }

    fn extract_posting(&self, posting: ElementRef, page: u32, idx: usize) -> Result<Listing, ScoutError> {
        let mismatch = |field: &'static str| ScoutError::ExtractionMismatch {
            page,
            posting: idx,
            field,
        };

        let href = posting
            .value()
            .attr(&self.link_attr)
            .filter(|href| !href.trim().is_empty())
            .ok_or_else(|| mismatch("link"))?;

        let location = first_text(posting, &self.selectors.location).ok_or_else(|| mismatch("location"))?;
        let address = first_text(posting, &self.selectors.address).ok_or_else(|| mismatch("address"))?;
        let features = first_text(posting, &self.selectors.features).ok_or_else(|| mismatch("features"))?;
        let price = first_text(posting, &self.selectors.price).ok_or_else(|| mismatch("price"))?;

        let image_url = posting
            .select(&self.selectors.image)
            .next()
            .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .map(str::to_string);

        debug!(page, posting = idx, %features, %price, "Parsing posting");

        let (price_brl, condo_fee_brl) = fields::parse_price_condo(&price);

        Ok(Listing {
            price_brl,
            condo_fee_brl,
            district: fields::split_district(&location),
            address: fields::split_address(&address),
            area_m2: fields::parse_area(&features),
            bedrooms: fields::parse_bedrooms(&features),
            bathrooms: fields::parse_bathrooms(&features),
            parking_spaces: fields::parse_parking(&features),
            image_url,
            listing_url: format!("{}{}", self.base_url, href.trim()),
            regional: None,
            latitude: None,
            longitude: None,
        })
    }
}

fn compile(selector: &str) -> Result<Selector, ScoutError> {
    Selector::parse(selector).map_err(|e| ScoutError::Selector {
        selector: selector.to_string(),
        reason: format!("{:?}", e),
    })
}

/// Text of the first match inside `scope`, text nodes joined by single spaces
fn first_text(scope: ElementRef, selector: &Selector) -> Option<String> {
    scope.select(selector).next().map(element_text)
}

fn element_text(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scrapers::types::BASE_URL;

    pub(crate) fn posting_card(path: &str, district: &str, price: &str, features: Option<&str>) -> String {
        let features = features
            .map(|f| format!(r#"<h3 data-qa="POSTING_CARD_FEATURES"><span>{f}</span></h3>"#))
            .unwrap_or_default();
        format!(
            r#"<div data-qa="posting PROPERTY" data-to-posting="{path}">
                 <div class="flickity-slider"><img src="https://img.example{path}.jpg"></div>
                 <div class="sc-12dh9kl-0">{price}</div>
                 <div class="sc-ge2uzh-0">Rua Pernambuco, 1000</div>
                 <h2 data-qa="POSTING_CARD_LOCATION">{district}, Belo Horizonte</h2>
                 {features}
               </div>"#
        )
    }

    pub(crate) fn results_page(cards: &[String]) -> String {
        format!("<html><body><main>{}</main></body></html>", cards.concat())
    }

    fn extractor() -> PageExtractor {
        PageExtractor::new(PostingSelectors::default(), BASE_URL).unwrap()
    }

    #[test]
    fn extracts_each_posting() {
        let html = results_page(&[
            posting_card(
                "/propriedades/apto-1.html",
                "Savassi",
                "R$ 2.500<br>R$ 450 Condominio",
                Some("2 quartos 80 m² 1 ban 1 vagas"),
            ),
            posting_card("/propriedades/apto-2.html", "Buritis", "R$ 3.100", Some("3 quartos 95 m²")),
        ]);

        let listings = extractor().extract(&html, 1).unwrap();
        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.price_brl, Some(2500));
        assert_eq!(first.condo_fee_brl, Some(450));
        assert_eq!(first.district.as_deref(), Some("Savassi"));
        assert_eq!(first.address.as_deref(), Some("Rua Pernambuco"));
        assert_eq!(first.area_m2, Some(80.0));
        assert_eq!(first.bedrooms, Some(2));
        assert_eq!(first.bathrooms, Some(1));
        assert_eq!(first.parking_spaces, 1);
        assert_eq!(
            first.image_url.as_deref(),
            Some("https://img.example/propriedades/apto-1.html.jpg")
        );
        assert_eq!(
            first.listing_url,
            "https://www.imovelweb.com.br/propriedades/apto-1.html"
        );

        let second = &listings[1];
        assert_eq!(second.condo_fee_brl, None);
        assert_eq!(second.bathrooms, None);
        assert_eq!(second.parking_spaces, 0);
    }

    #[test]
    fn missing_feature_block_fails_the_page() {
        let mut cards: Vec<String> = (1..=5)
            .map(|i| {
                posting_card(
                    &format!("/propriedades/apto-{i}.html"),
                    "Sion",
                    "R$ 1.900",
                    Some("2 quartos 60 m² 1 ban"),
                )
            })
            .collect();
        cards[3] = posting_card("/propriedades/apto-4.html", "Sion", "R$ 1.900", None);

        let err = extractor().extract(&results_page(&cards), 7).unwrap_err();
        match err {
            ScoutError::ExtractionMismatch { page, posting, field } => {
                assert_eq!(page, 7);
                assert_eq!(posting, 3);
                assert_eq!(field, "features");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_image_is_tolerated() {
        let html = results_page(&[r#"<div data-qa="posting PROPERTY" data-to-posting="/p/1.html">
                <div class="sc-12dh9kl-0">R$ 900</div>
                <div class="sc-ge2uzh-0">Rua Sergipe</div>
                <h2 data-qa="POSTING_CARD_LOCATION">Funcionários</h2>
                <h3 data-qa="POSTING_CARD_FEATURES">1 quarto 40 m²</h3>
            </div>"#
            .to_string()]);

        let listings = extractor().extract(&html, 1).unwrap();
        assert_eq!(listings[0].image_url, None);
        assert_eq!(listings[0].address.as_deref(), Some("Rua Sergipe"));
        assert_eq!(listings[0].district.as_deref(), Some("Funcionários"));
    }

    #[test]
    fn posting_without_link_is_a_mismatch() {
        let html = results_page(&[r#"<div data-qa="posting PROPERTY">
                <div class="sc-12dh9kl-0">R$ 900</div>
            </div>"#
            .to_string()]);

        assert!(matches!(
            extractor().extract(&html, 2),
            Err(ScoutError::ExtractionMismatch { field: "link", .. })
        ));
    }

    #[test]
    fn page_without_postings_is_empty() {
        let listings = extractor().extract("<html><body>Nada encontrado</body></html>", 9).unwrap();
        assert!(listings.is_empty());
    }

    #[test]
    fn invalid_selector_is_reported() {
        let selectors = PostingSelectors {
            features: "[[nope".to_string(),
            ..PostingSelectors::default()
        };
        assert!(matches!(
            PageExtractor::new(selectors, BASE_URL),
            Err(ScoutError::Selector { .. })
        ));
    }
}
