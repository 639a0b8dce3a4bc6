use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::ScoutError;

/// Brasília time (UTC-03:00), the offset stored in `created_at`
const BRASILIA_OFFSET_SECS: i32 = 3 * 3600;

/// Current time at the Brasília offset
pub fn brasilia_now() -> DateTime<FixedOffset> {
    let offset = FixedOffset::west_opt(BRASILIA_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&offset)
}

/// Which listing section of the site is scraped
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Buy,
    Rent,
}

impl FromStr for ListingKind {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "venda" => Ok(Self::Buy),
            "rent" | "aluguel" => Ok(Self::Rent),
            other => Err(ScoutError::config(format!(
                "unknown listing kind `{other}` (expected buy or rent)"
            ))),
        }
    }
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Rent => write!(f, "rent"),
        }
    }
}

/// URL template family: every listing, or only the ones published in the last day
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UrlVariant {
    Normal,
    LastDay,
}

impl FromStr for UrlVariant {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "last-day" | "last_day" | "lastday" => Ok(Self::LastDay),
            other => Err(ScoutError::config(format!(
                "unknown URL variant `{other}` (expected normal or last-day)"
            ))),
        }
    }
}

impl fmt::Display for UrlVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::LastDay => write!(f, "last-day"),
        }
    }
}

/// One scraped posting.
///
/// Column names follow the tabular file layout and are shared with the remote
/// listings table. `parking_spaces` defaults to 0 while bedrooms and bathrooms
/// stay `None` when the posting does not mention them: no parking is a fact,
/// a missing bedroom count is not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(rename = "price(R$)")]
    pub price_brl: Option<i64>,
    #[serde(rename = "condo(R$)")]
    pub condo_fee_brl: Option<i64>,
    pub district: Option<String>,
    pub address: Option<String>,
    #[serde(rename = "area(m²)")]
    pub area_m2: Option<f64>,
    #[serde(rename = "bedroom")]
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    #[serde(rename = "parkings", default)]
    pub parking_spaces: u32,
    #[serde(rename = "url(image)")]
    pub image_url: Option<String>,
    #[serde(rename = "url(apt)")]
    pub listing_url: String,
    #[serde(default)]
    pub regional: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Equality key over the extracted fields only
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingIdentity {
    price_brl: Option<i64>,
    condo_fee_brl: Option<i64>,
    district: Option<String>,
    address: Option<String>,
    area_bits: Option<u64>,
    bedrooms: Option<u32>,
    bathrooms: Option<u32>,
    parking_spaces: u32,
    image_url: Option<String>,
    listing_url: String,
}

impl Listing {
    pub fn identity(&self) -> ListingIdentity {
        ListingIdentity {
            price_brl: self.price_brl,
            condo_fee_brl: self.condo_fee_brl,
            district: self.district.clone(),
            address: self.address.clone(),
            area_bits: self.area_m2.map(f64::to_bits),
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            parking_spaces: self.parking_spaces,
            image_url: self.image_url.clone(),
            listing_url: self.listing_url.clone(),
        }
    }

    /// SHA-256 hex digest of the extracted fields, used as the remote natural key
    pub fn listing_key(&self) -> String {
        let parts = [
            opt(&self.price_brl),
            opt(&self.condo_fee_brl),
            opt(&self.district),
            opt(&self.address),
            opt(&self.area_m2),
            opt(&self.bedrooms),
            opt(&self.bathrooms),
            self.parking_spaces.to_string(),
            opt(&self.image_url),
            self.listing_url.clone(),
        ];

        let mut hasher = Sha256::new();
        for part in &parts {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        hex::encode(hasher.finalize())
    }
}

fn opt<T: fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "\u{0}".to_string(),
    }
}

/// A listing as written to the remote listings table
#[derive(Debug, Clone, Serialize)]
pub struct StoredListing {
    pub id: i64,
    pub listing_key: String,
    pub created_at: DateTime<FixedOffset>,
    #[serde(flatten)]
    pub listing: Listing,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Complete,
    Failed,
}

/// Audit record for one pipeline invocation
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub pages: String,
    pub url_variant: UrlVariant,
    pub listing_kind: ListingKind,
    pub rows_added: usize,
    pub error: Option<String>,
    pub started_at: DateTime<FixedOffset>,
    pub completed_at: Option<DateTime<FixedOffset>>,
    pub status: RunStatus,
}

impl RunSummary {
    pub fn start(
        pages: String,
        url_variant: UrlVariant,
        listing_kind: ListingKind,
        started_at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            pages,
            url_variant,
            listing_kind,
            rows_added: 0,
            error: None,
            started_at,
            completed_at: None,
            status: RunStatus::Complete,
        }
    }

    /// Keep the first error seen during the run
    pub fn note_error(&mut self, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(message.into());
        }
    }

    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.completed_at = Some(brasilia_now());
    }
}

/// A failure recorded in the remote log table
#[derive(Debug, Clone, Serialize)]
pub struct ErrorLogEntry {
    pub context: String,
    pub message: String,
    pub created_at: DateTime<FixedOffset>,
}

/// Rows of the shared run-summary / error log table
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "entry", rename_all = "lowercase")]
pub enum LogRecord {
    Run(RunSummary),
    Error(ErrorLogEntry),
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample() -> Listing {
        Listing {
            price_brl: Some(2500),
            condo_fee_brl: Some(450),
            district: Some("Savassi".to_string()),
            address: Some("Rua Pernambuco".to_string()),
            area_m2: Some(80.0),
            bedrooms: Some(2),
            bathrooms: Some(1),
            parking_spaces: 1,
            image_url: None,
            listing_url: "https://www.imovelweb.com.br/propriedades/apto-1.html".to_string(),
            regional: None,
            latitude: None,
            longitude: None,
        }
    }

    #[test]
    fn listing_key_ignores_derived_fields() {
        let plain = sample();
        let mut enriched = sample();
        enriched.regional = Some("Centro-sul".to_string());
        enriched.latitude = Some(-19.93);
        enriched.longitude = Some(-43.93);

        assert_eq!(plain.listing_key(), enriched.listing_key());
        assert_eq!(plain.identity(), enriched.identity());
        assert_eq!(plain.listing_key().len(), 64);
    }

    #[test]
    fn listing_key_distinguishes_missing_from_empty() {
        let mut a = sample();
        a.address = None;
        let mut b = sample();
        b.address = Some(String::new());

        assert_ne!(a.listing_key(), b.listing_key());
    }

    #[test]
    fn parses_kind_and_variant() {
        assert_eq!("buy".parse::<ListingKind>().unwrap(), ListingKind::Buy);
        assert_eq!("Aluguel".parse::<ListingKind>().unwrap(), ListingKind::Rent);
        assert_eq!("last-day".parse::<UrlVariant>().unwrap(), UrlVariant::LastDay);
        assert!(matches!(
            "weekly".parse::<UrlVariant>(),
            Err(ScoutError::Configuration(_))
        ));
    }

    #[test]
    fn log_records_are_tagged() {
        let summary = RunSummary::start("3-5".into(), UrlVariant::Normal, ListingKind::Rent, brasilia_now());
        let value = serde_json::to_value(LogRecord::Run(summary)).unwrap();

        assert_eq!(value["entry"], "run");
        assert_eq!(value["listing_kind"], "rent");
        assert_eq!(value["url_variant"], "normal");
        assert_eq!(value["status"], "complete");
    }

    #[test]
    fn stored_listing_flattens_columns() {
        let stored = StoredListing {
            id: 7,
            listing_key: sample().listing_key(),
            created_at: brasilia_now(),
            listing: sample(),
        };
        let value = serde_json::to_value(&stored).unwrap();

        assert_eq!(value["id"], 7);
        assert_eq!(value["price(R$)"], 2500);
        assert_eq!(value["parkings"], 1);
        assert!(value["created_at"].as_str().unwrap().ends_with("-03:00"));
    }
}
