use crate::error::ScoutError;
use crate::models::ListingKind;
use crate::pipeline::Tables;
use dotenvy::dotenv;
use std::env;

/// Credentials and table names loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_key: String,
    pub google_maps_api_key: Option<String>,
    pub listings_table_buy: String,
    pub listings_table_rent: String,
    pub log_table: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ScoutError> {
        // Load .env file if present
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ScoutError> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ScoutError::config(format!("{key} must be set")))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            supabase_url: required("SUPABASE_URL")?,
            supabase_key: required("SUPABASE_KEY")?,
            google_maps_api_key: lookup("GOOGLE_MAPS_API_KEY").filter(|v| !v.trim().is_empty()),
            listings_table_buy: or_default("LISTINGS_TABLE_BUY", "imoveis_venda"),
            listings_table_rent: or_default("LISTINGS_TABLE_RENT", "imoveis_aluguel"),
            log_table: or_default("SCRAPE_LOG_TABLE", "scrape_log"),
        })
    }

    /// Geocoding key, only needed when enrichment is on
    pub fn geocoding_key(&self) -> Result<String, ScoutError> {
        self.google_maps_api_key
            .clone()
            .ok_or_else(|| ScoutError::config("GOOGLE_MAPS_API_KEY must be set to geocode"))
    }

    pub fn tables(&self, kind: ListingKind) -> Tables {
        let listings = match kind {
            ListingKind::Buy => &self.listings_table_buy,
            ListingKind::Rent => &self.listings_table_rent,
        };
        Tables {
            listings: listings.clone(),
            log: self.log_table.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ScoutError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn missing_credentials_fail_fast() {
        let err = config(&[("SUPABASE_URL", "https://x.supabase.co")]).unwrap_err();
        assert!(matches!(err, ScoutError::Configuration(ref m) if m.contains("SUPABASE_KEY")));

        assert!(config(&[("SUPABASE_URL", " "), ("SUPABASE_KEY", "k")]).is_err());
    }

    #[test]
    fn table_names_default_per_kind() {
        let cfg = config(&[("SUPABASE_URL", "https://x.supabase.co"), ("SUPABASE_KEY", "k")]).unwrap();

        assert_eq!(cfg.tables(ListingKind::Buy).listings, "imoveis_venda");
        assert_eq!(cfg.tables(ListingKind::Rent).listings, "imoveis_aluguel");
        assert_eq!(cfg.tables(ListingKind::Rent).log, "scrape_log");
        assert!(cfg.geocoding_key().is_err());
    }

    #[test]
    fn overrides_are_read() {
        let cfg = config(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_KEY", "k"),
            ("LISTINGS_TABLE_BUY", "venda_teste"),
            ("GOOGLE_MAPS_API_KEY", "g"),
        ])
        .unwrap();

        assert_eq!(cfg.tables(ListingKind::Buy).listings, "venda_teste");
        assert_eq!(cfg.geocoding_key().unwrap(), "g");
    }
}
