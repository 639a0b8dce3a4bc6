use crate::error::StoreError;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Remote tabular store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All rows of `table`, restricted to `columns` (comma separated)
    async fn select(&self, table: &str, columns: &str) -> Result<Vec<Value>, StoreError>;

    /// Insert `record`, or update the row it collides with on `on_conflict`
    async fn upsert(&self, table: &str, record: &Value, on_conflict: Option<&str>) -> Result<(), StoreError>;
}

/// Supabase (PostgREST) client
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(base_url: &str, api_key: String) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }
}

#[async_trait]
impl RemoteStore for SupabaseStore {
    async fn select(&self, table: &str, columns: &str) -> Result<Vec<Value>, StoreError> {
        let resp = self
            .client
            .get(self.endpoint(table))
            .query(&[("select", columns)])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let rows: Vec<Value> = check(resp).await?.json().await?;
        debug!(table, rows = rows.len(), "Selected remote rows");
        Ok(rows)
    }

    async fn upsert(&self, table: &str, record: &Value, on_conflict: Option<&str>) -> Result<(), StoreError> {
        let mut request = self
            .client
            .post(self.endpoint(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(record);

        if let Some(column) = on_conflict {
            request = request.query(&[("on_conflict", column)]);
        }

        check(request.send().await?).await?;
        Ok(())
    }
}

async fn check(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = resp.text().await.unwrap_or_default();
    Err(StoreError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Tables kept in memory. `fail_on = (table, needle)` rejects upserts into
    /// `table` whose payload contains `needle`.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub tables: Mutex<HashMap<String, Vec<Value>>>,
        pub fail_on: Option<(&'static str, &'static str)>,
    }

    impl MemoryStore {
        pub(crate) fn rows(&self, table: &str) -> Vec<Value> {
            self.tables.lock().unwrap().get(table).cloned().unwrap_or_default()
        }

        pub(crate) fn seed(&self, table: &str, rows: Vec<Value>) {
            self.tables.lock().unwrap().insert(table.to_string(), rows);
        }
    }

    #[async_trait]
    impl RemoteStore for MemoryStore {
        async fn select(&self, table: &str, columns: &str) -> Result<Vec<Value>, StoreError> {
            let wanted: Vec<&str> = columns.split(',').map(str::trim).collect();
            Ok(self
                .rows(table)
                .into_iter()
                .map(|row| {
                    let picked = wanted
                        .iter()
                        .filter_map(|c| row.get(*c).map(|v| (c.to_string(), v.clone())))
                        .collect();
                    Value::Object(picked)
                })
                .collect())
        }

        async fn upsert(&self, table: &str, record: &Value, on_conflict: Option<&str>) -> Result<(), StoreError> {
            if let Some((failing, needle)) = self.fail_on {
                if failing == table && record.to_string().contains(needle) {
                    return Err(StoreError::Api {
                        status: 409,
                        message: format!("rejected by {table}"),
                    });
                }
            }

            let mut tables = self.tables.lock().unwrap();
            let rows = tables.entry(table.to_string()).or_default();
            let existing = on_conflict.and_then(|key| {
                rows.iter()
                    .position(|row| row.get(key).is_some() && row.get(key) == record.get(key))
            });
            match existing {
                Some(i) => rows[i] = record.clone(),
                None => rows.push(record.clone()),
            }
            Ok(())
        }
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let store = SupabaseStore::new("https://example.supabase.co/", "key".into()).unwrap();
        assert_eq!(store.endpoint("imoveis_venda"), "https://example.supabase.co/rest/v1/imoveis_venda");
    }

    #[tokio::test]
    async fn memory_store_upserts_on_conflict_key() {
        let store = MemoryStore::default();
        let a = serde_json::json!({"id": 1, "listing_key": "k1", "price(R$)": 100});
        let b = serde_json::json!({"id": 2, "listing_key": "k1", "price(R$)": 200});

        store.upsert("t", &a, Some("listing_key")).await.unwrap();
        store.upsert("t", &b, Some("listing_key")).await.unwrap();

        let rows = store.select("t", "id,price(R$)").await.unwrap();
        assert_eq!(rows, vec![serde_json::json!({"id": 2, "price(R$)": 200})]);
    }

    #[tokio::test]
    async fn memory_store_failures_are_per_table() {
        let store = MemoryStore {
            fail_on: Some(("listings", "apto-2")),
            ..MemoryStore::default()
        };
        let row = serde_json::json!({"url(apt)": "apto-2"});

        assert!(store.upsert("listings", &row, None).await.is_err());
        store.upsert("log", &row, None).await.unwrap();
        assert_eq!(store.rows("log").len(), 1);
    }
}
