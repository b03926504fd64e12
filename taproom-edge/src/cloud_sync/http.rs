//! PostgREST-style HTTP remote

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

use super::remote::{RemoteError, RemoteResult, RemoteStore};
use crate::message::Collection;

/// Client for `<base>/rest/v1/<table>` endpoints
pub struct PostgrestRemote {
    client: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for PostgrestRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestRemote")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl PostgrestRemote {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection.remote_table())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteStore for PostgrestRemote {
    fn name(&self) -> &'static str {
        "postgrest"
    }

    async fn probe(&self) -> RemoteResult<()> {
        let request = self
            .client
            .get(self.endpoint(Collection::Tables))
            .query(&[("select", "id"), ("limit", "1")]);
        self.send(request).await.map(|_| ())
    }

    async fn select_all(&self, collection: Collection) -> RemoteResult<Vec<Value>> {
        let request = self
            .client
            .get(self.endpoint(collection))
            .query(&[("select", "*")]);
        self.send(request)
            .await?
            .json::<Vec<Value>>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn upsert(&self, collection: Collection, row: Value) -> RemoteResult<()> {
        let request = self
            .client
            .post(self.endpoint(collection))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&row);
        self.send(request).await.map(|_| ())
    }

    async fn delete(&self, collection: Collection, id: &str) -> RemoteResult<()> {
        let filter = format!("eq.{id}");
        let request = self
            .client
            .delete(self.endpoint(collection))
            .query(&[("id", filter.as_str())]);
        self.send(request).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_layout() {
        let remote =
            PostgrestRemote::new("https://db.example.com/", "key", Duration::from_secs(5)).unwrap();
        assert_eq!(
            remote.endpoint(Collection::MenuItems),
            "https://db.example.com/rest/v1/menu_items"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let remote =
            PostgrestRemote::new("http://127.0.0.1:9", "key", Duration::from_millis(500)).unwrap();
        let err = remote.probe().await.unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
    }
}
