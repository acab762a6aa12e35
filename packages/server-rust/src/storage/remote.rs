//! [`BusinessStore`] that forwards every call to another formgrid server
//! over its REST API.
//!
//! Non-2xx responses carry `{"error": "..."}`; a 404 becomes
//! [`StoreError::NotFound`], anything else [`StoreError::Remote`].

use async_trait::async_trait;
use formgrid_core::{Record, RecordId, Schema};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::traits::{BusinessStore, StoreError, StoreStats};

#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: Client,
    base: Url,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct BatchCreated {
    data: Vec<Record>,
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Backend(err.into())
}

impl RemoteStore {
    /// Creates a client for the server at `base_url` (e.g.
    /// `http://localhost:5000`).
    ///
    /// # Errors
    ///
    /// Fails when `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        let base = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("invalid remote url {base_url}: {e}"))?;
        if base.cannot_be_a_base() {
            return Err(anyhow::anyhow!("invalid remote url {base_url}").into());
        }
        Ok(Self {
            client: Client::new(),
            base,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("remote url cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn record_url(&self, id: Option<RecordId>) -> Result<Url, StoreError> {
        match id {
            Some(id) => self.url(&["api", "data", &id.to_string()]),
            None => self.url(&["api", "data"]),
        }
    }

    async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
        };
        debug!(status = status.as_u16(), %message, "remote store error");
        if status == StatusCode::NOT_FOUND {
            Err(StoreError::NotFound { what: message })
        } else {
            Err(StoreError::Remote {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, StoreError> {
        Self::send(request).await?.json().await.map_err(transport)
    }

    /// Like [`RemoteStore::json`], with a 404 read as "absent".
    async fn optional<T: DeserializeOwned>(
        request: RequestBuilder,
    ) -> Result<Option<T>, StoreError> {
        match Self::json(request).await {
            Ok(value) => Ok(Some(value)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl BusinessStore for RemoteStore {
    async fn list_schemas(&self) -> Result<Vec<Schema>, StoreError> {
        Self::json(self.client.get(self.url(&["api", "schemas"])?)).await
    }

    async fn get_schema(&self, name: &str) -> Result<Option<Schema>, StoreError> {
        Self::optional(self.client.get(self.url(&["api", "schemas", name])?)).await
    }

    async fn create_schema(&self, schema: Schema) -> Result<Schema, StoreError> {
        let request = self.client.post(self.url(&["api", "schemas"])?).json(&schema);
        match Self::json(request).await {
            Err(StoreError::Remote { status: 409, .. }) => {
                Err(StoreError::AlreadyExists { name: schema.name })
            }
            other => other,
        }
    }

    async fn delete_schema(&self, name: &str) -> Result<(), StoreError> {
        Self::send(self.client.delete(self.url(&["api", "schemas", name])?)).await?;
        Ok(())
    }

    async fn list_records(&self, business: &str) -> Result<Vec<Record>, StoreError> {
        let request = self
            .client
            .get(self.record_url(None)?)
            .query(&[("business", business)]);
        Self::json(request).await
    }

    async fn get_record(
        &self,
        business: &str,
        id: RecordId,
    ) -> Result<Option<Record>, StoreError> {
        let request = self
            .client
            .get(self.record_url(Some(id))?)
            .query(&[("business", business)]);
        let found = Self::optional(request).await?;
        // A 404 is ambiguous here; only a missing record is `None`.
        if found.is_none() && self.get_schema(business).await?.is_none() {
            return Err(StoreError::business_not_found(business));
        }
        Ok(found)
    }

    async fn create_records(
        &self,
        business: &str,
        records: Vec<Record>,
    ) -> Result<Vec<Record>, StoreError> {
        let request = self
            .client
            .post(self.record_url(None)?)
            .query(&[("business", business)])
            .json(&records);
        let created: BatchCreated = Self::json(request).await?;
        Ok(created.data)
    }

    async fn update_record(
        &self,
        business: &str,
        id: RecordId,
        record: Record,
    ) -> Result<Record, StoreError> {
        let request = self
            .client
            .put(self.record_url(Some(id))?)
            .query(&[("business", business)])
            .json(&record);
        Self::json(request).await
    }

    async fn delete_record(&self, business: &str, id: RecordId) -> Result<(), StoreError> {
        let request = self
            .client
            .delete(self.record_url(Some(id))?)
            .query(&[("business", business)]);
        Self::send(request).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        Self::json(self.client.get(self.url(&["api", "stats"])?)).await
    }
}
