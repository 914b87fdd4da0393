//! HTTP directory client.

use async_trait::async_trait;
use form_schema::FormFieldOption;
use reqwest::{header, Client, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::*;

/// Directory client for the church-management REST API.
pub struct HttpDirectoryClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpDirectoryClient {
    /// Create a client for the API at `base_url`.
    pub fn new(base_url: impl Into<String>, api_token: Option<String>) -> Self {
        Self {
            client: Client::builder().build().unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
        }
    }

    /// URL of `segments` below the base URL. Each segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ActionError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ActionError::RequestFailed(format!("invalid base URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ActionError::RequestFailed(format!("base URL {} cannot have a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: Option<&DirectoryQuery>,
    ) -> Result<Vec<T>, ActionError> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "Fetching directory listing");

        let mut request = self.client.get(url);
        if let Some(token) = &self.api_token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(query) = query {
            let mut params: Vec<(&str, String)> = Vec::new();
            if let Some(search) = &query.search {
                params.push(("search", search.clone()));
            }
            if let Some(limit) = query.limit {
                params.push(("limit", limit.to_string()));
            }
            if !params.is_empty() {
                request = request.query(&params);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| ActionError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ActionError::RequestFailed(format!("HTTP {}: {}", status, body)));
        }

        let envelope: DataEnvelope<T> = response
            .json()
            .await
            .map_err(|e| ActionError::ParseError(e.to_string()))?;

        Ok(envelope.data)
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn list_households(&self, query: &DirectoryQuery) -> Result<Vec<HouseholdRow>, ActionError> {
        self.get_data(&["households"], Some(query)).await
    }

    async fn list_families(&self, query: &DirectoryQuery) -> Result<Vec<FamilyRow>, ActionError> {
        self.get_data(&["families"], Some(query)).await
    }

    async fn lookup_options(&self, lookup_id: &str) -> Result<Vec<FormFieldOption>, ActionError> {
        self.get_data(&["lookups", lookup_id, "options"], None).await
    }
}
