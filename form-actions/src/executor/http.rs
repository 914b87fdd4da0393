//! HTTP action executor.
//!
//! Posts `{action, input, context}` to `{base_url}/actions/execute` and
//! parses the `{success, data?, message?}` envelope.

use async_trait::async_trait;
use form_schema::ActionDescriptor;
use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use super::traits::*;

/// Action executor backed by the HTTP action service.
pub struct HttpActionExecutor {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpActionExecutor {
    /// Create an executor for the service at `base_url`.
    pub fn new(base_url: impl Into<String>, api_token: Option<String>) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
        }
    }

    fn execute_url(&self) -> String {
        format!("{}/actions/execute", self.base_url)
    }

    fn auth_header(&self) -> Option<String> {
        self.api_token.as_ref().map(|t| format!("Bearer {}", t))
    }
}

#[derive(Debug, Serialize)]
struct ExecuteBody<'a> {
    action: &'a ActionDescriptor,
    input: &'a serde_json::Value,
    context: &'a ActionContext,
}

#[async_trait]
impl ActionExecutor for HttpActionExecutor {
    fn id(&self) -> &str {
        &self.base_url
    }

    async fn execute(
        &self,
        action: &ActionDescriptor,
        request: ActionRequest,
    ) -> Result<ActionResponse, ActionError> {
        debug!(
            handler = %action.handler,
            request_id = %request.context.request_id,
            "Executing action"
        );

        let body = ExecuteBody {
            action,
            input: &request.input,
            context: &request.context,
        };

        let mut http_request = self.client.post(self.execute_url());
        if let Some(auth) = self.auth_header() {
            http_request = http_request.header(header::AUTHORIZATION, auth);
        }

        let response = http_request
            .json(&body)
            .send()
            .await
            .map_err(|e| ActionError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(ActionError::Unavailable(format!(
                "action service returned {}",
                status
            )));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // The service reports validation failures as a 4xx envelope.
            if let Ok(envelope) = serde_json::from_str::<ActionResponse>(&text) {
                if !envelope.success {
                    return Ok(envelope);
                }
            }
            return Err(ActionError::RequestFailed(format!("HTTP {}: {}", status, text)));
        }

        response
            .json::<ActionResponse>()
            .await
            .map_err(|e| ActionError::ParseError(e.to_string()))
    }
}
