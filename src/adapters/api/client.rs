use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use uuid::Uuid;
use crate::application::Session;
use crate::ports::{RepositoryError, RepositoryResult};
use super::dto::{error_detail, ListResponse};

/// Thin JSON client for the project backend. Every request carries the
/// session's bearer token and a fresh `X-Request-Id`.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Session) -> RepositoryResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("sitetrack-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepositoryError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_session(&self, req: RequestBuilder) -> (RequestBuilder, Uuid) {
        let request_id = Uuid::new_v4();
        let req = req
            .bearer_auth(self.session.token())
            .header("X-Request-Id", request_id.to_string());
        (req, request_id)
    }

    async fn send(&self, req: RequestBuilder, method: &str, path: &str) -> RepositoryResult<Response> {
        let (req, request_id) = self.with_session(req);
        tracing::debug!(%request_id, "{} {}", method, path);

        req.send().await.map_err(|e| {
            tracing::warn!(%request_id, "{} {} failed: {}", method, path, e);
            RepositoryError::Network(e.to_string())
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> RepositoryResult<T> {
        let response = self.send(self.client.get(self.url(path)), "GET", path).await?;
        let body = self.success_body(response).await?;

        serde_json::from_str(&body).map_err(|e| {
            RepositoryError::Serialization(format!("Failed to parse response: {e}. Response was: {body}"))
        })
    }

    pub async fn get_list<T: DeserializeOwned>(&self, path: &str) -> RepositoryResult<Vec<T>> {
        let response = self.send(self.client.get(self.url(path)), "GET", path).await?;
        let body = self.success_body(response).await?;

        let list: ListResponse<T> = serde_json::from_str(&body).map_err(|e| {
            RepositoryError::Serialization(format!(
                "Failed to parse list response: {e}. Response was: {body}"
            ))
        })?;
        Ok(list.into_items())
    }

    pub async fn post<T: DeserializeOwned, R: serde::Serialize>(
        &self,
        path: &str,
        body: &R,
    ) -> RepositoryResult<T> {
        let response = self
            .send(self.client.post(self.url(path)).json(body), "POST", path)
            .await?;
        let text = self.success_body(response).await?;

        serde_json::from_str(&text).map_err(|e| {
            RepositoryError::Serialization(format!("Failed to parse response: {e}. Response was: {text}"))
        })
    }

    pub async fn delete(&self, path: &str) -> RepositoryResult<()> {
        let response = self
            .send(self.client.delete(self.url(path)), "DELETE", path)
            .await?;
        self.success_body(response).await.map(|_| ())
    }

    async fn success_body(&self, response: Response) -> RepositoryResult<String> {
        let status = response.status();

        match status.as_u16() {
            200..=299 => {
                let text = response
                    .text()
                    .await
                    .map_err(|e| RepositoryError::Network(e.to_string()))?;
                tracing::debug!("API Response: {}", text);
                Ok(text)
            }
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60);
                Err(RepositoryError::RateLimit(retry_after))
            }
            code => {
                let text = response.text().await.unwrap_or_default();
                Err(status_error(code, &text))
            }
        }
    }
}

fn status_error(code: u16, body: &str) -> RepositoryError {
    let detail = error_detail(body);
    match code {
        401 => RepositoryError::Authentication(
            detail.unwrap_or_else(|| "Invalid or expired token".to_string()),
        ),
        404 => RepositoryError::NotFound(detail.unwrap_or_else(|| "Resource not found".to_string())),
        _ => RepositoryError::Api {
            status: code,
            detail,
        },
    }
}

/// Builds `?k=v&...` with url-encoded pairs; empty when there are no params.
pub fn query_string(params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return String::new();
    }

    format!(
        "?{}",
        params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_encodes_values() {
        assert_eq!(query_string(&[]), "");
        assert_eq!(
            query_string(&[("project_id", "a b".to_string()), ("view", "daily".to_string())]),
            "?project_id=a%20b&view=daily"
        );
    }

    #[test]
    fn status_errors_keep_backend_detail() {
        assert_eq!(
            status_error(422, r#"{"detail":"Title is required"}"#),
            RepositoryError::Api {
                status: 422,
                detail: Some("Title is required".to_string())
            }
        );
        assert_eq!(
            status_error(401, ""),
            RepositoryError::Authentication("Invalid or expired token".to_string())
        );
        assert!(matches!(status_error(404, "{}"), RepositoryError::NotFound(_)));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://example.test/api/", Session::new("t")).unwrap();
        assert_eq!(client.url("/tasks"), "http://example.test/api/tasks");
    }
}
