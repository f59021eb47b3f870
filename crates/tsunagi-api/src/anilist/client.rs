use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use super::types::{AiringScheduleResponse, GraphQLResponse};
use crate::error::ProviderError;
use crate::traits::{AiringSchedule, ScheduleSource};

pub const DEFAULT_ENDPOINT: &str = "https://graphql.anilist.co";

const NEXT_AIRING_QUERY: &str = r#"
query ($id: Int!) {
    AiringSchedule(mediaId: $id, notYetAired: true) {
        id
        episode
        airingAt
    }
}
"#;

/// Read-only AniList GraphQL client for airing schedules. Needs no token.
pub struct AniListSchedule {
    endpoint: Url,
    http: Client,
}

impl AniListSchedule {
    pub fn new(endpoint: &str) -> Result<Self, ProviderError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ProviderError::Other(format!("invalid schedule endpoint: {e}")))?;
        Ok(Self {
            endpoint,
            http: Client::new(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns `Ok(None)` when AniList answers 404, which is how it reports
    /// a media item with nothing left to air.
    async fn graphql_request<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<Option<T>, ProviderError> {
        tracing::debug!(operation, "AniList GraphQL request");

        let resp = self
            .http
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&serde_json::json!({
                "query": query,
                "variables": variables,
            }))
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(operation, "AniList returned not found");
            return Ok(None);
        }
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(operation, status = status_code, "AniList API error");
            return Err(ProviderError::Api {
                status: status_code,
                message: body,
            });
        }

        let body: GraphQLResponse<T> = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        if let Some(err) = body.errors.first() {
            if err.status == Some(404) {
                return Ok(None);
            }
            if body.data.is_none() {
                return Err(ProviderError::Api {
                    status: err.status.unwrap_or(status.as_u16()),
                    message: err.message.clone(),
                });
            }
        }

        Ok(body.data)
    }
}

#[async_trait]
impl ScheduleSource for AniListSchedule {
    async fn next_airing(&self, media_id: u64) -> Result<Option<AiringSchedule>, ProviderError> {
        let resp: Option<AiringScheduleResponse> = self
            .graphql_request(
                "NextAiring",
                NEXT_AIRING_QUERY,
                serde_json::json!({ "id": media_id }),
            )
            .await?;

        Ok(resp
            .and_then(|r| r.airing_schedule)
            .map(|node| node.into_schedule()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_endpoint() {
        assert!(AniListSchedule::new("not a url").is_err());
    }

    #[test]
    fn test_default_endpoint_parses() {
        let client = AniListSchedule::new(DEFAULT_ENDPOINT).unwrap();
        assert_eq!(client.endpoint().host_str(), Some("graphql.anilist.co"));
    }
}
