//! REST transport: a [`Connection`] backed by a remote `bifrost serve`.
//!
//! The wire contract is defined in [`crate::server`]. Status codes map back
//! onto the trait's absent/error split:
//!
//! | Response | Result |
//! |----------|--------|
//! | 404 on a lookup | `Ok(None)` |
//! | 404 `section_not_found` | `SectionNotFound` |
//! | 409 on `POST /sections` | `Ok(None)` |
//! | 409 `duplicate_location` | `DuplicateLocation` |
//! | 422 `type_mismatch` | `Ok(None)` |
//! | anything else non-2xx | `Remote` |

use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::connection::Connection;
use crate::error::{CatalogError, Result};
use crate::models::{CatalogFile, IndexKey, MediaType, Section};
use crate::profile::ServerProfile;
use crate::server::{CreateSectionRequest, ErrorBody, FileRequest};

pub struct RestClient {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
}

/// A decoded error response.
struct Failure {
    status: StatusCode,
    body: Option<ErrorBody>,
    raw: String,
}

impl Failure {
    async fn read(response: Response) -> Self {
        let status = response.status();
        let raw = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ErrorBody>(&raw).ok();
        Self { status, body, raw }
    }

    fn code(&self) -> &str {
        self.body.as_ref().map(|b| b.error.code.as_str()).unwrap_or("")
    }

    fn into_error(self) -> CatalogError {
        match self.body {
            Some(body) if body.error.code == "duplicate_location" => {
                CatalogError::DuplicateLocation {
                    location: body.error.location.unwrap_or_default(),
                    existing_sha: body.error.existing_sha.unwrap_or_default(),
                }
            }
            Some(body) if body.error.code == "section_not_found" => {
                CatalogError::SectionNotFound {
                    name: body.error.section.unwrap_or_default(),
                }
            }
            Some(body) => CatalogError::Remote {
                status: self.status.as_u16(),
                message: body.error.message,
            },
            None => CatalogError::Remote {
                status: self.status.as_u16(),
                message: self.raw,
            },
        }
    }
}

impl RestClient {
    /// Client for the `[rest]` endpoint of `profile`.
    ///
    /// Requests wait as long as the server takes unless `timeout` is given.
    /// Building the client does not touch the network.
    pub fn new(profile: &ServerProfile, timeout: Option<Duration>) -> Result<Self> {
        let endpoint = profile.rest_endpoint()?;
        let base = Url::parse(&endpoint.base_url()).map_err(|e| {
            CatalogError::invalid_argument(format!("bad endpoint {}: {}", endpoint, e))
        })?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base,
            token: profile.token.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::invalid_argument(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Response> {
        let request = self.client.get(self.url(segments)?).query(query);
        Ok(self.authorize(request).send().await?)
    }

    async fn post<B: serde::Serialize>(&self, segments: &[&str], body: &B) -> Result<Response> {
        let request = self.client.post(self.url(segments)?).json(body);
        Ok(self.authorize(request).send().await?)
    }

    /// Decode a success body, or turn the failure into an error.
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(Failure::read(response).await.into_error())
        }
    }

    /// Like [`decode`](Self::decode), but a plain 404 means "nothing matched".
    async fn decode_optional<T: DeserializeOwned>(response: Response) -> Result<Option<T>> {
        if response.status() == StatusCode::NOT_FOUND {
            let failure = Failure::read(response).await;
            if failure.code() == "section_not_found" {
                return Err(failure.into_error());
            }
            return Ok(None);
        }
        Self::decode(response).await.map(Some)
    }

    async fn send_file(
        &self,
        route: &str,
        record: &CatalogFile,
        section: &Section,
    ) -> Result<Option<CatalogFile>> {
        let body = FileRequest {
            file: record.clone(),
            section: section.clone(),
        };
        let response = self.post(&["files", route], &body).await?;

        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let failure = Failure::read(response).await;
            if failure.code() == "type_mismatch" {
                tracing::debug!(file = %record.file_name, "server rejected file type");
                return Ok(None);
            }
            return Err(failure.into_error());
        }
        Self::decode(response).await.map(Some)
    }
}

fn scope<'a>(
    query: &mut Vec<(&'static str, &'a str)>,
    section: Option<&'a Section>,
    key: Option<IndexKey>,
) {
    if let Some(section) = section {
        query.push(("section", section.name.as_str()));
    }
    if let Some(key) = key {
        query.push(("key", key.as_str()));
    }
}

#[async_trait]
impl Connection for RestClient {
    fn transport(&self) -> &str {
        "rest"
    }

    async fn get_section(&self, name: &str) -> Result<Option<Section>> {
        let response = self.get(&["sections", name], &[]).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::decode(response).await.map(Some)
    }

    async fn get_sections(&self) -> Result<Vec<Section>> {
        let response = self.get(&["sections"], &[]).await?;
        Self::decode(response).await
    }

    async fn get_file(
        &self,
        query: &str,
        section: Option<&Section>,
    ) -> Result<Option<CatalogFile>> {
        let mut params = vec![("query", query)];
        scope(&mut params, section, None);
        let response = self.get(&["files"], &params).await?;
        Self::decode_optional(response).await
    }

    async fn index(&self, section: Option<&Section>, key: IndexKey) -> Result<Vec<String>> {
        let mut params = Vec::new();
        scope(&mut params, section, Some(key));
        let response = self.get(&["index"], &params).await?;
        Self::decode(response).await
    }

    async fn search(
        &self,
        query: &str,
        section: Option<&Section>,
        key: IndexKey,
    ) -> Result<Vec<String>> {
        let mut params = vec![("query", query)];
        scope(&mut params, section, Some(key));
        let response = self.get(&["search"], &params).await?;
        Self::decode(response).await
    }

    async fn create_section(
        &self,
        name: &str,
        remote_path: &str,
        section_type: MediaType,
    ) -> Result<Option<Section>> {
        let body = CreateSectionRequest {
            name: name.to_string(),
            remote_path: remote_path.to_string(),
            section_type,
        };
        let response = self.post(&["sections"], &body).await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(None);
        }
        Self::decode(response).await.map(Some)
    }

    async fn register_file(
        &self,
        record: &CatalogFile,
        section: &Section,
    ) -> Result<Option<CatalogFile>> {
        self.send_file("register", record, section).await
    }

    async fn create_file(
        &self,
        record: &CatalogFile,
        section: &Section,
    ) -> Result<Option<CatalogFile>> {
        self.send_file("create", record, section).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Endpoint;

    fn profile(token: Option<&str>) -> ServerProfile {
        ServerProfile {
            name: "home1".into(),
            home: true,
            token: token.map(str::to_string),
            rest: Some(Endpoint {
                host: "127.0.0.1".into(),
                port: 7340,
            }),
            direct: None,
        }
    }

    #[test]
    fn test_url_segments_are_escaped() {
        let client = RestClient::new(&profile(None), None).unwrap();
        let url = client.url(&["sections", "tv shows/2024"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:7340/sections/tv%20shows%2F2024"
        );
    }

    #[test]
    fn test_profile_without_rest_endpoint_rejected() {
        let mut p = profile(Some("t"));
        p.rest = None;
        assert!(matches!(
            RestClient::new(&p, None),
            Err(CatalogError::InvalidArgument { .. })
        ));
    }

    /// Accepts connections and never answers.
    async fn silent_server() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        port
    }

    fn profile_on(port: u16) -> ServerProfile {
        let mut p = profile(None);
        p.rest = Some(Endpoint {
            host: "127.0.0.1".into(),
            port,
        });
        p
    }

    #[tokio::test]
    async fn test_requests_have_no_deadline_by_default() {
        let port = silent_server().await;
        let client = RestClient::new(&profile_on(port), None).unwrap();

        // The client is still waiting when the caller's own deadline fires.
        let waited = tokio::time::timeout(Duration::from_millis(1500), client.get_sections()).await;
        assert!(waited.is_err(), "request finished on its own: {:?}", waited);
    }

    #[tokio::test]
    async fn test_configured_timeout_applies() {
        let port = silent_server().await;
        let client =
            RestClient::new(&profile_on(port), Some(Duration::from_millis(200))).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(10), client.get_sections())
            .await
            .expect("configured timeout should fire first");
        match result {
            Err(CatalogError::Http(e)) => assert!(e.is_timeout(), "{e}"),
            other => panic!("expected a timed out request, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_maps_duplicate_location() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"error":{"code":"duplicate_location","message":"taken","location":"/m/a.mp4","existing_sha":"ab"}}"#,
        )
        .unwrap();
        let failure = Failure {
            status: StatusCode::CONFLICT,
            body: Some(body),
            raw: String::new(),
        };
        match failure.into_error() {
            CatalogError::DuplicateLocation {
                location,
                existing_sha,
            } => {
                assert_eq!(location, "/m/a.mp4");
                assert_eq!(existing_sha, "ab");
            }
            other => panic!("expected DuplicateLocation, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_without_json_body_is_remote() {
        let failure = Failure {
            status: StatusCode::BAD_GATEWAY,
            body: None,
            raw: "upstream down".into(),
        };
        match failure.into_error() {
            CatalogError::Remote { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("expected Remote, got {:?}", other),
        }
    }
}
