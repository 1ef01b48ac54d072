//! Authenticated transport for the Cloud Drive REST API.

use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use crate::account::AccountService;
use crate::auth::Authenticator;
use crate::config::Endpoints;
use crate::error::{DriveError, Result};
use crate::models::ApiErrorResponse;
use crate::nodes::NodesService;

/// Client for the Cloud Drive API.
///
/// Holds the session (token source, endpoints, connection pool). The node
/// and account operations live on the services borrowed from it through
/// [`CloudDriveClient::nodes`] and [`CloudDriveClient::account`].
pub struct CloudDriveClient {
    endpoints: Endpoints,
    auth: Authenticator,
    http: Client,
}

impl CloudDriveClient {
    /// Create a new CloudDriveClient.
    ///
    /// # Arguments
    /// * `auth` - Authenticator for obtaining access tokens
    /// * `endpoints` - Metadata and content base URLs
    pub fn new(auth: Authenticator, endpoints: Endpoints) -> Self {
        Self {
            endpoints,
            auth,
            http: Client::new(),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Point the client at other endpoints, e.g. the ones returned by
    /// `account/endpoint`.
    pub fn set_endpoints(&mut self, endpoints: Endpoints) {
        self.endpoints = endpoints;
    }

    /// Node listing, navigation and transfer operations.
    pub fn nodes(&self) -> NodesService<'_> {
        NodesService::new(self)
    }

    /// Account information operations.
    pub fn account(&self) -> AccountService<'_> {
        AccountService::new(self)
    }

    /// Build an authenticated request against the metadata endpoint.
    pub async fn metadata_request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        self.request(&self.endpoints.metadata, method, path).await
    }

    /// Build an authenticated request against the content endpoint.
    pub async fn content_request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        self.request(&self.endpoints.content, method, path).await
    }

    async fn request(&self, base: &Url, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = base
            .join(path)
            .map_err(|e| DriveError::InvalidEndpoint(format!("{}{}: {}", base, path, e)))?;
        let token = self.auth.get_access_token().await?;

        tracing::debug!(method = method.as_str(), url = url.as_str(), "request");

        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// Send a request, turning non-success statuses into [`DriveError::Api`].
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), "request failed");
            return Err(api_error(status.as_u16(), error_body));
        }

        Ok(response)
    }

    /// Send a request and decode its JSON body into `T`.
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Build an API error from a failed response, preferring the server's own
/// message when the body carries one.
fn api_error(status: u16, body: String) -> DriveError {
    match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(api_error) => DriveError::Api {
            status,
            message: api_error.message,
        },
        Err(_) => DriveError::Api {
            status,
            message: body,
        },
    }
}
