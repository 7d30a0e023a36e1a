//! The Ci client: token exchange, request dispatch, and response
//! bookkeeping.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use crate::config::Config;
use crate::error::{classify, Error, ErrorKind, Failure};
use crate::params::to_wire_params;
use crate::workspaces::Workspace;

pub const API_BASE_URL: &str = "https://api.cimediacloud.com";
pub const UPLOAD_BASE_URL: &str = "https://io.cimediacloud.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Which Ci service a request goes to, and with it the parameter
/// encoding: JSON bodies and query strings on the API service, multipart
/// forms on the upload service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Api,
    Upload,
}

/// Snapshot of the most recent successful response, kept for callers that
/// want the status, headers, or raw body after the fact.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Client for the Ci REST API.
///
/// Every dispatching method takes `&mut self`: a client instance serves
/// one logical thread of control. Clone the client for concurrent use;
/// clones share nothing, each carries its own token, workspace, and
/// response caches.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    config: Config,
    api_base: String,
    upload_base: String,
    access_token: Option<String>,
    last_response: Option<ApiResponse>,
    pub(crate) workspace_id: Option<String>,
    pub(crate) workspace: Option<Workspace>,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

impl Client {
    /// Create a client against the production Ci services.
    pub fn new(config: Config) -> Result<Self, Error> {
        Self::with_base_urls(config, API_BASE_URL, UPLOAD_BASE_URL)
    }

    /// Create a client with explicit service URLs. Tests point both at a
    /// local mock server.
    pub fn with_base_urls(
        config: Config,
        api_base: &str,
        upload_base: &str,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| {
                Error::with_source(ErrorKind::Other, "cannot build the HTTP client", source)
            })?;
        let workspace_id = config.workspace_id.clone();

        Ok(Self {
            http,
            api_base: parse_base(api_base)?,
            upload_base: parse_base(upload_base)?,
            config,
            access_token: None,
            last_response: None,
            workspace_id,
            workspace: None,
        })
    }

    /// The cached OAuth2 access token, performing the password-grant
    /// exchange first if none is held.
    ///
    /// Tokens live until [`Client::invalidate_access_token`] or
    /// [`Client::set_workspace_id`] drops them. There is no expiry-driven
    /// refresh: a token the server no longer accepts surfaces as an
    /// `Unauthorized` error on the next call, and the caller decides.
    pub async fn access_token(&mut self) -> Result<String, Error> {
        if let Some(token) = &self.access_token {
            return Ok(token.clone());
        }

        tracing::debug!("requesting an access token for {}", self.config.username);
        let url = self.url_for(Endpoint::Api, "/oauth2/token");
        let request = self
            .http
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&TokenRequest {
                grant_type: "password",
                client_id: &self.config.client_id,
                client_secret: &self.config.client_secret,
            });

        let body = self.execute(request).await?;
        let token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::Other,
                    "token response did not include an access_token",
                )
            })?
            .to_string();
        self.access_token = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached access token. The next dispatch performs a fresh
    /// exchange.
    pub fn invalidate_access_token(&mut self) {
        self.access_token = None;
    }

    /// Snapshot of the most recent successful response. Reset at the
    /// start of every dispatch and repopulated only on success.
    pub fn last_response(&self) -> Option<&ApiResponse> {
        self.last_response.as_ref()
    }

    /// Dispatch a request and return the parsed JSON response body.
    ///
    /// The dispatch order is fixed: the previous response snapshot is
    /// dropped, a token is resolved (hitting the network at most once per
    /// cache lifetime), top-level parameter names are camelized, caller
    /// headers are merged with the bearer header applied last so a
    /// caller-supplied Authorization can never shadow it, and failures of
    /// any sort come back classified as [`Error`].
    pub async fn request<P>(
        &mut self,
        method: Method,
        endpoint: Endpoint,
        path: &str,
        params: &P,
        headers: &[(&str, &str)],
    ) -> Result<Value, Error>
    where
        P: Serialize + ?Sized,
    {
        self.last_response = None;
        let token = self.access_token().await?;
        let wire = to_wire_params(params)?;

        let url = self.url_for(endpoint, path);
        let in_query = method == Method::GET || method == Method::DELETE;
        tracing::debug!("{} {}", method, url);

        let mut request = self.http.request(method, &url);
        request = if in_query {
            if wire.is_empty() {
                request
            } else {
                request.query(&wire)
            }
        } else {
            match endpoint {
                Endpoint::Api => request.json(&wire),
                Endpoint::Upload => request.multipart(text_form(wire)),
            }
        };

        let request = merge_headers(request, headers, &token)?;
        self.execute(request).await
    }

    /// GET `path` on the API service.
    pub async fn get<P>(&mut self, path: &str, params: &P) -> Result<Value, Error>
    where
        P: Serialize + ?Sized,
    {
        self.request(Method::GET, Endpoint::Api, path, params, &[])
            .await
    }

    /// POST `path` on the API service with a JSON body.
    pub async fn post<P>(&mut self, path: &str, params: &P) -> Result<Value, Error>
    where
        P: Serialize + ?Sized,
    {
        self.request(Method::POST, Endpoint::Api, path, params, &[])
            .await
    }

    /// PUT `path` on the API service with a JSON body.
    pub async fn put<P>(&mut self, path: &str, params: &P) -> Result<Value, Error>
    where
        P: Serialize + ?Sized,
    {
        self.request(Method::PUT, Endpoint::Api, path, params, &[])
            .await
    }

    /// DELETE `path` on the API service.
    pub async fn delete<P>(&mut self, path: &str, params: &P) -> Result<Value, Error>
    where
        P: Serialize + ?Sized,
    {
        self.request(Method::DELETE, Endpoint::Api, path, params, &[])
            .await
    }

    /// Dispatch a prebuilt multipart form to the upload service. The file
    /// part cannot be expressed as JSON parameters, so the upload
    /// operation builds the form itself and joins the pipeline here.
    pub(crate) async fn upload_multipart(
        &mut self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<Value, Error> {
        self.last_response = None;
        let token = self.access_token().await?;

        let url = self.url_for(Endpoint::Upload, path);
        tracing::debug!("POST {} (multipart)", url);

        let request = merge_headers(self.http.post(&url).multipart(form), &[], &token)?;
        self.execute(request).await
    }

    async fn execute(&mut self, request: reqwest::RequestBuilder) -> Result<Value, Error> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(source) => return Err(classify(Failure::Transport(source))),
        };

        let status = response.status();
        let headers = response.headers().clone();
        let text = match response.text().await {
            Ok(text) => text,
            Err(source) => return Err(classify(Failure::Transport(source))),
        };

        if !status.is_success() {
            return Err(classify(Failure::Status {
                status: status.as_u16(),
                body: text,
            }));
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(body) => body,
                Err(source) => {
                    tracing::error!("Ci returned a body that is not valid JSON: {}", source);
                    return Err(Error::with_source(
                        ErrorKind::Other,
                        "response body was not valid JSON",
                        source,
                    ));
                }
            }
        };

        self.last_response = Some(ApiResponse {
            status: status.as_u16(),
            headers,
            body: body.clone(),
        });

        Ok(body)
    }

    fn url_for(&self, endpoint: Endpoint, path: &str) -> String {
        let base = match endpoint {
            Endpoint::Api => &self.api_base,
            Endpoint::Upload => &self.upload_base,
        };
        format!("{}{}", base, path)
    }
}

fn parse_base(base: &str) -> Result<String, Error> {
    Url::parse(base).map_err(|source| {
        Error::with_source(
            ErrorKind::InvalidConfig,
            format!("invalid base URL {base}"),
            source,
        )
    })?;
    Ok(base.trim_end_matches('/').to_string())
}

fn merge_headers(
    request: reqwest::RequestBuilder,
    headers: &[(&str, &str)],
    token: &str,
) -> Result<reqwest::RequestBuilder, Error> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|source| {
            Error::with_source(
                ErrorKind::Other,
                format!("invalid header name {name}"),
                source,
            )
        })?;
        let value = HeaderValue::from_str(value).map_err(|source| {
            Error::with_source(
                ErrorKind::Other,
                format!("invalid value for header {name}"),
                source,
            )
        })?;
        map.insert(name, value);
    }

    // Inserted after the caller's headers so a caller-supplied
    // Authorization never shadows the bearer token.
    let bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|source| {
        Error::with_source(
            ErrorKind::Other,
            "access token is not a valid header value",
            source,
        )
    })?;
    map.insert(AUTHORIZATION, bearer);

    Ok(request.headers(map))
}

fn text_form(params: Map<String, Value>) -> reqwest::multipart::Form {
    let mut form = reqwest::multipart::Form::new();
    for (key, value) in params {
        let text = match value {
            Value::String(text) => text,
            other => other.to_string(),
        };
        form = form.text(key, text);
    }
    form
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    fn test_config() -> Config {
        Config {
            username: "joe".to_string(),
            password: "secret".to_string(),
            client_id: "abc".to_string(),
            client_secret: "xyz".to_string(),
            workspace_id: None,
        }
    }

    fn client_for(server: &ServerGuard) -> Client {
        Client::with_base_urls(test_config(), &server.url(), &server.url()).unwrap()
    }

    async fn mock_token(server: &mut ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/oauth2/token")
            .with_body(r#"{"access_token":"tok-123"}"#)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn the_token_is_fetched_once_across_calls() {
        let mut server = Server::new_async().await;
        let token_mock = server
            .mock("POST", "/oauth2/token")
            .with_body(r#"{"access_token":"tok-123"}"#)
            .expect(1)
            .create_async()
            .await;
        let asset_mock = server
            .mock("GET", "/assets/a1")
            .with_body(r#"{"id":"a1"}"#)
            .expect(2)
            .create_async()
            .await;

        let mut client = client_for(&server);
        client.get("/assets/a1", &()).await.unwrap();
        client.get("/assets/a1", &()).await.unwrap();

        token_mock.assert_async().await;
        asset_mock.assert_async().await;
    }

    #[tokio::test]
    async fn invalidating_the_token_forces_a_fresh_exchange() {
        let mut server = Server::new_async().await;
        let token_mock = server
            .mock("POST", "/oauth2/token")
            .with_body(r#"{"access_token":"tok-123"}"#)
            .expect(2)
            .create_async()
            .await;
        let asset_mock = server
            .mock("GET", "/assets/a1")
            .with_body(r#"{"id":"a1"}"#)
            .expect(2)
            .create_async()
            .await;

        let mut client = client_for(&server);
        client.get("/assets/a1", &()).await.unwrap();
        client.invalidate_access_token();
        client.get("/assets/a1", &()).await.unwrap();

        token_mock.assert_async().await;
        asset_mock.assert_async().await;
    }

    #[tokio::test]
    async fn the_bearer_header_wins_over_caller_headers() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let mock = server
            .mock("GET", "/ping")
            .match_header("authorization", "Bearer tok-123")
            .match_header("x-trace", "42")
            .with_body("{}")
            .create_async()
            .await;

        let mut client = client_for(&server);
        client
            .request(
                Method::GET,
                Endpoint::Api,
                "/ping",
                &(),
                &[("Authorization", "Bearer caller-token"), ("X-Trace", "42")],
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn query_parameter_names_are_camelized() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let mock = server
            .mock("GET", "/workspaces/ws1/search")
            .match_query(Matcher::UrlEncoded("createdBy".into(), "me".into()))
            .with_body(r#"{"items":[]}"#)
            .create_async()
            .await;

        let mut client = client_for(&server);
        client
            .get("/workspaces/ws1/search", &json!({ "created_by": "me" }))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn a_failed_call_clears_the_last_response() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _ok = server
            .mock("GET", "/assets/a1")
            .with_body(r#"{"id":"a1"}"#)
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/assets/nope")
            .with_status(404)
            .with_body(r#"{"code":"NotFound","message":"no such asset"}"#)
            .create_async()
            .await;

        let mut client = client_for(&server);
        client.get("/assets/a1", &()).await.unwrap();
        let snapshot = client.last_response().unwrap();
        assert_eq!(snapshot.status, 200);
        assert_eq!(snapshot.body["id"], "a1");

        let error = client.get("/assets/nope", &()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert!(client.last_response().is_none());
    }

    #[tokio::test]
    async fn requests_that_never_connect_are_connection_failures() {
        let mut client =
            Client::with_base_urls(test_config(), "http://127.0.0.1:1", "http://127.0.0.1:1")
                .unwrap();

        let error = client.get("/workspaces", &()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ConnectionFailed);
        assert_eq!(error.http_status(), None);
    }
}
