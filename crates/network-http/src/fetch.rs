use crate::body::{decode_payloads, multipart_form, operation_body};
use crate::error::{Error, Result};

use std::sync::Arc;
use std::time::Duration;

use ferry_network::{
    CacheConfig, FetchFunction, GraphQlResponse, ObservableFromValue, RequestParameters,
    TransportError, UploadableMap, Variables,
};
use futures::StreamExt;
use futures::stream;
use http::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

/// Default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ACCEPT_JSON: &str = "application/json";

/// Configuration of an [`HttpFetch`].
#[derive(Clone, Debug)]
pub struct HttpFetchConfig {
    /// URL every operation is posted to.
    pub endpoint: Url,
    /// Headers added to every request.
    pub headers: HeaderMap,
    /// Timeout of a whole request, response body included.
    pub timeout: Duration,
}

/// Builder for [`HttpFetch`].
#[derive(Debug, Default)]
pub struct HttpFetchBuilder {
    endpoint: Option<String>,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl HttpFetchBuilder {
    /// Sets the endpoint URL.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the fetch function.
    ///
    /// # Errors
    ///
    /// Fails when the endpoint is missing, is not an `http(s)` URL, or the
    /// HTTP client cannot be created.
    pub fn build(self) -> Result<HttpFetch> {
        let endpoint = Url::parse(&self.endpoint.ok_or(Error::MissingEndpoint)?)?;

        HttpFetch::new(HttpFetchConfig {
            endpoint,
            headers: self.headers,
            timeout: self.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        })
    }
}

/// Fetch function posting operations to an HTTP endpoint.
///
/// Operations are sent as JSON; operations with files are sent as a
/// multipart request. A response body may hold one payload or an array of
/// incremental payloads.
#[derive(Clone, Debug)]
pub struct HttpFetch {
    client: Client,
    config: Arc<HttpFetchConfig>,
}

impl HttpFetch {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> HttpFetchBuilder {
        HttpFetchBuilder::default()
    }

    /// Creates a fetch function from `config`.
    ///
    /// # Errors
    ///
    /// Fails when the endpoint is not an `http(s)` URL or the HTTP client
    /// cannot be created.
    pub fn new(config: HttpFetchConfig) -> Result<Self> {
        match config.endpoint.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::UnsupportedScheme(scheme.to_string())),
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &HttpFetchConfig {
        &self.config
    }

    /// Sends one operation and returns every payload of the response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] when the request cannot be
    /// completed, [`TransportError::Http`] for a non-success status and
    /// [`TransportError::Decode`] when the body is not a valid response.
    #[instrument(skip_all, fields(operation = %params.name, endpoint = %self.config.endpoint))]
    pub async fn send(
        &self,
        params: &RequestParameters,
        variables: &Variables,
        uploadables: Option<&UploadableMap>,
    ) -> std::result::Result<Vec<GraphQlResponse>, TransportError> {
        let request = self
            .client
            .post(self.config.endpoint.clone())
            .headers(self.config.headers.clone())
            .header(ACCEPT, ACCEPT_JSON);

        let request = match uploadables.filter(|map| !map.is_empty()) {
            Some(uploadables) => {
                debug!(files = uploadables.len(), "sending multipart request");
                request.multipart(multipart_form(params, variables, uploadables)?)
            }
            None => request.json(&operation_body(params, variables)),
        };

        let response = request.send().await.map_err(|err| {
            warn!(error = %err, "request failed");
            TransportError::Request(err.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response body".to_string());
            warn!(%status, "server returned an error status");
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::Request(err.to_string()))?;
        let payloads = decode_payloads(&body)?;
        debug!(payloads = payloads.len(), "received response");

        Ok(payloads)
    }
}

impl FetchFunction for HttpFetch {
    fn fetch(
        &self,
        params: &RequestParameters,
        variables: &Variables,
        _config: &CacheConfig,
        uploadables: Option<&UploadableMap>,
    ) -> ObservableFromValue<GraphQlResponse> {
        let this = self.clone();
        let (params, variables) = (params.clone(), variables.clone());
        let uploadables = uploadables.cloned();

        let response = stream::once(async move {
            this.send(&params, &variables, uploadables.as_ref()).await
        });
        ObservableFromValue::stream(response.flat_map(|result| {
            let items: Vec<std::result::Result<GraphQlResponse, TransportError>> = match result {
                Ok(payloads) => payloads.into_iter().map(Ok).collect(),
                Err(err) => vec![Err(err)],
            };
            stream::iter(items)
        }))
    }
}
