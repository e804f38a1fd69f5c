// Read-only HTTP client for the telemetry store's query endpoint.
//
// Issues `GET {base}/query?db=..&q=..&epoch=ms` and hands back the decoded
// columnar envelope. Query strings arrive fully built and validated; this
// module only moves bytes and classifies failures.

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace};
use url::Url;

use crate::columnar::ColumnarResponse;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Timestamp precision requested from the store. Numeric epochs keep
/// bucket keys cheap to order.
const EPOCH_PRECISION: &str = "ms";

/// Basic-auth credentials for the store.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Error body shape returned alongside non-success statuses.
#[derive(serde::Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP client for the store's read-only query endpoint.
pub struct QueryClient {
    http: reqwest::Client,
    base_url: Url,
    database: String,
    credentials: Option<Credentials>,
}

impl QueryClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(
        base_url: Url,
        database: impl Into<String>,
        credentials: Option<Credentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            database: database.into(),
            credentials,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, database: impl Into<String>) -> Self {
        Self {
            http,
            base_url,
            database: database.into(),
            credentials: None,
        }
    }

    /// Attach basic-auth credentials.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// The database every query is scoped to.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// The store base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn query_url(&self) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/query"))?)
    }

    /// Run one read-only query and decode the columnar response.
    ///
    /// Non-success statuses become [`Error::Status`]; statement errors
    /// reported inside a 200 response become [`Error::Query`].
    pub async fn query(&self, query: &str) -> Result<ColumnarResponse, Error> {
        let url = self.query_url()?;
        debug!(%url, db = %self.database, query, "dispatching telemetry query");

        let mut request = self.http.get(url).query(&[
            ("db", self.database.as_str()),
            ("q", query),
            ("epoch", EPOCH_PRECISION),
        ]);
        if let Some(ref creds) = self.credentials {
            request = request.basic_auth(&creds.username, Some(creds.password.expose_secret()));
        }

        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        trace!(status = status.as_u16(), bytes = body.len(), "telemetry response received");

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let parsed: ColumnarResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;

        if let Some(message) = parsed.first_error() {
            return Err(Error::Query {
                message: message.to_owned(),
            });
        }

        Ok(parsed)
    }
}

/// Pull the `error` field out of a failure body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| body.trim().to_owned())
}
