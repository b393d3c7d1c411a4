//! Azure Cosmos DB document store.
//!
//! Authenticates with an Entra ID client-credential token and inserts builds
//! by executing the database's insert stored procedure inside the quality
//! channel's container. The procedure runs as a single transaction, so each
//! call either stores the document or stores nothing.
//!
//! The token is requested by the first insert and reused afterwards, so a
//! transient failure at the identity platform is retried like any other
//! transient store failure.

use std::cell::RefCell;
use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;
use url::Url;

use super::{DocumentStore, StoreError};
use crate::logging::Logger;
use crate::record::BuildRecord;

/// Entra ID public cloud authority.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com/";
/// REST API version sent with every data-plane request.
const API_VERSION: &str = "2018-12-31";
/// Value of the `_partitionKey` property inside each build container.
const DOCUMENT_PARTITION_VALUE: &str = "";
/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Service principal used to obtain a data-plane token.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredential {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredential")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Where and how build records are stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CosmosSettings {
    /// Account endpoint, e.g. `https://account.documents.azure.com:443/`
    pub endpoint: Url,
    /// Identity platform issuing tokens, normally [`DEFAULT_AUTHORITY_HOST`]
    pub authority_host: Url,
    pub database: String,
    /// Stored procedure that performs the insert
    pub procedure: String,
    pub request_timeout: Duration,
}

/// An authenticated session against one Cosmos DB account.
pub struct CosmosStore {
    client: Client,
    settings: CosmosSettings,
    credential: ClientCredential,
    authorization: RefCell<Option<String>>,
    log: Logger,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Document body as stored: the record plus its in-container partition value.
#[derive(Serialize)]
struct StoredBuild<'a> {
    #[serde(flatten)]
    record: &'a BuildRecord,
    #[serde(rename = "_partitionKey")]
    partition_value: &'a str,
}

impl CosmosStore {
    /// Open a session without contacting the service.
    ///
    /// The token is requested by the first [`DocumentStore::atomic_insert`].
    pub fn connect(
        settings: CosmosSettings,
        credential: ClientCredential,
        log: Logger,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!("publish-build/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Rejected {
                status: None,
                message: format!("http client build failed: {e}"),
            })?;

        Ok(Self {
            client,
            settings,
            credential,
            authorization: RefCell::new(None),
            log,
        })
    }

    /// Open a session and exchange `credential` for a token right away.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unauthorized`] when the identity platform rejects
    /// the credential, or a transport classification when it cannot be reached.
    pub fn authenticate(
        settings: CosmosSettings,
        credential: &ClientCredential,
    ) -> Result<Self, StoreError> {
        let store = Self::connect(settings, credential.clone(), Logger::silent())?;
        store.authorization()?;
        Ok(store)
    }

    pub fn settings(&self) -> &CosmosSettings {
        &self.settings
    }

    /// The cached `authorization` header, fetching a token on first use.
    fn authorization(&self) -> Result<String, StoreError> {
        if let Some(authorization) = self.authorization.borrow().as_ref() {
            return Ok(authorization.clone());
        }

        let token = fetch_token(&self.client, &self.settings, &self.credential, self.log)?;
        let authorization = aad_authorization(&token);
        *self.authorization.borrow_mut() = Some(authorization.clone());
        Ok(authorization)
    }
}

impl DocumentStore for CosmosStore {
    fn atomic_insert(&self, partition: &str, record: &BuildRecord) -> Result<(), StoreError> {
        let authorization = self.authorization()?;
        let url = procedure_url(&self.settings, partition)?;
        let body = [StoredBuild {
            record,
            partition_value: DOCUMENT_PARTITION_VALUE,
        }];
        let partition_header = serde_json::to_string(&[DOCUMENT_PARTITION_VALUE]).map_err(|e| {
            StoreError::Rejected {
                status: None,
                message: format!("partition key encoding failed: {e}"),
            }
        })?;

        self.log.verbose(2, format!("POST {url}"));

        let response = self
            .client
            .post(url)
            .header("authorization", authorization)
            .header("x-ms-date", http_date(OffsetDateTime::now_utc())?)
            .header("x-ms-version", API_VERSION)
            .header("x-ms-documentdb-partitionkey", partition_header)
            .json(&body)
            .send()
            .map_err(classify_transport)?;

        let status = response.status();
        self.log.verbose(2, format!("Store responded with {status}"));

        if status.is_success() {
            return Ok(());
        }

        let retry_after = retry_after(response.headers());
        Err(classify_status(
            status,
            retry_after,
            record.id(),
            response_text(response),
        ))
    }
}

fn fetch_token(
    client: &Client,
    settings: &CosmosSettings,
    credential: &ClientCredential,
    log: Logger,
) -> Result<String, StoreError> {
    let token_url = token_url(&settings.authority_host, &credential.tenant_id)?;
    let scope = format!(
        "{}/.default",
        settings.endpoint.origin().ascii_serialization()
    );

    log.verbose(2, format!("Requesting token for {scope}"));

    let response = client
        .post(token_url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("scope", scope.as_str()),
        ])
        .send()
        .map_err(classify_transport)?;

    let status = response.status();
    if !status.is_success() {
        let hint = retry_after(response.headers());
        let message = response_text(response);
        return Err(match status.as_u16() {
            400 | 401 | 403 => StoreError::Unauthorized(message),
            _ => classify_status(status, hint, "", message),
        });
    }

    let token: TokenResponse = response.json().map_err(|e| StoreError::Rejected {
        status: Some(status.as_u16()),
        message: format!("unreadable token response: {e}"),
    })?;

    Ok(token.access_token)
}

/// `{tenant}/oauth2/v2.0/token` under the authority host.
pub(crate) fn token_url(authority_host: &Url, tenant_id: &str) -> Result<Url, StoreError> {
    let mut url = authority_host.clone();
    url.path_segments_mut()
        .map_err(|()| not_a_base(authority_host))?
        .pop_if_empty()
        .extend([tenant_id, "oauth2", "v2.0", "token"]);
    Ok(url)
}

/// `dbs/{database}/colls/{partition}/sprocs/{procedure}` under the endpoint.
pub(crate) fn procedure_url(settings: &CosmosSettings, partition: &str) -> Result<Url, StoreError> {
    let mut url = settings.endpoint.clone();
    url.path_segments_mut()
        .map_err(|()| not_a_base(&settings.endpoint))?
        .pop_if_empty()
        .extend([
            "dbs",
            settings.database.as_str(),
            "colls",
            partition,
            "sprocs",
            settings.procedure.as_str(),
        ]);
    Ok(url)
}

fn not_a_base(url: &Url) -> StoreError {
    StoreError::Rejected {
        status: None,
        message: format!("'{url}' cannot be a base URL"),
    }
}

/// URL-encoded `authorization` header value for an Entra ID token.
pub(crate) fn aad_authorization(token: &str) -> String {
    let raw = format!("type=aad&ver=1.0&sig={token}");
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// RFC 1123 date, as required by `x-ms-date`.
pub(crate) fn http_date(at: OffsetDateTime) -> Result<String, StoreError> {
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    at.to_offset(time::UtcOffset::UTC)
        .format(&format)
        .map_err(|e| StoreError::Rejected {
            status: None,
            message: format!("date formatting failed: {e}"),
        })
}

/// Throttling hint: `x-ms-retry-after-ms`, falling back to `retry-after` seconds.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
    };

    header("x-ms-retry-after-ms")
        .map(Duration::from_millis)
        .or_else(|| header("retry-after").map(Duration::from_secs))
}

/// Map a non-success HTTP status to the store's failure taxonomy.
pub(crate) fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    record_id: &str,
    message: String,
) -> StoreError {
    match status.as_u16() {
        409 => StoreError::Conflict {
            id: record_id.to_string(),
        },
        // Errors raised inside the procedure come back as 400 with the
        // original conflict message.
        400 if message.contains("already exists") => StoreError::Conflict {
            id: record_id.to_string(),
        },
        429 => StoreError::Throttled { retry_after },
        401 | 403 => StoreError::Unauthorized(message),
        408 => StoreError::Timeout(message),
        449 | 500..=599 => StoreError::Unavailable(format!("{status}: {message}")),
        code => StoreError::Rejected {
            status: Some(code),
            message,
        },
    }
}

/// Map a transport failure to the store's failure taxonomy.
fn classify_transport(error: reqwest::Error) -> StoreError {
    if error.is_timeout() {
        StoreError::Timeout(error.to_string())
    } else if error.is_builder() {
        StoreError::Rejected {
            status: None,
            message: error.to_string(),
        }
    } else {
        StoreError::Unavailable(error.to_string())
    }
}

fn response_text(response: Response) -> String {
    response
        .text()
        .unwrap_or_else(|e| format!("<unreadable response body: {e}>"))
}
