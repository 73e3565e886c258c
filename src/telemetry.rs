//! Read-only access to the telemetry dataset store.
//!
//! The store exposes keyed records under a dataset and a path. Two feeds
//! are read from it:
//!
//! - the device status feed (`analytics` dataset, `DatasetInfo/Devices`),
//!   keyed by serial number;
//! - each device's running config (`<serial>` dataset,
//!   `Config/running/lines`), keyed by line node id.
//!
//! [`DatasetSource`] is the seam between the transport and the decoding
//! below; [`ApiClient`] is the HTTP implementation.

use std::{fmt, path::Path, thread, time::Duration};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{
    Deserialize,
    Deserializer,
    de::{MapAccess, Visitor},
};

use crate::{
    catalog::StatusEntry,
    error::{Error, Result},
    records::LinkNode,
};

pub const ANALYTICS_DATASET: &str = "analytics";
pub const DEVICES_PATH: &[&str] = &["DatasetInfo", "Devices"];
pub const CONFIG_LINES_PATH: &[&str] = &["Config", "running", "lines"];

/// Characters escaped in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// One key/value update read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedRecord {
    pub key: String,
    pub value: serde_json::Value,
}

/// Anything that can list the keyed records under a dataset path.
pub trait DatasetSource: Sync {
    fn get(&self, dataset: &str, path: &[&str]) -> Result<Vec<KeyedRecord>>;
}

#[derive(Debug, Deserialize)]
struct DeviceStatusValue {
    hostname: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ConfigLineValue {
    text: String,
    #[serde(default)]
    previous: Option<String>,
    #[serde(default)]
    next: Option<String>,
}

/// Read the device status feed, in delivery order.
pub fn device_status_feed(
    source: &impl DatasetSource,
) -> Result<Vec<StatusEntry>> {
    source
        .get(ANALYTICS_DATASET, DEVICES_PATH)?
        .into_iter()
        .map(|record| {
            let value: DeviceStatusValue =
                serde_json::from_value(record.value)?;
            Ok(StatusEntry {
                serial_number: record.key,
                hostname: value.hostname,
                status: value.status,
            })
        })
        .collect()
}

/// Read the line records of one device's running config.
///
/// A missing `previous` or `next` key becomes a `None` link.
pub fn config_nodes(
    source: &impl DatasetSource,
    serial_number: &str,
) -> Result<Vec<LinkNode>> {
    let nodes: Vec<LinkNode> = source
        .get(serial_number, CONFIG_LINES_PATH)?
        .into_iter()
        .map(|record| {
            let value: ConfigLineValue = serde_json::from_value(record.value)?;
            Ok(LinkNode {
                id: record.key,
                text: value.text,
                predecessor: value.previous,
                successor: value.next,
            })
        })
        .collect::<Result<_>>()?;

    tracing::debug!(
        serial = serial_number,
        nodes = nodes.len(),
        "fetched config lines"
    );
    Ok(nodes)
}

// -- Wire format --

#[derive(Debug, Deserialize)]
struct Batch {
    #[serde(default)]
    notifications: Vec<Notification>,
}

#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(default, deserialize_with = "ordered_updates")]
    updates: Vec<(String, UpdateRepr)>,
}

/// Updates come either wrapped as `{"key": .., "value": ..}` or as the bare
/// value.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UpdateRepr {
    Wrapped { value: serde_json::Value },
    Bare(serde_json::Value),
}

impl UpdateRepr {
    fn into_value(self) -> serde_json::Value {
        match self {
            Self::Wrapped { value } | Self::Bare(value) => value,
        }
    }
}

/// Deserialize a JSON object into its entries, keeping document order.
fn ordered_updates<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<(String, UpdateRepr)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<(String, UpdateRepr)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of updates")
        }

        fn visit_map<A>(
            self,
            mut map: A,
        ) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(EntriesVisitor)
}

/// Parse a response body holding one or more concatenated JSON batches.
fn parse_batches(body: &str) -> Result<Vec<KeyedRecord>> {
    let mut records = Vec::new();
    for batch in serde_json::Deserializer::from_str(body).into_iter::<Batch>() {
        for notification in batch?.notifications {
            for (key, update) in notification.updates {
                records.push(KeyedRecord {
                    key,
                    value: update.into_value(),
                });
            }
        }
    }
    Ok(records)
}

// -- HTTP transport --

/// Transport tuning for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Deadline for each request.
    pub timeout: Duration,
    /// Extra attempts after a transient failure.
    pub retries: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// HTTP client for the store's REST interface.
pub struct ApiClient {
    base_url: String,
    token: String,
    http: reqwest::blocking::Client,
    options: ClientOptions,
}

impl ApiClient {
    pub fn new(
        apiserver: &str,
        token: String,
        options: ClientOptions,
    ) -> Result<Self> {
        let base_url = normalize_base_url(apiserver)?;
        let http = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .build()?;
        Ok(Self {
            base_url,
            token,
            http,
            options,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, dataset: &str, path: &[&str]) -> String {
        let mut url = format!("{}/api/v1/rest/", self.base_url);
        url.extend(utf8_percent_encode(dataset, PATH_SEGMENT));
        for segment in path {
            url.push('/');
            url.extend(utf8_percent_encode(segment, PATH_SEGMENT));
        }
        url
    }

    fn fetch_body(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            let sent = self.http.get(url).bearer_auth(&self.token).send();
            let retry_reason = match sent {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.text()?);
                }
                Ok(response) => {
                    let status = response.status();
                    let transient = status.is_server_error()
                        || status == reqwest::StatusCode::TOO_MANY_REQUESTS;
                    if !transient || attempt >= self.options.retries {
                        return Err(Error::Api {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }
                    format!("status {status}")
                }
                Err(e) => {
                    let transient = e.is_timeout() || e.is_connect();
                    if !transient || attempt >= self.options.retries {
                        return Err(e.into());
                    }
                    e.to_string()
                }
            };

            attempt += 1;
            tracing::warn!(
                url,
                attempt,
                max = self.options.retries,
                "retrying request: {retry_reason}"
            );
            thread::sleep(self.options.backoff * attempt);
        }
    }
}

impl DatasetSource for ApiClient {
    fn get(&self, dataset: &str, path: &[&str]) -> Result<Vec<KeyedRecord>> {
        let url = self.url(dataset, path);
        tracing::debug!(url = %url, "fetching");
        parse_batches(&self.fetch_body(&url)?)
    }
}

/// Accept a bare host or a full URL; a bare host is given `https://`.
pub fn normalize_base_url(apiserver: &str) -> Result<String> {
    let trimmed = apiserver.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Config("API server must not be empty".into()));
    }
    if trimmed.contains("://") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("https://{trimmed}"))
    }
}

/// Resolve a token source: a path to a file holding the token, or the
/// token itself.
pub fn resolve_token(source: &str) -> Result<String> {
    let path = Path::new(source);
    let token = if path.is_file() {
        std::fs::read_to_string(path)?.trim().to_string()
    } else {
        source.trim().to_string()
    };

    if token.is_empty() {
        return Err(Error::Config("access token is empty".into()));
    }
    Ok(token)
}
