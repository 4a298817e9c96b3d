//! HTTP transport for non-browser hosts.
//!
//! Beacon sends cannot block, so outside a browser they are appended to a
//! local JSON-lines log and replayed by [`BeaconLog::drain`] once a runtime
//! is available.

use async_trait::async_trait;
use footprint_core::{BatchPayload, Error, GeoLocation, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

use crate::config::TrackerConfig;
use crate::platform::{BeaconEndpoint, PlatformTransport};

const LOCATION_PATH: &str = "/api/analytics/location";

/// One pending beacon send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconRecord {
    pub endpoint: String,
    pub body: Value,
}

/// Append-only file of beacon sends awaiting delivery.
#[derive(Debug)]
pub struct BeaconLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl BeaconLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a beacon. Synchronous; returns whether the record was written.
    pub fn append(&self, endpoint: BeaconEndpoint, body: &[u8]) -> bool {
        let body: Value = match serde_json::from_slice(body) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Refusing beacon with non-JSON body");
                return false;
            }
        };
        let record = BeaconRecord {
            endpoint: endpoint.path().to_string(),
            body,
        };
        let _guard = self.write_lock.lock();
        self.write_records(std::slice::from_ref(&record))
    }

    fn write_records(&self, records: &[BeaconRecord]) -> bool {
        let mut lines = String::new();
        for record in records {
            match serde_json::to_string(record) {
                Ok(line) => {
                    lines.push_str(&line);
                    lines.push('\n');
                }
                Err(e) => warn!(error = %e, endpoint = %record.endpoint, "Dropping unencodable beacon"),
            }
        }
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(lines.as_bytes()));
        match written {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Failed to write beacon log");
                false
            }
        }
    }

    /// Reads the pending records, skipping malformed lines.
    pub fn records(&self) -> Result<Vec<BeaconRecord>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::storage(format!("beacon log: {}", e))),
        };
        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed beacon record");
                    None
                }
            })
            .collect())
    }

    /// Posts every pending record to the collector and rewrites the log with
    /// whatever could not be delivered. Returns the number delivered.
    pub async fn drain(&self, client: &reqwest::Client, base: &Url) -> Result<usize> {
        let records = {
            let _guard = self.write_lock.lock();
            let records = self.records()?;
            if records.is_empty() {
                return Ok(0);
            }
            // Claim the records; new appends start a fresh log.
            std::fs::remove_file(&self.path)
                .map_err(|e| Error::storage(format!("beacon log: {}", e)))?;
            records
        };

        let mut delivered = 0;
        let mut remaining = Vec::new();
        for record in records {
            let url = match base.join(&record.endpoint) {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, endpoint = %record.endpoint, "Beacon endpoint unresolvable");
                    remaining.push(record);
                    continue;
                }
            };
            match client.post(url).json(&record.body).send().await {
                Ok(response) if response.status().is_success() => delivered += 1,
                Ok(response) => {
                    warn!(status = %response.status(), endpoint = %record.endpoint, "Beacon replay rejected");
                    remaining.push(record);
                }
                Err(e) => {
                    warn!(error = %e, endpoint = %record.endpoint, "Beacon replay failed");
                    remaining.push(record);
                }
            }
        }

        if !remaining.is_empty() {
            let _guard = self.write_lock.lock();
            self.write_records(&remaining);
        }

        debug!(delivered, remaining = remaining.len(), "Drained beacon log");
        Ok(delivered)
    }
}

/// reqwest-backed transport talking to the collector.
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
    beacons: BeaconLog,
}

impl HttpTransport {
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        let base = Url::parse(&config.endpoint)
            .map_err(|e| Error::validation(format!("endpoint: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base,
            beacons: BeaconLog::new(&config.beacon_log_path),
        })
    }

    pub fn beacon_log(&self) -> &BeaconLog {
        &self.beacons
    }

    /// Replays beacons recorded by earlier unloads.
    pub async fn drain_beacons(&self) -> Result<usize> {
        self.beacons.drain(&self.client, &self.base).await
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::validation(format!("endpoint path: {}", e)))
    }
}

#[async_trait]
impl PlatformTransport for HttpTransport {
    async fn post_batch(&self, payload: &BatchPayload) -> Result<()> {
        let url = self.url(BeaconEndpoint::Batch.path())?;
        debug!(url = %url, count = payload.events.len(), "Posting batch");

        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Status(response.status().as_u16()));
        }
        Ok(())
    }

    fn send_beacon(&self, endpoint: BeaconEndpoint, body: &[u8]) -> bool {
        self.beacons.append(endpoint, body)
    }

    async fn fetch_location(&self) -> Result<GeoLocation> {
        let url = self.url(LOCATION_PATH)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::lookup(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::lookup(format!(
                "location endpoint returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| Error::lookup(format!("Invalid location response: {}", e)))
    }
}
