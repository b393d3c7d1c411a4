#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::io::Read;
use std::thread;
use std::time::Duration;

use publish_build::config::{PublishConfig, PublishConfigBuilder};
use publish_build::record::BuildRecord;
use publish_build::retry::Sleeper;
use publish_build::store::{DocumentStore, StoreError};
use tiny_http::{Header, Response, Server};
use url::Url;

pub const COMMIT: &str = "4f1b2c3d4e5f60718293a4b5c6d7e8f901234567";
pub const TOKEN_BODY: &str = r#"{"token_type":"Bearer","expires_in":3599,"access_token":"tok"}"#;

/// In-memory partitioned store with insert-if-absent semantics.
///
/// Scripted failures are replayed first, one per call. A failure scripted as
/// `lost_ack` stores the document and then reports the error, which is how a
/// dropped acknowledgement looks from the client side.
#[derive(Default)]
pub struct MemoryStore {
    partitions: RefCell<BTreeMap<String, BTreeMap<String, serde_json::Value>>>,
    script: RefCell<VecDeque<(StoreError, bool)>>,
    calls: RefCell<u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(self, error: StoreError) -> Self {
        self.script.borrow_mut().push_back((error, false));
        self
    }

    pub fn lose_ack(self, error: StoreError) -> Self {
        self.script.borrow_mut().push_back((error, true));
        self
    }

    pub fn calls(&self) -> u32 {
        *self.calls.borrow()
    }

    pub fn documents(&self, partition: &str) -> Vec<serde_json::Value> {
        self.partitions
            .borrow()
            .get(partition)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    fn insert(&self, partition: &str, record: &BuildRecord) -> Result<(), StoreError> {
        let mut partitions = self.partitions.borrow_mut();
        let documents = partitions.entry(partition.to_string()).or_default();
        if documents.contains_key(record.id()) {
            return Err(StoreError::Conflict {
                id: record.id().to_string(),
            });
        }
        documents.insert(
            record.id().to_string(),
            serde_json::to_value(record).unwrap(),
        );
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn atomic_insert(&self, partition: &str, record: &BuildRecord) -> Result<(), StoreError> {
        *self.calls.borrow_mut() += 1;
        let scripted = self.script.borrow_mut().pop_front();
        match scripted {
            Some((error, true)) => {
                self.insert(partition, record)?;
                Err(error)
            }
            Some((error, false)) => Err(error),
            None => self.insert(partition, record),
        }
    }
}

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Sleeper for &RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.borrow_mut().push(duration);
    }
}

/// Builder pre-filled with every required key.
pub fn config_builder(version: &str, quality: &str) -> PublishConfigBuilder {
    PublishConfig::builder()
        .version(version)
        .quality(quality)
        .commit(COMMIT)
        .queued_by("Release Bot")
        .source_branch("refs/heads/main")
        .tenant_id("tenant")
        .client_id("client")
        .client_secret("secret")
        .endpoint("https://account.documents.azure.com:443/")
}

/// A request as the stub server saw it.
pub struct Captured {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_token_request(&self) -> bool {
        self.url.ends_with("/oauth2/v2.0/token")
    }
}

/// Canned reply: status, extra headers, body.
pub type Reply = (u16, Vec<(&'static str, &'static str)>, &'static str);

pub fn token_ok() -> Reply {
    (200, vec![("Content-Type", "application/json")], TOKEN_BODY)
}

/// Serve `replies` in order on one local server, recording each request.
///
/// The returned URL serves both as the account endpoint and the authority
/// host; joining the handle yields every request received.
pub fn serve(replies: Vec<Reply>) -> (Url, thread::JoinHandle<Vec<Captured>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let base = Url::parse(&format!("http://{}/", server.server_addr())).unwrap();

    let handle = thread::spawn(move || {
        let mut captured = Vec::new();
        for (status, headers, body) in replies {
            let Ok(mut request) = server.recv() else {
                break;
            };

            let mut text = String::new();
            request.as_reader().read_to_string(&mut text).unwrap();
            captured.push(Captured {
                method: request.method().to_string(),
                url: request.url().to_string(),
                headers: request
                    .headers()
                    .iter()
                    .map(|h| (h.field.to_string(), h.value.to_string()))
                    .collect(),
                body: text,
            });

            let mut response =
                Response::from_string(body).with_status_code(tiny_http::StatusCode(status));
            for (field, value) in headers {
                let header = Header::from_bytes(field.as_bytes(), value.as_bytes()).unwrap();
                response = response.with_header(header);
            }
            request.respond(response).unwrap();
        }
        captured
    });

    (base, handle)
}
