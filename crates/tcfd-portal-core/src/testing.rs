//! Test scaffolding shared by the unit tests: a scripted transport and a
//! storage wrapper that counts session clears.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::transport::{HttpRequest, HttpResponse, Transport};
use crate::api::{ApiClient, ApiError, AuthService, Endpoints};
use crate::auth::storage::{MemoryStorage, SessionStorage, StorageError, AUTH_TOKEN_KEY};
use crate::auth::SessionStore;

pub const TEST_BASE_URL: &str = "http://svc.test";

/// Replays canned responses in order and records every request it sees.
/// Running out of responses is a network error, so an unexpected extra call
/// shows up as a failed assertion rather than a hang.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, ApiError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<HttpResponse, ApiError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, response: Result<HttpResponse, ApiError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Network("no scripted response left".to_string())))
    }
}

pub fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    let mut headers = HashMap::new();
    headers.insert("content-type".to_string(), "application/json".to_string());
    HttpResponse {
        status,
        headers,
        body: serde_json::to_vec(&body).unwrap(),
    }
}

pub fn status_response(status: u16) -> HttpResponse {
    HttpResponse {
        status,
        headers: HashMap::new(),
        body: Vec::new(),
    }
}

/// Memory storage that counts how many times the token was cleared, i.e.
/// how many times `logout` ran.
#[derive(Default)]
pub struct CountingStorage {
    inner: MemoryStorage,
    token_clears: AtomicUsize,
}

impl CountingStorage {
    pub fn token_clears(&self) -> usize {
        self.token_clears.load(Ordering::SeqCst)
    }
}

impl SessionStorage for CountingStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if key == AUTH_TOKEN_KEY {
            self.token_clears.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.remove(key)
    }
}

/// Storage whose writes always fail.
#[derive(Default)]
pub struct FailingStorage;

impl SessionStorage for FailingStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn set(&self, key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Io {
            key: key.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        Err(StorageError::Io {
            key: key.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }
}

pub fn endpoints() -> Endpoints {
    Endpoints {
        gateway: TEST_BASE_URL.to_string(),
        auth: TEST_BASE_URL.to_string(),
        tcfd: TEST_BASE_URL.to_string(),
        materiality: TEST_BASE_URL.to_string(),
        llm: TEST_BASE_URL.to_string(),
    }
}

/// Everything wired together over one scripted transport.
pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub storage: Arc<CountingStorage>,
    pub session: Arc<SessionStore>,
    pub api: ApiClient,
}

impl Harness {
    pub fn new(preserve_session_on_network_error: bool) -> Self {
        let transport = ScriptedTransport::new(Vec::new());
        let storage = Arc::new(CountingStorage::default());
        let auth = AuthService::new(transport.clone(), TEST_BASE_URL);
        let session = Arc::new(SessionStore::new(
            storage.clone(),
            auth,
            preserve_session_on_network_error,
        ));
        let api = ApiClient::new(transport.clone(), session.clone(), endpoints());
        Self {
            transport,
            storage,
            session,
            api,
        }
    }

    pub fn respond(&self, response: HttpResponse) -> &Self {
        self.transport.push(Ok(response));
        self
    }

    pub fn fail(&self, error: ApiError) -> &Self {
        self.transport.push(Err(error));
        self
    }
}
