//! In-memory [Platform] and [EventRegistry] for driving the controller in
//! tests. Clones share state so a test keeps a handle to inspect what the
//! controller did.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap, HashSet},
    rc::Rc,
};

use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use shared::CacheError;
use tokio_test::block_on;

use crate::{
    platform::{CachePartition, Platform, PlatformRequest, PlatformResponse},
    registry::{EventRegistry, FetchHandler, LifecycleEvent, LifecycleHandler, MessageHandler},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRequest {
    pub method: String,
    pub url: String,
}

impl MemoryRequest {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }
}

impl PlatformRequest for MemoryRequest {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn method(&self) -> String {
        self.method.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MemoryResponse {
    pub fn with_status(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn ok(body: &str) -> Self {
        Self::with_status(200, body)
    }
}

impl PlatformResponse for MemoryResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn duplicate(&self) -> Result<Self, CacheError> {
        Ok(self.clone())
    }
}

type Partitions = BTreeMap<String, BTreeMap<String, MemoryResponse>>;

#[derive(Default)]
struct State {
    partitions: RefCell<Partitions>,
    /// url -> response. Anything missing behaves like the network is down
    network: RefCell<HashMap<String, MemoryResponse>>,
    fetched: RefCell<Vec<String>>,
    deferred: RefCell<Vec<LocalBoxFuture<'static, ()>>>,
    failing_deletes: RefCell<HashSet<String>>,
    /// Urls whose writes fail. Empty string fails every write
    failing_puts: RefCell<HashSet<String>>,
    failing_lookups: Cell<bool>,
    failing_skip_waiting: Cell<bool>,
    failing_claim: Cell<bool>,
    skip_waiting_calls: Cell<usize>,
    claim_calls: Cell<usize>,
}

impl State {
    fn check_lookup(&self) -> Result<(), CacheError> {
        match self.failing_lookups.get() {
            true => Err(CacheError::Storage("cache storage unavailable".to_string())),
            false => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryPlatform {
    state: Rc<State>,
}

impl MemoryPlatform {
    pub fn serve(&self, url: &str, response: MemoryResponse) {
        self.state
            .network
            .borrow_mut()
            .insert(url.to_string(), response);
    }

    pub fn create_cache(&self, name: &str) {
        self.state
            .partitions
            .borrow_mut()
            .entry(name.to_string())
            .or_default();
    }

    pub fn put_cached(&self, name: &str, url: &str, response: MemoryResponse) {
        self.state
            .partitions
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .insert(url.to_string(), response);
    }

    pub fn stored(&self, name: &str, url: &str) -> Option<MemoryResponse> {
        self.state
            .partitions
            .borrow()
            .get(name)
            .and_then(|p| p.get(url))
            .cloned()
    }

    pub fn cache_keys(&self, name: &str) -> Vec<String> {
        self.state
            .partitions
            .borrow()
            .get(name)
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn cache_names_now(&self) -> Vec<String> {
        self.state.partitions.borrow().keys().cloned().collect()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.state.fetched.borrow().clone()
    }

    /// Number of tasks handed to [Platform::defer] that haven't run yet
    pub fn pending(&self) -> usize {
        self.state.deferred.borrow().len()
    }

    /// Runs the deferred tasks in the order they were handed over
    pub fn run_deferred(&self) {
        let tasks: Vec<_> = self.state.deferred.borrow_mut().drain(..).collect();
        for task in tasks {
            block_on(task);
        }
    }

    pub fn fail_delete(&self, name: &str) {
        self.state
            .failing_deletes
            .borrow_mut()
            .insert(name.to_string());
    }

    pub fn fail_puts(&self) {
        self.fail_put_for("");
    }

    pub fn fail_put_for(&self, url: &str) {
        self.state.failing_puts.borrow_mut().insert(url.to_string());
    }

    pub fn fail_lookups(&self) {
        self.state.failing_lookups.set(true);
    }

    pub fn fail_skip_waiting(&self) {
        self.state.failing_skip_waiting.set(true);
    }

    pub fn fail_claim(&self) {
        self.state.failing_claim.set(true);
    }

    pub fn skip_waiting_calls(&self) -> usize {
        self.state.skip_waiting_calls.get()
    }

    pub fn claim_calls(&self) -> usize {
        self.state.claim_calls.get()
    }
}

pub struct MemoryCache {
    name: String,
    state: Rc<State>,
}

#[async_trait(?Send)]
impl CachePartition for MemoryCache {
    type Request = MemoryRequest;
    type Response = MemoryResponse;

    async fn lookup(
        &self,
        request: &MemoryRequest,
    ) -> Result<Option<MemoryResponse>, CacheError> {
        self.state.check_lookup()?;

        let partitions = self.state.partitions.borrow();
        Ok(partitions
            .get(&self.name)
            .and_then(|p| p.get(&request.url))
            .cloned())
    }

    async fn put(
        &self,
        request: &MemoryRequest,
        response: MemoryResponse,
    ) -> Result<(), CacheError> {
        {
            let failing = self.state.failing_puts.borrow();
            if failing.contains("") || failing.contains(&request.url) {
                return Err(CacheError::Storage("quota exceeded".to_string()));
            }
        }

        self.state
            .partitions
            .borrow_mut()
            .entry(self.name.clone())
            .or_default()
            .insert(request.url.clone(), response);
        Ok(())
    }

    async fn remove(&self, request: &MemoryRequest) -> Result<bool, CacheError> {
        let mut partitions = self.state.partitions.borrow_mut();
        Ok(partitions
            .get_mut(&self.name)
            .and_then(|p| p.remove(&request.url))
            .is_some())
    }
}

#[async_trait(?Send)]
impl Platform for MemoryPlatform {
    type Request = MemoryRequest;
    type Response = MemoryResponse;
    type Cache = MemoryCache;

    fn request(&self, url: &str) -> Result<MemoryRequest, CacheError> {
        Ok(MemoryRequest::get(url))
    }

    async fn fetch(&self, request: &MemoryRequest) -> Result<MemoryResponse, CacheError> {
        self.state.fetched.borrow_mut().push(request.url.clone());

        self.state
            .network
            .borrow()
            .get(&request.url)
            .cloned()
            .ok_or_else(|| CacheError::network(&request.url, "Failed to fetch"))
    }

    async fn open(&self, name: &str) -> Result<MemoryCache, CacheError> {
        self.create_cache(name);
        Ok(MemoryCache {
            name: name.to_string(),
            state: self.state.clone(),
        })
    }

    async fn lookup_any(
        &self,
        request: &MemoryRequest,
    ) -> Result<Option<MemoryResponse>, CacheError> {
        self.state.check_lookup()?;

        let partitions = self.state.partitions.borrow();
        Ok(partitions
            .values()
            .find_map(|p| p.get(&request.url))
            .cloned())
    }

    async fn cache_names(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.cache_names_now())
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        if self.state.failing_deletes.borrow().contains(name) {
            return Err(CacheError::Storage(format!("can't delete {name}")));
        }
        Ok(self.state.partitions.borrow_mut().remove(name).is_some())
    }

    async fn skip_waiting(&self) -> Result<(), CacheError> {
        self.state
            .skip_waiting_calls
            .set(self.state.skip_waiting_calls.get() + 1);

        match self.state.failing_skip_waiting.get() {
            true => Err(CacheError::Platform("skipWaiting rejected".to_string())),
            false => Ok(()),
        }
    }

    async fn claim_clients(&self) -> Result<(), CacheError> {
        self.state.claim_calls.set(self.state.claim_calls.get() + 1);

        match self.state.failing_claim.get() {
            true => Err(CacheError::Platform("clients.claim rejected".to_string())),
            false => Ok(()),
        }
    }

    fn defer(&self, task: LocalBoxFuture<'static, ()>) {
        self.state.deferred.borrow_mut().push(task);
    }
}

/// Holds on to whatever was registered so a test can fire the events itself
#[derive(Default)]
pub struct RecordingRegistry {
    pub install: Option<LifecycleHandler>,
    pub activate: Option<LifecycleHandler>,
    pub fetch: Option<FetchHandler<MemoryRequest, MemoryResponse>>,
    pub message: Option<MessageHandler>,
    pub registered: Vec<LifecycleEvent>,
}

impl EventRegistry<MemoryRequest, MemoryResponse> for RecordingRegistry {
    fn on_install(&mut self, handler: LifecycleHandler) -> Result<(), CacheError> {
        self.registered.push(LifecycleEvent::Install);
        self.install = Some(handler);
        Ok(())
    }

    fn on_activate(&mut self, handler: LifecycleHandler) -> Result<(), CacheError> {
        self.registered.push(LifecycleEvent::Activate);
        self.activate = Some(handler);
        Ok(())
    }

    fn on_fetch(
        &mut self,
        handler: FetchHandler<MemoryRequest, MemoryResponse>,
    ) -> Result<(), CacheError> {
        self.registered.push(LifecycleEvent::Fetch);
        self.fetch = Some(handler);
        Ok(())
    }

    fn on_message(&mut self, handler: MessageHandler) -> Result<(), CacheError> {
        self.registered.push(LifecycleEvent::Message);
        self.message = Some(handler);
        Ok(())
    }
}
