//! [Platform] and [EventRegistry] backed by the real `ServiceWorkerGlobalScope`

use std::future::Future;

use async_trait::async_trait;
use futures::{future::LocalBoxFuture, FutureExt};
use js_sys::{Array, Promise};
use shared::CacheError;
use tracing::error;
use wasm_bindgen::{closure::Closure, convert::FromWasmAbi, JsCast, JsValue};
use wasm_bindgen_futures::{future_to_promise, spawn_local, JsFuture};
use web_sys::{
    Cache, CacheStorage, ExtendableEvent, ExtendableMessageEvent, FetchEvent, Request,
    RequestCache, RequestInit, Response, ServiceWorkerGlobalScope,
};

use crate::{
    platform::{CachePartition, Platform, PlatformRequest, PlatformResponse},
    registry::{EventRegistry, FetchHandler, LifecycleEvent, LifecycleHandler, MessageHandler},
};

impl PlatformRequest for Request {
    fn url(&self) -> String {
        Request::url(self)
    }

    fn method(&self) -> String {
        Request::method(self)
    }
}

impl PlatformResponse for Response {
    fn status(&self) -> u16 {
        Response::status(self)
    }

    fn duplicate(&self) -> Result<Self, CacheError> {
        // The inherent js clone, not Clone::clone which only copies the handle
        Response::clone(self).map_err(CacheError::platform_js)
    }
}

/// `cache.match` resolves to a Response or undefined
fn into_cached_response(url: &str, cached: JsValue) -> Result<Option<Response>, CacheError> {
    if cached.is_instance_of::<Response>() {
        Ok(Some(cached.into()))
    } else if cached.is_undefined() {
        Ok(None)
    } else {
        Err(CacheError::Storage(format!(
            "match for {url} returned something other than Response or undefined: {cached:?}"
        )))
    }
}

#[async_trait(?Send)]
impl CachePartition for Cache {
    type Request = Request;
    type Response = Response;

    async fn lookup(&self, request: &Request) -> Result<Option<Response>, CacheError> {
        let cached = JsFuture::from(self.match_with_request(request))
            .await
            .map_err(CacheError::storage_js)?;
        into_cached_response(&request.url(), cached)
    }

    async fn put(&self, request: &Request, response: Response) -> Result<(), CacheError> {
        JsFuture::from(self.put_with_request(request, &response))
            .await
            .map_err(CacheError::storage_js)?;
        Ok(())
    }

    async fn remove(&self, request: &Request) -> Result<bool, CacheError> {
        let deleted = JsFuture::from(self.delete_with_request(request))
            .await
            .map_err(CacheError::storage_js)?;
        Ok(deleted.as_bool().unwrap_or(false))
    }
}

pub struct BrowserPlatform {
    sw: ServiceWorkerGlobalScope,
    caches: CacheStorage,
}

impl BrowserPlatform {
    pub fn new(sw: ServiceWorkerGlobalScope) -> Result<Self, CacheError> {
        let caches = sw.caches().map_err(CacheError::platform_js)?;
        Ok(Self {
            sw,
            caches,
        })
    }
}

#[async_trait(?Send)]
impl Platform for BrowserPlatform {
    type Request = Request;
    type Response = Response;
    type Cache = Cache;

    fn request(&self, url: &str) -> Result<Request, CacheError> {
        let mut r_init = RequestInit::new();
        // Make sure we get the live file rather than whatever the http cache has
        r_init.method("GET").cache(RequestCache::NoStore);

        Request::new_with_str_and_init(url, &r_init).map_err(CacheError::platform_js)
    }

    async fn fetch(&self, request: &Request) -> Result<Response, CacheError> {
        let url = request.url();
        let response = JsFuture::from(self.sw.fetch_with_request(request))
            .await
            .map_err(|e| CacheError::network_js(&url, e))?;

        if response.is_instance_of::<Response>() {
            Ok(response.into())
        } else {
            Err(CacheError::network(
                url,
                format!("Fetch returned something other than a Response: {response:?}"),
            ))
        }
    }

    async fn open(&self, name: &str) -> Result<Cache, CacheError> {
        let cache: Cache = JsFuture::from(self.caches.open(name))
            .await
            .map_err(CacheError::storage_js)?
            .into();
        Ok(cache)
    }

    async fn lookup_any(&self, request: &Request) -> Result<Option<Response>, CacheError> {
        let cached = JsFuture::from(self.caches.match_with_request(request))
            .await
            .map_err(CacheError::storage_js)?;
        into_cached_response(&request.url(), cached)
    }

    async fn cache_names(&self) -> Result<Vec<String>, CacheError> {
        let keys: Array = JsFuture::from(self.caches.keys())
            .await
            .map_err(CacheError::storage_js)?
            .into();
        Ok(keys.iter().filter_map(|k| k.as_string()).collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let deleted = JsFuture::from(self.caches.delete(name))
            .await
            .map_err(CacheError::storage_js)?;
        Ok(deleted.as_bool().unwrap_or(false))
    }

    async fn skip_waiting(&self) -> Result<(), CacheError> {
        let promise = self.sw.skip_waiting().map_err(CacheError::platform_js)?;
        JsFuture::from(promise).await.map_err(CacheError::platform_js)?;
        Ok(())
    }

    async fn claim_clients(&self) -> Result<(), CacheError> {
        JsFuture::from(self.sw.clients().claim())
            .await
            .map_err(CacheError::platform_js)?;
        Ok(())
    }

    /// The write isn't tied to `respondWith`, the page gets its response
    /// as soon as the network answers
    fn defer(&self, task: LocalBoxFuture<'static, ()>) {
        spawn_local(task);
    }
}

fn into_promise<F>(future: F) -> Promise
where
    F: Future<Output = Result<JsValue, CacheError>> + 'static,
{
    future_to_promise(async move { future.await.map_err(JsValue::from) })
}

/// Adds listeners to the worker scope. The closures are leaked because they
/// have to live as long as the worker does
pub struct BrowserRegistry {
    sw: ServiceWorkerGlobalScope,
}

impl BrowserRegistry {
    pub fn new(sw: ServiceWorkerGlobalScope) -> Self {
        Self { sw }
    }

    fn listen<E, F>(&self, event: LifecycleEvent, listener: F) -> Result<(), CacheError>
    where
        E: FromWasmAbi + 'static,
        F: FnMut(E) + 'static,
    {
        let closure = Closure::<dyn FnMut(E)>::new(listener);
        self.sw
            .add_event_listener_with_callback(event.name(), closure.as_ref().unchecked_ref())
            .map_err(CacheError::platform_js)?;
        closure.forget();
        Ok(())
    }

    fn listen_extendable(
        &self,
        event: LifecycleEvent,
        handler: LifecycleHandler,
    ) -> Result<(), CacheError> {
        self.listen(event, move |e: ExtendableEvent| {
            let promise = into_promise(handler().map(|r| r.map(|_| JsValue::UNDEFINED)));
            if let Err(err) = e.wait_until(&promise) {
                error!("{}::wait_until: {err:?}", event.name());
            }
        })
    }
}

impl EventRegistry<Request, Response> for BrowserRegistry {
    fn on_install(&mut self, handler: LifecycleHandler) -> Result<(), CacheError> {
        self.listen_extendable(LifecycleEvent::Install, handler)
    }

    fn on_activate(&mut self, handler: LifecycleHandler) -> Result<(), CacheError> {
        self.listen_extendable(LifecycleEvent::Activate, handler)
    }

    fn on_fetch(&mut self, handler: FetchHandler<Request, Response>) -> Result<(), CacheError> {
        self.listen(LifecycleEvent::Fetch, move |e: FetchEvent| {
            // A rejected promise shows up in the page as a failed fetch
            let promise = into_promise(handler(e.request()).map(|r| r.map(JsValue::from)));
            if let Err(err) = e.respond_with(&promise) {
                error!("fetch::respond_with: {err:?}");
            }
        })
    }

    fn on_message(&mut self, handler: MessageHandler) -> Result<(), CacheError> {
        self.listen(LifecycleEvent::Message, move |e: ExtendableMessageEvent| {
            let promise = into_promise(
                handler(e.data().as_string()).map(|r| r.map(|_| JsValue::UNDEFINED)),
            );
            if let Err(err) = e.wait_until(&promise) {
                error!("message::wait_until: {err:?}");
            }
        })
    }
}
