//! The host the worker runs in: cache storage, the network and the handful
//! of worker scope controls the lifecycle needs. The browser implementation
//! lives in [crate::browser], tests use an in-memory one.

use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use http::{Method, StatusCode};
use shared::{CacheError, ResultContext};
use tracing::warn;

/// Requests are cheap handles, cloning one doesn't copy a body
pub trait PlatformRequest: Clone {
    fn url(&self) -> String;
    fn method(&self) -> String;

    /// Only GETs can be stored
    fn is_get(&self) -> bool {
        self.method().eq_ignore_ascii_case(Method::GET.as_str())
    }
}

pub trait PlatformResponse: Sized {
    /// Raw status. Opaque responses report 0 so this isn't a [StatusCode]
    fn status(&self) -> u16;

    /// A copy whose body can be read independently of the original. Needed
    /// because a body can only be consumed once
    fn duplicate(&self) -> Result<Self, CacheError>;

    /// Exactly 200, the only status worth storing opportunistically
    fn is_storable(&self) -> bool {
        self.status() == StatusCode::OK.as_u16()
    }

    /// Any 2xx
    fn is_ok(&self) -> bool {
        (200..300).contains(&self.status())
    }
}

/// One named, versioned bucket of request/response pairs
#[async_trait(?Send)]
pub trait CachePartition {
    type Request: PlatformRequest;
    type Response: PlatformResponse;

    async fn lookup(
        &self,
        request: &Self::Request,
    ) -> Result<Option<Self::Response>, CacheError>;

    /// Replaces any existing entry for the request
    async fn put(
        &self,
        request: &Self::Request,
        response: Self::Response,
    ) -> Result<(), CacheError>;

    /// Ok(false) if there was no entry
    async fn remove(&self, request: &Self::Request) -> Result<bool, CacheError>;

    /// Writes every entry or none of them.
    ///
    /// Entries are written in order. When one write fails, the entries
    /// already written are put back to what they were before (removed if
    /// they were absent) and the write error is returned
    async fn put_all(
        &self,
        entries: Vec<(Self::Request, Self::Response)>,
    ) -> Result<(), CacheError> {
        let mut written: Vec<(Self::Request, Option<Self::Response>)> =
            Vec::with_capacity(entries.len());

        for (request, response) in entries {
            // Unreadable previous entries are treated as absent
            let previous = self.lookup(&request).await.ok().flatten();

            if let Err(e) = self
                .put(&request, response)
                .await
                .with_context(|| format!("put_all::put {}", request.url()))
            {
                for (request, previous) in written.into_iter().rev() {
                    let restored = match previous {
                        Some(previous) => self.put(&request, previous).await,
                        None => self.remove(&request).await.map(|_| ()),
                    };
                    if let Err(e) = restored {
                        warn!(url = request.url(), "Failed to roll back cache entry: {e}");
                    }
                }
                return Err(e);
            }

            written.push((request, previous));
        }

        Ok(())
    }
}

#[async_trait(?Send)]
pub trait Platform {
    type Request: PlatformRequest + 'static;
    type Response: PlatformResponse + 'static;
    type Cache: CachePartition<Request = Self::Request, Response = Self::Response> + 'static;

    /// Builds a GET for a (possibly relative) url
    fn request(&self, url: &str) -> Result<Self::Request, CacheError>;

    /// Fails only when no response arrived at all. Error statuses are Ok
    async fn fetch(&self, request: &Self::Request) -> Result<Self::Response, CacheError>;

    /// Opens the named partition, creating it if absent
    async fn open(&self, name: &str) -> Result<Self::Cache, CacheError>;

    /// Looks the request up across every partition
    async fn lookup_any(
        &self,
        request: &Self::Request,
    ) -> Result<Option<Self::Response>, CacheError>;

    async fn cache_names(&self) -> Result<Vec<String>, CacheError>;

    /// Ok(false) if there was nothing to delete
    async fn delete(&self, name: &str) -> Result<bool, CacheError>;

    async fn skip_waiting(&self) -> Result<(), CacheError>;

    async fn claim_clients(&self) -> Result<(), CacheError>;

    /// Runs `task` after the current handler has returned
    fn defer(&self, task: LocalBoxFuture<'static, ()>);
}
