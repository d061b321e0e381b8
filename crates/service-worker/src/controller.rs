use futures::future::{join_all, try_join_all, FutureExt};
use shared::{
    CacheConfig, CacheError, CacheLookup, Classifier, RequestKind, ResultContext, SKIP_WAITING,
};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::platform::{CachePartition, Platform, PlatformRequest, PlatformResponse};

/// Answers the worker's lifecycle events against one versioned partition
pub struct CacheController<P: Platform> {
    config: CacheConfig,
    classifier: Classifier,
    platform: P,
}

impl<P: Platform> CacheController<P> {
    pub fn new(config: CacheConfig, platform: P) -> Self {
        let classifier = Classifier::from_config(&config);
        Self {
            config,
            classifier,
            platform,
        }
    }

    pub fn classify(&self, url: &str) -> RequestKind {
        self.classifier.classify(url)
    }

    /// Stores every shell asset in the current partition.
    ///
    /// All the assets are fetched before anything is written and the writes
    /// go through [CachePartition::put_all], so one failure leaves the
    /// partition as it was and the browser retries the install on the next
    /// load
    #[instrument(skip(self), fields(cache = %self.config.cache_name))]
    pub async fn install(&self) -> Result<(), CacheError> {
        let cache = self
            .platform
            .open(&self.config.cache_name)
            .await
            .context("install::open")?;

        let fetched = try_join_all(
            self.config
                .shell_assets
                .iter()
                .map(|url| self.fetch_shell_asset(url)),
        )
        .await
        .map_err(|e| {
            error!("Failed to fetch the shell: {e}");
            e
        })?;

        cache
            .put_all(fetched)
            .await
            .context("install::put_all")
            .map_err(|e| {
                error!("Failed to store the shell: {e}");
                e
            })?;

        info!(assets = self.config.shell_assets.len(), "Install successful");

        if self.config.skip_waiting {
            // Not fatal, the worker just waits for the old pages to close
            if let Err(e) = self.platform.skip_waiting().await {
                warn!("skip_waiting failed: {e}");
            }
        }

        Ok(())
    }

    async fn fetch_shell_asset(
        &self,
        url: &str,
    ) -> Result<(P::Request, P::Response), CacheError> {
        let install_error = |source: CacheError| CacheError::Install {
            url: url.to_string(),
            source: Box::new(source),
        };

        let request = self.platform.request(url).map_err(install_error)?;
        let response = self.platform.fetch(&request).await.map_err(install_error)?;

        if !response.is_ok() {
            return Err(install_error(CacheError::Status {
                url: request.url(),
                status: response.status(),
            }));
        }

        trace!(url, "Fetched shell asset");
        Ok((request, response))
    }

    /// Deletes every partition but the current one and optionally takes over
    /// the open pages. Returns the names that were deleted
    #[instrument(skip(self), fields(cache = %self.config.cache_name))]
    pub async fn activate(&self) -> Result<Vec<String>, CacheError> {
        let stale: Vec<String> = self
            .platform
            .cache_names()
            .await
            .context("activate::cache_names")?
            .into_iter()
            .filter(|name| self.config.is_stale(name))
            .collect();

        let results = join_all(stale.iter().map(|name| self.platform.delete(name))).await;

        let mut deleted = Vec::with_capacity(stale.len());
        for (name, result) in stale.into_iter().zip(results) {
            match result {
                Ok(true) => {
                    info!(stale = name, "Deleted old cache");
                    deleted.push(name);
                }
                Ok(false) => debug!(stale = name, "Old cache already gone"),
                // Left for the next activation
                Err(e) => warn!(stale = name, "Failed to delete old cache: {e}"),
            }
        }

        if self.config.claim_clients {
            self.platform
                .claim_clients()
                .await
                .context("activate::claim_clients")?;
        }

        Ok(deleted)
    }

    /// Routes an intercepted request by its [RequestKind]
    pub async fn fetch(&self, request: P::Request) -> Result<P::Response, CacheError> {
        let url = request.url();

        if !request.is_get() {
            debug!(url, method = request.method(), "Not cacheable, straight to network");
            return self.platform.fetch(&request).await;
        }

        let kind = self.classify(&url);
        debug!(url, %kind, "Intercepted fetch");

        match kind {
            RequestKind::Passthrough => self.platform.fetch(&request).await,
            RequestKind::Data => self.network_first(&request).await,
            RequestKind::Shell => self.cache_first(&request).await,
        }
    }

    /// Live data. A network failure is returned as is, the page has to know
    /// it isn't looking at fresh data
    async fn network_first(&self, request: &P::Request) -> Result<P::Response, CacheError> {
        let response = self.platform.fetch(request).await.map_err(|e| {
            warn!(url = request.url(), "Data fetch failed: {e}");
            e
        })?;

        if response.is_storable() {
            self.store(request, &response).await;
        } else {
            debug!(
                url = request.url(),
                status = response.status(),
                "Not storing data response"
            );
        }

        Ok(response)
    }

    async fn cache_first(&self, request: &P::Request) -> Result<P::Response, CacheError> {
        match self.lookup(request).await {
            Ok(Some(cached)) => {
                debug!(url = request.url(), "HIT");
                return Ok(cached);
            }
            Ok(None) => debug!(url = request.url(), "MISS"),
            // A broken cache shouldn't take the network down with it
            Err(e) => warn!(url = request.url(), "Cache lookup failed, using network: {e}"),
        }

        let response = self.platform.fetch(request).await?;

        if self.config.shell_write_back && response.is_storable() {
            self.store(request, &response).await;
        }

        Ok(response)
    }

    async fn lookup(&self, request: &P::Request) -> Result<Option<P::Response>, CacheError> {
        match self.config.lookup {
            CacheLookup::Current => {
                let cache = self.platform.open(&self.config.cache_name).await?;
                cache.lookup(request).await
            }
            CacheLookup::AnyPartition => self.platform.lookup_any(request).await,
        }
    }

    /// Hands a copy of the response to the current partition. The copy is
    /// taken before the original goes back to the page, the write itself
    /// runs after. Failures are logged and otherwise ignored
    async fn store(&self, request: &P::Request, response: &P::Response) {
        let url = request.url();

        let prepared = async {
            let copy = response.duplicate()?;
            let cache = self.platform.open(&self.config.cache_name).await?;
            Ok::<_, CacheError>((cache, copy))
        }
        .await;

        let (cache, copy) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(url, "Failed to store response: {e}");
                return;
            }
        };

        let request = request.clone();
        let write = async move {
            match cache.put(&request, copy).await {
                Ok(()) => trace!(url, "Stored"),
                Err(e) => warn!(url, "Failed to store response: {e}"),
            }
        };
        self.platform.defer(write.boxed_local());
    }

    /// Pages post [SKIP_WAITING] when the user accepts an update
    pub async fn message(&self, data: Option<String>) -> Result<(), CacheError> {
        match data.as_deref() {
            Some(SKIP_WAITING) => {
                info!("Got SKIP_WAITING");
                self.platform
                    .skip_waiting()
                    .await
                    .context("message::skip_waiting")
            }
            other => {
                debug!(?other, "Ignoring unexpected message");
                Ok(())
            }
        }
    }
}
