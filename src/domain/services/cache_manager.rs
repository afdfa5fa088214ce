#[cfg(test)]
#[path = "cache_manager_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use tokio_util::task::TaskTracker;

use crate::domain::models::AssetManifest;
use crate::domain::models::CacheRecord;
use crate::domain::models::CacheRequest;
use crate::domain::models::CacheResponse;
use crate::domain::models::CacheStorageBox;
use crate::domain::models::FetcherBox;

/// Offline cache for the client's own assets. Each version lives in its own
/// namespace; activating a version destroys every other namespace.
pub struct CacheManager {
    version: String,
    manifest: AssetManifest,
    storage: CacheStorageBox,
    fetcher: FetcherBox,
    tracker: TaskTracker,
}

impl CacheManager {
    pub fn new(
        version: &str,
        manifest: AssetManifest,
        storage: CacheStorageBox,
        fetcher: FetcherBox,
    ) -> CacheManager {
        return CacheManager {
            version: version.to_string(),
            manifest,
            storage,
            fetcher,
            tracker: TaskTracker::new(),
        };
    }

    pub fn version(&self) -> &str {
        return &self.version;
    }

    pub fn manifest(&self) -> &AssetManifest {
        return &self.manifest;
    }

    /// Precaches every manifest asset into the current namespace. Nothing is
    /// written unless every asset was fetched successfully.
    pub async fn install(&self) -> Result<()> {
        let requests = self
            .manifest
            .assets
            .iter()
            .map(|url| {
                return CacheRequest::get(url.clone());
            })
            .collect::<Vec<CacheRequest>>();

        let responses = futures::future::try_join_all(requests.iter().map(|request| {
            return self.fetch_asset(request);
        }))
        .await?;

        let existed = self.storage.has(&self.version).await?;
        self.storage.open(&self.version).await?;

        for (request, response) in requests.iter().zip(responses) {
            let res = self
                .storage
                .put(&self.version, CacheRecord::new(request, response))
                .await;

            if let Err(err) = res {
                if !existed {
                    if let Err(cleanup_err) = self.storage.delete(&self.version).await {
                        tracing::warn!(error = ?cleanup_err, version = %self.version, "Failed to remove partial cache");
                    }
                }

                return Err(err.context(format!("Failed to precache {}", request.url)));
            }
        }

        tracing::info!(
            version = %self.version,
            assets = requests.len(),
            "Cache installed"
        );

        return Ok(());
    }

    /// Destroys every namespace other than the current one and returns the
    /// names removed. Refuses to run until install has completed.
    pub async fn activate(&self) -> Result<Vec<String>> {
        if !self.is_installed().await? {
            bail!(format!(
                "Cache {} is not installed, run install before activating",
                self.version
            ));
        }

        let mut deleted: Vec<String> = vec![];
        for name in self.storage.keys().await? {
            if name == self.version {
                continue;
            }

            if self.storage.delete(&name).await? {
                deleted.push(name);
            }
        }

        tracing::info!(version = %self.version, deleted = ?deleted, "Cache activated");
        return Ok(deleted);
    }

    /// Whether the current namespace holds the full manifest.
    pub async fn is_installed(&self) -> Result<bool> {
        if !self.storage.has(&self.version).await? {
            return Ok(false);
        }

        let entries = self.storage.entries(&self.version).await?;
        let installed = self.manifest.assets.iter().all(|url| {
            return entries.contains(&CacheRequest::get(url.clone()).cache_key());
        });

        return Ok(installed);
    }

    /// Serves a request the way the offline worker does: cross-origin
    /// requests go straight to the network, same-origin requests are served
    /// cache first, then network, then the cached entry point.
    pub async fn handle_fetch(&self, request: CacheRequest) -> Result<CacheResponse> {
        if !self.manifest.is_same_origin(&request.url) {
            tracing::debug!(url = %request.url, "Passing through cross-origin request");
            return self.fetcher.fetch(&request).await;
        }

        if let Some(record) = self.lookup(&request.cache_key()).await {
            tracing::debug!(url = %request.url, "Serving from cache");
            return Ok(record.response);
        }

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                self.store_in_background(&request, &response);
                return Ok(response);
            }
            Err(err) => {
                tracing::warn!(error = ?err, url = %request.url, "Network failed, serving offline fallback");

                let fallback = CacheRequest::get(self.manifest.entry_point.clone());
                if let Some(record) = self.lookup(&fallback.cache_key()).await {
                    return Ok(record.response);
                }

                return Err(err);
            }
        }
    }

    /// Waits for every detached cache store started so far.
    pub async fn settle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    async fn fetch_asset(&self, request: &CacheRequest) -> Result<CacheResponse> {
        let response = self
            .fetcher
            .fetch(request)
            .await
            .with_context(|| return format!("Failed to fetch {}", request.url))?;

        if !response.is_success() {
            bail!(format!(
                "Failed to fetch {}: status {}",
                request.url, response.status
            ));
        }

        return Ok(response);
    }

    async fn lookup(&self, key: &str) -> Option<CacheRecord> {
        match self.storage.get(&self.version, key).await {
            Ok(record) => return record,
            Err(err) => {
                tracing::warn!(error = ?err, key, "Cache lookup failed");
                return None;
            }
        }
    }

    fn store_in_background(&self, request: &CacheRequest, response: &CacheResponse) {
        if !request.is_get() || !response.is_success() {
            tracing::debug!(
                url = %request.url,
                status = response.status,
                "Not caching response"
            );
            return;
        }

        let storage = self.storage.clone();
        let version = self.version.clone();
        let record = CacheRecord::new(request, response.clone());

        self.tracker.spawn(async move {
            if let Err(err) = storage.put(&version, record).await {
                tracing::warn!(error = ?err, version = %version, "Failed to store response in cache");
            }
        });
    }
}
