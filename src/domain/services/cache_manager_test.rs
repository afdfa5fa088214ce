use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Url;

use super::CacheManager;
use crate::domain::models::AssetManifest;
use crate::domain::models::CacheRecord;
use crate::domain::models::CacheRequest;
use crate::domain::models::CacheResponse;
use crate::domain::models::CacheStorage;
use crate::domain::models::Fetcher;
use crate::infrastructure::cache_storage::memory::MemoryCacheStorage;

const ORIGIN: &str = "http://localhost:8080/";

#[derive(Default)]
struct FakeFetcher {
    responses: HashMap<String, CacheResponse>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl FakeFetcher {
    fn with(mut self, url: &str, status: u16, body: &str) -> FakeFetcher {
        self.responses.insert(
            url.to_string(),
            CacheResponse {
                status,
                headers: vec![],
                body: body.as_bytes().to_vec(),
            },
        );
        return self;
    }

    fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        return self.calls.load(Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, request: &CacheRequest) -> Result<CacheResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            bail!("network unreachable");
        }

        match self.responses.get(request.url.as_str()) {
            Some(response) => return Ok(response.clone()),
            None => {
                return Ok(CacheResponse {
                    status: 404,
                    headers: vec![],
                    body: vec![],
                })
            }
        }
    }
}

struct ReadOnlyCacheStorage {
    inner: MemoryCacheStorage,
}

#[async_trait]
impl CacheStorage for ReadOnlyCacheStorage {
    async fn keys(&self) -> Result<Vec<String>> {
        return self.inner.keys().await;
    }

    async fn has(&self, namespace: &str) -> Result<bool> {
        return self.inner.has(namespace).await;
    }

    async fn open(&self, namespace: &str) -> Result<()> {
        return self.inner.open(namespace).await;
    }

    async fn delete(&self, namespace: &str) -> Result<bool> {
        return self.inner.delete(namespace).await;
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<CacheRecord>> {
        return self.inner.get(namespace, key).await;
    }

    async fn put(&self, _namespace: &str, _record: CacheRecord) -> Result<()> {
        bail!("quota exceeded");
    }

    async fn entries(&self, namespace: &str) -> Result<Vec<String>> {
        return self.inner.entries(namespace).await;
    }
}

fn url(path: &str) -> Url {
    return Url::parse(ORIGIN).unwrap().join(path).unwrap();
}

fn manifest(assets: &[&str]) -> AssetManifest {
    let assets = assets
        .iter()
        .map(|asset| {
            return asset.to_string();
        })
        .collect::<Vec<String>>();

    return AssetManifest::new(ORIGIN, "./index.html", &assets).unwrap();
}

fn site() -> FakeFetcher {
    return FakeFetcher::default()
        .with("http://localhost:8080/index.html", 200, "<html>")
        .with("http://localhost:8080/app.js", 200, "main()")
        .with("http://localhost:8080/style.css", 200, "body{}");
}

#[tokio::test]
async fn it_replaces_older_versions_on_activate() -> Result<()> {
    let storage = Arc::new(MemoryCacheStorage::default());
    let fetcher = Arc::new(site());

    let v1 = CacheManager::new(
        "v1",
        manifest(&["./index.html", "./app.js"]),
        storage.clone(),
        fetcher.clone(),
    );
    v1.install().await?;
    v1.activate().await?;
    assert_eq!(storage.keys().await?, vec!["v1".to_string()]);

    let v2 = CacheManager::new(
        "v2",
        manifest(&["./index.html", "./app.js"]),
        storage.clone(),
        fetcher.clone(),
    );
    v2.install().await?;
    assert_eq!(
        storage.keys().await?,
        vec!["v1".to_string(), "v2".to_string()]
    );

    let deleted = v2.activate().await?;
    assert_eq!(deleted, vec!["v1".to_string()]);
    assert_eq!(storage.keys().await?, vec!["v2".to_string()]);
    assert_eq!(
        storage.entries("v2").await?,
        vec![
            "GET http://localhost:8080/app.js".to_string(),
            "GET http://localhost:8080/index.html".to_string(),
        ]
    );

    return Ok(());
}

#[tokio::test]
async fn it_installs_nothing_when_an_asset_fails() -> Result<()> {
    let storage = Arc::new(MemoryCacheStorage::default());
    let manager = CacheManager::new(
        "v1",
        manifest(&["./index.html", "./missing.js"]),
        storage.clone(),
        Arc::new(site()),
    );

    assert!(manager.install().await.is_err());
    assert!(storage.keys().await?.is_empty());
    assert!(!manager.is_installed().await?);
    assert!(manager.activate().await.is_err());

    return Ok(());
}

#[tokio::test]
async fn it_removes_a_new_namespace_when_writes_fail() -> Result<()> {
    let storage = Arc::new(ReadOnlyCacheStorage {
        inner: MemoryCacheStorage::default(),
    });
    let manager = CacheManager::new(
        "v1",
        manifest(&["./index.html"]),
        storage.clone(),
        Arc::new(site()),
    );

    assert!(manager.install().await.is_err());
    assert!(storage.keys().await?.is_empty());

    return Ok(());
}

#[tokio::test]
async fn it_serves_cached_assets_without_the_network() -> Result<()> {
    let fetcher = Arc::new(site());
    let manager = CacheManager::new(
        "v1",
        manifest(&["./index.html", "./app.js"]),
        Arc::new(MemoryCacheStorage::default()),
        fetcher.clone(),
    );
    manager.install().await?;
    let calls = fetcher.calls();

    fetcher.go_offline();
    let res = manager.handle_fetch(CacheRequest::get(url("app.js"))).await?;
    assert_eq!(res.body, b"main()".to_vec());
    assert_eq!(fetcher.calls(), calls);

    return Ok(());
}

#[tokio::test]
async fn it_stores_network_responses_for_later() -> Result<()> {
    let storage = Arc::new(MemoryCacheStorage::default());
    let fetcher = Arc::new(site());
    let manager = CacheManager::new(
        "v1",
        manifest(&["./index.html"]),
        storage.clone(),
        fetcher.clone(),
    );
    manager.install().await?;

    let res = manager
        .handle_fetch(CacheRequest::get(url("style.css")))
        .await?;
    assert_eq!(res.body, b"body{}".to_vec());

    manager.settle().await;
    assert!(storage
        .get("v1", "GET http://localhost:8080/style.css")
        .await?
        .is_some());

    fetcher.go_offline();
    let res = manager
        .handle_fetch(CacheRequest::get(url("style.css")))
        .await?;
    assert_eq!(res.body, b"body{}".to_vec());

    return Ok(());
}

#[tokio::test]
async fn it_falls_back_to_the_entry_point_offline() -> Result<()> {
    let fetcher = Arc::new(site());
    let manager = CacheManager::new(
        "v1",
        manifest(&["./index.html"]),
        Arc::new(MemoryCacheStorage::default()),
        fetcher.clone(),
    );
    manager.install().await?;

    fetcher.go_offline();
    let res = manager
        .handle_fetch(CacheRequest::get(url("settings")))
        .await?;
    assert_eq!(res.body, b"<html>".to_vec());

    return Ok(());
}

#[tokio::test]
async fn it_fails_offline_without_a_fallback() {
    let fetcher = Arc::new(site());
    let manager = CacheManager::new(
        "v1",
        manifest(&["./index.html"]),
        Arc::new(MemoryCacheStorage::default()),
        fetcher.clone(),
    );

    fetcher.go_offline();
    let res = manager.handle_fetch(CacheRequest::get(url("app.js"))).await;
    assert!(res.is_err());
}

#[tokio::test]
async fn it_never_caches_cross_origin_requests() -> Result<()> {
    let storage = Arc::new(MemoryCacheStorage::default());
    let fetcher = Arc::new(site().with("http://localhost:11434/api/tags", 200, "{}"));
    let manager = CacheManager::new(
        "v1",
        manifest(&["./index.html"]),
        storage.clone(),
        fetcher.clone(),
    );
    manager.install().await?;

    let request = CacheRequest::get(Url::parse("http://localhost:11434/api/tags")?);
    let res = manager.handle_fetch(request.clone()).await?;
    assert_eq!(res.body, b"{}".to_vec());

    manager.settle().await;
    assert_eq!(storage.get("v1", &request.cache_key()).await?, None);

    fetcher.go_offline();
    assert!(manager.handle_fetch(request).await.is_err());

    return Ok(());
}

#[tokio::test]
async fn it_skips_caching_failed_and_non_get_responses() -> Result<()> {
    let storage = Arc::new(MemoryCacheStorage::default());
    let manager = CacheManager::new(
        "v1",
        manifest(&["./index.html"]),
        storage.clone(),
        Arc::new(site()),
    );
    manager.install().await?;

    let missing = manager
        .handle_fetch(CacheRequest::get(url("missing.js")))
        .await?;
    assert_eq!(missing.status, 404);

    let post = CacheRequest {
        method: "POST".to_string(),
        url: url("app.js"),
    };
    manager.handle_fetch(post.clone()).await?;

    manager.settle().await;
    assert_eq!(
        storage.entries("v1").await?,
        vec!["GET http://localhost:8080/index.html".to_string()]
    );

    return Ok(());
}

#[tokio::test]
async fn it_returns_responses_when_storing_fails() -> Result<()> {
    let inner = MemoryCacheStorage::default();
    inner.open("v1").await?;
    let manager = CacheManager::new(
        "v1",
        manifest(&["./index.html"]),
        Arc::new(ReadOnlyCacheStorage { inner }),
        Arc::new(site()),
    );

    let res = manager
        .handle_fetch(CacheRequest::get(url("app.js")))
        .await?;
    assert_eq!(res.body, b"main()".to_vec());
    manager.settle().await;

    return Ok(());
}
