use anyhow::Result;
use reqwest::Url;

use super::AssetManifest;
use super::CacheRecord;
use super::CacheRequest;
use super::CacheResponse;

fn manifest_paths() -> Vec<String> {
    return vec!["./".to_string(), "./index.html".to_string(), "./app.js".to_string()];
}

#[test]
fn it_resolves_assets_under_a_subpath() -> Result<()> {
    let manifest = AssetManifest::new(
        "http://localhost:8080/neon",
        "./index.html",
        &manifest_paths(),
    )?;

    let urls = manifest
        .assets
        .iter()
        .map(|url| {
            return url.to_string();
        })
        .collect::<Vec<String>>();

    assert_eq!(
        urls,
        vec![
            "http://localhost:8080/neon/",
            "http://localhost:8080/neon/index.html",
            "http://localhost:8080/neon/app.js",
        ]
    );
    assert_eq!(
        manifest.entry_point.as_str(),
        "http://localhost:8080/neon/index.html"
    );

    return Ok(());
}

#[test]
fn it_always_includes_the_entry_point() -> Result<()> {
    let manifest =
        AssetManifest::new("http://localhost:8080/", "./index.html", &["./app.js".to_string()])?;

    assert_eq!(manifest.assets.len(), 2);
    assert!(manifest.assets.contains(&manifest.entry_point));

    return Ok(());
}

#[test]
fn it_compares_origins() -> Result<()> {
    let manifest = AssetManifest::new("http://localhost:8080/", "./index.html", &[])?;

    assert!(manifest.is_same_origin(&Url::parse("http://localhost:8080/styles.css")?));
    assert!(!manifest.is_same_origin(&Url::parse("http://localhost:11434/api/tags")?));
    assert!(!manifest.is_same_origin(&Url::parse("https://localhost:8080/")?));

    return Ok(());
}

#[test]
fn it_keys_requests_by_method_and_url() -> Result<()> {
    let req = CacheRequest {
        method: "get".to_string(),
        url: Url::parse("http://localhost:8080/app.js")?,
    };

    assert_eq!(req.cache_key(), "GET http://localhost:8080/app.js");
    assert!(req.is_get());

    return Ok(());
}

#[test]
fn it_serializes_bodies_as_base64() -> Result<()> {
    let req = CacheRequest::get(Url::parse("http://localhost:8080/")?);
    let record = CacheRecord::new(
        &req,
        CacheResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: b"<html>".to_vec(),
        },
    );

    let json = serde_json::to_value(&record)?;
    assert_eq!(json["response"]["body"], "PGh0bWw+");

    let decoded: CacheRecord = serde_json::from_value(json)?;
    assert_eq!(decoded.response.body, b"<html>".to_vec());

    return Ok(());
}
