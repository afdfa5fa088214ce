use anyhow::Result;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::Url;

use super::header_pairs;
use super::HttpFetcher;
use crate::domain::models::CacheRequest;
use crate::domain::models::Fetcher;

#[tokio::test]
async fn it_fetches_assets() -> Result<()> {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/index.html")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html></html>")
        .create();

    let url = Url::parse(&server.url())?.join("index.html")?;
    let res = HttpFetcher::default()
        .fetch(&CacheRequest::get(url))
        .await?;

    assert_eq!(res.status, 200);
    assert_eq!(res.body, b"<html></html>".to_vec());
    assert!(res.headers.contains(&(
        "content-type".to_string(),
        "text/html".to_string()
    )));
    mock.assert();

    return Ok(());
}

#[tokio::test]
async fn it_returns_error_statuses_as_responses() -> Result<()> {
    let mut server = mockito::Server::new();
    let mock = server.mock("GET", "/gone.js").with_status(410).create();

    let url = Url::parse(&server.url())?.join("gone.js")?;
    let res = HttpFetcher::default()
        .fetch(&CacheRequest::get(url))
        .await?;

    assert_eq!(res.status, 410);
    assert!(!res.is_success());
    mock.assert();

    return Ok(());
}

#[tokio::test]
async fn it_fails_when_unreachable() -> Result<()> {
    let res = HttpFetcher::default()
        .fetch(&CacheRequest::get(Url::parse("http://127.0.0.1:1/index.html")?))
        .await;

    assert!(res.is_err());

    return Ok(());
}

#[test]
fn it_keeps_non_ascii_header_values() -> Result<()> {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("text/html"));
    headers.insert(
        "content-disposition",
        HeaderValue::from_bytes("inline; filename=\"café.html\"".as_bytes())?,
    );

    let pairs = header_pairs(&headers);
    assert!(pairs.contains(&("content-type".to_string(), "text/html".to_string())));
    assert!(pairs.contains(&(
        "content-disposition".to_string(),
        "inline; filename=\"café.html\"".to_string()
    )));

    return Ok(());
}
