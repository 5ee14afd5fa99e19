mod common;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
};
use heyspruce_api::dispatch::{EndpointContext, EndpointHandler, HandlerError, RouteTable};
use reqwest::header::HeaderMap;

fn assert_cors(headers: &HeaderMap) {
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "GET, POST, PUT, DELETE, OPTIONS");
    assert_eq!(
        headers["access-control-allow-headers"],
        "Content-Type, Authorization, stripe-signature"
    );
}

#[tokio::test]
async fn preflight_is_answered_on_any_path() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    let client = reqwest::Client::new();

    let urls = [
        server.url("notifications"),
        server.url("webhook"),
        server.url("cron-quotes"),
        server.url("does-not-exist"),
        format!("{}/health", server.base_url),
        format!("{}/outside/the/api", server.base_url),
    ];

    for url in urls {
        let res = client.request(reqwest::Method::OPTIONS, &url).send().await?;
        assert_eq!(res.status(), StatusCode::OK, "{}", url);
        assert_cors(res.headers());
        assert!(res.bytes().await?.is_empty(), "preflight body for {} should be empty", url);
    }
    Ok(())
}

#[tokio::test]
async fn preflight_never_reaches_the_identity_store() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    let client = reqwest::Client::new();

    let res = client
        .request(reqwest::Method::OPTIONS, server.url("notifications"))
        .header("authorization", format!("Bearer {}", common::TECH_TOKEN))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(server.store.identity_lookups(), 0);
    Ok(())
}

#[tokio::test]
async fn cors_headers_accompany_success_and_rejection() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    let client = reqwest::Client::new();

    let ok = client.get(server.url("cron-appointments")).send().await?;
    assert_eq!(ok.status(), StatusCode::OK);
    assert_cors(ok.headers());

    let unauthorized = client.get(server.url("notifications")).send().await?;
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);
    assert_cors(unauthorized.headers());

    let wrong_method = client.delete(server.url("cron-contracts")).send().await?;
    assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_cors(wrong_method.headers());
    Ok(())
}

struct Exploding;

#[async_trait]
impl EndpointHandler for Exploding {
    fn methods(&self) -> &'static [&'static str] {
        &["GET"]
    }

    async fn handle(&self, _ctx: EndpointContext) -> Result<Response, HandlerError> {
        panic!("boom");
    }
}

#[tokio::test]
async fn cors_headers_accompany_internal_errors() -> Result<()> {
    let store = common::seeded_store().await;
    let routes = RouteTable::builder().cron("explode", Exploding).fallback(Exploding).build()?;
    let app = common::app_with_routes(store, routes)?;

    let request = Request::builder()
        .method(Method::GET)
        .uri(common::endpoint("explode"))
        .body(Body::empty())?;
    let res = common::send(app, request).await?;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(res.headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, PUT, DELETE, OPTIONS");
    Ok(())
}
