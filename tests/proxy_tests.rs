// Integration tests for the live stream relay
//
// A wiremock server plays the upstream radio station.

mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{body_bytes, send, test_config, test_state, FakeTranscoder};
use radio_recorder::{create_router, StreamProxy};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AUDIO: &[u8] = b"\xff\xfb\x90\x64fake-aac-frames";

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_proxy_relays_upstream_audio() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/live"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(AUDIO, "audio/aacp"))
        .mount(&upstream)
        .await;

    let dir = TempDir::new()?;
    let config = test_config(dir.path(), &format!("{}/live", upstream.uri()));
    let router = create_router(test_state(config, Arc::new(FakeTranscoder::new())));

    for uri in ["/stream", "/proxyStream"] {
        let response = send(&router, get(uri)).await;

        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/aacp");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(body_bytes(response).await, AUDIO);
    }

    Ok(())
}

#[tokio::test]
async fn test_proxy_is_independent_of_stream_flag() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(AUDIO, "audio/mpeg"))
        .expect(1)
        .mount(&upstream)
        .await;

    let dir = TempDir::new()?;
    let config = test_config(dir.path(), &upstream.uri());
    let state = test_state(config, Arc::new(FakeTranscoder::new()));
    let router = create_router(state.clone());

    let response = send(
        &router,
        Request::builder()
            .uri("/stream")
            .header(header::COOKIE, "userID=casual")
            .body(Body::empty())?,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Relaying neither creates a session nor raises the flag
    assert!(state.sessions.get("casual").await.is_none());

    Ok(())
}

#[tokio::test]
async fn test_upstream_error_status_becomes_500() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&upstream)
        .await;

    let proxy = StreamProxy::new(upstream.uri(), Duration::from_secs(2))?;
    let err = proxy.open().await.unwrap_err();
    assert!(err.to_string().contains("503"));

    let dir = TempDir::new()?;
    let config = test_config(dir.path(), &upstream.uri());
    let router = create_router(test_state(config, Arc::new(FakeTranscoder::new())));

    let response = send(&router, get("/stream")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = String::from_utf8(body_bytes(response).await)?;
    assert!(body.starts_with("Failed to fetch and stream audio"), "{}", body);

    Ok(())
}

#[tokio::test]
async fn test_unreachable_upstream_becomes_500() -> Result<()> {
    let dir = TempDir::new()?;
    // Reserved port with nothing listening
    let config = test_config(dir.path(), "http://127.0.0.1:9/live");
    let router = create_router(test_state(config, Arc::new(FakeTranscoder::new())));

    let response = send(&router, get("/proxyStream")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = String::from_utf8(body_bytes(response).await)?;
    assert!(body.starts_with("Failed to fetch and stream audio: "), "{}", body);

    Ok(())
}

#[tokio::test]
async fn test_upstream_drop_mid_transfer_aborts_response() -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // Upstream promises 1000 bytes, sends a few, then hangs up
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let upstream = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await?;
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await?;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: audio/mpeg\r\nContent-Length: 1000\r\n\r\n",
            )
            .await?;
        socket.write_all(AUDIO).await?;
        socket.flush().await?;
        anyhow::Ok(())
    });

    let dir = TempDir::new()?;
    let config = test_config(dir.path(), &format!("http://{}/live", addr));
    let router = create_router(test_state(config, Arc::new(FakeTranscoder::new())));

    let response = send(&router, get("/stream")).await;
    assert_eq!(response.status(), StatusCode::OK);
    upstream.await??;

    let body = tokio::time::timeout(
        Duration::from_secs(5),
        axum::body::to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .expect("truncated upstream should end the response, not hang");
    assert!(body.is_err(), "truncated upstream body should surface as an error");

    Ok(())
}
