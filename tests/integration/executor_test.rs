//! Executor tests against a local mock server.

use super::{init_test_env, test_executor};
use rappit_core::auth::AuthScheme;
use rappit_core::executor::Transport;
use rappit_core::models::{
    header_value, ExecutionOutcome, FailureKind, HttpMethod, OutcomeKind, RequestBody, RequestSpec,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn get(url: String) -> RequestSpec {
    RequestSpec::builder(HttpMethod::GET, url)
        .timeout(Duration::from_secs(5))
        .build()
        .expect("Failed to build request")
}

fn failure_kind(outcome: ExecutionOutcome) -> FailureKind {
    match outcome {
        ExecutionOutcome::NetworkFailure { kind, .. } => kind,
        other => panic!("Expected network failure, got {:?}", other),
    }
}

/// Mounts `/{prefix}/0` -> `/{prefix}/1` -> ... -> `/{prefix}/{hops}`, which answers 200.
async fn mount_redirect_chain(server: &MockServer, prefix: &str, hops: usize) {
    for hop in 0..hops {
        Mock::given(path(format!("/{}/{}", prefix, hop)))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("/{}/{}", prefix, hop + 1).as_str()),
            )
            .mount(server)
            .await;
    }
    Mock::given(path(format!("/{}/{}", prefix, hops)))
        .respond_with(ResponseTemplate::new(200).set_body_string("arrived"))
        .mount(server)
        .await;
}

/// Local server that reads one request, writes `reply` and hangs up.
async fn raw_server(reply: &'static [u8]) -> u16 {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let _ = socket.write_all(reply).await;
        let _ = socket.shutdown().await;
    });
    port
}

#[tokio::test]
async fn test_success_returns_status_headers_and_body() {
    init_test_env();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Request-Id", "abc-123")
                .set_body_raw(r#"{"users":[]}"#, "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let spec = RequestSpec::builder(HttpMethod::GET, format!("{}/users", server.uri()))
        .query("page", "2")
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let outcome = test_executor(10).execute(spec, CancellationToken::new()).await;

    match &outcome {
        ExecutionOutcome::Success {
            status_code,
            reason,
            final_url,
            headers,
            body,
            ..
        } => {
            assert_eq!(*status_code, 200);
            assert_eq!(reason, "OK");
            assert!(final_url.ends_with("/users?page=2"));
            assert_eq!(header_value(headers, "x-request-id"), Some("abc-123"));
            assert_eq!(body, br#"{"users":[]}"#);
        }
        other => panic!("Expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_post_sends_body_and_content_type() {
    init_test_env();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .and(header("content-type", "application/json"))
        .and(body_string(r#"{"name":"widget"}"#))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let spec = RequestSpec::builder(HttpMethod::POST, format!("{}/items", server.uri()))
        .body(RequestBody::json(r#"{"name":"widget"}"#))
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let outcome = test_executor(10).execute(spec, CancellationToken::new()).await;
    assert_eq!(outcome.status_code(), Some(201));
}

#[tokio::test]
async fn test_auth_header_is_injected() {
    init_test_env();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let spec = RequestSpec::builder(HttpMethod::GET, server.uri())
        .auth(AuthScheme::Bearer {
            token: "abc".to_string(),
        })
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let outcome = test_executor(10).execute(spec, CancellationToken::new()).await;
    assert_eq!(outcome.status_code(), Some(200));
}

#[tokio::test]
async fn test_caller_header_wins_over_auth_and_user_agent() {
    init_test_env();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Custom xyz"))
        .and(header("user-agent", "my-agent"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let spec = RequestSpec::builder(HttpMethod::GET, server.uri())
        .header("Authorization", "Custom xyz")
        .header("User-Agent", "my-agent")
        .auth(AuthScheme::Bearer {
            token: "ignored".to_string(),
        })
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let outcome = test_executor(10).execute(spec, CancellationToken::new()).await;
    assert_eq!(outcome.status_code(), Some(200));
}

#[tokio::test]
async fn test_default_user_agent_is_sent() {
    init_test_env();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "rappit-tests/1.0"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = test_executor(10)
        .execute(get(server.uri()), CancellationToken::new())
        .await;
    assert_eq!(outcome.status_code(), Some(204));
}

#[tokio::test]
async fn test_no_auth_sends_no_authorization_header() {
    init_test_env();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    test_executor(10)
        .execute(get(server.uri()), CancellationToken::new())
        .await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_error_status_is_still_success() {
    init_test_env();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let outcome = test_executor(10)
        .execute(get(server.uri()), CancellationToken::new())
        .await;

    assert_eq!(outcome.kind(), OutcomeKind::Success);
    assert_eq!(outcome.status_code(), Some(503));
    assert_eq!(outcome.body(), b"down");
}

#[tokio::test]
async fn test_slow_response_times_out() {
    init_test_env();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let spec = RequestSpec::builder(HttpMethod::GET, server.uri())
        .timeout(Duration::from_secs(1))
        .build()
        .unwrap();

    let outcome = test_executor(10).execute(spec, CancellationToken::new()).await;

    match outcome {
        ExecutionOutcome::Timeout { elapsed } => {
            assert!(elapsed >= Duration::from_secs(1));
            assert!(elapsed < Duration::from_secs(3));
        }
        other => panic!("Expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_in_flight_request() {
    init_test_env();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let outcome = test_executor(10).execute(get(server.uri()), cancel).await;

    match outcome {
        ExecutionOutcome::Cancelled { elapsed } => assert!(elapsed < Duration::from_secs(3)),
        other => panic!("Expected cancellation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancelled_token_never_sends() {
    init_test_env();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = test_executor(10).execute(get(server.uri()), cancel).await;
    assert_eq!(outcome.kind(), OutcomeKind::Cancelled);
}

#[tokio::test]
async fn test_redirect_is_followed() {
    init_test_env();
    let server = MockServer::start().await;
    Mock::given(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
        .mount(&server)
        .await;
    Mock::given(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
        .mount(&server)
        .await;

    let outcome = test_executor(10)
        .execute(get(format!("{}/old", server.uri())), CancellationToken::new())
        .await;

    match outcome {
        ExecutionOutcome::Success {
            status_code,
            final_url,
            ..
        } => {
            assert_eq!(status_code, 200);
            assert!(final_url.ends_with("/new"));
        }
        other => panic!("Expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_redirect_loop_is_too_many_redirects() {
    init_test_env();
    let server = MockServer::start().await;
    Mock::given(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .mount(&server)
        .await;

    let outcome = test_executor(3)
        .execute(get(format!("{}/loop", server.uri())), CancellationToken::new())
        .await;

    match outcome {
        ExecutionOutcome::NetworkFailure { kind, .. } => {
            assert_eq!(kind, FailureKind::TooManyRedirects)
        }
        other => panic!("Expected redirect failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_redirect_not_followed_when_disabled() {
    init_test_env();
    let server = MockServer::start().await;
    Mock::given(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
        .mount(&server)
        .await;

    let spec = RequestSpec::builder(HttpMethod::GET, format!("{}/old", server.uri()))
        .follow_redirects(false)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let outcome = test_executor(10).execute(spec, CancellationToken::new()).await;

    assert_eq!(outcome.status_code(), Some(301));
    assert_eq!(header_value(outcome.headers(), "location"), Some("/new"));
}

#[tokio::test]
async fn test_connection_refused() {
    init_test_env();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let outcome = test_executor(10)
        .execute(
            get(format!("http://127.0.0.1:{}/", port)),
            CancellationToken::new(),
        )
        .await;

    match outcome {
        ExecutionOutcome::NetworkFailure { kind, message, .. } => {
            assert_eq!(kind, FailureKind::ConnectionRefused);
            assert!(!message.is_empty());
        }
        other => panic!("Expected network failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_redirect_cap_allows_exactly_max_hops() {
    init_test_env();
    let server = MockServer::start().await;
    mount_redirect_chain(&server, "ten", 10).await;
    mount_redirect_chain(&server, "eleven", 11).await;

    let outcome = test_executor(10)
        .execute(get(format!("{}/ten/0", server.uri())), CancellationToken::new())
        .await;
    assert_eq!(outcome.status_code(), Some(200));

    let outcome = test_executor(10)
        .execute(get(format!("{}/eleven/0", server.uri())), CancellationToken::new())
        .await;
    assert_eq!(failure_kind(outcome), FailureKind::TooManyRedirects);
}

#[tokio::test]
async fn test_zero_redirect_cap_fails_on_first_redirect() {
    init_test_env();
    let server = MockServer::start().await;
    mount_redirect_chain(&server, "one", 1).await;

    let outcome = test_executor(0)
        .execute(get(format!("{}/one/0", server.uri())), CancellationToken::new())
        .await;
    assert_eq!(failure_kind(outcome), FailureKind::TooManyRedirects);
}

#[tokio::test]
async fn test_connection_closed_without_response_is_protocol_error() {
    init_test_env();
    let port = raw_server(b"").await;

    let outcome = test_executor(10)
        .execute(
            get(format!("http://127.0.0.1:{}/", port)),
            CancellationToken::new(),
        )
        .await;

    match outcome {
        ExecutionOutcome::NetworkFailure { kind, message, .. } => {
            assert_eq!(kind, FailureKind::ProtocolError);
            assert_eq!(
                message
                    .matches("connection closed before message completed")
                    .count(),
                1,
                "{}",
                message
            );
        }
        other => panic!("Expected network failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_garbage_response_is_protocol_error() {
    init_test_env();
    let port = raw_server(b"garbage\r\n\r\n").await;

    let outcome = test_executor(10)
        .execute(
            get(format!("http://127.0.0.1:{}/", port)),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(failure_kind(outcome), FailureKind::ProtocolError);
}

#[tokio::test]
async fn test_https_to_plain_http_server_is_tls_error() {
    init_test_env();
    let server = MockServer::start().await;

    let outcome = test_executor(10)
        .execute(
            get(format!("https://{}/", server.address())),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(failure_kind(outcome), FailureKind::TlsError);
}

#[tokio::test]
async fn test_unresolvable_host_is_dns_failure() {
    init_test_env();
    // .invalid never resolves
    let spec = RequestSpec::builder(HttpMethod::GET, "http://rappit-test.invalid/")
        .timeout(Duration::from_secs(20))
        .build()
        .unwrap();

    let outcome = test_executor(10).execute(spec, CancellationToken::new()).await;

    assert_eq!(failure_kind(outcome), FailureKind::DnsFailure);
}

#[tokio::test]
async fn test_cookies_are_not_replayed() {
    init_test_env();
    let server = MockServer::start().await;
    Mock::given(path("/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("Set-Cookie", "session=abc; Path=/"))
        .mount(&server)
        .await;
    Mock::given(path("/me"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let executor = test_executor(10);
    let login = executor
        .execute(get(format!("{}/login", server.uri())), CancellationToken::new())
        .await;
    assert_eq!(header_value(login.headers(), "set-cookie"), Some("session=abc; Path=/"));

    let me = executor
        .execute(get(format!("{}/me", server.uri())), CancellationToken::new())
        .await;
    assert_eq!(me.status_code(), Some(200));

    let requests = server.received_requests().await.unwrap();
    let me_request = requests
        .iter()
        .find(|request| request.url.path() == "/me")
        .expect("Expected a request to /me");
    assert!(me_request.headers.get("cookie").is_none());
}
