//! Integration tests for paced sessions and retrying navigation.

mod support;

use std::time::{Duration, Instant};

use harvester_core::navigate::{PageFetcher, SuccessCheck};
use harvester_core::{HttpSession, NavigationError, SessionOptions};
use support::socket_guard::start_mock_server_or_skip;
use support::{fast_navigator, html_page, html_response, pdf_response, unpaced_options};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

fn check_for(uri: &str) -> SuccessCheck {
    let host = url::Url::parse(uri).unwrap().host_str().unwrap().to_string();
    SuccessCheck::on_host(host)
}

#[tokio::test]
async fn test_navigation_retries_transient_failure_then_succeeds() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/avisos"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/avisos"))
        .respond_with(html_response(html_page("Avisos", "<h1>Avisos abertos</h1>")))
        .mount(&server)
        .await;

    let session = HttpSession::open("test", &unpaced_options()).unwrap();
    let page = fast_navigator(3)
        .navigate(&session, &format!("{}/avisos", server.uri()), &check_for(&server.uri()))
        .await
        .unwrap();

    assert_eq!(page.title().as_deref(), Some("Avisos"));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_navigation_stops_early_on_not_found() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let session = HttpSession::open("test", &unpaced_options()).unwrap();
    let error = fast_navigator(4)
        .navigate(&session, &format!("{}/gone", server.uri()), &check_for(&server.uri()))
        .await
        .unwrap_err();

    match error {
        NavigationError::Exhausted { attempts, last_error, .. } => {
            assert_eq!(attempts, 1);
            assert_eq!(last_error.status(), Some(404));
        }
        other => panic!("expected exhausted error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_forbidden_status_is_retried_up_to_bound() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/protegido"))
        .respond_with(ResponseTemplate::new(403))
        .expect(3)
        .mount(&server)
        .await;

    let session = HttpSession::open("test", &unpaced_options()).unwrap();
    let error = fast_navigator(3)
        .navigate(&session, &format!("{}/protegido", server.uri()), &check_for(&server.uri()))
        .await
        .unwrap_err();

    match error {
        NavigationError::Exhausted { attempts, last_error, .. } => {
            assert_eq!(attempts, 3);
            assert_eq!(last_error.status(), Some(403));
        }
        other => panic!("expected exhausted error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_error_page_with_success_status_is_retried_up_to_bound() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/avisos"))
        .respond_with(html_response(html_page("Em manutenção", "<p>Voltamos já</p>")))
        .expect(3)
        .mount(&server)
        .await;

    let session = HttpSession::open("test", &unpaced_options()).unwrap();
    let error = fast_navigator(3)
        .navigate(&session, &format!("{}/avisos", server.uri()), &check_for(&server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(error, NavigationError::Exhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn test_retry_after_raises_backoff_delay() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(html_response(html_page("Portal", "<p>ok</p>")))
        .mount(&server)
        .await;

    let session = HttpSession::open("test", &unpaced_options()).unwrap();
    let started = Instant::now();
    fast_navigator(2)
        .navigate(&session, &format!("{}/busy", server.uri()), &check_for(&server.uri()))
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_session_keeps_cookies_between_requests() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/entrar"))
        .respond_with(
            html_response(html_page("Entrar", "<p>bem-vindo</p>"))
                .insert_header("Set-Cookie", "sessao=abc123; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/privado"))
        .and(header("cookie", "sessao=abc123"))
        .respond_with(html_response(html_page("Área reservada", "<p>avisos</p>")))
        .mount(&server)
        .await;

    let session = HttpSession::open("test", &unpaced_options()).unwrap();
    session.fetch_page(&format!("{}/entrar", server.uri())).await.unwrap();
    let page = session
        .fetch_page(&format!("{}/privado", server.uri()))
        .await
        .unwrap();

    assert_eq!(page.title().as_deref(), Some("Área reservada"));
}

#[tokio::test]
async fn test_document_over_size_cap_is_refused() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/grande.pdf"))
        .respond_with(pdf_response(&vec![b'x'; 4096]))
        .mount(&server)
        .await;

    let options = SessionOptions {
        max_document_bytes: 1024,
        ..unpaced_options()
    };
    let session = HttpSession::open("test", &options).unwrap();
    let error = session
        .fetch_document(&format!("{}/grande.pdf", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(error, NavigationError::BodyTooLarge { limit_bytes: 1024, .. }));
}

#[tokio::test]
async fn test_session_paces_consecutive_requests() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(html_response(html_page("Portal", "")))
        .mount(&server)
        .await;

    let options = SessionOptions {
        request_delay: Duration::from_millis(150),
        ..unpaced_options()
    };
    let session = HttpSession::open("test", &options).unwrap();
    let started = Instant::now();
    for page in ["/a", "/b", "/c"] {
        session.fetch_page(&format!("{}{page}", server.uri())).await.unwrap();
    }

    assert!(started.elapsed() >= Duration::from_millis(300));
}
