//! Integration tests for document acquisition: validation, storage, and reuse.

mod support;

use harvester_core::document::{AcquisitionTarget, ArtifactStore, DocumentAcquirer, DocumentError};
use harvester_core::{FileSignature, FormatNormalizer, HttpSession};
use support::socket_guard::start_mock_server_or_skip;
use support::{PDF_FORMULARIO, PDF_REGULAMENTO, fast_navigator, html_page, html_response, pdf_response, unpaced_options};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn target() -> AcquisitionTarget<'static> {
    AcquisitionTarget {
        site_id: "fct",
        call_slug: "FCT-2025-03",
        owner_key: "fct|fct-2025-03",
    }
}

async fn mount(server: &MockServer, at: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_identical_content_is_stored_once_and_reused() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount(&server, "/files/regulamento.pdf", pdf_response(PDF_REGULAMENTO)).await;
    mount(&server, "/mirror/regulamento-copia.pdf", pdf_response(PDF_REGULAMENTO)).await;
    mount(&server, "/files/formulario.pdf", pdf_response(PDF_FORMULARIO)).await;

    let dir = TempDir::new().unwrap();
    let mut acquirer = DocumentAcquirer::new(FormatNormalizer::disabled(), ArtifactStore::new(dir.path()));
    let session = HttpSession::open("fct", &unpaced_options()).unwrap();
    let navigator = fast_navigator(1);
    let base = server.uri();

    let first = acquirer
        .acquire(&navigator, &session, &format!("{base}/files/regulamento.pdf"), target())
        .await
        .unwrap();
    let again = acquirer
        .acquire(&navigator, &session, &format!("{base}/mirror/regulamento-copia.pdf"), target())
        .await
        .unwrap();
    let other = acquirer
        .acquire(&navigator, &session, &format!("{base}/files/formulario.pdf"), target())
        .await
        .unwrap();

    assert!(!first.reused);
    assert!(again.reused);
    assert_eq!(first.reference.local_path, again.reference.local_path);
    assert_eq!(first.reference.content_hash, again.reference.content_hash);
    assert_ne!(first.reference.local_path, other.reference.local_path);
    assert_eq!(first.reference.detected_type, FileSignature::Pdf);
    assert!(first.reference.local_path.starts_with("fct"));
    assert!(dir.path().join(&first.reference.local_path).is_file());
    assert_eq!(acquirer.store().len(), 2);
}

#[tokio::test]
async fn test_html_served_as_document_is_rejected() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount(
        &server,
        "/files/aviso.pdf",
        html_response(html_page("Sessão expirada", "<p>Inicie sessão novamente</p>")),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let mut acquirer = DocumentAcquirer::new(FormatNormalizer::disabled(), ArtifactStore::new(dir.path()));
    let session = HttpSession::open("fct", &unpaced_options()).unwrap();
    let error = acquirer
        .acquire(&fast_navigator(1), &session, &format!("{}/files/aviso.pdf", server.uri()), target())
        .await
        .unwrap_err();

    assert!(error.is_validation());
    assert!(acquirer.store().is_empty());
}

#[tokio::test]
async fn test_empty_payload_is_rejected() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount(&server, "/files/vazio.pdf", ResponseTemplate::new(200)).await;

    let dir = TempDir::new().unwrap();
    let mut acquirer = DocumentAcquirer::new(FormatNormalizer::disabled(), ArtifactStore::new(dir.path()));
    let session = HttpSession::open("fct", &unpaced_options()).unwrap();
    let error = acquirer
        .acquire(&fast_navigator(1), &session, &format!("{}/files/vazio.pdf", server.uri()), target())
        .await
        .unwrap_err();

    assert!(matches!(error, DocumentError::Validation { .. }));
}

#[tokio::test]
async fn test_acquire_all_skips_failures_and_collapses_duplicates() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount(&server, "/a.pdf", pdf_response(PDF_REGULAMENTO)).await;
    mount(&server, "/b.pdf", pdf_response(PDF_REGULAMENTO)).await;
    mount(&server, "/missing.pdf", ResponseTemplate::new(404)).await;

    let dir = TempDir::new().unwrap();
    let mut acquirer = DocumentAcquirer::new(FormatNormalizer::disabled(), ArtifactStore::new(dir.path()));
    let session = HttpSession::open("fct", &unpaced_options()).unwrap();
    let base = server.uri();
    let urls = vec![
        format!("{base}/a.pdf"),
        format!("{base}/missing.pdf"),
        format!("{base}/b.pdf"),
    ];

    let (references, failed) = acquirer
        .acquire_all(&fast_navigator(1), &session, &urls, target())
        .await;

    assert_eq!(failed, 1);
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].original_url, urls[0]);
}
