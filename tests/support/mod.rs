//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use std::time::Duration;

use harvester_core::{BackoffPolicy, Navigator, SessionOptions};
use wiremock::ResponseTemplate;

/// A minimal but well-formed PDF.
pub const PDF_REGULAMENTO: &[u8] =
    b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n";

/// A second PDF with different content.
pub const PDF_FORMULARIO: &[u8] =
    b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Title (Formulario) >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n";

/// Navigator with a short backoff so retry tests stay fast.
pub fn fast_navigator(max_attempts: u32) -> Navigator {
    Navigator::new(BackoffPolicy::new(max_attempts, Duration::from_millis(20)))
}

/// Session options without pacing.
pub fn unpaced_options() -> SessionOptions {
    SessionOptions {
        connect_timeout_secs: 5,
        read_timeout_secs: 10,
        request_delay: Duration::ZERO,
        ..SessionOptions::default()
    }
}

/// A titled HTML page.
pub fn html_page(title: &str, body: &str) -> String {
    format!("<!DOCTYPE html><html><head><title>{title}</title></head><body>{body}</body></html>")
}

pub fn html_response(html: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("Content-Type", "text/html; charset=utf-8")
        .set_body_string(html.into())
}

pub fn pdf_response(bytes: &[u8]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("Content-Type", "application/pdf")
        .set_body_bytes(bytes.to_vec())
}
