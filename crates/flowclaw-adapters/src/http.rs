//! Shared HTTP response handling for adapters.

use std::net::{IpAddr, Ipv4Addr};

use flowclaw_core::error::FlowClawError;
use flowclaw_core::types::AdapterResult;
use reqwest::{StatusCode, Url};

/// Max response body kept in results and error messages.
const MAX_BODY_CHARS: usize = 2000;

/// Map a transport error to the retryable error path.
pub(crate) fn transport_error(what: &str, e: reqwest::Error) -> FlowClawError {
    FlowClawError::Http(format!("{what} request failed: {e}"))
}

/// Whether a non-2xx status is worth retrying.
pub(crate) fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Fold an HTTP response into an adapter result.
/// 2xx succeeds, 408/429/5xx is a retryable failure, other statuses are not retried.
pub(crate) async fn into_result(what: &str, resp: reqwest::Response) -> AdapterResult {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let body = truncate(&body);

    if status.is_success() {
        let data = serde_json::from_str::<serde_json::Value>(&body)
            .unwrap_or_else(|_| serde_json::Value::String(body.clone()));
        tracing::info!("✅ {what} succeeded ({status})");
        return AdapterResult::ok_with_data(
            &format!("{what} succeeded"),
            serde_json::json!({"status": status.as_u16(), "body": data}),
        );
    }

    let error = format!("{what} error {status}: {body}");
    if is_retryable_status(status) {
        tracing::warn!("⚠️ {error}");
        AdapterResult::failure(&error)
    } else {
        tracing::warn!("🚫 {error} (not retryable)");
        AdapterResult::invalid(&error)
    }
}

fn truncate(s: &str) -> String {
    if s.chars().count() > MAX_BODY_CHARS {
        let cut: String = s.chars().take(MAX_BODY_CHARS).collect();
        format!("{cut}...")
    } else {
        s.to_string()
    }
}

/// Reject metadata endpoints and (optionally) loopback or private targets.
/// Decided on the parsed host, so alternate IP spellings resolve the same way.
/// Unparseable URLs are rejected.
pub(crate) fn is_blocked_url(url: &str, block_internal: bool) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return true;
    };
    let Some(host) = parsed.host_str() else {
        return true;
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();

    // IPv6 literals keep their brackets in `host_str`.
    match host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        Ok(ip) => is_metadata_ip(ip) || (block_internal && is_internal_ip(ip)),
        Err(_) => {
            host == "metadata.google.internal"
                || (block_internal && (host == "localhost" || host.ends_with(".localhost")))
        }
    }
}

fn is_metadata_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.is_link_local(),
            None => v6.is_unicast_link_local(),
        },
    }
}

fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_internal_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_internal_v4(v4),
            None => v6.is_loopback() || v6.is_unspecified() || v6.is_unique_local(),
        },
    }
}

fn is_internal_v4(v4: Ipv4Addr) -> bool {
    v4.is_loopback() || v4.is_unspecified() || v4.is_private() || v4.is_broadcast()
}
