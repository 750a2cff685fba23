use std::net::SocketAddr;

use axum::http::header;
use axum::http::HeaderMap;

use crate::account::models::DeviceFingerprint;

/// Build a coarse device fingerprint from request headers.
///
/// Best effort only: absent or unrecognized headers degrade to "unknown"
/// rather than failing the login.
pub fn fingerprint_from_request(headers: &HeaderMap, addr: Option<SocketAddr>) -> DeviceFingerprint {
    let user_agent = header_str(headers, header::USER_AGENT);

    DeviceFingerprint {
        os: detect_os(user_agent).to_string(),
        browser: detect_browser(user_agent).to_string(),
        ip: client_ip(headers, addr),
        language: primary_language(headers),
        device_type: detect_device_type(user_agent).to_string(),
    }
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> &str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

fn detect_os(user_agent: &str) -> &'static str {
    if user_agent.contains("Android") {
        "Android"
    } else if user_agent.contains("iPhone") || user_agent.contains("iPad") {
        "iOS"
    } else if user_agent.contains("Windows") {
        "Windows"
    } else if user_agent.contains("Mac OS") || user_agent.contains("Macintosh") {
        "macOS"
    } else if user_agent.contains("Linux") {
        "Linux"
    } else {
        "unknown"
    }
}

// Order matters: Edge carries "Chrome", Chrome carries "Safari".
fn detect_browser(user_agent: &str) -> &'static str {
    if user_agent.contains("Edg/") {
        "Edge"
    } else if user_agent.contains("Chrome/") {
        "Chrome"
    } else if user_agent.contains("Firefox/") {
        "Firefox"
    } else if user_agent.contains("Safari/") {
        "Safari"
    } else {
        "unknown"
    }
}

fn detect_device_type(user_agent: &str) -> &'static str {
    if user_agent.contains("iPad") || user_agent.contains("Tablet") {
        "Tablet"
    } else if user_agent.contains("Mobi") || user_agent.contains("iPhone") {
        "Mobile"
    } else if user_agent.is_empty() {
        "unknown"
    } else {
        "Desktop"
    }
}

/// Client address, preferring proxy headers over the socket peer.
fn client_ip(headers: &HeaderMap, addr: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        // First hop in the chain is the original client.
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|value| value.to_str().ok()) {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    addr.map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn primary_language(headers: &HeaderMap) -> String {
    let accept = header_str(headers, header::ACCEPT_LANGUAGE);
    accept
        .split(',')
        .next()
        .map(|tag| tag.split(';').next().unwrap_or(tag).trim())
        .filter(|tag| !tag.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
