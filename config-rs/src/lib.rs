//! config-rs/lib.rs
//! Shared configuration utilities for consistent service configuration
//! Provides standardized functions for port/address/upstream-URL management

use std::env;
use std::net::SocketAddr;

/// Get the API listen port from environment variables with proper fallback
///
/// # Arguments
/// * `default_port` - The default port to use if `API_PORT` is not set
///
/// # Returns
/// The port number the HTTP surface should bind to
pub fn get_api_port(default_port: u16) -> u16 {
    env::var("API_PORT")
        .unwrap_or_else(|_| default_port.to_string())
        .parse::<u16>()
        .unwrap_or_else(|_| {
            log::warn!("Invalid port in API_PORT, using default {}", default_port);
            default_port
        })
}

/// Create a SocketAddr for binding the HTTP surface
///
/// # Arguments
/// * `default_port` - The default port to use if not specified in environment
///
/// # Returns
/// A SocketAddr configured with the appropriate bind address and port
pub fn get_bind_address(default_port: u16) -> SocketAddr {
    // Check if there's a full address override
    if let Ok(addr_str) = env::var("API_ADDR") {
        if let Ok(addr) = addr_str.parse::<SocketAddr>() {
            return addr;
        }
        log::warn!("Invalid address format in API_ADDR, using default");
    }

    let port = get_api_port(default_port);
    format!("0.0.0.0:{}", port).parse().unwrap()
}

/// Get the base URL for connecting to an upstream service
///
/// # Arguments
/// * `upstream_name` - The name of the upstream (e.g., "USER_PROFILE", "CONTENT")
/// * `default_port` - The default port to use if not specified in environment
///
/// # Returns
/// A base URL the outbound caller can use to reach the upstream
pub fn get_upstream_url(upstream_name: &str, default_port: u16) -> String {
    let var_name = format!("{}_URL", upstream_name.to_uppercase());

    // First check if there's a full URL override
    if let Ok(url) = env::var(&var_name) {
        return url.trim_end_matches('/').to_string();
    }

    format!("http://localhost:{}", default_port)
}

/// Get default port for a specific upstream
///
/// # Arguments
/// * `upstream_name` - The name of the upstream (e.g., "USER_PROFILE", "CONTENT")
///
/// # Returns
/// The default port for the upstream
pub fn get_default_port(upstream_name: &str) -> u16 {
    match upstream_name.to_uppercase().as_str() {
        "USER_PROFILE" => 3001,
        "CONTENT" => 3002,
        "TRENDING" => 3003,
        "API" => 8080,
        _ => 3100, // Unknown upstreams start at 3100
    }
}
