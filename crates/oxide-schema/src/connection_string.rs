//! Connection string rewriting.
//!
//! Two shapes are understood: URLs (`postgres://user@host/db?sslmode=off`)
//! and semicolon-separated key/value strings
//! (`Server=host;Database=db;User Id=sa`).

use crate::error::{Result, SchemaError};

/// Returns true when `connection_string` is URL shaped.
#[must_use]
pub fn is_url(connection_string: &str) -> bool {
    connection_string.contains("://")
}

/// Appends `key=value` as a URL query parameter.
#[must_use]
pub fn append_query_parameter(url: &str, key: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{key}={}", encode_query_value(value))
}

/// Appends `key=value` to a semicolon-separated key/value string.
#[must_use]
pub fn append_property(connection_string: &str, key: &str, value: &str) -> String {
    let trimmed = connection_string.trim_end();
    if trimmed.is_empty() {
        format!("{key}={value}")
    } else if trimmed.ends_with(';') {
        format!("{trimmed}{key}={value}")
    } else {
        format!("{trimmed};{key}={value}")
    }
}

/// Replaces the database path segment of a URL.
///
/// # Errors
///
/// Returns [`SchemaError::Parse`] when the URL has no host part.
pub fn replace_url_database(url: &str, database: &str) -> Result<String> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| SchemaError::parse(url, "expected a URL connection string"))?;
    let (location, query) = rest
        .split_once('?')
        .map_or((rest, None), |(location, query)| (location, Some(query)));
    let authority = location.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err(SchemaError::parse(url, "connection URL has no host"));
    }

    let mut rewritten = format!("{scheme}://{authority}/{database}");
    if let Some(query) = query {
        rewritten.push('?');
        rewritten.push_str(query);
    }
    Ok(rewritten)
}

/// Sets the database of a key/value connection string, replacing any
/// existing `Database` or `Initial Catalog` entry.
#[must_use]
pub fn replace_property_database(connection_string: &str, database: &str) -> String {
    let mut replaced = false;
    let mut parts: Vec<String> = Vec::new();

    for part in connection_string.split(';').filter(|p| !p.trim().is_empty()) {
        let key = part.split('=').next().unwrap_or_default().trim();
        if key.eq_ignore_ascii_case("database") || key.eq_ignore_ascii_case("initial catalog") {
            if !replaced {
                parts.push(format!("{key}={database}"));
                replaced = true;
            }
        } else {
            parts.push(part.to_string());
        }
    }

    if !replaced {
        parts.push(format!("Database={database}"));
    }
    parts.join(";")
}

fn encode_query_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(char::from(byte));
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}
