//! Authentication: resolves the namespace a request is authorized for
//! from a presented bearer token, without the core engine ever seeing
//! credential material.
//!
//! A token is `<namespace_id>.<secret>`. `ns.create` mints the secret and
//! returns the full token to the caller once; the registry stores only
//! `sha256(secret)` as the namespace's `credential_hash`. Verifying a
//! presented token means splitting on the first `.`, looking up the
//! namespace by the prefix, and comparing `sha256` of the remainder
//! against the stored hash — the auth layer never needs a secondary
//! token→namespace index.

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::registry::NamespaceRegistry;

/// Hashes a freshly generated credential secret for storage in the
/// registry. Never store the secret itself.
pub fn hash_credential(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(out, "{byte:02x}").expect("writing to a String never fails");
    }
    out
}

/// Verifies `token` against the registry and returns the namespace id it
/// authenticates. `AUTH_REQUIRED` on any failure — malformed token,
/// unknown namespace, or hash mismatch are all indistinguishable to the
/// caller on purpose.
pub fn authenticate(registry: &NamespaceRegistry, token: &str) -> Result<String> {
    let (namespace_id, secret) = token.split_once('.').ok_or(Error::AuthRequired)?;
    if namespace_id.is_empty() || secret.is_empty() {
        return Err(Error::AuthRequired);
    }
    let namespace = registry.get(namespace_id)?.ok_or(Error::AuthRequired)?;
    if hash_credential(secret) != namespace.credential_hash {
        return Err(Error::AuthRequired);
    }
    Ok(namespace_id.to_string())
}

/// Extracts a bearer token from an `Authorization: Bearer <token>` header
/// value, or `None` if the header isn't present or doesn't use the
/// `Bearer` scheme.
pub fn bearer_from_header(header_value: Option<&str>) -> Option<&str> {
    header_value?.strip_prefix("Bearer ")
}

/// Pulls a token from the `Authorization` header first, falling back to a
/// `token` query parameter (the SSE subscribe route accepts either, since
/// browser `EventSource` clients can't set custom headers). `AUTH_REQUIRED`
/// if neither is present.
pub fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Result<String> {
    let header_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_from_header);
    header_token
        .or(query_token)
        .map(str::to_string)
        .ok_or(Error::AuthRequired)
}
