//! Binary key formatting and parsing for the per-namespace key-value store.
//!
//! Every integer component is zero-padded to 20 decimal digits so that
//! lexicographic byte ordering of keys coincides with numeric ordering.
//! Keys are plain ASCII, which keeps the store human-inspectable at the
//! cost of roughly 12 bytes per encoded integer compared to a big-endian
//! binary encoding.

const INT_WIDTH: usize = 20;

const MESSAGE_PREFIX: &[u8] = b"M:";
const STREAM_INDEX_PREFIX: &[u8] = b"SI:";
const CATEGORY_INDEX_PREFIX: &[u8] = b"CI:";
const VERSION_PREFIX: &[u8] = b"VI:";
pub const GLOBAL_POSITION_KEY: &[u8] = b"GP";
const REGISTRY_PREFIX: &[u8] = b"NS:";

/// Zero-pads `n` to 20 decimal digits, ASCII-encoded.
fn pad20(n: u64) -> [u8; INT_WIDTH] {
    let mut buf = [b'0'; INT_WIDTH];
    let s = n.to_string();
    let start = INT_WIDTH - s.len();
    buf[start..].copy_from_slice(s.as_bytes());
    buf
}

fn parse_u64(bytes: &[u8]) -> crate::error::Result<u64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| crate::error::Error::decode("malformed zero-padded integer key component"))
}

/// `M:<gp20>` — primary message store key.
pub fn message_key(global_position: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(MESSAGE_PREFIX.len() + INT_WIDTH);
    key.extend_from_slice(MESSAGE_PREFIX);
    key.extend_from_slice(&pad20(global_position));
    key
}

/// Lower bound for `M:[gp20, ∞)` scans starting at `global_position`.
pub fn message_key_lower_bound(global_position: u64) -> Vec<u8> {
    message_key(global_position)
}

/// Exclusive upper bound covering every `M:` key.
pub fn message_prefix_upper() -> Vec<u8> {
    prefix_successor(MESSAGE_PREFIX)
}

/// `SI:<stream>:<pos20>` — per-stream ordering index.
pub fn stream_index_key(stream: &str, position: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(STREAM_INDEX_PREFIX.len() + stream.len() + 1 + INT_WIDTH);
    key.extend_from_slice(STREAM_INDEX_PREFIX);
    key.extend_from_slice(stream.as_bytes());
    key.push(b':');
    key.extend_from_slice(&pad20(position));
    key
}

/// `SI:<stream>:` prefix, shared by every position of `stream`.
pub fn stream_index_prefix(stream: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(STREAM_INDEX_PREFIX.len() + stream.len() + 1);
    key.extend_from_slice(STREAM_INDEX_PREFIX);
    key.extend_from_slice(stream.as_bytes());
    key.push(b':');
    key
}

/// `CI:<category>:<gp20>` — per-category ordering index.
pub fn category_index_key(category: &str, global_position: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(CATEGORY_INDEX_PREFIX.len() + category.len() + 1 + INT_WIDTH);
    key.extend_from_slice(CATEGORY_INDEX_PREFIX);
    key.extend_from_slice(category.as_bytes());
    key.push(b':');
    key.extend_from_slice(&pad20(global_position));
    key
}

/// `CI:<category>:` prefix, shared by every entry of `category`.
pub fn category_index_prefix(category: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(CATEGORY_INDEX_PREFIX.len() + category.len() + 1);
    key.extend_from_slice(CATEGORY_INDEX_PREFIX);
    key.extend_from_slice(category.as_bytes());
    key.push(b':');
    key
}

/// Lower bound for `CI:<category>:[gp20, ∞)`.
pub fn category_index_key_lower_bound(category: &str, global_position: u64) -> Vec<u8> {
    category_index_key(category, global_position)
}

/// `VI:<stream>` — current stream version.
pub fn version_key(stream: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(VERSION_PREFIX.len() + stream.len());
    key.extend_from_slice(VERSION_PREFIX);
    key.extend_from_slice(stream.as_bytes());
    key
}

/// `VI:` prefix, shared by every stream's version entry.
pub fn version_prefix() -> Vec<u8> {
    VERSION_PREFIX.to_vec()
}

/// Strips the `VI:` prefix from a version-index key, returning the stream name.
pub fn parse_version_key(key: &[u8]) -> Option<&str> {
    let rest = key.strip_prefix(VERSION_PREFIX)?;
    std::str::from_utf8(rest).ok()
}

/// Encodes a position (for the value side of `VI:` and `SI:`).
pub fn encode_position(position: u64) -> Vec<u8> {
    pad20(position).to_vec()
}

/// Decodes a zero-padded position or global position value.
pub fn decode_position(bytes: &[u8]) -> crate::error::Result<u64> {
    parse_u64(bytes)
}

/// Extracts the global position encoded in a `CI:` or `SI:` key's suffix.
pub fn parse_trailing_int(key: &[u8]) -> crate::error::Result<u64> {
    if key.len() < INT_WIDTH {
        return Err(crate::error::Error::decode("key too short to contain an integer suffix"));
    }
    parse_u64(&key[key.len() - INT_WIDTH..])
}

/// `NS:<namespace_id>` — registry record key.
pub fn registry_key(namespace_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(REGISTRY_PREFIX.len() + namespace_id.len());
    key.extend_from_slice(REGISTRY_PREFIX);
    key.extend_from_slice(namespace_id.as_bytes());
    key
}

/// `NS:` prefix, shared by every registry record.
pub fn registry_prefix() -> Vec<u8> {
    REGISTRY_PREFIX.to_vec()
}

/// Computes the lexicographic successor of `prefix`, i.e. the smallest byte
/// string greater than every string starting with `prefix`. Used as the
/// exclusive upper bound of a prefix scan.
pub fn prefix_successor(prefix: &[u8]) -> Vec<u8> {
    let mut successor = prefix.to_vec();
    while let Some(&last) = successor.last() {
        if last == 0xff {
            successor.pop();
        } else {
            *successor.last_mut().unwrap() += 1;
            return successor;
        }
    }
    // All bytes were 0xff (never happens for our ASCII prefixes): no finite
    // successor exists, so the caller should treat this as "unbounded".
    vec![0xff; prefix.len() + 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_padding_preserves_numeric_order() {
        let mut keys: Vec<Vec<u8>> = (0..25).map(message_key).collect();
        let sorted = {
            let mut s = keys.clone();
            s.sort();
            s
        };
        // byte-sorted order must equal construction order (9 < 10 numerically
        // but "09" < "10" byte-wise only because of the zero pad)
        keys.sort();
        assert_eq!(keys, sorted);
        assert!(message_key(9) < message_key(10));
        assert!(message_key(99) < message_key(100));
    }

    #[test]
    fn stream_index_prefix_is_prefix_of_its_keys() {
        let prefix = stream_index_prefix("account-123");
        let key = stream_index_key("account-123", 7);
        assert!(key.starts_with(&prefix));
    }

    #[test]
    fn prefix_successor_bounds_a_scan() {
        let prefix = category_index_prefix("account");
        let upper = prefix_successor(&prefix);
        let inside = category_index_key("account", 5);
        let outside = category_index_key("accountx", 5);
        assert!(inside.as_slice() >= prefix.as_slice() && inside.as_slice() < upper.as_slice());
        assert!(outside.as_slice() >= upper.as_slice());
    }

    #[test]
    fn roundtrip_trailing_int() {
        let key = category_index_key("account", 4242);
        assert_eq!(parse_trailing_int(&key).unwrap(), 4242);
    }

    #[test]
    fn parse_version_key_strips_prefix() {
        let key = version_key("account-123");
        assert_eq!(parse_version_key(&key), Some("account-123"));
    }
}
