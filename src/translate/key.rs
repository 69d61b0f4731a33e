//! Cache key codec.
//! Layout: `{source}:{target}:{base64url(text)}`. Neither a normalized language
//! code nor the URL-safe base64 alphabet contains `:`, so keys are unambiguous
//! and can be decoded back into their parts.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

const SEPARATOR: char = ':';

/// Decoded components of a cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParts {
    pub source_lang: String,
    pub target_lang: String,
    pub text: String,
}

/// Derive the cache key for a translation of `text`.
pub fn derive_key(text: &str, source_lang: &str, target_lang: &str) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(text.as_bytes());
    let mut key = String::with_capacity(source_lang.len() + target_lang.len() + encoded.len() + 2);
    key.push_str(source_lang);
    key.push(SEPARATOR);
    key.push_str(target_lang);
    key.push(SEPARATOR);
    key.push_str(&encoded);
    key
}

/// Reverse `derive_key`. Returns None for anything `derive_key` cannot produce.
pub fn decode_key(key: &str) -> Option<KeyParts> {
    let mut parts = key.splitn(3, SEPARATOR);
    let source_lang = parts.next()?;
    let target_lang = parts.next()?;
    let encoded = parts.next()?;
    if source_lang.is_empty() || target_lang.is_empty() || encoded.contains(SEPARATOR) {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    Some(KeyParts {
        source_lang: source_lang.to_string(),
        target_lang: target_lang.to_string(),
        text,
    })
}
