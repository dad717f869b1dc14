//! Opaque pagination cursors.
//!
//! A cursor carries the store's resume point (the last evaluated key of a
//! scan) to the client and back. The token is the key's JSON form in the
//! URL-safe base64 alphabet without padding, so it can travel as a query
//! parameter as is. Padded tokens are accepted too.
//!
//! Decoding never fails: an empty, malformed or forged token reads as "no
//! cursor" and the scan starts from the beginning. [`decode_for`] also
//! rejects keys that do not fit the scanned collection's key schema.

use crate::record::Key;
use crate::store::KeySchema;

use base64::{Engine, alphabet, engine};

const CURSOR_ENGINE: engine::GeneralPurpose = engine::GeneralPurpose::new(
    &alphabet::URL_SAFE,
    engine::GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(engine::DecodePaddingMode::Indifferent),
);

/// Encode a resume point as a cursor; `None` stays `None`.
///
/// ```rust
/// use recipe_store::{cursor, record};
///
/// let key = record::key("Id", "10");
/// let token = cursor::encode(Some(&key));
/// assert_eq!(cursor::decode(token.as_deref()), Some(key));
/// assert_eq!(cursor::encode(None), None);
/// ```
pub fn encode(resume_point: Option<&Key>) -> Option<String> {
    let key = resume_point?;
    let json = serde_json::to_vec(key).ok()?;
    Some(CURSOR_ENGINE.encode(json))
}

/// Decode a cursor back into a resume point.
///
/// Returns `None` for a missing, empty or unreadable token.
pub fn decode(token: Option<&str>) -> Option<Key> {
    let token = token?.trim();
    if token.is_empty() {
        return None;
    }
    let Ok(json) = CURSOR_ENGINE.decode(token) else {
        #[cfg(feature = "tracing")]
        tracing::debug!(token, "ignoring cursor that is not base64");
        return None;
    };
    let Ok(key) = serde_json::from_slice::<Key>(&json) else {
        #[cfg(feature = "tracing")]
        tracing::debug!(token, "ignoring cursor that is not a key");
        return None;
    };
    (!key.is_empty()).then_some(key)
}

/// Decode a cursor issued for a collection keyed by `schema`.
///
/// Returns `None` like [`decode`], and also when the key carries other
/// attributes than the schema's key attributes, or values that are neither
/// strings nor numbers.
///
/// ```rust
/// use recipe_store::{cursor, record, store::KeySchema};
///
/// let schema = KeySchema::new("Id");
/// let own = cursor::encode(Some(&record::key("Id", "10")));
/// let foreign = cursor::encode(Some(&record::key("UserID", "u-1")));
/// assert_eq!(cursor::decode_for(own.as_deref(), &schema), Some(record::key("Id", "10")));
/// assert_eq!(cursor::decode_for(foreign.as_deref(), &schema), None);
/// ```
pub fn decode_for(token: Option<&str>, schema: &KeySchema) -> Option<Key> {
    let key = decode(token)?;
    if !schema.accepts(&key) {
        #[cfg(feature = "tracing")]
        tracing::debug!(?key, "ignoring cursor of another key schema");
        return None;
    }
    Some(key)
}
