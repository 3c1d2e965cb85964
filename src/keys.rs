//! Object naming and the public URL contract
//!
//! Keys look like `{group_id}/{uuid}.{ext}` and public URLs like
//! `https://{host}/{bucket}/{key}`. Deletion depends on turning a stored URL
//! back into its key, so [`UrlScheme::resolve_key`] must stay the exact
//! inverse of [`UrlScheme::public_url`]. Changing the host or bucket breaks
//! every URL already persisted by callers.

use crate::{Error, Result};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Derive a fresh key for an asset in `group_id`.
    ///
    /// Uniqueness comes from the v4 token alone; the store is not consulted.
    pub fn generate(group_id: &str, extension: &str) -> Result<Self> {
        validate_group_id(group_id)?;
        let extension = extension.trim_start_matches('.');
        Ok(Self(format!("{}/{}.{}", group_id, Uuid::new_v4(), extension)))
    }

    /// Accept an existing key, e.g. one read back from a caller's records.
    pub fn parse(raw: &str) -> Result<Self> {
        check_key(raw).map_err(|reason| Error::InvalidKey {
            key: raw.to_string(),
            reason,
        })?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Characters that would change how a public URL is read back.
const URL_RESERVED: [char; 3] = ['?', '#', '%'];

/// Group ids become the first path segment of every key, embedded raw in
/// the public URL.
pub fn validate_group_id(group_id: &str) -> Result<()> {
    if group_id.is_empty()
        || group_id == "."
        || group_id == ".."
        || group_id.contains(['/', '\\'])
        || group_id.contains(URL_RESERVED)
        || group_id.chars().any(char::is_control)
    {
        return Err(Error::InvalidGroupId {
            group_id: group_id.to_string(),
        });
    }
    Ok(())
}

/// Maps keys to public URLs and back for one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlScheme {
    prefix: String,
    marker: String,
}

impl UrlScheme {
    pub fn new(host: &str, bucket: &str) -> Self {
        let host = host.trim_end_matches('/');
        let host = host
            .strip_prefix("https://")
            .or_else(|| host.strip_prefix("http://"))
            .unwrap_or(host);
        Self {
            prefix: format!("https://{}/{}/", host, bucket),
            marker: format!("/{}/", bucket),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn public_url(&self, key: &ObjectKey) -> String {
        format!("{}{}", self.prefix, key.as_str())
    }

    /// Recover the key embedded in a public URL.
    ///
    /// Everything after the first `/{bucket}/` is the key. Query strings and
    /// fragments are dropped. Anything that would address outside the
    /// bucket's key space is rejected.
    pub fn resolve_key(&self, url: &str) -> Result<ObjectKey> {
        let malformed = |reason| Error::MalformedUrl {
            url: url.to_string(),
            reason,
        };

        let start = url
            .find(&self.marker)
            .map(|index| index + self.marker.len())
            .ok_or_else(|| malformed("bucket marker not found"))?;

        let rest = &url[start..];
        let key = rest.split(['?', '#']).next().unwrap_or_default();
        check_key(key).map_err(malformed)?;

        Ok(ObjectKey(key.to_string()))
    }
}

fn check_key(key: &str) -> std::result::Result<(), &'static str> {
    if key.is_empty() {
        return Err("empty object key");
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err("object key escapes the bucket");
    }
    if key.contains(URL_RESERVED) || key.chars().any(char::is_control) {
        return Err("object key has reserved characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> UrlScheme {
        UrlScheme::new("storage.googleapis.com", "minography_gcs")
    }

    #[test]
    fn test_generated_key_layout() {
        let key = ObjectKey::generate("42", "webp").unwrap();
        let (group, file) = key.as_str().split_once('/').unwrap();

        assert_eq!(group, "42");
        let token = file.strip_suffix(".webp").unwrap();
        assert!(Uuid::parse_str(token).is_ok());
    }

    #[test]
    fn test_extension_leading_dot_is_tolerated() {
        let key = ObjectKey::generate("7", ".webp").unwrap();
        assert!(key.as_str().ends_with(".webp"));
        assert!(!key.as_str().ends_with("..webp"));
    }

    #[test]
    fn test_unique_tokens_for_same_group() {
        let first = ObjectKey::generate("42", "webp").unwrap();
        let second = ObjectKey::generate("42", "webp").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_invalid_group_ids_are_rejected() {
        for group in ["", ".", "..", "a/b", "a\\b", "a\nb", "a?b", "a#b", "a%2Fb"] {
            let err = ObjectKey::generate(group, "webp").unwrap_err();
            assert!(matches!(err, Error::InvalidGroupId { .. }), "{group:?}");
        }
    }

    #[test]
    fn test_public_url_format() {
        let key = ObjectKey("12/0b7c.webp".to_string());
        assert_eq!(
            scheme().public_url(&key),
            "https://storage.googleapis.com/minography_gcs/12/0b7c.webp"
        );
    }

    #[test]
    fn test_host_scheme_and_trailing_slash_are_normalized() {
        let a = UrlScheme::new("https://storage.googleapis.com/", "photos");
        let b = UrlScheme::new("storage.googleapis.com", "photos");
        assert_eq!(a, b);
    }

    #[test]
    fn test_resolve_is_inverse_of_public_url() {
        let scheme = scheme();
        for group in ["1", "project-9", "team_a"] {
            let key = ObjectKey::generate(group, "webp").unwrap();
            let url = scheme.public_url(&key);
            assert_eq!(scheme.resolve_key(&url).unwrap(), key);
        }
    }

    #[test]
    fn test_accepted_groups_survive_the_url_round_trip() {
        let scheme = scheme();
        for group in ["a b", "café", "a&b=c", "~user", "a+b", "a;b"] {
            let key = ObjectKey::generate(group, "webp").unwrap();
            let url = scheme.public_url(&key);
            assert_eq!(scheme.resolve_key(&url).unwrap(), key, "{group:?}");
        }
    }

    #[test]
    fn test_query_in_group_cannot_alias_another_key() {
        assert!(ObjectKey::generate("a?b", "webp").is_err());
        assert!(ObjectKey::generate("a#b", "webp").is_err());
    }

    #[test]
    fn test_parse_existing_key() {
        let key = ObjectKey::parse("12/0b7c.webp").unwrap();
        assert_eq!(
            scheme().public_url(&key),
            "https://storage.googleapis.com/minography_gcs/12/0b7c.webp"
        );

        for raw in ["", "/12/a.webp", "12/../a.webp", "12/a.webp?v=1"] {
            let err = ObjectKey::parse(raw).unwrap_err();
            assert!(matches!(err, Error::InvalidKey { .. }), "{raw:?}");
        }
    }

    #[test]
    fn test_resolve_without_marker_is_checked_failure() {
        let err = scheme()
            .resolve_key("https://storage.googleapis.com/other-bucket/1/a.webp")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedUrl {
                reason: "bucket marker not found",
                ..
            }
        ));

        assert!(scheme().resolve_key("").is_err());
    }

    #[test]
    fn test_resolve_rejects_empty_and_escaping_keys() {
        let scheme = scheme();
        let base = "https://storage.googleapis.com/minography_gcs/";

        assert!(scheme.resolve_key(base).is_err());
        assert!(scheme.resolve_key(&format!("{base}?x=1")).is_err());
        assert!(scheme.resolve_key(&format!("{base}/etc/passwd")).is_err());
        assert!(scheme.resolve_key(&format!("{base}1/../../x")).is_err());
    }

    #[test]
    fn test_resolve_drops_query_and_fragment() {
        let key = scheme()
            .resolve_key("https://storage.googleapis.com/minography_gcs/3/a.webp?v=2#top")
            .unwrap();
        assert_eq!(key.as_str(), "3/a.webp");
    }
}
