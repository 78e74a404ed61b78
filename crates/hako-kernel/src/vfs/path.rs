//! Virtual path parsing.
//!
//! The syntactic half of resolution: turns untrusted client text into a list
//! of validated segments. Nothing here touches the filesystem.

use std::fmt;

use percent_encoding::percent_decode_str;

use super::error::{VfsError, VfsResult};

/// A client path after decoding and validation.
///
/// Holds zero or more segments, none of which is empty, `.`, `..`, contains
/// a `/`, or contains a control character. Zero segments is the sandbox root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VirtualPath {
    segments: Vec<String>,
}

impl VirtualPath {
    /// The sandbox root, `/`.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse the raw (still percent-encoded) remainder of a request URL.
    ///
    /// Each segment is decoded on its own, so `%2E%2E` is seen as `..` and
    /// `%2F` cannot smuggle an extra separator. Leading slashes are collapsed
    /// and one trailing slash is allowed; empty interior segments are not.
    pub fn from_url(raw: &str) -> VfsResult<Self> {
        let trimmed = raw.trim_start_matches('/');
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let segments = trimmed
            .split('/')
            .map(|seg| {
                let decoded = decode_strict(seg, raw)?;
                check_segment(&decoded, raw)?;
                Ok(decoded)
            })
            .collect::<VfsResult<Vec<_>>>()?;

        Ok(Self { segments })
    }

    /// Parse an already-decoded virtual path that must be absolute, as used
    /// by RPC arguments and the upload destination header.
    pub fn parse_absolute(path: &str) -> VfsResult<Self> {
        let Some(rest) = path.strip_prefix('/') else {
            return Err(VfsError::invalid_path(path));
        };
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.is_empty() {
            return Ok(Self::root());
        }

        let segments = rest
            .split('/')
            .map(|seg| {
                check_segment(seg, path)?;
                Ok(seg.to_string())
            })
            .collect::<VfsResult<Vec<_>>>()?;

        Ok(Self { segments })
    }

    /// Parse a whole percent-encoded absolute path, as carried by the
    /// upload destination header. The value is decoded once, then held to
    /// the same rules as [`VirtualPath::parse_absolute`].
    pub fn from_encoded_absolute(raw: &str) -> VfsResult<Self> {
        Self::parse_absolute(&decode_strict(raw, raw)?)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.segments.split_last()?;
        Some(Self {
            segments: init.to_vec(),
        })
    }

    /// Child path. `name` must itself be a valid segment.
    pub fn join(&self, name: &str) -> VfsResult<Self> {
        check_segment(name, name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(Self { segments })
    }

    /// Directory form with a trailing slash: `/` or `/a/b/`.
    pub fn to_dir_string(&self) -> String {
        if self.is_root() {
            "/".to_string()
        } else {
            format!("/{}/", self.segments.join("/"))
        }
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

/// Percent-decode `encoded` to UTF-8. Every `%` must start a two hex digit
/// escape; the decoder itself would pass `%ZZ` or a trailing `%2` through.
fn decode_strict(encoded: &str, original: &str) -> VfsResult<String> {
    let bytes = encoded.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                return Err(VfsError::invalid_path(original));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    percent_decode_str(encoded)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| VfsError::invalid_path(original))
}

/// Reject traversal and malformed segments. `original` is the client input
/// reported in the error.
fn check_segment(seg: &str, original: &str) -> VfsResult<()> {
    if seg.is_empty() || seg == "." || seg == ".." {
        return Err(VfsError::invalid_path(original));
    }
    if seg.contains('/') || seg.chars().any(char::is_control) {
        return Err(VfsError::invalid_path(original));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(p: &VirtualPath) -> Vec<&str> {
        p.segments().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_from_url_decodes_each_segment() {
        let p = VirtualPath::from_url("/subdir_with%20space/file_with%20space.html").unwrap();
        assert_eq!(segs(&p), ["subdir_with space", "file_with space.html"]);

        let p = VirtualPath::from_url("/%E1%84%92%E1%85%A1%20%E1%84%92%E1%85%A1").unwrap();
        assert_eq!(segs(&p), ["\u{1112}\u{1161} \u{1112}\u{1161}"]);
    }

    #[test]
    fn test_from_url_root_forms() {
        assert!(VirtualPath::from_url("").unwrap().is_root());
        assert!(VirtualPath::from_url("/").unwrap().is_root());
        assert!(VirtualPath::from_url("//").unwrap().is_root());
    }

    #[test]
    fn test_from_url_collapses_leading_slashes() {
        let p = VirtualPath::from_url("//docker/readme.md").unwrap();
        assert_eq!(segs(&p), ["docker", "readme.md"]);
    }

    #[test]
    fn test_from_url_trailing_slash() {
        let p = VirtualPath::from_url("/hols/").unwrap();
        assert_eq!(segs(&p), ["hols"]);
    }

    #[test]
    fn test_dotdot_rejected_at_any_depth() {
        for raw in [
            "/../x",
            "/a/../../x",
            "/a/../b",
            "../../",
            "/hols/../../",
            "/../../../../../../../../../../etc/passwd",
            "/%2E%2E/x",
            "/a/%2e%2e",
        ] {
            let err = VirtualPath::from_url(raw).unwrap_err();
            assert!(matches!(err, VfsError::InvalidPath(_)), "{raw} accepted");
        }
    }

    #[test]
    fn test_dot_and_empty_segments_rejected() {
        for raw in ["/./a", "/a/.", "/a//b", "/a/%2F/b"] {
            assert!(VirtualPath::from_url(raw).is_err(), "{raw} accepted");
        }
    }

    #[test]
    fn test_encoded_slash_rejected() {
        assert!(VirtualPath::from_url("/a%2Fb").is_err());
    }

    #[test]
    fn test_control_characters_rejected() {
        assert!(VirtualPath::from_url("/a%00b").is_err());
        assert!(VirtualPath::from_url("/a%0Ab").is_err());
        assert!(VirtualPath::parse_absolute("/a\u{7f}").is_err());
    }

    #[test]
    fn test_malformed_escapes_rejected() {
        for raw in ["/a%ZZ", "/a%2", "/%", "/a%G1/b", "/%E4%B8"] {
            let err = VirtualPath::from_url(raw).unwrap_err();
            assert!(matches!(err, VfsError::InvalidPath(_)), "{raw} accepted");
        }
        let p = VirtualPath::from_url("/100%25").unwrap();
        assert_eq!(segs(&p), ["100%"]);
    }

    #[test]
    fn test_from_encoded_absolute() {
        let p = VirtualPath::from_encoded_absolute("%2Fhols%2FAAA%2Fabcdef").unwrap();
        assert_eq!(segs(&p), ["hols", "AAA", "abcdef"]);

        for raw in ["%2Fa%ZZ", "%2Fa%2", "%2E%2E%2Fx", "%2F%2E%2E%2Fx", "hols", "%2Fa%00b"] {
            let err = VirtualPath::from_encoded_absolute(raw).unwrap_err();
            assert!(matches!(err, VfsError::InvalidPath(_)), "{raw} accepted");
        }
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        assert!(VirtualPath::from_url("/%FF%FE").is_err());
    }

    #[test]
    fn test_parse_absolute_requires_leading_slash() {
        assert!(VirtualPath::parse_absolute("AAA").is_err());
        assert!(VirtualPath::parse_absolute("../BBB").is_err());
        assert!(VirtualPath::parse_absolute("/../BBB").is_err());
        assert!(VirtualPath::parse_absolute("").is_err());

        let p = VirtualPath::parse_absolute("/hols/AAA").unwrap();
        assert_eq!(segs(&p), ["hols", "AAA"]);
    }

    #[test]
    fn test_parse_absolute_does_not_decode() {
        let p = VirtualPath::parse_absolute("/100%25").unwrap();
        assert_eq!(segs(&p), ["100%25"]);
    }

    #[test]
    fn test_display_and_dir_string() {
        let p = VirtualPath::parse_absolute("/a/b").unwrap();
        assert_eq!(p.to_string(), "/a/b");
        assert_eq!(p.to_dir_string(), "/a/b/");
        assert_eq!(VirtualPath::root().to_string(), "/");
        assert_eq!(VirtualPath::root().to_dir_string(), "/");
    }

    #[test]
    fn test_parent_and_join() {
        let p = VirtualPath::parse_absolute("/a/b").unwrap();
        assert_eq!(p.parent().unwrap().to_string(), "/a");
        assert_eq!(p.file_name(), Some("b"));
        assert!(VirtualPath::root().parent().is_none());
        assert_eq!(p.join("c").unwrap().to_string(), "/a/b/c");
        assert!(p.join("..").is_err());
    }
}
