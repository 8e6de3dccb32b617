//! The `"version"` field embedded in zone artifacts.

use std::borrow::Cow;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use regex::{Regex, bytes};

static VERSION_KEY: LazyLock<bytes::Regex> = LazyLock::new(|| {
    bytes::Regex::new(r#""version"\s*:\s*""#).expect("version key pattern is valid")
});

static VERSION_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""version"\s*:\s*"([0-9.]+)""#).expect("version value pattern is valid")
});

/// Insert `prefix` at the start of every `"version"` value in `content`.
///
/// Works on raw bytes; the rest of the artifact need not be UTF-8.
pub fn prefix_versions<'a>(content: &'a [u8], prefix: &str) -> Cow<'a, [u8]> {
    if prefix.is_empty() {
        return Cow::Borrowed(content);
    }
    VERSION_KEY.replace_all(content, |caps: &bytes::Captures| {
        let mut key = caps[0].to_vec();
        key.extend_from_slice(prefix.as_bytes());
        key
    })
}

/// Find the first version value in `line`.
pub fn version_in(line: &str) -> Option<&str> {
    VERSION_VALUE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Scan an artifact line by line for its version.
pub fn find_version(path: &Path) -> io::Result<Option<String>> {
    let mut reader = BufReader::new(std::fs::File::open(path)?);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&buf);
        if let Some(version) = version_in(&line) {
            return Ok(Some(version.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_in() {
        assert_eq!(version_in(r#"  "version" : "13.10","#), Some("13.10"));
        assert_eq!(version_in(r#"{"version":"2"}"#), Some("2"));
        assert_eq!(version_in(r#""version" : "beta","#), None);
        assert_eq!(version_in(r#""name" : "AS_","#), None);
    }

    #[test]
    fn test_find_version_scans_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AS_.json");
        std::fs::write(
            &path,
            "{\n  \"name\" : \"Asia\",\n  \"version\" : \"4.2.1\",\n  \"zones\" : []\n}\n",
        )
        .unwrap();

        assert_eq!(find_version(&path).unwrap().as_deref(), Some("4.2.1"));
    }

    #[test]
    fn test_find_version_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("EU_.json");
        std::fs::write(&path, "{ \"zones\" : [] }").unwrap();

        assert_eq!(find_version(&path).unwrap(), None);
    }

    #[test]
    fn test_prefix_versions() {
        let content = br#"{ "version" : "10", "inner" : { "version":"11" } }"#;
        assert_eq!(
            &*prefix_versions(content, "7"),
            br#"{ "version" : "710", "inner" : { "version":"711" } }"#
        );
        assert!(matches!(prefix_versions(content, ""), Cow::Borrowed(_)));
    }

    #[test]
    fn test_prefix_versions_keeps_non_utf8_bytes() {
        let mut content = b"{ \"name\" : \"".to_vec();
        content.extend_from_slice(&[0xC3, 0x28, 0xFF]);
        content.extend_from_slice(b"\", \"version\" : \"3.1\" }");

        let prefixed = prefix_versions(&content, "99");

        let mut expected = b"{ \"name\" : \"".to_vec();
        expected.extend_from_slice(&[0xC3, 0x28, 0xFF]);
        expected.extend_from_slice(b"\", \"version\" : \"993.1\" }");
        assert_eq!(prefixed.into_owned(), expected);
    }
}
