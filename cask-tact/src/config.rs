//! Build and CDN configuration file parsers.
//!
//! Config files are `key = value` text fetched from the CDN by hash. A few
//! keys hold space-separated lists; everything else is a scalar string.

use std::collections::HashMap;
use tracing::{debug, trace};

/// Keys whose values are space-separated lists.
const LIST_KEYS: &[&str] = &["archives", "patch-archives", "builds", "encoding-size"];

/// A parsed `key = value` configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    values: HashMap<String, String>,
    lists: HashMap<String, Vec<String>>,
}

impl ConfigFile {
    /// Parse a configuration file from text. Lines without a `=` and
    /// comment lines are ignored.
    pub fn parse(text: &str) -> Self {
        let mut values = HashMap::new();
        let mut lists = HashMap::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some(eq) = line.find('=') else { continue };
            let key = line[..eq].trim();
            let value = line[eq + 1..].trim();
            if key.is_empty() {
                continue;
            }

            trace!("config entry: '{key}' = '{value}'");

            if LIST_KEYS.contains(&key) {
                lists.insert(
                    key.to_string(),
                    value.split_whitespace().map(str::to_string).collect(),
                );
            }
            values.insert(key.to_string(), value.to_string());
        }

        debug!("parsed config: {} entries", values.len());
        Self { values, lists }
    }

    /// Get a scalar value by key.
    pub fn get_value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Get a list value by key. Only the known list-valued keys are split.
    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        self.lists.get(key).map(Vec::as_slice)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

/// Build configuration: ties a build to its encoding table and root
/// manifest.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub config: ConfigFile,
}

impl BuildConfig {
    pub fn parse(text: &str) -> Self {
        Self {
            config: ConfigFile::parse(text),
        }
    }

    /// The EKey of the encoding table blob.
    ///
    /// The `encoding` value is `<ckey> <ekey>`; the second token is the one
    /// stored on the CDN, with the first as a fallback when it is alone.
    pub fn encoding_ekey(&self) -> Option<&str> {
        let value = self.config.get_value("encoding")?;
        let mut tokens = value.split_whitespace();
        let first = tokens.next();
        tokens.next().or(first)
    }

    /// The CKey of the root manifest, when the build has one.
    pub fn root_ckey(&self) -> Option<&str> {
        self.config
            .get_value("root")
            .and_then(|v| v.split_whitespace().next())
    }

    pub fn build_name(&self) -> Option<&str> {
        self.config.get_value("build-name")
    }
}

/// CDN configuration: the set of archives for a build.
#[derive(Debug, Clone)]
pub struct CdnConfig {
    pub config: ConfigFile,
}

impl CdnConfig {
    pub fn parse(text: &str) -> Self {
        Self {
            config: ConfigFile::parse(text),
        }
    }

    /// Hashes of all data archives.
    pub fn archives(&self) -> &[String] {
        self.config.get_list("archives").unwrap_or_default()
    }

    /// Hashes of all patch archives. Parsed but not resolved by this
    /// client.
    pub fn patch_archives(&self) -> &[String] {
        self.config.get_list("patch-archives").unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_config() {
        let config = ConfigFile::parse(
            "# comment\n\
             key1 = value1\n\
             \n\
             key2 = value with spaces\n\
             malformed line\n",
        );

        assert_eq!(config.get_value("key1"), Some("value1"));
        assert_eq!(config.get_value("key2"), Some("value with spaces"));
        assert_eq!(config.get_value("malformed line"), None);
        assert!(!config.has_key("comment"));
    }

    #[test]
    fn test_list_keys_are_split() {
        let config = ConfigFile::parse(
            "archives = aaaa bbbb cccc\n\
             encoding-size = 123 456\n\
             root = dddd\n",
        );

        assert_eq!(
            config.get_list("archives"),
            Some(&["aaaa".to_string(), "bbbb".to_string(), "cccc".to_string()][..])
        );
        assert_eq!(
            config.get_list("encoding-size"),
            Some(&["123".to_string(), "456".to_string()][..])
        );
        // Scalar keys are not split
        assert_eq!(config.get_list("root"), None);
        assert_eq!(config.get_value("root"), Some("dddd"));
    }

    #[test]
    fn test_build_config_encoding_ekey() {
        let build = BuildConfig::parse("encoding = aabbccdd 11223344\n");
        assert_eq!(build.encoding_ekey(), Some("11223344"));

        // Single token falls back to the first
        let build = BuildConfig::parse("encoding = aabbccdd\n");
        assert_eq!(build.encoding_ekey(), Some("aabbccdd"));

        let build = BuildConfig::parse("root = ffff\n");
        assert_eq!(build.encoding_ekey(), None);
    }

    #[test]
    fn test_build_config_root() {
        let build = BuildConfig::parse("root = aabb 1234\nbuild-name = 1.36.0.12345\n");
        assert_eq!(build.root_ckey(), Some("aabb"));
        assert_eq!(build.build_name(), Some("1.36.0.12345"));
    }

    #[test]
    fn test_cdn_config_archives() {
        let cdn = CdnConfig::parse(
            "archives = a1 a2 a3\n\
             patch-archives = p1\n",
        );
        assert_eq!(cdn.archives().len(), 3);
        assert_eq!(cdn.archives()[2], "a3");
        assert_eq!(cdn.patch_archives(), &["p1".to_string()][..]);

        let empty = CdnConfig::parse("");
        assert!(empty.archives().is_empty());
    }
}
