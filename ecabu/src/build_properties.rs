//! `build.properties` of source bundles.
//!
//! Java properties syntax: `key = value` or `key: value`, `#` and `!`
//! comments, and a trailing backslash continuing the value on the next line.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use tracing::debug;

/// File name inside a source bundle.
pub const BUILD_PROPERTIES: &str = "build.properties";

/// Parsed `build.properties`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildProperties {
    entries: BTreeMap<String, String>,
}

impl BuildProperties {
    /// Parse properties text. Later keys replace earlier ones.
    pub fn parse(text: &str) -> Self {
        let mut entries = BTreeMap::new();
        let mut logical = String::new();

        for line in text.lines() {
            let line = line.trim_start();
            if logical.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
                continue;
            }
            match line.strip_suffix('\\') {
                Some(head) => logical.push_str(head),
                None => {
                    logical.push_str(line);
                    if let Some((key, value)) = split_pair(&logical) {
                        entries.insert(key, value);
                    }
                    logical.clear();
                }
            }
        }
        if let Some((key, value)) = split_pair(&logical) {
            entries.insert(key, value);
        }

        Self { entries }
    }

    /// Read `build.properties` from a bundle directory. A missing file is empty.
    ///
    /// # Errors
    ///
    /// Returns the IO error if the file exists but cannot be read.
    pub fn load(bundle_dir: &Path) -> io::Result<Self> {
        let path = bundle_dir.join(BUILD_PROPERTIES);
        if !path.is_file() {
            debug!("No {} in {}", BUILD_PROPERTIES, bundle_dir.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        Ok(Self::parse(&text))
    }

    /// Value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Source folders compiled into a classpath entry (`source.<entry>`).
    pub fn source_folders(&self, entry: &str) -> Vec<String> {
        self.list(&format!("source.{entry}"))
    }

    /// Files and folders listed in `bin.includes`.
    pub fn bin_includes(&self) -> Vec<String> {
        self.list("bin.includes")
    }

    fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn split_pair(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.find(['=', ':']) {
        Some(at) => Some((
            line[..at].trim().to_string(),
            line[at + 1..].trim().to_string(),
        )),
        None => Some((line.to_string(), String::new())),
    }
}
