//! Run configuration: YAML config file merged under the command line.
//!
//! ```yaml
//! sources:
//!   - kind: binary
//!     path: target/plugins
//!   - kind: source
//!     path: workspace
//!     include: true
//!     qualifier: v20240101
//! bundles: [org.example.app]
//! output_dir: build
//! javac: /usr/bin/javac
//! javac_args: ["-source", "1.8", "-target", "1.8"]
//! allow_unresolved: false
//! placement:
//!   org.example.host: after-fragments
//! ```

use crate::cli::CliInvocation;
use crate::error::ConfigError;
use convenient_osgi::{FragmentPlacement, PlacementTable, SourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DEFAULT_OUTPUT_DIR: &str = "build";
const DEFAULT_JAVAC: &str = "javac";

/// One source folder to scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    /// Binary or source folder
    pub kind: SourceKind,
    /// Folder path
    pub path: PathBuf,
    /// Select every bundle found in this folder
    #[serde(default)]
    pub include: bool,
    /// Replacement for the `qualifier` version token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
}

/// Contents of a config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Source folders, scanned before those on the command line
    pub sources: Vec<SourceSpec>,
    /// Bundles to select by name
    pub bundles: Vec<String>,
    /// Output directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Java compiler
    #[serde(skip_serializing_if = "Option::is_none")]
    pub javac: Option<PathBuf>,
    /// Extra compiler arguments
    pub javac_args: Vec<String>,
    /// Build despite unresolved references
    pub allow_unresolved: bool,
    /// Fragment placement overrides by host name
    pub placement: BTreeMap<String, FragmentPlacement>,
}

impl ConfigFile {
    /// Load a config file. Relative paths in it are taken relative to the file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e.to_string()))?;

        let mut config: Self = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for source in &mut config.sources {
            source.path = rebase(base, &source.path);
        }
        config.output_dir = config.output_dir.map(|dir| rebase(base, &dir));

        info!(
            "Loaded config {} ({} sources, {} bundles)",
            path.display(),
            config.sources.len(),
            config.bundles.len()
        );
        Ok(config)
    }
}

fn rebase(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Effective settings of one run.
#[derive(Debug, Clone)]
pub struct Options {
    /// Source folders in scan order
    pub sources: Vec<SourceSpec>,
    /// Bundles to select by name
    pub bundles: Vec<String>,
    /// Output directory
    pub output_dir: PathBuf,
    /// Java compiler
    pub javac: PathBuf,
    /// Extra compiler arguments
    pub javac_args: Vec<String>,
    /// Build despite unresolved references
    pub allow_unresolved: bool,
    /// Fragment placement overrides
    pub placement: PlacementTable,
    /// Plan only
    pub dry_run: bool,
    /// Print the plan as JSON
    pub print_plan: bool,
}

impl Options {
    /// Merge the command line over the config file it names, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be loaded.
    pub fn from_invocation(invocation: CliInvocation) -> Result<Self, ConfigError> {
        let file = match &invocation.cli.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        Ok(Self::merge(file, invocation))
    }

    /// Config file values first; command line sources and bundles are
    /// appended and command line scalars win.
    pub fn merge(file: ConfigFile, invocation: CliInvocation) -> Self {
        let CliInvocation { cli, sources: cli_sources } = invocation;

        let mut sources = file.sources;
        sources.extend(cli_sources);
        let mut bundles = file.bundles;
        bundles.extend(cli.bundles);

        let mut placement = PlacementTable::with_defaults();
        for (name, value) in file.placement {
            placement.set(name, value);
        }
        for name in cli.after_fragments {
            placement.set(name, FragmentPlacement::AfterFragments);
        }

        let options = Self {
            sources,
            bundles,
            output_dir: cli
                .output
                .or(file.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            javac: cli
                .javac
                .or(file.javac)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_JAVAC)),
            javac_args: file.javac_args,
            allow_unresolved: cli.allow_unresolved || file.allow_unresolved,
            placement,
            dry_run: cli.dry_run,
            print_plan: cli.print_plan,
        };

        debug!("Effective options: {:?}", options);
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use tempfile::TempDir;

    fn invocation(args: &[&str]) -> CliInvocation {
        Cli::parse_args(std::iter::once("ecabu").chain(args.iter().copied())).unwrap()
    }

    const CONFIG: &str = r"
sources:
  - kind: binary
    path: target
  - kind: source
    path: ws
    include: true
    qualifier: v1
bundles: [org.example.app]
output_dir: out
javac_args: ['-source', '1.8']
placement:
  org.example.host: after-fragments
  org.eclipse.swt: before-fragments
";

    #[test]
    fn test_load_rebases_relative_paths() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ecabu.yml");
        std::fs::write(&path, CONFIG).unwrap();

        let config = ConfigFile::load(&path).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].path, tmp.path().join("target"));
        assert!(!config.sources[0].include);
        assert_eq!(config.sources[1].kind, SourceKind::Source);
        assert_eq!(config.sources[1].qualifier.as_deref(), Some("v1"));
        assert_eq!(config.output_dir, Some(tmp.path().join("out")));
        assert_eq!(config.javac_args, vec!["-source", "1.8"]);
    }

    #[test]
    fn test_unknown_key_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.yml");
        std::fs::write(&path, "sauces: []\n").unwrap();
        assert!(matches!(ConfigFile::load(&path), Err(ConfigError::ParseError(..))));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        assert!(matches!(
            ConfigFile::load("/definitely/not/here.yml"),
            Err(ConfigError::IoError(..))
        ));
    }

    #[test]
    fn test_command_line_wins() {
        let file: ConfigFile = serde_yaml::from_str(CONFIG).unwrap();
        let options = Options::merge(
            file,
            invocation(&["-I", "-B", "more", "-b", "org.example.tests", "-o", "elsewhere", "--after-fragments", "org.eclipse.ui"]),
        );

        let paths: Vec<_> = options.sources.iter().map(|s| s.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("target"), PathBuf::from("ws"), PathBuf::from("more")]);
        assert!(options.sources[2].include);
        assert_eq!(options.bundles, vec!["org.example.app", "org.example.tests"]);
        assert_eq!(options.output_dir, PathBuf::from("elsewhere"));
        assert_eq!(options.javac, PathBuf::from("javac"));

        assert_eq!(options.placement.placement("org.example.host"), FragmentPlacement::AfterFragments);
        assert_eq!(options.placement.placement("org.eclipse.swt"), FragmentPlacement::BeforeFragments);
        assert_eq!(options.placement.placement("org.eclipse.ui"), FragmentPlacement::AfterFragments);
    }

    #[test]
    fn test_defaults_without_config() {
        let options = Options::from_invocation(invocation(&[])).unwrap();
        assert!(options.sources.is_empty());
        assert_eq!(options.output_dir, PathBuf::from("build"));
        assert_eq!(
            options.placement.placement("org.eclipse.swt"),
            FragmentPlacement::AfterFragments
        );
        assert!(!options.allow_unresolved);
    }
}
