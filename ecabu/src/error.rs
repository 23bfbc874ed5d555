use convenient_osgi::{ExecuteError, PlanError, SelectionError};
use std::path::PathBuf;
use thiserror::Error;

/// Problems with the command line or the config file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("IO error reading {0}: {1}")]
    IoError(PathBuf, String),

    /// Config file is not valid YAML for this tool
    #[error("Parse error in {0}: {1}")]
    ParseError(PathBuf, String),

    /// A source folder does not exist
    #[error("Source folder not found: {0}")]
    MissingSource(PathBuf),
}

/// Jar reading and writing errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// File system error
    #[error("IO error for {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Malformed archive
    #[error("Archive error in {path}: {source}")]
    Zip {
        /// Archive involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: zip::result::ZipError,
    },

    /// A classpath entry that is not in the jar
    #[error("Entry {entry} not found in {path}")]
    MissingEntry {
        /// Archive searched
        path: PathBuf,
        /// Entry requested
        entry: String,
    },
}

/// Everything that ends a run, each with its own exit code
#[derive(Debug, Error)]
pub enum EcabuError {
    /// Bad flags or config file
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Selection rules failed or selected nothing
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Mandatory references did not resolve
    #[error("{bundles} unresolved bundles and {packages} unresolved packages")]
    Unresolved {
        /// Unresolved bundle names
        bundles: usize,
        /// Unresolved package imports
        packages: usize,
    },

    /// The build plan could not be made
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Building a bundle failed
    #[error(transparent)]
    Execute(#[from] ExecuteError),

    /// Anything else touching the file system
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EcabuError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Selection(SelectionError::UnknownBundle(_)) => 2,
            Self::Selection(SelectionError::UnknownSource(_)) => 1,
            Self::Selection(SelectionError::NothingSelected) => 3,
            Self::Unresolved { .. } => 4,
            Self::Plan(PlanError::Cycle { .. }) => 5,
            Self::Plan(PlanError::UnknownBundle(_)) | Self::Io(_) => 1,
            Self::Execute(ExecuteError::Materialize(_)) => 6,
            Self::Execute(ExecuteError::UnknownBundle(_)) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convenient_osgi::MaterializeError;

    #[test]
    fn test_exit_codes() {
        let config: EcabuError = ConfigError::MissingSource("nowhere".into()).into();
        assert_eq!(config.exit_code(), 2);

        let unknown: EcabuError = SelectionError::UnknownBundle("x".into()).into();
        assert_eq!(unknown.exit_code(), 2);

        let empty: EcabuError = SelectionError::NothingSelected.into();
        assert_eq!(empty.exit_code(), 3);

        assert_eq!(EcabuError::Unresolved { bundles: 1, packages: 0 }.exit_code(), 4);

        let cycle: EcabuError = PlanError::Cycle { chain: vec!["a".into(), "a".into()] }.into();
        assert_eq!(cycle.exit_code(), 5);

        let compile: EcabuError = ExecuteError::Materialize(MaterializeError::CompileFailed {
            bundle: "a".into(),
            message: "exit status: 1".into(),
        })
        .into();
        assert_eq!(compile.exit_code(), 6);

        let io: EcabuError = std::io::Error::other("disk full").into();
        assert_eq!(io.exit_code(), 1);
    }

    #[test]
    fn test_messages() {
        let err = EcabuError::Unresolved { bundles: 2, packages: 1 };
        assert_eq!(err.to_string(), "2 unresolved bundles and 1 unresolved packages");

        let err: EcabuError = SelectionError::NothingSelected.into();
        assert_eq!(err.to_string(), "No bundles selected for building. Stop.");
    }
}
