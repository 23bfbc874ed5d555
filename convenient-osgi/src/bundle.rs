// Bundle model with flat, ID-based references into the registry arena

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Location of the manifest relative to a bundle root.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

// === ID Types (cheap to copy, use as keys) ===

/// Unique identifier for a bundle in a [`crate::BundleRegistry`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct BundleId(pub u32);

impl BundleId {
    /// Position in the registry arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Unique identifier for a bundle source
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct SourceId(pub u32);

impl SourceId {
    /// Position in the registry's source list.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A path-like classpath token produced by the build step.
pub type ClasspathEntry = PathBuf;

// === Sources ===

/// What a source folder contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Prebuilt bundles: directories and jars, names may carry a version suffix.
    Binary,
    /// Bundle projects that have to be compiled.
    Source,
}

/// A folder the bundles were discovered in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Registry-assigned id
    pub id: SourceId,
    /// Binary or source folder
    pub kind: SourceKind,
    /// Folder path
    pub path: PathBuf,
    /// Replacement for the `qualifier` token in bundle versions
    pub qualifier: Option<String>,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SourceKind::Binary => write!(f, "binary bundles folder {}", self.path.display()),
            SourceKind::Source => write!(f, "source bundles folder {}", self.path.display()),
        }
    }
}

// === Locations ===

/// Errors reading a bundle's manifest
#[derive(Debug, Error)]
pub enum LocationError {
    /// File system error
    #[error("IO error reading {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Jar could not be opened or read
    #[error("Archive error in {path}: {source}")]
    Archive {
        /// Jar that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: zip::result::ZipError,
    },
}

/// Where a bundle lives and how its manifest is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleLocation {
    /// Unpacked bundle directory
    Directory(PathBuf),
    /// Bundle jar
    Archive(PathBuf),
    /// Manifest text supplied directly by an embedding caller
    Inline {
        /// Name used in diagnostics
        label: String,
        /// Manifest text, `None` for a bundle without manifest
        manifest: Option<String>,
    },
}

impl BundleLocation {
    /// File system path of the bundle, if it has one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Directory(path) | Self::Archive(path) => Some(path),
            Self::Inline { .. } => None,
        }
    }

    /// Label of the manifest used in diagnostics.
    pub fn manifest_label(&self) -> String {
        match self {
            Self::Directory(path) => path.join(MANIFEST_PATH).display().to_string(),
            Self::Archive(path) => format!("{}:/{MANIFEST_PATH}", path.display()),
            Self::Inline { label, .. } => label.clone(),
        }
    }

    /// Read the manifest text. `Ok(None)` means the bundle has no manifest.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError`] if the manifest exists but cannot be read.
    pub fn read_manifest(&self) -> Result<Option<String>, LocationError> {
        match self {
            Self::Directory(dir) => {
                let path = dir.join(MANIFEST_PATH);
                if !path.is_file() {
                    return Ok(None);
                }
                let bytes = std::fs::read(&path).map_err(|source| LocationError::Io {
                    path: path.clone(),
                    source,
                })?;
                Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
            }
            Self::Archive(jar) => read_archive_manifest(jar),
            Self::Inline { manifest, .. } => Ok(manifest.clone()),
        }
    }
}

impl fmt::Display for BundleLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory(path) | Self::Archive(path) => write!(f, "{}", path.display()),
            Self::Inline { label, .. } => f.write_str(label),
        }
    }
}

fn read_archive_manifest(jar: &Path) -> Result<Option<String>, LocationError> {
    let archive_error = |source| LocationError::Archive {
        path: jar.to_path_buf(),
        source,
    };

    let file = File::open(jar).map_err(|source| LocationError::Io {
        path: jar.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(archive_error)?;

    let mut entry = match archive.by_name(MANIFEST_PATH) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(archive_error(e)),
    };

    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).map_err(|source| LocationError::Io {
        path: jar.to_path_buf(),
        source,
    })?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

// === Bundle ===

/// Lifecycle of a bundle within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BundleState {
    /// Known by name and location only
    Discovered,
    /// Manifest read and dependency fields filled
    Parsed,
    /// Build step produced the bundle's own classpath
    Materialized,
    /// Exported classpath includes re-exported and fragment classpaths
    Propagated,
}

/// A resolved dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    /// Required bundle
    pub bundle: BundleId,
    /// Whether the requirement is `visibility:=reexport`
    pub reexported: bool,
}

/// An `Import-Package` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageImport {
    /// Package name
    pub name: String,
    /// Whether the import is `resolution:=optional`
    pub optional: bool,
}

/// A bundle in the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    /// Registry id
    pub id: BundleId,
    /// Symbolic name (unversioned)
    pub name: String,
    /// Source folder the bundle was discovered in
    pub source: SourceId,
    /// Directory, jar or inline manifest
    pub location: BundleLocation,

    /// `Bundle-Version` as declared
    pub version: String,
    /// Version with the `qualifier` token substituted
    pub qualified_version: String,

    pub(crate) state: BundleState,

    /// Required bundles, from `Require-Bundle` and resolved package imports
    pub required: Vec<Requirement>,
    /// `Fragment-Host` name
    pub fragment_host: Option<String>,
    /// Resolved fragment host, set by the fragment index
    pub host: Option<BundleId>,
    /// `Export-Package` names
    pub exported_packages: Vec<String>,
    /// `Import-Package` entries
    pub imported_packages: Vec<PackageImport>,
    /// `Bundle-ClassPath` entries as written
    pub raw_classpath: Vec<String>,
    /// `Eclipse-ExtensibleAPI: true`
    pub extensible_api: bool,

    /// Classpath produced by the build step
    pub own_classpath: Vec<ClasspathEntry>,
    /// Classpath visible to dependents
    pub exported_classpath: Vec<ClasspathEntry>,
}

impl Bundle {
    /// Create a discovered, unparsed bundle.
    pub fn new(id: BundleId, name: impl Into<String>, source: SourceId, location: BundleLocation) -> Self {
        Self {
            id,
            name: name.into(),
            source,
            location,
            version: String::new(),
            qualified_version: String::new(),
            state: BundleState::Discovered,
            required: Vec::new(),
            fragment_host: None,
            host: None,
            exported_packages: Vec::new(),
            imported_packages: Vec::new(),
            raw_classpath: Vec::new(),
            extensible_api: false,
            own_classpath: Vec::new(),
            exported_classpath: Vec::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BundleState {
        self.state
    }

    /// Whether the manifest has been read.
    pub fn is_parsed(&self) -> bool {
        self.state >= BundleState::Parsed
    }

    /// Whether this bundle attaches to a host.
    pub fn is_fragment(&self) -> bool {
        self.fragment_host.is_some()
    }

    /// Whether `other` is already a requirement.
    pub fn requires(&self, other: BundleId) -> bool {
        self.required.iter().any(|r| r.bundle == other)
    }

    /// Classpath entries, with an absent `Bundle-ClassPath` read as `.`.
    pub fn classpath_entries(&self) -> Vec<&str> {
        if self.raw_classpath.is_empty() {
            vec!["."]
        } else {
            self.raw_classpath.iter().map(String::as_str).collect()
        }
    }

    /// Whether the bundle can be packaged as one archive (every entry is `.`).
    pub fn is_single_archive(&self) -> bool {
        self.classpath_entries().iter().all(|entry| *entry == ".")
    }

    /// Name and qualified version, e.g. `org.eclipse.swt_3.5.0.v20090604`.
    pub fn full_name(&self) -> String {
        if self.qualified_version.is_empty() {
            self.name.clone()
        } else {
            format!("{}_{}", self.name, self.qualified_version)
        }
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.location)
    }
}

/// Replace the literal `qualifier` token of a version.
pub fn substitute_qualifier(version: &str, qualifier: Option<&str>) -> String {
    match qualifier {
        Some(q) => version.replace("qualifier", q),
        None => version.to_string(),
    }
}
