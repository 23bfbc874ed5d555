//! Turning planned bundles into classpath entries on disk.
//!
//! Binary bundles are used where they are, except that classpath entries
//! nested inside a jar are extracted first. Source bundles are compiled with
//! `javac`; those whose classpath is just `.` are packed, together with what
//! `bin.includes` lists, into a jar under `<output>/plugins`.

use crate::archive::{create_jar, extract_entry};
use crate::build_properties::BuildProperties;
use convenient_osgi::{
    Bundle, BundleLocation, ClasspathEntry, MaterializeError, MaterializeRequest, Materializer,
    SourceKind,
};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

const DEFAULT_SOURCE_FOLDER: &str = "src";
const CLASSES_DIR: &str = "classes";

/// Builds bundles below an output directory, compiling with `javac`.
#[derive(Debug, Clone)]
pub struct JavacMaterializer {
    output_dir: PathBuf,
    javac: PathBuf,
    javac_args: Vec<String>,
}

impl JavacMaterializer {
    /// Materializer writing below `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>, javac: impl Into<PathBuf>, javac_args: Vec<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            javac: javac.into(),
            javac_args,
        }
    }

    /// Where packaged bundles go.
    pub fn plugins_dir(&self) -> PathBuf {
        self.output_dir.join("plugins")
    }

    /// Scratch space of one bundle: extracted entries, compiled classes, argument files.
    pub fn work_dir(&self, bundle: &Bundle) -> PathBuf {
        self.output_dir.join("work").join(bundle.full_name())
    }

    fn binary_archive(&self, bundle: &Bundle, jar: &Path) -> Result<Vec<ClasspathEntry>, MaterializeError> {
        if bundle.is_single_archive() {
            return Ok(vec![jar.to_path_buf()]);
        }
        let work = self.work_dir(bundle);
        bundle
            .classpath_entries()
            .into_iter()
            .map(|entry| {
                if entry == "." {
                    Ok(jar.to_path_buf())
                } else {
                    extract_entry(jar, entry, &work).map_err(|e| MaterializeError::Failed {
                        bundle: bundle.name.clone(),
                        message: e.to_string(),
                    })
                }
            })
            .collect()
    }

    fn source_bundle(
        &self,
        request: &MaterializeRequest<'_>,
        dir: &Path,
    ) -> Result<Vec<ClasspathEntry>, MaterializeError> {
        let bundle = request.bundle;
        let io_error = |source: io::Error| MaterializeError::Io {
            bundle: bundle.name.clone(),
            source,
        };
        let properties = BuildProperties::load(dir).map_err(io_error)?;
        let work = self.work_dir(bundle);

        let mut own: Vec<ClasspathEntry> = Vec::new();
        let mut compiled_root = None;
        for entry in bundle.classpath_entries() {
            let folders = source_folders(&properties, dir, entry);
            if folders.is_empty() {
                own.push(resolve_entry(dir, entry));
                continue;
            }

            let out = if entry == "." {
                work.join(CLASSES_DIR)
            } else {
                work.join(entry.trim_end_matches('/'))
            };
            fs::create_dir_all(&out).map_err(io_error)?;

            let sources = collect_sources(&folders, &out).map_err(io_error)?;
            if sources.is_empty() {
                debug!("No Java sources for {} in {}", entry, bundle.name);
            } else {
                let mut classpath = request.compile_classpath.clone();
                classpath.extend(own.iter().cloned());
                self.compile(bundle, &sources, &classpath, &out, &work)?;
            }

            if entry == "." {
                compiled_root = Some(out.clone());
            }
            own.push(out);
        }

        match compiled_root {
            Some(classes) if bundle.is_single_archive() => {
                copy_bin_includes(&properties, dir, &classes).map_err(io_error)?;
                let jar = self.plugins_dir().join(format!("{}.jar", bundle.full_name()));
                let manifest = bundle
                    .location
                    .read_manifest()
                    .map_err(|e| MaterializeError::Failed {
                        bundle: bundle.name.clone(),
                        message: e.to_string(),
                    })?
                    .unwrap_or_default();
                create_jar(&jar, &classes, &manifest).map_err(|e| MaterializeError::Failed {
                    bundle: bundle.name.clone(),
                    message: e.to_string(),
                })?;
                info!("Packaged {}", jar.display());
                Ok(vec![jar])
            }
            _ => Ok(own),
        }
    }

    fn compile(
        &self,
        bundle: &Bundle,
        sources: &[PathBuf],
        classpath: &[ClasspathEntry],
        out: &Path,
        work: &Path,
    ) -> Result<(), MaterializeError> {
        let io_error = |source: io::Error| MaterializeError::Io {
            bundle: bundle.name.clone(),
            source,
        };

        let argfile = work.join(format!(
            "{}.sources",
            out.file_name().map_or_else(|| "classes".into(), |n| n.to_string_lossy())
        ));
        write_argfile(&argfile, sources).map_err(io_error)?;

        let mut command = Command::new(&self.javac);
        command.args(&self.javac_args).arg("-d").arg(out);
        if !classpath.is_empty() {
            let joined = std::env::join_paths(classpath).map_err(|e| MaterializeError::Failed {
                bundle: bundle.name.clone(),
                message: format!("Invalid classpath: {e}"),
            })?;
            command.arg("-cp").arg(joined);
        }
        command.arg(format!("@{}", argfile.display()));

        info!("Compiling {} sources of {}", sources.len(), bundle.name);
        debug!("Running {:?}", command);
        let output = command.output().map_err(io_error)?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            error!("javac failed for {}:\n{}", bundle.name, stderr);
            return Err(MaterializeError::CompileFailed {
                bundle: bundle.name.clone(),
                message: format!("{}: {}", output.status, stderr.trim()),
            });
        }
        if !stderr.trim().is_empty() {
            warn!("javac output for {}:\n{}", bundle.name, stderr);
        }
        Ok(())
    }
}

impl Materializer for JavacMaterializer {
    fn materialize(
        &mut self,
        request: &MaterializeRequest<'_>,
    ) -> Result<Vec<ClasspathEntry>, MaterializeError> {
        let bundle = request.bundle;
        let kind = request.source.map_or(SourceKind::Binary, |s| s.kind);

        match (&bundle.location, kind) {
            (BundleLocation::Archive(jar), _) => self.binary_archive(bundle, jar),
            (BundleLocation::Directory(dir), SourceKind::Binary) => Ok(bundle
                .classpath_entries()
                .into_iter()
                .map(|entry| resolve_entry(dir, entry))
                .collect()),
            (BundleLocation::Directory(dir), SourceKind::Source) => self.source_bundle(request, dir),
            (BundleLocation::Inline { label, .. }, _) => Err(MaterializeError::Failed {
                bundle: bundle.name.clone(),
                message: format!("{label} has no files to build from"),
            }),
        }
    }
}

fn resolve_entry(dir: &Path, entry: &str) -> ClasspathEntry {
    if entry == "." {
        dir.to_path_buf()
    } else {
        dir.join(entry)
    }
}

/// Existing source folders for a classpath entry. `.` falls back to `src`.
fn source_folders(properties: &BuildProperties, dir: &Path, entry: &str) -> Vec<PathBuf> {
    let mut names = properties.source_folders(entry);
    if names.is_empty() && entry == "." {
        names.push(DEFAULT_SOURCE_FOLDER.to_string());
    }
    names
        .into_iter()
        .map(|name| dir.join(name.trim_end_matches('/')))
        .filter(|folder| {
            let exists = folder.is_dir();
            if !exists {
                debug!("Source folder {} does not exist", folder.display());
            }
            exists
        })
        .collect()
}

/// `.java` files below `folders`. Everything else is copied to `out`.
fn collect_sources(folders: &[PathBuf], out: &Path) -> io::Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for folder in folders {
        for entry in WalkDir::new(folder).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "java") {
                sources.push(path.to_path_buf());
            } else if let Ok(relative) = path.strip_prefix(folder) {
                let target = out.join(relative);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(path, &target)?;
            }
        }
    }
    Ok(sources)
}

/// Copy the files and folders `bin.includes` lists into the jar content.
///
/// `.` is the compiled output itself; missing items are skipped.
fn copy_bin_includes(properties: &BuildProperties, dir: &Path, content: &Path) -> io::Result<()> {
    for item in properties.bin_includes() {
        let item = item.trim_end_matches('/');
        if item == "." || item.is_empty() {
            continue;
        }
        let from = dir.join(item);
        if !from.exists() {
            debug!("bin.includes item {} does not exist", from.display());
            continue;
        }
        for entry in WalkDir::new(&from) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(dir) else {
                continue;
            };
            let target = content.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn write_argfile(path: &Path, sources: &[PathBuf]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    for source in sources {
        let quoted = source.to_string_lossy().replace('\\', "\\\\").replace('"', "\\\"");
        writeln!(file, "\"{quoted}\"")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use convenient_osgi::{BundleId, Source, SourceId};
    use tempfile::TempDir;

    fn source(kind: SourceKind) -> Source {
        Source {
            id: SourceId(0),
            kind,
            path: PathBuf::from("plugins"),
            qualifier: None,
        }
    }

    fn bundle(location: BundleLocation, classpath: &[&str]) -> Bundle {
        let mut bundle = Bundle::new(BundleId(0), "org.example.a", SourceId(0), location);
        bundle.qualified_version = "1.0.0".to_string();
        bundle.raw_classpath = classpath.iter().map(|c| (*c).to_string()).collect();
        bundle
    }

    fn materialize(
        materializer: &mut JavacMaterializer,
        bundle: &Bundle,
        kind: SourceKind,
    ) -> Result<Vec<ClasspathEntry>, MaterializeError> {
        let source = source(kind);
        let request = MaterializeRequest {
            bundle,
            source: Some(&source),
            host: None,
            compile_classpath: vec![PathBuf::from("/deps/b.jar")],
        };
        materializer.materialize(&request)
    }

    #[test]
    fn test_binary_directory_entries() {
        let dir = PathBuf::from("/plugins/org.example.a_1.0.0");
        let bundle = bundle(BundleLocation::Directory(dir.clone()), &[".", "lib/x.jar"]);
        let mut materializer = JavacMaterializer::new("/out", "javac", Vec::new());

        let own = materialize(&mut materializer, &bundle, SourceKind::Binary).unwrap();
        assert_eq!(own, vec![dir.clone(), dir.join("lib/x.jar")]);
    }

    #[test]
    fn test_binary_single_archive_is_the_jar() {
        let jar = PathBuf::from("/plugins/org.example.a_1.0.0.jar");
        let bundle = bundle(BundleLocation::Archive(jar.clone()), &[]);
        let mut materializer = JavacMaterializer::new("/out", "javac", Vec::new());

        let own = materialize(&mut materializer, &bundle, SourceKind::Binary).unwrap();
        assert_eq!(own, vec![jar]);
    }

    #[test]
    fn test_binary_archive_nested_entries_are_extracted() {
        let tmp = TempDir::new().unwrap();
        let jar = tmp.path().join("org.example.a_1.0.0.jar");
        let mut writer = zip::ZipWriter::new(fs::File::create(&jar).unwrap());
        writer.start_file("lib/x.jar", zip::write::SimpleFileOptions::default()).unwrap();
        writer.write_all(b"PK").unwrap();
        writer.finish().unwrap();

        let bundle = bundle(BundleLocation::Archive(jar.clone()), &[".", "lib/x.jar"]);
        let mut materializer = JavacMaterializer::new(tmp.path().join("out"), "javac", Vec::new());
        let own = materialize(&mut materializer, &bundle, SourceKind::Binary).unwrap();

        let extracted = tmp.path().join("out/work/org.example.a_1.0.0/lib/x.jar");
        assert_eq!(own, vec![jar, extracted.clone()]);
        assert!(extracted.is_file());
    }

    #[test]
    fn test_missing_nested_entry_fails() {
        let tmp = TempDir::new().unwrap();
        let jar = tmp.path().join("a.jar");
        let writer = zip::ZipWriter::new(fs::File::create(&jar).unwrap());
        writer.finish().unwrap();

        let bundle = bundle(BundleLocation::Archive(jar), &["lib/x.jar"]);
        let mut materializer = JavacMaterializer::new(tmp.path(), "javac", Vec::new());
        assert!(matches!(
            materialize(&mut materializer, &bundle, SourceKind::Binary),
            Err(MaterializeError::Failed { .. })
        ));
    }

    #[test]
    fn test_source_bundle_without_sources_resolves_in_place() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("org.example.a");
        fs::create_dir_all(&dir).unwrap();
        let bundle = bundle(BundleLocation::Directory(dir.clone()), &[]);
        let mut materializer = JavacMaterializer::new(tmp.path().join("out"), "/no/such/javac", Vec::new());

        let own = materialize(&mut materializer, &bundle, SourceKind::Source).unwrap();
        assert_eq!(own, vec![dir]);
    }

    #[test]
    fn test_missing_compiler_is_an_io_error() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("org.example.a");
        fs::create_dir_all(dir.join("src/org/example")).unwrap();
        fs::write(dir.join("src/org/example/A.java"), "class A {}").unwrap();
        let bundle = bundle(BundleLocation::Directory(dir), &[]);
        let mut materializer = JavacMaterializer::new(tmp.path().join("out"), "/no/such/javac", Vec::new());

        assert!(matches!(
            materialize(&mut materializer, &bundle, SourceKind::Source),
            Err(MaterializeError::Io { .. })
        ));
    }

    #[test]
    fn test_inline_bundle_cannot_be_built() {
        let bundle = bundle(
            BundleLocation::Inline {
                label: "memory".to_string(),
                manifest: None,
            },
            &[],
        );
        let mut materializer = JavacMaterializer::new("/out", "javac", Vec::new());
        assert!(matches!(
            materialize(&mut materializer, &bundle, SourceKind::Source),
            Err(MaterializeError::Failed { .. })
        ));
    }

    #[test]
    fn test_collect_sources_copies_resources() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("org/example")).unwrap();
        fs::write(src.join("org/example/A.java"), "class A {}").unwrap();
        fs::write(src.join("org/example/messages.properties"), "hello=Hello").unwrap();
        let out = tmp.path().join("out");

        let sources = collect_sources(&[src.clone()], &out).unwrap();
        assert_eq!(sources, vec![src.join("org/example/A.java")]);
        assert!(out.join("org/example/messages.properties").is_file());
        assert!(!out.join("org/example/A.java").exists());
    }

    // One test so no other test forks while a script is open for writing.
    #[cfg(unix)]
    #[test]
    fn test_compile_with_stand_in_compiler() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let script = |name: &str, body: &str| {
            let path = tmp.path().join(name);
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        };
        // Arguments are: -d <out> -cp <classpath> @<argfile>
        let good = script("good-javac", "mkdir -p \"$2/org\" && echo \"$4\" > \"$2/org/A.class\"");
        let bad = script("bad-javac", "echo 'A.java:1: error: oops' >&2; exit 1");

        let dir = tmp.path().join("org.example.a");
        fs::create_dir_all(dir.join("java/org")).unwrap();
        fs::write(dir.join("java/org/A.java"), "class A {}").unwrap();
        fs::write(
            dir.join("build.properties"),
            "source.. = java/\nbin.includes = META-INF/,.,plugin.xml,icons/,missing.txt\n",
        )
        .unwrap();
        fs::create_dir_all(dir.join("META-INF")).unwrap();
        fs::write(dir.join("META-INF/MANIFEST.MF"), "Bundle-SymbolicName: org.example.a\n").unwrap();
        fs::write(dir.join("plugin.xml"), "<plugin/>").unwrap();
        fs::create_dir_all(dir.join("icons")).unwrap();
        fs::write(dir.join("icons/a.png"), "png").unwrap();
        let bundle = bundle(BundleLocation::Directory(dir), &[]);

        let out = tmp.path().join("out");
        let mut materializer = JavacMaterializer::new(&out, &good, Vec::new());
        let own = materialize(&mut materializer, &bundle, SourceKind::Source).unwrap();
        let jar = out.join("plugins/org.example.a_1.0.0.jar");
        assert_eq!(own, vec![jar.clone()]);

        let mut archive = zip::ZipArchive::new(fs::File::open(&jar).unwrap()).unwrap();
        assert!(archive.by_name("META-INF/MANIFEST.MF").is_ok());
        assert!(archive.by_name("plugin.xml").is_ok());
        assert!(archive.by_name("icons/a.png").is_ok());
        assert!(archive.by_name("missing.txt").is_err());
        let mut class = String::new();
        io::Read::read_to_string(&mut archive.by_name("org/A.class").unwrap(), &mut class).unwrap();
        assert_eq!(class.trim(), "/deps/b.jar");

        let mut materializer = JavacMaterializer::new(&out, &bad, Vec::new());
        match materialize(&mut materializer, &bundle, SourceKind::Source) {
            Err(MaterializeError::CompileFailed { bundle, message }) => {
                assert_eq!(bundle, "org.example.a");
                assert!(message.contains("error: oops"));
            }
            other => panic!("expected a compile failure, got {other:?}"),
        }
    }
}
