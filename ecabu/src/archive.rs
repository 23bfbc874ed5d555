//! Reading nested classpath entries out of jars and packaging built bundles.

use crate::error::ArchiveError;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;
use zip::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};

const MANIFEST_ENTRY: &str = "META-INF/MANIFEST.MF";

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError + '_ {
    move |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn zip_error(path: &Path) -> impl FnOnce(zip::result::ZipError) -> ArchiveError + '_ {
    move |source| ArchiveError::Zip {
        path: path.to_path_buf(),
        source,
    }
}

/// Extract a classpath entry of `jar` below `dest_dir`.
///
/// `entry` is either a file (`lib/util.jar`) or a folder (`classes/`) inside
/// the jar. Returns where it ended up on disk.
///
/// # Errors
///
/// Fails if the jar cannot be read or does not contain `entry`.
pub fn extract_entry(jar: &Path, entry: &str, dest_dir: &Path) -> Result<PathBuf, ArchiveError> {
    let file = File::open(jar).map_err(io_error(jar))?;
    let mut archive = ZipArchive::new(file).map_err(zip_error(jar))?;

    let wanted = Path::new(entry.trim_end_matches('/'));
    let mut extracted = 0;

    for i in 0..archive.len() {
        let mut member = archive.by_index(i).map_err(zip_error(jar))?;
        let Some(relative_path) = member.enclosed_name() else {
            continue;
        };
        if !relative_path.starts_with(wanted) {
            continue;
        }

        let absolute_path = dest_dir.join(&relative_path);
        if member.is_dir() {
            fs::create_dir_all(&absolute_path).map_err(io_error(&absolute_path))?;
            continue;
        }
        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let mut outfile = File::create(&absolute_path).map_err(io_error(&absolute_path))?;
        io::copy(&mut member, &mut outfile).map_err(io_error(&absolute_path))?;
        extracted += 1;
    }

    if extracted == 0 {
        return Err(ArchiveError::MissingEntry {
            path: jar.to_path_buf(),
            entry: entry.to_string(),
        });
    }
    debug!("Extracted {} files of {} from {}", extracted, entry, jar.display());
    Ok(dest_dir.join(wanted))
}

/// Write a jar holding `manifest` and every file below `content_dir`.
///
/// The manifest goes first; a `META-INF/MANIFEST.MF` found in `content_dir`
/// is left out.
///
/// # Errors
///
/// Fails on any read or write error.
pub fn create_jar(dest_jar: &Path, content_dir: &Path, manifest: &str) -> Result<(), ArchiveError> {
    if let Some(parent) = dest_jar.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let file = File::create(dest_jar).map_err(io_error(dest_jar))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    writer
        .start_file(MANIFEST_ENTRY, options)
        .map_err(zip_error(dest_jar))?;
    writer
        .write_all(manifest.as_bytes())
        .map_err(io_error(dest_jar))?;

    let mut files = 0;
    for entry in WalkDir::new(content_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| ArchiveError::Io {
            path: content_dir.to_path_buf(),
            source: e.into(),
        })?;
        let Ok(relative) = entry.path().strip_prefix(content_dir) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer
                .add_directory(format!("{name}/"), options)
                .map_err(zip_error(dest_jar))?;
        } else if name != MANIFEST_ENTRY {
            writer.start_file(name, options).map_err(zip_error(dest_jar))?;
            let mut input = File::open(entry.path()).map_err(io_error(entry.path()))?;
            io::copy(&mut input, &mut writer).map_err(io_error(entry.path()))?;
            files += 1;
        }
    }

    writer.finish().map_err(zip_error(dest_jar))?;
    debug!("Wrote {} with {} files", dest_jar.display(), files + 1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn jar_with(path: &Path, members: &[(&str, &str)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in members {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extract_nested_jar_and_folder() {
        let tmp = TempDir::new().unwrap();
        let jar = tmp.path().join("bundle.jar");
        jar_with(
            &jar,
            &[
                (MANIFEST_ENTRY, "Bundle-ClassPath: ., lib/util.jar, classes/\n"),
                ("lib/util.jar", "PK"),
                ("classes/org/A.class", "class"),
                ("classes/org/B.class", "class"),
                ("classes-extra/C.class", "class"),
            ],
        );
        let work = tmp.path().join("work");

        let util = extract_entry(&jar, "lib/util.jar", &work).unwrap();
        assert_eq!(util, work.join("lib/util.jar"));
        assert_eq!(fs::read(&util).unwrap(), b"PK");

        let classes = extract_entry(&jar, "classes/", &work).unwrap();
        assert_eq!(classes, work.join("classes"));
        assert!(classes.join("org/A.class").is_file());
        assert!(classes.join("org/B.class").is_file());
        assert!(!work.join("classes-extra").exists());
    }

    #[test]
    fn test_missing_entry() {
        let tmp = TempDir::new().unwrap();
        let jar = tmp.path().join("bundle.jar");
        jar_with(&jar, &[(MANIFEST_ENTRY, "")]);
        assert!(matches!(
            extract_entry(&jar, "lib/none.jar", tmp.path()),
            Err(ArchiveError::MissingEntry { .. })
        ));
    }

    #[test]
    fn test_not_a_jar() {
        let tmp = TempDir::new().unwrap();
        let jar = tmp.path().join("broken.jar");
        fs::write(&jar, "not a zip").unwrap();
        assert!(matches!(
            extract_entry(&jar, "lib/a.jar", tmp.path()),
            Err(ArchiveError::Zip { .. })
        ));
    }

    #[test]
    fn test_create_jar() {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("bin");
        fs::create_dir_all(content.join("org/example")).unwrap();
        fs::create_dir_all(content.join("META-INF")).unwrap();
        fs::write(content.join("org/example/App.class"), b"\xca\xfe").unwrap();
        fs::write(content.join("META-INF/MANIFEST.MF"), "stale").unwrap();
        let jar = tmp.path().join("plugins/app_1.0.0.jar");

        create_jar(&jar, &content, "Bundle-SymbolicName: app\n").unwrap();

        let mut archive = ZipArchive::new(File::open(&jar).unwrap()).unwrap();
        let mut manifest = String::new();
        io::Read::read_to_string(&mut archive.by_name(MANIFEST_ENTRY).unwrap(), &mut manifest).unwrap();
        assert_eq!(manifest, "Bundle-SymbolicName: app\n");
        assert!(archive.by_name("org/example/App.class").is_ok());
        let manifests = archive.file_names().filter(|n| *n == MANIFEST_ENTRY).count();
        assert_eq!(manifests, 1);
    }
}
