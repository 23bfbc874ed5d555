//! Whole runs from command line arguments to exit codes

use ecabu::{Cli, EcabuError, Options, RunReport, run};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing_test::traced_test;

fn bundle_dir(root: &Path, dir: &str, manifest: &str) -> PathBuf {
    let path = root.join(dir);
    fs::create_dir_all(path.join("META-INF")).unwrap();
    fs::write(path.join("META-INF/MANIFEST.MF"), manifest).unwrap();
    path
}

fn bundle_jar(root: &Path, file: &str, manifest: &str) -> PathBuf {
    let path = root.join(file);
    let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("META-INF/MANIFEST.MF", options).unwrap();
    writer.write_all(manifest.as_bytes()).unwrap();
    writer.finish().unwrap();
    path
}

fn ecabu(args: &[&str]) -> Result<RunReport, EcabuError> {
    let invocation = Cli::parse_args(std::iter::once("ecabu").chain(args.iter().copied())).unwrap();
    let options = Options::from_invocation(invocation)?;
    run(&options)
}

fn exit_code(result: Result<RunReport, EcabuError>) -> i32 {
    result.map_or_else(|e| e.exit_code(), |_| 0)
}

fn path(p: &Path) -> &str {
    p.to_str().unwrap()
}

#[traced_test]
#[test]
fn test_binary_bundles_are_materialized_in_place() {
    let tmp = TempDir::new().unwrap();
    let plugins = tmp.path().join("plugins");
    fs::create_dir_all(&plugins).unwrap();
    let app = bundle_dir(
        &plugins,
        "org.example.app_1.0.0",
        "Bundle-SymbolicName: org.example.app\n\
         Bundle-Version: 1.0.0\n\
         Bundle-ClassPath: .,lib/extra.jar\n\
         Require-Bundle: org.example.core;visibility:=reexport\n",
    );
    let core = bundle_jar(
        &plugins,
        "org.example.core_2.1.0.v2024.jar",
        "Bundle-SymbolicName: org.example.core\nBundle-Version: 2.1.0.v2024\n",
    );
    let out = tmp.path().join("out");

    let report = ecabu(&["-B", path(&plugins), "-b", "org.example.app", "-o", path(&out)]).unwrap();

    assert_eq!(report.built, 2);
    let names: Vec<_> = report.plan.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["org.example.core", "org.example.app"]);
    assert_eq!(report.classpaths["org.example.core"], vec![core.clone()]);
    assert_eq!(
        report.classpaths["org.example.app"],
        vec![app.clone(), app.join("lib/extra.jar"), core]
    );
    assert!(out.is_dir());
    assert!(logs_contain("Searching for bundles: binary bundles folder"));
    assert!(logs_contain("[2/2] Building org.example.app_1.0.0"));
    assert!(logs_contain("Done."));
}

#[test]
fn test_include_following_selects_whole_source() {
    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("target");
    let ws = tmp.path().join("ws");
    bundle_dir(&target, "org.example.lib_1.0.0", "Bundle-Version: 1.0.0\n");
    bundle_dir(&ws, "org.example.one", "Bundle-Version: 1.0.0.qualifier\nRequire-Bundle: org.example.lib\n");
    bundle_dir(&ws, "org.example.two", "Bundle-Version: 2.0.0.qualifier\n");

    let report = ecabu(&["-B", path(&target), "-I", "-Q", "v7", "-S", path(&ws), "--dry-run"]).unwrap();

    let planned: Vec<_> = report
        .plan
        .iter()
        .map(|p| (p.name.as_str(), p.version.as_str()))
        .collect();
    assert_eq!(
        planned,
        vec![
            ("org.example.lib", "1.0.0"),
            ("org.example.one", "1.0.0.v7"),
            ("org.example.two", "2.0.0.v7"),
        ]
    );
    assert_eq!(report.built, 0);
}

#[test]
fn test_config_file_with_placement() {
    let tmp = TempDir::new().unwrap();
    let plugins = tmp.path().join("plugins");
    bundle_dir(&plugins, "org.example.host", "");
    bundle_dir(&plugins, "org.example.host.nl", "Fragment-Host: org.example.host\n");
    let config = tmp.path().join("ecabu.yml");
    fs::write(
        &config,
        "sources:\n  - kind: binary\n    path: plugins\n    include: true\nplacement:\n  org.example.host: after-fragments\n",
    )
    .unwrap();

    let report = ecabu(&["-c", path(&config), "--dry-run"]).unwrap();
    let names: Vec<_> = report.plan.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["org.example.host.nl", "org.example.host"]);
    assert_eq!(report.plan[0].fragment_host.as_deref(), Some("org.example.host"));
}

#[test]
fn test_exit_codes() {
    let tmp = TempDir::new().unwrap();
    let plugins = tmp.path().join("plugins");
    bundle_dir(&plugins, "a", "Require-Bundle: b\n");
    bundle_dir(&plugins, "b", "Require-Bundle: a\n");
    bundle_dir(&plugins, "c", "Require-Bundle: ghost\n");
    let dir = path(&plugins);

    assert_eq!(exit_code(ecabu(&["-B", dir, "-b", "c", "--dry-run"])), 4);
    assert_eq!(exit_code(ecabu(&["-B", dir, "-b", "c", "--allow-unresolved", "--dry-run"])), 0);
    assert_eq!(exit_code(ecabu(&["-B", dir, "-b", "a", "--dry-run"])), 5);
    assert_eq!(exit_code(ecabu(&["-B", dir, "--dry-run"])), 3);
    assert_eq!(exit_code(ecabu(&["-B", dir, "-b", "zzz", "--dry-run"])), 2);
    assert_eq!(exit_code(ecabu(&["-B", "/no/such/folder", "-b", "a"])), 2);
    assert_eq!(exit_code(ecabu(&["-c", "/no/such/ecabu.yml"])), 2);
}

#[test]
fn test_cycle_is_reported_with_its_chain() {
    let tmp = TempDir::new().unwrap();
    let plugins = tmp.path().join("plugins");
    bundle_dir(&plugins, "a", "Require-Bundle: b\n");
    bundle_dir(&plugins, "b", "Require-Bundle: a\n");

    let err = ecabu(&["-B", path(&plugins), "-b", "a", "--dry-run"]).unwrap_err();
    assert_eq!(err.to_string(), "Dependency cycle: a -> b -> a");
}
