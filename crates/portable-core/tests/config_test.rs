use std::path::{Path, PathBuf};

use portable_core::{BundlesConfig, Dver, Error, TarballName};
use tempfile::TempDir;

const FULL_CONFIG: &str = r#"
[global]
default_bundles = ["pelican-server", "xrootd"]

[bundles.pelican-server]
dirname = "pelican-server"
dvers = ["el9", "el8"]
dockerfile = "dockerfiles/pelican-server.Dockerfile"
packages = ["pelican-server", "xrootd-server"]
tarballname = "pelican-server-{version}-{relnum}.{dver}.tar.gz"
versionrpm = "pelican-server"
patchdirs = ["patches/common", "patches/{dver}"]

[bundles.xrootd]
dirname = "xrootd"
dvers = ["el10"]
dockerfile = "dockerfiles/xrootd.Dockerfile"
tarballname = "xrootd-{version}.{dver}.tar.gz"
"#;

fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("bundles.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn load_parses_full_config() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), FULL_CONFIG);

    let config = BundlesConfig::load(&path).unwrap();

    assert_eq!(
        config.global.default_bundles,
        vec!["pelican-server", "xrootd"]
    );
    assert_eq!(config.base_dir, tmp.path());

    let pelican = config.bundle("pelican-server").unwrap();
    assert_eq!(pelican.dirname, "pelican-server");
    assert_eq!(pelican.dvers, vec![Dver::El9, Dver::El8]);
    assert_eq!(pelican.packages, vec!["pelican-server", "xrootd-server"]);
    assert_eq!(pelican.versionrpm.as_deref(), Some("pelican-server"));
    assert_eq!(pelican.patchdirs.len(), 2);
}

#[test]
fn optional_fields_default_to_empty() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), FULL_CONFIG);

    let config = BundlesConfig::load(&path).unwrap();
    let xrootd = config.bundle("xrootd").unwrap();

    assert!(xrootd.packages.is_empty());
    assert!(xrootd.patchdirs.is_empty());
    assert!(xrootd.versionrpm.is_none());
}

#[test]
fn load_missing_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let result = BundlesConfig::load(&tmp.path().join("bundles.toml"));

    assert!(matches!(result, Err(Error::ConfigLoad { .. })));
}

#[test]
fn load_rejects_unknown_dver() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
        tmp.path(),
        r#"
[bundles.bad]
dirname = "bad"
dvers = ["el7"]
dockerfile = "Dockerfile"
tarballname = "bad.tar.gz"
"#,
    );

    let result = BundlesConfig::load(&path);
    assert!(matches!(result, Err(Error::ConfigParse { .. })));
}

#[test]
fn unknown_bundle_lists_available_names() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), FULL_CONFIG);
    let config = BundlesConfig::load(&path).unwrap();

    let err = config.bundle("nope").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("nope"));
    assert!(message.contains("pelican-server, xrootd"));
}

#[test]
fn default_bundles_required_when_none_given() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
        tmp.path(),
        r#"
[bundles.only]
dirname = "only"
dvers = ["el9"]
dockerfile = "Dockerfile"
tarballname = "only.tar.gz"
"#,
    );
    let config = BundlesConfig::load(&path).unwrap();

    assert!(matches!(
        config.default_bundles(),
        Err(Error::NoDefaultBundles { .. })
    ));
}

#[test]
fn patch_dirs_substitute_dver_and_resolve_against_base() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), FULL_CONFIG);
    let config = BundlesConfig::load(&path).unwrap();
    let pelican = config.bundle("pelican-server").unwrap();

    let dirs = pelican.patch_dirs(Dver::El9, &config.base_dir);

    assert_eq!(
        dirs,
        vec![
            tmp.path().join("patches/common"),
            tmp.path().join("patches/el9"),
        ]
    );
}

#[test]
fn tarball_name_substitutes_all_placeholders() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), FULL_CONFIG);
    let config = BundlesConfig::load(&path).unwrap();
    let pelican = config.bundle("pelican-server").unwrap();

    let name = pelican.tarball_name(TarballName {
        version: "7.10.1",
        relnum: "2",
        dver: Dver::El8,
    });

    assert_eq!(name, "pelican-server-7.10.1-2.el8.tar.gz");
}

#[test]
fn selected_dvers_are_sorted_and_filtered() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), FULL_CONFIG);
    let config = BundlesConfig::load(&path).unwrap();
    let pelican = config.bundle("pelican-server").unwrap();

    assert_eq!(pelican.selected_dvers(None), vec![Dver::El8, Dver::El9]);
    assert_eq!(pelican.selected_dvers(Some(Dver::El9)), vec![Dver::El9]);
    assert!(pelican.selected_dvers(Some(Dver::El10)).is_empty());
}

#[test]
fn dockerfile_path_is_relative_to_config_dir() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(tmp.path(), FULL_CONFIG);
    let config = BundlesConfig::load(&path).unwrap();
    let xrootd = config.bundle("xrootd").unwrap();

    assert_eq!(
        xrootd.dockerfile_path(&config.base_dir),
        tmp.path().join("dockerfiles/xrootd.Dockerfile")
    );
}
