mod common;

use std::path::{Path, PathBuf};

use common::{FakeContainerExecutor, export_bytes, manifest_for, tar_bytes, tgz_entry_names};
use portable_build::whiteout::is_whiteout;
use portable_build::{BuildError, PortableBuilder, TarballRequest};
use portable_core::{BundleConfig, Dver, OsgRepo};
use portable_exec::ContainerClient;
use tempfile::TempDir;

fn bundle() -> BundleConfig {
    BundleConfig {
        dirname: "foo-client".to_owned(),
        dvers: vec![Dver::El9],
        dockerfile: PathBuf::from("Dockerfile"),
        packages: vec!["foo".to_owned(), "foo-libs".to_owned()],
        tarballname: "foo-{version}-{relnum}.{dver}.tar.gz".to_owned(),
        versionrpm: Some("foo".to_owned()),
        patchdirs: Vec::new(),
    }
}

/// Two-layer export whose top layer holds a binary, a whiteout marker and
/// the package list.
fn two_layer_export() -> Vec<u8> {
    let base = tar_bytes(&[("usr/", ""), ("usr/bin/", ""), ("usr/bin/old", "old")]);
    let top = tar_bytes(&[
        ("usr/", ""),
        ("usr/bin/", ""),
        ("usr/bin/x", "#!/bin/sh\n"),
        ("usr/bin/.wh.old", ""),
        ("portable-xrootd/", ""),
        ("portable-xrootd/versions.txt", "bash-5.1.8-9.el9\nfoo-1.2-3\n"),
    ]);
    export_bytes(
        Some(&manifest_for(&["aaa/layer.tar", "bbb/layer.tar"])),
        &[("aaa/layer.tar", base), ("bbb/layer.tar", top)],
    )
}

/// Entries under `root`, counting `root` itself, the way `tar` lists a tree.
fn tree_entries(root: &Path) -> usize {
    let mut count = 1;
    for entry in std::fs::read_dir(root).unwrap() {
        let entry = entry.unwrap();
        if entry.file_type().unwrap().is_dir() {
            count += tree_entries(&entry.path());
        } else {
            count += 1;
        }
    }
    count
}

struct Workspace {
    tmp: TempDir,
    bundle: BundleConfig,
}

impl Workspace {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        for dir in ["work", "out", "exports"] {
            std::fs::create_dir(tmp.path().join(dir)).unwrap();
        }
        Self {
            tmp,
            bundle: bundle(),
        }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.tmp.path().join(rel)
    }

    fn builder(&self, export: Vec<u8>) -> PortableBuilder<FakeContainerExecutor> {
        let client = ContainerClient::with_executor(FakeContainerExecutor::new(export), "docker");
        PortableBuilder::new(client).with_work_root(self.path("exports"))
    }

    fn request<'a>(
        &'a self,
        stage_dir: &'a Path,
        output_dir: &'a Path,
        version: Option<&'a str>,
        relnum: Option<&'a str>,
    ) -> TarballRequest<'a> {
        TarballRequest {
            bundle_name: "foo-client",
            bundle: &self.bundle,
            base_dir: self.tmp.path(),
            dver: Dver::El9,
            image_name: "foo-client:run1",
            patch_dirs: &[],
            stage_dir,
            output_dir,
            osg_repo: OsgRepo::Testing,
            version,
            relnum,
        }
    }
}

#[tokio::test]
async fn builds_a_relocatable_tarball() {
    let ws = Workspace::new();
    let stage_dir = ws.path("work/foo-client");
    let output_dir = ws.path("out");
    let builder = ws.builder(two_layer_export());

    let outcome = builder
        .make_tarball(&ws.request(&stage_dir, &output_dir, None, None))
        .await
        .unwrap();

    assert_eq!(outcome.path, output_dir.join("foo-1.2-3.el9.tar.gz"));
    assert_eq!(outcome.version, "1.2");
    assert_eq!(outcome.relnum, "3");
    assert!(outcome.size > 0);

    let names = tgz_entry_names(&outcome.path);
    assert!(stage_dir.join("layer.tar").is_file());
    assert_eq!(names.len(), tree_entries(&stage_dir) - 1);
    assert_eq!(outcome.file_count, Some(names.len()));
    assert!(names.iter().all(|n| n.starts_with("foo-client")));
    assert!(names.iter().any(|n| n == "foo-client/usr/bin/x"));
    assert!(names.iter().any(|n| n == "foo-client/portable-xrootd/versions.txt"));
    assert!(!names.iter().any(|n| n.ends_with("layer.tar")));
    assert!(!names.iter().any(|n| is_whiteout(n)));
    assert!(!names.iter().any(|n| n.ends_with("usr/bin/old")));

    assert_eq!(
        builder.container().executor().container_calls(),
        vec!["build", "save", "rmi"]
    );
    let exports: Vec<_> = std::fs::read_dir(ws.path("exports")).unwrap().collect();
    assert!(exports.is_empty(), "export workdir is cleaned up");
}

#[tokio::test]
async fn build_args_describe_the_run() {
    let ws = Workspace::new();
    let stage_dir = ws.path("work/foo-client");
    let output_dir = ws.path("out");
    let builder = ws.builder(two_layer_export());

    builder
        .make_tarball(&ws.request(&stage_dir, &output_dir, None, None))
        .await
        .unwrap();

    let calls = builder.container().executor().calls.lock().unwrap().clone();
    let build = calls
        .iter()
        .find(|c| c.program == "docker" && c.args[0] == "build")
        .unwrap();
    assert!(build.has_arg("BUNDLE=foo-client"));
    assert!(build.has_arg("DVER=el9"));
    assert!(build.has_arg("PACKAGES=foo foo-libs"));
    assert!(build.has_arg("YUM_FLAGS=--enablerepo=osg-testing"));
    assert!(build.has_arg("foo-client:run1"));
}

#[tokio::test]
async fn explicit_version_skips_inference() {
    let ws = Workspace::new();
    let stage_dir = ws.path("work/foo-client");
    let output_dir = ws.path("out");
    let builder = ws.builder(two_layer_export());

    let outcome = builder
        .make_tarball(&ws.request(&stage_dir, &output_dir, Some("9.9"), None))
        .await
        .unwrap();

    assert_eq!(outcome.path, output_dir.join("foo-9.9-1.el9.tar.gz"));
    let calls = builder.container().executor().calls.lock().unwrap().clone();
    assert!(!calls.iter().any(|c| c.has_arg("--to-stdout")));
}

#[tokio::test]
async fn explicit_relnum_overrides_inferred_release() {
    let ws = Workspace::new();
    let stage_dir = ws.path("work/foo-client");
    let output_dir = ws.path("out");
    let builder = ws.builder(two_layer_export());

    let outcome = builder
        .make_tarball(&ws.request(&stage_dir, &output_dir, None, Some("7")))
        .await
        .unwrap();

    assert_eq!(outcome.path, output_dir.join("foo-1.2-7.el9.tar.gz"));
}

#[tokio::test]
async fn missing_package_list_falls_back_to_unknown() {
    let ws = Workspace::new();
    let stage_dir = ws.path("work/foo-client");
    let output_dir = ws.path("out");
    let top = tar_bytes(&[("usr/", ""), ("usr/bin/", ""), ("usr/bin/x", "x")]);
    let export = export_bytes(
        Some(&manifest_for(&["only/layer.tar"])),
        &[("only/layer.tar", top)],
    );
    let builder = ws.builder(export);

    let outcome = builder
        .make_tarball(&ws.request(&stage_dir, &output_dir, None, None))
        .await
        .unwrap();

    assert_eq!(outcome.path, output_dir.join("foo-unknown-1.el9.tar.gz"));
}

#[tokio::test]
async fn broken_export_keeps_image_and_stage_dir() {
    let ws = Workspace::new();
    let stage_dir = ws.path("work/foo-client");
    let output_dir = ws.path("out");
    let export = export_bytes(None, &[("aaa/layer.tar", tar_bytes(&[("x", "x")]))]);
    let builder = ws.builder(export);

    let err = builder
        .make_tarball(&ws.request(&stage_dir, &output_dir, None, None))
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::LayerExtraction { ref image, .. } if image == "foo-client:run1"));
    assert!(err.to_string().contains("foo-client:run1"));
    assert!(stage_dir.is_dir());
    assert!(!stage_dir.join("layer.tar").exists());
    assert_eq!(
        builder.container().executor().container_calls(),
        vec!["build", "save"]
    );
}
