#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use mockall::mock;
use portable_exec::{RealExecutor, ToolCommand, ToolError, ToolExecutor};

mock! {
    pub Executor {}

    impl ToolExecutor for Executor {
        async fn output(&self, cmd: &ToolCommand) -> Result<Vec<u8>, ToolError>;
        async fn run(&self, cmd: &ToolCommand) -> Result<(), ToolError>;
        async fn status(&self, cmd: &ToolCommand) -> Result<i32, ToolError>;
    }
}

pub fn tool_failure(cmd: &ToolCommand) -> ToolError {
    ToolError::failed(cmd, Some(2), "simulated failure")
}

/// Build an uncompressed tar of text files in memory. Paths ending in `/`
/// become directories.
pub fn tar_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let raw: Vec<(&str, &[u8])> = entries.iter().map(|(p, d)| (*p, d.as_bytes())).collect();
    tar_raw(&raw)
}

pub fn tar_raw(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data) in entries {
        let mut header = tar::Header::new_gnu();
        if path.ends_with('/') {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            builder
                .append_data(&mut header, path, std::io::empty())
                .unwrap();
        } else {
            header.set_entry_type(tar::EntryType::Regular);
            header.set_mode(0o644);
            header.set_size(data.len() as u64);
            builder.append_data(&mut header, path, *data).unwrap();
        }
    }
    builder.into_inner().unwrap()
}

/// A `docker save`-style export: optional manifest plus named layer archives.
pub fn export_bytes(manifest: Option<&str>, layers: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut entries: Vec<(&str, &[u8])> = Vec::new();
    for (name, data) in layers {
        entries.push((*name, data.as_slice()));
    }
    if let Some(manifest) = manifest {
        entries.push(("manifest.json", manifest.as_bytes()));
    }
    tar_raw(&entries)
}

pub fn manifest_for(layers: &[&str]) -> String {
    let quoted: Vec<String> = layers.iter().map(|l| format!("\"{l}\"")).collect();
    format!(
        r#"[{{"Config":"config.json","RepoTags":["bundle:test"],"Layers":[{}]}}]"#,
        quoted.join(",")
    )
}

/// Entry names of an uncompressed tar file.
pub fn tar_entry_names(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = tar::Archive::new(file);
    archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect()
}

/// Entry names of a gzip tar file.
pub fn tgz_entry_names(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect()
}

/// Runs real `tar`, `patch` and `chmod`, but answers container tool calls
/// itself: `build` and `rmi` succeed and `save` writes a canned export.
pub struct FakeContainerExecutor {
    pub program: String,
    pub export: Vec<u8>,
    pub calls: Mutex<Vec<ToolCommand>>,
}

impl FakeContainerExecutor {
    pub fn new(export: Vec<u8>) -> Self {
        Self {
            program: "docker".to_owned(),
            export,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn container_calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.program == self.program)
            .map(|c| c.args[0].clone())
            .collect()
    }

    fn record(&self, cmd: &ToolCommand) {
        self.calls.lock().unwrap().push(cmd.clone());
    }
}

impl ToolExecutor for FakeContainerExecutor {
    async fn output(&self, cmd: &ToolCommand) -> Result<Vec<u8>, ToolError> {
        self.record(cmd);
        RealExecutor.output(cmd).await
    }

    async fn run(&self, cmd: &ToolCommand) -> Result<(), ToolError> {
        self.record(cmd);
        if cmd.program != self.program {
            return RealExecutor.run(cmd).await;
        }
        if cmd.args.first().map(String::as_str) == Some("save") {
            let dest = PathBuf::from(&cmd.args[2]);
            std::fs::write(dest, &self.export).unwrap();
        }
        Ok(())
    }

    async fn status(&self, cmd: &ToolCommand) -> Result<i32, ToolError> {
        self.record(cmd);
        RealExecutor.status(cmd).await
    }
}
