use std::fmt;
use std::path::{Path, PathBuf};

/// A single external program invocation.
///
/// # Examples
///
/// ```
/// use portable_exec::ToolCommand;
///
/// let cmd = ToolCommand::new("tar").args(["-tf", "layer.tar"]);
/// assert_eq!(cmd.to_string(), "tar -tf layer.tar");
/// assert!(cmd.has_arg("-tf"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory for the child; the caller's stays untouched.
    pub cwd: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Find `program` on `PATH`.
pub fn locate(program: &str) -> Option<PathBuf> {
    which::which(program)
        // arch-lint: allow(no-silent-result-drop) reason="a lookup failure means the tool is not installed, which callers report"
        .ok()
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to run {program}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}{}", format_code(*code), format_stderr(stderr))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl ToolError {
    pub fn failed(cmd: &ToolCommand, code: Option<i32>, stderr: impl Into<String>) -> Self {
        ToolError::CommandFailed {
            command: cmd.to_string(),
            code,
            stderr: stderr.into(),
        }
    }
}

fn format_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_owned(),
    }
}

fn format_stderr(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}
