//! External programs the tools shell out to.

use std::{
    env,
    ffi::{OsStr, OsString},
    process::{Command, Output},
};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::{Error, Result};

pub static UNRAR: Tool = Tool::new("unrar", "unrar");
pub static PDFIMAGES: Tool = Tool::new("pdfimages", "poppler-utils");
pub static REALESRGAN: Tool = Tool::new("realesrgan-ncnn-vulkan", "Real-ESRGAN ncnn Vulkan");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    program: &'static str,
    package: &'static str,
    binary: Option<Utf8PathBuf>,
}

impl Tool {
    #[must_use]
    pub const fn new(program: &'static str, package: &'static str) -> Self {
        Self {
            program,
            package,
            binary: None,
        }
    }

    /// Use the binary located at `binary` instead of looking the program up in `PATH`
    #[must_use]
    pub fn at(mut self, binary: impl Into<Utf8PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    /// Same as `at`, only when a binary is provided
    #[must_use]
    pub fn maybe_at(self, binary: Option<impl Into<Utf8PathBuf>>) -> Self {
        match binary {
            Some(binary) => self.at(binary),
            None => self,
        }
    }

    #[must_use]
    pub fn program(&self) -> &'static str {
        self.program
    }

    /// Finds the binary to run
    ///
    /// ## Errors
    ///
    /// Fails if the explicit binary doesn't exist or if the program can't be found in `PATH`
    pub fn locate(&self) -> Result<Utf8PathBuf> {
        let found = match &self.binary {
            Some(binary) => is_executable(binary).then(|| binary.clone()),
            None => find_in_path(self.program, env::var_os("PATH")),
        };

        found.ok_or_else(|| Error::MissingTool {
            program: self.binary.as_ref().map_or_else(
                || self.program.to_string(),
                ToString::to_string,
            ),
            package: self.package,
        })
    }

    /// Runs the program with `args` and waits for its completion, the output is captured
    ///
    /// ## Errors
    ///
    /// Fails if the program is missing, can't be started, or exits with a non-zero status
    pub fn run<I, S>(&self, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let binary = self.locate()?;
        let mut command = Command::new(&binary);
        command.args(args);
        debug!("running {command:?}");

        let output = command.output().map_err(|source| Error::Spawn {
            program: self.program.to_string(),
            source,
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !stderr.is_empty() {
            debug!("{} stderr: {stderr}", self.program);
        }

        if !output.status.success() {
            return Err(Error::ToolFailed {
                program: self.program.to_string(),
                status: output.status,
                stderr,
            });
        }

        Ok(output)
    }
}

/// Checks that all the tools are available before doing any work, every missing one is reported
///
/// ## Errors
///
/// Fails if at least one tool can't be found
pub fn require<'a>(tools: impl IntoIterator<Item = &'a Tool>) -> Result<()> {
    let missing = tools
        .into_iter()
        .filter_map(|tool| tool.locate().err())
        .map(|err| err.to_string())
        .collect::<Vec<_>>();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingTools(missing))
    }
}

#[must_use]
pub fn find_in_path(program: &str, path: Option<OsString>) -> Option<Utf8PathBuf> {
    let path = path?;
    env::split_paths(&path)
        .filter_map(|dir| Utf8PathBuf::from_path_buf(dir).ok())
        .flat_map(|dir| candidates(program).map(move |name| dir.join(name)))
        .find(|candidate| is_executable(candidate))
}

fn candidates(program: &str) -> impl Iterator<Item = String> + '_ {
    let extensions: &[&str] = if cfg!(windows) { &["", ".exe"] } else { &[""] };
    extensions
        .iter()
        .map(move |extension| format!("{program}{extension}"))
}

#[cfg(unix)]
fn is_executable(path: &Utf8Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Utf8Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use std::{
        fs, io,
        os::unix::fs::PermissionsExt,
        sync::{Arc, Mutex},
    };

    use super::*;

    fn fake_program(dir: &Utf8Path, name: &str, mode: u32) -> Utf8PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn finds_executables_only() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap().to_owned();
        let first = dir.join("first");
        let second = dir.join("second");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        fake_program(&first, "unrar", 0o644);
        let expected = fake_program(&second, "unrar", 0o755);

        let path = env::join_paths([&first, &second]).unwrap();
        assert_eq!(find_in_path("unrar", Some(path.clone())), Some(expected));
        assert_eq!(find_in_path("pdfimages", Some(path)), None);
        assert_eq!(find_in_path("unrar", None), None);
    }

    #[test]
    fn explicit_binary_must_exist() {
        let tool = Tool::new("unrar", "unrar").at("/definitely/not/here/unrar");
        let err = tool.locate().unwrap_err();
        assert!(matches!(err, Error::MissingTool { package: "unrar", .. }));
        assert!(err.to_string().contains("/definitely/not/here/unrar"));
    }

    #[test]
    fn require_reports_every_missing_tool() {
        let missing = [
            Tool::new("cbz-tools-missing-a", "a").at("/nope/a"),
            Tool::new("cbz-tools-missing-b", "b").at("/nope/b"),
        ];
        let Err(Error::MissingTools(missing)) = require(&missing) else {
            panic!("tools should be missing");
        };
        assert_eq!(missing.len(), 2);
    }

    #[test]
    fn non_zero_exit_is_a_failure() {
        let sh = Tool::new("sh", "sh").at("/bin/sh");
        assert!(sh.run(["-c", "exit 0"]).is_ok());

        let err = sh.run(["-c", "echo broken >&2; exit 3"]).unwrap_err();
        let Error::ToolFailed { status, stderr, .. } = err else {
            panic!("unexpected error {err}");
        };
        assert_eq!(status.code(), Some(3));
        assert_eq!(stderr, "broken");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stderr_is_logged_at_debug() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let sh = Tool::new("sh", "sh").at("/bin/sh");
        tracing::subscriber::with_default(subscriber, || sh.run(["-c", "echo careful >&2"]).unwrap());

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let line = logs
            .lines()
            .find(|line| line.contains("sh stderr: careful"))
            .unwrap();
        assert!(line.contains("DEBUG"));
    }
}
