//! External-process JavaScript transpiler backend.
//!
//! Runs `<binary> --config-file <config> <source>` and takes stdout as the
//! compiled output.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::{
    AssetFamily, BackendKind, CompilerBackend, CompilerDescriptor, CompilerError,
    replace_extension,
};

/// Poll interval while waiting for the transpiler with a timeout.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Options for the transpiler backend.
#[derive(Debug, Clone)]
pub struct TranspilerOptions {
    /// Transpiler executable.
    pub binary: PathBuf,
    /// Transpiler configuration file, passed as `--config-file`.
    pub config_file: PathBuf,
    /// Kill the transpiler after this long.
    pub timeout: Option<Duration>,
    /// Version shown in build banners.
    pub version: Option<String>,
}

impl TranspilerOptions {
    /// Creates options with no timeout.
    pub fn new(binary: impl Into<PathBuf>, config_file: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            config_file: config_file.into(),
            timeout: None,
            version: None,
        }
    }
}

/// Compiles JavaScript with an external transpiler such as Babel.
pub struct TranspilerBackend {
    descriptor: CompilerDescriptor,
    options: TranspilerOptions,
}

struct ProcessOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl TranspilerBackend {
    /// Creates a new transpiler backend.
    pub fn new(options: TranspilerOptions) -> Self {
        let name = options
            .binary
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "transpiler".to_string());

        Self {
            descriptor: CompilerDescriptor {
                kind: BackendKind::Transpiler,
                name,
                version: options.version.clone(),
                extension: "js".to_string(),
                family: AssetFamily::Script,
            },
            options,
        }
    }

    fn run(&self, source: &Path) -> Result<ProcessOutput, CompilerError> {
        let mut child = Command::new(&self.options.binary)
            .arg("--config-file")
            .arg(&self.options.config_file)
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CompilerError::missing("transpiler binary", &self.options.binary)
                } else {
                    CompilerError::Io(e)
                }
            })?;

        // Drain both pipes concurrently so a chatty child cannot block on a full pipe
        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        let status = match self.options.timeout {
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    if let Some(status) = child.try_wait()? {
                        break status;
                    }
                    if Instant::now() >= deadline {
                        warn!(
                            "Transpiler timed out after {}ms on {}",
                            timeout.as_millis(),
                            source.display()
                        );
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(CompilerError::compile(
                            source,
                            format!(
                                "{} timed out after {}ms",
                                self.descriptor.name,
                                timeout.as_millis()
                            ),
                            None,
                        ));
                    }
                    thread::sleep(WAIT_POLL_INTERVAL);
                }
            }
            None => child.wait()?,
        };

        Ok(ProcessOutput {
            status,
            stdout: join_reader(stdout_reader),
            stderr: join_reader(stderr_reader),
        })
    }
}

impl CompilerBackend for TranspilerBackend {
    fn descriptor(&self) -> &CompilerDescriptor {
        &self.descriptor
    }

    fn compile(&self, source: &Path) -> Result<String, CompilerError> {
        if !self.options.config_file.is_file() {
            return Err(CompilerError::missing(
                "transpiler config file",
                &self.options.config_file,
            ));
        }

        debug!(
            "Running {} on {}",
            self.options.binary.display(),
            source.display()
        );
        let output = self.run(source)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let captured = [stderr.trim(), stdout.trim()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n");

            return Err(CompilerError::compile(
                source,
                format!(
                    "{} failed ({}): {}",
                    self.descriptor.name, output.status, captured
                ),
                None,
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn artifact_name(&self, source_name: &str) -> String {
        replace_extension(source_name, "compiled.js")
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_reader(handle: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CompileError;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    #[test]
    fn test_artifact_name() {
        let backend = TranspilerBackend::new(TranspilerOptions::new("babel", "babel.config.json"));
        assert_eq!(backend.artifact_name("app.js"), "app.compiled.js");
        assert_eq!(backend.descriptor().name, "babel");
    }

    #[test]
    fn test_missing_config_fails_before_spawning() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("app.js");
        fs::write(&source, "let a = 1;").unwrap();

        // The binary does not exist either; the config check must come first
        let backend = TranspilerBackend::new(TranspilerOptions::new(
            dir.path().join("no-such-binary"),
            dir.path().join("babel.config.json"),
        ));

        match backend.compile(&source).unwrap_err() {
            CompilerError::MissingDependency { what, path } => {
                assert_eq!(what, "transpiler config file");
                assert!(path.ends_with("babel.config.json"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_binary() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("babel.config.json");
        fs::write(&config, "{}").unwrap();
        let source = dir.path().join("app.js");
        fs::write(&source, "let a = 1;").unwrap();

        let backend = TranspilerBackend::new(TranspilerOptions::new(
            dir.path().join("no-such-binary"),
            &config,
        ));

        assert!(matches!(
            backend.compile(&source).unwrap_err(),
            CompilerError::MissingDependency { .. }
        ));
    }

    #[cfg(unix)]
    fn fake_transpiler(dir: &TempDir, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("fake-babel");
        fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[cfg(unix)]
    fn setup(script: &str) -> (TempDir, TranspilerOptions, PathBuf) {
        let dir = tempdir().unwrap();
        let binary = fake_transpiler(&dir, script);
        let config = dir.path().join("babel.config.json");
        fs::write(&config, "{}").unwrap();
        let source = dir.path().join("app.js");
        fs::write(&source, "const a = () => 1;\n").unwrap();
        (dir, TranspilerOptions::new(binary, config), source)
    }

    #[cfg(unix)]
    #[test]
    fn test_passes_config_and_source() {
        // Echo the arguments back, then the source itself
        let (_dir, options, source) = setup("echo \"$1 $(basename \"$2\") $(basename \"$3\")\"\ncat \"$3\"");
        let backend = TranspilerBackend::new(options);

        let output = backend.compile(&source).unwrap();

        assert_eq!(
            output,
            "--config-file babel.config.json app.js\nconst a = () => 1;\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_embeds_output() {
        let (_dir, options, source) = setup("echo 'SyntaxError: Unexpected token (3:4)' >&2\nexit 1");
        let backend = TranspilerBackend::new(options);

        match backend.compile(&source).unwrap_err() {
            CompilerError::Compile(CompileError { message, line, .. }) => {
                assert!(message.contains("SyntaxError: Unexpected token (3:4)"));
                assert_eq!(line, None);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_process() {
        let (_dir, mut options, source) = setup("sleep 5");
        options.timeout = Some(Duration::from_millis(100));
        let backend = TranspilerBackend::new(options);

        let started = Instant::now();
        let err = backend.compile(&source).unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(err.to_string().contains("timed out"));
    }
}
