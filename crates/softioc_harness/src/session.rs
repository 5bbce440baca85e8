use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};

use log::debug;
use tempfile::NamedTempFile;

use crate::dbd::find_dbd_path;
use crate::error::{HarnessError, HarnessResult};

/// Access security text applied when the caller supplies none: unrestricted
/// read, trap-logged write.
pub const DEFAULT_ACCESS_RULES: &str = "\
ASG(DEFAULT) {
    RULE(1,READ)
    RULE(1,WRITE,TRAPWRITE)
}
";

/// Default macro string substituted into record names.
const DEFAULT_MACROS: (&str, &str) = ("P", "test");

/// Name of the database definition file loaded at IOC startup.
const DEFAULT_DBD_NAME: &str = "softIoc.dbd";

/// Configuration bundle for launching a soft IOC process.
#[derive(Debug, Clone)]
pub struct IocConfig {
    /// Database text loaded via `-d`.
    pub db_text: String,
    /// Access security group text loaded via `-a`. `None` applies
    /// [`DEFAULT_ACCESS_RULES`].
    pub access_rules_text: Option<String>,
    /// Additional CLI arguments appended after the fixed arguments.
    pub additional_args: Vec<String>,
    /// Macro substitutions passed via `-m`, joined as `key=value,key=value`
    /// in insertion order. `None` applies `P=test`; an explicitly empty list
    /// yields an empty macro string.
    pub macros: Option<Vec<(String, String)>>,
    /// Directory containing database definitions. `None` resolves it with
    /// [`find_dbd_path`](crate::dbd::find_dbd_path) at spawn time.
    pub dbd_path: Option<PathBuf>,
    /// Name of the dbd file joined onto `dbd_path`.
    pub dbd_name: String,
    /// Extra environment variables applied to the child process, overriding
    /// inherited ones on key collision.
    pub env: BTreeMap<String, String>,
    /// Binary to spawn. Defaults to `softIoc`, resolved through `PATH`.
    pub binary_path: PathBuf,
}

impl Default for IocConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl IocConfig {
    /// Create a config with all defaults (empty database, default access
    /// rules, `P=test` macros, auto-discovered dbd directory).
    pub fn new() -> Self {
        Self {
            db_text: String::new(),
            access_rules_text: None,
            additional_args: Vec::new(),
            macros: None,
            dbd_path: None,
            dbd_name: DEFAULT_DBD_NAME.to_string(),
            env: BTreeMap::new(),
            binary_path: PathBuf::from("softIoc"),
        }
    }

    /// Set the database text loaded at startup.
    pub fn with_db_text(mut self, text: impl Into<String>) -> Self {
        self.db_text = text.into();
        self
    }

    /// Replace the default access security text.
    pub fn with_access_rules(mut self, text: impl Into<String>) -> Self {
        self.access_rules_text = Some(text.into());
        self
    }

    /// Add a passthrough CLI argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.additional_args.push(arg.into());
        self
    }

    /// Add a macro substitution. The first call replaces the `P=test`
    /// default; later calls append.
    pub fn with_macro(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.macros
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.to_string()));
        self
    }

    /// Override the database definitions directory.
    pub fn with_dbd_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dbd_path = Some(path.into());
        self
    }

    /// Override the dbd file name.
    pub fn with_dbd_name(mut self, name: impl Into<String>) -> Self {
        self.dbd_name = name.into();
        self
    }

    /// Add an environment variable override.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Override the binary to spawn.
    pub fn with_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_path = path.into();
        self
    }

    fn macro_string(&self) -> String {
        let pairs: Vec<String> = match &self.macros {
            Some(macros) => macros.iter().map(|(k, v)| format!("{k}={v}")).collect(),
            None => vec![format!("{}={}", DEFAULT_MACROS.0, DEFAULT_MACROS.1)],
        };
        pairs.join(",")
    }
}

/// Handle to a running soft IOC process.
///
/// The handle owns the child process and the temporary files it reads; both
/// live until the handle is dropped. Dropping the handle kills the process
/// and waits for it to be reaped before the files are removed, on every exit
/// path including unwinding.
#[derive(Debug)]
pub struct SoftIoc {
    child: Child,
    // Held so the IOC can re-read them while running; removed on drop.
    _access_file: NamedTempFile,
    _db_file: NamedTempFile,
}

impl SoftIoc {
    /// Write the configuration to temporary files and start the IOC process.
    ///
    /// The resolved dbd file must exist before any spawn is attempted;
    /// otherwise this fails with [`HarnessError::MissingDbdFile`] and no
    /// process is started. Spawn failures surface as
    /// [`HarnessError::IocStart`].
    pub fn spawn(config: IocConfig) -> HarnessResult<Self> {
        let access_rules = config
            .access_rules_text
            .as_deref()
            .unwrap_or(DEFAULT_ACCESS_RULES);
        let access_file = write_temp_file(access_rules)?;
        let db_file = write_temp_file(&config.db_text)?;

        let dbd_dir = match &config.dbd_path {
            Some(path) => path.clone(),
            None => find_dbd_path()?,
        };
        let dbd_file = dbd_dir.join(&config.dbd_name);
        if !dbd_file.exists() {
            return Err(HarnessError::MissingDbdFile(dbd_file));
        }

        let macros = config.macro_string();
        let mut cmd = Command::new(&config.binary_path);
        cmd.arg("-D")
            .arg(&dbd_file)
            .arg("-m")
            .arg(&macros)
            .arg("-a")
            .arg(access_file.path())
            .arg("-d")
            .arg(db_file.path())
            .args(&config.additional_args);
        cmd.envs(&config.env);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());

        debug!(
            "launching soft IOC: {} -D {} -m {}",
            config.binary_path.display(),
            dbd_file.display(),
            macros
        );
        let child = cmd
            .spawn()
            .map_err(|err| HarnessError::ioc_start(err.to_string()))?;
        debug!("soft IOC started with pid {}", child.id());

        Ok(Self {
            child,
            _access_file: access_file,
            _db_file: db_file,
        })
    }

    /// OS process id of the IOC.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Piped standard input of the IOC shell, if not yet taken.
    pub fn stdin(&mut self) -> Option<&mut ChildStdin> {
        self.child.stdin.as_mut()
    }

    /// Piped standard output of the IOC shell, if not yet taken.
    pub fn stdout(&mut self) -> Option<&mut ChildStdout> {
        self.child.stdout.as_mut()
    }

    /// Take ownership of the IOC's standard input pipe.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    /// Take ownership of the IOC's standard output pipe.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Whether the IOC process is still running.
    pub fn is_running(&mut self) -> HarnessResult<bool> {
        Ok(self.child.try_wait()?.is_none())
    }

    /// Kill the IOC and wait for it to exit, returning its exit status.
    ///
    /// Equivalent to dropping the handle, but reports errors and the final
    /// status instead of discarding them.
    pub fn shutdown(mut self) -> HarnessResult<ExitStatus> {
        self.terminate();
        Ok(self.child.wait()?)
    }

    fn terminate(&mut self) {
        // kill on an already-exited child reports an error; that is the
        // expected no-op case here.
        let _ = self.child.kill();
    }
}

impl Drop for SoftIoc {
    fn drop(&mut self) {
        debug!("stopping soft IOC pid {}", self.child.id());
        self.terminate();
        // Reap before the temp files are removed by their own drop. A hung
        // child blocks here indefinitely; no teardown timeout is enforced.
        let _ = self.child.wait();
    }
}

fn write_temp_file(contents: &str) -> HarnessResult<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    // Flushed before the spawn so the child never sees a partial file.
    file.flush()?;
    Ok(file)
}
