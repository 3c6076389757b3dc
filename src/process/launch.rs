use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::{ServerConfig, SettingsStore};

/// Fully resolved command line for one server launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl LaunchSpec {
    /// Build `java -Xmx<max> -Xms<min> -jar <jar> <extra args...>`
    pub fn from_server_config(config: &ServerConfig) -> Self {
        let mut args = vec![
            format!("-Xmx{}", config.max_ram),
            format!("-Xms{}", config.min_ram),
            "-jar".to_string(),
            config.jar.clone(),
        ];
        args.extend(config.extra_args.split_whitespace().map(str::to_string));
        Self {
            program: config.java_path.clone(),
            args,
            working_dir: config.directory.clone(),
        }
    }

    /// Command with all three standard streams piped
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl fmt::Display for LaunchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Supplies the launch command, read once per start
pub trait LaunchSource: Send + Sync + 'static {
    fn launch_spec(&self) -> LaunchSpec;
}

impl LaunchSource for LaunchSpec {
    fn launch_spec(&self) -> LaunchSpec {
        self.clone()
    }
}

impl LaunchSource for SettingsStore {
    fn launch_spec(&self) -> LaunchSpec {
        LaunchSpec::from_server_config(&self.snapshot().server)
    }
}
