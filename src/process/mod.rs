mod launch;
mod stream;
mod supervisor;

pub use launch::{LaunchSource, LaunchSpec};
pub use stream::{StreamKind, classify, spawn_reader};
pub use supervisor::{
    DEFAULT_DRAIN_TIMEOUT, DEFAULT_STOP_COMMAND, ProcessState, Supervisor, SupervisorError,
    SupervisorOptions,
};
