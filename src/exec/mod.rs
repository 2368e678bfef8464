/// Spawning processes on the host
mod spawn;
pub use spawn::{CommandLine, RunOutput, Spawner, SystemSpawner};

/// Scripted stand-in for the host's processes
#[cfg(any(test, feature = "testing"))]
pub mod fake;

/// "Is this executable here and working?"
mod probe;
pub use probe::{Availability, ToolProbe};

/// Run commands inside a resolved execution context
mod runner;
pub use runner::CommandRunner;
