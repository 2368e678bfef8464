/// High-level command line app
mod app;
/// Definition of command-line args
mod args;
/// Writing and submitting batch jobs
pub mod batch;
/// Execution contexts for external tools
pub mod env;
/// Starting external processes
pub mod exec;
/// Filesystem operations
pub mod fs;
/// Stages and the orchestrator that runs them
pub mod pipeline;
/// Interpreted command-line settings
mod settings;
/// Text UI
mod ui;

// exported for tests:
pub use app::App;
pub use args::{Args, OrganismType};
pub use settings::Settings;

/// Run the command-line app.
pub fn run() -> Result<(), anyhow::Error> {
    use clap::Parser;
    let args = Args::parse();

    // INTERPRET SETTINGS ///////////////
    let settings: Settings = args.try_into()?;

    let log_level = match settings.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    simple_logging::log_to_stderr(log_level);

    // RUN THE THING /////////////////
    let app = App::new(settings);
    app.run()?;

    Ok(())
}
