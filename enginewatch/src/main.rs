//! enginewatch - continuous UCI engine analysis from the command line.
//!
//! `enginewatch analyze <ENGINE>` keeps an engine searching whatever position
//! was last typed on stdin and prints throttled analysis lines. `options`
//! shows what an engine declares, `params` edits the stored per-task
//! parameters used when a worker is created.

use std::sync::Arc;

use analysis::{AnalysisConfig, AnalysisKind, JsonParameterStore, Task};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod params;
mod session;

#[derive(Parser)]
#[command(name = "enginewatch", about = "Continuous UCI engine analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse positions read from stdin.
    ///
    /// Input lines are FENs (or `fen <FEN>`, `startpos`) and the commands
    /// `multipv <n>`, `suspend`, `resume`, `reload` and `quit`.
    Analyze {
        /// Path to the engine executable.
        engine: String,
        /// Which consumer to behave like.
        #[arg(long, value_enum, default_value_t = Mode::Manual)]
        mode: Mode,
        /// Number of lines for manual analysis.
        #[arg(long, default_value_t = 1)]
        multipv: u32,
        /// Position to start with.
        #[arg(long)]
        fen: Option<String>,
    },
    /// Show the options an engine declares.
    Options {
        engine: String,
        /// Store the declarations in the parameter file.
        #[arg(long)]
        save: bool,
    },
    /// Show or edit stored parameters for an engine and task.
    Params {
        engine: String,
        #[arg(value_parser = params::parse_task)]
        task: Task,
        /// `key=value` pairs to store; an empty value removes the key.
        assignments: Vec<String>,
    },
    /// Forget everything stored for an engine.
    Forget { engine: String },
    /// List engines with stored parameters.
    Engines,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Evaluation,
    Manual,
}

impl From<Mode> for AnalysisKind {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Evaluation => AnalysisKind::Evaluation,
            Mode::Manual => AnalysisKind::ManualAnalysis,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_dir = config::get_log_dir();
    std::fs::create_dir_all(&log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&log_dir, "enginewatch");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let params_path = config::get_params_path();
    tracing::debug!(params = %params_path.display(), logs = %log_dir.display(), "Configuration");
    let store = Arc::new(JsonParameterStore::load(params_path));

    match cli.command {
        Commands::Analyze {
            engine,
            mode,
            multipv,
            fen,
        } => {
            tracing::info!(engine = %engine, ?mode, "enginewatch starting");
            let config = AnalysisConfig::default().with_update_interval(config::get_update_interval());
            let (mut session, events) =
                session::AnalysisSession::new(engine, mode.into(), store, config);
            session.set_multipv(multipv);
            session::run(session, events, fen).await?;
            tracing::info!("enginewatch exiting");
        }
        Commands::Options { engine, save } => {
            params::show_options(&engine, &store, save).await?;
        }
        Commands::Params {
            engine,
            task,
            assignments,
        } => {
            let stored = params::edit_params(&store, &engine, task, &assignments)?;
            params::print_params(&engine, task, &stored)?;
        }
        Commands::Forget { engine } => {
            store.remove_engine(&engine)?;
            println!("Removed stored parameters for {engine}");
        }
        Commands::Engines => {
            for engine in store.engines() {
                let options = store.engine_options(&engine).len();
                println!("{engine} ({options} options)");
            }
        }
    }

    Ok(())
}
