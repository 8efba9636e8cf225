mod cmd;
use clap::{Parser, Subcommand};
use cmd::default::DefaultArgs;
use cmd::probe::ProbeArgs;
use eyre::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Subcommand, Debug)]
pub enum MemresSubcommand {
    #[command(about = "Allocate a batch of BYTES:ALIGN requests from an adaptor and report the outcome")]
    Probe(ProbeArgs),
    #[command(about = "Show the process-wide default memory resource")]
    Default(DefaultArgs),
}

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "memres CLI: inspect how memory resources route (size, alignment) requests

Logging is controlled with MEMRES_LOG (e.g. MEMRES_LOG=memres=trace)."
)]
pub struct MemresArgs {
    #[command(subcommand)]
    pub cmd: MemresSubcommand,
}

fn main() -> Result<()> {
    init_logging();
    let root_args = MemresArgs::parse();

    match root_args.cmd {
        MemresSubcommand::Probe(args) => {
            args.run()?;
        }
        MemresSubcommand::Default(args) => {
            args.run()?;
        }
    }

    Ok(())
}

fn init_logging() {
    let env_filter =
        EnvFilter::try_from_env("MEMRES_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}
