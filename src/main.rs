//! int-stack - client for the integer stack device.
//!
//! Pushes, pops and resizes the stack behind `/dev/int_stack`.

use clap::{Parser, Subcommand};
use int_stack::client::{self, Command, DeviceFile};
use int_stack::config::DEVICE_PATH;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "int-stack")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Client for the integer stack character device",
    long_about = "Pushes, pops and resizes the bounded integer stack exposed at /dev/int_stack while the USB key is plugged in."
)]
struct Cli {
    /// Device node to talk to
    #[arg(long, global = true, env = "INT_STACK_DEVICE", default_value = DEVICE_PATH)]
    device: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push an integer onto the stack
    Push {
        /// Value to push
        #[arg(allow_negative_numbers = true)]
        value: i32,
    },

    /// Pop the top integer and print it (NULL when empty)
    Pop,

    /// Pop and print every integer until the stack is empty
    Unwind,

    /// Set the maximum number of elements
    SetSize {
        /// New capacity (must be > 0)
        #[arg(allow_negative_numbers = true)]
        size: i64,
    },
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Push { value } => Command::Push(value),
            Commands::Pop => Command::Pop,
            Commands::Unwind => Command::Unwind,
            Commands::SetSize { size } => Command::SetSize(size),
        }
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(client::EXIT_FAILURE);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "int_stack=warn".into()),
        )
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let command = Command::from(cli.command);
    let device = cli.device;
    tracing::debug!(device = %device.display(), ?command, "running command");

    let stdout = io::stdout();
    let stderr = io::stderr();
    let code = client::execute(
        command,
        || DeviceFile::open_for(&device, &command),
        &mut stdout.lock(),
        &mut stderr.lock(),
    )?;
    io::stdout().flush()?;
    Ok(code)
}
