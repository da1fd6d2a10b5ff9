use aibot::cli::{run_ask, run_serve};
use aibot::config::{CliArgs, Command};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    match CliArgs::parse().command {
        Command::Serve(args) => run_serve(args),
        Command::Ask(args) => run_ask(args),
    }
}
