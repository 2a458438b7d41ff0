use clap::Parser;
use tierdca::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
