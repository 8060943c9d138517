use callbench::cli;
use std::process::ExitCode;

fn main() -> cli::Result<ExitCode> {
    cli::run()
}
