use std::process::ExitCode;

fn main() -> ExitCode {
    delicia_cli::run()
}
