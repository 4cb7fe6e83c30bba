use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use delicia_agent::{SessionDriver, TurnOutcome};
use tokio::runtime::Runtime;

use crate::bootstrap::bootstrap;
use crate::commands::{current_thread_runtime, load_config, CommandResult};
use crate::logging::init_logging;

const BANNER_RULE: &str = "==================================================";

pub fn run(config_path: Option<PathBuf>) -> CommandResult {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("chat", "config_validation", error.to_string(), 2)
        }
    };
    init_logging(&config);

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                1,
            )
        }
    };

    let mut application = match runtime.block_on(bootstrap(config)) {
        Ok(application) => application,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                error.error_class(),
                error.to_string(),
                error.exit_code(),
            )
        }
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    match run_session(&runtime, &mut application.driver, stdin.lock(), stdout.lock()) {
        Ok(()) => CommandResult { exit_code: 0, output: String::new() },
        Err(error) => CommandResult::failure("chat", "io", error.to_string(), 1),
    }
}

/// Reads one guest line at a time until an exit command closes the session or input ends.
/// End of input leaves without filing a report.
pub fn run_session<R: BufRead, W: Write>(
    runtime: &Runtime,
    driver: &mut SessionDriver,
    input: R,
    mut output: W,
) -> io::Result<()> {
    writeln!(output, "\n{BANNER_RULE}")?;
    writeln!(output, "       BIENVENIDO AL RESTAURANTE 'LA DELICIA'")?;
    writeln!(output, "{BANNER_RULE}")?;
    writeln!(output, "\nBruno, tu mozo virtual, está listo para atenderte.")?;
    writeln!(output, "(Escribe 'gracias' o 'salir' para finalizar y guardar el informe)")?;

    let mut lines = input.lines();
    loop {
        write!(output, "\nCliente: ")?;
        output.flush()?;

        let Some(line) = lines.next() else {
            writeln!(output)?;
            tracing::info!(event_name = "session.input.closed", "input ended without exit command");
            return Ok(());
        };
        let line = line?;

        match runtime.block_on(driver.handle_input(&line)) {
            TurnOutcome::Reply { reply } => writeln!(output, "\nBruno: {reply}")?,
            TurnOutcome::Failed { message, .. } => writeln!(output, "\nBruno: {message}")?,
            TurnOutcome::Closed { report, farewell } => {
                writeln!(output, "\nBruno: {report}")?;
                writeln!(output, "Bruno: {farewell}")?;
                return Ok(());
            }
        }
    }
}
