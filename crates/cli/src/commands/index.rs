use std::path::PathBuf;

use delicia_retrieval::VectorIndex;

use crate::bootstrap::open_knowledge;
use crate::commands::{current_thread_runtime, load_config, CommandResult};
use crate::logging::init_logging;

pub fn run(config_path: Option<PathBuf>, rebuild: bool) -> CommandResult {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("index", "config_validation", error.to_string(), 2)
        }
    };
    init_logging(&config);

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "index",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                1,
            )
        }
    };

    match runtime.block_on(open_knowledge(&config, rebuild)) {
        Ok((knowledge, origin)) => CommandResult::success(
            "index",
            format!(
                "knowledge index {} at `{}` ({} chunks, embedding model `{}`)",
                origin.as_str(),
                VectorIndex::index_path(&config.knowledge.index_dir).display(),
                knowledge.len(),
                knowledge.index().embedding_model()
            ),
        ),
        Err(error) => CommandResult::failure(
            "index",
            error.error_class(),
            error.to_string(),
            error.exit_code(),
        ),
    }
}
