//! pw - transactional in-place file editing

use std::process::ExitCode;

use patchwork::ui::output;

fn main() -> ExitCode {
    match patchwork::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
