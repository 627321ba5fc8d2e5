use std::process::ExitCode;

use tracing::error;
use ui_engine::run_app;

use super::bootstrap::AppWiring;
use super::demo;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let font = app.config.console_font.clone();
    if let Err(err) = run_app(app.config, &app.paths, |engine| demo::populate(engine, &font)) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
