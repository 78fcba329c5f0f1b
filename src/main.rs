use std::process::ExitCode;

use largetype_core::{ConfigError, Invocation, RenderConfig, USAGE, resolve, version_line};
use largetype_overlay::LargeTypeOverlay;

mod logging;

fn main() -> ExitCode {
    logging::init();

    // Invalid UTF-8 is replaced rather than rejected
    let args = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned());

    match resolve(args) {
        Ok(Invocation::Help) => {
            println!("{USAGE}");
            ExitCode::SUCCESS
        }
        Ok(Invocation::Version) => {
            println!("{}", version_line());
            ExitCode::SUCCESS
        }
        Ok(Invocation::Render(config)) => show(config),
        Err(err @ ConfigError::EmptyText) => {
            eprintln!("Error: {err}");
            eprintln!();
            eprintln!("{USAGE}");
            ExitCode::FAILURE
        }
    }
}

/// Display the overlay until it is dismissed
fn show(config: RenderConfig) -> ExitCode {
    tracing::debug!(
        text = config.text(),
        family = ?config.font_family(),
        weight = ?config.font_weight(),
        size = ?config.requested_font_size(),
        align = ?config.text_align(),
        padding = ?config.padding(),
        hide_after = ?config.hide_after(),
        "Resolved configuration"
    );

    let overlay = match LargeTypeOverlay::new(config) {
        Ok(overlay) => overlay,
        Err(err) => {
            tracing::debug!(error = ?err, "Failed to open overlay");
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let signal = overlay.run();
    tracing::debug!(?signal, "Exiting");
    ExitCode::SUCCESS
}
