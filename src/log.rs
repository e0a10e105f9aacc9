use console::style;
use std::{error::Error, path::Path, process::ExitStatus};

pub fn cleaning_cache(path: &Path) {
    println!(
        "[{}] Cleaning previous cache at {}",
        style("CAUTION").bright().yellow(),
        style(path.display()).bright().green()
    );
}

pub fn connecting(url: &str) {
    println!(
        "[{}] Connecting to {}",
        style("NOTICE").bright().blue(),
        style(url).bright().green()
    );
}

pub fn download_complete() {
    println!("[{}] Download complete.", style("SUCCESS").bright().green());
}

pub fn download_retry(attempt: u32, retries: u32, err: &dyn Error) {
    println!(
        "[{}] Download attempt {attempt}/{} failed: {}",
        style("CAUTION").bright().yellow(),
        retries + 1,
        chain(err)
    );
}

pub fn plugins_found() {
    println!("[{}] Plugins folder found.", style("SUCCESS").bright().green());
}

pub fn plugins_missing() {
    println!(
        "[{}] Plugins folder not found.",
        style("CAUTION").bright().yellow()
    );
}

pub fn no_local_settings(path: &Path) {
    println!(
        "[{}] No local settings at {}, using defaults.",
        style("CAUTION").bright().yellow(),
        style(path.display()).bright().green()
    );
}

pub fn settings_applied() {
    println!(
        "[{}] Local settings applied.",
        style("SUCCESS").bright().green()
    );
}

pub fn settings_failed(err: &dyn Error) {
    eprintln!(
        "[{}] Failed to apply local settings: {}",
        style("FAILED").bright().red(),
        chain(err)
    );
}

pub fn starting(runner: &str, entry: &str) {
    println!(
        "[{}] Starting {} {}",
        style("NOTICE").bright().blue(),
        style(runner).bright().green(),
        style(entry).bright().green()
    );
}

pub fn terminated(status: ExitStatus) {
    let code = status
        .code()
        .map_or_else(|| "signal".to_owned(), |code| code.to_string());

    println!(
        "[{}] Bundle terminated with exit code: {}",
        style("EXITED").bright().red(),
        style(code).bright().yellow()
    );
}

pub fn artifact_cleanup_failed(path: &Path, err: &dyn Error) {
    eprintln!(
        "[{}] Failed to remove {}: {}",
        style("CAUTION").bright().yellow(),
        style(path.display()).bright().green(),
        chain(err)
    );
}

pub fn lost_child(err: &dyn Error) {
    eprintln!(
        "[{}] Lost track of the bundle process: {}",
        style("FAILED").bright().red(),
        chain(err)
    );
}

pub fn fatal(err: &dyn Error) {
    eprintln!("[{}] {}", style("FATAL").bright().red(), chain(err));
}

/// Renders an error followed by each of its causes.
fn chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}
