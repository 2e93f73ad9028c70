//! Shared helper for shelling out to pluggable validator tools.

use std::path::Path;
use std::process::Output;

use tracing::debug;

/// Run `tool` with `args` in `cwd`, tolerating a missing binary as "no
/// output" rather than a hard error — gates treat tool absence as
/// skippable, not a failure.
pub fn run(tool: &str, args: &[&str], cwd: &Path) -> Option<Output> {
    if which::which(tool).is_err() {
        debug!(tool, "validator tool not found on PATH");
        return None;
    }

    match std::process::Command::new(tool).args(args).current_dir(cwd).output() {
        Ok(output) => Some(output),
        Err(err) => {
            debug!(tool, error = %err, "failed to run validator tool");
            None
        }
    }
}

/// Whether any file under `root` matches one of `extensions` (no dot).
pub fn has_files_with_extension(root: &Path, extensions: &[&str]) -> bool {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .any(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .and_then(std::ffi::OsStr::to_str)
                    .is_some_and(|ext| extensions.contains(&ext))
        })
}
