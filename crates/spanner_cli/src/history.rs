use std::path::{Path, PathBuf};

use rustyline::{history::FileHistory, Editor, Helper};
use tracing::debug;

pub const HISTORY_FILE_NAME: &str = ".spanner_cli_history";

/// `~/.spanner_cli_history`, if there is a home directory.
pub fn default_history_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|h| h.join(HISTORY_FILE_NAME))
}

/// Load history from `path` into the editor. A missing or unreadable file
/// only logs.
pub fn load_history<H: Helper>(rl: &mut Editor<H, FileHistory>, path: &Path) {
    if !path.exists() {
        return;
    }
    match rl.load_history(path) {
        Ok(_) => debug!("Loaded history from {}", path.display()),
        Err(e) => debug!("Could not load history: {}", e),
    }
}

pub fn save_history<H: Helper>(rl: &mut Editor<H, FileHistory>, path: &Path) {
    match rl.save_history(path) {
        Ok(_) => debug!("Saved history to {}", path.display()),
        Err(e) => debug!("Could not save history: {}", e),
    }
}
