//! Per-user folder links inside a prefix.
//!
//! A new prefix links the user's Desktop, Documents and similar folders to
//! the host's home directory. Inside a sandbox that would let programs reach
//! outside it, so the links are replaced by plain directories.

use std::fs;
use std::path::Path;

use tracing::debug;

const USER_FOLDERS: &[&str] = &[
    "Desktop",
    "Documents",
    "Downloads",
    "Music",
    "Pictures",
    "Videos",
    "AppData/Roaming/Microsoft/Windows/Start Menu",
    "AppData/Roaming/Microsoft/Windows/Start Menu/Programs",
    "Start Menu",
];

/// Replace symlinked user folders with empty directories. Errors are ignored.
pub fn unlink_user_folders(prefix: &Path, user: &str) {
    let home = prefix.join("drive_c").join("users").join(user);
    for folder in USER_FOLDERS {
        let path = home.join(folder);
        if !path.is_symlink() {
            continue;
        }
        let _ = fs::remove_file(&path);
        let _ = fs::create_dir_all(&path);
        debug!(path = %path.display(), "Replaced folder link");
    }
}
