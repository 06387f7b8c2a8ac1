//! The state of one DLL target inside a prefix.
//!
//! A target moves between three states. Installing over any pre-existing
//! file parks it at `<target>.bck` exactly once; installing into an empty
//! slot leaves no backup. Restoring undoes whichever happened.
//!
//! ```text
//!   Pristine{exists: true}  --override-->  OverriddenWithBackup
//!   Pristine{exists: false} --override-->  OverriddenWithoutBackup
//!   Overridden*             --override-->  (same state, file refreshed)
//!   OverriddenWithBackup    --restore--->  Pristine{exists: true}
//!   OverriddenWithoutBackup --restore--->  Pristine{exists: false}
//! ```
//!
//! On disk only the backup is visible, so [`DllSlot::detect`] reports a live
//! file without a backup as pristine and [`DllSlot::release`] treats it as
//! an override with nothing to restore.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DllSlot {
    /// Untouched by any component; `exists` tells whether a file is there.
    Pristine { exists: bool },
    /// Holds a component DLL and the original sits at `<target>.bck`.
    OverriddenWithBackup,
    /// Holds a component DLL that had nothing to replace.
    OverriddenWithoutBackup,
}

impl DllSlot {
    pub fn backup_path(target: &Path) -> PathBuf {
        let mut name = target.as_os_str().to_os_string();
        name.push(".bck");
        PathBuf::from(name)
    }

    /// Read the state of `target` from the files next to it.
    pub fn detect(target: &Path) -> Self {
        if Self::backup_path(target).exists() {
            DllSlot::OverriddenWithBackup
        } else {
            DllSlot::Pristine {
                exists: target.exists(),
            }
        }
    }

    pub fn is_overridden(&self) -> bool {
        !matches!(self, DllSlot::Pristine { .. })
    }

    /// Place `source` at `target`, backing up a pristine file first.
    pub fn override_with(self, source: &Path, target: &Path) -> Result<DllSlot> {
        let next = match self {
            DllSlot::Pristine { exists: true } => {
                let backup = Self::backup_path(target);
                fs::rename(target, &backup).at(target)?;
                DllSlot::OverriddenWithBackup
            }
            DllSlot::Pristine { exists: false } => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).at(parent)?;
                }
                DllSlot::OverriddenWithoutBackup
            }
            overridden => overridden,
        };
        fs::copy(source, target).at(target)?;
        Ok(next)
    }

    /// Undo an override, putting the original file back if there was one.
    pub fn restore(self, target: &Path) -> Result<DllSlot> {
        match self {
            DllSlot::OverriddenWithBackup => {
                let backup = Self::backup_path(target);
                fs::rename(&backup, target).at(&backup)?;
                Ok(DllSlot::Pristine { exists: true })
            }
            DllSlot::OverriddenWithoutBackup => {
                if target.exists() {
                    fs::remove_file(target).at(target)?;
                }
                Ok(DllSlot::Pristine { exists: false })
            }
            pristine => Ok(pristine),
        }
    }

    /// Undo whatever an install left at `target`: the backup comes back if
    /// there is one, otherwise the live copy is removed. Returns whether
    /// anything changed.
    pub fn release(target: &Path) -> Result<bool> {
        let live = match Self::detect(target) {
            DllSlot::Pristine { exists: false } => return Ok(false),
            DllSlot::Pristine { exists: true } => DllSlot::OverriddenWithoutBackup,
            overridden => overridden,
        };
        live.restore(target)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        _tmp: tempfile::TempDir,
        source: PathBuf,
        target: PathBuf,
    }

    fn fixture(original: Option<&[u8]>) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("dxvk/x64/d3d11.dll");
        let target = tmp.path().join("prefix/drive_c/windows/system32/d3d11.dll");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"dxvk d3d11").unwrap();
        if let Some(content) = original {
            fs::create_dir_all(target.parent().unwrap()).unwrap();
            fs::write(&target, content).unwrap();
        }
        Fixture {
            _tmp: tmp,
            source,
            target,
        }
    }

    #[test]
    fn override_backs_up_existing_file_once() {
        let f = fixture(Some(b"builtin"));
        let slot = DllSlot::detect(&f.target);
        assert_eq!(slot, DllSlot::Pristine { exists: true });

        let slot = slot.override_with(&f.source, &f.target).unwrap();
        assert_eq!(slot, DllSlot::OverriddenWithBackup);

        // A second install keeps the original backup.
        let again = DllSlot::detect(&f.target);
        assert_eq!(again, DllSlot::OverriddenWithBackup);
        again.override_with(&f.source, &f.target).unwrap();

        let backup = DllSlot::backup_path(&f.target);
        assert_eq!(fs::read(&backup).unwrap(), b"builtin");
        assert_eq!(fs::read(&f.target).unwrap(), b"dxvk d3d11");
    }

    #[test]
    fn identical_original_is_still_backed_up() {
        let f = fixture(Some(b"dxvk d3d11"));
        let slot = DllSlot::detect(&f.target)
            .override_with(&f.source, &f.target)
            .unwrap();
        assert_eq!(slot, DllSlot::OverriddenWithBackup);

        assert!(DllSlot::release(&f.target).unwrap());
        assert_eq!(fs::read(&f.target).unwrap(), b"dxvk d3d11");
        assert!(!DllSlot::backup_path(&f.target).exists());
    }

    #[test]
    fn restore_puts_original_back() {
        let f = fixture(Some(b"builtin"));
        let slot = DllSlot::detect(&f.target)
            .override_with(&f.source, &f.target)
            .unwrap();
        let restored = slot.restore(&f.target).unwrap();

        assert_eq!(restored, DllSlot::Pristine { exists: true });
        assert_eq!(fs::read(&f.target).unwrap(), b"builtin");
        assert!(!DllSlot::backup_path(&f.target).exists());
    }

    #[test]
    fn empty_slot_round_trip_leaves_nothing() {
        let f = fixture(None);
        let slot = DllSlot::detect(&f.target);
        assert_eq!(slot, DllSlot::Pristine { exists: false });

        let slot = slot.override_with(&f.source, &f.target).unwrap();
        assert_eq!(slot, DllSlot::OverriddenWithoutBackup);

        slot.restore(&f.target).unwrap();
        assert!(!f.target.exists());
    }

    #[test]
    fn release_removes_copy_without_backup() {
        let f = fixture(None);
        DllSlot::detect(&f.target)
            .override_with(&f.source, &f.target)
            .unwrap();

        assert!(DllSlot::release(&f.target).unwrap());
        assert!(!f.target.exists());
        assert!(!DllSlot::release(&f.target).unwrap());
    }

    #[test]
    fn restoring_pristine_is_noop() {
        let f = fixture(Some(b"builtin"));
        let slot = DllSlot::Pristine { exists: true };
        assert_eq!(slot.restore(&f.target).unwrap(), slot);
        assert_eq!(fs::read(&f.target).unwrap(), b"builtin");
    }
}
