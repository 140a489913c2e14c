use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};

use procguard_core::platform::Platform;
use thiserror::Error;

/// Suffix appended to executables locked by [`RenameBlocker`].
pub const BLOCKED_SUFFIX: &str = ".blocked";

#[derive(Error, Debug)]
pub enum LockError {
    #[error("changing {path} failed")]
    Io {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
    #[error("{path} is not locked")]
    NotLocked { path: PathBuf },
    #[error("locking executables is not supported on {0}")]
    Unsupported(Platform),
}

/// Prevents an executable from being started again, and undoes it.
///
/// Both methods return the path the executable lives at afterwards.
pub trait PlatformBlocker {
    fn block(&self, path: &Path) -> Result<PathBuf, LockError>;
    fn unblock(&self, path: &Path) -> Result<PathBuf, LockError>;
}

/// Clears the executable bits (`0644`), restores them as `0755`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionBlocker;

/// Renames the executable to `<path>.blocked` and back.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameBlocker;

/// Returns the blocker suited to `platform`.
pub fn platform_blocker(platform: Platform) -> Result<Box<dyn PlatformBlocker>, LockError> {
    match platform {
        Platform::Linux | Platform::MacOs => Ok(Box::new(PermissionBlocker)),
        Platform::Windows => Ok(Box::new(RenameBlocker)),
        Platform::Other => Err(LockError::Unsupported(platform)),
    }
}

impl PlatformBlocker for PermissionBlocker {
    fn block(&self, path: &Path) -> Result<PathBuf, LockError> {
        set_mode(path, 0o644)?;
        Ok(path.to_path_buf())
    }

    // TODO: record the mode seen by `block` so unblock restores it instead of forcing 0755.
    fn unblock(&self, path: &Path) -> Result<PathBuf, LockError> {
        set_mode(path, 0o755)?;
        Ok(path.to_path_buf())
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), LockError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|source| LockError::Io {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), LockError> {
    Err(LockError::Unsupported(Platform::current()))
}

fn blocked_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(BLOCKED_SUFFIX);
    PathBuf::from(name)
}

fn rename(from: &Path, to: &Path) -> Result<(), LockError> {
    fs::rename(from, to).map_err(|source| LockError::Io {
        source,
        path: from.to_path_buf(),
    })
}

impl PlatformBlocker for RenameBlocker {
    fn block(&self, path: &Path) -> Result<PathBuf, LockError> {
        let target = blocked_path(path);
        rename(path, &target)?;
        Ok(target)
    }

    /// Accepts either the original path or the `.blocked` one.
    fn unblock(&self, path: &Path) -> Result<PathBuf, LockError> {
        let (locked, original) = match path.to_str().and_then(|p| p.strip_suffix(BLOCKED_SUFFIX)) {
            Some(original) => (path.to_path_buf(), PathBuf::from(original)),
            None => (blocked_path(path), path.to_path_buf()),
        };
        if !locked.exists() {
            return Err(LockError::NotLocked { path: locked });
        }
        rename(&locked, &original)?;
        Ok(original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn permission_blocker_toggles_exec_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("game");
        fs::write(&exe, "#!/bin/sh\n").unwrap();
        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;

        assert_eq!(PermissionBlocker.block(&exe).unwrap(), exe);
        assert_eq!(mode(&exe), 0o644);
        PermissionBlocker.unblock(&exe).unwrap();
        assert_eq!(mode(&exe), 0o755);
    }

    #[test]
    fn rename_blocker_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("game.exe");
        fs::write(&exe, "MZ").unwrap();

        let locked = RenameBlocker.block(&exe).unwrap();
        assert_eq!(locked, dir.path().join("game.exe.blocked"));
        assert!(!exe.exists());

        assert_eq!(RenameBlocker.unblock(&locked).unwrap(), exe);
        assert!(exe.exists());
        assert!(matches!(
            RenameBlocker.unblock(&exe),
            Err(LockError::NotLocked { .. })
        ));
    }

    #[test]
    fn blocker_selection() {
        assert!(platform_blocker(Platform::Linux).is_ok());
        assert!(platform_blocker(Platform::Windows).is_ok());
        assert!(matches!(
            platform_blocker(Platform::Other),
            Err(LockError::Unsupported(Platform::Other))
        ));
    }
}
