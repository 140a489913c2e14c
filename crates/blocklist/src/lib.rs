//! File backed blocklists of process names and web domains, plus the
//! platform specific locking of executables on disk.

mod platform;
mod store;

pub use platform::{
    BLOCKED_SUFFIX, LockError, PermissionBlocker, PlatformBlocker, RenameBlocker,
    platform_blocker,
};
pub use store::{
    APP_BLOCKLIST_FILE, AddOutcome, Blocklist, BlocklistError, BlocklistExport, RemoveOutcome,
    WEB_BLOCKLIST_FILE,
};
