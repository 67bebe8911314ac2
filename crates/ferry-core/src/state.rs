//! Engine state reported to callers.

use serde::Serialize;

/// Sync state of an [`OfflineManager`](crate::sync::OfflineManager).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Remote unreachable or engine paused; writes stay queued.
    Offline,
    Syncing,
    /// Last cycle drained the outbox.
    #[default]
    Synced,
    /// Last cycle halted on a remote or storage failure.
    Error,
}

impl SyncState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
