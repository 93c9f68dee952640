//! Durable mark ledger.
//!
//! Two namespaces — session marks (`closed`, `claimed`, `killed`) and
//! address marks (`used`) — persisted as one JSON file. The store outlives
//! the session registry: it is what prevents a killed session from being
//! recovered or an address from claiming twice inside its cooldown, across
//! process restarts.
//!
//! Writes are debounced: marks set in a burst coalesce into a single file
//! write after a short delay. Shutdown paths call [`FaucetStore::flush_now`]
//! to force the pending write out. A periodic sweep drops entries older
//! than their retention window.

pub mod error;
pub mod marks;

pub use error::StoreError;
pub use marks::{AddressMark, MarkEntry, SessionMark};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use spigot_types::{SessionId, TargetAddress, Timestamp};

#[derive(Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    session_marks: HashMap<String, MarkEntry<SessionMark>>,
    #[serde(default)]
    address_marks: HashMap<String, MarkEntry<AddressMark>>,
}

struct Inner {
    data: StoreData,
    dirty: bool,
    flush_scheduled: bool,
}

/// The faucet's durable mark store.
pub struct FaucetStore {
    path: PathBuf,
    flush_delay: Duration,
    inner: Mutex<Inner>,
}

impl FaucetStore {
    /// Open the store, loading an existing file if present.
    pub fn open(path: impl AsRef<Path>, flush_delay: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let data: StoreData =
                serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))?;
            info!(
                path = %path.display(),
                sessions = data.session_marks.len(),
                addresses = data.address_marks.len(),
                "loaded faucet store"
            );
            data
        } else {
            debug!(path = %path.display(), "no store file, starting empty");
            StoreData::default()
        };

        Ok(Self {
            path,
            flush_delay,
            inner: Mutex::new(Inner {
                data,
                dirty: false,
                flush_scheduled: false,
            }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }

    /// Marks on a session id, minus any in `skip`.
    pub fn session_marks(&self, id: &SessionId, skip: &[SessionMark]) -> Vec<SessionMark> {
        let inner = self.lock();
        match inner.data.session_marks.get(&id.to_string()) {
            Some(entry) => entry
                .marks
                .iter()
                .copied()
                .filter(|m| !skip.contains(m))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Marks on a payout address.
    pub fn address_marks(&self, addr: &TargetAddress) -> Vec<AddressMark> {
        let inner = self.lock();
        match inner.data.address_marks.get(addr.as_str()) {
            Some(entry) => entry.marks.clone(),
            None => Vec::new(),
        }
    }

    /// Record a session mark and schedule a debounced flush.
    pub fn set_session_mark(self: &Arc<Self>, id: &SessionId, mark: SessionMark) {
        let now = Timestamp::now().as_secs();
        {
            let mut inner = self.lock();
            let entry = inner
                .data
                .session_marks
                .entry(id.to_string())
                .or_insert_with(|| MarkEntry {
                    marks: Vec::new(),
                    touched: now,
                });
            if !entry.marks.contains(&mark) {
                entry.marks.push(mark);
            }
            entry.touched = now;
            inner.dirty = true;
        }
        self.schedule_flush();
    }

    /// Record an address mark and schedule a debounced flush.
    pub fn set_address_mark(self: &Arc<Self>, addr: &TargetAddress, mark: AddressMark) {
        let now = Timestamp::now().as_secs();
        {
            let mut inner = self.lock();
            let entry = inner
                .data
                .address_marks
                .entry(addr.as_str().to_string())
                .or_insert_with(|| MarkEntry {
                    marks: Vec::new(),
                    touched: now,
                });
            if !entry.marks.contains(&mark) {
                entry.marks.push(mark);
            }
            entry.touched = now;
            inner.dirty = true;
        }
        self.schedule_flush();
    }

    /// Drop entries whose last touch is older than the relevant retention
    /// window. Returns the number of entries removed.
    pub fn sweep(
        self: &Arc<Self>,
        now: Timestamp,
        session_window_secs: u64,
        address_window_secs: u64,
    ) -> usize {
        let removed = {
            let mut inner = self.lock();
            let before =
                inner.data.session_marks.len() + inner.data.address_marks.len();
            inner
                .data
                .session_marks
                .retain(|_, e| !Timestamp::new(e.touched).is_older_than(session_window_secs, now));
            inner
                .data
                .address_marks
                .retain(|_, e| !Timestamp::new(e.touched).is_older_than(address_window_secs, now));
            let removed =
                before - (inner.data.session_marks.len() + inner.data.address_marks.len());
            if removed > 0 {
                inner.dirty = true;
            }
            removed
        };
        if removed > 0 {
            debug!(removed, "swept expired store marks");
            self.schedule_flush();
        }
        removed
    }

    /// Write the store to disk immediately if anything changed.
    pub fn flush_now(&self) -> Result<(), StoreError> {
        let serialized = {
            let mut inner = self.lock();
            if !inner.dirty {
                inner.flush_scheduled = false;
                return Ok(());
            }
            inner.dirty = false;
            inner.flush_scheduled = false;
            serde_json::to_string_pretty(&inner.data)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?
        };
        std::fs::write(&self.path, serialized)?;
        debug!(path = %self.path.display(), "flushed faucet store");
        Ok(())
    }

    /// Arm the debounced flush task unless one is already pending.
    fn schedule_flush(self: &Arc<Self>) {
        {
            let mut inner = self.lock();
            if inner.flush_scheduled || !inner.dirty {
                return;
            }
            inner.flush_scheduled = true;
        }
        let store = Arc::clone(self);
        let delay = self.flush_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let result = tokio::task::spawn_blocking(move || store.flush_now()).await;
            match result {
                Ok(Err(e)) => warn!(error = %e, "faucet store flush failed"),
                Err(e) => warn!(error = %e, "faucet store flush task panicked"),
                Ok(Ok(())) => {}
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(dir: &tempfile::TempDir) -> Arc<FaucetStore> {
        let path = dir.path().join("faucet-store.json");
        Arc::new(FaucetStore::open(path, Duration::from_millis(10)).unwrap())
    }

    fn addr() -> TargetAddress {
        TargetAddress::parse("0x5a0b54d5dc17e0aadc383d2db43b0a0d3e029c4c").unwrap()
    }

    #[tokio::test]
    async fn marks_accumulate_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        let id = SessionId::random();

        store.set_session_mark(&id, SessionMark::Closed);
        store.set_session_mark(&id, SessionMark::Closed);
        store.set_session_mark(&id, SessionMark::Claimed);

        assert_eq!(
            store.session_marks(&id, &[]),
            vec![SessionMark::Closed, SessionMark::Claimed]
        );
    }

    #[tokio::test]
    async fn skip_filter_hides_marks() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        let id = SessionId::random();

        store.set_session_mark(&id, SessionMark::Closed);
        assert!(store
            .session_marks(&id, &[SessionMark::Closed])
            .is_empty());
        assert_eq!(
            store.session_marks(&id, &[]),
            vec![SessionMark::Closed]
        );
    }

    #[tokio::test]
    async fn marks_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faucet-store.json");
        let id = SessionId::random();

        {
            let store =
                Arc::new(FaucetStore::open(&path, Duration::from_millis(10)).unwrap());
            store.set_session_mark(&id, SessionMark::Killed);
            store.set_address_mark(&addr(), AddressMark::Used);
            store.flush_now().unwrap();
        }

        let reopened = Arc::new(FaucetStore::open(&path, Duration::from_millis(10)).unwrap());
        assert_eq!(
            reopened.session_marks(&id, &[]),
            vec![SessionMark::Killed]
        );
        assert_eq!(reopened.address_marks(&addr()), vec![AddressMark::Used]);
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        let old_id = SessionId::random();
        let new_id = SessionId::random();

        store.set_session_mark(&old_id, SessionMark::Closed);
        store.set_session_mark(&new_id, SessionMark::Closed);
        // age the first entry artificially
        {
            let mut inner = store.lock();
            inner
                .data
                .session_marks
                .get_mut(&old_id.to_string())
                .unwrap()
                .touched = 1000;
        }

        let now = Timestamp::now();
        let removed = store.sweep(now, 3600, 7200);
        assert_eq!(removed, 1);
        assert!(store.session_marks(&old_id, &[]).is_empty());
        assert_eq!(
            store.session_marks(&new_id, &[]),
            vec![SessionMark::Closed]
        );
    }

    #[tokio::test]
    async fn debounced_flush_reaches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faucet-store.json");
        let store = Arc::new(FaucetStore::open(&path, Duration::from_millis(10)).unwrap());

        store.set_address_mark(&addr(), AddressMark::Used);
        assert!(!path.exists());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(path.exists());
    }
}
