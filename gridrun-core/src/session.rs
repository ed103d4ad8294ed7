//! TTL session store
//!
//! An in-memory map of opaque session tokens to payloads with automatic
//! expiry. This store is deliberately transient: sessions are short-lived
//! interactive runs, not durable jobs, and nothing survives a process
//! restart.
//!
//! Expiry timers are detached background tasks. Each stored entry carries a
//! generation number; a timer only deletes the entry whose generation it was
//! armed for, so a cleared-and-resaved session id is never swept by a stale
//! timer and explicit `clear` needs no timer handle bookkeeping. Lookups also
//! check `expires_at` directly, so an expired-but-not-yet-swept entry is
//! indistinguishable from an absent one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};

struct Entry<T> {
    payload: T,
    created_at_ms: u64,
    expires_at: Instant,
    generation: u64,
}

/// In-memory session map with TTL-based auto-expiry.
///
/// Cloning shares the underlying map; all operations are safe to call from
/// multiple concurrently active runs.
pub struct SessionStore<T> {
    entries: Arc<Mutex<HashMap<String, Entry<T>>>>,
    generation: Arc<AtomicU64>,
    id_counter: Arc<AtomicU64>,
}

impl<T> Clone for SessionStore<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            generation: Arc::clone(&self.generation),
            id_counter: Arc::clone(&self.id_counter),
        }
    }
}

impl<T> Default for SessionStore<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SessionStore<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
            id_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Generate a unique session token
    pub fn generate_id(&self) -> String {
        let ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let n = self.id_counter.fetch_add(1, Ordering::Relaxed);
        format!("sess_{:x}_{:x}", ms, n)
    }

    /// Store a payload under `session_id` (generated when `None`) and arm an
    /// expiry timer that deletes the entry after `ttl_ms` with no further
    /// caller action.
    ///
    /// `ttl_ms <= 0` means "expire immediately": any existing entry is
    /// cleared and nothing is stored. Re-saving an existing id replaces the
    /// payload but preserves its original `created_at` stamp.
    pub fn save(&self, session_id: Option<String>, payload: T, ttl_ms: i64) -> String {
        let id = session_id.unwrap_or_else(|| self.generate_id());

        if ttl_ms <= 0 {
            self.clear(&id);
            return id;
        }

        let gen = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let expires_at = Instant::now() + Duration::from_millis(ttl_ms as u64);
        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        {
            let mut entries = self.entries.lock().unwrap();
            let created_at_ms = entries.get(&id).map(|e| e.created_at_ms).unwrap_or(now_ms);
            entries.insert(
                id.clone(),
                Entry { payload, created_at_ms, expires_at, generation: gen },
            );
        }

        self.arm_timer(id.clone(), gen, Duration::from_millis(ttl_ms as u64));
        id
    }

    /// Look up a payload. Expired and absent entries are indistinguishable.
    pub fn get(&self, session_id: &str) -> Option<T> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(session_id) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.payload.clone()),
            Some(_) => {
                entries.remove(session_id);
                None
            }
            None => None,
        }
    }

    /// Remove a payload, consuming it. Single-use semantics for
    /// continuation-style entries.
    pub fn take(&self, session_id: &str) -> Option<T> {
        let mut entries = self.entries.lock().unwrap();
        match entries.remove(session_id) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.payload),
            _ => None,
        }
    }

    /// Remove an entry. Idempotent; any pending expiry timer becomes a no-op.
    pub fn clear(&self, session_id: &str) {
        self.entries.lock().unwrap().remove(session_id);
    }

    /// Merge fields into an existing payload via `mutate`. Never touches the
    /// session id or `created_at`, and does not renew the expiry; pass
    /// `new_ttl_ms` to explicitly re-arm it.
    ///
    /// Returns false when the session is absent or already expired.
    pub fn update(
        &self,
        session_id: &str,
        new_ttl_ms: Option<i64>,
        mutate: impl FnOnce(&mut T),
    ) -> bool {
        let rearm = {
            let mut entries = self.entries.lock().unwrap();
            let entry = match entries.get_mut(session_id) {
                Some(entry) if entry.expires_at > Instant::now() => entry,
                _ => return false,
            };

            mutate(&mut entry.payload);

            match new_ttl_ms {
                Some(ttl_ms) if ttl_ms > 0 => {
                    let gen = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                    entry.generation = gen;
                    entry.expires_at = Instant::now() + Duration::from_millis(ttl_ms as u64);
                    Some((gen, Duration::from_millis(ttl_ms as u64)))
                }
                Some(_) => {
                    // explicit non-positive TTL: expire immediately
                    entries.remove(session_id);
                    return true;
                }
                None => None,
            }
        };

        if let Some((gen, ttl)) = rearm {
            self.arm_timer(session_id.to_string(), gen, ttl);
        }
        true
    }

    /// Renew the expiry of an existing entry without changing its payload
    pub fn extend(&self, session_id: &str, ttl_ms: i64) -> bool {
        self.update(session_id, Some(ttl_ms), |_| {})
    }

    /// Check whether a live entry exists for `session_id`
    pub fn has(&self, session_id: &str) -> bool {
        self.get(session_id).is_some()
    }

    /// Number of stored (possibly not yet swept) entries
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unix-millisecond creation stamp of a live entry
    pub fn created_at_ms(&self, session_id: &str) -> Option<u64> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(session_id)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.created_at_ms)
    }

    fn arm_timer(&self, session_id: String, gen: u64, ttl: Duration) {
        let entries = Arc::clone(&self.entries);
        // Fire-and-forget sweep; must never keep the process alive on its
        // own, and must be a no-op when the entry was cleared or re-saved.
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut entries = entries.lock().unwrap();
            if entries.get(&session_id).map(|e| e.generation) == Some(gen) {
                entries.remove(&session_id);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_save_and_get_before_expiry() {
        let store: SessionStore<String> = SessionStore::new();
        let id = store.save(None, "payload".to_string(), 5000);

        tokio::time::sleep(Duration::from_millis(4000)).await;
        assert_eq!(store.get(&id).as_deref(), Some("payload"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_absent_after_ttl() {
        let store: SessionStore<String> = SessionStore::new();
        let id = store.save(None, "payload".to_string(), 5000);

        tokio::time::sleep(Duration::from_millis(5001)).await;
        assert_eq!(store.get(&id), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_is_never_stored() {
        let store: SessionStore<u32> = SessionStore::new();
        let id = store.save(None, 7, 0);
        assert_eq!(store.get(&id), None);

        let id = store.save(None, 7, -100);
        assert_eq!(store.get(&id), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_clears_existing_entry() {
        let store: SessionStore<u32> = SessionStore::new();
        let id = store.save(Some("s1".into()), 1, 60_000);
        assert!(store.has(&id));

        store.save(Some("s1".into()), 2, 0);
        assert_eq!(store.get("s1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_lookup_returns_none() {
        let store: SessionStore<u32> = SessionStore::new();
        assert_eq!(store.get("nope"), None);
        store.clear("nope"); // idempotent, no panic
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_pending_timer() {
        let store: SessionStore<u32> = SessionStore::new();
        let id = store.save(Some("s1".into()), 1, 1000);
        store.clear(&id);

        // re-save under the same id with a longer TTL; the first timer
        // firing must not sweep the new entry
        store.save(Some("s1".into()), 2, 10_000);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.get("s1"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_merges_without_renewing_ttl() {
        let store: SessionStore<Vec<u32>> = SessionStore::new();
        let id = store.save(None, vec![1], 2000);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(store.update(&id, None, |v| v.push(2)));
        assert_eq!(store.get(&id), Some(vec![1, 2]));

        // original expiry still applies
        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(store.get(&id), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_with_new_ttl_renews_expiry() {
        let store: SessionStore<u32> = SessionStore::new();
        let id = store.save(None, 1, 1000);

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(store.update(&id, Some(5000), |v| *v = 2));

        tokio::time::sleep(Duration::from_millis(4000)).await;
        assert_eq!(store.get(&id), Some(2));

        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(store.get(&id), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_preserves_created_at() {
        let store: SessionStore<u32> = SessionStore::new();
        let id = store.save(None, 1, 10_000);
        let created = store.created_at_ms(&id).unwrap();

        store.update(&id, Some(20_000), |v| *v = 2);
        assert_eq!(store.created_at_ms(&id), Some(created));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_absent_returns_false() {
        let store: SessionStore<u32> = SessionStore::new();
        assert!(!store.update("nope", None, |_| {}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_is_single_use() {
        let store: SessionStore<u32> = SessionStore::new();
        let id = store.save(None, 9, 5000);

        assert_eq!(store.take(&id), Some(9));
        assert_eq!(store.take(&id), None);
        assert_eq!(store.get(&id), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_keeps_session_alive() {
        let store: SessionStore<u32> = SessionStore::new();
        let id = store.save(None, 1, 1000);

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(store.extend(&id, 2000));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.get(&id), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_sessions() {
        let store: SessionStore<u32> = SessionStore::new();
        let a = store.save(None, 1, 1000);
        let b = store.save(None, 2, 10_000);
        assert_ne!(a, b);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.get(&a), None);
        assert_eq!(store.get(&b), Some(2));
    }
}
