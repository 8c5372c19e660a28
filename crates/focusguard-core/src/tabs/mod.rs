//! Keeps open tabs consistent with the blocking state.
//!
//! A blocked tab is muted and covered by the overlay. When blocking ends,
//! only tabs this module muted are unmuted again; the ids are persisted so
//! that survives a process restart.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::blocking::BlockingConfig;
use crate::error::{Result, TabError};
use crate::host::{Clock, Overlay, Tab, TabHost, TabId};
use crate::sites::BlockedSites;
use crate::storage::ConfigStore;

/// URL schemes the host never lets us script.
const RESTRICTED_PREFIXES: [&str; 9] = [
    "chrome://",
    "chrome-extension://",
    "moz-extension://",
    "edge://",
    "brave://",
    "about:",
    "view-source:",
    "devtools://",
    "chrome-search://",
];

pub fn is_restricted(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    RESTRICTED_PREFIXES.iter().any(|p| lower.starts_with(p))
        || lower.starts_with("https://chrome.google.com/webstore")
        || lower.starts_with("https://chromewebstore.google.com")
}

/// What a resync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum ResyncOutcome {
    /// Another resync was already running.
    Skipped,
    Synced { blocked: usize, released: usize },
}

/// What happened to a single tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabAction {
    Blocked,
    /// Overlay injection was refused; the tab was reloaded instead.
    Reloaded,
    Released,
    /// Nothing to do: no URL or a restricted page the engine never muted,
    /// or the tab vanished.
    Skipped,
}

#[derive(Debug, Clone)]
struct Rules {
    enabled: bool,
    sites: BlockedSites,
    end_time: Option<i64>,
}

impl From<&BlockingConfig> for Rules {
    fn from(cfg: &BlockingConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            sites: cfg.blocked_sites.clone(),
            end_time: if cfg.enabled { cfg.end_time } else { None },
        }
    }
}

struct CachedRules {
    rules: Rules,
    fetched_at_ms: i64,
}

/// Clears the busy flag when a resync ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct TabSynchronizer {
    tabs: Arc<dyn TabHost>,
    store: Arc<ConfigStore>,
    clock: Arc<dyn Clock>,
    cache: Mutex<Option<CachedRules>>,
    cache_ttl_ms: i64,
    busy: AtomicBool,
    /// Serializes read-modify-write of the persisted muted set.
    muted_lock: Mutex<()>,
}

impl TabSynchronizer {
    pub fn new(tabs: Arc<dyn TabHost>, store: Arc<ConfigStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            tabs,
            store,
            clock,
            cache: Mutex::new(None),
            cache_ttl_ms: 3_000,
            busy: AtomicBool::new(false),
            muted_lock: Mutex::new(()),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self
    }

    pub fn tab_host(&self) -> &Arc<dyn TabHost> {
        &self.tabs
    }

    /// Bring every open tab in line with the stored config. A resync that
    /// finds another one in flight returns [`ResyncOutcome::Skipped`].
    pub fn resync(&self) -> Result<ResyncOutcome> {
        if self.busy.swap(true, Ordering::AcqRel) {
            debug!("resync already running, dropping request");
            return Ok(ResyncOutcome::Skipped);
        }
        let _busy = BusyGuard(&self.busy);

        let config = self.store.load_blocking()?;
        let rules = Rules::from(&config);
        self.fill_cache(rules.clone());

        let open = self.tabs.query()?;
        let _muted_guard = self.lock_muted();
        let mut muted = self.load_muted();
        let before = muted.clone();

        // Ids of tabs closed while we were not listening.
        let open_ids: BTreeSet<TabId> = open.iter().map(|t| t.id).collect();
        muted.retain(|id| open_ids.contains(id));

        let (mut blocked, mut released) = (0, 0);
        for tab in &open {
            match self.apply(tab, &rules, &mut muted) {
                TabAction::Blocked | TabAction::Reloaded => blocked += 1,
                TabAction::Released => released += 1,
                TabAction::Skipped => {}
            }
        }

        if muted != before {
            self.save_muted(&muted);
        }
        debug!(tabs = open.len(), blocked, released, "tabs resynced");
        Ok(ResyncOutcome::Synced { blocked, released })
    }

    /// Handle one tab that finished loading, using the cached rules.
    pub fn on_navigation(&self, tab: &Tab) -> Result<TabAction> {
        let rules = self.rules()?;
        let _muted_guard = self.lock_muted();
        let mut muted = self.load_muted();
        let before = muted.clone();
        let action = self.apply(tab, &rules, &mut muted);
        if muted != before {
            self.save_muted(&muted);
        }
        Ok(action)
    }

    /// Forget a closed tab.
    pub fn on_tab_closed(&self, id: TabId) {
        let _muted_guard = self.lock_muted();
        let mut muted = self.load_muted();
        if muted.remove(&id) {
            self.save_muted(&muted);
        }
    }

    /// Drop the cached rules; the next navigation reads storage.
    pub fn invalidate_cache(&self) {
        *self.lock_cache() = None;
    }

    fn rules(&self) -> Result<Rules> {
        let now = self.clock.now_ms();
        if let Some(cached) = self.lock_cache().as_ref() {
            let age = now - cached.fetched_at_ms;
            if (0..self.cache_ttl_ms).contains(&age) {
                return Ok(cached.rules.clone());
            }
        }
        let rules = Rules::from(&self.store.load_blocking()?);
        self.fill_cache(rules.clone());
        Ok(rules)
    }

    fn fill_cache(&self, rules: Rules) {
        *self.lock_cache() = Some(CachedRules {
            rules,
            fetched_at_ms: self.clock.now_ms(),
        });
    }

    fn apply(&self, tab: &Tab, rules: &Rules, muted: &mut BTreeSet<TabId>) -> TabAction {
        // No overlay can reach these pages, but a mute we set still has to
        // be lifted.
        let Some(url) = tab.url.as_deref().filter(|u| !is_restricted(u)) else {
            return self.unmute(tab.id, muted);
        };

        let matched = if rules.enabled {
            rules.sites.first_match(url)
        } else {
            None
        };

        match matched {
            Some(pattern) => {
                let overlay = Overlay {
                    site: pattern.display_site(),
                    end_time: rules.end_time,
                };
                self.block(tab, &overlay, muted)
            }
            None => self.release(tab.id, muted),
        }
    }

    fn block(&self, tab: &Tab, overlay: &Overlay, muted: &mut BTreeSet<TabId>) -> TabAction {
        // A tab the user muted themselves is left for them to unmute.
        if !tab.muted {
            match self.tabs.set_muted(tab.id, true) {
                Ok(()) => {
                    muted.insert(tab.id);
                }
                Err(TabError::Gone(_)) => {
                    muted.remove(&tab.id);
                    return TabAction::Skipped;
                }
                Err(e) => warn!(tab = %tab.id, error = %e, "failed to mute tab"),
            }
        }

        match self.tabs.inject_overlay(tab.id, overlay) {
            Ok(()) => TabAction::Blocked,
            Err(TabError::InjectionDenied { reason, .. }) => {
                debug!(tab = %tab.id, reason, "overlay refused, reloading");
                match self.tabs.reload(tab.id) {
                    Ok(()) => TabAction::Reloaded,
                    Err(e) => {
                        warn!(tab = %tab.id, error = %e, "reload failed");
                        TabAction::Skipped
                    }
                }
            }
            Err(TabError::Gone(_)) => {
                muted.remove(&tab.id);
                TabAction::Skipped
            }
            Err(e) => {
                warn!(tab = %tab.id, error = %e, "overlay injection failed");
                TabAction::Skipped
            }
        }
    }

    fn release(&self, id: TabId, muted: &mut BTreeSet<TabId>) -> TabAction {
        self.unmute(id, muted);
        match self.tabs.remove_overlay(id) {
            Ok(()) => TabAction::Released,
            Err(e) => {
                debug!(tab = %id, error = %e, "overlay removal skipped");
                TabAction::Skipped
            }
        }
    }

    /// Lift a mute this engine set. Tabs it never muted are left alone.
    fn unmute(&self, id: TabId, muted: &mut BTreeSet<TabId>) -> TabAction {
        if !muted.remove(&id) {
            return TabAction::Skipped;
        }
        if let Err(e) = self.tabs.set_muted(id, false) {
            debug!(tab = %id, error = %e, "unmute skipped");
        }
        TabAction::Released
    }

    fn load_muted(&self) -> BTreeSet<TabId> {
        self.store.load_muted().unwrap_or_else(|e| {
            warn!(error = %e, "muted tab list unreadable");
            BTreeSet::new()
        })
    }

    fn save_muted(&self, muted: &BTreeSet<TabId>) {
        if let Err(e) = self.store.save_muted(muted) {
            warn!(error = %e, "failed to persist muted tab list");
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, Option<CachedRules>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_muted(&self) -> MutexGuard<'_, ()> {
        self.muted_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocking::BlockingConfig;
    use crate::host::{ManualClock, MemoryTabs};
    use crate::sites::Pattern;
    use crate::storage::{MemoryArea, Tier};

    const T0: i64 = 1_700_000_000_000;

    struct Fixture {
        tabs: Arc<MemoryTabs>,
        store: Arc<ConfigStore>,
        clock: Arc<ManualClock>,
        sync: TabSynchronizer,
    }

    fn fixture() -> Fixture {
        let tabs = Arc::new(MemoryTabs::new());
        let store = Arc::new(ConfigStore::new(
            Arc::new(MemoryArea::new(Tier::Synced)),
            Arc::new(MemoryArea::new(Tier::Local)),
        ));
        let clock = Arc::new(ManualClock::new(T0));
        let sync = TabSynchronizer::new(tabs.clone(), store.clone(), clock.clone());
        Fixture {
            tabs,
            store,
            clock,
            sync,
        }
    }

    fn save(store: &ConfigStore, enabled: bool, sites: &[&str]) {
        let cfg = BlockingConfig {
            enabled,
            blocked_sites: sites.iter().map(|s| Pattern::parse(s)).collect(),
            end_time: enabled.then_some(T0 + 60_000),
            ..Default::default()
        };
        store.save_blocking(&cfg).unwrap();
    }

    #[test]
    fn resync_blocks_matching_and_releases_on_disable() {
        let f = fixture();
        let yt = f.tabs.open(1, "https://www.youtube.com/watch?v=1");
        let docs = f.tabs.open(2, "https://docs.rs");
        save(&f.store, true, &["*youtube.com"]);

        let outcome = f.sync.resync().unwrap();
        assert_eq!(outcome, ResyncOutcome::Synced { blocked: 1, released: 1 });
        assert!(f.tabs.is_muted(yt));
        assert!(!f.tabs.is_muted(docs));
        assert_eq!(
            f.tabs.overlay(yt),
            Some(Overlay { site: "youtube.com".into(), end_time: Some(T0 + 60_000) })
        );
        assert!(f.store.load_muted().unwrap().contains(&yt));

        save(&f.store, false, &["*youtube.com"]);
        f.sync.resync().unwrap();
        assert!(!f.tabs.is_muted(yt));
        assert!(f.tabs.overlay(yt).is_none());
        assert!(f.store.load_muted().unwrap().is_empty());
    }

    #[test]
    fn user_muted_tab_stays_muted() {
        let f = fixture();
        let id = f.tabs.open(1, "https://reddit.com");
        f.tabs.user_mute(id);
        save(&f.store, true, &["*reddit.com"]);

        f.sync.resync().unwrap();
        assert!(f.store.load_muted().unwrap().is_empty());

        save(&f.store, false, &["*reddit.com"]);
        f.sync.resync().unwrap();
        assert!(f.tabs.is_muted(id));
    }

    #[test]
    fn denied_injection_falls_back_to_reload() {
        let f = fixture();
        let id = f.tabs.open(1, "https://x.com/home");
        f.tabs.deny_injection(id);
        save(&f.store, true, &["*x.com"]);

        f.sync.resync().unwrap();
        assert_eq!(f.tabs.reloads(), vec![id]);
    }

    #[test]
    fn restricted_pages_are_untouched() {
        let f = fixture();
        let id = f.tabs.open(1, "chrome://extensions/?q=youtube.com");
        save(&f.store, true, &["*youtube.com"]);

        assert_eq!(
            f.sync.resync().unwrap(),
            ResyncOutcome::Synced { blocked: 0, released: 0 }
        );
        assert!(!f.tabs.is_muted(id));
    }

    #[test]
    fn muted_tab_moving_to_restricted_page_is_unmuted() {
        let f = fixture();
        save(&f.store, true, &["*youtube.com"]);
        let id = f.tabs.open(1, "https://youtube.com/");
        f.sync.resync().unwrap();
        assert!(f.tabs.is_muted(id));

        f.tabs.navigate(id, "chrome://newtab/");
        let tab = f.tabs.tab(id).unwrap();
        assert_eq!(f.sync.on_navigation(&tab).unwrap(), TabAction::Released);
        assert!(!f.tabs.is_muted(id));
        assert!(f.store.load_muted().unwrap().is_empty());
    }

    #[test]
    fn navigation_uses_cache_until_ttl() {
        let f = fixture();
        save(&f.store, true, &["*youtube.com"]);
        f.sync.resync().unwrap();

        // Turned off behind the cache's back.
        save(&f.store, false, &["*youtube.com"]);
        let id = f.tabs.open(5, "https://youtube.com");
        let tab = f.tabs.tab(id).unwrap();
        assert_eq!(f.sync.on_navigation(&tab).unwrap(), TabAction::Blocked);

        f.clock.advance_ms(3_000);
        let tab = f.tabs.tab(id).unwrap();
        assert_eq!(f.sync.on_navigation(&tab).unwrap(), TabAction::Released);
        assert!(!f.tabs.is_muted(id));
    }

    #[test]
    fn invalidate_forces_fresh_read() {
        let f = fixture();
        save(&f.store, true, &["*youtube.com"]);
        f.sync.resync().unwrap();
        save(&f.store, false, &[]);
        f.sync.invalidate_cache();

        let id = f.tabs.open(5, "https://youtube.com");
        let tab = f.tabs.tab(id).unwrap();
        assert_eq!(f.sync.on_navigation(&tab).unwrap(), TabAction::Released);
    }

    #[test]
    fn closed_tab_is_forgotten() {
        let f = fixture();
        let id = f.tabs.open(1, "https://youtube.com");
        save(&f.store, true, &["*youtube.com"]);
        f.sync.resync().unwrap();

        f.tabs.close(id);
        f.sync.on_tab_closed(id);
        assert!(f.store.load_muted().unwrap().is_empty());
    }

    #[test]
    fn concurrent_resync_is_dropped() {
        let f = fixture();
        f.sync.busy.store(true, Ordering::SeqCst);
        assert_eq!(f.sync.resync().unwrap(), ResyncOutcome::Skipped);
        f.sync.busy.store(false, Ordering::SeqCst);
        assert!(matches!(f.sync.resync().unwrap(), ResyncOutcome::Synced { .. }));
    }

    #[test]
    fn restricted_detection() {
        assert!(is_restricted("chrome://settings"));
        assert!(is_restricted("about:blank"));
        assert!(is_restricted("chrome-extension://abc/popup.html"));
        assert!(!is_restricted("https://example.com/about:me"));
    }
}
