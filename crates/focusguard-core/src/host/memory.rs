//! In-process host implementations.
//!
//! Used by the CLI (which has no browser attached) and by tests, which poke
//! at the recorded state to assert what the engine did.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use super::{AlarmHost, AlarmSchedule, Clock, Overlay, Tab, TabHost, TabId, TimerNotice};
use crate::error::TabError;

/// Real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.now_ms.fetch_add(minutes * 60_000, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: i64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct TabsState {
    tabs: BTreeMap<TabId, Tab>,
    overlays: BTreeMap<TabId, Overlay>,
    denied: BTreeSet<TabId>,
    reloads: Vec<TabId>,
    broadcasts: Vec<TimerNotice>,
}

/// Tab host backed by a map of fake tabs.
#[derive(Debug, Default)]
pub struct MemoryTabs {
    state: Mutex<TabsState>,
}

impl MemoryTabs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, id: i64, url: &str) -> TabId {
        let id = TabId(id);
        let mut state = self.lock();
        state.tabs.insert(
            id,
            Tab {
                id,
                url: Some(url.to_string()),
                muted: false,
            },
        );
        id
    }

    /// Navigate an existing tab; the overlay does not survive navigation.
    pub fn navigate(&self, id: TabId, url: &str) {
        let mut state = self.lock();
        if let Some(tab) = state.tabs.get_mut(&id) {
            tab.url = Some(url.to_string());
        }
        state.overlays.remove(&id);
    }

    pub fn close(&self, id: TabId) {
        let mut state = self.lock();
        state.tabs.remove(&id);
        state.overlays.remove(&id);
    }

    /// Mute a tab the way the user would, outside the engine.
    pub fn user_mute(&self, id: TabId) {
        if let Some(tab) = self.lock().tabs.get_mut(&id) {
            tab.muted = true;
        }
    }

    /// Make script injection fail for this tab.
    pub fn deny_injection(&self, id: TabId) {
        self.lock().denied.insert(id);
    }

    /// Snapshot of one tab, as a navigation event would carry it.
    pub fn tab(&self, id: TabId) -> Option<Tab> {
        self.lock().tabs.get(&id).cloned()
    }

    pub fn is_muted(&self, id: TabId) -> bool {
        self.lock().tabs.get(&id).map(|t| t.muted).unwrap_or(false)
    }

    pub fn overlay(&self, id: TabId) -> Option<Overlay> {
        self.lock().overlays.get(&id).cloned()
    }

    pub fn reloads(&self) -> Vec<TabId> {
        self.lock().reloads.clone()
    }

    pub fn broadcasts(&self) -> Vec<TimerNotice> {
        self.lock().broadcasts.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TabsState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TabHost for MemoryTabs {
    fn query(&self) -> Result<Vec<Tab>, TabError> {
        Ok(self.lock().tabs.values().cloned().collect())
    }

    fn set_muted(&self, tab: TabId, muted: bool) -> Result<(), TabError> {
        let mut state = self.lock();
        let entry = state.tabs.get_mut(&tab).ok_or(TabError::Gone(tab))?;
        entry.muted = muted;
        Ok(())
    }

    fn inject_overlay(&self, tab: TabId, overlay: &Overlay) -> Result<(), TabError> {
        let mut state = self.lock();
        if !state.tabs.contains_key(&tab) {
            return Err(TabError::Gone(tab));
        }
        if state.denied.contains(&tab) {
            return Err(TabError::InjectionDenied {
                tab,
                reason: "restricted page".into(),
            });
        }
        state.overlays.insert(tab, overlay.clone());
        Ok(())
    }

    fn remove_overlay(&self, tab: TabId) -> Result<(), TabError> {
        let mut state = self.lock();
        if !state.tabs.contains_key(&tab) {
            return Err(TabError::Gone(tab));
        }
        state.overlays.remove(&tab);
        Ok(())
    }

    fn reload(&self, tab: TabId) -> Result<(), TabError> {
        let mut state = self.lock();
        if !state.tabs.contains_key(&tab) {
            return Err(TabError::Gone(tab));
        }
        state.reloads.push(tab);
        Ok(())
    }

    fn broadcast(&self, notice: &TimerNotice) {
        self.lock().broadcasts.push(*notice);
    }
}

/// Alarm host that just remembers what was scheduled.
#[derive(Debug, Default)]
pub struct MemoryAlarms {
    alarms: Mutex<BTreeMap<String, AlarmSchedule>>,
}

impl MemoryAlarms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<AlarmSchedule> {
        self.lock().get(name).copied()
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, AlarmSchedule>> {
        self.alarms.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AlarmHost for MemoryAlarms {
    fn create(&self, name: &str, schedule: AlarmSchedule) {
        self.lock().insert(name.to_string(), schedule);
    }

    fn clear(&self, name: &str) -> bool {
        self.lock().remove(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        clock.advance_minutes(2);
        assert_eq!(clock.now_ms(), 121_000);
        clock.set(5);
        assert_eq!(clock.now_ms(), 5);
    }

    #[test]
    fn denied_tab_rejects_overlay() {
        let tabs = MemoryTabs::new();
        let id = tabs.open(1, "chrome://settings");
        tabs.deny_injection(id);
        let overlay = Overlay {
            site: "x".into(),
            end_time: None,
        };
        assert!(matches!(
            tabs.inject_overlay(id, &overlay),
            Err(TabError::InjectionDenied { .. })
        ));
        assert!(tabs.overlay(id).is_none());
    }

    #[test]
    fn closed_tab_is_gone() {
        let tabs = MemoryTabs::new();
        let id = tabs.open(7, "https://example.com");
        tabs.close(id);
        assert_eq!(tabs.set_muted(id, true), Err(TabError::Gone(id)));
    }

    #[test]
    fn alarms_replace_by_name() {
        let alarms = MemoryAlarms::new();
        let first = AlarmSchedule {
            when_ms: Some(1),
            period_minutes: None,
        };
        let second = AlarmSchedule {
            when_ms: Some(2),
            period_minutes: Some(1),
        };
        alarms.create("a", first);
        alarms.create("a", second);
        assert_eq!(alarms.get("a"), Some(second));
        assert!(alarms.clear("a"));
        assert!(!alarms.clear("a"));
    }
}
