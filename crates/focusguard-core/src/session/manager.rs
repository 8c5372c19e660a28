//! The session state machine.
//!
//! Every transition runs under one async lock and reads its inputs from
//! storage, so a restarted process picks up exactly where the last one
//! stopped. Methods suffixed `_locked` expect the caller to hold that lock.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::accountant::{self, Limits};
use super::expiry::{ExpiryScheduler, HEARTBEAT_ALARM, TIMER_ALARM};
use super::record::{SessionRecord, SessionState};
use crate::blocking::{BlockingConfig, BlockingDuration};
use crate::error::{CoreError, Result, ValidationError};
use crate::events::{Command, HostEvent, IdleState};
use crate::host::{Clock, Host};
use crate::sites::Pattern;
use crate::stats::{local_date, LedgerWriter, StatsLedger, StatsSummary};
use crate::storage::keys::{is_blocking_key, BLOCKING_KEYS};
use crate::storage::transfer::{self, ExportFile, ImportSummary};
use crate::storage::{ConfigStore, EngineConfig};
use crate::tabs::{ResyncOutcome, TabSynchronizer};

/// Tolerance between the in-process timer and the wall clock.
const EXPIRY_SLACK_MS: i64 = 1_000;

/// Drives the session through host events and user commands.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<ConfigStore>,
    clock: Arc<dyn Clock>,
    ledger: LedgerWriter,
    expiry: ExpiryScheduler,
    tabs: TabSynchronizer,
    limits: Limits,
    session: Mutex<()>,
}

impl SessionManager {
    pub fn new(store: Arc<ConfigStore>, host: Host, config: &EngineConfig) -> Self {
        let ledger = LedgerWriter::new(store.clone()).with_limits(
            config.session.session_ceiling_minutes,
            config.stats.retention_days,
        );
        let expiry = ExpiryScheduler::new(host.alarms).with_periods(
            config.debounce(),
            config.expiry.check_period_minutes,
            config.session.heartbeat_period_minutes,
        );
        let tabs = TabSynchronizer::new(host.tabs, store.clone(), host.clock.clone())
            .with_cache_ttl(config.cache_ttl());

        Self {
            inner: Arc::new(Inner {
                store,
                clock: host.clock,
                ledger,
                expiry,
                tabs,
                limits: config.limits(),
                session: Mutex::new(()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.inner.store
    }

    pub fn tabs(&self) -> &TabSynchronizer {
        &self.inner.tabs
    }

    pub fn expiry(&self) -> &ExpiryScheduler {
        &self.inner.expiry
    }

    fn now(&self) -> i64 {
        self.inner.clock.now_ms()
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Begin a fresh session, finalizing whatever was left over.
    pub async fn start(&self) -> Result<()> {
        let _session = self.inner.session.lock().await;
        self.start_locked(self.now()).await
    }

    async fn start_locked(&self, now: i64) -> Result<()> {
        if !self.inner.store.load_session()?.is_empty() {
            self.finalize_locked(now).await?;
        }
        self.inner.store.save_session(&SessionRecord::running(now, 0))?;
        debug!(start = now, "session started");
        Ok(())
    }

    /// Pause a running session, carrying its minutes up to the last
    /// heartbeat. Returns whether anything changed.
    pub async fn pause(&self) -> Result<bool> {
        let _session = self.inner.session.lock().await;
        let now = self.now();
        if !self.inner.store.load_blocking()?.enabled {
            return Ok(false);
        }
        let record = self.inner.store.load_session()?;
        if record.state() != SessionState::Running {
            return Ok(false);
        }

        let end = record.last_heartbeat.unwrap_or(now);
        let carried = accountant::elapsed_until(&record, end, &self.inner.limits);
        self.inner.store.save_session(&SessionRecord {
            start_time: None,
            last_heartbeat: record.last_heartbeat,
            accumulated_minutes: carried,
            was_idle: true,
        })?;
        info!(carried, "session paused");
        Ok(true)
    }

    /// Resume a paused session. Returns whether anything changed.
    pub async fn resume(&self) -> Result<bool> {
        let _session = self.inner.session.lock().await;
        let now = self.now();
        if !self.inner.store.load_blocking()?.enabled {
            return Ok(false);
        }
        let record = self.inner.store.load_session()?;
        if record.state() != SessionState::Paused {
            return Ok(false);
        }

        self.inner
            .store
            .save_session(&SessionRecord::running(now, record.accumulated_minutes))?;
        info!(carried = record.accumulated_minutes, "session resumed");
        Ok(true)
    }

    /// End the session and commit its minutes. Returns the minutes
    /// recorded; a second call finds nothing and returns 0.
    pub async fn finalize(&self) -> Result<u64> {
        let _session = self.inner.session.lock().await;
        self.finalize_locked(self.now()).await
    }

    async fn finalize_locked(&self, now: i64) -> Result<u64> {
        let record = self.inner.store.load_session()?;
        if record.is_empty() {
            return Ok(0);
        }

        let elapsed = accountant::elapsed(&record, now, &self.inner.limits);
        let end = match record.start_time {
            Some(_) => elapsed.effective_end,
            None => record.last_heartbeat.map_or(now, |hb| hb.min(now)),
        };

        // Cleared before the commit: a failed commit loses minutes, never
        // double-counts them.
        self.inner.store.save_session(&SessionRecord::default())?;

        match self.inner.ledger.commit(elapsed.minutes, end, now).await {
            Ok(recorded) => {
                info!(minutes = recorded, gap = elapsed.gap, "session finalized");
                Ok(recorded)
            }
            Err(e) => {
                warn!(error = %e, minutes = elapsed.minutes, "failed to record focus minutes");
                Ok(0)
            }
        }
    }

    /// Roll a running session over once it reaches the ceiling, without
    /// touching the blocking state.
    pub async fn check_session_cap(&self) -> Result<bool> {
        let _session = self.inner.session.lock().await;
        self.cap_check_locked(self.now()).await
    }

    async fn cap_check_locked(&self, now: i64) -> Result<bool> {
        let record = self.inner.store.load_session()?;
        if record.state() != SessionState::Running {
            return Ok(false);
        }
        let minutes = accountant::elapsed(&record, now, &self.inner.limits).minutes;
        if minutes < self.inner.limits.ceiling_minutes {
            return Ok(false);
        }

        info!(minutes, "session reached the ceiling, rolling over");
        self.finalize_locked(now).await?;
        self.inner.store.save_session(&SessionRecord::running(now, 0))?;
        Ok(true)
    }

    /// Periodic liveness tick.
    pub async fn heartbeat(&self) -> Result<()> {
        let _session = self.inner.session.lock().await;
        self.heartbeat_locked(self.now()).await
    }

    async fn heartbeat_locked(&self, now: i64) -> Result<()> {
        if !self.inner.store.load_blocking()?.enabled {
            debug!("heartbeat without blocking, clearing the alarm");
            self.inner.expiry.disarm_heartbeat();
            return Ok(());
        }

        let record = self.inner.store.load_session()?;
        match record.state() {
            SessionState::Running if accountant::has_gap(&record, now, &self.inner.limits) => {
                info!(
                    last_heartbeat = record.last_heartbeat,
                    "heartbeat gap, splitting session"
                );
                self.finalize_locked(now).await?;
                self.inner.store.save_session(&SessionRecord::running(now, 0))?;
            }
            SessionState::Off => {
                debug!("blocking on without a session, starting one");
                self.inner.store.save_session(&SessionRecord::running(now, 0))?;
            }
            SessionState::Running | SessionState::Paused => {
                self.inner.store.save_heartbeat(now)?;
            }
        }

        self.cap_check_locked(now).await?;
        Ok(())
    }

    // ── Host events ──────────────────────────────────────────────────

    /// Only a locked screen pauses; plain idleness keeps counting.
    pub async fn on_idle_state(&self, state: IdleState) -> Result<()> {
        match state {
            IdleState::Locked => {
                self.pause().await?;
            }
            IdleState::Active => {
                self.resume().await?;
            }
            IdleState::Idle => debug!("idle without lock, session keeps running"),
        }
        Ok(())
    }

    pub async fn on_alarm(&self, name: &str) -> Result<()> {
        match name {
            TIMER_ALARM => {
                let config = self.inner.store.load_blocking()?;
                if !config.enabled {
                    debug!("timer alarm without a session, clearing it");
                    self.inner.expiry.cancel();
                } else if config.is_expired(self.now() + EXPIRY_SLACK_MS) {
                    self.on_timer_expired().await?;
                } else {
                    self.check_session_cap().await?;
                }
            }
            HEARTBEAT_ALARM => self.heartbeat().await?,
            other => debug!(alarm = other, "ignoring unknown alarm"),
        }
        Ok(())
    }

    /// End a bounded session that reached its end time. Returns whether
    /// this call did the work.
    pub async fn on_timer_expired(&self) -> Result<bool> {
        let _session = self.inner.session.lock().await;
        let now = self.now();
        let config = self.inner.store.load_blocking()?;
        if !config.is_expired(now + EXPIRY_SLACK_MS) {
            debug!("expiry fired for a session that is not due");
            return Ok(false);
        }
        if !self.inner.expiry.claim(now) {
            return Ok(false);
        }
        self.expire_locked(config, now).await?;
        Ok(true)
    }

    async fn expire_locked(&self, config: BlockingConfig, now: i64) -> Result<()> {
        // A process woken long after the end only counts up to the end.
        let at = config.end_time.map_or(now, |end| end.min(now));
        let minutes = self.finalize_locked(at).await?;

        // Re-read: the site list may have changed while the commit waited.
        let config = self.inner.store.load_blocking()?.disabled();
        self.inner.store.save_blocking(&config)?;
        self.disarm();
        self.inner.tabs.invalidate_cache();
        self.resync_tabs();
        self.broadcast(&config);
        info!(minutes, "blocking session expired");
        Ok(())
    }

    /// Bring session, alarms and tabs in line with the stored blocking
    /// config. Safe to call any number of times.
    pub async fn reconcile_config(&self, changed: &[String]) -> Result<()> {
        if !changed.iter().any(|k| is_blocking_key(k)) {
            return Ok(());
        }
        self.inner.tabs.invalidate_cache();

        let _session = self.inner.session.lock().await;
        let now = self.now();
        let config = self.inner.store.load_blocking()?;

        if config.enabled {
            if self.inner.store.load_session()?.is_empty() {
                self.start_locked(now).await?;
            }
            self.inner.expiry.arm_heartbeat();
            match config.end_time {
                Some(end) if now >= end => return self.expire_locked(config, now).await,
                Some(end) => self.arm_expiry(end, now),
                None => self.inner.expiry.cancel(),
            }
        } else {
            if !self.inner.store.load_session()?.is_empty() {
                self.finalize_locked(now).await?;
            }
            self.disarm();
            let latest = self.inner.store.load_blocking()?;
            if !latest.enabled && (latest.end_time.is_some() || latest.duration.is_some()) {
                self.inner.store.save_blocking(&latest.disabled())?;
            }
        }

        self.resync_tabs();
        self.broadcast(&config);
        Ok(())
    }

    /// Reconcile everything after the process (re)started.
    pub async fn on_startup(&self) -> Result<()> {
        let _session = self.inner.session.lock().await;
        let now = self.now();
        let config = self.inner.store.load_blocking()?;

        if !config.enabled {
            if !self.inner.store.load_session()?.is_empty() {
                info!("finalizing session left over from a previous run");
                self.finalize_locked(now).await?;
            }
            self.disarm();
        } else if config.end_time.is_some_and(|end| now >= end) {
            return self.expire_locked(config, now).await;
        } else {
            self.heartbeat_locked(now).await?;
            self.inner.expiry.arm_heartbeat();
            if let Some(end) = config.end_time {
                self.arm_expiry(end, now);
            }
        }

        self.resync_tabs();
        self.broadcast(&config);
        Ok(())
    }

    /// Act on a message from the popup or options page.
    pub async fn apply_command(&self, command: Command) -> Result<()> {
        match command {
            Command::UpdateBlocking {
                enabled,
                end_time,
                duration,
            } => {
                let session = self.inner.session.lock().await;
                let now = self.now();
                let stored = self.inner.store.load_blocking()?;
                let wanted = if enabled {
                    BlockingConfig {
                        enabled: true,
                        end_time: end_time.or_else(|| duration.and_then(|d| d.end_time_from(now))),
                        duration,
                        ..stored.clone()
                    }
                } else {
                    stored.clone().disabled()
                };
                if wanted != stored {
                    self.inner.store.save_blocking(&wanted)?;
                }

                if enabled && !stored.enabled {
                    self.start_locked(now).await?;
                }
                drop(session);
                self.reconcile_config(&BLOCKING_KEYS.map(String::from)).await
            }
            Command::UpdateRules => {
                self.inner.tabs.invalidate_cache();
                self.resync_tabs();
                Ok(())
            }
        }
    }

    /// Dispatch one host event.
    pub async fn handle(&self, event: HostEvent) -> Result<()> {
        match event {
            HostEvent::Started => self.on_startup().await,
            HostEvent::ConfigChanged { tier, keys } => {
                debug!(%tier, ?keys, "config changed");
                self.reconcile_config(&keys).await
            }
            HostEvent::NavigationCompleted(tab) => self.inner.tabs.on_navigation(&tab).map(|_| ()),
            HostEvent::TabClosed(id) => {
                self.inner.tabs.on_tab_closed(id);
                Ok(())
            }
            HostEvent::AlarmFired(name) => self.on_alarm(&name).await,
            HostEvent::IdleStateChanged(state) => self.on_idle_state(state).await,
            HostEvent::Message(command) => self.apply_command(command).await,
        }
    }

    /// Consume host events until every sender is dropped. Errors are
    /// logged; the next event is handled regardless.
    pub async fn run(&self, mut events: mpsc::Receiver<HostEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle(event).await {
                warn!(error = %e, "event handling failed");
            }
        }
        self.inner.expiry.stop_timer();
        debug!("event channel closed, engine stopped");
    }

    // ── User operations ──────────────────────────────────────────────

    /// Switch blocking on (optionally bounded) or off.
    pub async fn set_blocking(
        &self,
        enabled: bool,
        duration: Option<BlockingDuration>,
    ) -> Result<BlockingConfig> {
        self.apply_command(Command::UpdateBlocking {
            enabled,
            end_time: None,
            duration,
        })
        .await?;
        Ok(self.inner.store.load_blocking()?)
    }

    pub async fn add_site(&self, input: &str) -> Result<Pattern> {
        let pattern = Pattern::from_input(input)?;
        self.edit_config(|config| Ok(config.blocked_sites.add(pattern.clone())?))
            .await?;
        info!(site = %pattern, "site added");
        self.apply_command(Command::UpdateRules).await?;
        Ok(pattern)
    }

    /// Remove a site by its stored form or as typed. The list is locked
    /// while blocking is on.
    pub async fn remove_site(&self, input: &str) -> Result<Pattern> {
        let pattern = self
            .edit_config(|config| {
                if config.enabled {
                    return Err(ValidationError::ListLocked.into());
                }
                let stored = Pattern::parse(input);
                let pattern = if config.blocked_sites.contains(&stored) {
                    stored
                } else {
                    Pattern::from_input(input)?
                };
                config.blocked_sites.remove(&pattern)?;
                Ok(pattern)
            })
            .await?;
        info!(site = %pattern, "site removed");
        self.apply_command(Command::UpdateRules).await?;
        Ok(pattern)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn blocking(&self) -> Result<BlockingConfig> {
        Ok(self.inner.store.load_blocking()?)
    }

    /// Milliseconds until a bounded session ends; `None` when unbounded or off.
    pub fn remaining_ms(&self) -> Result<Option<i64>> {
        Ok(self.inner.store.load_blocking()?.remaining_ms(self.now()))
    }

    pub fn session_state(&self) -> Result<SessionState> {
        Ok(self.inner.store.load_session()?.state())
    }

    /// Minutes of the session in progress, as the accountant sees them now.
    pub fn current_minutes(&self) -> Result<u64> {
        let record = self.inner.store.load_session()?;
        Ok(accountant::elapsed(&record, self.now(), &self.inner.limits).minutes)
    }

    pub fn ledger(&self) -> Result<StatsLedger> {
        self.inner.ledger.load()
    }

    pub fn summary(&self) -> Result<StatsSummary> {
        let now = self.now();
        let today = local_date(now)
            .ok_or_else(|| CoreError::Custom(format!("clock out of range: {now}")))?;
        let ledger = self.inner.ledger.load()?;
        Ok(StatsSummary::compute(&ledger, self.current_minutes()?, today))
    }

    // ── Import / export ──────────────────────────────────────────────

    pub fn export(&self) -> Result<ExportFile> {
        let config = self.inner.store.load_blocking()?;
        let ledger = self.inner.ledger.load()?;
        Ok(transfer::export(&config.blocked_sites, Some(&ledger), self.now())?)
    }

    pub async fn import(&self, text: &str) -> Result<ImportSummary> {
        let file = transfer::parse(text)?;

        let sites_added = self
            .edit_config(|config| Ok(file.merge_sites(&mut config.blocked_sites)))
            .await?;
        if sites_added > 0 {
            self.apply_command(Command::UpdateRules).await?;
        }

        let days_raised = if file.stats.is_some() {
            self.inner
                .ledger
                .update(self.now(), |ledger| file.merge_stats(ledger))
                .await?
        } else {
            0
        };

        info!(sites_added, days_raised, "import merged");
        Ok(ImportSummary {
            sites_added,
            days_raised,
        })
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Read-modify-write of the blocking config under the session lock, so
    /// it cannot interleave with expiry or reconciliation. Saves only when
    /// `f` changed something.
    async fn edit_config<R>(
        &self,
        f: impl FnOnce(&mut BlockingConfig) -> Result<R>,
    ) -> Result<R> {
        let _session = self.inner.session.lock().await;
        let mut config = self.inner.store.load_blocking()?;
        let before = config.clone();
        let out = f(&mut config)?;
        if config != before {
            self.inner.store.save_blocking(&config)?;
        }
        Ok(out)
    }

    fn arm_expiry(&self, end_ms: i64, now_ms: i64) {
        let manager = self.clone();
        self.inner.expiry.schedule(end_ms, now_ms, async move {
            if let Err(e) = manager.on_timer_expired().await {
                warn!(error = %e, "expiry handling failed");
            }
        });
    }

    fn disarm(&self) {
        self.inner.expiry.cancel();
        self.inner.expiry.disarm_heartbeat();
    }

    fn resync_tabs(&self) {
        match self.inner.tabs.resync() {
            Ok(ResyncOutcome::Skipped) => debug!("tab resync skipped"),
            Ok(ResyncOutcome::Synced { .. }) => {}
            Err(e) => warn!(error = %e, "tab resync failed"),
        }
    }

    fn broadcast(&self, config: &BlockingConfig) {
        self.inner.tabs.tab_host().broadcast(&config.notice());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{AlarmHost, AlarmSchedule, ManualClock, MemoryAlarms, MemoryTabs};
    use crate::session::accountant::MINUTE_MS;
    use crate::storage::{MemoryArea, Tier};

    const T0: i64 = 1_700_000_000_000;

    struct Fixture {
        manager: SessionManager,
        clock: Arc<ManualClock>,
        alarms: Arc<MemoryAlarms>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(T0));
        let alarms = Arc::new(MemoryAlarms::new());
        let store = Arc::new(ConfigStore::new(
            Arc::new(MemoryArea::new(Tier::Synced)),
            Arc::new(MemoryArea::new(Tier::Local)),
        ));
        let host = Host {
            tabs: Arc::new(MemoryTabs::new()),
            alarms: alarms.clone(),
            clock: clock.clone(),
        };
        Fixture {
            manager: SessionManager::new(store, host, &EngineConfig::default()),
            clock,
            alarms,
        }
    }

    #[tokio::test]
    async fn enabling_starts_a_session_and_arms_heartbeat() {
        let f = fixture();
        f.manager.set_blocking(true, None).await.unwrap();
        assert_eq!(f.manager.session_state().unwrap(), SessionState::Running);
        assert!(f.alarms.get(HEARTBEAT_ALARM).is_some());
        assert!(f.alarms.get(TIMER_ALARM).is_none());
        assert_eq!(f.manager.remaining_ms().unwrap(), None);
    }

    #[tokio::test]
    async fn finalize_is_idempotent() {
        let f = fixture();
        f.manager.set_blocking(true, None).await.unwrap();
        f.clock.advance_minutes(12);

        assert_eq!(f.manager.finalize().await.unwrap(), 12);
        assert_eq!(f.manager.finalize().await.unwrap(), 0);
        assert_eq!(f.manager.ledger().unwrap().total_minutes, 12);
        assert_eq!(f.manager.session_state().unwrap(), SessionState::Off);
    }

    #[tokio::test]
    async fn pause_resume_round_trip() {
        let f = fixture();
        f.manager.set_blocking(true, None).await.unwrap();

        f.clock.advance_minutes(10);
        f.manager.heartbeat().await.unwrap();
        f.manager.on_idle_state(IdleState::Locked).await.unwrap();
        assert_eq!(f.manager.session_state().unwrap(), SessionState::Paused);
        assert_eq!(f.manager.current_minutes().unwrap(), 10);

        // Time spent locked does not count.
        f.clock.advance_minutes(30);
        assert_eq!(f.manager.current_minutes().unwrap(), 10);

        f.manager.on_idle_state(IdleState::Active).await.unwrap();
        f.clock.advance_minutes(5);
        assert_eq!(f.manager.current_minutes().unwrap(), 15);
        assert_eq!(f.manager.finalize().await.unwrap(), 15);
    }

    #[tokio::test]
    async fn plain_idle_keeps_counting() {
        let f = fixture();
        f.manager.set_blocking(true, None).await.unwrap();
        f.manager.on_idle_state(IdleState::Idle).await.unwrap();
        assert_eq!(f.manager.session_state().unwrap(), SessionState::Running);
        assert!(!f.manager.resume().await.unwrap());
    }

    #[tokio::test]
    async fn pause_requires_blocking() {
        let f = fixture();
        assert!(!f.manager.pause().await.unwrap());
        assert_eq!(f.manager.session_state().unwrap(), SessionState::Off);
    }

    #[tokio::test]
    async fn heartbeat_gap_splits_session() {
        let f = fixture();
        f.manager.set_blocking(true, None).await.unwrap();
        f.clock.advance_minutes(20);
        f.manager.heartbeat().await.unwrap();

        // Laptop lid closed for two hours.
        f.clock.advance_minutes(120);
        f.manager.heartbeat().await.unwrap();

        assert_eq!(f.manager.ledger().unwrap().total_minutes, 20);
        assert_eq!(f.manager.session_state().unwrap(), SessionState::Running);
        assert_eq!(f.manager.current_minutes().unwrap(), 0);
    }

    #[tokio::test]
    async fn cap_rolls_over_without_disabling() {
        let f = fixture();
        f.manager.set_blocking(true, None).await.unwrap();
        for _ in 0..24 {
            f.clock.advance_minutes(25);
            f.manager.heartbeat().await.unwrap();
        }
        // 600 minutes, under the ceiling.
        assert!(!f.manager.check_session_cap().await.unwrap());

        for _ in 0..34 {
            f.clock.advance_minutes(25);
            f.manager.heartbeat().await.unwrap();
        }
        // The heartbeat crossing the ceiling committed a capped session
        // and started a new one.
        assert_eq!(f.manager.ledger().unwrap().total_minutes, 1440);
        assert!(f.manager.blocking().unwrap().enabled);
        assert_eq!(f.manager.current_minutes().unwrap(), 0);
    }

    #[tokio::test]
    async fn disabling_finalizes_and_clears_alarms() {
        let f = fixture();
        f.manager
            .set_blocking(true, Some(BlockingDuration::Minutes(50)))
            .await
            .unwrap();
        assert!(f.alarms.get(TIMER_ALARM).is_some());
        assert!(f.manager.expiry().is_scheduled());

        f.clock.advance_minutes(7);
        let cfg = f.manager.set_blocking(false, None).await.unwrap();
        assert_eq!(cfg.end_time, None);
        assert_eq!(cfg.duration, None);
        assert_eq!(f.manager.ledger().unwrap().total_minutes, 7);
        assert!(f.alarms.names().is_empty());
        assert!(!f.manager.expiry().is_scheduled());
    }

    #[tokio::test]
    async fn bounded_enable_sets_end_time() {
        let f = fixture();
        let cfg = f
            .manager
            .set_blocking(true, Some(BlockingDuration::Custom(40)))
            .await
            .unwrap();
        assert_eq!(cfg.end_time, Some(T0 + 40 * MINUTE_MS));
        assert_eq!(
            f.alarms.get(TIMER_ALARM).and_then(|a| a.when_ms),
            Some(T0 + 40 * MINUTE_MS)
        );
    }

    #[tokio::test]
    async fn site_list_is_locked_while_blocking() {
        let f = fixture();
        f.manager.add_site("youtube.com").await.unwrap();
        assert!(matches!(
            f.manager.add_site("www.youtube.com").await,
            Err(CoreError::Validation(ValidationError::DuplicateSite(_)))
        ));

        f.manager.set_blocking(true, None).await.unwrap();
        assert!(matches!(
            f.manager.remove_site("*youtube.com").await,
            Err(CoreError::Validation(ValidationError::ListLocked))
        ));

        f.manager.set_blocking(false, None).await.unwrap();
        f.manager.remove_site("youtube.com").await.unwrap();
        assert!(f.manager.blocking().unwrap().blocked_sites.is_empty());
    }

    #[tokio::test]
    async fn unrelated_config_change_is_ignored() {
        let f = fixture();
        f.manager
            .reconcile_config(&["stats".to_string()])
            .await
            .unwrap();
        assert!(f.alarms.names().is_empty());
    }

    #[tokio::test]
    async fn stale_timer_alarm_is_cleared() {
        let f = fixture();
        f.manager
            .set_blocking(true, Some(BlockingDuration::Minutes(25)))
            .await
            .unwrap();
        f.manager.set_blocking(false, None).await.unwrap();
        f.alarms.create(
            TIMER_ALARM,
            AlarmSchedule {
                when_ms: Some(T0),
                period_minutes: Some(1),
            },
        );

        f.manager.on_alarm(TIMER_ALARM).await.unwrap();
        assert!(f.alarms.get(TIMER_ALARM).is_none());
    }

    #[tokio::test]
    async fn stale_heartbeat_alarm_is_cleared() {
        let f = fixture();
        f.manager.set_blocking(true, None).await.unwrap();
        f.manager.set_blocking(false, None).await.unwrap();
        // Left behind by a disable written while no process was running.
        f.alarms.create(
            HEARTBEAT_ALARM,
            AlarmSchedule {
                when_ms: None,
                period_minutes: Some(1),
            },
        );

        f.manager.on_alarm(HEARTBEAT_ALARM).await.unwrap();
        assert!(f.alarms.get(HEARTBEAT_ALARM).is_none());
        assert_eq!(f.manager.session_state().unwrap(), SessionState::Off);
    }

    #[tokio::test]
    async fn site_edits_wait_for_the_session_lock() {
        let f = fixture();
        let guard = f.manager.inner.session.lock().await;

        let manager = f.manager.clone();
        let edit = tokio::spawn(async move { manager.add_site("reddit.com").await });
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert!(!edit.is_finished());
        assert!(f.manager.blocking().unwrap().blocked_sites.is_empty());

        drop(guard);
        edit.await.unwrap().unwrap();
        assert_eq!(f.manager.blocking().unwrap().blocked_sites.len(), 1);
    }

    #[tokio::test]
    async fn site_added_during_expiry_survives() {
        let f = fixture();
        f.manager.add_site("youtube.com").await.unwrap();
        f.manager
            .set_blocking(true, Some(BlockingDuration::Minutes(25)))
            .await
            .unwrap();
        f.clock.advance_minutes(25);

        let guard = f.manager.inner.session.lock().await;
        let expiring = f.manager.clone();
        let expiry = tokio::spawn(async move { expiring.on_timer_expired().await });
        let editing = f.manager.clone();
        let edit = tokio::spawn(async move { editing.add_site("reddit.com").await });
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        drop(guard);

        assert!(expiry.await.unwrap().unwrap());
        edit.await.unwrap().unwrap();

        let config = f.manager.blocking().unwrap();
        assert!(!config.enabled);
        assert_eq!(config.end_time, None);
        assert_eq!(config.blocked_sites.len(), 2);
        assert_eq!(f.manager.ledger().unwrap().total_minutes, 25);
    }
}
