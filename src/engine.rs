//! Session engine: the `Idle -> Active -> Idle` state machine behind a focus run.
//!
//! The engine is the single writer of the profile. Every mutation goes through
//! `&mut self`, so the caller's event loop serializes user actions and ticks.
//! All operations take `now` from the caller; the engine never reads the clock.

use crate::models::{Badge, Mode, Profile, Session};
use crate::rewards::draw_badge;
use crate::scheduler::Ticker;
use crate::storage::{ProfileStore, StorageError};
use crate::utils::format_clock;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("a {0} session is already running")]
    AlreadyActive(Mode),

    #[error("no session is running")]
    NotActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Active,
}

#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    /// Focus time that earns one point and one badge.
    pub award_interval: Duration,
    /// How often the periodic tick runs while a session is active.
    pub tick_interval: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            award_interval: Duration::seconds(120),
            tick_interval: Duration::seconds(1),
        }
    }
}

#[derive(Debug)]
struct ActiveRun {
    mode: Mode,
    started_at: DateTime<Utc>,
    last_award_at: DateTime<Utc>,
    ticker: Ticker,
}

pub struct SessionEngine<S: ProfileStore, R: Rng> {
    store: S,
    rng: R,
    cadence: Cadence,
    run: Option<ActiveRun>,
    elapsed: Duration,
    points: u32,
    badges: Vec<Badge>,
    profile: Profile,
    last_save_error: Option<String>,
}

impl<S: ProfileStore, R: Rng> SessionEngine<S, R> {
    /// Loads the profile once and starts idle.
    pub fn open(store: S, rng: R, cadence: Cadence) -> Result<Self, StorageError> {
        let profile = store.load()?;
        log::info!(
            "profile loaded: {} points, {} badges, {} sessions",
            profile.total_points,
            profile.badges.len(),
            profile.sessions.len()
        );
        if profile.total_points != profile.points_from_history() {
            log::warn!(
                "profile total of {} points does not match {} points in session history",
                profile.total_points,
                profile.points_from_history()
            );
        }
        Ok(Self {
            store,
            rng,
            cadence,
            run: None,
            elapsed: Duration::zero(),
            points: 0,
            badges: Vec::new(),
            profile,
            last_save_error: None,
        })
    }

    pub fn state(&self) -> EngineState {
        if self.run.is_some() {
            EngineState::Active
        } else {
            EngineState::Idle
        }
    }

    pub fn current_mode(&self) -> Option<Mode> {
        self.run.as_ref().map(|r| r.mode)
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn badges(&self) -> &[Badge] {
        &self.badges
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Message of the most recent failed save, cleared by the next good one.
    pub fn last_save_error(&self) -> Option<&str> {
        self.last_save_error.as_deref()
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn formatted_elapsed(&self) -> String {
        format_clock(self.elapsed().num_seconds())
    }

    /// How long the event loop may block before the next tick is due.
    pub fn until_next_tick(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        self.run.as_ref().map(|r| r.ticker.until_due(now))
    }

    pub fn start(&mut self, mode: Mode, now: DateTime<Utc>) -> Result<(), EngineError> {
        if let Some(run) = &self.run {
            return Err(EngineError::AlreadyActive(run.mode));
        }

        self.elapsed = Duration::zero();
        self.points = 0;
        self.badges.clear();
        self.run = Some(ActiveRun {
            mode,
            started_at: now,
            last_award_at: now,
            ticker: Ticker::start(self.cadence.tick_interval, now),
        });

        log::info!("{} session started", mode);
        Ok(())
    }

    /// Runs the tick if the ticker says one is due.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<Badge> {
        let due = match self.run.as_mut() {
            Some(run) => run.ticker.due(now),
            None => false,
        };
        if due {
            self.tick(now)
        } else {
            None
        }
    }

    /// One periodic step. Awards at most one point per call, however late it runs.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Badge> {
        let run = self.run.as_mut()?;
        self.elapsed = (now - run.started_at).max(Duration::zero());

        if now - run.last_award_at < self.cadence.award_interval {
            return None;
        }
        run.last_award_at = now;

        let badge = draw_badge(&mut self.rng, now);
        self.points += 1;
        self.badges.push(badge.clone());
        self.profile.total_points += 1;
        self.profile.badges.push(badge.clone());
        log::info!(
            "awarded {} ({:?}), {} points this session",
            badge.emoji,
            badge.kind,
            self.points
        );
        self.persist();

        Some(badge)
    }

    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<Session, EngineError> {
        let run = self.run.take().ok_or(EngineError::NotActive)?;

        let session = Session::new(
            run.mode,
            run.started_at,
            now,
            self.points,
            std::mem::take(&mut self.badges),
        );
        self.profile.sessions.push(session.clone());
        log::info!(
            "{} session stopped after {} with {} points",
            session.mode,
            session.formatted_duration(),
            session.points
        );
        self.persist();

        self.elapsed = Duration::zero();
        self.points = 0;

        Ok(session)
    }

    pub fn set_name(&mut self, name: &str) {
        self.profile.name = name.trim().to_string();
        self.persist();
    }

    pub fn set_photo(&mut self, bytes: Option<Vec<u8>>) {
        self.profile.image_data = bytes;
        self.persist();
    }

    // Failures stay in memory; the next successful save writes everything.
    fn persist(&mut self) {
        match self.store.save(&self.profile) {
            Ok(()) => self.last_save_error = None,
            Err(e) => {
                log::error!("failed to save profile: {}", e);
                self.last_save_error = Some(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewards::glyphs;
    use crate::storage::memory::MemoryStore;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestEngine = SessionEngine<MemoryStore, StdRng>;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 28, 9, 0, 0).unwrap()
    }

    fn secs(n: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(n)
    }

    fn setup_engine() -> TestEngine {
        SessionEngine::open(
            MemoryStore::default(),
            StdRng::seed_from_u64(1),
            Cadence::default(),
        )
        .unwrap()
    }

    fn assert_counters_agree(engine: &TestEngine) {
        let profile = engine.profile();
        let history_badges: usize = profile.sessions.iter().map(|s| s.badges.len()).sum();
        assert_eq!(
            profile.total_points,
            profile.points_from_history() + u64::from(engine.points())
        );
        assert_eq!(profile.badges.len(), history_badges + engine.badges().len());
    }

    #[test]
    fn test_open_empty_store() {
        let engine = setup_engine();
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.current_mode(), None);
        assert_eq!(engine.profile(), &Profile::default());
        assert_eq!(engine.formatted_elapsed(), "00:00");
    }

    #[test]
    fn test_work_session_scenario() {
        let mut engine = setup_engine();
        engine.start(Mode::Work, secs(0)).unwrap();
        assert_eq!(engine.state(), EngineState::Active);
        assert_eq!(engine.current_mode(), Some(Mode::Work));

        assert!(engine.tick(secs(60)).is_none());
        let first = engine.tick(secs(120)).expect("award at 120s");
        assert_eq!(engine.points(), 1);
        assert_eq!(engine.badges(), &[first.clone()]);
        assert_eq!(engine.profile().total_points, 1);
        assert_eq!(engine.profile().badges, vec![first.clone()]);
        assert_eq!(engine.store().saves.get(), 1);

        assert!(engine.tick(secs(240)).is_some());
        assert_eq!(engine.points(), 2);

        let session = engine.stop(secs(250)).unwrap();
        assert_eq!(session.mode, Mode::Work);
        assert_eq!(session.points, 2);
        assert_eq!(session.badges.len(), 2);
        assert_eq!(session.badges[0], first);
        assert_eq!(session.duration(), Duration::seconds(250));
        assert_eq!(session.formatted_duration(), "04:10");

        let profile = engine.profile();
        assert_eq!(profile.total_points, 2);
        assert_eq!(profile.sessions, vec![session]);

        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.current_mode(), None);
        assert_eq!(engine.points(), 0);
        assert!(engine.badges().is_empty());
        assert_eq!(engine.elapsed(), Duration::zero());

        // Stop wrote the session through to the store.
        let stored = engine.store().slot.borrow().clone().unwrap();
        assert_eq!(&stored, engine.profile());
        assert_counters_agree(&engine);
    }

    #[test]
    fn test_points_follow_elapsed_time() {
        for total in [0_i64, 119, 120, 121, 359, 360, 1000] {
            let mut engine = setup_engine();
            engine.start(Mode::Play, secs(0)).unwrap();
            for k in 1..=total {
                engine.tick(secs(k));
                assert_counters_agree(&engine);
            }
            let session = engine.stop(secs(total)).unwrap();

            let expected = (total / 120) as u32;
            assert_eq!(session.points, expected, "after {}s", total);
            assert_eq!(session.badges.len(), expected as usize);
            for badge in &session.badges {
                assert!(glyphs(badge.kind).contains(&badge.emoji.as_str()));
            }
            assert_counters_agree(&engine);
        }
    }

    #[test]
    fn test_short_session_earns_nothing() {
        let mut engine = setup_engine();
        engine.start(Mode::Rest, secs(0)).unwrap();
        engine.tick(secs(45));
        let session = engine.stop(secs(119)).unwrap();

        assert_eq!(session.points, 0);
        assert!(session.badges.is_empty());
        assert_eq!(session.formatted_duration(), "01:59");
        assert_eq!(engine.profile().sessions.len(), 1);
        assert_eq!(engine.profile().total_points, 0);
    }

    #[test]
    fn test_long_session_formats_with_hours() {
        let mut engine = setup_engine();
        engine.start(Mode::Sleep, secs(0)).unwrap();
        engine.tick(secs(3725));
        assert_eq!(engine.formatted_elapsed(), "01:02:05");

        let session = engine.stop(secs(3725)).unwrap();
        assert_eq!(session.formatted_duration(), "01:02:05");
    }

    #[test]
    fn test_formatted_elapsed_is_stable_between_ticks() {
        let mut engine = setup_engine();
        engine.start(Mode::Work, secs(0)).unwrap();
        engine.tick(secs(75));

        let first = engine.formatted_elapsed();
        assert_eq!(first, "01:15");
        assert_eq!(engine.formatted_elapsed(), first);
        assert_eq!(engine.formatted_elapsed(), first);
    }

    #[test]
    fn test_late_tick_awards_once() {
        let mut engine = setup_engine();
        engine.start(Mode::Work, secs(0)).unwrap();

        // Ten award intervals pass without a tick.
        assert!(engine.tick(secs(1200)).is_some());
        assert_eq!(engine.points(), 1);
        assert_eq!(engine.formatted_elapsed(), "20:00");

        // The window restarts at the late tick.
        assert!(engine.tick(secs(1319)).is_none());
        assert!(engine.tick(secs(1320)).is_some());
        assert_eq!(engine.points(), 2);
    }

    #[test]
    fn test_start_while_active_is_rejected() {
        let mut engine = setup_engine();
        engine.start(Mode::Work, secs(0)).unwrap();
        engine.tick(secs(130));

        assert_eq!(
            engine.start(Mode::Play, secs(140)),
            Err(EngineError::AlreadyActive(Mode::Work))
        );
        assert_eq!(engine.current_mode(), Some(Mode::Work));
        assert_eq!(engine.points(), 1);

        let session = engine.stop(secs(150)).unwrap();
        assert_eq!(session.start_time, secs(0));
    }

    #[test]
    fn test_stop_while_idle_is_rejected() {
        let mut engine = setup_engine();
        assert_eq!(engine.stop(secs(10)), Err(EngineError::NotActive));
        assert!(engine.profile().sessions.is_empty());
        assert_eq!(engine.store().saves.get(), 0);
    }

    #[test]
    fn test_tick_while_idle_does_nothing() {
        let mut engine = setup_engine();
        assert!(engine.tick(secs(500)).is_none());
        assert!(engine.poll(secs(500)).is_none());
        assert_eq!(engine.elapsed(), Duration::zero());
        assert_eq!(engine.until_next_tick(secs(500)), None);
    }

    #[test]
    fn test_poll_runs_tick_on_cadence() {
        let mut engine = setup_engine();
        engine.start(Mode::Work, secs(0)).unwrap();

        engine.poll(t0() + Duration::milliseconds(500));
        assert_eq!(engine.elapsed(), Duration::zero());

        engine.poll(secs(1));
        assert_eq!(engine.elapsed(), Duration::seconds(1));

        let mut awarded = 0;
        for k in 2..=240 {
            if engine.poll(secs(k)).is_some() {
                awarded += 1;
            }
        }
        assert_eq!(awarded, 2);
        assert_eq!(engine.formatted_elapsed(), "04:00");
    }

    #[test]
    fn test_restart_resets_session_counters() {
        let mut engine = setup_engine();
        engine.start(Mode::Work, secs(0)).unwrap();
        engine.tick(secs(120));
        engine.stop(secs(130)).unwrap();

        engine.start(Mode::Play, secs(200)).unwrap();
        assert_eq!(engine.points(), 0);
        assert!(engine.badges().is_empty());
        engine.tick(secs(250));
        assert_eq!(engine.formatted_elapsed(), "00:50");
        assert!(engine.tick(secs(320)).is_some());

        let session = engine.stop(secs(330)).unwrap();
        assert_eq!(session.points, 1);
        assert_eq!(engine.profile().total_points, 2);
        assert_eq!(engine.profile().sessions.len(), 2);
        assert_counters_agree(&engine);
    }

    #[test]
    fn test_badges_unique_across_sessions() {
        let mut engine = setup_engine();
        for round in 0..3 {
            let base = round * 1000;
            engine.start(Mode::Work, secs(base)).unwrap();
            for k in 1..=600 {
                engine.tick(secs(base + k));
            }
            engine.stop(secs(base + 600)).unwrap();
        }

        let mut ids: Vec<_> = engine.profile().badges.iter().map(|b| b.id).collect();
        assert_eq!(ids.len(), 15);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 15);
    }

    #[test]
    fn test_save_failure_keeps_memory_state() {
        let mut engine = setup_engine();
        engine.store().fail_saves.set(true);

        engine.start(Mode::Work, secs(0)).unwrap();
        assert!(engine.tick(secs(120)).is_some());
        assert_eq!(engine.profile().total_points, 1);
        assert!(engine.last_save_error().is_some());

        let session = engine.stop(secs(130)).unwrap();
        assert_eq!(session.points, 1);
        assert_eq!(engine.profile().sessions.len(), 1);
        assert!(engine.store().slot.borrow().is_none());

        // Next good save catches up.
        engine.store().fail_saves.set(false);
        engine.set_name("Rahul");
        assert!(engine.last_save_error().is_none());
        let stored = engine.store().slot.borrow().clone().unwrap();
        assert_eq!(stored.total_points, 1);
        assert_eq!(stored.sessions.len(), 1);
        assert_eq!(stored.name, "Rahul");
    }

    #[test]
    fn test_open_restores_saved_profile() {
        let store = MemoryStore::default();
        let saved = Profile {
            name: "Ana".to_string(),
            total_points: 12,
            ..Profile::default()
        };
        *store.slot.borrow_mut() = Some(saved.clone());

        let engine =
            SessionEngine::open(store, StdRng::seed_from_u64(3), Cadence::default()).unwrap();
        assert_eq!(engine.profile(), &saved);
    }

    #[test]
    fn test_profile_edits_persist() {
        let mut engine = setup_engine();
        engine.set_name("  Rahul ");
        engine.set_photo(Some(vec![0x89, 0x50, 0x4e, 0x47]));

        let stored = engine.store().slot.borrow().clone().unwrap();
        assert_eq!(stored.name, "Rahul");
        assert_eq!(stored.image_data, Some(vec![0x89, 0x50, 0x4e, 0x47]));

        engine.set_photo(None);
        assert!(engine.store().slot.borrow().as_ref().unwrap().image_data.is_none());
        assert_eq!(engine.store().saves.get(), 3);
    }

    #[test]
    fn test_custom_award_interval() {
        let cadence = Cadence {
            award_interval: Duration::seconds(30),
            tick_interval: Duration::seconds(1),
        };
        let mut engine =
            SessionEngine::open(MemoryStore::default(), StdRng::seed_from_u64(5), cadence)
                .unwrap();
        engine.start(Mode::Work, secs(0)).unwrap();
        for k in 1..=95 {
            engine.tick(secs(k));
        }
        assert_eq!(engine.points(), 3);
    }
}
