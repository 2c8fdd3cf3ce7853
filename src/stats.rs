use crate::models::{BadgeKind, Mode, Profile, Session};
use chrono::{Datelike, Duration, Local, NaiveDate};
use std::collections::BTreeMap;

#[derive(Default, Clone, Debug)]
pub struct DayStats {
    pub total_focus: Duration,
    pub sessions: u32,
    pub points: u64,
}

#[derive(Default, Clone, Debug)]
pub struct SummaryStats {
    pub total_focus: Duration,
    pub session_count: u32,
    pub points: u64,
    pub badges: usize,
    pub max_session: Option<Duration>,
    pub min_session: Option<Duration>,
    pub by_mode: BTreeMap<Mode, Duration>,
}

impl SummaryStats {
    pub fn avg_session(&self) -> Duration {
        if self.session_count > 0 {
            self.total_focus / (self.session_count as i32)
        } else {
            Duration::zero()
        }
    }
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct BadgeTally {
    pub tree: usize,
    pub leaf: usize,
    pub animal: usize,
}

pub struct Stats {
    pub daily_stats: BTreeMap<NaiveDate, DayStats>,
    pub today_summary: SummaryStats,
    pub week_summary: SummaryStats,
    pub all_time: SummaryStats,
    pub badge_tally: BadgeTally,
    pub today: NaiveDate,
    pub week_start: NaiveDate,
}

pub fn session_date(session: &Session) -> NaiveDate {
    session.start_time.with_timezone(&Local).date_naive()
}

pub fn calculate_summary<'a, I>(sessions: I) -> SummaryStats
where
    I: IntoIterator<Item = &'a Session>,
{
    let mut summary = SummaryStats::default();

    for session in sessions {
        let duration = session.duration();
        summary.total_focus += duration;
        summary.session_count += 1;
        summary.points += u64::from(session.points);
        summary.badges += session.badges.len();
        summary.max_session = Some(summary.max_session.map_or(duration, |m| m.max(duration)));
        summary.min_session = Some(summary.min_session.map_or(duration, |m| m.min(duration)));
        *summary
            .by_mode
            .entry(session.mode)
            .or_insert_with(Duration::zero) += duration;
    }

    summary
}

pub fn tally_badges(profile: &Profile) -> BadgeTally {
    let mut tally = BadgeTally::default();
    for badge in &profile.badges {
        match badge.kind {
            BadgeKind::Tree => tally.tree += 1,
            BadgeKind::Leaf => tally.leaf += 1,
            BadgeKind::Animal => tally.animal += 1,
        }
    }
    tally
}

pub fn calculate_stats(profile: &Profile, today: NaiveDate) -> Stats {
    // Find the start of the current week (Monday)
    let days_from_monday = today.weekday().num_days_from_monday();
    let week_start = today - Duration::days(days_from_monday as i64);
    let week_end = week_start + Duration::days(6);

    let mut daily_stats: BTreeMap<NaiveDate, DayStats> = BTreeMap::new();
    let mut today_sessions = Vec::new();
    let mut week_sessions = Vec::new();

    for session in &profile.sessions {
        let date = session_date(session);

        let stats = daily_stats.entry(date).or_default();
        stats.total_focus += session.duration();
        stats.sessions += 1;
        stats.points += u64::from(session.points);

        if date == today {
            today_sessions.push(session);
        }

        if date >= week_start && date <= week_end {
            week_sessions.push(session);
        }
    }

    Stats {
        daily_stats,
        today_summary: calculate_summary(today_sessions),
        week_summary: calculate_summary(week_sessions),
        all_time: calculate_summary(&profile.sessions),
        badge_tally: tally_badges(profile),
        today,
        week_start,
    }
}
