use crate::models::{Mode, Profile};
use crate::stats::{calculate_stats, SummaryStats};
use crate::storage::Storage;
use crate::utils::format_duration;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::fmt::Write;

pub struct Reporter {
    storage: Storage,
    recent: usize,
}

impl Reporter {
    pub fn new(storage: Storage, recent: usize) -> Self {
        Self { storage, recent }
    }

    pub fn report(&self) -> Result<()> {
        // Read-only: a corrupt record is reported, never moved aside from here.
        let profile = self
            .storage
            .load_strict()
            .context("could not read the profile; `fogo start` will reset an unreadable one")?;
        print!("{}", render(&profile, Local::now().date_naive(), self.recent)?);
        Ok(())
    }
}

fn write_summary(out: &mut String, summary: &SummaryStats) -> std::fmt::Result {
    writeln!(
        out,
        "  Focus Time:        {}",
        format_duration(summary.total_focus.num_seconds())
    )?;
    writeln!(out, "  Sessions:          {}", summary.session_count)?;
    writeln!(out, "  Points:            {}", summary.points)?;
    writeln!(out, "  Badges:            {}", summary.badges)?;
    if let (Some(max), Some(min)) = (summary.max_session, summary.min_session) {
        writeln!(
            out,
            "  Longest/Shortest:  {} / {}",
            format_duration(max.num_seconds()),
            format_duration(min.num_seconds())
        )?;
    }
    if summary.session_count > 0 {
        writeln!(
            out,
            "  Avg Session:       {}",
            format_duration(summary.avg_session().num_seconds())
        )?;
    }
    for mode in Mode::ALL {
        if let Some(total) = summary.by_mode.get(&mode) {
            writeln!(
                out,
                "    {:<6}           {}",
                mode.label(),
                format_duration(total.num_seconds())
            )?;
        }
    }
    Ok(())
}

pub fn render(profile: &Profile, today: NaiveDate, recent: usize) -> Result<String> {
    let mut out = String::new();

    let name = if profile.name.is_empty() {
        "Your Name"
    } else {
        profile.name.as_str()
    };

    writeln!(out, "Fogo Report: {}", name)?;
    writeln!(out, "============")?;
    writeln!(out, "Total Points: {}", profile.total_points)?;
    writeln!(out, "Total Badges: {}", profile.badges.len())?;

    if profile.sessions.is_empty() && profile.badges.is_empty() {
        writeln!(out, "\nNo sessions recorded yet.")?;
        return Ok(out);
    }

    let stats = calculate_stats(profile, today);

    if !profile.badges.is_empty() {
        let glyphs: Vec<&str> = profile.badges.iter().map(|b| b.emoji.as_str()).collect();
        writeln!(out, "\nYour Badges")?;
        writeln!(out, "  {}", glyphs.join(" "))?;
        writeln!(
            out,
            "  Trees: {} | Leaves: {} | Animals: {}",
            stats.badge_tally.tree, stats.badge_tally.leaf, stats.badge_tally.animal
        )?;
    }

    writeln!(out, "\nToday ({})", stats.today)?;
    write_summary(&mut out, &stats.today_summary)?;

    writeln!(out, "\nThis Week (Starting Monday {})", stats.week_start)?;
    for (date, day) in stats.daily_stats.range(stats.week_start..) {
        writeln!(
            out,
            "  {} {}: {} ({} sessions, {} points)",
            date.format("%a"),
            date,
            format_duration(day.total_focus.num_seconds()),
            day.sessions,
            day.points
        )?;
    }
    write_summary(&mut out, &stats.week_summary)?;

    writeln!(out, "\nAll Time")?;
    write_summary(&mut out, &stats.all_time)?;

    writeln!(out, "\nRecent Sessions")?;
    for session in profile.recent_sessions(recent) {
        writeln!(
            out,
            "  {:<6} {:>8}  {:>3} points  {}",
            session.mode.label(),
            session.formatted_duration(),
            session.points,
            session.start_time.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        )?;
    }

    Ok(out)
}
