use crate::utils::format_clock;
use chrono::{DateTime, Duration, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(
    Serialize, Deserialize, ValueEnum, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum Mode {
    Work,
    Play,
    Rest,
    Sleep,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Work, Mode::Play, Mode::Rest, Mode::Sleep];

    pub fn label(self) -> &'static str {
        match self {
            Mode::Work => "Work",
            Mode::Play => "Play",
            Mode::Rest => "Rest",
            Mode::Sleep => "Sleep",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BadgeKind {
    Tree,
    Leaf,
    Animal,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Badge {
    pub id: Uuid,
    pub emoji: String,
    #[serde(rename = "type")]
    pub kind: BadgeKind,
    pub timestamp: DateTime<Utc>,
}

impl Badge {
    pub fn new(emoji: &str, kind: BadgeKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            emoji: emoji.to_string(),
            kind,
            timestamp,
        }
    }
}

/// A completed focus run. Built once, when the run is stopped.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub mode: Mode,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub points: u32,
    pub badges: Vec<Badge>,
}

impl Session {
    pub fn new(
        mode: Mode,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        points: u32,
        badges: Vec<Badge>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            start_time,
            end_time: end_time.max(start_time),
            points,
            badges,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    pub fn formatted_duration(&self) -> String {
        format_clock(self.duration().num_seconds())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub name: String,
    #[serde(with = "photo_bytes", skip_serializing_if = "Option::is_none")]
    pub image_data: Option<Vec<u8>>,
    pub total_points: u64,
    pub badges: Vec<Badge>,
    pub sessions: Vec<Session>,
}

impl Profile {
    /// Points credited by finished sessions only; excludes any run in progress.
    pub fn points_from_history(&self) -> u64 {
        self.sessions.iter().map(|s| u64::from(s.points)).sum()
    }

    /// The `count` most recent sessions, newest first.
    pub fn recent_sessions(&self, count: usize) -> impl Iterator<Item = &Session> {
        self.sessions.iter().rev().take(count)
    }
}

// Photo bytes travel as a base64 string inside the JSON record.
mod photo_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|e| STANDARD.decode(e).map_err(serde::de::Error::custom))
            .transpose()
    }
}
