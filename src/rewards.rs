use crate::models::{Badge, BadgeKind};
use chrono::{DateTime, Utc};
use rand::Rng;

pub const TREE_GLYPHS: [&str; 5] = ["🌵", "🎄", "🌲", "🌳", "🌴"];
pub const LEAF_GLYPHS: [&str; 3] = ["🍂", "🍁", "🍄"];
pub const ANIMAL_GLYPHS: [&str; 4] = ["🐅", "🦅", "🐵", "🐍"];

const KINDS: [BadgeKind; 3] = [BadgeKind::Tree, BadgeKind::Leaf, BadgeKind::Animal];

pub fn glyphs(kind: BadgeKind) -> &'static [&'static str] {
    match kind {
        BadgeKind::Tree => &TREE_GLYPHS,
        BadgeKind::Leaf => &LEAF_GLYPHS,
        BadgeKind::Animal => &ANIMAL_GLYPHS,
    }
}

/// Picks a category uniformly, then a glyph uniformly within it.
pub fn draw_badge<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> Badge {
    let kind = KINDS[rng.gen_range(0..KINDS.len())];
    let list = glyphs(kind);
    let emoji = list[rng.gen_range(0..list.len())];
    Badge::new(emoji, kind, now)
}
