//! Time allowed per exam, keyed by level and skill.

use crate::model::{Level, Skill};

/// Duration used for any level/skill pair not in the table.
pub const DEFAULT_DURATION_SECS: u32 = 60 * 60;

/// Look up the exam duration in seconds.
pub fn duration_for(level: &Level, skill: &Skill) -> u32 {
    match (level, skill) {
        (Level::TopikI, Skill::Listening) => 40 * 60,
        (Level::TopikI, Skill::Reading) => 60 * 60,
        (Level::TopikII, Skill::Listening) => 60 * 60,
        (Level::TopikII, Skill::Reading) => 70 * 60,
        (Level::TopikII, Skill::Writing) => 50 * 60,
        _ => DEFAULT_DURATION_SECS,
    }
}
