//! Shared value types for the travel planner domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. traveler counts are in `[1, 10]`,
//! step ceilings are strictly positive) and participate in domain computations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::StageName;

// ---------------------------------------------------------------------------
// Bounded counts
// ---------------------------------------------------------------------------

/// Number of people travelling together, in the range `[1, 10]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TravelerCount(u8);

impl TravelerCount {
    /// Smallest accepted party size.
    pub const MIN: u8 = 1;
    /// Largest accepted party size.
    pub const MAX: u8 = 10;

    /// Creates a [`TravelerCount`], returning `None` if `count` is outside
    /// the valid range `[1, 10]`.
    #[must_use]
    pub fn new(count: u32) -> Option<Self> {
        if (u32::from(Self::MIN)..=u32::from(Self::MAX)).contains(&count) {
            Some(Self(count as u8))
        } else {
            None
        }
    }

    /// Returns the underlying count.
    pub fn get(self) -> u32 {
        u32::from(self.0)
    }

    /// Number of double rooms needed to house the party.
    pub fn rooms_needed(self) -> u32 {
        self.get().div_ceil(2)
    }
}

impl TryFrom<u32> for TravelerCount {
    type Error = String;

    fn try_from(count: u32) -> Result<Self, Self::Error> {
        Self::new(count).ok_or_else(|| {
            format!(
                "traveler count {count} is outside [{}, {}]",
                Self::MIN,
                Self::MAX
            )
        })
    }
}

impl From<TravelerCount> for u32 {
    fn from(count: TravelerCount) -> Self {
        count.get()
    }
}

impl std::fmt::Display for TravelerCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------

/// Maximum number of stages a single run may execute before it is cut off.
///
/// Caps runaway pipelines. The caller default is [`StepCeiling::DEFAULT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct StepCeiling(u32);

impl StepCeiling {
    /// Ceiling used when the caller does not configure one.
    pub const DEFAULT: StepCeiling = StepCeiling(10);

    /// Creates a [`StepCeiling`], returning `None` for zero.
    #[must_use]
    pub fn new(limit: u32) -> Option<Self> {
        if limit == 0 {
            None
        } else {
            Some(Self(limit))
        }
    }

    /// Returns the ceiling as an integer.
    pub fn get(self) -> u32 {
        self.0
    }

    /// Returns `true` once `steps` executed stages have used up the ceiling.
    pub fn is_reached_by(self, steps: u32) -> bool {
        steps >= self.0
    }
}

impl TryFrom<u32> for StepCeiling {
    type Error = &'static str;

    fn try_from(limit: u32) -> Result<Self, Self::Error> {
        Self::new(limit).ok_or("step ceiling must be greater than zero")
    }
}

impl From<StepCeiling> for u32 {
    fn from(ceiling: StepCeiling) -> Self {
        ceiling.get()
    }
}

impl Default for StepCeiling {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for StepCeiling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Summary slots
// ---------------------------------------------------------------------------

/// A named, write-once field of the trip state owned by exactly one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySlot {
    /// Flight options, owned by the flight specialist.
    Flight,
    /// Accommodation recommendation, owned by the hotel specialist.
    Hotel,
    /// Activities and experiences, owned by the activity specialist.
    Activities,
    /// The synthesised itinerary, owned by the plan synthesizer.
    FinalItinerary,
}

impl SummarySlot {
    /// Every slot, in the order the default pipeline fills them.
    pub const ALL: [SummarySlot; 4] = [
        SummarySlot::Flight,
        SummarySlot::Hotel,
        SummarySlot::Activities,
        SummarySlot::FinalItinerary,
    ];

    /// The three slots filled by specialists ahead of synthesis.
    pub const SPECIALIST: [SummarySlot; 3] = [
        SummarySlot::Flight,
        SummarySlot::Hotel,
        SummarySlot::Activities,
    ];

    /// Stable snake_case key, matching the serialised form.
    pub fn as_str(self) -> &'static str {
        match self {
            SummarySlot::Flight => "flight_summary",
            SummarySlot::Hotel => "hotel_summary",
            SummarySlot::Activities => "activities_summary",
            SummarySlot::FinalItinerary => "final_itinerary",
        }
    }
}

impl std::fmt::Display for SummarySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Who produced a message-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The traveller's request.
    User,
    /// Output of an agent.
    Assistant,
    /// Records written by the orchestrator itself (e.g. stage failures).
    System,
}

/// One entry of the append-only message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced the entry.
    pub role: Role,

    /// The stage that authored the entry; `None` for the seed request.
    pub stage: Option<StageName>,

    /// Free text content.
    pub content: String,

    /// When the entry was created.
    pub created_at: Timestamp,
}

impl Message {
    /// The traveller's request that seeds every run.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            stage: None,
            content: content.into(),
            created_at: Timestamp::now(),
        }
    }

    /// Output produced by `stage`.
    pub fn assistant(stage: &StageName, content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            stage: Some(stage.clone()),
            content: content.into(),
            created_at: Timestamp::now(),
        }
    }

    /// An orchestrator record attributed to `stage`.
    pub fn system(stage: &StageName, content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            stage: Some(stage.clone()),
            content: content.into(),
            created_at: Timestamp::now(),
        }
    }

    /// Returns at most `max_chars` characters of the content, suffixed with
    /// `...` when truncated.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.content.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traveler_count_bounds() {
        assert!(TravelerCount::new(0).is_none());
        assert!(TravelerCount::new(11).is_none());
        assert_eq!(TravelerCount::new(1).map(TravelerCount::get), Some(1));
        assert_eq!(TravelerCount::new(10).map(TravelerCount::get), Some(10));
    }

    #[test]
    fn rooms_round_up() {
        assert_eq!(TravelerCount::new(1).unwrap().rooms_needed(), 1);
        assert_eq!(TravelerCount::new(2).unwrap().rooms_needed(), 1);
        assert_eq!(TravelerCount::new(5).unwrap().rooms_needed(), 3);
    }

    #[test]
    fn step_ceiling_rejects_zero() {
        assert!(StepCeiling::new(0).is_none());
        assert_eq!(StepCeiling::default().get(), 10);
        let ceiling = StepCeiling::new(2).unwrap();
        assert!(!ceiling.is_reached_by(1));
        assert!(ceiling.is_reached_by(2));
    }

    #[test]
    fn deserialising_bounded_counts_rechecks_the_range() {
        assert!(serde_json::from_str::<TravelerCount>("200").is_err());
        assert!(serde_json::from_str::<TravelerCount>("0").is_err());
        assert_eq!(
            serde_json::from_str::<TravelerCount>("4").unwrap().get(),
            4
        );

        assert!(serde_json::from_str::<StepCeiling>("0").is_err());
        let ceiling: StepCeiling = serde_json::from_str("3").unwrap();
        assert_eq!(ceiling.get(), 3);
        assert_eq!(serde_json::to_string(&ceiling).unwrap(), "3");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let msg = Message::user("東京".repeat(200));
        let preview = msg.preview(300);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 303);

        let short = Message::user("hello");
        assert_eq!(short.preview(300), "hello");
    }
}
