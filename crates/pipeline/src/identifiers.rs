//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive, so that, for example, a [`StageName`] cannot be passed
//! where a [`CityName`] is expected even though both are strings under the
//! hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display, and
// serde impls that go through new().
// Values are trimmed; blank input yields `None`.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is blank.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else if trimmed.len() == v.len() {
                    Some(Self(v))
                } else {
                    Some(Self(trimmed.to_string()))
                }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = &'static str;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value).ok_or(concat!(stringify!($name), " must not be blank"))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single planning run (one invocation of the orchestrator).
///
/// Generated fresh for every run; propagated through spans and log events so
/// all activity from a single run can be correlated. It carries no meaning for
/// the pipeline logic itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a new random session identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`SessionId`] from an existing UUID (e.g. deserialised from an archive).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: string-backed
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a pipeline stage by its registered name (e.g. `"flight_specialist"`).
    ///
    /// Stage names are unique within a stage registry and double as the value
    /// written to the current-stage marker of the trip state.
    StageName
}

string_id! {
    /// A city name as entered by the traveller (e.g. `"Seattle"`).
    ///
    /// Comparison helpers are case-insensitive; the original spelling is kept
    /// for display.
    CityName
}

impl StageName {
    /// Formats the stage name for display: `flight_specialist` → `Flight Specialist`.
    pub fn display_title(&self) -> String {
        self.0
            .split('_')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl CityName {
    /// Returns `true` if both names refer to the same city, ignoring case.
    pub fn same_city(&self, other: &CityName) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }

    /// Returns the lowercase lookup key for catalog queries.
    pub fn lookup_key(&self) -> String {
        self.0.to_lowercase()
    }
}
