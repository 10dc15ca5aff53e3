//! The traveller's trip request and its validation rules.
//!
//! A [`TripRequest`] is obtained through [`TripRequest::validate`] or by
//! deserialising an archived one. Deserialising re-checks the route, date
//! order and party-size rules; the rules relative to today are not re-checked,
//! so an archived past trip still loads.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{CityName, SessionId, TravelerCount, ValidationError};

/// How far ahead of today a trip may be booked.
pub const BOOKING_HORIZON_DAYS: u64 = 365;

/// Raw, unvalidated trip parameters as collected from the traveller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRequestInput {
    pub origin: String,
    pub destination: String,
    pub departure: NaiveDate,
    pub return_date: NaiveDate,
    pub travelers: u32,
    pub preferences: String,
}

/// A validated trip request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TripRequest {
    origin: CityName,
    destination: CityName,
    departure: NaiveDate,
    return_date: NaiveDate,
    travelers: TravelerCount,
    preferences: String,
    session_id: SessionId,
}

/// Serialised form of [`TripRequest`], checked before it becomes one.
#[derive(Deserialize)]
struct TripRequestRecord {
    origin: String,
    destination: String,
    departure: NaiveDate,
    return_date: NaiveDate,
    travelers: u32,
    preferences: String,
    session_id: SessionId,
}

impl<'de> Deserialize<'de> for TripRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = TripRequestRecord::deserialize(deserializer)?;
        let (origin, destination) =
            route(record.origin, record.destination).map_err(serde::de::Error::custom)?;
        check_date_order(record.departure, record.return_date)
            .map_err(serde::de::Error::custom)?;
        let travelers = party_size(record.travelers).map_err(serde::de::Error::custom)?;

        Ok(Self {
            origin,
            destination,
            departure: record.departure,
            return_date: record.return_date,
            travelers,
            preferences: record.preferences,
            session_id: record.session_id,
        })
    }
}

fn route(origin: String, destination: String) -> Result<(CityName, CityName), ValidationError> {
    let origin = CityName::new(origin).ok_or(ValidationError::MissingOrigin)?;
    let destination = CityName::new(destination).ok_or(ValidationError::MissingDestination)?;
    if origin.same_city(&destination) {
        return Err(ValidationError::SameOriginAndDestination {
            city: destination.to_string(),
        });
    }
    Ok((origin, destination))
}

fn check_date_order(departure: NaiveDate, return_date: NaiveDate) -> Result<(), ValidationError> {
    if return_date <= departure {
        return Err(ValidationError::ReturnNotAfterDeparture {
            departure,
            return_date,
        });
    }
    Ok(())
}

fn party_size(travelers: u32) -> Result<TravelerCount, ValidationError> {
    TravelerCount::new(travelers)
        .ok_or(ValidationError::TravelerCountOutOfRange { count: travelers })
}

impl TripRequest {
    /// Validates `input` against `today` and assigns a fresh session id.
    ///
    /// Rules, checked in this order:
    /// - origin and destination are non-blank and name different cities;
    /// - `today <= departure < return <= today + 365d`;
    /// - travelers in `[1, 10]`.
    pub fn validate(input: TripRequestInput, today: NaiveDate) -> Result<Self, ValidationError> {
        let (origin, destination) = route(input.origin, input.destination)?;

        if input.departure < today {
            return Err(ValidationError::DepartureInPast {
                departure: input.departure,
                today,
            });
        }
        check_date_order(input.departure, input.return_date)?;
        let latest = today
            .checked_add_days(Days::new(BOOKING_HORIZON_DAYS))
            .unwrap_or(NaiveDate::MAX);
        for date in [input.departure, input.return_date] {
            if date > latest {
                return Err(ValidationError::BeyondBookingHorizon { date, latest });
            }
        }

        let travelers = party_size(input.travelers)?;

        Ok(Self {
            origin,
            destination,
            departure: input.departure,
            return_date: input.return_date,
            travelers,
            preferences: input.preferences.trim().to_string(),
            session_id: SessionId::new_random(),
        })
    }

    /// Replaces the generated session id, e.g. when the caller already owns
    /// a correlation key.
    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn origin(&self) -> &CityName {
        &self.origin
    }

    pub fn destination(&self) -> &CityName {
        &self.destination
    }

    pub fn departure(&self) -> NaiveDate {
        self.departure
    }

    pub fn return_date(&self) -> NaiveDate {
        self.return_date
    }

    pub fn travelers(&self) -> TravelerCount {
        self.travelers
    }

    pub fn preferences(&self) -> &str {
        &self.preferences
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Length of the stay in nights. Always at least one.
    pub fn nights(&self) -> u32 {
        (self.return_date - self.departure).num_days().max(1) as u32
    }

    /// Returns `true` if the free-text preferences mention `keyword` (case-insensitive).
    pub fn prefers(&self, keyword: &str) -> bool {
        self.preferences
            .to_lowercase()
            .contains(&keyword.to_lowercase())
    }

    /// Renders the request as the natural-language message that seeds the
    /// conversation log.
    pub fn to_user_message(&self) -> String {
        let text = format!(
            "We're planning a trip to {} from {} departing {} and returning {} for {} travelers. {}",
            self.destination,
            self.origin,
            self.departure.format("%Y-%m-%d"),
            self.return_date.format("%Y-%m-%d"),
            self.travelers,
            self.preferences,
        );
        text.trim_end().to_string()
    }
}
