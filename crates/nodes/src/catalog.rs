//! Built-in destination knowledge used by the specialist stages.
//!
//! Lookups are case-insensitive. An unknown destination never fails a stage:
//! [`DestinationCatalog::profile`] falls back to a generic profile built from
//! the city name.

use std::collections::HashMap;

use pipeline::CityName;
use serde::{Deserialize, Serialize};

/// What the planner knows about one destination city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationProfile {
    pub city: String,
    pub country: String,
    /// Primary international airport (IATA code).
    pub airport: String,
    /// Suggested base neighbourhood for the stay.
    pub neighbourhood: String,
    /// Indicative nightly rate for a standard double room, in USD.
    pub nightly_rate_usd: u32,
    pub highlights: Vec<String>,
}

impl DestinationProfile {
    fn generic(city: &CityName) -> Self {
        Self {
            city: city.to_string(),
            country: "destination country".to_string(),
            airport: format!("{} main airport", city),
            neighbourhood: "the city centre".to_string(),
            nightly_rate_usd: 180,
            highlights: vec![
                format!("Guided walking tour of central {city}"),
                "Local food market visit".to_string(),
                "Top-rated museum or gallery".to_string(),
                "Sunset viewpoint".to_string(),
            ],
        }
    }
}

/// Case-insensitive catalog of destinations and origin airports.
#[derive(Debug, Clone)]
pub struct DestinationCatalog {
    destinations: HashMap<String, DestinationProfile>,
    origin_airports: HashMap<String, String>,
}

impl DestinationCatalog {
    /// An empty catalog; every lookup falls back to generic data.
    pub fn empty() -> Self {
        Self {
            destinations: HashMap::new(),
            origin_airports: HashMap::new(),
        }
    }

    /// The catalog shipped with the planner.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for profile in builtin_destinations() {
            catalog.insert(profile);
        }
        for (city, airport) in [
            ("Seattle", "SEA"),
            ("New York", "JFK"),
            ("San Francisco", "SFO"),
            ("London", "LHR"),
            ("Los Angeles", "LAX"),
            ("Chicago", "ORD"),
            ("Boston", "BOS"),
        ] {
            catalog
                .origin_airports
                .insert(city.to_lowercase(), airport.to_string());
        }
        catalog
    }

    /// Adds or replaces a destination.
    pub fn insert(&mut self, profile: DestinationProfile) {
        self.destinations
            .insert(profile.city.to_lowercase(), profile);
    }

    /// Returns the profile for `city`, or a generic one if the city is unknown.
    pub fn profile(&self, city: &CityName) -> DestinationProfile {
        self.destinations
            .get(&city.lookup_key())
            .cloned()
            .unwrap_or_else(|| DestinationProfile::generic(city))
    }

    /// Returns `true` if `city` has a curated profile.
    pub fn knows(&self, city: &CityName) -> bool {
        self.destinations.contains_key(&city.lookup_key())
    }

    /// Airport code for a departure city, falling back to destination entries.
    pub fn airport_for(&self, city: &CityName) -> String {
        let key = city.lookup_key();
        self.origin_airports
            .get(&key)
            .cloned()
            .or_else(|| self.destinations.get(&key).map(|p| p.airport.clone()))
            .unwrap_or_else(|| format!("{city} main airport"))
    }

    /// Suggested origin cities, in display order.
    pub fn suggested_origins() -> &'static [&'static str] {
        &[
            "Seattle",
            "New York",
            "San Francisco",
            "London",
            "Los Angeles",
            "Chicago",
            "Boston",
        ]
    }

    /// Curated destination names, sorted.
    pub fn destination_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .destinations
            .values()
            .map(|p| p.city.clone())
            .collect();
        names.sort();
        names
    }
}

impl Default for DestinationCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn profile(
    city: &str,
    country: &str,
    airport: &str,
    neighbourhood: &str,
    nightly_rate_usd: u32,
    highlights: &[&str],
) -> DestinationProfile {
    DestinationProfile {
        city: city.to_string(),
        country: country.to_string(),
        airport: airport.to_string(),
        neighbourhood: neighbourhood.to_string(),
        nightly_rate_usd,
        highlights: highlights.iter().map(|h| h.to_string()).collect(),
    }
}

fn builtin_destinations() -> Vec<DestinationProfile> {
    vec![
        profile(
            "Tokyo",
            "Japan",
            "HND",
            "Shibuya",
            240,
            &[
                "Senso-ji temple and the Asakusa backstreets",
                "Tsukiji outer market food tour",
                "teamLab Planets digital art museum",
                "Day trip to Hakone for onsen and Mt. Fuji views",
                "Evening in Shinjuku's Omoide Yokocho",
            ],
        ),
        profile(
            "Paris",
            "France",
            "CDG",
            "Le Marais",
            260,
            &[
                "Louvre Museum with a timed-entry ticket",
                "Seine river cruise at dusk",
                "Montmartre and Sacre-Coeur walk",
                "Musee d'Orsay impressionist collection",
                "Day trip to Versailles",
            ],
        ),
        profile(
            "London",
            "United Kingdom",
            "LHR",
            "Covent Garden",
            250,
            &[
                "British Museum highlights tour",
                "Borough Market tasting walk",
                "Tower of London and the Crown Jewels",
                "West End theatre evening",
            ],
        ),
        profile(
            "New York",
            "United States",
            "JFK",
            "Midtown Manhattan",
            300,
            &[
                "Metropolitan Museum of Art",
                "Walk the High Line to Chelsea Market",
                "Sunset from Top of the Rock",
                "Brooklyn Bridge and DUMBO",
            ],
        ),
        profile(
            "Rome",
            "Italy",
            "FCO",
            "Monti",
            210,
            &[
                "Colosseum and Roman Forum guided visit",
                "Vatican Museums and Sistine Chapel",
                "Trastevere food tour",
                "Borghese Gallery and gardens",
            ],
        ),
        profile(
            "Barcelona",
            "Spain",
            "BCN",
            "El Born",
            200,
            &[
                "Sagrada Familia with tower access",
                "Park Guell morning visit",
                "Gothic Quarter tapas crawl",
                "Beach afternoon at Barceloneta",
            ],
        ),
        profile(
            "Amsterdam",
            "Netherlands",
            "AMS",
            "Jordaan",
            230,
            &[
                "Rijksmuseum Dutch masters",
                "Canal boat tour",
                "Anne Frank House",
                "Cycling trip to Zaanse Schans windmills",
            ],
        ),
        profile(
            "Vienna",
            "Austria",
            "VIE",
            "Innere Stadt",
            190,
            &[
                "Schonbrunn Palace and gardens",
                "Evening at the Vienna State Opera",
                "Coffee-house culture tasting",
                "Belvedere and Klimt's The Kiss",
            ],
        ),
        profile(
            "Prague",
            "Czech Republic",
            "PRG",
            "Mala Strana",
            150,
            &[
                "Prague Castle and St. Vitus Cathedral",
                "Charles Bridge at sunrise",
                "Old Town astronomical clock",
                "Czech beer and food tasting",
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city(name: &str) -> CityName {
        CityName::new(name).unwrap()
    }

    #[test]
    fn lookups_ignore_case() {
        let catalog = DestinationCatalog::builtin();
        assert!(catalog.knows(&city("tokyo")));
        assert_eq!(catalog.profile(&city("TOKYO")).country, "Japan");
    }

    #[test]
    fn unknown_destinations_get_a_generic_profile() {
        let catalog = DestinationCatalog::builtin();
        let profile = catalog.profile(&city("Reykjavik"));
        assert_eq!(profile.city, "Reykjavik");
        assert!(profile.highlights.len() >= 3);
        assert!(!catalog.knows(&city("Reykjavik")));
    }

    #[test]
    fn airports_resolve_for_origins_and_destinations() {
        let catalog = DestinationCatalog::builtin();
        assert_eq!(catalog.airport_for(&city("Seattle")), "SEA");
        assert_eq!(catalog.airport_for(&city("Tokyo")), "HND");
        assert_eq!(catalog.airport_for(&city("Nowhere")), "Nowhere main airport");
    }

    #[test]
    fn custom_entries_replace_builtins() {
        let mut catalog = DestinationCatalog::builtin();
        let mut custom = catalog.profile(&city("Tokyo"));
        custom.neighbourhood = "Ginza".into();
        catalog.insert(custom);
        assert_eq!(catalog.profile(&city("tokyo")).neighbourhood, "Ginza");
    }

    #[test]
    fn every_builtin_destination_has_enough_highlights() {
        let catalog = DestinationCatalog::builtin();
        for name in catalog.destination_names() {
            assert!(catalog.profile(&city(&name)).highlights.len() >= 3, "{name}");
        }
    }
}
