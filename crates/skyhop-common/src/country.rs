//! Country identifiers used by connect intents

use serde::{Deserialize, Serialize};

/// A country slot in a connect intent.
///
/// Besides a concrete 2-letter code the slot can hold the "fastest"
/// wildcard or the "fastest excluding the country I am physically in"
/// variant used to force an out-of-country exit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CountryId {
    Fastest,
    FastestExcludingMyCountry,
    Code(String),
}

impl CountryId {
    /// Concrete country from an ISO 3166-1 alpha-2 code
    pub fn code(code: impl Into<String>) -> Self {
        CountryId::Code(code.into())
    }

    pub fn is_fastest(&self) -> bool {
        !matches!(self, CountryId::Code(_))
    }

    pub fn is_fastest_excluding_my_country(&self) -> bool {
        matches!(self, CountryId::FastestExcludingMyCountry)
    }

    /// The country code, if this slot is concrete
    pub fn country_code(&self) -> Option<&str> {
        match self {
            CountryId::Code(code) => Some(code),
            _ => None,
        }
    }
}
