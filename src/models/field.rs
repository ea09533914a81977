use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub id: i64,
    pub name: String,
    pub sport_type: SportType,
    pub price_per_session: i64,
    pub location: String,
    pub is_active: bool,
    pub capacity: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SportType {
    Football,
    Tennis,
    Basketball,
}

impl SportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SportType::Football => "football",
            SportType::Tennis => "tennis",
            SportType::Basketball => "basketball",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "football" => Some(SportType::Football),
            "tennis" => Some(SportType::Tennis),
            "basketball" => Some(SportType::Basketball),
            _ => None,
        }
    }
}

/// Writable part of a field record.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldInput {
    pub name: String,
    pub sport_type: SportType,
    pub price_per_session: i64,
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_capacity")]
    pub capacity: i64,
}

fn default_true() -> bool {
    true
}

fn default_capacity() -> i64 {
    1
}

/// Upper bound on a session price, in whole currency units.
pub const MAX_PRICE_PER_SESSION: i64 = 1_000_000_000;

impl FieldInput {
    pub fn validate(&self) -> Result<(), (&'static str, String)> {
        if self.name.trim().is_empty() {
            return Err(("name", "Name is required.".to_string()));
        }
        if self.price_per_session < 0 {
            return Err(("price_per_session", "Price cannot be negative.".to_string()));
        }
        if self.price_per_session > MAX_PRICE_PER_SESSION {
            return Err((
                "price_per_session",
                format!("Price cannot exceed {MAX_PRICE_PER_SESSION}."),
            ));
        }
        if self.capacity < 1 {
            return Err(("capacity", "Capacity must be at least 1.".to_string()));
        }
        Ok(())
    }
}
