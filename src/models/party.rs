use serde::{Deserialize, Serialize};

/// Who a series or booking belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Party {
    Registered {
        user_id: i64,
    },
    Guest {
        name: String,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        phone: Option<String>,
    },
}

/// Column layout used by the `series` and `bookings` tables.
pub struct PartyColumns<'a> {
    pub user_id: Option<i64>,
    pub guest_name: Option<&'a str>,
    pub guest_email: Option<&'a str>,
    pub guest_phone: Option<&'a str>,
}

impl Party {
    pub fn columns(&self) -> PartyColumns<'_> {
        match self {
            Party::Registered { user_id } => PartyColumns {
                user_id: Some(*user_id),
                guest_name: None,
                guest_email: None,
                guest_phone: None,
            },
            Party::Guest { name, email, phone } => PartyColumns {
                user_id: None,
                guest_name: Some(name.as_str()),
                guest_email: email.as_deref(),
                guest_phone: phone.as_deref(),
            },
        }
    }

    /// A row whose user was deleted falls back to whatever guest contact it kept.
    pub fn from_columns(
        user_id: Option<i64>,
        guest_name: Option<String>,
        guest_email: Option<String>,
        guest_phone: Option<String>,
    ) -> Self {
        match user_id {
            Some(user_id) => Party::Registered { user_id },
            None => Party::Guest {
                name: guest_name.unwrap_or_default(),
                email: guest_email,
                phone: guest_phone,
            },
        }
    }
}
