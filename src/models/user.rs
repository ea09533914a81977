use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub is_staff: bool,
}
