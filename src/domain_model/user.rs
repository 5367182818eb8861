use crate::domain_model::Role;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub nombre_completo: String,
    pub role: Role,
    pub activo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fecha_creacion: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ultimo_acceso: Option<NaiveDateTime>,
}

impl User {
    /// Case-insensitive match on username, email or full name.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.username.to_lowercase().contains(&term)
            || self.email.to_lowercase().contains(&term)
            || self.nombre_completo.to_lowercase().contains(&term)
    }
}

/// Admin-side account creation, sent to the register endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserForm {
    pub username: String,
    pub password: String,
    pub email: String,
    pub nombre_completo: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombre_completo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activo: Option<bool>,
}
