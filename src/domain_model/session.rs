use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(pub String);

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(pub String);

// Tokens never end up in logs verbatim.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(..{})", tail(&self.0))
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefreshToken(..{})", tail(&self.0))
    }
}

fn tail(token: &str) -> &str {
    let start = token
        .char_indices()
        .rev()
        .nth(5)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &token[start..]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Administrador,
    Usuario,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrador => "ADMINISTRADOR",
            Role::Usuario => "USUARIO",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMINISTRADOR" => Ok(Role::Administrador),
            "USUARIO" => Ok(Role::Usuario),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Who is logged in, cached next to the tokens so it can be read without decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub username: String,
    pub email: String,
    pub nombre_completo: String,
    pub role: Role,
}

/// The complete client-side session. Either all of it is stored or none of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub expires_at: DateTime<Utc>,
    pub user: UserIdentity,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Body returned by login, refresh and validate. Error replies only carry `message`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre_completo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("auth response is missing `{0}`")]
pub struct IncompleteAuthResponse(pub &'static str);

impl AuthResponse {
    /// Builds a credential. `expires_at` falls back to the given claim expiry
    /// when the backend omits it.
    pub fn into_credential(
        self,
        claim_expiry: impl FnOnce(&AccessToken) -> Option<DateTime<Utc>>,
    ) -> Result<SessionCredential, IncompleteAuthResponse> {
        let access_token = AccessToken(self.access_token.ok_or(IncompleteAuthResponse("accessToken"))?);
        let refresh_token =
            RefreshToken(self.refresh_token.ok_or(IncompleteAuthResponse("refreshToken"))?);
        let expires_at = match self.expires_at {
            Some(at) => at,
            None => claim_expiry(&access_token).ok_or(IncompleteAuthResponse("expiresAt"))?,
        };
        let user = UserIdentity {
            username: self.username.ok_or(IncompleteAuthResponse("username"))?,
            email: self.email.unwrap_or_default(),
            nombre_completo: self.nombre_completo.unwrap_or_default(),
            role: self.role.ok_or(IncompleteAuthResponse("role"))?,
        };
        Ok(SessionCredential {
            access_token,
            refresh_token,
            expires_at,
            user,
        })
    }
}
