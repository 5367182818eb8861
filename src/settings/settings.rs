use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api: Api,
    pub session: Session,
    pub log: Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub base_url: String,
    pub timeout_ms: u64,
    pub endpoints: Endpoints,
    pub resources: Resources,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Endpoints {
    pub login: String,
    pub refresh: String,
    pub logout: String,
    pub validate: String,
    pub register: String,
}

/// Collection prefixes; item and action paths are appended to them.
#[derive(Debug, Clone, Deserialize)]
pub struct Resources {
    pub productos: String,
    pub users: String,
    pub categorias: String,
    pub historial: String,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            productos: "/productos".into(),
            users: "/users".into(),
            categorias: "/categorias".into(),
            historial: "/historial".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub backend: String, // "memory" or "file"
    pub path: String,
    pub refresh_low_water_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

const ENV_PREFIX: &str = "INVENTORY";

/// Layers built-in defaults, the TOML file and `INVENTORY__*` variables.
/// An explicit `path` must exist; the default one may be absent.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let file = match path {
        Some(path) => File::with_name(path).required(true),
        None => File::with_name(SETTINGS_PATH).required(false),
    };

    let settings: Settings = Config::builder()
        .set_default("api.base_url", "http://localhost:8080/api")?
        .set_default("api.timeout_ms", 10_000i64)?
        .set_default("api.endpoints.login", "/auth/login")?
        .set_default("api.endpoints.refresh", "/auth/refresh-token")?
        .set_default("api.endpoints.logout", "/auth/logout")?
        .set_default("api.endpoints.validate", "/auth/validate-token")?
        .set_default("api.endpoints.register", "/auth/register")?
        .set_default("api.resources.productos", "/productos")?
        .set_default("api.resources.users", "/users")?
        .set_default("api.resources.categorias", "/categorias")?
        .set_default("api.resources.historial", "/historial")?
        .set_default("session.backend", "file")?
        .set_default("session.path", ".inventory/session.json")?
        .set_default("session.refresh_low_water_secs", 300i64)?
        .set_default("log.filter", "info")?
        .add_source(file)
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
