use crate::domain_model::{Role, UserIdentity};
use std::collections::HashMap;
use tracing::warn;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/dashboard";
pub const PUBLIC_PATHS: [&str; 3] = ["/login", "/register", "/forgot-password"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectToLogin,
    RedirectTo(String),
    /// Not allowed, and redirecting would land on the same page again.
    Denied,
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

/// Route-level access rules: public pages plus per-role path prefixes.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    role_routes: HashMap<Role, Vec<String>>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        let shared = ["/dashboard", "/productos", "/historial", "/reportes"];
        let mut role_routes = HashMap::new();
        role_routes.insert(
            Role::Administrador,
            shared
                .iter()
                .chain(["/usuarios"].iter())
                .map(|p| p.to_string())
                .collect(),
        );
        role_routes.insert(Role::Usuario, shared.iter().map(|p| p.to_string()).collect());
        Self { role_routes }
    }
}

/// `/productos` covers `/productos` and `/productos/7/stock`, not `/productosx`.
fn under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}

impl RouteGuard {
    pub fn new(role_routes: HashMap<Role, Vec<String>>) -> Self {
        Self { role_routes }
    }

    pub fn routes_for(&self, role: Role) -> &[String] {
        self.role_routes.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn role_allows(&self, role: Role, path: &str) -> bool {
        self.routes_for(role).iter().any(|prefix| under(path, prefix))
    }

    pub fn check(&self, path: &str, authenticated: bool, user: Option<&UserIdentity>) -> GuardDecision {
        if is_public(path) {
            return if authenticated {
                GuardDecision::RedirectTo(HOME_PATH.to_string())
            } else {
                GuardDecision::Allow
            };
        }
        if !authenticated {
            return GuardDecision::RedirectToLogin;
        }
        let Some(user) = user else {
            warn!(path, "authenticated session without a cached user");
            return GuardDecision::Denied;
        };
        if self.role_allows(user.role, path) {
            return GuardDecision::Allow;
        }
        warn!(role = %user.role, path, "route not allowed for role");
        redirect_home(path)
    }
}

fn redirect_home(path: &str) -> GuardDecision {
    if path == HOME_PATH {
        GuardDecision::Denied
    } else {
        GuardDecision::RedirectTo(HOME_PATH.to_string())
    }
}

/// Per-page role check, layered under [`RouteGuard::check`].
pub fn require_roles(
    allowed: &[Role],
    path: &str,
    authenticated: bool,
    user: Option<&UserIdentity>,
) -> GuardDecision {
    if !authenticated {
        return GuardDecision::RedirectToLogin;
    }
    match user {
        Some(user) if allowed.contains(&user.role) => GuardDecision::Allow,
        user => {
            warn!(
                role = user.map(|u| u.role.as_str()).unwrap_or("none"),
                path,
                "page requires another role"
            );
            redirect_home(path)
        }
    }
}
