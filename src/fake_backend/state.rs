use crate::domain_model::{
    Categoria, Movimiento, MovimientoUsuario, Producto, Role, TipoMovimiento, User,
};
use crate::fake_backend::error::BackendError;
use chrono::{Duration, Local, Utc};
use dashmap::DashMap;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    #[default]
    Accept,
    /// Refuse every refresh with 401.
    Reject,
    /// Answer every refresh with 500.
    Fail,
}

#[derive(Debug, Clone)]
pub struct FakeBackendConfig {
    pub signing_key: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for FakeBackendConfig {
    fn default() -> Self {
        Self {
            signing_key: b"inventory-fake-backend-key".to_vec(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: Role,
    exp: i64,
    iat: i64,
    jti: String,
    typ: TokenKind,
}

#[derive(Debug, Clone)]
pub struct StoredAccount {
    pub user: User,
    pub password: String,
}

/// The caller behind a verified bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub role: Role,
}

pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: chrono::DateTime<Utc>,
}

/// In-memory backend state plus the knobs tests turn.
pub struct BackendState {
    signing_key: Vec<u8>,
    access_ttl_secs: AtomicI64,
    refresh_ttl: Duration,

    pub(crate) accounts: DashMap<String, StoredAccount>,
    next_user_id: AtomicI64,
    live_refresh_jtis: DashMap<String, String>,

    pub(crate) productos: DashMap<i64, Producto>,
    next_producto_id: AtomicI64,
    pub(crate) categorias: DashMap<i64, Categoria>,
    next_categoria_id: AtomicI64,
    pub(crate) movimientos: DashMap<i64, Movimiento>,
    next_movimiento_id: AtomicI64,

    refresh_delay_ms: AtomicU64,
    refresh_mode: Mutex<RefreshMode>,
    reject_all_bearers: AtomicBool,
    paginate_users: AtomicBool,
    refresh_calls: AtomicUsize,
    accepted_bearers: Mutex<Vec<String>>,
}

impl BackendState {
    pub fn new(config: FakeBackendConfig) -> Self {
        let state = Self {
            signing_key: config.signing_key,
            access_ttl_secs: AtomicI64::new(config.access_ttl.num_seconds()),
            refresh_ttl: config.refresh_ttl,
            accounts: DashMap::new(),
            next_user_id: AtomicI64::new(1),
            live_refresh_jtis: DashMap::new(),
            productos: DashMap::new(),
            next_producto_id: AtomicI64::new(1),
            categorias: DashMap::new(),
            next_categoria_id: AtomicI64::new(1),
            movimientos: DashMap::new(),
            next_movimiento_id: AtomicI64::new(1),
            refresh_delay_ms: AtomicU64::new(0),
            refresh_mode: Mutex::new(RefreshMode::Accept),
            reject_all_bearers: AtomicBool::new(false),
            paginate_users: AtomicBool::new(true),
            refresh_calls: AtomicUsize::new(0),
            accepted_bearers: Mutex::new(Vec::new()),
        };
        state.seed();
        state
    }

    fn seed(&self) {
        self.insert_account(
            "admin",
            "admin123",
            "admin@inventario.test",
            "Administrador del Sistema",
            Role::Administrador,
        );
        self.insert_account(
            "usuario",
            "usuario123",
            "usuario@inventario.test",
            "Usuario Estándar",
            Role::Usuario,
        );
        for (nombre, descripcion) in [
            ("Electrónicos", "Productos electrónicos"),
            ("Laptops", "Computadoras portátiles"),
            ("Accesorios", "Accesorios diversos"),
        ] {
            let id = self.next_categoria_id.fetch_add(1, Ordering::SeqCst);
            self.categorias.insert(
                id,
                Categoria {
                    id: Some(id),
                    nombre: nombre.to_string(),
                    descripcion: Some(descripcion.to_string()),
                    activo: true,
                    fecha_creacion: Some(Local::now().naive_local()),
                    fecha_modificacion: None,
                    version: Some(0),
                    cantidad_productos: Some(0),
                },
            );
        }
    }

    pub(crate) fn insert_account(
        &self,
        username: &str,
        password: &str,
        email: &str,
        nombre_completo: &str,
        role: Role,
    ) -> User {
        let user = User {
            id: self.next_user_id.fetch_add(1, Ordering::SeqCst),
            username: username.to_string(),
            email: email.to_string(),
            nombre_completo: nombre_completo.to_string(),
            role,
            activo: true,
            fecha_creacion: Some(Local::now().naive_local()),
            ultimo_acceso: None,
        };
        self.accounts.insert(
            username.to_string(),
            StoredAccount {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        user
    }

    // region tokens

    fn encode_token(
        &self,
        username: &str,
        role: Role,
        ttl: Duration,
        typ: TokenKind,
    ) -> Result<(String, String, chrono::DateTime<Utc>), BackendError> {
        let iat = Utc::now();
        let exp = iat + ttl;
        let jti = Uuid::new_v4().to_string();
        let claims = Claims {
            sub: username.to_string(),
            role,
            exp: exp.timestamp(),
            iat: iat.timestamp(),
            jti: jti.clone(),
            typ,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.signing_key),
        )
        .map_err(BackendError::internal)?;
        Ok((token, jti, exp))
    }

    fn decode_token(&self, token: &str, expected: TokenKind) -> Option<Claims> {
        let mut v = Validation::new(Algorithm::HS256);
        v.leeway = 0;
        v.validate_exp = true;
        let claims = decode::<Claims>(token, &DecodingKey::from_secret(&self.signing_key), &v)
            .ok()?
            .claims;
        (claims.typ == expected).then_some(claims)
    }

    /// Signs an access token for `username` with an explicit lifetime.
    /// A negative `ttl` yields a token that is already expired.
    pub fn issue_access_token(&self, username: &str, ttl: Duration) -> Result<String, BackendError> {
        let role = self
            .accounts
            .get(username)
            .map(|account| account.user.role)
            .ok_or(BackendError::NotFound("Usuario no encontrado".into()))?;
        let (token, _, _) = self.encode_token(username, role, ttl, TokenKind::Access)?;
        Ok(token)
    }

    pub fn issue_tokens(&self, username: &str, role: Role) -> Result<IssuedTokens, BackendError> {
        let access_ttl = Duration::seconds(self.access_ttl_secs.load(Ordering::SeqCst));
        let (access_token, _, expires_at) =
            self.encode_token(username, role, access_ttl, TokenKind::Access)?;
        let (refresh_token, jti, _) =
            self.encode_token(username, role, self.refresh_ttl, TokenKind::Refresh)?;
        self.live_refresh_jtis.insert(jti, username.to_string());
        Ok(IssuedTokens {
            access_token,
            refresh_token,
            expires_at,
        })
    }

    /// Checks a refresh token and consumes it; each one works exactly once.
    pub fn consume_refresh_token(&self, token: &str) -> Option<AuthUser> {
        let claims = self.decode_token(token, TokenKind::Refresh)?;
        let (_, username) = self.live_refresh_jtis.remove(&claims.jti)?;
        let account = self.accounts.get(&username)?;
        account.user.activo.then(|| AuthUser {
            username: account.user.username.clone(),
            role: account.user.role,
        })
    }

    pub fn revoke_refresh_token(&self, token: &str) {
        if let Some(claims) = self.decode_token(token, TokenKind::Refresh) {
            self.live_refresh_jtis.remove(&claims.jti);
        }
    }

    pub fn verify_access_token(&self, token: &str) -> Option<AuthUser> {
        if self.reject_all_bearers.load(Ordering::SeqCst) {
            return None;
        }
        let claims = self.decode_token(token, TokenKind::Access)?;
        let account = self.accounts.get(&claims.sub)?;
        if !account.user.activo {
            return None;
        }
        if let Ok(mut accepted) = self.accepted_bearers.lock() {
            accepted.push(token.to_string());
        }
        Some(AuthUser {
            username: claims.sub,
            role: account.user.role,
        })
    }

    // endregion

    // region knobs

    pub fn set_access_ttl(&self, ttl: Duration) {
        self.access_ttl_secs.store(ttl.num_seconds(), Ordering::SeqCst);
    }

    pub fn set_refresh_delay(&self, delay: std::time::Duration) {
        self.refresh_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn refresh_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.refresh_delay_ms.load(Ordering::SeqCst))
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        if let Ok(mut current) = self.refresh_mode.lock() {
            *current = mode;
        }
    }

    pub fn refresh_mode(&self) -> RefreshMode {
        self.refresh_mode
            .lock()
            .map(|mode| *mode)
            .unwrap_or_default()
    }

    pub fn set_reject_all_bearers(&self, reject: bool) {
        self.reject_all_bearers.store(reject, Ordering::SeqCst);
    }

    pub fn set_paginate_users(&self, paginate: bool) {
        self.paginate_users.store(paginate, Ordering::SeqCst);
    }

    pub fn paginates_users(&self) -> bool {
        self.paginate_users.load(Ordering::SeqCst)
    }

    pub(crate) fn count_refresh_call(&self) {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn accepted_bearers(&self) -> Vec<String> {
        self.accepted_bearers
            .lock()
            .map(|accepted| accepted.clone())
            .unwrap_or_default()
    }

    // endregion

    // region inventory

    pub(crate) fn next_producto_id(&self) -> i64 {
        self.next_producto_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn next_categoria_id(&self) -> i64 {
        self.next_categoria_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn record_movimiento(
        &self,
        producto: &Producto,
        actor: &AuthUser,
        tipo_movimiento: TipoMovimiento,
        cantidad: i32,
    ) {
        let id = self.next_movimiento_id.fetch_add(1, Ordering::SeqCst);
        let usuario = self.accounts.get(&actor.username).map(|account| MovimientoUsuario {
            id: Some(account.user.id),
            username: account.user.username.clone(),
            nombre_completo: account.user.nombre_completo.clone(),
        });
        self.movimientos.insert(
            id,
            Movimiento {
                id,
                producto: producto.clone(),
                usuario,
                tipo_movimiento,
                cantidad,
                fecha: Local::now().naive_local(),
            },
        );
    }

    // endregion
}
