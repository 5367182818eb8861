use super::error::*;
use super::state::{AuthUser, BackendState, IssuedTokens, RefreshMode};
use crate::domain_model::{
    AuthResponse, Categoria, CategoriaForm, Movimiento, Page, Producto, ProductoFilters,
    ProductoForm, TipoMovimiento, User, UserForm, UserUpdate,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::{self, reject};

type HandlerResult<T> = Result<T, warp::Rejection>;

fn fail(error: BackendError) -> warp::Rejection {
    reject::custom(error)
}

const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl PageQuery {
    fn paged(&self) -> bool {
        self.page.is_some() || self.size.is_some()
    }

    fn slice<T: Clone>(&self, items: &[T]) -> Page<T> {
        Page::from_slice(
            items,
            self.page.unwrap_or(0),
            self.size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }
}

// region auth

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshBody {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
struct MessageBody {
    message: &'static str,
}

fn auth_response(tokens: IssuedTokens, user: &User) -> AuthResponse {
    AuthResponse {
        access_token: Some(tokens.access_token),
        refresh_token: Some(tokens.refresh_token),
        token_type: Some("Bearer".to_string()),
        expires_at: Some(tokens.expires_at),
        username: Some(user.username.clone()),
        email: Some(user.email.clone()),
        nombre_completo: Some(user.nombre_completo.clone()),
        role: Some(user.role),
        message: Some("Autenticación exitosa".to_string()),
    }
}

fn account_user(state: &BackendState, username: &str) -> HandlerResult<User> {
    state
        .accounts
        .get(username)
        .map(|account| account.user.clone())
        .ok_or_else(|| fail(BackendError::InvalidToken))
}

pub async fn login(body: LoginBody, state: Arc<BackendState>) -> HandlerResult<impl warp::Reply> {
    let user = {
        let mut account = state
            .accounts
            .get_mut(&body.username)
            .filter(|account| account.password == body.password)
            .ok_or_else(|| fail(BackendError::BadRequest("Credenciales inválidas".into())))?;
        if !account.user.activo {
            return Err(fail(BackendError::BadRequest("Cuenta deshabilitada".into())));
        }
        account.user.ultimo_acceso = Some(Local::now().naive_local());
        account.user.clone()
    };

    let tokens = state
        .issue_tokens(&user.username, user.role)
        .map_err(fail)?;
    info!(username = %user.username, "fake backend login");
    Ok(warp::reply::json(&auth_response(tokens, &user)))
}

pub async fn refresh_token(
    body: RefreshBody,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    state.count_refresh_call();
    let delay = state.refresh_delay();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    match state.refresh_mode() {
        RefreshMode::Accept => {}
        RefreshMode::Reject => return Err(fail(BackendError::InvalidToken)),
        RefreshMode::Fail => return Err(fail(BackendError::Internal)),
    }

    let caller = state
        .consume_refresh_token(&body.refresh_token)
        .ok_or_else(|| fail(BackendError::BadRequest("Token de refresco inválido".into())))?;
    let user = account_user(&state, &caller.username)?;
    let tokens = state
        .issue_tokens(&user.username, user.role)
        .map_err(fail)?;
    debug!(username = %user.username, "fake backend rotated refresh token");
    Ok(warp::reply::json(&auth_response(tokens, &user)))
}

/// The body is optional; when it names a refresh token, that token is revoked.
pub async fn logout(body: Bytes, state: Arc<BackendState>) -> HandlerResult<impl warp::Reply> {
    if let Ok(RefreshBody { refresh_token }) = serde_json::from_slice::<RefreshBody>(&body) {
        state.revoke_refresh_token(&refresh_token);
    }
    Ok(warp::reply::json(&MessageBody {
        message: "Sesión cerrada exitosamente",
    }))
}

pub async fn validate_token(
    caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let user = account_user(&state, &caller.username)?;
    Ok(warp::reply::json(&AuthResponse {
        username: Some(user.username),
        email: Some(user.email),
        nombre_completo: Some(user.nombre_completo),
        role: Some(user.role),
        message: Some("Token válido".to_string()),
        ..Default::default()
    }))
}

pub async fn register(
    caller: AuthUser,
    body: UserForm,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    if state.accounts.contains_key(&body.username) {
        return Err(fail(BackendError::Conflict(
            "El nombre de usuario ya existe".into(),
        )));
    }
    if state
        .accounts
        .iter()
        .any(|account| account.user.email.eq_ignore_ascii_case(&body.email))
    {
        return Err(fail(BackendError::Conflict("El email ya está registrado".into())));
    }
    let user = state.insert_account(
        &body.username,
        &body.password,
        &body.email,
        &body.nombre_completo,
        body.role,
    );
    info!(by = %caller.username, username = %user.username, "fake backend registered user");
    Ok(warp::reply::with_status(
        warp::reply::json(&user),
        StatusCode::CREATED,
    ))
}

// endregion

// region productos

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuscarQuery {
    pub nombre: Option<String>,
    pub categoria: Option<String>,
    pub precio_min: Option<f64>,
    pub precio_max: Option<f64>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StockQuery {
    pub cantidad: i32,
}

#[derive(Debug, Deserialize)]
pub struct MinimoQuery {
    pub minimo: Option<i32>,
}

fn active_productos(state: &BackendState) -> Vec<Producto> {
    let mut productos: Vec<Producto> = state
        .productos
        .iter()
        .filter(|p| p.activo)
        .map(|p| p.value().clone())
        .collect();
    productos.sort_by_key(|p| p.id);
    productos
}

fn producto_not_found(id: i64) -> warp::Rejection {
    fail(BackendError::NotFound(format!(
        "Producto no encontrado con ID: {id}"
    )))
}

fn check_producto_form(form: &ProductoForm) -> Result<(), BackendError> {
    if form.nombre.trim().is_empty() {
        return Err(BackendError::BadRequest("El nombre es obligatorio".into()));
    }
    if form.precio.is_nan() || form.precio <= 0.0 {
        return Err(BackendError::BadRequest("El precio debe ser mayor que 0".into()));
    }
    if form.cantidad_inicial < 0 {
        return Err(BackendError::BadRequest(
            "La cantidad inicial no puede ser negativa".into(),
        ));
    }
    Ok(())
}

pub async fn list_productos(
    query: PageQuery,
    _caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    Ok(warp::reply::json(&query.slice(&active_productos(&state))))
}

pub async fn search_productos(
    query: BuscarQuery,
    _caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let filters = ProductoFilters {
        nombre: query.nombre.filter(|s| !s.is_empty()),
        categoria: query.categoria.filter(|s| !s.is_empty()),
        precio_min: query.precio_min,
        precio_max: query.precio_max,
    };
    let matching: Vec<Producto> = active_productos(&state)
        .into_iter()
        .filter(|p| filters.matches(p))
        .collect();
    let page = PageQuery {
        page: query.page,
        size: query.size,
    };
    Ok(warp::reply::json(&page.slice(&matching)))
}

pub async fn get_producto(
    id: i64,
    _caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let producto = state
        .productos
        .get(&id)
        .map(|p| p.value().clone())
        .ok_or_else(|| producto_not_found(id))?;
    Ok(warp::reply::json(&producto))
}

pub async fn create_producto(
    caller: AuthUser,
    form: ProductoForm,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    check_producto_form(&form).map_err(fail)?;
    if state
        .productos
        .iter()
        .any(|p| p.activo && p.nombre.eq_ignore_ascii_case(&form.nombre))
    {
        return Err(fail(BackendError::Conflict(format!(
            "Ya existe un producto con el nombre: {}",
            form.nombre
        ))));
    }

    let id = state.next_producto_id();
    let producto = Producto {
        id: Some(id),
        nombre: form.nombre,
        descripcion: Some(form.descripcion).filter(|d| !d.is_empty()),
        categoria: form.categoria,
        precio: form.precio,
        cantidad_inicial: form.cantidad_inicial,
        cantidad_actual: form.cantidad_inicial,
        unidad_medida: if form.unidad_medida.is_empty() {
            "UNIDAD".to_string()
        } else {
            form.unidad_medida
        },
        activo: true,
        sku: Some(format!("SKU-{id:05}")),
        fecha_creacion: Some(Local::now().naive_local()),
        fecha_modificacion: None,
        version: Some(0),
    };
    state.productos.insert(id, producto.clone());
    if producto.cantidad_inicial > 0 {
        state.record_movimiento(
            &producto,
            &caller,
            TipoMovimiento::Entrada,
            producto.cantidad_inicial,
        );
    }
    Ok(warp::reply::with_status(
        warp::reply::json(&producto),
        StatusCode::CREATED,
    ))
}

pub async fn update_producto(
    id: i64,
    _caller: AuthUser,
    form: ProductoForm,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    check_producto_form(&form).map_err(fail)?;
    let mut producto = state
        .productos
        .get_mut(&id)
        .ok_or_else(|| producto_not_found(id))?;
    producto.nombre = form.nombre;
    producto.descripcion = Some(form.descripcion).filter(|d| !d.is_empty());
    producto.categoria = form.categoria;
    producto.precio = form.precio;
    if !form.unidad_medida.is_empty() {
        producto.unidad_medida = form.unidad_medida;
    }
    producto.fecha_modificacion = Some(Local::now().naive_local());
    producto.version = Some(producto.version.unwrap_or(0) + 1);
    Ok(warp::reply::json(producto.value()))
}

pub async fn update_stock(
    id: i64,
    query: StockQuery,
    caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    if query.cantidad == 0 {
        return Err(fail(BackendError::BadRequest(
            "La cantidad no puede ser 0".into(),
        )));
    }
    let updated = {
        let mut producto = state
            .productos
            .get_mut(&id)
            .ok_or_else(|| producto_not_found(id))?;
        if !producto.activo {
            return Err(fail(BackendError::BadRequest(
                "No se puede actualizar stock de un producto inactivo".into(),
            )));
        }
        let nueva = producto.cantidad_actual + query.cantidad;
        if nueva < 0 {
            return Err(fail(BackendError::BadRequest("Stock insuficiente".into())));
        }
        producto.cantidad_actual = nueva;
        producto.fecha_modificacion = Some(Local::now().naive_local());
        producto.value().clone()
    };
    state.record_movimiento(
        &updated,
        &caller,
        TipoMovimiento::for_adjustment(query.cantidad),
        query.cantidad.abs(),
    );
    Ok(warp::reply::json(&updated))
}

/// Soft delete: the product stays for history but leaves every listing.
pub async fn delete_producto(
    id: i64,
    _caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let mut producto = state
        .productos
        .get_mut(&id)
        .ok_or_else(|| producto_not_found(id))?;
    producto.activo = false;
    Ok(warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT))
}

pub async fn stock_bajo(
    query: MinimoQuery,
    _caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let minimo = query.minimo.unwrap_or(10);
    let bajos: Vec<Producto> = active_productos(&state)
        .into_iter()
        .filter(|p| p.cantidad_actual < minimo)
        .collect();
    Ok(warp::reply::json(&bajos))
}

pub async fn producto_categorias(
    _caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let mut categorias: Vec<String> = active_productos(&state)
        .into_iter()
        .map(|p| p.categoria)
        .collect();
    categorias.sort();
    categorias.dedup();
    Ok(warp::reply::json(&categorias))
}

pub async fn valor_total(
    _caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let total: f64 = active_productos(&state)
        .iter()
        .map(|p| p.precio * f64::from(p.cantidad_actual))
        .sum();
    Ok(warp::reply::json(&total))
}

// endregion

// region users

fn sorted_users(state: &BackendState) -> Vec<User> {
    let mut users: Vec<User> = state.accounts.iter().map(|a| a.user.clone()).collect();
    users.sort_by_key(|u| u.id);
    users
}

fn user_not_found(id: i64) -> warp::Rejection {
    fail(BackendError::NotFound(format!(
        "Usuario no encontrado con ID: {id}"
    )))
}

fn username_for_id(state: &BackendState, id: i64) -> HandlerResult<String> {
    state
        .accounts
        .iter()
        .find(|account| account.user.id == id)
        .map(|account| account.key().clone())
        .ok_or_else(|| user_not_found(id))
}

/// Pages only when asked to and when the pagination knob is on; otherwise
/// answers with the bare list, like backends that predate pagination.
pub async fn list_users(
    query: PageQuery,
    _caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let users = sorted_users(&state);
    if query.paged() && state.paginates_users() {
        Ok(warp::reply::json(&query.slice(&users)))
    } else {
        Ok(warp::reply::json(&users))
    }
}

pub async fn get_user(
    id: i64,
    _caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let user = state
        .accounts
        .iter()
        .find(|account| account.user.id == id)
        .map(|account| account.user.clone())
        .ok_or_else(|| user_not_found(id))?;
    Ok(warp::reply::json(&user))
}

pub async fn update_user(
    id: i64,
    _caller: AuthUser,
    update: UserUpdate,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let username = username_for_id(&state, id)?;
    let mut account = state
        .accounts
        .get_mut(&username)
        .ok_or_else(|| user_not_found(id))?;
    if let Some(email) = update.email {
        account.user.email = email;
    }
    if let Some(nombre_completo) = update.nombre_completo {
        account.user.nombre_completo = nombre_completo;
    }
    if let Some(role) = update.role {
        account.user.role = role;
    }
    if let Some(activo) = update.activo {
        account.user.activo = activo;
    }
    Ok(warp::reply::json(&account.user))
}

pub async fn delete_user(
    id: i64,
    caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let username = username_for_id(&state, id)?;
    if username == caller.username {
        return Err(fail(BackendError::BadRequest(
            "No puede eliminar su propio usuario".into(),
        )));
    }
    state.accounts.remove(&username);
    Ok(warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT))
}

// endregion

// region historial

#[derive(Debug, Deserialize)]
pub struct HistorialParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

fn sort_movimientos(movimientos: &mut [Movimiento], sort: Option<&str>) {
    let (field, direction) = sort
        .and_then(|s| s.split_once(','))
        .unwrap_or(("fecha", "desc"));
    match field {
        "id" => movimientos.sort_by_key(|m| m.id),
        "cantidad" => movimientos.sort_by_key(|m| m.cantidad),
        _ => movimientos.sort_by_key(|m| (m.fecha, m.id)),
    }
    if direction.eq_ignore_ascii_case("desc") {
        movimientos.reverse();
    }
}

pub async fn list_historial(
    params: HistorialParams,
    _caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let mut movimientos: Vec<Movimiento> =
        state.movimientos.iter().map(|m| m.value().clone()).collect();
    sort_movimientos(&mut movimientos, params.sort.as_deref());
    let page = PageQuery {
        page: params.page,
        size: params.size,
    };
    Ok(warp::reply::json(&page.slice(&movimientos)))
}

// endregion

// region categorias

#[derive(Debug, Deserialize)]
pub struct NombreQuery {
    pub nombre: String,
}

fn with_product_count(state: &BackendState, mut categoria: Categoria) -> Categoria {
    let count = state
        .productos
        .iter()
        .filter(|p| p.activo && p.categoria.eq_ignore_ascii_case(&categoria.nombre))
        .count();
    categoria.cantidad_productos = Some(count as i64);
    categoria
}

fn categorias_where(state: &BackendState, keep: impl Fn(&Categoria) -> bool) -> Vec<Categoria> {
    let mut categorias: Vec<Categoria> = state
        .categorias
        .iter()
        .filter(|c| keep(c.value()))
        .map(|c| with_product_count(state, c.value().clone()))
        .collect();
    categorias.sort_by_key(|c| c.id);
    categorias
}

fn categoria_not_found(id: i64) -> warp::Rejection {
    fail(BackendError::NotFound(format!(
        "Categoría no encontrada con ID: {id}"
    )))
}

fn check_categoria_nombre(state: &BackendState, nombre: &str, except: Option<i64>) -> HandlerResult<()> {
    if nombre.trim().is_empty() {
        return Err(fail(BackendError::BadRequest("El nombre es obligatorio".into())));
    }
    let taken = state
        .categorias
        .iter()
        .any(|c| c.nombre.eq_ignore_ascii_case(nombre) && c.id != except);
    if taken {
        return Err(fail(BackendError::Conflict(format!(
            "Ya existe una categoría con el nombre: {nombre}"
        ))));
    }
    Ok(())
}

pub async fn categorias_activas(
    _caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let mut activas = categorias_where(&state, |c| c.activo);
    activas.sort_by(|a, b| a.nombre.cmp(&b.nombre));
    Ok(warp::reply::json(&activas))
}

pub async fn list_categorias(
    query: PageQuery,
    _caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let all = categorias_where(&state, |_| true);
    Ok(warp::reply::json(&query.slice(&all)))
}

pub async fn get_categoria(
    id: i64,
    _caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let categoria = state
        .categorias
        .get(&id)
        .map(|c| c.value().clone())
        .ok_or_else(|| categoria_not_found(id))?;
    Ok(warp::reply::json(&with_product_count(&state, categoria)))
}

pub async fn create_categoria(
    _caller: AuthUser,
    form: CategoriaForm,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    check_categoria_nombre(&state, &form.nombre, None)?;
    let id = state.next_categoria_id();
    let categoria = Categoria {
        id: Some(id),
        nombre: form.nombre,
        descripcion: Some(form.descripcion).filter(|d| !d.is_empty()),
        activo: form.activo.unwrap_or(true),
        fecha_creacion: Some(Local::now().naive_local()),
        fecha_modificacion: None,
        version: Some(0),
        cantidad_productos: Some(0),
    };
    state.categorias.insert(id, categoria.clone());
    Ok(warp::reply::with_status(
        warp::reply::json(&categoria),
        StatusCode::CREATED,
    ))
}

pub async fn update_categoria(
    id: i64,
    _caller: AuthUser,
    form: CategoriaForm,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    check_categoria_nombre(&state, &form.nombre, Some(id))?;
    let updated = {
        let mut categoria = state
            .categorias
            .get_mut(&id)
            .ok_or_else(|| categoria_not_found(id))?;
        categoria.nombre = form.nombre;
        categoria.descripcion = Some(form.descripcion).filter(|d| !d.is_empty());
        if let Some(activo) = form.activo {
            categoria.activo = activo;
        }
        categoria.fecha_modificacion = Some(Local::now().naive_local());
        categoria.version = Some(categoria.version.unwrap_or(0) + 1);
        categoria.value().clone()
    };
    Ok(warp::reply::json(&with_product_count(&state, updated)))
}

pub async fn delete_categoria(
    id: i64,
    _caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let mut categoria = state
        .categorias
        .get_mut(&id)
        .ok_or_else(|| categoria_not_found(id))?;
    categoria.activo = false;
    Ok(warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT))
}

pub async fn buscar_categorias(
    query: NombreQuery,
    _caller: AuthUser,
    state: Arc<BackendState>,
) -> HandlerResult<impl warp::Reply> {
    let needle = query.nombre.to_lowercase();
    let found = categorias_where(&state, |c| c.nombre.to_lowercase().contains(&needle));
    Ok(warp::reply::json(&found))
}

// endregion
