use super::error::*;
use super::handler;
use super::state::{AuthUser, BackendState};
use crate::domain_model::Role;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

pub fn routes(
    state: Arc<BackendState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path("api").and(
        auth_routes(state.clone())
            .or(producto_routes(state.clone()))
            .or(user_routes(state.clone()))
            .or(historial_routes(state.clone()))
            .or(categoria_routes(state)),
    )
}

fn auth_routes(
    state: Arc<BackendState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let login = warp::path!("auth" / "login")
        .and(warp::post())
        .and(warp::body::json())
        .and(with(state.clone()))
        .and_then(handler::login);

    let refresh = warp::path!("auth" / "refresh-token")
        .and(warp::post())
        .and(warp::body::json())
        .and(with(state.clone()))
        .and_then(handler::refresh_token);

    let logout = warp::path!("auth" / "logout")
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with(state.clone()))
        .and_then(handler::logout);

    let validate = warp::path!("auth" / "validate-token")
        .and(warp::post().or(warp::get()).unify())
        .and(with_verification(state.clone()))
        .and(with(state.clone()))
        .and_then(handler::validate_token);

    let register = warp::path!("auth" / "register")
        .and(warp::post())
        .and(with_admin(state.clone()))
        .and(warp::body::json())
        .and(with(state))
        .and_then(handler::register);

    login.or(refresh).or(logout).or(validate).or(register)
}

fn producto_routes(
    state: Arc<BackendState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let list = warp::path!("productos")
        .and(warp::get())
        .and(warp::query::<handler::PageQuery>())
        .and(with_verification(state.clone()))
        .and(with(state.clone()))
        .and_then(handler::list_productos);

    let buscar = warp::path!("productos" / "buscar")
        .and(warp::get())
        .and(warp::query::<handler::BuscarQuery>())
        .and(with_verification(state.clone()))
        .and(with(state.clone()))
        .and_then(handler::search_productos);

    let stock_bajo = warp::path!("productos" / "stock-bajo")
        .and(warp::get())
        .and(warp::query::<handler::MinimoQuery>())
        .and(with_verification(state.clone()))
        .and(with(state.clone()))
        .and_then(handler::stock_bajo);

    let categorias = warp::path!("productos" / "categorias")
        .and(warp::get())
        .and(with_verification(state.clone()))
        .and(with(state.clone()))
        .and_then(handler::producto_categorias);

    let valor_total = warp::path!("productos" / "valor-total")
        .and(warp::get())
        .and(with_verification(state.clone()))
        .and(with(state.clone()))
        .and_then(handler::valor_total);

    let get = warp::path!("productos" / i64)
        .and(warp::get())
        .and(with_verification(state.clone()))
        .and(with(state.clone()))
        .and_then(handler::get_producto);

    let create = warp::path!("productos")
        .and(warp::post())
        .and(with_verification(state.clone()))
        .and(warp::body::json())
        .and(with(state.clone()))
        .and_then(handler::create_producto);

    let update = warp::path!("productos" / i64)
        .and(warp::put())
        .and(with_verification(state.clone()))
        .and(warp::body::json())
        .and(with(state.clone()))
        .and_then(handler::update_producto);

    let stock = warp::path!("productos" / i64 / "stock")
        .and(warp::patch())
        .and(warp::query::<handler::StockQuery>())
        .and(with_verification(state.clone()))
        .and(with(state.clone()))
        .and_then(handler::update_stock);

    let delete = warp::path!("productos" / i64)
        .and(warp::delete())
        .and(with_verification(state.clone()))
        .and(with(state))
        .and_then(handler::delete_producto);

    list.or(buscar)
        .or(stock_bajo)
        .or(categorias)
        .or(valor_total)
        .or(get)
        .or(create)
        .or(update)
        .or(stock)
        .or(delete)
}

// No search route: clients are expected to cope with a backend that only lists.
fn user_routes(
    state: Arc<BackendState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let list = warp::path!("users")
        .and(warp::get())
        .and(warp::query::<handler::PageQuery>())
        .and(with_admin(state.clone()))
        .and(with(state.clone()))
        .and_then(handler::list_users);

    let get = warp::path!("users" / i64)
        .and(warp::get())
        .and(with_admin(state.clone()))
        .and(with(state.clone()))
        .and_then(handler::get_user);

    let update = warp::path!("users" / i64)
        .and(warp::put())
        .and(with_admin(state.clone()))
        .and(warp::body::json())
        .and(with(state.clone()))
        .and_then(handler::update_user);

    let delete = warp::path!("users" / i64)
        .and(warp::delete())
        .and(with_admin(state.clone()))
        .and(with(state))
        .and_then(handler::delete_user);

    list.or(get).or(update).or(delete)
}

fn historial_routes(
    state: Arc<BackendState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path!("historial")
        .and(warp::get())
        .and(warp::query::<handler::HistorialParams>())
        .and(with_verification(state.clone()))
        .and(with(state))
        .and_then(handler::list_historial)
}

fn categoria_routes(
    state: Arc<BackendState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let activas = warp::path!("categorias" / "activas")
        .and(warp::get())
        .and(with_verification(state.clone()))
        .and(with(state.clone()))
        .and_then(handler::categorias_activas);

    let buscar = warp::path!("categorias" / "buscar")
        .and(warp::get())
        .and(warp::query::<handler::NombreQuery>())
        .and(with_verification(state.clone()))
        .and(with(state.clone()))
        .and_then(handler::buscar_categorias);

    let list = warp::path!("categorias")
        .and(warp::get())
        .and(warp::query::<handler::PageQuery>())
        .and(with_verification(state.clone()))
        .and(with(state.clone()))
        .and_then(handler::list_categorias);

    let get = warp::path!("categorias" / i64)
        .and(warp::get())
        .and(with_verification(state.clone()))
        .and(with(state.clone()))
        .and_then(handler::get_categoria);

    let create = warp::path!("categorias")
        .and(warp::post())
        .and(with_admin(state.clone()))
        .and(warp::body::json())
        .and(with(state.clone()))
        .and_then(handler::create_categoria);

    let update = warp::path!("categorias" / i64)
        .and(warp::put())
        .and(with_admin(state.clone()))
        .and(warp::body::json())
        .and(with(state.clone()))
        .and_then(handler::update_categoria);

    let delete = warp::path!("categorias" / i64)
        .and(warp::delete())
        .and(with_admin(state.clone()))
        .and(with(state))
        .and_then(handler::delete_categoria);

    activas
        .or(buscar)
        .or(list)
        .or(get)
        .or(create)
        .or(update)
        .or(delete)
}

fn with<T>(value: Arc<T>) -> impl Filter<Extract = (Arc<T>,), Error = Infallible> + Clone
where
    T: Send + Sync + ?Sized,
{
    warp::any().map(move || value.clone())
}

/// A missing or non-bearer `Authorization` header is a 403, a bad token a 401.
fn with_verification(
    state: Arc<BackendState>,
) -> impl Filter<Extract = (AuthUser,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_str()).and_then(
        move |header: Option<String>| {
            let state = state.clone();
            async move {
                let Some(token) = header.as_deref().and_then(|h| h.strip_prefix("Bearer ")) else {
                    return Err(reject::custom(BackendError::MissingToken));
                };
                state
                    .verify_access_token(token)
                    .ok_or_else(|| reject::custom(BackendError::InvalidToken))
            }
        },
    )
}

fn with_admin(
    state: Arc<BackendState>,
) -> impl Filter<Extract = (AuthUser,), Error = warp::Rejection> + Clone {
    with_verification(state).and_then(|caller: AuthUser| async move {
        if caller.role == Role::Administrador {
            Ok(caller)
        } else {
            Err(reject::custom(BackendError::InsufficientRole))
        }
    })
}
