use anyhow::anyhow;
use inventory_client::application_impl::*;
use inventory_client::application_port::*;
use inventory_client::domain_model::{HistorialQuery, ProductoFilters, ProductoForm};
use inventory_client::domain_port::KeyValueStore;
use inventory_client::gateway::{ApiGateway, GatewayConfig};
use inventory_client::guard::{GuardDecision, RouteGuard};
use inventory_client::infra::*;
use inventory_client::logger::*;
use inventory_client::session::TokenStore;
use inventory_client::settings::*;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    debug!(?project_settings);
    let logger_config = LogConfig {
        filter: project_settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    let storage: Arc<dyn KeyValueStore> = match project_settings.session.backend.as_str() {
        "memory" => Arc::new(MemoryKeyValueStore::new()),
        "file" => Arc::new(FileKeyValueStore::open(&project_settings.session.path)?),
        other => return Err(anyhow!("Unknown session backend: {}", other)),
    };
    let tokens = Arc::new(TokenStore::with_low_water(
        storage,
        project_settings.session.refresh_low_water_secs,
    ));
    let gateway = ApiGateway::new(GatewayConfig::from(&project_settings.api), tokens)?;

    Console::new(gateway).run(cli.command).await
}

struct Console {
    auth_service: Arc<dyn AuthService>,
    producto_service: Arc<dyn ProductoService>,
    user_service: Arc<dyn UserService>,
    categoria_service: Arc<dyn CategoriaService>,
    historial_service: Arc<dyn HistorialService>,
    guard: RouteGuard,
}

impl Console {
    fn new(gateway: Arc<ApiGateway>) -> Self {
        Self {
            auth_service: Arc::new(RealAuthService::new(gateway.clone())),
            producto_service: Arc::new(RealProductoService::new(gateway.clone())),
            user_service: Arc::new(RealUserService::new(gateway.clone())),
            categoria_service: Arc::new(RealCategoriaService::new(gateway.clone())),
            historial_service: Arc::new(RealHistorialService::new(gateway)),
            guard: RouteGuard::default(),
        }
    }

    /// Runs the route guard for the page a command stands in for.
    fn enter(&self, path: &str) -> anyhow::Result<()> {
        let authenticated = self.auth_service.is_authenticated();
        let user = self.auth_service.current_user();
        match self.guard.check(path, authenticated, user.as_ref()) {
            GuardDecision::Allow => Ok(()),
            GuardDecision::RedirectToLogin => {
                Err(anyhow!("not logged in, run `inventory login` first"))
            }
            GuardDecision::RedirectTo(home) => {
                Err(anyhow!("{} is not available for this account (go to {})", path, home))
            }
            GuardDecision::Denied => Err(anyhow!("access to {} denied", path)),
        }
    }

    async fn run(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Login { username, password } => {
                let user = self
                    .auth_service
                    .login(LoginInput { username, password })
                    .await?;
                print_json(&user)
            }
            Command::Logout => {
                self.auth_service.logout().await;
                print_json(&json!({ "loggedOut": true }))
            }
            Command::Status => {
                let authenticated = self.auth_service.is_authenticated();
                let token_valid = authenticated && self.auth_service.validate_token().await;
                print_json(&json!({
                    "authenticated": authenticated,
                    "tokenValid": token_valid,
                    "user": self.auth_service.current_user(),
                }))
            }
            Command::Productos(command) => {
                self.enter("/productos")?;
                self.productos(command).await
            }
            Command::Usuarios(command) => {
                self.enter("/usuarios")?;
                self.usuarios(command).await
            }
            Command::Categorias(command) => {
                self.enter("/productos/categorias")?;
                self.categorias(command).await
            }
            Command::Historial { page, sort } => {
                self.enter("/historial")?;
                let query = HistorialQuery {
                    page: Some(page.page),
                    size: Some(page.size),
                    sort,
                };
                print_json(&self.historial_service.list(&query).await?)
            }
        }
    }

    async fn productos(&self, command: ProductosCommand) -> anyhow::Result<()> {
        let service = &self.producto_service;
        match command {
            ProductosCommand::List { page } => print_json(&service.list(page.page, page.size).await?),
            ProductosCommand::Get { id } => print_json(&service.get(id).await?),
            ProductosCommand::Search {
                nombre,
                categoria,
                precio_min,
                precio_max,
                page,
            } => {
                let filters = ProductoFilters {
                    nombre,
                    categoria,
                    precio_min,
                    precio_max,
                };
                print_json(&service.search(&filters, page.page, page.size).await?)
            }
            ProductosCommand::Create {
                nombre,
                descripcion,
                categoria,
                precio,
                cantidad_inicial,
                unidad_medida,
            } => {
                let form = ProductoForm {
                    nombre,
                    descripcion,
                    categoria,
                    precio,
                    cantidad_inicial,
                    unidad_medida,
                };
                print_json(&service.create(&form).await?)
            }
            ProductosCommand::Stock { id, cantidad } => {
                print_json(&service.update_stock(id, cantidad).await?)
            }
            ProductosCommand::Delete { id } => {
                service.delete(id).await?;
                print_json(&json!({ "deleted": id }))
            }
            ProductosCommand::LowStock { minimo } => print_json(&service.low_stock(minimo).await?),
            ProductosCommand::Categorias => print_json(&service.categorias().await?),
            ProductosCommand::Total => print_json(&json!({ "valorTotal": service.valor_total().await? })),
        }
    }

    async fn usuarios(&self, command: UsuariosCommand) -> anyhow::Result<()> {
        match command {
            UsuariosCommand::List { search, page } => {
                let users = match search.as_deref().filter(|s| !s.is_empty()) {
                    Some(term) => self.user_service.search(term, page.page, page.size).await?,
                    None => self.user_service.list(page.page, page.size).await?,
                };
                print_json(&users)
            }
            UsuariosCommand::Get { id } => print_json(&self.user_service.get(id).await?),
        }
    }

    async fn categorias(&self, command: CategoriasCommand) -> anyhow::Result<()> {
        match command {
            CategoriasCommand::List { active: true, .. } => {
                print_json(&self.categoria_service.active().await?)
            }
            CategoriasCommand::List { page, .. } => {
                print_json(&self.categoria_service.list(page.page, page.size).await?)
            }
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
