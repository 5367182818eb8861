use super::Parser;
use clap::{Args, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "inventory", about = "Inventory console client")]
pub struct Cli {
    #[arg(long, env = "INVENTORY_SETTINGS")]
    pub settings: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and persist the session.
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Invalidate the session on the backend and locally.
    Logout,
    /// Show who is logged in and whether the token is still valid.
    Status,
    #[command(subcommand)]
    Productos(ProductosCommand),
    #[command(subcommand)]
    Usuarios(UsuariosCommand),
    #[command(subcommand)]
    Categorias(CategoriasCommand),
    /// Stock movement history.
    Historial {
        #[command(flatten)]
        page: PageArgs,
        #[arg(long)]
        sort: Option<String>,
    },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct PageArgs {
    #[arg(long, default_value_t = 0)]
    pub page: u32,
    #[arg(long, default_value_t = 10)]
    pub size: u32,
}

#[derive(Subcommand, Debug)]
pub enum ProductosCommand {
    List {
        #[command(flatten)]
        page: PageArgs,
    },
    Get {
        id: i64,
    },
    Search {
        #[arg(long)]
        nombre: Option<String>,
        #[arg(long)]
        categoria: Option<String>,
        #[arg(long)]
        precio_min: Option<f64>,
        #[arg(long)]
        precio_max: Option<f64>,
        #[command(flatten)]
        page: PageArgs,
    },
    Create {
        #[arg(long)]
        nombre: String,
        #[arg(long, default_value = "")]
        descripcion: String,
        #[arg(long)]
        categoria: String,
        #[arg(long)]
        precio: f64,
        #[arg(long, default_value_t = 0)]
        cantidad_inicial: i32,
        #[arg(long, default_value = "UNIDAD")]
        unidad_medida: String,
    },
    /// Add (positive) or remove (negative) stock.
    Stock {
        id: i64,
        #[arg(allow_hyphen_values = true)]
        cantidad: i32,
    },
    Delete {
        id: i64,
    },
    LowStock {
        #[arg(long, default_value_t = 10)]
        minimo: i32,
    },
    Categorias,
    Total,
}

#[derive(Subcommand, Debug)]
pub enum UsuariosCommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    Get {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum CategoriasCommand {
    List {
        /// Only active categories, unpaged.
        #[arg(long)]
        active: bool,
        #[command(flatten)]
        page: PageArgs,
    },
}
