use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Producto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub nombre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
    pub categoria: String,
    pub precio: f64,
    pub cantidad_inicial: i32,
    #[serde(default)]
    pub cantidad_actual: i32,
    #[serde(default = "default_unidad_medida")]
    pub unidad_medida: String,
    #[serde(default = "default_activo")]
    pub activo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fecha_creacion: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fecha_modificacion: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

fn default_unidad_medida() -> String {
    "UNIDAD".to_string()
}

fn default_activo() -> bool {
    true
}

/// What the create/edit form submits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductoForm {
    pub nombre: String,
    pub descripcion: String,
    pub categoria: String,
    pub precio: f64,
    pub cantidad_inicial: i32,
    pub unidad_medida: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductoFilters {
    pub nombre: Option<String>,
    pub categoria: Option<String>,
    pub precio_min: Option<f64>,
    pub precio_max: Option<f64>,
}

impl ProductoFilters {
    /// Query pairs for `/productos/buscar`; empty filters are left out.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(nombre) = self.nombre.as_deref().filter(|s| !s.is_empty()) {
            query.push(("nombre", nombre.to_string()));
        }
        if let Some(categoria) = self.categoria.as_deref().filter(|s| !s.is_empty()) {
            query.push(("categoria", categoria.to_string()));
        }
        if let Some(min) = self.precio_min {
            query.push(("precioMin", min.to_string()));
        }
        if let Some(max) = self.precio_max {
            query.push(("precioMax", max.to_string()));
        }
        query
    }

    pub fn matches(&self, producto: &Producto) -> bool {
        let nombre_ok = self.nombre.as_deref().is_none_or(|n| {
            producto.nombre.to_lowercase().contains(&n.to_lowercase())
        });
        let categoria_ok = self
            .categoria
            .as_deref()
            .is_none_or(|c| producto.categoria.eq_ignore_ascii_case(c));
        let min_ok = self.precio_min.is_none_or(|min| producto.precio >= min);
        let max_ok = self.precio_max.is_none_or(|max| producto.precio <= max);
        nombre_ok && categoria_ok && min_ok && max_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laptop() -> Producto {
        Producto {
            id: Some(1),
            nombre: "Laptop Pro".into(),
            descripcion: None,
            categoria: "Laptops".into(),
            precio: 1500.0,
            cantidad_inicial: 10,
            cantidad_actual: 10,
            unidad_medida: "UNIDAD".into(),
            activo: true,
            sku: None,
            fecha_creacion: None,
            fecha_modificacion: None,
            version: None,
        }
    }

    #[test]
    fn empty_filters_are_omitted_from_query() {
        let filters = ProductoFilters {
            nombre: Some(String::new()),
            categoria: Some("Laptops".into()),
            precio_min: None,
            precio_max: Some(2000.0),
        };
        let query = filters.to_query();
        assert_eq!(
            query,
            vec![("categoria", "Laptops".to_string()), ("precioMax", "2000".to_string())]
        );
    }

    #[test]
    fn filters_match_by_name_fragment_and_price_range() {
        let filters = ProductoFilters {
            nombre: Some("laptop".into()),
            precio_min: Some(1000.0),
            precio_max: Some(2000.0),
            ..Default::default()
        };
        assert!(filters.matches(&laptop()));

        let too_cheap = ProductoFilters {
            precio_max: Some(100.0),
            ..Default::default()
        };
        assert!(!too_cheap.matches(&laptop()));
    }

    #[test]
    fn backend_defaults_fill_missing_fields() {
        let body = r#"{"nombre":"Mouse","categoria":"Accesorios","precio":25.5,"cantidadInicial":3}"#;
        let producto: Producto = serde_json::from_str(body).unwrap();
        assert_eq!(producto.unidad_medida, "UNIDAD");
        assert!(producto.activo);
        assert_eq!(producto.id, None);
    }
}
