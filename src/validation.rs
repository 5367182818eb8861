//! Form checks run before anything is sent to the backend.

use crate::domain_model::{CategoriaForm, ProductoForm, UserForm};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Field name to message, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<&'static str, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    fn length(&mut self, field: &'static str, value: &str, min: usize, max: Option<usize>) {
        let len = value.trim().chars().count();
        if len < min {
            if min <= 1 {
                self.add(field, "es obligatorio");
            } else {
                self.add(field, format!("debe tener al menos {min} caracteres"));
            }
        } else if let Some(max) = max.filter(|max| len > *max) {
            self.add(field, format!("no puede superar {max} caracteres"));
        }
    }

    fn max_length(&mut self, field: &'static str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(field, format!("no puede superar {max} caracteres"));
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field} {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

pub fn validate_producto(form: &ProductoForm) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.length("nombre", &form.nombre, 2, Some(100));
    errors.max_length("descripcion", &form.descripcion, 500);
    errors.length("categoria", &form.categoria, 2, Some(50));
    if form.precio.is_nan() || form.precio <= 0.0 {
        errors.add("precio", "debe ser mayor que 0");
    }
    if form.cantidad_inicial < 0 {
        errors.add("cantidadInicial", "no puede ser negativa");
    }
    errors.max_length("unidadMedida", &form.unidad_medida, 50);
    errors.into_result()
}

pub fn validate_categoria(form: &CategoriaForm) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.length("nombre", &form.nombre, 2, Some(50));
    errors.max_length("descripcion", &form.descripcion, 200);
    errors.into_result()
}

pub fn validate_user(form: &UserForm) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.length("username", &form.username, 3, None);
    if !is_email(&form.email) {
        errors.add("email", "no es un correo válido");
    }
    errors.length("nombreCompleto", &form.nombre_completo, 3, None);
    if form.password.chars().count() < 6 {
        errors.add("password", "debe tener al menos 6 caracteres");
    }
    errors.into_result()
}

pub fn validate_stock_delta(cantidad: i32) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if cantidad == 0 {
        errors.add("cantidad", "no puede ser 0");
    }
    errors.into_result()
}

/// `local@domain.tld` with no whitespace; deliverability is the backend's problem.
pub fn is_email(value: &str) -> bool {
    let value = value.trim();
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && tld.len() >= 2,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::Role;

    fn producto() -> ProductoForm {
        ProductoForm {
            nombre: "Tornillo 3/8".into(),
            descripcion: "Acero galvanizado".into(),
            categoria: "Ferretería".into(),
            precio: 0.25,
            cantidad_inicial: 100,
            unidad_medida: "UNIDAD".into(),
        }
    }

    #[test]
    fn valid_producto_passes() {
        assert_eq!(validate_producto(&producto()), Ok(()));
    }

    #[test]
    fn producto_reports_each_bad_field() {
        let form = ProductoForm {
            nombre: "X".into(),
            descripcion: "d".repeat(501),
            categoria: String::new(),
            precio: 0.0,
            cantidad_inicial: -1,
            unidad_medida: "u".repeat(51),
        };
        let errors = validate_producto(&form).unwrap_err();
        let fields: Vec<_> = errors.fields().collect();
        assert_eq!(
            fields,
            [
                "cantidadInicial",
                "categoria",
                "descripcion",
                "nombre",
                "precio",
                "unidadMedida"
            ]
        );
        assert_eq!(
            errors.get("nombre"),
            Some("debe tener al menos 2 caracteres")
        );
    }

    #[test]
    fn producto_nan_price_is_rejected() {
        let form = ProductoForm {
            precio: f64::NAN,
            ..producto()
        };
        assert!(validate_producto(&form).unwrap_err().get("precio").is_some());
    }

    #[test]
    fn categoria_limits() {
        let ok = CategoriaForm {
            nombre: "Herramientas".into(),
            descripcion: String::new(),
            activo: None,
        };
        assert!(validate_categoria(&ok).is_ok());

        let long = CategoriaForm {
            nombre: "n".repeat(51),
            descripcion: "d".repeat(201),
            activo: Some(true),
        };
        assert_eq!(validate_categoria(&long).unwrap_err().len(), 2);
    }

    #[test]
    fn user_form_checks() {
        let form = UserForm {
            username: "ab".into(),
            password: "12345".into(),
            email: "no-at-sign".into(),
            nombre_completo: "Jo".into(),
            role: Role::Usuario,
        };
        let errors = validate_user(&form).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.to_string().contains("email no es un correo válido"));
    }

    #[test]
    fn email_shapes() {
        assert!(is_email("ana@inventario.test"));
        assert!(!is_email("ana@inventario"));
        assert!(!is_email("@inventario.test"));
        assert!(!is_email("ana @inventario.test"));
        assert!(!is_email("a@b@c.de"));
    }

    #[test]
    fn zero_stock_delta_is_rejected() {
        assert!(validate_stock_delta(0).is_err());
        assert!(validate_stock_delta(-3).is_ok());
    }
}
