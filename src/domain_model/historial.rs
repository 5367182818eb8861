use crate::domain_model::Producto;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoMovimiento {
    Entrada,
    Salida,
    AjustePositivo,
    AjusteNegativo,
}

impl TipoMovimiento {
    /// Classifies a stock delta the way the backend records adjustments.
    pub fn for_adjustment(delta: i32) -> Self {
        if delta >= 0 {
            TipoMovimiento::AjustePositivo
        } else {
            TipoMovimiento::AjusteNegativo
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovimientoUsuario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub nombre_completo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movimiento {
    pub id: i64,
    pub producto: Producto,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usuario: Option<MovimientoUsuario>,
    pub tipo_movimiento: TipoMovimiento,
    pub cantidad: i32,
    #[serde(with = "fecha_format")]
    pub fecha: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistorialQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<String>,
}

impl HistorialQuery {
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(page) = self.page {
            query.push(("page", page.to_string()));
        }
        if let Some(size) = self.size {
            query.push(("size", size.to_string()));
        }
        if let Some(sort) = &self.sort {
            query.push(("sort", sort.clone()));
        }
        query
    }
}

/// `yyyy-MM-dd HH:mm:ss`, the history endpoint's date format.
pub mod fecha_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(fecha: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&fecha.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fecha_uses_space_separated_format() {
        let body = r#"{
            "id": 7,
            "producto": {"nombre":"Mouse","categoria":"Accesorios","precio":10.0,"cantidadInicial":1},
            "tipoMovimiento": "AJUSTE_NEGATIVO",
            "cantidad": -2,
            "fecha": "2024-05-01 13:45:10"
        }"#;
        let movimiento: Movimiento = serde_json::from_str(body).unwrap();
        assert_eq!(movimiento.tipo_movimiento, TipoMovimiento::AjusteNegativo);
        assert_eq!(movimiento.fecha.to_string(), "2024-05-01 13:45:10");

        let json = serde_json::to_value(&movimiento).unwrap();
        assert_eq!(json["fecha"], "2024-05-01 13:45:10");
    }

    #[test]
    fn adjustment_sign_selects_movement_kind() {
        assert_eq!(TipoMovimiento::for_adjustment(5), TipoMovimiento::AjustePositivo);
        assert_eq!(TipoMovimiento::for_adjustment(-1), TipoMovimiento::AjusteNegativo);
    }
}
