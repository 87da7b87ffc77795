use crate::model::aprendiz::AprendizExportar;
use serde::{Deserialize, Serialize};

/// Request payload for the F-165 export endpoint.
///
/// The roster travels in the request (the front end lets the user pick and
/// reorder students before exporting); `modalidad` is validated server-side
/// against {"grupal", "individual"}. The `usuario_*` fields identify the
/// submitter stamped into the generated document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportarFormatoRequest {
    pub modalidad: String,
    pub ficha: String,
    pub aprendices: Vec<AprendizExportar>,
    #[serde(default)]
    pub usuario_id: Option<i64>,
    #[serde(default)]
    pub usuario_nombre: Option<String>,
    #[serde(default)]
    pub usuario_correo: Option<String>,
}

/// Partial update of an aprendiz, keyed by document number.
///
/// Only the fields listed here may change; absent fields are left untouched.
/// This is an explicit whitelist, there is no dynamic attribute assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AprendizActualizacion {
    #[serde(default)]
    pub tipo_documento: Option<String>,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub apellido: Option<String>,
    #[serde(default)]
    pub direccion: Option<String>,
    #[serde(default)]
    pub correo: Option<String>,
    #[serde(default)]
    pub celular: Option<String>,
    #[serde(default)]
    pub departamento: Option<String>,
    #[serde(default)]
    pub municipio: Option<String>,
    #[serde(default)]
    pub estado: Option<String>,
}
