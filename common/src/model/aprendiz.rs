use serde::{Deserialize, Serialize};

/// A student ("aprendiz") as persisted in the database.
///
/// The pair (`documento`, `ficha_numero`) is unique: re-ingesting the same
/// roster never produces duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aprendiz {
    pub id: i64,
    pub tipo_documento: String,
    pub documento: String,
    pub nombre: String,
    pub apellido: String,
    pub celular: String,
    pub correo: String,
    pub direccion: String,
    pub departamento: Option<String>,
    pub municipio: Option<String>,
    pub estado: String,
    pub ficha_numero: String,
}

/// One roster entry as supplied to the format export endpoint.
///
/// Carries the fields the F-165 format prints, plus the captured signature
/// payload: either `"<metadata>,<base64>"` (a data URI) or raw base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AprendizExportar {
    pub tipo_documento: String,
    pub documento: String,
    pub nombre: String,
    pub apellidos: String,
    #[serde(default)]
    pub direccion: String,
    #[serde(default)]
    pub correo: String,
    #[serde(default)]
    pub celular: String,
    #[serde(default)]
    pub discapacidad: String,
    #[serde(default)]
    pub tipo_discapacidad: String,
    #[serde(default)]
    pub firma: Option<String>,
}
