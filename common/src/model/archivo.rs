use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output variant of a generated F-165 format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modalidad {
    Grupal,
    Individual,
}

impl Modalidad {
    /// Parses the wire value; anything outside {"grupal", "individual"} is
    /// rejected by the caller as an invalid modality.
    pub fn parse(valor: &str) -> Option<Self> {
        match valor {
            "grupal" => Some(Modalidad::Grupal),
            "individual" => Some(Modalidad::Individual),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modalidad::Grupal => "grupal",
            Modalidad::Individual => "individual",
        }
    }
}

/// Catalog record for a generated and archived export document.
///
/// `ruta_archivo` is relative to the export root, which is joined back at
/// read time. `hash_archivo` is the SHA-256 of the stored bytes,
/// recomputable at any time for an integrity check. Removal is a soft
/// delete: `activo` flips to false and `fecha_modificacion` is bumped, the
/// bytes stay on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivoExportado {
    pub id: i64,
    pub nombre_original: String,
    pub nombre_interno: String,
    pub ruta_archivo: String,
    pub ficha: String,
    pub modalidad: String,
    pub cantidad_aprendices: u32,
    pub hash_archivo: String,
    pub tamano_bytes: u64,
    pub usuario_id: i64,
    pub activo: bool,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_modificacion: DateTime<Utc>,
}
