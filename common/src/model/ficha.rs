use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A training cohort ("ficha"), identified by its SENA-assigned number.
///
/// Fichas are created the first time their number is seen, either while
/// ingesting a roster upload or while exporting a format. Only the ingestion
/// pipeline ever mutates an existing ficha; exports read it as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ficha {
    pub numero_ficha: String,
    pub programa: String,
    pub estado: String,
    pub fecha_inicio: Option<NaiveDate>,
    pub fecha_fin: Option<NaiveDate>,
    pub fecha_reporte: Option<NaiveDate>,
    pub fecha_inicio_productiva: Option<NaiveDate>,
    pub jornada: Option<String>,
    pub modalidad_formacion: Option<String>,
}
