//! Runtime configuration, read once at startup from environment variables.
//!
//! Every value has a default suitable for a local checkout, so the server
//! runs without any environment set up.

use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    /// SQLite database file.
    pub db: PathBuf,
    /// Root directory for archived export documents.
    pub exportados: PathBuf,
    /// F-165 template workbook (one file, one sheet per modality).
    pub plantilla: PathBuf,
    pub host: String,
    pub puerto: u16,
}

impl Config {
    pub fn desde_entorno() -> Self {
        Config {
            db: env::var("FICHAS_DB")
                .unwrap_or_else(|_| "fichas.sqlite".to_string())
                .into(),
            exportados: env::var("FICHAS_EXPORTADOS")
                .unwrap_or_else(|_| "archivos_exportados".to_string())
                .into(),
            plantilla: env::var("FICHAS_PLANTILLA")
                .unwrap_or_else(|_| "plantillas/GFPI-F-165.xlsx".to_string())
                .into(),
            host: env::var("FICHAS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            puerto: env::var("FICHAS_PUERTO")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
        }
    }
}
