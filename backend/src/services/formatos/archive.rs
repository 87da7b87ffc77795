//! Persists generated documents under a year/month tree and records each
//! export in `archivos_exportados` with a SHA-256 fingerprint.
//!
//! Workflow del guardado:
//!     1. derivar un nombre interno único (uuid corto + timestamp),
//!     2. escribir los bytes bajo base/AAAA/MM/exportados/,
//!     3. calcular el hash del archivo ya en disco,
//!     4. registrar la fila; si el registro falla, el archivo se borra
//!        para no dejar huérfanos.
//!
//! `ruta_archivo` is stored relative to the base directory; the base is
//! joined back at read time, so the export root can move without
//! invalidating the catalog.
//!
//! Deletions are soft: the row is flagged inactive and the bytes stay on
//! disk for audit.

use chrono::{Local, Utc};
use common::model::archivo::{ArchivoExportado, Modalidad};
use log::{info, warn};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::filler::FormatoError;

/// Metadata accompanying the bytes of one export.
#[derive(Debug, Clone)]
pub struct DatosExportacion {
    pub nombre_original: String,
    pub ficha: String,
    pub modalidad: Modalidad,
    pub cantidad_aprendices: u32,
    pub usuario_id: i64,
}

pub struct Archivador {
    base: PathBuf,
}

impl Archivador {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Writes the document to disk and records it. Returns the stored row.
    pub fn guardar(
        &self,
        conn: &Connection,
        bytes: &[u8],
        datos: &DatosExportacion,
    ) -> Result<ArchivoExportado, FormatoError> {
        let ahora = Local::now();
        let nombre_interno = format!(
            "{}_{}.xlsx",
            &Uuid::new_v4().simple().to_string()[..8],
            ahora.format("%Y%m%d%H%M%S")
        );
        let subruta = PathBuf::from(ahora.format("%Y").to_string())
            .join(ahora.format("%m").to_string())
            .join("exportados");
        let directorio = self.base.join(&subruta);
        fs::create_dir_all(&directorio)
            .map_err(|e| FormatoError::Guardado(format!("crear directorio: {}", e)))?;

        let ruta = directorio.join(&nombre_interno);
        fs::write(&ruta, bytes)
            .map_err(|e| FormatoError::Guardado(format!("escribir archivo: {}", e)))?;

        let ruta_relativa = subruta.join(&nombre_interno);
        // Hash what actually landed on disk, not the in-memory buffer.
        match self.registrar(conn, &ruta, &ruta_relativa, &nombre_interno, bytes.len() as u64, datos)
        {
            Ok(archivo) => {
                info!(
                    "Formato archivado: {} ({} bytes)",
                    archivo.nombre_interno, archivo.tamano_bytes
                );
                Ok(archivo)
            }
            Err(e) => {
                if let Err(e2) = fs::remove_file(&ruta) {
                    warn!("no se pudo limpiar el archivo parcial {:?}: {}", ruta, e2);
                }
                Err(e)
            }
        }
    }

    fn registrar(
        &self,
        conn: &Connection,
        ruta: &Path,
        ruta_relativa: &Path,
        nombre_interno: &str,
        tamano: u64,
        datos: &DatosExportacion,
    ) -> Result<ArchivoExportado, FormatoError> {
        let hash = calcular_hash(ruta)
            .map_err(|e| FormatoError::Guardado(format!("calcular hash: {}", e)))?;
        let ahora = Utc::now();
        conn.execute(
            "INSERT INTO archivos_exportados
                 (nombre_original, nombre_interno, ruta_archivo, ficha, modalidad,
                  cantidad_aprendices, hash_archivo, tamano_bytes, usuario_id,
                  activo, fecha_creacion, fecha_modificacion)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?10)",
            rusqlite::params![
                datos.nombre_original,
                nombre_interno,
                ruta_relativa.to_string_lossy(),
                datos.ficha,
                datos.modalidad.as_str(),
                datos.cantidad_aprendices,
                hash,
                tamano,
                datos.usuario_id,
                ahora,
            ],
        )
        .map_err(|e| FormatoError::Guardado(format!("registrar exportación: {}", e)))?;

        Ok(ArchivoExportado {
            id: conn.last_insert_rowid(),
            nombre_original: datos.nombre_original.clone(),
            nombre_interno: nombre_interno.to_string(),
            ruta_archivo: ruta_relativa.to_string_lossy().into_owned(),
            ficha: datos.ficha.clone(),
            modalidad: datos.modalidad.as_str().to_string(),
            cantidad_aprendices: datos.cantidad_aprendices,
            hash_archivo: hash,
            tamano_bytes: tamano,
            usuario_id: datos.usuario_id,
            activo: true,
            fecha_creacion: ahora,
            fecha_modificacion: ahora,
        })
    }

    /// Recomputes the file's hash and compares it with the recorded one.
    /// A missing file counts as a failed check, not an error.
    pub fn verificar_integridad(
        &self,
        conn: &Connection,
        id: i64,
    ) -> Result<bool, String> {
        let fila: Option<(String, String)> = conn
            .query_row(
                "SELECT ruta_archivo, hash_archivo FROM archivos_exportados
                 WHERE id = ?1 AND activo = 1",
                [id],
                |f| Ok((f.get(0)?, f.get(1)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                otro => Err(otro.to_string()),
            })?;

        let Some((ruta, hash_registrado)) = fila else {
            return Err("Archivo no encontrado".to_string());
        };
        match calcular_hash(&self.base.join(&ruta)) {
            Ok(hash) => Ok(hash == hash_registrado),
            Err(_) => Ok(false),
        }
    }

    /// Returns the bytes and the original filename for a download. The
    /// stored hash is rechecked first; a corrupted copy is never served.
    pub fn leer_para_descarga(
        &self,
        conn: &Connection,
        id: i64,
    ) -> Result<Option<(Vec<u8>, String)>, String> {
        let fila: Option<(String, String, String)> = conn
            .query_row(
                "SELECT ruta_archivo, nombre_original, hash_archivo
                 FROM archivos_exportados
                 WHERE id = ?1 AND activo = 1",
                [id],
                |f| Ok((f.get(0)?, f.get(1)?, f.get(2)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                otro => Err(otro.to_string()),
            })?;

        let Some((ruta, nombre, hash_registrado)) = fila else {
            return Ok(None);
        };
        let bytes =
            fs::read(self.base.join(&ruta)).map_err(|e| format!("leer {}: {}", ruta, e))?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        if hex::encode(hasher.finalize()) != hash_registrado {
            return Err(format!("El archivo {} no supera la verificación de integridad", nombre));
        }
        Ok(Some((bytes, nombre)))
    }

    /// Soft delete: flags the row inactive, the file stays on disk.
    pub fn eliminar(&self, conn: &Connection, id: i64) -> Result<bool, String> {
        let afectadas = conn
            .execute(
                "UPDATE archivos_exportados
                 SET activo = 0, fecha_modificacion = ?1
                 WHERE id = ?2 AND activo = 1",
                rusqlite::params![Utc::now(), id],
            )
            .map_err(|e| e.to_string())?;
        Ok(afectadas > 0)
    }
}

/// SHA-256 of a file, streamed in 8 KiB chunks.
pub fn calcular_hash(ruta: &Path) -> Result<String, std::io::Error> {
    let mut archivo = File::open(ruta)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let leidos = archivo.read(&mut buffer)?;
        if leidos == 0 {
            break;
        }
        hasher.update(&buffer[..leidos]);
    }
    Ok(hex::encode(hasher.finalize()))
}
