//! Maps extracted rows onto persisted fichas and aprendices.
//!
//! One call = one file = one transaction. The ficha is created if its number
//! is unseen (existing fichas are never overwritten by a re-upload), then
//! every data row is upserted: rows with an empty or sentinel document number
//! are skipped, duplicates (same documento within the same ficha) are
//! skipped, anything else becomes a new aprendiz with defaulted fields.
//! A malformed individual row is logged and skipped; only a failure of the
//! transaction itself aborts the file.

use super::extractor::{self, Extraccion, MetadatosFicha};
use chrono::{NaiveDate, Utc};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashMap;

/// Program stamped on fichas created by ingestion; the upload has no
/// program column.
pub const PROGRAMA_POR_DEFECTO: &str =
    "CURSO INTRODUCTORIO A LA FORMACIÓN PROFESIONAL INTEGRAL";
/// Estado sentinel when the header block had none.
pub const ESTADO_DESCONOCIDO: &str = "DESCONOCIDO";
/// Documento tipo default when the column is missing or empty.
pub const TIPO_DOCUMENTO_POR_DEFECTO: &str = "CC";

const SENTINELAS: [&str; 3] = ["nan", "none", "null"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliado {
    pub fichas_creadas: u32,
    pub aprendices_creados: u32,
}

/// Trims a raw cell and collapses the textual null markers various
/// spreadsheet tools leak ("nan", "None", "null", any casing) to empty.
pub fn limpiar_campo(valor: Option<&String>) -> String {
    let v = valor.map(|s| s.trim()).unwrap_or("");
    if v.is_empty() || SENTINELAS.contains(&v.to_lowercase().as_str()) {
        String::new()
    } else {
        v.to_string()
    }
}

/// Reconciles one extracted file inside a single transaction.
pub fn reconciliar(
    conn: &mut Connection,
    extraccion: &Extraccion,
    meta: &MetadatosFicha,
) -> Result<Reconciliado, String> {
    let tx = conn.transaction().map_err(|e| e.to_string())?;

    let mut fichas_creadas = 0u32;
    let mut aprendices_creados = 0u32;

    if crear_ficha_si_falta(&tx, meta).map_err(|e| e.to_string())? {
        fichas_creadas += 1;
    }

    let indices = extractor::indices_canonicos(&extraccion.columnas);
    for (n, fila) in extraccion.filas.iter().enumerate() {
        match insertar_aprendiz(&tx, &indices, fila, &meta.numero_ficha) {
            Ok(true) => aprendices_creados += 1,
            Ok(false) => {}
            // A single bad row never aborts the batch.
            Err(e) => warn!("fila {} descartada: {}", n + 1, e),
        }
    }

    tx.commit().map_err(|e| e.to_string())?;
    Ok(Reconciliado {
        fichas_creadas,
        aprendices_creados,
    })
}

/// Inserts the ficha when absent, inheriting the master-file default dates.
/// Returns whether a row was created.
fn crear_ficha_si_falta(tx: &Transaction, meta: &MetadatosFicha) -> Result<bool, rusqlite::Error> {
    let existe: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM fichas WHERE numero_ficha = ?1)",
        params![meta.numero_ficha],
        |fila| fila.get(0),
    )?;
    if existe {
        return Ok(false);
    }

    let (fecha_inicio, fecha_fin) = fechas_por_defecto(tx)?;
    let estado = meta
        .estado
        .clone()
        .unwrap_or_else(|| ESTADO_DESCONOCIDO.to_string());

    tx.execute(
        "INSERT INTO fichas (numero_ficha, programa, estado, fecha_inicio, fecha_fin, fecha_reporte)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            meta.numero_ficha,
            PROGRAMA_POR_DEFECTO,
            estado,
            fecha_inicio,
            fecha_fin,
            meta.fecha_reporte,
        ],
    )?;
    Ok(true)
}

fn fechas_por_defecto(
    tx: &Transaction,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), rusqlite::Error> {
    let fechas = tx
        .query_row(
            "SELECT fecha_inicio, fecha_fin FROM fechas_maestras WHERE id = 1",
            [],
            |fila| Ok((fila.get(0)?, fila.get(1)?)),
        )
        .optional()?;
    Ok(match fechas {
        Some((inicio, fin)) => (Some(inicio), Some(fin)),
        None => (None, None),
    })
}

fn insertar_aprendiz(
    tx: &Transaction,
    indices: &[(usize, &'static str)],
    fila: &[String],
    numero_ficha: &str,
) -> Result<bool, rusqlite::Error> {
    let campos: HashMap<&'static str, String> = indices
        .iter()
        .map(|(i, clave)| (*clave, fila.get(*i).cloned().unwrap_or_default()))
        .collect();

    let documento = limpiar_campo(campos.get("documento"));
    if documento.is_empty() {
        // Empty or sentinel document number: not an error, not counted.
        return Ok(false);
    }

    let duplicado: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM aprendices WHERE documento = ?1 AND ficha_numero = ?2)",
        params![documento, numero_ficha],
        |fila| fila.get(0),
    )?;
    if duplicado {
        return Ok(false);
    }

    let tipo_documento = {
        let tipo = limpiar_campo(campos.get("tipo_documento"));
        if tipo.is_empty() {
            TIPO_DOCUMENTO_POR_DEFECTO.to_string()
        } else {
            tipo
        }
    };

    tx.execute(
        "INSERT INTO aprendices
            (tipo_documento, documento, nombre, apellido, celular, correo, estado, ficha_numero)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            tipo_documento,
            documento,
            limpiar_campo(campos.get("nombre")),
            limpiar_campo(campos.get("apellido")),
            limpiar_campo(campos.get("celular")),
            limpiar_campo(campos.get("correo")),
            limpiar_campo(campos.get("estado")),
            numero_ficha,
        ],
    )?;
    Ok(true)
}

/// Applies a master monthly file: the first two dates found in its header
/// block become the default (fecha_inicio, fecha_fin) inherited by fichas
/// created from then on. Existing fichas are untouched.
pub fn aplicar_archivo_maestro(
    conn: &Connection,
    extraccion: &Extraccion,
) -> Result<(NaiveDate, NaiveDate), String> {
    let fechas = extractor::buscar_fechas(&extraccion.cabecera);
    let (inicio, fin) = match fechas.as_slice() {
        [inicio, fin, ..] => (*inicio, *fin),
        _ => {
            return Err(
                "el archivo maestro no contiene fechas de inicio y fin en la cabecera".to_string(),
            )
        }
    };

    conn.execute(
        "INSERT OR REPLACE INTO fechas_maestras (id, fecha_inicio, fecha_fin, actualizado)
         VALUES (1, ?1, ?2, ?3)",
        params![inicio, fin, Utc::now()],
    )
    .map_err(|e| e.to_string())?;
    Ok((inicio, fin))
}
