//! Export catalog endpoints: history, download, integrity check, removal.

use super::archive::Archivador;
use crate::config::Config;
use crate::db;
use actix_web::{web, HttpResponse, Responder};
use common::model::archivo::ArchivoExportado;
use rusqlite::types::Value;
use rusqlite::Connection;
use serde::Deserialize;

const LIMITE_HISTORIAL: u32 = 100;

/// Optional catalog filters.
#[derive(Debug, Default, Deserialize)]
pub struct FiltroHistorial {
    #[serde(default)]
    pub ficha: Option<String>,
    #[serde(default)]
    pub usuario_id: Option<i64>,
}

pub(crate) async fn process_historial(
    cfg: web::Data<Config>,
    filtro: web::Query<FiltroHistorial>,
) -> impl Responder {
    match listar_historial(&cfg, &filtro) {
        Ok(archivos) => HttpResponse::Ok().json(serde_json::json!({
            "total": archivos.len(),
            "archivos": archivos,
        })),
        Err(e) => {
            HttpResponse::ServiceUnavailable().body(format!("Error consultando historial: {}", e))
        }
    }
}

pub(crate) async fn process_descargar(
    id: web::Path<i64>,
    cfg: web::Data<Config>,
) -> impl Responder {
    let id = id.into_inner();
    let resultado = web::block(move || {
        let conn = db::abrir(&cfg.db).map_err(|e| e.to_string())?;
        Archivador::new(&cfg.exportados).leer_para_descarga(&conn, id)
    })
    .await;

    match resultado {
        Ok(Ok(Some((bytes, nombre)))) => HttpResponse::Ok()
            .content_type("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", nombre),
            ))
            .body(bytes),
        Ok(Ok(None)) => HttpResponse::NotFound().body("Archivo no encontrado"),
        Ok(Err(e)) => HttpResponse::ServiceUnavailable().body(format!("Error: {}", e)),
        Err(e) => HttpResponse::InternalServerError().body(format!("Descarga abortada: {}", e)),
    }
}

pub(crate) async fn process_verificar(
    id: web::Path<i64>,
    cfg: web::Data<Config>,
) -> impl Responder {
    let id = id.into_inner();
    let resultado = web::block(move || {
        let conn = db::abrir(&cfg.db).map_err(|e| e.to_string())?;
        Archivador::new(&cfg.exportados).verificar_integridad(&conn, id)
    })
    .await;

    match resultado {
        Ok(Ok(integro)) => HttpResponse::Ok().json(serde_json::json!({
            "id": id,
            "integro": integro,
        })),
        Ok(Err(e)) if e == "Archivo no encontrado" => HttpResponse::NotFound().body(e),
        Ok(Err(e)) => HttpResponse::ServiceUnavailable().body(format!("Error: {}", e)),
        Err(e) => HttpResponse::InternalServerError().body(format!("Verificación abortada: {}", e)),
    }
}

pub(crate) async fn process_eliminar(id: web::Path<i64>, cfg: web::Data<Config>) -> impl Responder {
    let id = id.into_inner();
    let resultado = (|| {
        let conn = db::abrir(&cfg.db).map_err(|e| e.to_string())?;
        Archivador::new(&cfg.exportados).eliminar(&conn, id)
    })();

    match resultado {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({
            "id": id,
            "message": "Archivo eliminado del historial",
        })),
        Ok(false) => HttpResponse::NotFound().body("Archivo no encontrado"),
        Err(e) => HttpResponse::ServiceUnavailable().body(format!("Error: {}", e)),
    }
}

/// Active exports, newest first, capped at [`LIMITE_HISTORIAL`] rows.
fn listar_historial(
    cfg: &Config,
    filtro: &FiltroHistorial,
) -> Result<Vec<serde_json::Value>, String> {
    let conn = db::abrir(&cfg.db).map_err(|e| e.to_string())?;
    consultar_historial(&conn, filtro)
}

fn consultar_historial(
    conn: &Connection,
    filtro: &FiltroHistorial,
) -> Result<Vec<serde_json::Value>, String> {
    let mut condiciones = vec!["activo = 1".to_string()];
    let mut valores: Vec<Value> = Vec::new();
    if let Some(ficha) = &filtro.ficha {
        valores.push(Value::Text(ficha.clone()));
        condiciones.push(format!("ficha = ?{}", valores.len()));
    }
    if let Some(usuario_id) = filtro.usuario_id {
        valores.push(Value::Integer(usuario_id));
        condiciones.push(format!("usuario_id = ?{}", valores.len()));
    }
    valores.push(Value::Integer(i64::from(LIMITE_HISTORIAL)));

    let sql = format!(
        "SELECT id, nombre_original, nombre_interno, ruta_archivo, ficha, modalidad,
                cantidad_aprendices, hash_archivo, tamano_bytes, usuario_id, activo,
                fecha_creacion, fecha_modificacion
         FROM archivos_exportados
         WHERE {}
         ORDER BY fecha_creacion DESC
         LIMIT ?{}",
        condiciones.join(" AND "),
        valores.len()
    );
    let mut stmt = conn.prepare(&sql).map_err(|e| e.to_string())?;

    let archivos = stmt
        .query_map(rusqlite::params_from_iter(valores), |fila| {
            Ok(ArchivoExportado {
                id: fila.get(0)?,
                nombre_original: fila.get(1)?,
                nombre_interno: fila.get(2)?,
                ruta_archivo: fila.get(3)?,
                ficha: fila.get(4)?,
                modalidad: fila.get(5)?,
                cantidad_aprendices: fila.get(6)?,
                hash_archivo: fila.get(7)?,
                tamano_bytes: fila.get(8)?,
                usuario_id: fila.get(9)?,
                activo: fila.get(10)?,
                fecha_creacion: fila.get(11)?,
                fecha_modificacion: fila.get(12)?,
            })
        })
        .map_err(|e| e.to_string())?
        .filter_map(Result::ok)
        .map(|archivo| {
            let tamano_mb = archivo.tamano_bytes as f64 / (1024.0 * 1024.0);
            serde_json::json!({
                "id": archivo.id,
                "nombre_original": archivo.nombre_original,
                "nombre_interno": archivo.nombre_interno,
                "ficha": archivo.ficha,
                "modalidad": archivo.modalidad,
                "cantidad_aprendices": archivo.cantidad_aprendices,
                "hash_archivo": archivo.hash_archivo,
                "tamano_bytes": archivo.tamano_bytes,
                "tamano_mb": (tamano_mb * 100.0).round() / 100.0,
                "usuario_id": archivo.usuario_id,
                "fecha_creacion": archivo.fecha_creacion,
            })
        })
        .collect();
    Ok(archivos)
}
