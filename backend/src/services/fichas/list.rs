//! Read-only queries over persisted fichas and their rosters.

use crate::config::Config;
use crate::db;
use actix_web::{web, HttpResponse, Responder};
use common::model::aprendiz::Aprendiz;
use common::model::ficha::Ficha;
use rusqlite::{params, Connection, OptionalExtension};

pub(crate) async fn process_listado(cfg: web::Data<Config>) -> impl Responder {
    match listar_fichas(&cfg) {
        Ok(fichas) => HttpResponse::Ok().json(serde_json::json!({ "fichas": fichas })),
        Err(e) => HttpResponse::ServiceUnavailable().body(format!("Error listando fichas: {}", e)),
    }
}

pub(crate) async fn process_aprendices(
    numero: web::Path<String>,
    cfg: web::Data<Config>,
) -> impl Responder {
    match aprendices_de_ficha(&cfg, &numero) {
        Ok(Some(respuesta)) => HttpResponse::Ok().json(respuesta),
        Ok(None) => HttpResponse::NotFound().body("La ficha no existe"),
        Err(e) => HttpResponse::ServiceUnavailable().body(format!("Error: {}", e)),
    }
}

fn listar_fichas(cfg: &Config) -> Result<Vec<serde_json::Value>, String> {
    let conn = db::abrir(&cfg.db).map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare(
            "SELECT f.numero_ficha, f.programa, f.estado, f.fecha_reporte,
                    (SELECT COUNT(*) FROM aprendices a WHERE a.ficha_numero = f.numero_ficha)
             FROM fichas f",
        )
        .map_err(|e| e.to_string())?;

    let fichas = stmt
        .query_map([], |fila| {
            Ok(serde_json::json!({
                "numero_ficha": fila.get::<_, String>(0)?,
                "programa": fila.get::<_, String>(1)?,
                "estado": fila.get::<_, String>(2)?,
                "fecha_reporte": fila.get::<_, Option<String>>(3)?,
                "total_aprendices": fila.get::<_, i64>(4)?,
            }))
        })
        .map_err(|e| e.to_string())?
        .filter_map(Result::ok)
        .collect();
    Ok(fichas)
}

/// Loads one ficha row, or `None` when the number is unknown.
pub fn consultar_ficha(conn: &Connection, numero: &str) -> Result<Option<Ficha>, String> {
    conn.query_row(
        "SELECT numero_ficha, programa, estado, fecha_inicio, fecha_fin, fecha_reporte,
                fecha_inicio_productiva, jornada, modalidad_formacion
         FROM fichas WHERE numero_ficha = ?1",
        params![numero],
        |fila| {
            Ok(Ficha {
                numero_ficha: fila.get(0)?,
                programa: fila.get(1)?,
                estado: fila.get(2)?,
                fecha_inicio: fila.get(3)?,
                fecha_fin: fila.get(4)?,
                fecha_reporte: fila.get(5)?,
                fecha_inicio_productiva: fila.get(6)?,
                jornada: fila.get(7)?,
                modalidad_formacion: fila.get(8)?,
            })
        },
    )
    .optional()
    .map_err(|e| e.to_string())
}

fn aprendices_de_ficha(cfg: &Config, numero: &str) -> Result<Option<serde_json::Value>, String> {
    let conn = db::abrir(&cfg.db).map_err(|e| e.to_string())?;
    let ficha = match consultar_ficha(&conn, numero)? {
        Some(ficha) => ficha,
        None => return Ok(None),
    };

    let mut stmt = conn
        .prepare(
            "SELECT id, tipo_documento, documento, nombre, apellido, celular, correo,
                    direccion, departamento, municipio, estado, ficha_numero
             FROM aprendices WHERE ficha_numero = ?1",
        )
        .map_err(|e| e.to_string())?;
    let aprendices: Vec<Aprendiz> = stmt
        .query_map(params![numero], |fila| {
            Ok(Aprendiz {
                id: fila.get(0)?,
                tipo_documento: fila.get(1)?,
                documento: fila.get(2)?,
                nombre: fila.get(3)?,
                apellido: fila.get(4)?,
                celular: fila.get(5)?,
                correo: fila.get(6)?,
                direccion: fila.get(7)?,
                departamento: fila.get(8)?,
                municipio: fila.get(9)?,
                estado: fila.get(10)?,
                ficha_numero: fila.get(11)?,
            })
        })
        .map_err(|e| e.to_string())?
        .filter_map(Result::ok)
        .collect();

    Ok(Some(serde_json::json!({
        "numero_ficha": numero,
        "total_aprendices": aprendices.len(),
        "fecha_inicio": ficha.fecha_inicio,
        "fecha_fin": ficha.fecha_fin,
        "aprendices": aprendices,
    })))
}
