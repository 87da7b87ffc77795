//! Partial update of an aprendiz, keyed by document number.
//!
//! The set of updatable columns is a fixed whitelist mirrored by the typed
//! `AprendizActualizacion` payload; fields absent from the request are left
//! untouched. The updated row is returned so the client does not need a
//! follow-up read.

use crate::config::Config;
use crate::db;
use actix_web::{web, HttpResponse, Responder};
use common::requests::AprendizActualizacion;
use rusqlite::{params, types::Value, Connection};

pub(crate) async fn process(
    documento: web::Path<String>,
    cfg: web::Data<Config>,
    datos: web::Json<AprendizActualizacion>,
) -> impl Responder {
    let conn = match db::abrir(&cfg.db) {
        Ok(conn) => conn,
        Err(e) => return HttpResponse::ServiceUnavailable().body(format!("Error: {}", e)),
    };

    match actualizar_aprendiz(&conn, &documento, &datos.into_inner()) {
        Ok(Some(aprendiz)) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "message": "Aprendiz actualizado correctamente",
            "aprendiz_actualizado": aprendiz,
        })),
        Ok(None) => {
            HttpResponse::NotFound().body(format!("Aprendiz con {} no encontrado", documento))
        }
        Err(e) => HttpResponse::BadRequest().body(e),
    }
}

/// Applies the whitelisted changes. Returns the updated row as JSON, or
/// `None` when no aprendiz carries the document number.
pub fn actualizar_aprendiz(
    conn: &Connection,
    documento: &str,
    datos: &AprendizActualizacion,
) -> Result<Option<serde_json::Value>, String> {
    let cambios: [(&str, &Option<String>); 9] = [
        ("tipo_documento", &datos.tipo_documento),
        ("nombre", &datos.nombre),
        ("apellido", &datos.apellido),
        ("direccion", &datos.direccion),
        ("correo", &datos.correo),
        ("celular", &datos.celular),
        ("departamento", &datos.departamento),
        ("municipio", &datos.municipio),
        ("estado", &datos.estado),
    ];

    let mut asignaciones = Vec::new();
    let mut valores: Vec<Value> = Vec::new();
    for (columna, valor) in cambios {
        if let Some(v) = valor {
            asignaciones.push(format!("{} = ?{}", columna, asignaciones.len() + 1));
            valores.push(Value::Text(v.clone()));
        }
    }
    if asignaciones.is_empty() {
        return Err("Sin campos para actualizar".to_string());
    }

    valores.push(Value::Text(documento.to_string()));
    let sql = format!(
        "UPDATE aprendices SET {} WHERE documento = ?{}",
        asignaciones.join(", "),
        valores.len()
    );
    let afectadas = conn
        .execute(&sql, rusqlite::params_from_iter(valores))
        .map_err(|e| e.to_string())?;
    if afectadas == 0 {
        return Ok(None);
    }

    let aprendiz = conn
        .query_row(
            "SELECT tipo_documento, documento, nombre, apellido, direccion, correo, celular, estado
             FROM aprendices WHERE documento = ?1",
            params![documento],
            |fila| {
                Ok(serde_json::json!({
                    "tipo_documento": fila.get::<_, String>(0)?,
                    "documento": fila.get::<_, String>(1)?,
                    "nombre": fila.get::<_, String>(2)?,
                    "apellido": fila.get::<_, String>(3)?,
                    "direccion": fila.get::<_, String>(4)?,
                    "correo": fila.get::<_, String>(5)?,
                    "celular": fila.get::<_, String>(6)?,
                    "estado": fila.get::<_, String>(7)?,
                }))
            },
        )
        .map_err(|e| e.to_string())?;
    Ok(Some(aprendiz))
}

#[cfg(test)]
mod pruebas {
    use super::*;

    fn conexion_con_aprendiz() -> Connection {
        let conn = Connection::open_in_memory().expect("sqlite en memoria");
        db::preparar(&conn).expect("esquema");
        conn.execute(
            "INSERT INTO fichas (numero_ficha, programa, estado) VALUES ('3147272', 'P', 'ACTIVA')",
            [],
        )
        .expect("ficha");
        conn.execute(
            "INSERT INTO aprendices (tipo_documento, documento, nombre, apellido, ficha_numero)
             VALUES ('CC', '1001', 'ANA', 'GOMEZ', '3147272')",
            [],
        )
        .expect("aprendiz");
        conn
    }

    #[test]
    fn actualiza_solo_los_campos_presentes() {
        let conn = conexion_con_aprendiz();
        let datos = AprendizActualizacion {
            celular: Some("3001234567".to_string()),
            correo: Some("ana@example.com".to_string()),
            ..AprendizActualizacion::default()
        };

        let aprendiz = actualizar_aprendiz(&conn, "1001", &datos)
            .expect("actualizar")
            .expect("encontrado");
        assert_eq!(aprendiz["celular"], "3001234567");
        assert_eq!(aprendiz["correo"], "ana@example.com");
        // Untouched fields keep their values.
        assert_eq!(aprendiz["nombre"], "ANA");
        assert_eq!(aprendiz["apellido"], "GOMEZ");
    }

    #[test]
    fn documento_desconocido_devuelve_none() {
        let conn = conexion_con_aprendiz();
        let datos = AprendizActualizacion {
            nombre: Some("LUIS".to_string()),
            ..AprendizActualizacion::default()
        };
        assert!(actualizar_aprendiz(&conn, "9999", &datos)
            .expect("actualizar")
            .is_none());
    }

    #[test]
    fn sin_campos_es_error() {
        let conn = conexion_con_aprendiz();
        assert!(actualizar_aprendiz(&conn, "1001", &AprendizActualizacion::default()).is_err());
    }
}
