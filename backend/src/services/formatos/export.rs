//! F-165 export endpoint: roster in, finished document out.
//!
//! ## Workflow
//!
//! 1. `POST /api/formatos/exportar` receives the modality, the ficha number
//!    and the roster selected in the front end (order preserved).
//! 2. The whole pipeline runs on a blocking thread (`web::block`): signature
//!    decoding, template filling and archiving are all file- and CPU-bound.
//! 3. If the ficha is not in the database yet it is created with default
//!    values on first sight; exporting never mutates an existing ficha.
//! 4. The response body is the document itself, served as an attachment; the
//!    archived copy and its catalog row are queryable afterwards through
//!    `/api/formatos/historial`.

use super::archive::{Archivador, DatosExportacion};
use super::filler::{self, FormatoError, Responsable};
use super::firmas;
use crate::config::Config;
use crate::db;
use crate::services::fichas::list::consultar_ficha;
use crate::services::fichas::reconciler::{ESTADO_DESCONOCIDO, PROGRAMA_POR_DEFECTO};
use actix_web::{web, HttpResponse, Responder};
use common::model::archivo::{ArchivoExportado, Modalidad};
use common::model::ficha::Ficha;
use common::requests::ExportarFormatoRequest;
use log::info;
use rusqlite::{params, Connection};

pub(crate) async fn process(
    cfg: web::Data<Config>,
    req: web::Json<ExportarFormatoRequest>,
) -> impl Responder {
    let resultado = web::block(move || exportar_blocking(&cfg, req.into_inner())).await;

    match resultado {
        Ok(Ok((bytes, archivo))) => HttpResponse::Ok()
            .content_type("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
            .insert_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", archivo.nombre_original),
            ))
            .insert_header(("X-Archivo-Id", archivo.id.to_string()))
            .body(bytes),
        Ok(Err(e)) => respuesta_de_error(e),
        Err(e) => HttpResponse::InternalServerError().body(format!("Exportación abortada: {}", e)),
    }
}

fn respuesta_de_error(e: FormatoError) -> HttpResponse {
    match e {
        FormatoError::ModalidadInvalida(_) | FormatoError::SinAprendices => {
            HttpResponse::BadRequest().body(e.to_string())
        }
        otro => HttpResponse::InternalServerError().body(otro.to_string()),
    }
}

/// Runs the full export pipeline synchronously and returns the document
/// bytes plus its catalog row.
pub fn exportar_blocking(
    cfg: &Config,
    req: ExportarFormatoRequest,
) -> Result<(Vec<u8>, ArchivoExportado), FormatoError> {
    let modalidad = Modalidad::parse(&req.modalidad)
        .ok_or_else(|| FormatoError::ModalidadInvalida(req.modalidad.clone()))?;
    if req.aprendices.is_empty() {
        return Err(FormatoError::SinAprendices);
    }

    let conn = db::abrir(&cfg.db).map_err(|e| FormatoError::Datos(e.to_string()))?;
    let ficha = ficha_para_exportar(&conn, &req.ficha)?;

    // Temp PNG assets live until the document is serialized.
    let firmas_payload: Vec<Option<String>> =
        req.aprendices.iter().map(|a| a.firma.clone()).collect();
    let activos = firmas::procesar_firmas(&firmas_payload);

    let responsable = Responsable {
        nombre: req.usuario_nombre.clone().unwrap_or_default(),
        correo: req.usuario_correo.clone().unwrap_or_default(),
    };
    let (bytes, nombre) = filler::llenar_formato(
        &cfg.plantilla,
        &ficha,
        &req.aprendices,
        &activos,
        modalidad,
        &responsable,
    )?;

    let archivador = Archivador::new(&cfg.exportados);
    let archivo = archivador.guardar(
        &conn,
        &bytes,
        &DatosExportacion {
            nombre_original: nombre,
            ficha: req.ficha.clone(),
            modalidad,
            cantidad_aprendices: req.aprendices.len() as u32,
            usuario_id: req.usuario_id.unwrap_or(0),
        },
    )?;

    info!(
        "Formato {} exportado para la ficha {} ({} aprendices)",
        archivo.nombre_interno, archivo.ficha, archivo.cantidad_aprendices
    );
    Ok((bytes, archivo))
}

/// Loads the ficha, creating a minimal record the first time the number is
/// seen. An export never overwrites fields of an existing ficha.
fn ficha_para_exportar(conn: &Connection, numero: &str) -> Result<Ficha, FormatoError> {
    if let Some(ficha) = consultar_ficha(conn, numero).map_err(FormatoError::Datos)? {
        return Ok(ficha);
    }

    conn.execute(
        "INSERT INTO fichas (numero_ficha, programa, estado) VALUES (?1, ?2, ?3)",
        params![numero, PROGRAMA_POR_DEFECTO, ESTADO_DESCONOCIDO],
    )
    .map_err(|e| FormatoError::Datos(e.to_string()))?;

    consultar_ficha(conn, numero)
        .map_err(FormatoError::Datos)?
        .ok_or_else(|| FormatoError::Datos("ficha recién creada no encontrada".to_string()))
}

#[cfg(test)]
mod pruebas {
    use super::*;
    use crate::services::formatos::filler::crear_plantilla_base;
    use common::model::aprendiz::AprendizExportar;
    use std::path::Path;

    fn entorno() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config {
            db: dir.path().join("pruebas.sqlite"),
            exportados: dir.path().join("archivos_exportados"),
            plantilla: dir.path().join("plantillas").join("GFPI-F-165.xlsx"),
            host: "127.0.0.1".to_string(),
            puerto: 0,
        };
        db::inicializar(&cfg.db).expect("esquema");
        crear_plantilla_base(&cfg.plantilla).expect("plantilla");
        (dir, cfg)
    }

    fn solicitud(modalidad: &str, aprendices: Vec<AprendizExportar>) -> ExportarFormatoRequest {
        ExportarFormatoRequest {
            modalidad: modalidad.to_string(),
            ficha: "3147272".to_string(),
            aprendices,
            usuario_id: Some(7),
            usuario_nombre: Some("INSTRUCTOR PRUEBA".to_string()),
            usuario_correo: Some("instructor@example.com".to_string()),
        }
    }

    fn aprendiz(documento: &str) -> AprendizExportar {
        AprendizExportar {
            tipo_documento: "CC".to_string(),
            documento: documento.to_string(),
            nombre: "ANA".to_string(),
            apellidos: "PÉREZ".to_string(),
            direccion: "Calle 1".to_string(),
            correo: "ana@example.com".to_string(),
            celular: "3000000000".to_string(),
            discapacidad: "No".to_string(),
            tipo_discapacidad: String::new(),
            firma: None,
        }
    }

    #[test]
    fn exporta_y_archiva_de_extremo_a_extremo() {
        let (_dir, cfg) = entorno();
        let (bytes, archivo) = exportar_blocking(
            &cfg,
            solicitud("grupal", vec![aprendiz("1001"), aprendiz("1002")]),
        )
        .expect("exportar");

        assert!(!bytes.is_empty());
        assert_eq!(archivo.ficha, "3147272");
        assert_eq!(archivo.modalidad, "grupal");
        assert_eq!(archivo.cantidad_aprendices, 2);
        assert_eq!(archivo.usuario_id, 7);
        // The catalog keeps a storage-relative path under the export root.
        assert!(Path::new(&archivo.ruta_archivo).is_relative());
        assert!(cfg.exportados.join(&archivo.ruta_archivo).exists());

        // The catalog row is live and the stored copy intact.
        let conn = db::abrir(&cfg.db).expect("abrir");
        let archivador = Archivador::new(&cfg.exportados);
        assert!(archivador
            .verificar_integridad(&conn, archivo.id)
            .expect("verificar"));
    }

    #[test]
    fn crea_la_ficha_en_el_primer_export() {
        let (_dir, cfg) = entorno();
        exportar_blocking(&cfg, solicitud("individual", vec![aprendiz("1001")]))
            .expect("exportar");

        let conn = db::abrir(&cfg.db).expect("abrir");
        let ficha = consultar_ficha(&conn, "3147272")
            .expect("consultar")
            .expect("creada");
        assert_eq!(ficha.estado, ESTADO_DESCONOCIDO);
        assert_eq!(ficha.programa, PROGRAMA_POR_DEFECTO);
    }

    #[test]
    fn no_modifica_una_ficha_existente() {
        let (_dir, cfg) = entorno();
        let conn = db::abrir(&cfg.db).expect("abrir");
        conn.execute(
            "INSERT INTO fichas (numero_ficha, programa, estado) VALUES (?1, ?2, ?3)",
            params!["3147272", "ANÁLISIS DE DATOS", "EN EJECUCION"],
        )
        .expect("sembrar");

        exportar_blocking(&cfg, solicitud("grupal", vec![aprendiz("1001")])).expect("exportar");

        let ficha = consultar_ficha(&conn, "3147272")
            .expect("consultar")
            .expect("existe");
        assert_eq!(ficha.programa, "ANÁLISIS DE DATOS");
        assert_eq!(ficha.estado, "EN EJECUCION");
    }

    #[test]
    fn rechaza_modalidad_desconocida() {
        let (_dir, cfg) = entorno();
        let resultado = exportar_blocking(&cfg, solicitud("mixta", vec![aprendiz("1001")]));
        assert!(matches!(
            resultado,
            Err(FormatoError::ModalidadInvalida(m)) if m == "mixta"
        ));
    }

    #[test]
    fn rechaza_roster_vacio() {
        let (_dir, cfg) = entorno();
        let resultado = exportar_blocking(&cfg, solicitud("grupal", Vec::new()));
        assert!(matches!(resultado, Err(FormatoError::SinAprendices)));
    }
}
