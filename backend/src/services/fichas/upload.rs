//! Roster upload endpoints and the background batch processor.
//!
//! ## Workflow
//!
//! 1. `POST /api/fichas/upload` receives one or more .xlsx files as
//!    multipart/form-data (`archivos` fields). Extensions are validated and
//!    the bytes buffered before anything is accepted.
//! 2. A task id is generated, registered as `Pending` in the shared
//!    `TareasState`, and returned immediately; the client polls
//!    `/api/fichas/status/{task_id}` for progress.
//! 3. The batch runs on a blocking thread (`tokio::task::spawn_blocking`):
//!    each file goes through extraction and reconciliation with its own
//!    database connection and transaction. Files are independent — a fatal
//!    error in one is recorded in that file's outcome and processing moves
//!    on to the next.
//! 4. `POST /api/fichas/upload-maestro` takes the single master monthly
//!    file; same intake and task mechanics, but its effect is the default
//!    (fecha_inicio, fecha_fin) pair for fichas created afterwards.

use super::{extractor, reconciler};
use crate::config::Config;
use crate::db;
use crate::job_controller::state::{ActualizacionTarea, TareasState};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use common::jobs::{EstadoTarea, ProgresoTarea, ResultadoArchivo};
use futures_util::StreamExt;
use log::error;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use uuid::Uuid;

/// One buffered upload: raw bytes plus the original filename.
pub type ArchivoSubido = (Vec<u8>, String);

pub(crate) async fn process(
    state: web::Data<TareasState>,
    cfg: web::Data<Config>,
    payload: Multipart,
) -> impl Responder {
    let archivos = match leer_archivos(payload, "archivos").await {
        Ok(archivos) => archivos,
        Err(e) => return HttpResponse::BadRequest().body(e),
    };

    let task_id = programar_lote(&state, cfg.db.clone(), archivos.clone()).await;
    HttpResponse::Ok().json(serde_json::json!({
        "message": format!("Procesamiento iniciado para {} archivos", archivos.len()),
        "task_id": task_id,
        "total_archivos": archivos.len(),
    }))
}

pub(crate) async fn process_maestro(
    state: web::Data<TareasState>,
    cfg: web::Data<Config>,
    payload: Multipart,
) -> impl Responder {
    let mut archivos = match leer_archivos(payload, "archivo").await {
        Ok(archivos) => archivos,
        Err(e) => return HttpResponse::BadRequest().body(e),
    };
    // One master file per upload.
    let archivo = archivos.remove(0);
    let nombre = archivo.1.clone();

    let task_id = programar_maestro(&state, cfg.db.clone(), archivo).await;
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Archivo maestro mensual en procesamiento",
        "task_id": task_id,
        "archivo": nombre,
        "tipo": "archivo_maestro",
    }))
}

/// Buffers every file field named `campo`, validating the extension before
/// anything is accepted.
async fn leer_archivos(mut payload: Multipart, campo: &str) -> Result<Vec<ArchivoSubido>, String> {
    let mut archivos = Vec::new();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| e.to_string())?;
        let nombre_campo = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));
        if nombre_campo.as_deref() != Some(campo) {
            continue;
        }

        let nombre = field
            .content_disposition()
            .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
            .unwrap_or_default();
        if !(nombre.ends_with(".xlsx") || nombre.ends_with(".xls")) {
            return Err(format!("Archivo {} no es Excel válido", nombre));
        }

        let mut contenido = Vec::new();
        while let Some(chunk) = field.next().await {
            contenido.extend_from_slice(&chunk.map_err(|e| e.to_string())?);
        }
        archivos.push((contenido, nombre));
    }

    if archivos.is_empty() {
        return Err("No se enviaron archivos".to_string());
    }
    Ok(archivos)
}

/// Registers the task and spawns the blocking batch processor.
async fn programar_lote(
    state: &web::Data<TareasState>,
    db: PathBuf,
    archivos: Vec<ArchivoSubido>,
) -> String {
    let task_id = Uuid::new_v4().to_string();
    state.registrar(&task_id, archivos.len()).await;

    let tx = state.tx.clone();
    let task_id_clone = task_id.clone();
    tokio::spawn(async move {
        let handle = tokio::task::spawn_blocking(move || {
            procesar_lote_blocking(tx, task_id_clone, &db, archivos)
        });
        if let Err(e) = handle.await {
            error!("tarea de ingestión abortada: {}", e);
        }
    });

    task_id
}

async fn programar_maestro(
    state: &web::Data<TareasState>,
    db: PathBuf,
    archivo: ArchivoSubido,
) -> String {
    let task_id = Uuid::new_v4().to_string();
    state.registrar(&task_id, 1).await;

    let tx = state.tx.clone();
    let task_id_clone = task_id.clone();
    tokio::spawn(async move {
        let handle = tokio::task::spawn_blocking(move || {
            procesar_maestro_blocking(tx, task_id_clone, &db, archivo)
        });
        if let Err(e) = handle.await {
            error!("tarea de archivo maestro abortada: {}", e);
        }
    });

    task_id
}

/// Synchronous batch loop, run via `spawn_blocking`. Sends a fresh progress
/// snapshot after every file so polling sees monotonically increasing
/// counters.
pub fn procesar_lote_blocking(
    tx: mpsc::Sender<ActualizacionTarea>,
    task_id: String,
    db: &Path,
    archivos: Vec<ArchivoSubido>,
) {
    let mut progreso = ProgresoTarea::new(archivos.len());
    progreso.status = EstadoTarea::Running;
    enviar(&tx, &task_id, &progreso);

    for (contenido, nombre) in archivos {
        let resultado = match procesar_archivo(db, &contenido) {
            Ok(r) => ResultadoArchivo::exito(nombre, r.fichas_creadas, r.aprendices_creados),
            Err(e) => {
                error!("error procesando {}: {}", nombre, e);
                ResultadoArchivo::fallo(nombre, e)
            }
        };
        progreso.resultados.push(resultado);
        progreso.archivos_procesados += 1;
        enviar(&tx, &task_id, &progreso);
    }

    progreso.status = EstadoTarea::Completed;
    enviar(&tx, &task_id, &progreso);
}

fn procesar_maestro_blocking(
    tx: mpsc::Sender<ActualizacionTarea>,
    task_id: String,
    db: &Path,
    archivo: ArchivoSubido,
) {
    let (contenido, nombre) = archivo;
    let mut progreso = ProgresoTarea::new(1);
    progreso.status = EstadoTarea::Running;
    enviar(&tx, &task_id, &progreso);

    let resultado = match procesar_maestro(db, &contenido) {
        Ok(()) => ResultadoArchivo::exito(nombre, 0, 0),
        Err(e) => {
            error!("error procesando archivo maestro {}: {}", nombre, e);
            ResultadoArchivo::fallo(nombre, e)
        }
    };
    progreso.resultados.push(resultado);
    progreso.archivos_procesados = 1;
    progreso.status = EstadoTarea::Completed;
    enviar(&tx, &task_id, &progreso);
}

/// Extraction + reconciliation for one file, with its own connection and
/// transaction.
pub fn procesar_archivo(db: &Path, contenido: &[u8]) -> Result<reconciler::Reconciliado, String> {
    let extraccion = extractor::extraer(contenido).map_err(|e| e.to_string())?;
    let meta = extractor::extraer_metadatos(&extraccion.cabecera).map_err(|e| e.to_string())?;
    let mut conn = db::abrir(db).map_err(|e| e.to_string())?;
    reconciler::reconciliar(&mut conn, &extraccion, &meta)
}

fn procesar_maestro(db: &Path, contenido: &[u8]) -> Result<(), String> {
    let extraccion = extractor::extraer(contenido).map_err(|e| e.to_string())?;
    let conn = db::abrir(db).map_err(|e| e.to_string())?;
    reconciler::aplicar_archivo_maestro(&conn, &extraccion)?;
    Ok(())
}

fn enviar(tx: &mpsc::Sender<ActualizacionTarea>, task_id: &str, progreso: &ProgresoTarea) {
    let _ = tx.blocking_send(ActualizacionTarea {
        task_id: task_id.to_string(),
        progreso: progreso.clone(),
    });
}

#[cfg(test)]
mod pruebas {
    use super::*;
    use crate::services::fichas::extractor::pruebas::{libro_de_prueba, libro_escenario};
    use common::jobs::EstadoArchivo;

    fn db_temporal() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let ruta = dir.path().join("pruebas.sqlite");
        db::inicializar(&ruta).expect("esquema");
        (dir, ruta)
    }

    #[test]
    fn procesa_archivo_del_escenario() {
        let (_dir, ruta) = db_temporal();
        let resultado = procesar_archivo(&ruta, &libro_escenario()).expect("procesar");
        assert_eq!(resultado.fichas_creadas, 1);
        assert_eq!(resultado.aprendices_creados, 3);
    }

    #[test]
    fn archivos_del_lote_son_independientes() {
        let (_dir, ruta) = db_temporal();
        let valido = libro_escenario();
        // Header block without any ficha number: terminal for this file only.
        let invalido = libro_de_prueba(&[
            vec!["REPORTE"],
            vec![""],
            vec![""],
            vec!["Documento", "Nombre"],
            vec![""],
            vec!["123", "ANA"],
        ]);

        let (tx, mut rx) = tokio::sync::mpsc::channel(32);
        procesar_lote_blocking(
            tx,
            "tarea".to_string(),
            &ruta,
            vec![
                (invalido, "malo.xlsx".to_string()),
                (valido, "bueno.xlsx".to_string()),
            ],
        );

        let mut ultimo = None;
        let mut procesados_previos = 0;
        while let Ok(actualizacion) = rx.try_recv() {
            // Progress counters only ever increase.
            assert!(actualizacion.progreso.archivos_procesados >= procesados_previos);
            procesados_previos = actualizacion.progreso.archivos_procesados;
            ultimo = Some(actualizacion.progreso);
        }

        let progreso = ultimo.expect("al menos una actualización");
        assert_eq!(progreso.status, EstadoTarea::Completed);
        assert_eq!(progreso.archivos_procesados, 2);
        assert_eq!(progreso.resultados.len(), 2);
        assert_eq!(progreso.resultados[0].status, EstadoArchivo::Error);
        assert_eq!(progreso.resultados[1].status, EstadoArchivo::Success);
        assert_eq!(progreso.resultados[1].aprendices_creados, Some(3));
    }

    #[test]
    fn maestro_guarda_fechas_por_defecto() {
        let (_dir, ruta) = db_temporal();
        let maestro = libro_de_prueba(&[
            vec!["CALENDARIO ETAPA LECTIVA"],
            vec!["Inicio: 01/04/2024", "Fin: 20/12/2024"],
            vec!["Regional Distrito Capital"],
            vec!["Centro de Gestión"],
            vec!["Vigencia 2024"],
        ]);

        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        procesar_maestro_blocking(
            tx,
            "tarea".to_string(),
            &ruta,
            (maestro, "maestro.xlsx".to_string()),
        );

        let mut ultimo = None;
        while let Ok(actualizacion) = rx.try_recv() {
            ultimo = Some(actualizacion.progreso);
        }
        let progreso = ultimo.expect("actualización");
        assert_eq!(progreso.resultados[0].status, EstadoArchivo::Success);

        let conn = db::abrir(&ruta).expect("abrir");
        let inicio: String = conn
            .query_row("SELECT fecha_inicio FROM fechas_maestras", [], |f| f.get(0))
            .expect("fechas maestras");
        assert_eq!(inicio, "2024-04-01");
    }
}
