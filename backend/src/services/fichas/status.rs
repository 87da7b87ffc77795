//! Polling endpoint for ingestion task progress.

use crate::job_controller::state::TareasState;
use actix_web::{web, HttpResponse, Responder};

pub(crate) async fn process(
    task_id: web::Path<String>,
    state: web::Data<TareasState>,
) -> impl Responder {
    let tareas = state.tareas.read().await;
    match tareas.get(task_id.as_str()) {
        Some(entrada) => HttpResponse::Ok().json(serde_json::json!({
            "status": entrada.progreso.status,
            "progreso": (entrada.progreso.porcentaje() * 100.0).round() / 100.0,
            "archivos_procesados": entrada.progreso.archivos_procesados,
            "total_archivos": entrada.progreso.total_archivos,
            "resultados": entrada.progreso.resultados,
        })),
        None => HttpResponse::NotFound().body("Tarea no encontrada"),
    }
}
