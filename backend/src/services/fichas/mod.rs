//! Roster ingestion: uploads, background extraction, progress and queries.
//!
//! The pipeline behind these routes is split in two layers with no HTTP in
//! them: [`extractor`] turns raw workbook bytes into a normalized
//! (header, columns, rows) extraction, and [`reconciler`] upserts that
//! extraction into the database with idempotent semantics. The handlers in
//! [`upload`] only do intake and task bookkeeping.
//!
//! Routes:
//! - `POST /api/fichas/upload`: multipart batch of roster .xlsx files;
//!   returns a `task_id` for polling.
//! - `POST /api/fichas/upload-maestro`: the monthly master file that sets
//!   default cohort dates for fichas created afterwards.
//! - `GET /api/fichas/status/{task_id}`: progress + per-file outcomes.
//! - `GET /api/fichas`: all fichas with student counts.
//! - `GET /api/fichas/{numero}/aprendices`: one ficha's roster.

pub mod extractor;
pub mod list;
pub mod reconciler;
pub mod status;
pub mod upload;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/fichas";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/upload", post().to(upload::process))
        .route("/upload-maestro", post().to(upload::process_maestro))
        .route("/status/{task_id}", get().to(status::process))
        .route("", get().to(list::process_listado))
        .route("/{numero}/aprendices", get().to(list::process_aprendices))
}
