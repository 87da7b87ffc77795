//! F-165 generation and the export catalog.
//!
//! [`firmas`] decodes signature payloads into temp PNG assets, [`filler`]
//! fills a working copy of the template, [`archive`] stores the result with
//! a SHA-256 fingerprint, and [`export`] chains the three behind one
//! endpoint. [`history`] serves the catalog afterwards.
//!
//! Routes:
//! - `POST /api/formatos/exportar`: roster in, finished .xlsx out.
//! - `GET /api/formatos/historial`: active exports, newest first.
//! - `GET /api/formatos/descargar/{id}`: the archived copy.
//! - `GET /api/formatos/verificar/{id}`: recomputed-hash integrity check.
//! - `DELETE /api/formatos/{id}`: soft delete from the catalog.

pub mod archive;
pub mod export;
pub mod filler;
pub mod firmas;
pub mod history;

use actix_web::web::{delete, get, post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/formatos";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/exportar", post().to(export::process))
        .route("/historial", get().to(history::process_historial))
        .route("/descargar/{id}", get().to(history::process_descargar))
        .route("/verificar/{id}", get().to(history::process_verificar))
        .route("/{id}", delete().to(history::process_eliminar))
}
