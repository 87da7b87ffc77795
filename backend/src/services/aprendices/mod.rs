mod update;

use actix_web::web::{patch, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/aprendices";

/// Configures the aprendiz routes: a single whitelisted partial update,
/// `PATCH /api/aprendices/{documento}`.
pub fn configure_routes() -> Scope {
    scope(API_PATH).route("/{documento}", patch().to(update::process))
}
