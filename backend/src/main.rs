mod config;
mod db;
mod job_controller;
mod services;

use crate::config::Config;
use crate::job_controller::state::TareasState;
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::info;
use tokio::sync::mpsc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let cfg = Config::desde_entorno();

    db::inicializar(&cfg.db)
        .map_err(|e| std::io::Error::other(format!("inicializando la base de datos: {}", e)))?;
    if !cfg.plantilla.exists() {
        info!("Plantilla no encontrada, generando una base en {:?}", cfg.plantilla);
        services::formatos::filler::crear_plantilla_base(&cfg.plantilla)
            .map_err(std::io::Error::other)?;
    }

    // Initialize task controller state
    let (tx, rx) = mpsc::channel(100);
    let state = TareasState::new(tx);

    let updater_state = state.clone();
    tokio::spawn(async move {
        job_controller::state::start_task_updater(updater_state, rx).await;
    });
    let sweeper_state = state.clone();
    tokio::spawn(async move {
        job_controller::state::start_task_sweeper(sweeper_state).await;
    });

    let direccion = (cfg.host.clone(), cfg.puerto);
    info!("Server running at http://{}:{}", direccion.0, direccion.1);

    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(10 * 1024 * 1024)) // 10 MB
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(cfg.clone()))
            .service(services::fichas::configure_routes())
            .service(services::aprendices::configure_routes())
            .service(services::formatos::configure_routes())
    })
    .bind(direccion)?
    .run()
    .await
}
