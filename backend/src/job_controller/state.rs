//! Tracks the state of long-running background ingestion tasks.
//!
//! An upload batch is accepted, handed a task id, and processed outside the
//! request/response cycle; clients poll `/api/fichas/status/{task_id}` while
//! the files are worked through.
//!
//! The main components are:
//! - `TareasState`: a clonable, thread-safe registry of task id → progress
//!   snapshot, injected into the Actix application state in `main.rs`.
//! - `ActualizacionTarea`: a message struct pushed by background workers to
//!   report a new progress snapshot for their task.
//! - `start_task_updater`: a long-running task that listens for updates on an
//!   MPSC channel and writes them into the shared registry.
//! - `start_task_sweeper`: evicts completed tasks after a TTL so the registry
//!   does not grow for the lifetime of the process.

use common::jobs::{EstadoTarea, ProgresoTarea};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{mpsc, RwLock};

/// How long a completed task remains observable before eviction.
pub const TTL_TAREA_COMPLETADA: Duration = Duration::from_secs(15 * 60);
/// Sweep interval for the eviction task.
const INTERVALO_BARRIDO: Duration = Duration::from_secs(60);

/// Registry entry: the latest progress snapshot plus, once the task reaches
/// `Completed`, the instant it did so.
#[derive(Debug)]
pub struct EntradaTarea {
    pub progreso: ProgresoTarea,
    pub completada_en: Option<Instant>,
}

/// A thread-safe, shareable container for the state of all ingestion tasks.
#[derive(Clone)]
pub struct TareasState {
    /// Single source of truth for task progress. Concurrent reads come from
    /// the status endpoint; the updater task is the only writer of snapshots.
    pub tareas: Arc<RwLock<HashMap<String, EntradaTarea>>>,

    /// Sender used by background workers to report progress without needing
    /// direct write access to the registry.
    pub tx: mpsc::Sender<ActualizacionTarea>,
}

impl TareasState {
    pub fn new(tx: mpsc::Sender<ActualizacionTarea>) -> Self {
        TareasState {
            tareas: Arc::new(RwLock::new(HashMap::new())),
            tx,
        }
    }

    /// Registers a freshly accepted task in `Pending` state.
    pub async fn registrar(&self, task_id: &str, total_archivos: usize) {
        let mut tareas = self.tareas.write().await;
        tareas.insert(
            task_id.to_string(),
            EntradaTarea {
                progreso: ProgresoTarea::new(total_archivos),
                completada_en: None,
            },
        );
    }
}

/// A new progress snapshot for a specific task.
#[derive(Debug)]
pub struct ActualizacionTarea {
    pub task_id: String,
    pub progreso: ProgresoTarea,
}

/// Central updater: applies incoming snapshots to the shared registry and
/// timestamps tasks the moment they complete.
pub async fn start_task_updater(state: TareasState, mut rx: mpsc::Receiver<ActualizacionTarea>) {
    while let Some(actualizacion) = rx.recv().await {
        let mut tareas = state.tareas.write().await;
        let completada_en = if actualizacion.progreso.status == EstadoTarea::Completed {
            Some(Instant::now())
        } else {
            None
        };
        tareas.insert(
            actualizacion.task_id,
            EntradaTarea {
                progreso: actualizacion.progreso,
                completada_en,
            },
        );
    }
}

/// Periodically drops tasks that completed more than `TTL_TAREA_COMPLETADA`
/// ago. Running and pending tasks are never evicted.
pub async fn start_task_sweeper(state: TareasState) {
    let mut intervalo = tokio::time::interval(INTERVALO_BARRIDO);
    loop {
        intervalo.tick().await;
        let mut tareas = state.tareas.write().await;
        tareas.retain(|_, entrada| match entrada.completada_en {
            Some(instante) => instante.elapsed() < TTL_TAREA_COMPLETADA,
            None => true,
        });
    }
}
