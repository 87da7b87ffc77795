use serde::Serialize;

/// Overall state of a background ingestion task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstadoTarea {
    Pending,
    Running,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstadoArchivo {
    Success,
    Error,
}

/// Outcome entry for a single file within an upload batch.
///
/// Each file succeeds or fails independently; a fatal error in one never
/// aborts its siblings, it only shows up here.
#[derive(Clone, Debug, Serialize)]
pub struct ResultadoArchivo {
    pub archivo: String,
    pub status: EstadoArchivo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fichas_creadas: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aprendices_creados: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultadoArchivo {
    pub fn exito(archivo: String, fichas: u32, aprendices: u32) -> Self {
        ResultadoArchivo {
            archivo,
            status: EstadoArchivo::Success,
            fichas_creadas: Some(fichas),
            aprendices_creados: Some(aprendices),
            error: None,
        }
    }

    pub fn fallo(archivo: String, error: String) -> Self {
        ResultadoArchivo {
            archivo,
            status: EstadoArchivo::Error,
            fichas_creadas: None,
            aprendices_creados: None,
            error: Some(error),
        }
    }
}

/// Progress snapshot of one ingestion task, as returned by the status
/// polling endpoint. Counters only ever increase.
#[derive(Clone, Debug, Serialize)]
pub struct ProgresoTarea {
    pub status: EstadoTarea,
    pub total_archivos: usize,
    pub archivos_procesados: usize,
    pub resultados: Vec<ResultadoArchivo>,
}

impl ProgresoTarea {
    pub fn new(total_archivos: usize) -> Self {
        ProgresoTarea {
            status: EstadoTarea::Pending,
            total_archivos,
            archivos_procesados: 0,
            resultados: Vec::new(),
        }
    }

    /// Completion percentage in `[0, 100]`.
    pub fn porcentaje(&self) -> f32 {
        if self.total_archivos == 0 {
            return 0.0;
        }
        self.archivos_procesados as f32 / self.total_archivos as f32 * 100.0
    }
}
