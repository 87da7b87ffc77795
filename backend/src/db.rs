//! SQLite access: connection helper and schema initialization.
//!
//! Every job or request opens its own `Connection`; nothing shares a session.
//! The schema is applied idempotently at startup (and by tests against
//! in-memory connections).

use rusqlite::Connection;
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS fichas (
    numero_ficha             TEXT PRIMARY KEY,
    programa                 TEXT NOT NULL,
    estado                   TEXT NOT NULL,
    fecha_inicio             TEXT,
    fecha_fin                TEXT,
    fecha_reporte            TEXT,
    fecha_inicio_productiva  TEXT,
    jornada                  TEXT,
    modalidad_formacion      TEXT
);

CREATE TABLE IF NOT EXISTS aprendices (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    tipo_documento  TEXT NOT NULL DEFAULT 'CC',
    documento       TEXT NOT NULL,
    nombre          TEXT NOT NULL DEFAULT '',
    apellido        TEXT NOT NULL DEFAULT '',
    celular         TEXT NOT NULL DEFAULT '',
    correo          TEXT NOT NULL DEFAULT '',
    direccion       TEXT NOT NULL DEFAULT '',
    departamento    TEXT,
    municipio       TEXT,
    estado          TEXT NOT NULL DEFAULT '',
    ficha_numero    TEXT NOT NULL REFERENCES fichas(numero_ficha),
    UNIQUE (documento, ficha_numero)
);

CREATE TABLE IF NOT EXISTS archivos_exportados (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre_original     TEXT NOT NULL,
    nombre_interno      TEXT NOT NULL UNIQUE,
    ruta_archivo        TEXT NOT NULL,
    ficha               TEXT NOT NULL,
    modalidad           TEXT NOT NULL,
    cantidad_aprendices INTEGER NOT NULL,
    hash_archivo        TEXT NOT NULL,
    tamano_bytes        INTEGER NOT NULL,
    usuario_id          INTEGER NOT NULL DEFAULT 0,
    activo              INTEGER NOT NULL DEFAULT 1,
    fecha_creacion      TEXT NOT NULL,
    fecha_modificacion  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS fechas_maestras (
    id            INTEGER PRIMARY KEY CHECK (id = 1),
    fecha_inicio  TEXT NOT NULL,
    fecha_fin     TEXT NOT NULL,
    actualizado   TEXT NOT NULL
);
";

pub fn abrir(ruta: &Path) -> Result<Connection, rusqlite::Error> {
    Connection::open(ruta)
}

/// Applies the schema to an already-open connection.
pub fn preparar(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}

/// Creates the database file if needed and applies the schema.
pub fn inicializar(ruta: &Path) -> Result<(), rusqlite::Error> {
    let conn = abrir(ruta)?;
    preparar(&conn)
}
