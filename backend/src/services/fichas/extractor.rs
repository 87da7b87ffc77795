//! Tabular extraction from uploaded roster workbooks.
//!
//! The files SENA hands out are "almost" tabular: the first rows carry
//! free-form metadata (ficha number, estado, report date) at positions that
//! drift between exports, followed by the actual student table. Instead of
//! fixed offsets, each metadata field is found by an independent pattern
//! matcher run over every header-block row; the first match per field wins.
//!
//! The contract of [`extraer`]: raw bytes in, a normalized
//! (header block, column names, data rows) triple out, or a typed error.
//! Column names are fuzzy-mapped to canonical field keys by
//! [`mapear_columna`]; unmapped columns are simply dropped.

use calamine::{Data, Reader, Xlsx};
use chrono::NaiveDate;
use regex::Regex;
use std::io::Cursor;
use std::sync::LazyLock;
use thiserror::Error;

/// Minimum row count for a workbook to be considered a roster at all.
pub const MIN_FILAS: usize = 5;
/// Rows 0..4 form the free-form header block.
pub const FILAS_CABECERA: usize = 4;
/// Row index (within the sheet) holding the column names.
pub const FILA_NOMBRES: usize = 3;
/// Row index where student data starts.
pub const FILA_DATOS: usize = 5;

static RE_FICHA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{7}").expect("regex fija"));
static RE_FECHA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}/\d{1,2}/\d{4}").expect("regex fija"));

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no se pudo leer el libro de Excel: {0}")]
    Libro(#[from] calamine::XlsxError),
    #[error("el libro no contiene hojas")]
    SinHojas,
    #[error("el archivo no tiene suficientes filas; se necesitan al menos {min}")]
    FilasInsuficientes { min: usize },
    #[error("no se pudo extraer el número de ficha de la cabecera")]
    SinNumeroFicha,
}

/// Normalized view of one uploaded workbook.
#[derive(Debug, Clone)]
pub struct Extraccion {
    /// The four header-block rows, cell by cell, as text.
    pub cabecera: Vec<Vec<String>>,
    /// Trimmed, non-empty column names, left to right, truncated to the
    /// data table's actual width.
    pub columnas: Vec<String>,
    /// Data rows (sheet row 5 onward), as text.
    pub filas: Vec<Vec<String>>,
}

/// Ficha metadata recovered from the header block.
#[derive(Debug, Clone)]
pub struct MetadatosFicha {
    pub numero_ficha: String,
    pub estado: Option<String>,
    pub fecha_reporte: Option<NaiveDate>,
}

fn celda_a_texto(celda: &Data) -> String {
    match celda {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Document numbers arrive as floats; print them without a fake
        // decimal part.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{:?}", e),
    }
}

/// Decodes the first sheet of an .xlsx upload into an [`Extraccion`].
pub fn extraer(contenido: &[u8]) -> Result<Extraccion, ExtractError> {
    let mut libro: Xlsx<_> = Xlsx::new(Cursor::new(contenido.to_vec()))?;
    let rango = libro
        .worksheet_range_at(0)
        .ok_or(ExtractError::SinHojas)??;

    let filas_crudas: Vec<Vec<String>> = rango
        .rows()
        .map(|fila| fila.iter().map(celda_a_texto).collect())
        .collect();

    if filas_crudas.len() < MIN_FILAS {
        return Err(ExtractError::FilasInsuficientes { min: MIN_FILAS });
    }

    let cabecera: Vec<Vec<String>> = filas_crudas[..FILAS_CABECERA].to_vec();
    let mut columnas: Vec<String> = cabecera[FILA_NOMBRES]
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    let filas: Vec<Vec<String>> = filas_crudas
        .get(FILA_DATOS..)
        .unwrap_or(&[])
        .to_vec();

    let ancho_datos = rango.get_size().1;
    truncar_columnas(&mut columnas, ancho_datos);

    Ok(Extraccion {
        cabecera,
        columnas,
        filas,
    })
}

/// Runs the three metadata scanners over the header block. Only the ficha
/// number is mandatory.
pub fn extraer_metadatos(cabecera: &[Vec<String>]) -> Result<MetadatosFicha, ExtractError> {
    let numero_ficha = buscar_numero_ficha(cabecera).ok_or(ExtractError::SinNumeroFicha)?;
    Ok(MetadatosFicha {
        numero_ficha,
        estado: buscar_estado(cabecera),
        fecha_reporte: buscar_fecha_reporte(cabecera),
    })
}

/// More discovered names than actual data columns: truncate to fit,
/// silently.
fn truncar_columnas(columnas: &mut Vec<String>, ancho_datos: usize) {
    if columnas.len() > ancho_datos {
        columnas.truncate(ancho_datos);
    }
}

fn aplanar(fila: &[String]) -> String {
    fila.iter()
        .map(String::as_str)
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// First header row containing the token "ficha" and a 7-digit run; the
/// first such run is the ficha number.
pub fn buscar_numero_ficha(cabecera: &[Vec<String>]) -> Option<String> {
    cabecera.iter().map(|f| aplanar(f)).find_map(|texto| {
        if !texto.to_lowercase().contains("ficha") {
            return None;
        }
        RE_FICHA.find(&texto).map(|m| m.as_str().to_string())
    })
}

/// First header row containing "estado" and a colon; the trimmed text after
/// the first colon is the estado. An empty remainder keeps scanning.
pub fn buscar_estado(cabecera: &[Vec<String>]) -> Option<String> {
    cabecera.iter().map(|f| aplanar(f)).find_map(|texto| {
        if !texto.to_lowercase().contains("estado") {
            return None;
        }
        let (_, resto) = texto.split_once(':')?;
        let estado = resto.trim();
        if estado.is_empty() {
            None
        } else {
            Some(estado.to_string())
        }
    })
}

/// First header row containing "fecha" and a `D/M/YYYY` pattern. A match
/// that fails to parse as a calendar date keeps scanning and may end up as
/// no date at all; that is not an error.
pub fn buscar_fecha_reporte(cabecera: &[Vec<String>]) -> Option<NaiveDate> {
    cabecera.iter().map(|f| aplanar(f)).find_map(|texto| {
        if !texto.to_lowercase().contains("fecha") {
            return None;
        }
        let m = RE_FECHA.find(&texto)?;
        NaiveDate::parse_from_str(m.as_str(), "%d/%m/%Y").ok()
    })
}

/// All `D/M/YYYY` matches across the header block, in row order. Used by the
/// master monthly file to pick up (fecha_inicio, fecha_fin).
pub fn buscar_fechas(cabecera: &[Vec<String>]) -> Vec<NaiveDate> {
    cabecera
        .iter()
        .map(|f| aplanar(f))
        .flat_map(|texto| {
            RE_FECHA
                .find_iter(&texto)
                .filter_map(|m| NaiveDate::parse_from_str(m.as_str(), "%d/%m/%Y").ok())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn normalizar_titulo(titulo: &str) -> String {
    let compacto = titulo.to_lowercase().replace(' ', "").replace("de", "");
    compacto
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            'ñ' => 'n',
            otro => otro,
        })
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Fuzzy-maps a raw column title to a canonical field key, or `None` when
/// the column carries nothing we persist.
pub fn mapear_columna(titulo: &str) -> Option<&'static str> {
    let n = normalizar_titulo(titulo);
    if n.contains("tipodocumento") {
        Some("tipo_documento")
    } else if n.contains("numerodocumento") || n.contains("documento") {
        Some("documento")
    } else if n == "nombre" {
        Some("nombre")
    } else if n.contains("apellido") {
        Some("apellido")
    } else if n.contains("celular") {
        Some("celular")
    } else if n.contains("correo") || n.contains("email") {
        Some("correo")
    } else if n.contains("estado") {
        Some("estado")
    } else {
        None
    }
}

/// Column index → canonical key pairs for one extraction, in column order.
pub fn indices_canonicos(columnas: &[String]) -> Vec<(usize, &'static str)> {
    columnas
        .iter()
        .enumerate()
        .filter_map(|(i, c)| mapear_columna(c).map(|k| (i, k)))
        .collect()
}
