//! Fills the F-165 format workbook from a ficha, its roster and the decoded
//! signature assets.
//!
//! The template on disk is never mutated: every invocation loads a fresh
//! working copy, picks the sheet for the requested modality, writes the
//! header cells, and populates the roster block. In group mode the template
//! pre-allocates [`ESPACIOS_DISPONIBLES`] rows; larger rosters get extra
//! rows inserted immediately after the last slot — all structural insertion
//! happens before any cell is addressed, so row indices written afterwards
//! are final. Row height and the signature anchor are set in the same pass
//! as the data cells.
//!
//! A failed signature embed only loses that one image; the document is still
//! produced.

use chrono::Local;
use common::model::aprendiz::AprendizExportar;
use common::model::archivo::Modalidad;
use common::model::ficha::Ficha;
use log::warn;
use std::io::Cursor;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;
use umya_spreadsheet::structs::drawing::spreadsheet::MarkerType;
use umya_spreadsheet::structs::Image as ImagenHoja;
use umya_spreadsheet::Worksheet;

pub const HOJA_GRUPAL: &str = "Selección formato 1 - Grupal";
pub const HOJA_INDIVIDUAL: &str = "Selección Modificación F2 Indiv";

/// Group-mode roster block: first data row and pre-allocated slot count.
pub const FILA_INICIAL: u32 = 18;
pub const ESPACIOS_DISPONIBLES: u32 = 20;
/// Fixed row for the single individual-mode block.
pub const FILA_INDIVIDUAL: u32 = 14;

const ALTO_FILA: f64 = 26.0;
const COLUMNA_FIRMA: &str = "AG";

// Header cells shared by both sheets.
const CELDA_PROGRAMA: &str = "D8";
const CELDA_FICHA: &str = "D9";
const CELDA_FECHA_INICIO: &str = "D10";
const CELDA_FECHA_FIN: &str = "G10";
const CELDA_FECHA_GENERACION: &str = "J6";
const CELDA_RESPONSABLE: &str = "D12";
const CELDA_CORREO_RESPONSABLE: &str = "H12";

/// Identity of the user generating the document, stamped in the header.
#[derive(Debug, Clone, Default)]
pub struct Responsable {
    pub nombre: String,
    pub correo: String,
}

#[derive(Debug, Error)]
pub enum FormatoError {
    #[error("Modalidad no válida: {0}")]
    ModalidadInvalida(String),
    #[error("Lista de aprendices vacía")]
    SinAprendices,
    #[error("No se pudo cargar la plantilla: {0}")]
    Plantilla(String),
    #[error("No se pudo serializar el formato: {0}")]
    Serializacion(String),
    #[error("Error de datos: {0}")]
    Datos(String),
    #[error("Error al archivar el formato: {0}")]
    Guardado(String),
}

/// Fills a working copy of the template and returns the serialized document
/// bytes plus its canonical output filename.
pub fn llenar_formato(
    plantilla: &Path,
    ficha: &Ficha,
    aprendices: &[AprendizExportar],
    firmas: &[Option<NamedTempFile>],
    modalidad: Modalidad,
    responsable: &Responsable,
) -> Result<(Vec<u8>, String), FormatoError> {
    if aprendices.is_empty() {
        return Err(FormatoError::SinAprendices);
    }

    let mut libro = umya_spreadsheet::reader::xlsx::read(plantilla)
        .map_err(|e| FormatoError::Plantilla(e.to_string()))?;
    let nombre_hoja = match modalidad {
        Modalidad::Grupal => HOJA_GRUPAL,
        Modalidad::Individual => HOJA_INDIVIDUAL,
    };

    // Structural insertion first: once rows exist, every address below is
    // computed from a single authoritative row index.
    if modalidad == Modalidad::Grupal {
        let extra = (aprendices.len() as u32).saturating_sub(ESPACIOS_DISPONIBLES);
        if extra > 0 {
            libro.insert_new_row(nombre_hoja, &(FILA_INICIAL + ESPACIOS_DISPONIBLES), &extra);
        }
    }

    let hoja = libro
        .get_sheet_by_name_mut(nombre_hoja)
        .ok_or_else(|| {
            FormatoError::Plantilla(format!("la plantilla no contiene la hoja '{}'", nombre_hoja))
        })?;

    escribir_encabezado(hoja, ficha, responsable);
    match modalidad {
        Modalidad::Grupal => llenar_grupal(hoja, aprendices, firmas),
        // Individual mode addresses exactly one student: the first entry.
        Modalidad::Individual => llenar_fila(hoja, FILA_INDIVIDUAL, &aprendices[0], firmas.first().and_then(|f| f.as_ref())),
    }

    let mut buffer = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&libro, &mut buffer)
        .map_err(|e| FormatoError::Serializacion(e.to_string()))?;

    let nombre = format!(
        "formato_F165_{}_{}.xlsx",
        modalidad.as_str(),
        Local::now().format("%Y%m%d%H%M%S")
    );
    Ok((buffer.into_inner(), nombre))
}

fn escribir_encabezado(hoja: &mut Worksheet, ficha: &Ficha, responsable: &Responsable) {
    hoja.get_cell_mut(CELDA_PROGRAMA).set_value(&ficha.programa);
    hoja.get_cell_mut(CELDA_FICHA).set_value(&ficha.numero_ficha);
    if let Some(inicio) = ficha.fecha_inicio {
        hoja.get_cell_mut(CELDA_FECHA_INICIO)
            .set_value(inicio.format("%d/%m/%Y").to_string());
    }
    if let Some(fin) = ficha.fecha_fin {
        hoja.get_cell_mut(CELDA_FECHA_FIN)
            .set_value(fin.format("%d/%m/%Y").to_string());
    }
    hoja.get_cell_mut(CELDA_FECHA_GENERACION)
        .set_value(Local::now().format("%d/%m/%Y").to_string());
    hoja.get_cell_mut(CELDA_RESPONSABLE)
        .set_value(&responsable.nombre);
    hoja.get_cell_mut(CELDA_CORREO_RESPONSABLE)
        .set_value(&responsable.correo);
}

fn llenar_grupal(
    hoja: &mut Worksheet,
    aprendices: &[AprendizExportar],
    firmas: &[Option<NamedTempFile>],
) {
    for (i, aprendiz) in aprendices.iter().enumerate() {
        let fila = FILA_INICIAL + i as u32;
        llenar_fila(hoja, fila, aprendiz, firmas.get(i).and_then(|f| f.as_ref()));
    }
}

/// Writes the data cells, row height, disability markers and signature for
/// one roster row — a single pass per row.
fn llenar_fila(
    hoja: &mut Worksheet,
    fila: u32,
    aprendiz: &AprendizExportar,
    firma: Option<&NamedTempFile>,
) {
    hoja.get_cell_mut(format!("C{}", fila).as_str())
        .set_value(&aprendiz.tipo_documento);
    hoja.get_cell_mut(format!("D{}", fila).as_str())
        .set_value(&aprendiz.documento);
    hoja.get_cell_mut(format!("E{}", fila).as_str())
        .set_value(&aprendiz.nombre);
    hoja.get_cell_mut(format!("F{}", fila).as_str())
        .set_value(&aprendiz.apellidos);
    hoja.get_cell_mut(format!("G{}", fila).as_str())
        .set_value(&aprendiz.direccion);
    hoja.get_cell_mut(format!("H{}", fila).as_str())
        .set_value(&aprendiz.correo);
    hoja.get_cell_mut(format!("I{}", fila).as_str())
        .set_value(&aprendiz.celular);

    // The form carries two mutually exclusive marker boxes: J for "yes",
    // K for "no".
    if aprendiz.discapacidad == "No" {
        hoja.get_cell_mut(format!("K{}", fila).as_str()).set_value("x");
    } else {
        hoja.get_cell_mut(format!("J{}", fila).as_str()).set_value("x");
    }
    hoja.get_cell_mut(format!("L{}", fila).as_str())
        .set_value(&aprendiz.tipo_discapacidad);
    hoja.get_cell_mut(format!("M{}", fila).as_str()).set_value("x");

    hoja.get_row_dimension_mut(&fila).set_height(ALTO_FILA);

    if let Some(firma) = firma {
        if let Err(e) = anclar_firma(hoja, fila, firma) {
            // Losing one signature never loses the document.
            warn!("no se pudo incrustar la firma en la fila {}: {}", fila, e);
        }
    }
}

fn anclar_firma(hoja: &mut Worksheet, fila: u32, firma: &NamedTempFile) -> Result<(), String> {
    let ruta = firma
        .path()
        .to_str()
        .ok_or_else(|| "ruta temporal no válida".to_string())?;

    let mut marcador = MarkerType::default();
    marcador.set_coordinate(format!("{}{}", COLUMNA_FIRMA, fila));

    let mut imagen = ImagenHoja::default();
    imagen.new_image(ruta, marcador);
    hoja.add_image(imagen);
    Ok(())
}

/// Writes a minimal, structurally correct F-165 workbook: both modality
/// sheets, labeled header cells and the pre-allocated group slots. Used at
/// startup when no template is deployed, and by tests.
pub fn crear_plantilla_base(ruta: &Path) -> Result<(), String> {
    let mut libro = umya_spreadsheet::new_file();

    let hoja = libro.get_sheet_mut(&0).ok_or("libro sin hojas")?;
    hoja.set_name(HOJA_GRUPAL);
    escribir_esqueleto(hoja);

    let hoja_individual = libro
        .new_sheet(HOJA_INDIVIDUAL)
        .map_err(|e| e.to_string())?;
    escribir_esqueleto(hoja_individual);

    if let Some(padre) = ruta.parent() {
        std::fs::create_dir_all(padre).map_err(|e| e.to_string())?;
    }
    umya_spreadsheet::writer::xlsx::write(&libro, ruta).map_err(|e| e.to_string())
}

fn escribir_esqueleto(hoja: &mut Worksheet) {
    hoja.get_cell_mut("C6").set_value(
        "GFPI-F-165 Formato Selección Modificación Alternativa para desarrollar la Etapa Productiva",
    );
    hoja.get_cell_mut("C8").set_value("Programa:");
    hoja.get_cell_mut("C9").set_value("Ficha:");
    hoja.get_cell_mut("C10").set_value("Fecha inicio:");
    hoja.get_cell_mut("F10").set_value("Fecha fin:");
    hoja.get_cell_mut("C12").set_value("Responsable:");
    hoja.get_cell_mut("G12").set_value("Correo:");

    let titulos = [
        ("C", "Tipo Doc."),
        ("D", "Documento"),
        ("E", "Nombres"),
        ("F", "Apellidos"),
        ("G", "Dirección"),
        ("H", "Correo"),
        ("I", "Celular"),
        ("J", "Disc. Sí"),
        ("K", "Disc. No"),
        ("L", "Tipo Disc."),
        ("M", "Alternativa"),
        ("AG", "Firma"),
    ];
    for (columna, titulo) in titulos {
        hoja.get_cell_mut(format!("{}17", columna).as_str())
            .set_value(titulo);
    }
    // Pre-allocated roster slots.
    for fila in FILA_INICIAL..FILA_INICIAL + ESPACIOS_DISPONIBLES {
        hoja.get_cell_mut(format!("B{}", fila).as_str())
            .set_value((fila - FILA_INICIAL + 1).to_string());
    }
    // A trailing block that must shift down when rows are inserted.
    hoja.get_cell_mut(format!("C{}", FILA_INICIAL + ESPACIOS_DISPONIBLES).as_str())
        .set_value("Observaciones:");
}

#[cfg(test)]
mod pruebas {
    use super::*;
    use std::io::Cursor;

    fn plantilla_temporal() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let ruta = dir.path().join("GFPI-F-165.xlsx");
        crear_plantilla_base(&ruta).expect("plantilla base");
        (dir, ruta)
    }

    fn ficha_de_prueba() -> Ficha {
        Ficha {
            numero_ficha: "3147272".to_string(),
            programa: "CURSO INTRODUCTORIO".to_string(),
            estado: "EN EJECUCION".to_string(),
            fecha_inicio: chrono::NaiveDate::from_ymd_opt(2024, 4, 1),
            fecha_fin: chrono::NaiveDate::from_ymd_opt(2024, 12, 20),
            fecha_reporte: None,
            fecha_inicio_productiva: None,
            jornada: None,
            modalidad_formacion: None,
        }
    }

    fn aprendiz(n: usize) -> AprendizExportar {
        AprendizExportar {
            tipo_documento: "CC".to_string(),
            documento: format!("10{:08}", n),
            nombre: format!("NOMBRE{}", n),
            apellidos: format!("APELLIDO{}", n),
            direccion: "Calle 1".to_string(),
            correo: format!("a{}@example.com", n),
            celular: "3000000000".to_string(),
            discapacidad: "No".to_string(),
            tipo_discapacidad: String::new(),
            firma: None,
        }
    }

    fn responsable() -> Responsable {
        Responsable {
            nombre: "INSTRUCTOR PRUEBA".to_string(),
            correo: "instructor@example.com".to_string(),
        }
    }

    fn leer_libro(bytes: &[u8]) -> umya_spreadsheet::Spreadsheet {
        umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(bytes.to_vec()), true)
            .expect("releer formato")
    }

    #[test]
    fn grupal_expande_filas_para_25_aprendices() {
        let (_dir, plantilla) = plantilla_temporal();
        let aprendices: Vec<_> = (0..25).map(aprendiz).collect();
        let firmas: Vec<Option<NamedTempFile>> = (0..25).map(|_| None).collect();

        let (bytes, nombre) = llenar_formato(
            &plantilla,
            &ficha_de_prueba(),
            &aprendices,
            &firmas,
            Modalidad::Grupal,
            &responsable(),
        )
        .expect("llenar");
        assert!(nombre.starts_with("formato_F165_grupal_"));
        assert!(nombre.ends_with(".xlsx"));

        let libro = leer_libro(&bytes);
        let hoja = libro.get_sheet_by_name(HOJA_GRUPAL).expect("hoja grupal");

        // Every student lands at a strictly increasing row in input order.
        for (i, ap) in aprendices.iter().enumerate() {
            let fila = FILA_INICIAL + i as u32;
            assert_eq!(hoja.get_value(format!("D{}", fila).as_str()), ap.documento);
            assert_eq!(hoja.get_value(format!("E{}", fila).as_str()), ap.nombre);
        }
        // 5 inserted rows shifted the trailing block from row 38 to row 43;
        // row 38 now belongs to student #21, and nothing follows the block.
        assert_eq!(hoja.get_value("C38"), aprendices[20].tipo_documento);
        assert_eq!(hoja.get_value("C43"), "Observaciones:");
        assert_eq!(hoja.get_value("C44"), "");
    }

    #[test]
    fn grupal_sin_desborde_no_inserta_filas() {
        let (_dir, plantilla) = plantilla_temporal();
        let aprendices: Vec<_> = (0..3).map(aprendiz).collect();
        let firmas: Vec<Option<NamedTempFile>> = (0..3).map(|_| None).collect();

        let (bytes, _) = llenar_formato(
            &plantilla,
            &ficha_de_prueba(),
            &aprendices,
            &firmas,
            Modalidad::Grupal,
            &responsable(),
        )
        .expect("llenar");

        let libro = leer_libro(&bytes);
        let hoja = libro.get_sheet_by_name(HOJA_GRUPAL).expect("hoja grupal");
        assert_eq!(hoja.get_value("C38"), "Observaciones:");
    }

    #[test]
    fn encabezado_y_marcadores_de_discapacidad() {
        let (_dir, plantilla) = plantilla_temporal();
        let mut con_discapacidad = aprendiz(1);
        con_discapacidad.discapacidad = "Sí".to_string();
        con_discapacidad.tipo_discapacidad = "Visual".to_string();
        let aprendices = vec![con_discapacidad, aprendiz(2)];
        let firmas: Vec<Option<NamedTempFile>> = vec![None, None];

        let (bytes, _) = llenar_formato(
            &plantilla,
            &ficha_de_prueba(),
            &aprendices,
            &firmas,
            Modalidad::Grupal,
            &responsable(),
        )
        .expect("llenar");

        let libro = leer_libro(&bytes);
        let hoja = libro.get_sheet_by_name(HOJA_GRUPAL).expect("hoja grupal");
        assert_eq!(hoja.get_value(CELDA_FICHA), "3147272");
        assert_eq!(hoja.get_value(CELDA_FECHA_INICIO), "01/04/2024");
        assert_eq!(hoja.get_value(CELDA_RESPONSABLE), "INSTRUCTOR PRUEBA");

        assert_eq!(hoja.get_value("J18"), "x");
        assert_eq!(hoja.get_value("K18"), "");
        assert_eq!(hoja.get_value("L18"), "Visual");
        assert_eq!(hoja.get_value("K19"), "x");
        assert_eq!(hoja.get_value("J19"), "");
    }

    #[test]
    fn individual_usa_solo_el_primer_aprendiz() {
        let (_dir, plantilla) = plantilla_temporal();
        let aprendices = vec![aprendiz(1), aprendiz(2)];
        let firmas: Vec<Option<NamedTempFile>> = vec![None, None];

        let (bytes, nombre) = llenar_formato(
            &plantilla,
            &ficha_de_prueba(),
            &aprendices,
            &firmas,
            Modalidad::Individual,
            &responsable(),
        )
        .expect("llenar");
        assert!(nombre.starts_with("formato_F165_individual_"));

        let libro = leer_libro(&bytes);
        let hoja = libro
            .get_sheet_by_name(HOJA_INDIVIDUAL)
            .expect("hoja individual");
        assert_eq!(
            hoja.get_value(format!("D{}", FILA_INDIVIDUAL).as_str()),
            aprendices[0].documento
        );
        // The second student is not rendered anywhere.
        assert_eq!(
            hoja.get_value(format!("D{}", FILA_INDIVIDUAL + 1).as_str()),
            ""
        );
    }

    #[test]
    fn lista_vacia_no_produce_documento() {
        let (_dir, plantilla) = plantilla_temporal();
        let resultado = llenar_formato(
            &plantilla,
            &ficha_de_prueba(),
            &[],
            &[],
            Modalidad::Individual,
            &responsable(),
        );
        assert!(matches!(resultado, Err(FormatoError::SinAprendices)));
    }

    #[test]
    fn incrusta_firmas_decodificadas() {
        use crate::services::formatos::firmas;

        let (_dir, plantilla) = plantilla_temporal();
        let aprendices = vec![aprendiz(1), aprendiz(2)];
        let payloads = vec![
            Some(firmas::pruebas::firma_valida()),
            Some("data:image/png;base64,###".to_string()),
        ];
        let activos = firmas::procesar_firmas(&payloads);

        let (bytes, _) = llenar_formato(
            &plantilla,
            &ficha_de_prueba(),
            &aprendices,
            &activos,
            Modalidad::Grupal,
            &responsable(),
        )
        .expect("llenar");

        let libro = leer_libro(&bytes);
        let hoja = libro.get_sheet_by_name(HOJA_GRUPAL).expect("hoja grupal");
        // Row 18 got its image; row 19's payload failed to decode, so only
        // one image is embedded and the document still came out.
        assert_eq!(hoja.get_image_collection().len(), 1);
    }
}
