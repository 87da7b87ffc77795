//! Signature decoding: encoded payloads → temporary PNG assets.
//!
//! A signature travels as `"<metadata>,<base64>"` (a data URI) or as raw
//! base64. Decoding strips everything up to and including the first comma,
//! base64-decodes the rest, re-renders the bitmap at the size the format
//! prints it, and writes it to a `NamedTempFile` that lives exactly as long
//! as the caller holds it — the temp file is removed on drop, on success and
//! failure paths alike.
//!
//! Batches run on a dedicated 4-worker pool; `par_iter` keeps the result
//! order equal to the input order, so entry *i* of the output always belongs
//! to student *i*. Any per-entry failure is logged and yields `None`, never
//! an abort.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::imageops::FilterType;
use log::warn;
use rayon::prelude::*;
use tempfile::NamedTempFile;

/// Fixed worker count for signature decoding.
const TRABAJADORES: usize = 4;

/// Pixel size at which signatures are embedded in the format.
const ANCHO_FIRMA: u32 = 80;
const ALTO_FIRMA: u32 = 30;

/// Strips an optional data-URI prefix and base64-decodes the payload.
pub fn decodificar_firma(firma: &str) -> Option<Vec<u8>> {
    let datos = match firma.split_once(',') {
        Some((_, resto)) => resto,
        None => firma,
    };
    BASE64.decode(datos.trim()).ok()
}

/// Decodes one batch of signature payloads into temp PNG assets,
/// index-aligned with the input.
pub fn procesar_firmas(firmas: &[Option<String>]) -> Vec<Option<NamedTempFile>> {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(TRABAJADORES)
        .build()
    {
        Ok(pool) => pool.install(|| firmas.par_iter().map(procesar_una).collect()),
        Err(e) => {
            warn!("sin pool de firmas ({}), decodificando en serie", e);
            firmas.iter().map(procesar_una).collect()
        }
    }
}

fn procesar_una(firma: &Option<String>) -> Option<NamedTempFile> {
    let firma = firma.as_deref()?;

    let bytes = match decodificar_firma(firma) {
        Some(bytes) => bytes,
        None => {
            warn!("firma con base64 inválido, se omite");
            return None;
        }
    };

    let imagen = match image::load_from_memory(&bytes) {
        Ok(imagen) => imagen,
        Err(e) => {
            warn!("firma no es una imagen válida ({}), se omite", e);
            return None;
        }
    };

    let reducida = imagen.resize_exact(ANCHO_FIRMA, ALTO_FIRMA, FilterType::Lanczos3);

    // Flatten alpha over white: the format prints on a white sheet.
    let rgba = reducida.to_rgba8();
    let (ancho, alto) = rgba.dimensions();
    let mut fondo = image::RgbaImage::from_pixel(ancho, alto, image::Rgba([255, 255, 255, 255]));
    image::imageops::overlay(&mut fondo, &rgba, 0, 0);
    let plana = image::DynamicImage::ImageRgba8(fondo).to_rgb8();

    let tmp = match tempfile::Builder::new().suffix(".png").tempfile() {
        Ok(tmp) => tmp,
        Err(e) => {
            warn!("no se pudo crear archivo temporal de firma: {}", e);
            return None;
        }
    };
    if let Err(e) = plana.save_with_format(tmp.path(), image::ImageFormat::Png) {
        warn!("no se pudo escribir la firma temporal: {}", e);
        return None;
    }
    Some(tmp)
}

#[cfg(test)]
pub(crate) mod pruebas {
    use super::*;
    use std::io::Cursor;

    /// A tiny valid PNG, base64-encoded.
    pub fn firma_valida() -> String {
        let imagen = image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 0]));
        let mut bytes = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(imagen)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .expect("png de prueba");
        format!(
            "data:image/png;base64,{}",
            BASE64.encode(bytes.into_inner())
        )
    }

    #[test]
    fn decodifica_data_uri_y_base64_crudo() {
        let con_prefijo = firma_valida();
        let decodificado = decodificar_firma(&con_prefijo).expect("decodificar");
        assert!(!decodificado.is_empty());

        let crudo = con_prefijo.split_once(',').expect("coma").1;
        assert_eq!(decodificar_firma(crudo), Some(decodificado));
    }

    #[test]
    fn base64_invalido_es_none_sin_panico() {
        assert_eq!(decodificar_firma("data:image/png;base64,###"), None);
    }

    #[test]
    fn resultados_alineados_por_indice() {
        let firmas = vec![
            Some(firma_valida()),
            None,
            Some("data:image/png;base64,###".to_string()),
            Some(firma_valida()),
        ];
        let procesadas = procesar_firmas(&firmas);

        assert_eq!(procesadas.len(), 4);
        assert!(procesadas[0].is_some());
        assert!(procesadas[1].is_none());
        assert!(procesadas[2].is_none());
        assert!(procesadas[3].is_some());
    }

    #[test]
    fn activos_temporales_se_limpian_al_soltar() {
        let procesadas = procesar_firmas(&[Some(firma_valida())]);
        let ruta = procesadas[0].as_ref().expect("firma").path().to_path_buf();
        assert!(ruta.exists());
        drop(procesadas);
        assert!(!ruta.exists());
    }

    #[test]
    fn payload_base64_valido_pero_no_imagen_es_none() {
        let payload = format!("data:image/png;base64,{}", BASE64.encode(b"no soy un png"));
        let procesadas = procesar_firmas(&[Some(payload)]);
        assert!(procesadas[0].is_none());
    }
}
