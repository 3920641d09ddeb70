use crate::domain::model::{CardValue, Magnetogram, MapMeta};
use crate::utils::error::{EtlError, Result};
use fitrs::{Fits, FitsData, Hdu, HeaderValue};
use std::path::Path;

/// Descriptive keywords carried from the export into the resampled file.
const RETAINED_KEYS: &[&str] = &[
    "T_REC", "T_OBS", "DATE-OBS", "HARPNUM", "NOAA_AR", "NOAA_ARS", "TELESCOP", "INSTRUME",
    "CONTENT", "BUNIT", "WCSNAME", "CTYPE1", "CTYPE2", "CUNIT1", "CUNIT2", "RSUN_OBS",
    "DSUN_OBS", "CRLN_OBS", "CRLT_OBS",
];

fn fits_error(path: &Path, reason: impl std::fmt::Display) -> EtlError {
    EtlError::FitsError {
        message: format!("{}: {}", path.display(), reason),
    }
}

fn real_value(hdu: &Hdu, key: &str) -> Option<f64> {
    match hdu.value(key) {
        Some(HeaderValue::RealFloatingNumber(v)) => Some(*v),
        Some(HeaderValue::IntegerNumber(v)) => Some(*v as f64),
        _ => None,
    }
}

fn int_value(hdu: &Hdu, key: &str) -> Option<i64> {
    match hdu.value(key) {
        Some(HeaderValue::IntegerNumber(v)) => Some(*v as i64),
        _ => None,
    }
}

fn card_value(hdu: &Hdu, key: &str) -> Option<CardValue> {
    match hdu.value(key) {
        Some(HeaderValue::CharacterString(s)) => Some(CardValue::Text(s.trim().to_string())),
        Some(HeaderValue::IntegerNumber(v)) => Some(CardValue::Integer(*v as i32)),
        Some(HeaderValue::RealFloatingNumber(v)) => Some(CardValue::Real(*v)),
        Some(HeaderValue::Logical(v)) => Some(CardValue::Logical(*v)),
        _ => None,
    }
}

fn read_meta(hdu: &Hdu) -> MapMeta {
    let defaults = MapMeta::default();
    MapMeta {
        crpix1: real_value(hdu, "CRPIX1").unwrap_or(defaults.crpix1),
        crpix2: real_value(hdu, "CRPIX2").unwrap_or(defaults.crpix2),
        cdelt1: real_value(hdu, "CDELT1").unwrap_or(defaults.cdelt1),
        cdelt2: real_value(hdu, "CDELT2").unwrap_or(defaults.cdelt2),
        crval1: real_value(hdu, "CRVAL1").unwrap_or(defaults.crval1),
        crval2: real_value(hdu, "CRVAL2").unwrap_or(defaults.crval2),
        crota2: real_value(hdu, "CROTA2").unwrap_or(defaults.crota2),
        cards: RETAINED_KEYS
            .iter()
            .filter_map(|key| card_value(hdu, key).map(|v| (key.to_string(), v)))
            .collect(),
    }
}

const RECORD_LEN: usize = 2880;
const CARD_LEN: usize = 80;
/// Columns a fixed-format numeric value may occupy on a card.
const VALUE_WIDTH: usize = 20;

/// Offset just past the header record that holds the END card.
fn data_offset(bytes: &[u8], header_start: usize) -> Option<usize> {
    let mut pos = header_start;
    while pos + RECORD_LEN <= bytes.len() {
        let record = &bytes[pos..pos + RECORD_LEN];
        pos += RECORD_LEN;
        if record.chunks(CARD_LEN).any(|card| card.starts_with(b"END     ")) {
            return Some(pos);
        }
    }
    None
}

/// Bytes of pixel data the header announces.
fn data_len(hdu: &Hdu) -> Option<usize> {
    let bitpix = int_value(hdu, "BITPIX")?;
    let naxis = int_value(hdu, "NAXIS")?;
    if naxis == 0 {
        return Some(0);
    }
    let mut count = 1usize;
    for axis in 1..=naxis {
        let len = usize::try_from(int_value(hdu, &format!("NAXIS{}", axis))?).ok()?;
        count = count.checked_mul(len)?;
    }
    count.checked_mul(bitpix.unsigned_abs() as usize / 8)
}

/// Reads the first 2-D image HDU. Integer pixels are scaled by BSCALE and
/// BZERO; blank pixels become NaN.
///
/// The layout is checked against the file length before any pixel is read,
/// so a truncated download is an error rather than a panic.
pub fn read_magnetogram(path: &Path) -> Result<Magnetogram> {
    let bytes = std::fs::read(path).map_err(|e| fits_error(path, e))?;
    if !bytes.starts_with(b"SIMPLE  =") {
        return Err(fits_error(path, "not a FITS file"));
    }
    let fits = Fits::open(path).map_err(|e| fits_error(path, e))?;

    let mut index = 0;
    let mut header_start = 0;
    let (hdu, data_start, byte_len) = loop {
        let Some(hdu) = fits.get(index) else {
            return Err(fits_error(path, "no 2-D image HDU"));
        };
        let data_start = data_offset(&bytes, header_start)
            .ok_or_else(|| fits_error(path, format!("HDU {} has no END card", index)))?;
        let byte_len = data_len(&hdu)
            .ok_or_else(|| fits_error(path, format!("HDU {} has no usable BITPIX/NAXIS", index)))?;
        if int_value(&hdu, "NAXIS") == Some(2) {
            break (hdu, data_start, byte_len);
        }
        header_start = (data_start + byte_len).div_ceil(RECORD_LEN) * RECORD_LEN;
        index += 1;
    };

    match int_value(&hdu, "BITPIX") {
        Some(16 | 32 | -32 | -64) => {}
        other => {
            return Err(fits_error(path, format!("unsupported BITPIX {:?}", other)));
        }
    }
    if bytes.len() < data_start + byte_len {
        return Err(fits_error(
            path,
            format!(
                "truncated: {} data bytes expected at offset {}, file has {}",
                byte_len,
                data_start,
                bytes.len()
            ),
        ));
    }

    let bscale = real_value(&hdu, "BSCALE").unwrap_or(1.0);
    let bzero = real_value(&hdu, "BZERO").unwrap_or(0.0);

    let (shape, data): (Vec<usize>, Vec<f64>) = match hdu.read_data() {
        FitsData::FloatingPoint32(array) => (
            array.shape.clone(),
            array.data.iter().map(|v| *v as f64 * bscale + bzero).collect(),
        ),
        FitsData::FloatingPoint64(array) => (
            array.shape.clone(),
            array.data.iter().map(|v| *v * bscale + bzero).collect(),
        ),
        FitsData::IntegersI32(array) => (
            array.shape.clone(),
            array
                .data
                .iter()
                .map(|v| match v {
                    Some(n) => *n as f64 * bscale + bzero,
                    None => f64::NAN,
                })
                .collect(),
        ),
        _ => return Err(fits_error(path, "unsupported pixel type")),
    };

    let (width, height) = match shape.as_slice() {
        [w, h] => (*w, *h),
        _ => return Err(fits_error(path, format!("expected 2 axes, got {:?}", shape))),
    };
    if data.len() != width * height {
        return Err(fits_error(
            path,
            format!("{} pixels for a {}x{} image", data.len(), width, height),
        ));
    }

    tracing::debug!("Read {}x{} map from {}", width, height, path.display());
    Ok(Magnetogram::new(width, height, data, read_meta(&hdu)))
}

/// Exponent form fitrs renders for a non-zero finite real card.
fn exponent_form(value: f64) -> String {
    let mut exp = 0i32;
    let mut f = value;
    if f.abs() >= 10.0 {
        while f.abs() >= 10.0 {
            f /= 10.0;
            exp += 1;
        }
    } else {
        while f.abs() < 1.0 {
            f *= 10.0;
            exp -= 1;
        }
    }
    if exp >= 0 {
        format!("{}E+{:02}", f, exp)
    } else {
        format!("{}E-{:02}", f, -exp)
    }
}

/// Header value for a real that the card writer can render.
/// Integral values become integer cards, so zero never reaches the
/// exponent formatter. Others are rounded to the longest nearby decimal
/// whose exponent form fits the value columns. Non-finite values have no
/// card form.
fn header_real(value: f64) -> Option<HeaderValue> {
    if !value.is_finite() {
        return None;
    }
    if value.fract() == 0.0 && value.abs() <= i32::MAX as f64 {
        return Some(HeaderValue::IntegerNumber(value as i32));
    }

    let magnitude = value.abs().log10().floor() as i32;
    for digits in (6..=15).rev() {
        let step = 10f64.powi(magnitude - digits as i32 + 1);
        let rounded: f64 = format!("{:.*e}", digits - 1, value).parse().ok()?;
        // The formatter's repeated scaling can miss a decimal; a neighbour may land.
        for nudge in [0.0, 1.0, -1.0, 2.0, -2.0] {
            let candidate: f64 = format!("{:.*e}", digits - 1, rounded + nudge * step)
                .parse()
                .ok()?;
            if candidate != 0.0 && exponent_form(candidate).len() <= VALUE_WIDTH {
                return Some(HeaderValue::RealFloatingNumber(candidate));
            }
        }
    }
    None
}

/// Writes the map as a primary HDU of 64-bit floats.
pub fn write_magnetogram(path: &Path, map: &Magnetogram) -> Result<()> {
    let mut hdu = Hdu::new(&[map.width, map.height], map.data.clone());

    let wcs = [
        ("CRPIX1", map.meta.crpix1),
        ("CRPIX2", map.meta.crpix2),
        ("CDELT1", map.meta.cdelt1),
        ("CDELT2", map.meta.cdelt2),
        ("CRVAL1", map.meta.crval1),
        ("CRVAL2", map.meta.crval2),
        ("CROTA2", map.meta.crota2),
    ];
    for (key, value) in wcs {
        let card = header_real(value)
            .ok_or_else(|| fits_error(path, format!("{} = {} cannot be written", key, value)))?;
        hdu.insert(key, card);
    }

    for (key, value) in &map.meta.cards {
        let value = match value {
            CardValue::Text(s) => HeaderValue::CharacterString(s.clone()),
            CardValue::Integer(n) => HeaderValue::IntegerNumber(*n),
            CardValue::Real(v) => match header_real(*v) {
                Some(card) => card,
                None => {
                    tracing::warn!("Dropping {} = {} from {}", key, v, path.display());
                    continue;
                }
            },
            CardValue::Logical(b) => HeaderValue::Logical(*b),
        };
        hdu.insert(key.as_str(), value);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Fits::create(path, hdu)
        .map(|_| ())
        .map_err(|e| fits_error(path, e))
}
