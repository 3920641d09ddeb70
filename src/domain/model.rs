use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use url::Url;

pub const NOAA_COLUMN: &str = "NOAA Active region number";
pub const HARP_COLUMN: &str = "HARP number";
pub const CME_TIME_COLUMN: &str = "CME date and time";

/// One line of the HARP lookup file: a HARP and the NOAA regions it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarpLink {
    pub harp_number: String,
    /// The raw second column, e.g. `11374` or `11283,11284`.
    pub noaa_field: String,
}

impl HarpLink {
    pub fn covers(&self, noaa: &str) -> bool {
        self.noaa_field == noaa || self.noaa_field.split(',').any(|n| n.trim() == noaa)
    }
}

/// A string-typed table; cells are never coerced and empty cells stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Observation time at minute resolution, as JSOC SHARP records are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObservationTime(pub NaiveDateTime);

impl ObservationTime {
    /// `2011.12.14_20:58:00_TAI`
    pub fn query_stamp(&self) -> String {
        self.0.format("%Y.%m.%d_%H:%M:00_TAI").to_string()
    }

    /// `20111214_205800_TAI`
    pub fn file_stamp(&self) -> String {
        self.0.format("%Y%m%d_%H%M%S_TAI").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharpTarget {
    pub noaa: String,
    pub harp: String,
    pub observed_at: ObservationTime,
}

impl SharpTarget {
    pub fn output_fits_name(&self) -> String {
        format!("smap_{}{}.fits", self.noaa, self.observed_at.file_stamp())
    }

    pub fn preview_png_name(&self) -> String {
        format!("AR{}_{}.png", self.noaa, self.observed_at.file_stamp())
    }

    pub fn raw_fits_name(&self, series: &str, segment: &str) -> String {
        format!(
            "{}.{}.{}.{}.fits",
            series,
            self.harp,
            self.observed_at.file_stamp(),
            segment
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLink {
    pub url: Url,
    pub file_name: String,
}

/// World-coordinate keywords that resampling has to keep consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct MapMeta {
    /// 1-based reference pixel, FITS convention.
    pub crpix1: f64,
    pub crpix2: f64,
    pub cdelt1: f64,
    pub cdelt2: f64,
    pub crval1: f64,
    pub crval2: f64,
    pub crota2: f64,
    /// Descriptive cards copied through untouched, in file order.
    pub cards: Vec<(String, CardValue)>,
}

impl Default for MapMeta {
    fn default() -> Self {
        Self {
            crpix1: 1.0,
            crpix2: 1.0,
            cdelt1: 1.0,
            cdelt2: 1.0,
            crval1: 0.0,
            crval2: 0.0,
            crota2: 0.0,
            cards: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CardValue {
    Text(String),
    Integer(i32),
    Real(f64),
    Logical(bool),
}

/// A 2-D magnetogram in row-major order; row 0 is the bottom of the image.
#[derive(Debug, Clone, PartialEq)]
pub struct Magnetogram {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f64>,
    pub meta: MapMeta,
}

impl Magnetogram {
    pub fn new(width: usize, height: usize, data: Vec<f64>, meta: MapMeta) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
            meta,
        }
    }

    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.width + x]
    }

    /// 0-based (x, y) reference pixel.
    pub fn reference_pixel(&self) -> (f64, f64) {
        (self.meta.crpix1 - 1.0, self.meta.crpix2 - 1.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Outputs written without their PNG preview.
    pub previews_failed: usize,
}
