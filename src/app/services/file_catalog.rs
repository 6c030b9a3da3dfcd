//! DWD file naming and work discovery
//!
//! The climate data center publishes one zip archive per station and period:
//!
//! - `stundenwerte_TU_00003_19500401_20110331_hist.zip` (historical)
//! - `stundenwerte_TU_00044_akt.zip` (recent)
//!
//! Each archive holds one product file such as
//! `produkt_tu_stunde_19500401_20110331_00003.txt` and station metadata files
//! such as `Metadaten_Geographie_00003.txt`. This module recognizes those
//! names, pairs extracted product files with their metadata and splits work
//! lists into groups.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::app::models::{Measurand, TimeClass};
use crate::constants::DAILY_TIMESTAMP_FORMAT;
use crate::{Error, Result};

static ARCHIVE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<resolution>stundenwerte|tageswerte)_(?P<code>[A-Z0-9]+)_(?P<station>\d{5})_(?:(?P<from>\d{8})_(?P<to>\d{8})_hist|akt)\.zip$",
    )
    .expect("archive name pattern is valid")
});

static PRODUCT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^produkt_(?P<code>[a-z0-9]+)_(?P<resolution>stunde|tag)_(?P<from>\d{8})_(?P<to>\d{8})_(?P<station>\d{5})\.txt$",
    )
    .expect("product name pattern is valid")
});

static METADATA_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:Metadaten_Geographie|Stationsmetadaten)_(?:\w+_)?(?P<station>\d{5})(?:_\d{8}_\d{8})?\.txt$")
        .expect("metadata name pattern is valid")
});

/// Whether an archive holds the full history or the recent window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataClass {
    Historical,
    Recent,
}

/// Parsed archive file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveName {
    pub time_class: TimeClass,
    pub product_code: String,
    pub station_id: String,
    pub period: Option<(NaiveDate, NaiveDate)>,
    pub data_class: DataClass,
}

/// Parsed product file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductName {
    pub time_class: TimeClass,
    pub product_code: String,
    pub station_id: String,
    pub period: (NaiveDate, NaiveDate),
}

/// Any file name the importer understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DwdFile {
    Archive(ArchiveName),
    Product(ProductName),
    Metadata { station_id: String },
}

impl DwdFile {
    pub fn station_id(&self) -> &str {
        match self {
            DwdFile::Archive(archive) => &archive.station_id,
            DwdFile::Product(product) => &product.station_id,
            DwdFile::Metadata { station_id } => station_id,
        }
    }
}

fn time_class_for(resolution: &str) -> TimeClass {
    match resolution {
        "stundenwerte" | "stunde" => TimeClass::Hourly,
        "tageswerte" | "tag" => TimeClass::Daily,
        other => TimeClass::Unrecognized(other.to_string()),
    }
}

fn date(name: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DAILY_TIMESTAMP_FORMAT)
        .map_err(|e| Error::datetime_parsing(format!("Invalid date '{}' in {}", raw, name), e))
}

/// Recognize a DWD archive, product or metadata file name
pub fn parse_file_name(name: &str) -> Result<DwdFile> {
    if let Some(caps) = ARCHIVE_NAME.captures(name) {
        let period = match (caps.name("from"), caps.name("to")) {
            (Some(from), Some(to)) => Some((date(name, from.as_str())?, date(name, to.as_str())?)),
            _ => None,
        };
        return Ok(DwdFile::Archive(ArchiveName {
            time_class: time_class_for(&caps["resolution"]),
            product_code: caps["code"].to_string(),
            station_id: caps["station"].to_string(),
            data_class: if period.is_some() {
                DataClass::Historical
            } else {
                DataClass::Recent
            },
            period,
        }));
    }

    if let Some(caps) = PRODUCT_NAME.captures(name) {
        return Ok(DwdFile::Product(ProductName {
            time_class: time_class_for(&caps["resolution"]),
            product_code: caps["code"].to_uppercase(),
            station_id: caps["station"].to_string(),
            period: (date(name, &caps["from"])?, date(name, &caps["to"])?),
        }));
    }

    if let Some(caps) = METADATA_NAME.captures(name) {
        return Ok(DwdFile::Metadata {
            station_id: caps["station"].to_string(),
        });
    }

    Err(Error::file_name(name))
}

/// Product group an archive code is filed under
pub fn product_group(code: &str) -> Option<Measurand> {
    match code.to_uppercase().as_str() {
        "TU" => Some(Measurand::Temperature),
        "N" => Some(Measurand::Cloudiness),
        "P0" => Some(Measurand::AirPressure),
        "FF" => Some(Measurand::WindSpeed),
        "RR" => Some(Measurand::Precipitation),
        "SD" => Some(Measurand::SunshineDuration),
        _ => None,
    }
}

/// Split `items` into `groups` contiguous parts of near-equal size
///
/// Part `i` holds `items[i * n / groups .. (i + 1) * n / groups]`, so sizes
/// differ by at most one and some parts are empty when `groups > n`.
pub fn split_into_groups<T: Clone>(items: &[T], groups: usize) -> Result<Vec<Vec<T>>> {
    if groups < 1 {
        return Err(Error::configuration("Number of groups must be at least 1"));
    }
    let n = items.len();
    Ok((0..groups)
        .map(|i| items[i * n / groups..(i + 1) * n / groups].to_vec())
        .collect())
}

/// One product file ready to import, with its station metadata if found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkUnit {
    pub product: PathBuf,
    pub metadata: Option<PathBuf>,
    pub station_id: String,
    pub group: Measurand,
    pub time_class: TimeClass,
}

impl WorkUnit {
    pub fn label(&self) -> String {
        self.product
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned()
    }
}

/// Find product files under `root` and pair each with metadata in its directory
///
/// `group` overrides the product group derived from the file name; files of
/// unknown groups are skipped unless it is given.
pub fn discover_units(root: &Path, group: Option<Measurand>) -> Result<Vec<WorkUnit>> {
    if !root.exists() {
        return Err(Error::configuration(format!(
            "Input path does not exist: {}",
            root.display()
        )));
    }

    let mut products = Vec::new();
    let mut metadata: HashMap<(PathBuf, String), PathBuf> = HashMap::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();

        match parse_file_name(name) {
            Ok(DwdFile::Product(product)) => products.push((path.to_path_buf(), directory, product)),
            Ok(DwdFile::Metadata { station_id }) => {
                // Prefer the geography file when both kinds are present
                let key = (directory, station_id);
                if name.starts_with("Metadaten_Geographie") || !metadata.contains_key(&key) {
                    metadata.insert(key, path.to_path_buf());
                }
            }
            Ok(DwdFile::Archive(_)) => debug!("Skipping unextracted archive {}", path.display()),
            Err(_) => {}
        }
    }

    let mut units = Vec::with_capacity(products.len());
    for (path, directory, product) in products {
        let Some(unit_group) = group.or_else(|| product_group(&product.product_code)) else {
            debug!(
                "Skipping {} with unknown product code {}",
                path.display(),
                product.product_code
            );
            continue;
        };
        units.push(WorkUnit {
            metadata: metadata.get(&(directory, product.station_id.clone())).cloned(),
            product: path,
            station_id: product.station_id,
            group: unit_group,
            time_class: product.time_class,
        });
    }

    info!("Discovered {} product files under {}", units.len(), root.display());
    Ok(units)
}
