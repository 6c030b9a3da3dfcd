//! Local reader for extracted DWD product and metadata files
//!
//! DWD text files are Latin-1 encoded; only ASCII is significant for parsing,
//! so they are decoded lossily rather than rejected.

use std::path::Path;

use tracing::debug;

use crate::{Error, Result};

/// Header line plus the raw data rows of one station-and-period file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProduct {
    pub header: String,
    pub rows: Vec<String>,
}

impl RawProduct {
    /// Split file content into header and rows, skipping blank lines
    pub fn from_text(content: &str) -> Result<Self> {
        let mut lines = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty());

        let header = lines
            .next()
            .ok_or_else(|| Error::schema("Product file is empty"))?
            .to_string();
        let rows = lines.map(str::to_string).collect();

        Ok(Self { header, rows })
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let content = read_lossy(path).await?;
        let product = Self::from_text(&content)?;
        debug!("Read {} rows from {}", product.rows.len(), path.display());
        Ok(product)
    }
}

/// Read a text file, replacing bytes that are not valid UTF-8
pub async fn read_lossy(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::io(format!("Failed to read {}", path.display()), e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Non-blank lines of a metadata file, header included
pub async fn read_metadata_lines(path: &Path) -> Result<Vec<String>> {
    let content = read_lossy(path).await?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_text_splits_header() {
        let product =
            RawProduct::from_text("STATIONS_ID;MESS_DATUM;TT_TU\n\n3;2020010100;1.0\n3;2020010101;2.0\n")
                .unwrap();
        assert_eq!(product.header, "STATIONS_ID;MESS_DATUM;TT_TU");
        assert_eq!(product.rows.len(), 2);
    }

    #[test]
    fn test_from_text_rejects_empty() {
        assert!(matches!(
            RawProduct::from_text("\n  \n"),
            Err(Error::Schema { .. })
        ));
    }

    #[tokio::test]
    async fn test_from_path_decodes_latin1() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Stations_id;Stationsname\n3;Aachen-M\xfcnchen\n")
            .unwrap();

        let lines = read_metadata_lines(file.path()).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("3;Aachen-M"));

        let product = RawProduct::from_path(file.path()).await.unwrap();
        assert_eq!(product.rows.len(), 1);
    }
}
