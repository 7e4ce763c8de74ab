//! CelebA-style attribute annotations
//!
//! Format: the first line holds the row count, the second the
//! whitespace-separated attribute names, then one row per image:
//! `000001.jpg -1  1  1 -1 ...`.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};

/// Which attribute columns to keep
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeSelection {
    /// The first `n` columns, in file order
    First(usize),
    /// Named columns, in the given order
    Named(Vec<String>),
}

impl AttributeSelection {
    /// Selection from the data configuration
    pub fn from_config(count: usize, names: Option<&[String]>) -> Self {
        match names {
            Some(names) => Self::Named(names.to_vec()),
            None => Self::First(count),
        }
    }
}

/// Per-image attribute vectors for the selected columns
#[derive(Debug, Clone)]
pub struct AttributeTable {
    names: Vec<String>,
    filenames: Vec<String>,
    rows: Vec<Vec<f32>>,
    index: HashMap<String, usize>,
}

impl AttributeTable {
    /// Parse an annotation file
    pub fn from_file(path: impl AsRef<Path>, selection: &AttributeSelection) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::data(format!("cannot read annotation file '{}': {e}", path.display()))
        })?;
        let table = Self::parse(&content, selection)?;
        info!(
            "Loaded {} annotated images with attributes {:?}",
            table.len(),
            table.names
        );
        Ok(table)
    }

    /// Parse annotation text
    pub fn parse(content: &str, selection: &AttributeSelection) -> Result<Self> {
        let mut lines = content.lines().filter(|l| !l.trim().is_empty());

        let declared: usize = lines
            .next()
            .ok_or_else(|| Error::data("annotation file is empty"))?
            .trim()
            .parse()
            .map_err(|_| Error::data("first annotation line must be the row count"))?;

        let header: Vec<&str> = lines
            .next()
            .ok_or_else(|| Error::data("annotation file has no attribute header"))?
            .split_whitespace()
            .collect();

        let columns: Vec<usize> = match selection {
            AttributeSelection::First(n) => {
                if *n == 0 || *n > header.len() {
                    return Err(Error::data(format!(
                        "requested {n} attributes but the file has {}",
                        header.len()
                    )));
                }
                (0..*n).collect()
            }
            AttributeSelection::Named(names) => names
                .iter()
                .map(|name| {
                    header
                        .iter()
                        .position(|h| h == name)
                        .ok_or_else(|| Error::data(format!("unknown attribute '{name}'")))
                })
                .collect::<Result<_>>()?,
        };
        let names = columns.iter().map(|&c| header[c].to_string()).collect();

        let mut filenames = Vec::with_capacity(declared);
        let mut rows = Vec::with_capacity(declared);
        let mut index = HashMap::with_capacity(declared);

        for (line_no, line) in lines.enumerate() {
            let mut fields = line.split_whitespace();
            let filename = fields
                .next()
                .ok_or_else(|| Error::data(format!("empty annotation row {}", line_no + 3)))?;
            let values: Vec<&str> = fields.collect();
            if values.len() != header.len() {
                return Err(Error::data(format!(
                    "row for '{filename}' has {} values, expected {}",
                    values.len(),
                    header.len()
                )));
            }

            let row = columns
                .iter()
                .map(|&c| if values[c] == "1" { 1.0 } else { 0.0 })
                .collect();

            index.insert(filename.to_string(), rows.len());
            filenames.push(filename.to_string());
            rows.push(row);
        }

        if rows.len() != declared {
            return Err(Error::data(format!(
                "annotation file declares {declared} rows but contains {}",
                rows.len()
            )));
        }

        Ok(Self {
            names,
            filenames,
            rows,
            index,
        })
    }

    /// Number of annotated images
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no images are annotated
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Selected attribute names
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of selected attributes
    pub fn attribute_count(&self) -> usize {
        self.names.len()
    }

    /// Attributes of the image named `filename`
    pub fn by_name(&self, filename: &str) -> Option<&[f32]> {
        self.index.get(filename).map(|&i| self.rows[i].as_slice())
    }

    /// Filename and attributes of row `row`
    pub fn by_row(&self, row: usize) -> Option<(&str, &[f32])> {
        Some((self.filenames.get(row)?.as_str(), self.rows.get(row)?.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "3\n\
        Bald Eyeglasses Male Smiling\n\
        000001.jpg -1  1  1 -1\n\
        000002.jpg  1 -1 -1  1\n\
        000003.jpg -1 -1  1  1\n";

    #[test]
    fn test_first_columns() {
        let table = AttributeTable::parse(SAMPLE, &AttributeSelection::First(2)).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.names(), &["Bald".to_string(), "Eyeglasses".to_string()]);
        assert_eq!(table.by_name("000001.jpg").unwrap(), &[0.0, 1.0]);
        assert_eq!(table.by_row(1).unwrap(), ("000002.jpg", &[1.0f32, 0.0][..]));
    }

    #[test]
    fn test_named_columns_keep_requested_order() {
        let selection = AttributeSelection::Named(vec!["Smiling".into(), "Male".into()]);
        let table = AttributeTable::parse(SAMPLE, &selection).unwrap();
        assert_eq!(table.by_name("000003.jpg").unwrap(), &[1.0, 1.0]);
        assert_eq!(table.by_name("000002.jpg").unwrap(), &[1.0, 0.0]);
    }

    #[test]
    fn test_unknown_attribute_is_rejected() {
        let selection = AttributeSelection::Named(vec!["Wings".into()]);
        assert!(AttributeTable::parse(SAMPLE, &selection).is_err());
    }

    #[test]
    fn test_row_count_mismatch_is_rejected() {
        let truncated = "5\nBald Male\n000001.jpg 1 1\n";
        assert!(AttributeTable::parse(truncated, &AttributeSelection::First(1)).is_err());
    }

    #[test]
    fn test_short_row_is_rejected() {
        let bad = "1\nBald Male\n000001.jpg 1\n";
        assert!(AttributeTable::parse(bad, &AttributeSelection::First(1)).is_err());
    }

    #[test]
    fn test_missing_file_is_a_data_error() {
        let err = AttributeTable::from_file("/nonexistent/list_attr.txt", &AttributeSelection::First(1))
            .unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }
}
