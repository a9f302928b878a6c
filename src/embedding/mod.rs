//! Per-location embedding tables
//!
//! Embeddings are loaded from a whitespace-separated text table:
//!
//! ```text
//! <count> <dimension>
//! <id> <v1> <v2> ... <v_dimension>
//! ...
//! ```
//!
//! The header declares how many rows follow and the vector length.
//! A location id is `row * width + col` on the demand grid. Locations
//! without a row are simply absent; the window tensorizer skips them.

use crate::error::{Error, Result};
use ndarray::Array1;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Location id for a grid cell
pub fn location_id(row: usize, col: usize, width: usize) -> usize {
    row * width + col
}

/// Immutable mapping from location id to a fixed-length embedding vector
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingTable {
    dimension: usize,
    vectors: HashMap<usize, Array1<f64>>,
}

impl EmbeddingTable {
    /// Build a table from already-parsed vectors.
    ///
    /// Every vector must have length `dimension`.
    pub fn from_vectors(
        dimension: usize,
        vectors: impl IntoIterator<Item = (usize, Array1<f64>)>,
    ) -> Result<Self> {
        let mut map = HashMap::new();
        for (id, vector) in vectors {
            if vector.len() != dimension {
                return Err(Error::Shape(format!(
                    "embedding for id {} has length {}, expected {}",
                    id,
                    vector.len(),
                    dimension
                )));
            }
            map.insert(id, vector);
        }
        Ok(Self {
            dimension,
            vectors: map,
        })
    }

    /// Load an embedding table from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let table = Self::from_reader(BufReader::new(file))?;
        debug!(
            "Loaded {} embeddings of dimension {} from {}",
            table.len(),
            table.dimension,
            path.display()
        );
        Ok(table)
    }

    /// Parse an embedding table from any buffered reader.
    ///
    /// Reads the header and exactly `count` data lines; anything after
    /// them is ignored. Duplicate ids keep the last row.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines();

        let header = lines
            .next()
            .ok_or_else(|| Error::format(1, "missing header line"))??;
        let (count, dimension) = parse_header(&header)?;

        let mut vectors = HashMap::new();
        for index in 0..count {
            let line_no = index + 2;
            let line = lines.next().ok_or_else(|| {
                Error::format(
                    line_no,
                    format!("header declares {} rows, found only {}", count, index),
                )
            })??;
            let (id, vector) = parse_row(&line, dimension, line_no)?;
            vectors.insert(id, vector);
        }

        Ok(Self { dimension, vectors })
    }

    /// Vector length shared by every entry
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of locations with an embedding
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Look up the embedding for a location id
    pub fn get(&self, id: usize) -> Option<&Array1<f64>> {
        self.vectors.get(&id)
    }

    /// Look up the embedding for a grid cell
    pub fn get_cell(&self, row: usize, col: usize, width: usize) -> Option<&Array1<f64>> {
        self.get(location_id(row, col, width))
    }

    pub fn contains(&self, id: usize) -> bool {
        self.vectors.contains_key(&id)
    }

    /// All ids in ascending order
    pub fn ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.vectors.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

fn parse_header(line: &str) -> Result<(usize, usize)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 2 {
        return Err(Error::format(
            1,
            format!(
                "header must contain `<count> <dimension>`, found {} tokens",
                tokens.len()
            ),
        ));
    }
    let count = tokens[0]
        .parse::<usize>()
        .map_err(|_| Error::format(1, format!("invalid row count `{}`", tokens[0])))?;
    let dimension = tokens[1]
        .parse::<usize>()
        .map_err(|_| Error::format(1, format!("invalid dimension `{}`", tokens[1])))?;
    Ok((count, dimension))
}

fn parse_row(line: &str, dimension: usize, line_no: usize) -> Result<(usize, Array1<f64>)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != dimension + 1 {
        return Err(Error::format(
            line_no,
            format!(
                "expected {} tokens (id + {} values), found {}",
                dimension + 1,
                dimension,
                tokens.len()
            ),
        ));
    }

    let id = tokens[0]
        .parse::<usize>()
        .map_err(|_| Error::format(line_no, format!("invalid location id `{}`", tokens[0])))?;

    let values = tokens[1..]
        .iter()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| Error::format(line_no, format!("non-numeric value `{}`", token)))
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok((id, Array1::from(values)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn parse(text: &str) -> Result<EmbeddingTable> {
        EmbeddingTable::from_reader(Cursor::new(text))
    }

    #[test]
    fn test_parse_two_rows() {
        let table = parse("2 3\n5 0.1 0.2 0.3\n9 1.0 1.0 1.0\n").unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.dimension(), 3);
        assert_eq!(table.ids(), vec![5, 9]);

        let v5 = table.get(5).unwrap();
        assert_relative_eq!(v5[0], 0.1);
        assert_relative_eq!(v5[1], 0.2);
        assert_relative_eq!(v5[2], 0.3);
        assert_eq!(table.get(9).unwrap().to_vec(), vec![1.0, 1.0, 1.0]);
        assert!(table.get(6).is_none());
    }

    #[test]
    fn test_missing_rows_is_format_error() {
        let err = parse("2 3\n5 0.1 0.2 0.3\n").unwrap_err();
        assert!(matches!(err, Error::Format { line: 3, .. }));
    }

    #[test]
    fn test_huge_declared_count_is_format_error() {
        let err = parse("18446744073709551615 3\n5 0.1 0.2 0.3\n").unwrap_err();
        assert!(matches!(err, Error::Format { line: 3, .. }));
    }

    #[test]
    fn test_bad_header() {
        assert!(matches!(parse("two 3\n").unwrap_err(), Error::Format { line: 1, .. }));
        assert!(matches!(parse("2\n").unwrap_err(), Error::Format { line: 1, .. }));
        assert!(matches!(parse("").unwrap_err(), Error::Format { line: 1, .. }));
    }

    #[test]
    fn test_short_row() {
        let err = parse("1 3\n5 0.1 0.2\n").unwrap_err();
        assert!(matches!(err, Error::Format { line: 2, .. }));
    }

    #[test]
    fn test_non_numeric_component() {
        let err = parse("1 2\n5 0.1 abc\n").unwrap_err();
        assert!(matches!(err, Error::Format { line: 2, .. }));
    }

    #[test]
    fn test_trailing_lines_are_ignored() {
        let table = parse("1 2\n4 1.5 2.5\nnot part of the table\n").unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.contains(4));
    }

    #[test]
    fn test_get_cell_uses_row_major_id() {
        let table = parse("1 1\n23 7.0\n").unwrap();
        // width 10: row 2, col 3 -> 23
        assert_eq!(table.get_cell(2, 3, 10).unwrap()[0], 7.0);
        assert!(table.get_cell(3, 2, 10).is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "2 2").unwrap();
        writeln!(file, "0 0.5 -0.5").unwrap();
        writeln!(file, "3 1e-3 2E2").unwrap();

        let table = EmbeddingTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_relative_eq!(table.get(3).unwrap()[1], 200.0);
    }

    #[test]
    fn test_from_vectors_checks_length() {
        let err = EmbeddingTable::from_vectors(2, vec![(0, Array1::zeros(3))]).unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }
}
