//! Numeric CSV matrices (one header line, one item per row).
//!
//! Cells are floats or the booleans `True`/`False` as written by pandas for
//! one-hot encoded columns.

use anyhow::{bail, Context, Result};
use cinesim_core::FeatureMatrix;
use std::io::Read;
use std::path::Path;

pub fn read_numeric_csv<P: AsRef<Path>>(path: P) -> Result<FeatureMatrix> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    collect_matrix(reader).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_numeric_csv(text: &str) -> Result<FeatureMatrix> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    collect_matrix(reader)
}

fn collect_matrix<R: Read>(mut reader: csv::Reader<R>) -> Result<FeatureMatrix> {
    let header_width = reader.headers().context("reading header")?.len();
    if header_width == 0 {
        bail!("csv has no header line");
    }

    let mut rows = 0usize;
    let mut data = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("record {}", row + 1))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if record.len() != header_width {
            bail!(
                "record {} has {} columns, expected {}",
                row + 1,
                record.len(),
                header_width
            );
        }
        for (col, cell) in record.iter().enumerate() {
            data.push(parse_cell(cell).with_context(|| format!("record {}, column {}", row + 1, col))?);
        }
        rows += 1;
    }

    Ok(FeatureMatrix::new(rows, header_width, data)?)
}

fn parse_cell(cell: &str) -> Result<f32> {
    let cell = cell.trim();
    if cell.eq_ignore_ascii_case("true") {
        return Ok(1.0);
    }
    if cell.eq_ignore_ascii_case("false") {
        return Ok(0.0);
    }
    cell.parse::<f32>()
        .with_context(|| format!("bad numeric cell {:?}", cell))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_one_hot() {
        let m = parse_numeric_csv("Action,Drama,Comedy\nTrue,False,False\n0,1,0.5\n\n").unwrap();
        assert_eq!((m.rows(), m.cols()), (2, 3));
        assert_eq!(m.row(0).unwrap(), &[1.0, 0.0, 0.0]);
        assert_eq!(m.row(1).unwrap(), &[0.0, 1.0, 0.5]);
    }

    #[test]
    fn test_quoted_header_with_comma() {
        let m = parse_numeric_csv("\"genre_Action, Adventure\",genre_Drama\n\"1\",0\nFalse,True\n").unwrap();
        assert_eq!((m.rows(), m.cols()), (2, 2));
        assert_eq!(m.row(0).unwrap(), &[1.0, 0.0]);
        assert_eq!(m.row(1).unwrap(), &[0.0, 1.0]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = parse_numeric_csv("a,b\n1,2\n3\n").unwrap_err();
        assert!(format!("{:#}", err).contains("columns"));
    }

    #[test]
    fn test_bad_cell_rejected() {
        assert!(parse_numeric_csv("a\nnope\n").is_err());
        assert!(parse_numeric_csv("").is_err());
    }

    #[test]
    fn test_non_finite_cells_rejected() {
        let err = parse_numeric_csv("a,b\nnan,1\n1,0\n").unwrap_err();
        assert!(format!("{:#}", err).contains("non-finite"));
        assert!(parse_numeric_csv("a,b\n1,0\ninf,0\n").is_err());
    }

    #[test]
    fn test_header_only() {
        let m = parse_numeric_csv("a,b\n").unwrap();
        assert_eq!(m.rows(), 0);
        assert_eq!(m.cols(), 2);
    }
}
