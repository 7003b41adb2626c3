use std::path::Path;

use crate::error::{MpError, Result};
use crate::types::Allele;

use super::genotypes::GenotypeMatrix;
use super::ibd::IbdMatrix;
use super::map::GeneticMap;

/// Open a CSV file with the reader settings shared by every loader.
fn open<P: AsRef<Path>>(path: P) -> Result<csv::Reader<std::fs::File>> {
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_path(path)?)
}

fn is_missing(field: &str) -> bool {
    field.is_empty() || field == "-" || field.eq_ignore_ascii_case("na")
}

/// Read a wide table: first column is the row ID, the remaining header
/// fields are marker names.
fn read_wide<P, T, F>(path: P, parse: F) -> Result<(Vec<String>, Vec<String>, Vec<Vec<Option<T>>>)>
where
    P: AsRef<Path>,
    F: Fn(&str) -> Option<T>,
{
    let path = path.as_ref();
    let mut reader = open(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.len() < 2 {
        return Err(MpError::Data(format!(
            "'{}' needs an ID column followed by at least one marker column",
            path.display()
        )));
    }
    let markers = headers[1..].to_vec();

    let mut ids = Vec::new();
    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let id = record.get(0).unwrap_or("").to_string();
        if id.is_empty() {
            return Err(MpError::Data(format!(
                "'{}' row {} has an empty ID",
                path.display(),
                line + 2
            )));
        }
        let mut row = Vec::with_capacity(markers.len());
        for (j, field) in record.iter().skip(1).enumerate() {
            if is_missing(field) {
                row.push(None);
                continue;
            }
            let value = parse(field).ok_or_else(|| {
                MpError::Data(format!(
                    "'{}': cannot parse '{}' for '{}' at marker '{}'",
                    path.display(),
                    field,
                    id,
                    markers[j]
                ))
            })?;
            row.push(Some(value));
        }
        ids.push(id);
        rows.push(row);
    }

    Ok((ids, markers, rows))
}

/// Read a genotype matrix from CSV.
///
/// The first column holds individual IDs; every other column is a marker.
/// Calls are integer allele codes. `NA`, `-` and empty fields are missing.
///
/// # Errors
/// Returns an error if the file cannot be read, a call is not an integer, or
/// the table is malformed (see [`GenotypeMatrix::from_rows`]).
pub fn read_genotypes<P: AsRef<Path>>(path: P) -> Result<GenotypeMatrix> {
    let (ids, markers, rows) = read_wide(path, |s| s.parse::<Allele>().ok())?;
    GenotypeMatrix::from_rows(ids, markers, rows)
}

/// Read founder-of-origin truth from CSV, in the genotype layout.
///
/// Entries are 1-based founder indices.
pub fn read_ibd<P: AsRef<Path>>(path: P) -> Result<IbdMatrix> {
    let (ids, markers, rows) = read_wide(path, |s| s.parse::<usize>().ok())?;
    IbdMatrix::from_rows(ids, markers, rows)
}

/// Read a genetic map from a long-format CSV.
///
/// Required columns (case-insensitive): `marker`, `chromosome` (or `chr`) and
/// `position` (or `pos`, `cm`).
///
/// # Errors
/// Returns an error if a column is missing, a position is not a number, or
/// the records are inconsistent (see [`GeneticMap::from_records`]).
pub fn read_map<P: AsRef<Path>>(path: P) -> Result<GeneticMap> {
    let path = path.as_ref();
    let mut reader = open(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();
    let find = |names: &[&str], label: &str| {
        headers
            .iter()
            .position(|h| names.contains(&h.as_str()))
            .ok_or_else(|| {
                MpError::Data(format!("'{}' is missing a '{}' column", path.display(), label))
            })
    };
    let marker_col = find(&["marker", "name", "id"], "marker")?;
    let chrom_col = find(&["chromosome", "chr", "chrom"], "chromosome")?;
    let pos_col = find(&["position", "pos", "cm"], "position")?;

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let field = |col: usize| record.get(col).unwrap_or("");
        let marker = field(marker_col).to_string();
        let position: f64 = field(pos_col).parse().map_err(|_| {
            MpError::Data(format!(
                "Marker '{}' has non-numeric position '{}'",
                marker,
                field(pos_col)
            ))
        })?;
        records.push((marker, field(chrom_col).to_string(), position));
    }

    let map = GeneticMap::from_records(records)?;
    log::debug!(
        "Read map with {} markers on {} chromosomes",
        map.n_markers(),
        map.n_chromosomes()
    );
    Ok(map)
}
