//! Reader for tracker CSV output.
//!
//! Layout: a `scorer` row, a `bodyparts` row, a `coords` row, then one row per
//! frame. The first column holds labels (header rows) or the frame index (data
//! rows). Each bodypart spans three columns: `x`, `y`, `likelihood`.
//! Multi-animal files carry an extra `individuals` row before `bodyparts`;
//! only the `bodyparts`/`coords` pair is interpreted.

use std::io::Read;
use std::path::Path;

use crate::error::{PupilError, Result};
use crate::keypoints::{KeypointSample, KeypointTable, KeypointTrack};

/// Header rows scanned for the `coords` label.
const MAX_HEADER_ROWS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    X,
    Y,
    Likelihood,
}

impl Field {
    fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "x" => Some(Self::X),
            "y" => Some(Self::Y),
            "likelihood" => Some(Self::Likelihood),
            _ => None,
        }
    }
}

impl KeypointTable {
    /// Load a tracker CSV file.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let table = Self::from_csv_reader(file)?;
        tracing::debug!(
            "Loaded {} frames x {} bodyparts from {}",
            table.n_frames(),
            table.tracks().len(),
            path.display()
        );
        Ok(table)
    }

    /// Parse tracker CSV from any reader.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut header_rows: Vec<csv::StringRecord> = Vec::new();
        let mut records = rdr.records();
        let coords_row = loop {
            let Some(rec) = records.next() else {
                return Err(PupilError::InvalidInput(
                    "missing 'coords' header row".to_string(),
                ));
            };
            let rec = rec?;
            if rec.get(0).map(str::trim) == Some("coords") {
                break rec;
            }
            header_rows.push(rec);
            if header_rows.len() >= MAX_HEADER_ROWS {
                return Err(PupilError::InvalidInput(
                    "missing 'coords' header row".to_string(),
                ));
            }
        };
        // scorer, [individuals,] bodyparts
        if header_rows.len() < 2 {
            return Err(PupilError::InvalidInput(format!(
                "expected at least 3 header rows, found {}",
                header_rows.len() + 1
            )));
        }
        let bodypart_row = &header_rows[header_rows.len() - 1];

        let columns = build_column_map(bodypart_row, &coords_row)?;
        let width = coords_row.len();
        let n_tracks = columns.names.len();

        let mut samples: Vec<Vec<KeypointSample>> = vec![Vec::new(); n_tracks];
        for (row_idx, rec) in records.enumerate() {
            let rec = rec?;
            if rec.len() == 1 && rec.get(0).is_some_and(|c| c.trim().is_empty()) {
                continue;
            }
            if rec.len() != width {
                return Err(PupilError::InvalidInput(format!(
                    "data row {} has {} cells, expected {}",
                    row_idx,
                    rec.len(),
                    width
                )));
            }
            let mut row = vec![KeypointSample::MISSING; n_tracks];
            for (col, &(track_idx, field)) in columns.fields.iter().enumerate() {
                let value = parse_cell(&rec[col + 1], row_idx, col + 1)?;
                let s = &mut row[track_idx];
                match field {
                    Field::X => s.x = value,
                    Field::Y => s.y = value,
                    Field::Likelihood => s.likelihood = value,
                }
            }
            for (track, s) in samples.iter_mut().zip(row) {
                track.push(s);
            }
        }

        if samples.first().map_or(true, Vec::is_empty) {
            return Err(PupilError::InvalidInput("no data rows".to_string()));
        }

        let tracks = columns
            .names
            .into_iter()
            .zip(samples)
            .map(|(name, s)| KeypointTrack::new(name, s))
            .collect();
        KeypointTable::new(tracks)
    }
}

struct ColumnMap {
    names: Vec<String>,
    /// One entry per data column after the index column.
    fields: Vec<(usize, Field)>,
}

fn build_column_map(bodyparts: &csv::StringRecord, coords: &csv::StringRecord) -> Result<ColumnMap> {
    if bodyparts.len() != coords.len() {
        return Err(PupilError::InvalidInput(format!(
            "header rows differ in width ({} vs {})",
            bodyparts.len(),
            coords.len()
        )));
    }
    if coords.len() < 2 {
        return Err(PupilError::InvalidInput("no bodypart columns".to_string()));
    }

    let mut names: Vec<String> = Vec::new();
    let mut seen: Vec<[bool; 3]> = Vec::new();
    let mut fields = Vec::with_capacity(coords.len() - 1);

    for col in 1..coords.len() {
        let name = bodyparts[col].trim();
        let field = Field::parse(&coords[col]).ok_or_else(|| {
            PupilError::InvalidInput(format!(
                "unknown coordinate '{}' in column {}",
                &coords[col], col
            ))
        })?;
        let track_idx = match names.iter().position(|n| n == name) {
            Some(i) if i + 1 == names.len() => i,
            Some(_) => {
                return Err(PupilError::InvalidInput(format!(
                    "bodypart '{}' columns are not contiguous",
                    name
                )))
            }
            None => {
                names.push(name.to_string());
                seen.push([false; 3]);
                names.len() - 1
            }
        };
        let slot = &mut seen[track_idx][field as usize];
        if *slot {
            return Err(PupilError::InvalidInput(format!(
                "bodypart '{}' repeats coordinate '{}'",
                name,
                &coords[col]
            )));
        }
        *slot = true;
        fields.push((track_idx, field));
    }

    if let Some(i) = seen.iter().position(|s| !s.iter().all(|&b| b)) {
        return Err(PupilError::InvalidInput(format!(
            "bodypart '{}' lacks one of x/y/likelihood",
            names[i]
        )));
    }

    Ok(ColumnMap { names, fields })
}

fn parse_cell(cell: &str, row: usize, col: usize) -> Result<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>().map_err(|_| {
        PupilError::InvalidInput(format!(
            "unparsable value '{}' at data row {}, column {}",
            cell, row, col
        ))
    })
}
