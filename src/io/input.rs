use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;

use crate::io::outline::{Outline, OutlinePoint, Population, REFERENCE_LANDMARK};

/// One row of an outline export: a single border point of one cell.
///
/// Expected column order:
///
/// ```text
/// cell_id, point_index, x, y
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct OutlineRow {
    pub cell_id: u32,
    pub point_index: u32,
    pub x: f64,
    pub y: f64,
}

/// One row of a reference-landmark export: the border index of the
/// reference landmark for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ReferenceRow {
    pub cell_id: u32,
    pub index: usize,
}

fn detect_delimiter<P: AsRef<Path>>(path: P) -> Result<u8> {
    let file = File::open(&path).with_context(|| {
        format!(
            "failed to open file for delimiter sniffing: {:?}",
            path.as_ref()
        )
    })?;
    let mut reader = BufReader::new(file);
    let mut first_line = String::new();
    reader
        .read_line(&mut first_line)
        .with_context(|| "failed to read first line for delimiter detection")?;

    let tabs = first_line.matches('\t').count();
    let commas = first_line.matches(',').count();

    if tabs > commas {
        Ok(b'\t')
    } else {
        Ok(b',')
    }
}

/// Reads all border points from an outline export, grouped by cell and
/// ordered by point index. Invalid rows are skipped with a warning.
pub fn read_outline_rows<P: AsRef<Path>>(path: P) -> Result<BTreeMap<u32, Vec<OutlinePoint>>> {
    let delim = detect_delimiter(&path)?;
    let file = File::open(&path)
        .with_context(|| format!("failed to open outline file {:?}", path.as_ref()))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delim)
        .from_reader(file);

    let mut groups: BTreeMap<u32, Vec<OutlinePoint>> = BTreeMap::new();
    for result in rdr.records() {
        match result {
            Ok(record) => match record.deserialize::<OutlineRow>(None) {
                Ok(row) => groups.entry(row.cell_id).or_default().push(OutlinePoint {
                    point_index: row.point_index,
                    x: row.x,
                    y: row.y,
                }),
                Err(e) => eprintln!("Skipping invalid outline record: {:?}", e),
            },
            Err(e) => eprintln!("Skipping invalid outline row: {:?}", e),
        }
    }

    for points in groups.values_mut() {
        points.sort_by_key(|p| p.point_index);
    }

    Ok(groups)
}

/// Reads the reference-landmark index for every cell.
pub fn read_reference_rows<P: AsRef<Path>>(path: P) -> Result<BTreeMap<u32, usize>> {
    let delim = detect_delimiter(&path)?;
    let file = File::open(&path)
        .with_context(|| format!("failed to open reference file {:?}", path.as_ref()))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delim)
        .from_reader(file);

    let mut references = BTreeMap::new();
    for result in rdr.deserialize() {
        let row: ReferenceRow = result.with_context(|| "failed to deserialize reference row")?;
        references.insert(row.cell_id, row.index);
    }
    if references.is_empty() {
        return Err(anyhow!("reference file contained no rows"));
    }
    Ok(references)
}

/// Loads a population from a directory containing `outlines.csv` and
/// `reference_points.csv`, the hand-off format of the upstream segmentation
/// step. Cells without a reference landmark are dropped with a warning.
pub fn load_population<P: AsRef<Path>>(
    dir: P,
    label: &str,
    pixels_per_micron: f64,
) -> Result<Population> {
    let dir = dir.as_ref();
    let outline_path = dir.join("outlines.csv");
    let reference_path = dir.join("reference_points.csv");

    let groups = read_outline_rows(&outline_path)
        .with_context(|| format!("reading {}", outline_path.display()))?;
    let references = read_reference_rows(&reference_path)
        .with_context(|| format!("reading {}", reference_path.display()))?;

    let mut members = Vec::new();
    for (cell_id, points) in groups {
        let Some(&reference) = references.get(&cell_id) else {
            println!("Cell {} has no reference landmark, dropping it", cell_id);
            continue;
        };
        let mut outline = match Outline::new(cell_id, points, pixels_per_micron) {
            Ok(o) => o,
            Err(e) => {
                println!("Cell {} is not a usable outline: {}", cell_id, e);
                continue;
            }
        };
        // construction may reverse a clockwise border, so resolve the
        // reference by point identity rather than by position
        let position = match outline.position_of_point_index(reference as u32) {
            Ok(p) => p,
            Err(e) => {
                println!("Cell {} reference landmark is unusable: {}", cell_id, e);
                continue;
            }
        };
        outline.set_landmark(REFERENCE_LANDMARK, position);
        members.push(outline);
    }

    let mut population = Population::new(members, label)
        .with_context(|| format!("no usable outlines in {}", dir.display()))?;
    population.scale = Some(pixels_per_micron);
    Ok(population)
}
