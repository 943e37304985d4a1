use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::domain::{Corners, Region, TileExtent, TileId};
use crate::error::{ArdError, LookupError, Result};

#[derive(Debug, Deserialize)]
struct ExtentRow {
    region: Region,
    h: u16,
    v: u16,
    #[serde(default)]
    hv: Option<String>,
    ulx: f64,
    uly: f64,
    lrx: f64,
    lry: f64,
}

/// Immutable reference table of tile corners, keyed by (region, h, v).
#[derive(Clone, Debug, Default)]
pub struct ExtentTable {
    rows: HashMap<TileId, TileExtent>,
}

impl ExtentTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        let f = std::fs::File::open(path)?;
        Self::from_reader(f)
    }

    /// Parse the CSV (`region,h,v[,hv],ulx,uly,lrx,lry`). Duplicate keys are rejected.
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(rdr);
        let mut rows = HashMap::new();
        for (line, rec) in reader.deserialize::<ExtentRow>().enumerate() {
            let row = rec?;
            let tile = TileId {
                region: row.region,
                h: row.h,
                v: row.v,
            };
            let corners = Corners {
                ulx: integral(row.ulx, "ulx", line)?,
                uly: integral(row.uly, "uly", line)?,
                lrx: integral(row.lrx, "lrx", line)?,
                lry: integral(row.lry, "lry", line)?,
            };
            let extent = TileExtent {
                tile,
                hv: row.hv.filter(|s| !s.is_empty()),
                corners,
            };
            if rows.insert(tile, extent).is_some() {
                return Err(ArdError::Format(format!(
                    "duplicate extent row for {tile} (record {})",
                    line + 1
                )));
            }
        }
        debug!(tiles = rows.len(), "loaded extent table");
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, tile: &TileId) -> Option<&TileExtent> {
        self.rows.get(tile)
    }
}

fn integral(v: f64, col: &str, line: usize) -> Result<i64> {
    if !v.is_finite() || v.fract() != 0.0 || v.abs() >= i64::MAX as f64 {
        return Err(ArdError::Format(format!(
            "{col} must be an integer (record {}): {v}",
            line + 1
        )));
    }
    Ok(v as i64)
}

/// Resolves expected tile corners from a table supplied at construction.
#[derive(Clone, Debug)]
pub struct ExtentResolver {
    table: ExtentTable,
}

impl ExtentResolver {
    pub fn new(table: ExtentTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ExtentTable {
        &self.table
    }

    pub fn resolve(&self, region: Region, h: u16, v: u16) -> std::result::Result<&TileExtent, LookupError> {
        self.table
            .get(&TileId { region, h, v })
            .ok_or(LookupError::TileNotFound { region, h, v })
    }
}
