// ard_core/src/domain.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ArdError;

/// ARD tiling region.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "CU")]
    Cu,
    #[serde(rename = "AK")]
    Ak,
    #[serde(rename = "HI")]
    Hi,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Cu, Region::Ak, Region::Hi];

    pub fn code(self) -> &'static str {
        match self {
            Region::Cu => "CU",
            Region::Ak => "AK",
            Region::Hi => "HI",
        }
    }

    /// Albers Equal Area parameters for the region's tiling grid.
    pub fn albers(self) -> AlbersParams {
        let (sp1, sp2, lat0, lon0) = match self {
            Region::Cu => (29.5, 45.5, 23.0, -96.0),
            Region::Ak => (55.0, 65.0, 50.0, -154.0),
            Region::Hi => (8.0, 18.0, 3.0, -157.0),
        };
        AlbersParams {
            standard_parallel1: sp1,
            standard_parallel2: sp2,
            central_meridian: lon0,
            origin_latitude: lat0,
            false_easting: 0.0,
            false_northing: 0.0,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = ArdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CU" => Ok(Region::Cu),
            "AK" => Ok(Region::Ak),
            "HI" => Ok(Region::Hi),
            other => Err(ArdError::Format(format!("unknown region: {other}"))),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AlbersParams {
    pub standard_parallel1: f64,
    pub standard_parallel2: f64,
    pub central_meridian: f64,
    pub origin_latitude: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl AlbersParams {
    /// (element name, value) pairs in metadata order.
    pub fn fields(&self) -> [(&'static str, f64); 6] {
        [
            ("standard_parallel1", self.standard_parallel1),
            ("standard_parallel2", self.standard_parallel2),
            ("central_meridian", self.central_meridian),
            ("origin_latitude", self.origin_latitude),
            ("false_easting", self.false_easting),
            ("false_northing", self.false_northing),
        ]
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Sensor {
    Lc08,
    Lo08,
    Lt04,
    Lt05,
    Le07,
}

impl Sensor {
    pub fn code(self) -> &'static str {
        match self {
            Sensor::Lc08 => "LC08",
            Sensor::Lo08 => "LO08",
            Sensor::Lt04 => "LT04",
            Sensor::Lt05 => "LT05",
            Sensor::Le07 => "LE07",
        }
    }

    pub fn is_landsat8(self) -> bool {
        matches!(self, Sensor::Lc08 | Sensor::Lo08)
    }
}

impl FromStr for Sensor {
    type Err = ArdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LC08" => Ok(Sensor::Lc08),
            "LO08" => Ok(Sensor::Lo08),
            "LT04" => Ok(Sensor::Lt04),
            "LT05" => Ok(Sensor::Lt05),
            "LE07" => Ok(Sensor::Le07),
            other => Err(ArdError::Format(format!("unknown sensor: {other}"))),
        }
    }
}

/// Bundle product group (the suffix before `.tar`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Product {
    Sr,
    Ta,
    Bt,
    Qa,
}

impl Product {
    pub fn code(self) -> &'static str {
        match self {
            Product::Sr => "SR",
            Product::Ta => "TA",
            Product::Bt => "BT",
            Product::Qa => "QA",
        }
    }
}

impl FromStr for Product {
    type Err = ArdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SR" => Ok(Product::Sr),
            "TA" => Ok(Product::Ta),
            "BT" => Ok(Product::Bt),
            "QA" => Ok(Product::Qa),
            other => Err(ArdError::Format(format!("unknown product: {other}"))),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TileId {
    pub region: Region,
    pub h: u16,
    pub v: u16,
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} h{:03}v{:03}", self.region, self.h, self.v)
    }
}

/// Corner coordinates of a tile in projected metres.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Corners {
    pub ulx: i64,
    pub uly: i64,
    pub lrx: i64,
    pub lry: i64,
}

impl Corners {
    pub fn fields(&self) -> [(&'static str, i64); 4] {
        [
            ("ulx", self.ulx),
            ("uly", self.uly),
            ("lrx", self.lrx),
            ("lry", self.lry),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileExtent {
    pub tile: TileId,
    pub hv: Option<String>,
    pub corners: Corners,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_round_trips_through_code() {
        for r in Region::ALL {
            assert_eq!(r.code().parse::<Region>().unwrap(), r);
        }
        assert!("cu".parse::<Region>().is_err());
    }

    #[test]
    fn albers_params_differ_per_region() {
        assert_eq!(Region::Cu.albers().central_meridian, -96.0);
        assert_eq!(Region::Ak.albers().standard_parallel2, 65.0);
        assert_eq!(Region::Hi.albers().origin_latitude, 3.0);
    }

    #[test]
    fn tile_display_is_zero_padded() {
        let t = TileId {
            region: Region::Ak,
            h: 3,
            v: 12,
        };
        assert_eq!(t.to_string(), "AK h003v012");
    }
}
