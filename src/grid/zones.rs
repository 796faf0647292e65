//! Administrative region polygons and point-to-zone assignment.

use geo::{Contains, EuclideanDistance, LineString, MultiPolygon, Point, Polygon};
use serde_json::Value;
use thiserror::Error;

use super::nearest::nearest_label;
use super::tables::{FALLBACK_DOMESTIC_ZONE, LookupTables};
use super::types::Coord;

/// Property keys tried, in order, for a feature's region name.
const NAME_KEYS: &[&str] = &["reg_name", "name", "DEN_REG"];

/// Failure to turn a GeoJSON document into region polygons.
#[derive(Debug, Error)]
pub enum RegionParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Shape(String),
}

/// A named administrative region.
#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub shape: MultiPolygon<f64>,
}

/// Named region polygons, in document order.
#[derive(Debug, Clone, Default)]
pub struct RegionPolygons {
    pub regions: Vec<Region>,
}

impl RegionPolygons {
    /// Parses a GeoJSON `FeatureCollection` of `Polygon`/`MultiPolygon`
    /// features. Features without a usable name or geometry are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not JSON or has no `features`
    /// array.
    pub fn from_geojson_str(s: &str) -> Result<Self, RegionParseError> {
        let doc: Value = serde_json::from_str(s)?;
        let features = doc
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| RegionParseError::Shape("missing \"features\" array".into()))?;

        let mut regions = Vec::new();
        for feature in features {
            let Some(name) = feature_name(feature) else {
                continue;
            };
            let Some(shape) = feature.get("geometry").and_then(parse_geometry) else {
                tracing::debug!(region = %name, "skipping feature without polygon geometry");
                continue;
            };
            regions.push(Region { name, shape });
        }
        Ok(Self { regions })
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// First region whose polygon contains `c`.
    pub fn containing(&self, c: &Coord) -> Option<&Region> {
        let p = to_point(c);
        self.regions.iter().find(|r| r.shape.contains(&p))
    }

    /// Region with the smallest boundary distance to `c`, with the distance.
    /// First minimum wins.
    pub fn nearest(&self, c: &Coord) -> Option<(&Region, f64)> {
        let p = to_point(c);
        let mut best: Option<(&Region, f64)> = None;
        for r in &self.regions {
            let d = p.euclidean_distance(&r.shape);
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((r, d)),
            }
        }
        best
    }
}

/// How a point was placed into its zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneMatch {
    Country,
    Contained,
    Coastal,
    Neighbour,
}

/// Assigns points to bidding zones using country codes, region polygons,
/// and neighbour reference points, in that order of preference.
#[derive(Debug, Clone)]
pub struct ZoneMapper<'a> {
    pub regions: &'a RegionPolygons,
    pub tables: &'a LookupTables,
    /// Max boundary distance (degrees) for snapping outside points to a region.
    pub coastal_threshold_deg: f64,
}

impl ZoneMapper<'_> {
    /// Zone code for a point, or `None` when no rule applies.
    pub fn assign(&self, c: &Coord, country: Option<&str>) -> Option<(String, ZoneMatch)> {
        if let Some(zone) = country.and_then(|cc| self.tables.zone_for_country(cc)) {
            return Some((zone.to_string(), ZoneMatch::Country));
        }
        if let Some(region) = self.regions.containing(c) {
            return Some((self.region_zone(&region.name), ZoneMatch::Contained));
        }
        if let Some((region, d)) = self.regions.nearest(c) {
            if d <= self.coastal_threshold_deg {
                return Some((self.region_zone(&region.name), ZoneMatch::Coastal));
            }
        }
        nearest_label(&self.tables.neighbour_points, c)
            .map(|zone| (zone.to_string(), ZoneMatch::Neighbour))
    }

    fn region_zone(&self, name: &str) -> String {
        self.tables
            .zone_for_region(name)
            .unwrap_or(FALLBACK_DOMESTIC_ZONE)
            .to_string()
    }
}

fn feature_name(feature: &Value) -> Option<String> {
    let props = feature.get("properties")?;
    NAME_KEYS
        .iter()
        .find_map(|k| props.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

fn parse_geometry(geometry: &Value) -> Option<MultiPolygon<f64>> {
    let coords = geometry.get("coordinates")?;
    match geometry.get("type")?.as_str()? {
        "Polygon" => parse_polygon(coords).map(|p| MultiPolygon::new(vec![p])),
        "MultiPolygon" => {
            let polys: Option<Vec<_>> = coords.as_array()?.iter().map(parse_polygon).collect();
            polys.map(MultiPolygon::new)
        }
        _ => None,
    }
}

fn parse_polygon(rings: &Value) -> Option<Polygon<f64>> {
    let mut rings = rings.as_array()?.iter().map(parse_ring);
    let exterior = rings.next()??;
    let interiors: Option<Vec<_>> = rings.collect();
    Some(Polygon::new(exterior, interiors?))
}

fn parse_ring(ring: &Value) -> Option<LineString<f64>> {
    let points: Option<Vec<(f64, f64)>> = ring
        .as_array()?
        .iter()
        .map(|pos| {
            let pos = pos.as_array()?;
            Some((pos.first()?.as_f64()?, pos.get(1)?.as_f64()?))
        })
        .collect();
    Some(LineString::from(points?))
}

/// GeoJSON positions are (lon, lat), i.e. x = lon.
fn to_point(c: &Coord) -> Point<f64> {
    Point::new(c.lon, c.lat)
}
