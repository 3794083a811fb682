//! Region polygons from shapefiles.
//!
//! Loads polygon and multi-polygon records (coastlines, state or
//! catchment boundaries) from a shapefile and provides point-in-region
//! lookup for rasterization.
//!
//! Each record becomes one [`Region`] whose id is its record number, so ids
//! stay stable whether or not records are later filtered by extent.
//!
//! # Example
//!
//! ```ignore
//! use gridmask_rs::io::{GeoBoundingBox, Regions};
//!
//! let bbox = GeoBoundingBox::new(112.0, -44.0, 154.0, -10.0);
//! let regions = Regions::load_within("data/aus_states.shp", &bbox)?;
//!
//! if let Some(id) = regions.locate(151.2, -33.9) {
//!     println!("Sydney is in region {}", id);
//! }
//! ```

use std::fmt;
use std::path::Path;

use geo::{BoundingRect, Contains, Coord, LineString, MultiPolygon, Point, Polygon, Rect};
use shapefile::dbase::{FieldValue, Record};
use shapefile::{PolygonRing, Reader, Shape};
use thiserror::Error;
use tracing::{debug, warn};

use super::bbox::GeoBoundingBox;
use crate::types::RegionId;

/// Attribute fields tried, in order, for a region's display name.
///
/// Generic names first, then ABS boundary names (states, SA4s, LGAs) for
/// the 2021 and 2016 editions.
const NAME_FIELDS: [&str; 10] = [
    "NAME",
    "name",
    "Name",
    "REGION",
    "STE_NAME21",
    "STE_NAME16",
    "SA4_NAME21",
    "SA4_NAME16",
    "LGA_NAME21",
    "LGA_NAME16",
];

/// Error type for region loading.
#[derive(Debug, Error)]
pub enum RegionError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shapefile parsing error
    #[error("Shapefile error: {0}")]
    Shapefile(String),

    /// No polygon records in the file
    #[error("No polygons found in shapefile")]
    NoPolygons,
}

impl From<shapefile::Error> for RegionError {
    fn from(e: shapefile::Error) -> Self {
        RegionError::Shapefile(e.to_string())
    }
}

/// A single numbered region.
#[derive(Debug, Clone)]
pub struct Region {
    id: RegionId,
    name: Option<String>,
    geometry: MultiPolygon<f64>,
    /// Cached extent for cheap rejection before the polygon test
    bounds: Option<Rect<f64>>,
}

impl Region {
    /// Create a region from its geometry (x = lon, y = lat).
    pub fn new(id: RegionId, geometry: MultiPolygon<f64>) -> Self {
        let bounds = geometry.bounding_rect();
        Self {
            id,
            name: None,
            geometry,
            bounds,
        }
    }

    /// Attach a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Region id.
    pub fn id(&self) -> RegionId {
        self.id
    }

    /// Display name, if the record carried one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Region geometry.
    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Geographic extent, `None` for empty geometry.
    pub fn bbox(&self) -> Option<GeoBoundingBox> {
        self.bounds.as_ref().map(GeoBoundingBox::from_rect)
    }

    /// Check whether a point lies strictly inside the region.
    ///
    /// Points exactly on the boundary are outside, following
    /// [`geo::Contains`].
    #[inline]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let Some(rect) = self.bounds else {
            return false;
        };
        if lon < rect.min().x || lon > rect.max().x || lat < rect.min().y || lat > rect.max().y {
            return false;
        }
        self.geometry.contains(&Point::new(lon, lat))
    }
}

/// An immutable collection of regions.
#[derive(Debug, Clone, Default)]
pub struct Regions {
    regions: Vec<Region>,
}

impl Regions {
    /// Wrap an explicit list of regions.
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    /// Build regions from geometries, numbering them from zero.
    pub fn from_polygons<I>(polygons: I) -> Self
    where
        I: IntoIterator<Item = MultiPolygon<f64>>,
    {
        let regions = polygons
            .into_iter()
            .enumerate()
            .map(|(i, geometry)| Region::new(RegionId::new(i as u32), geometry))
            .collect();
        Self { regions }
    }

    /// Load every polygon record of a shapefile.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RegionError> {
        Self::load_filtered(path.as_ref(), None)
    }

    /// Load polygon records whose extent intersects `bbox`.
    ///
    /// Returns an empty collection (not an error) if the file has polygons
    /// but none reach the box.
    pub fn load_within<P: AsRef<Path>>(
        path: P,
        bbox: &GeoBoundingBox,
    ) -> Result<Self, RegionError> {
        Self::load_filtered(path.as_ref(), Some(bbox))
    }

    fn load_filtered(path: &Path, bbox: Option<&GeoBoundingBox>) -> Result<Self, RegionError> {
        let mut reader = Reader::from_path(path)?;
        let mut regions = Vec::new();
        let mut polygon_records = 0usize;

        for (record_index, result) in reader.iter_shapes_and_records().enumerate() {
            let (shape, record) = result?;

            let geometry = match shape {
                Shape::Polygon(polygon) => {
                    rings_to_multipolygon(polygon.rings(), |p| Coord { x: p.x, y: p.y })
                }
                Shape::PolygonM(polygon) => {
                    rings_to_multipolygon(polygon.rings(), |p| Coord { x: p.x, y: p.y })
                }
                Shape::PolygonZ(polygon) => {
                    rings_to_multipolygon(polygon.rings(), |p| Coord { x: p.x, y: p.y })
                }
                Shape::NullShape => continue,
                other => {
                    warn!(
                        record = record_index,
                        shape = ?other.shapetype(),
                        "skipping non-polygon shape"
                    );
                    continue;
                }
            };
            polygon_records += 1;

            let mut region = Region::new(RegionId::new(record_index as u32), geometry);
            if let Some(name) = record_name(&record) {
                region = region.with_name(name);
            }

            let keep = match (bbox, region.bbox()) {
                (Some(filter), Some(extent)) => filter.intersects(&extent),
                (Some(_), None) => false,
                (None, _) => true,
            };
            if keep {
                regions.push(region);
            }
        }

        if polygon_records == 0 {
            return Err(RegionError::NoPolygons);
        }
        if regions.is_empty() {
            warn!("no shapefile regions intersect the requested extent");
        }
        debug!(records = polygon_records, kept = regions.len(), "loaded shapefile regions");

        Ok(Self { regions })
    }

    /// Copy of this collection keeping regions whose extent intersects `bbox`.
    pub fn within(&self, bbox: &GeoBoundingBox) -> Self {
        let regions = self
            .regions
            .iter()
            .filter(|r| r.bbox().is_some_and(|extent| bbox.intersects(&extent)))
            .cloned()
            .collect();
        Self { regions }
    }

    /// Number of regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// True if there are no regions.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Iterate over regions in collection order.
    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    /// Look up a region by id.
    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    /// Id of the first region (in collection order) containing the point.
    ///
    /// With overlapping regions the earlier record wins.
    #[inline]
    pub fn locate(&self, lon: f64, lat: f64) -> Option<RegionId> {
        self.regions.iter().find(|r| r.contains(lon, lat)).map(|r| r.id)
    }

    /// Check if any region contains the point.
    #[inline]
    pub fn contains_any(&self, lon: f64, lat: f64) -> bool {
        self.regions.iter().any(|r| r.contains(lon, lat))
    }

    /// Get statistics about the loaded regions.
    pub fn statistics(&self) -> RegionStatistics {
        let mut polygon_count = 0;
        let mut total_vertices = 0;

        for region in &self.regions {
            for polygon in region.geometry.0.iter() {
                polygon_count += 1;
                total_vertices += polygon.exterior().0.len();
                for interior in polygon.interiors() {
                    total_vertices += interior.0.len();
                }
            }
        }

        let bbox = self
            .regions
            .iter()
            .filter_map(|r| r.bbox())
            .reduce(|a, b| {
                GeoBoundingBox::new(
                    a.min_lon.min(b.min_lon),
                    a.min_lat.min(b.min_lat),
                    a.max_lon.max(b.max_lon),
                    a.max_lat.max(b.max_lat),
                )
            });

        RegionStatistics {
            region_count: self.regions.len(),
            polygon_count,
            total_vertices,
            bbox,
        }
    }
}

/// Statistics about a region collection.
#[derive(Debug, Clone)]
pub struct RegionStatistics {
    /// Number of regions
    pub region_count: usize,
    /// Number of polygons across all regions
    pub polygon_count: usize,
    /// Total number of vertices
    pub total_vertices: usize,
    /// Combined extent, `None` if there is no geometry
    pub bbox: Option<GeoBoundingBox>,
}

impl fmt::Display for RegionStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Region Statistics:")?;
        writeln!(f, "  Regions: {}", self.region_count)?;
        writeln!(f, "  Polygons: {}", self.polygon_count)?;
        write!(f, "  Total vertices: {}", self.total_vertices)?;
        if let Some(bbox) = self.bbox {
            write!(
                f,
                "\n  Bounding box: lon [{:.4}, {:.4}], lat [{:.4}, {:.4}]",
                bbox.min_lon, bbox.max_lon, bbox.min_lat, bbox.max_lat
            )?;
        }
        Ok(())
    }
}

/// Convert shapefile rings into polygons.
///
/// Every outer ring starts a polygon. An inner ring becomes a hole of the
/// most recent outer ring that contains its first vertex, falling back to
/// the most recent outer ring.
fn rings_to_multipolygon<P>(
    rings: &[PolygonRing<P>],
    xy: impl Fn(&P) -> Coord<f64>,
) -> MultiPolygon<f64> {
    let mut shells: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();

    for ring in rings {
        let coords: Vec<Coord<f64>> = ring.points().iter().map(&xy).collect();
        if coords.len() < 3 {
            continue;
        }
        let line = LineString::from(coords);

        match ring {
            PolygonRing::Outer(_) => shells.push((line, Vec::new())),
            PolygonRing::Inner(_) => {
                let first = Point::from(line.0[0]);
                let owner = shells
                    .iter()
                    .rposition(|(exterior, _)| {
                        Polygon::new(exterior.clone(), vec![]).contains(&first)
                    })
                    .or_else(|| shells.len().checked_sub(1));
                match owner {
                    Some(k) => shells[k].1.push(line),
                    None => warn!("inner ring without an outer ring, ignored"),
                }
            }
        }
    }

    MultiPolygon(
        shells
            .into_iter()
            .map(|(exterior, interiors)| Polygon::new(exterior, interiors))
            .collect(),
    )
}

/// First non-empty name-like character field of a record.
fn record_name(record: &Record) -> Option<String> {
    NAME_FIELDS.iter().find_map(|field| match record.get(field) {
        Some(FieldValue::Character(Some(value))) if !value.trim().is_empty() => {
            Some(value.trim().to_string())
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ]])
    }

    #[test]
    fn test_locate() {
        let regions = Regions::from_polygons(vec![square(0.0, 0.0, 1.0), square(2.0, 0.0, 1.0)]);

        assert_eq!(regions.locate(0.5, 0.5), Some(RegionId::new(0)));
        assert_eq!(regions.locate(2.5, 0.5), Some(RegionId::new(1)));
        assert_eq!(regions.locate(1.5, 0.5), None);
        assert!(regions.contains_any(0.1, 0.9));
        assert!(!regions.contains_any(-0.1, 0.5));
    }

    #[test]
    fn test_boundary_point_is_outside() {
        let regions = Regions::from_polygons(vec![square(0.0, 0.0, 1.0)]);
        assert_eq!(regions.locate(1.0, 0.5), None);
        assert_eq!(regions.locate(0.0, 0.0), None);
    }

    #[test]
    fn test_first_region_wins_on_overlap() {
        let regions = Regions::from_polygons(vec![square(0.0, 0.0, 2.0), square(1.0, 1.0, 2.0)]);
        assert_eq!(regions.locate(1.5, 1.5), Some(RegionId::new(0)));
        assert_eq!(regions.locate(2.5, 2.5), Some(RegionId::new(1)));
    }

    #[test]
    fn test_within_keeps_ids() {
        let regions = Regions::from_polygons(vec![square(0.0, 0.0, 1.0), square(10.0, 10.0, 1.0)]);
        let near = regions.within(&GeoBoundingBox::new(9.0, 9.0, 12.0, 12.0));

        assert_eq!(near.len(), 1);
        assert_eq!(near.iter().next().unwrap().id(), RegionId::new(1));
        assert!(near.get(RegionId::new(0)).is_none());
    }

    #[test]
    fn test_rings_with_hole() {
        let outer = vec![
            shapefile::Point::new(0.0, 0.0),
            shapefile::Point::new(0.0, 4.0),
            shapefile::Point::new(4.0, 4.0),
            shapefile::Point::new(4.0, 0.0),
            shapefile::Point::new(0.0, 0.0),
        ];
        let inner = vec![
            shapefile::Point::new(1.0, 1.0),
            shapefile::Point::new(3.0, 1.0),
            shapefile::Point::new(3.0, 3.0),
            shapefile::Point::new(1.0, 3.0),
            shapefile::Point::new(1.0, 1.0),
        ];
        let rings = vec![PolygonRing::Outer(outer), PolygonRing::Inner(inner)];

        let geometry = rings_to_multipolygon(&rings, |p| Coord { x: p.x, y: p.y });
        assert_eq!(geometry.0.len(), 1);
        assert_eq!(geometry.0[0].interiors().len(), 1);

        let region = Region::new(RegionId::new(0), geometry);
        assert!(region.contains(0.5, 0.5));
        assert!(!region.contains(2.0, 2.0));
    }

    #[test]
    fn test_statistics() {
        let regions = Regions::from_polygons(vec![square(0.0, 0.0, 1.0), square(2.0, 3.0, 1.0)]);
        let stats = regions.statistics();

        assert_eq!(stats.region_count, 2);
        assert_eq!(stats.polygon_count, 2);
        assert_eq!(stats.total_vertices, 10);
        let bbox = stats.bbox.unwrap();
        assert_eq!(bbox, GeoBoundingBox::new(0.0, 0.0, 3.0, 4.0));
        assert!(format!("{}", stats).contains("Regions: 2"));
    }

    #[test]
    fn test_record_name_fields() {
        let text = |s: &str| FieldValue::Character(Some(s.to_string()));

        let mut state = Record::default();
        state.insert("STE_CODE21".to_string(), text("2"));
        state.insert("STE_NAME21".to_string(), text("Victoria "));
        assert_eq!(record_name(&state).as_deref(), Some("Victoria"));

        // Generic names win over boundary-specific ones
        state.insert("NAME".to_string(), text("VIC"));
        assert_eq!(record_name(&state).as_deref(), Some("VIC"));

        let mut unnamed = Record::default();
        unnamed.insert("NAME".to_string(), text("  "));
        unnamed.insert("AREA".to_string(), FieldValue::Numeric(Some(12.5)));
        assert_eq!(record_name(&unnamed), None);
    }

    #[test]
    fn test_missing_file() {
        assert!(Regions::load("does/not/exist.shp").is_err());
    }
}
