//! Geographic bounding boxes.
//!
//! Used to skip shapefile regions that cannot touch the dataset grid
//! before any point-in-polygon work is done.

use geo::Rect;

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBoundingBox {
    /// Minimum longitude (western edge) in degrees
    pub min_lon: f64,
    /// Minimum latitude (southern edge) in degrees
    pub min_lat: f64,
    /// Maximum longitude (eastern edge) in degrees
    pub max_lon: f64,
    /// Maximum latitude (northern edge) in degrees
    pub max_lat: f64,
}

impl GeoBoundingBox {
    /// Create a new bounding box.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Bounding box of a `geo` rectangle (x = lon, y = lat).
    pub fn from_rect(rect: &Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }

    /// Check if two boxes share any area or edge.
    pub fn intersects(&self, other: &GeoBoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn test_intersects() {
        let a = GeoBoundingBox::new(0.0, 0.0, 2.0, 2.0);
        let b = GeoBoundingBox::new(1.0, 1.0, 3.0, 3.0);
        let c = GeoBoundingBox::new(5.0, 5.0, 6.0, 6.0);
        let touching = GeoBoundingBox::new(2.0, 0.0, 4.0, 2.0);

        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
        assert!(a.intersects(&touching));
    }

    #[test]
    fn test_from_rect() {
        let rect = Rect::new(coord! { x: 140.0, y: -38.0 }, coord! { x: 150.0, y: -28.0 });
        let bbox = GeoBoundingBox::from_rect(&rect);
        assert_eq!(bbox, GeoBoundingBox::new(140.0, -38.0, 150.0, -28.0));
    }
}
