//! Catalog data types.

use serde::{Deserialize, Serialize};

/// Identifier assigned by the repository on insert.
pub type CatalogId = i64;

/// Axis-aligned bounds of a model or toolpath.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoundingBox {
    /// Degenerate box around a single point.
    pub fn at(point: [f32; 3]) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// Smallest box containing every point, or `None` for no points.
    pub fn from_points(points: impl IntoIterator<Item = [f32; 3]>) -> Option<Self> {
        let mut points = points.into_iter();
        let mut bounds = Self::at(points.next()?);
        for point in points {
            bounds.include(point);
        }
        Some(bounds)
    }

    /// Grow the box to contain `point`.
    pub fn include(&mut self, point: [f32; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(point[axis]);
            self.max[axis] = self.max[axis].max(point[axis]);
        }
    }

    /// Width, depth and height.
    pub fn dimensions(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}

/// Result of parsing a model or toolpath file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedAsset {
    /// Vertices (mesh formats) or move endpoints (G-code).
    pub vertex_count: u64,
    /// Triangles/faces (mesh formats) or extruding moves (G-code).
    pub element_count: u64,
    pub bounds: Option<BoundingBox>,
}

impl ParsedAsset {
    /// Statistics kept on the catalog record.
    pub fn summary(&self) -> AssetSummary {
        AssetSummary {
            vertex_count: self.vertex_count,
            element_count: self.element_count,
            dimensions: self.bounds.map(|b| b.dimensions()),
            bounds: self.bounds,
        }
    }
}

/// Summary statistics copied out of a [`ParsedAsset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSummary {
    pub vertex_count: u64,
    pub element_count: u64,
    pub dimensions: Option<[f32; 3]>,
    pub bounds: Option<BoundingBox>,
}

/// A catalogued model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    /// Set by the repository; `None` before insert.
    pub id: Option<CatalogId>,
    pub hash: String,
    /// Display name, the source file stem.
    pub name: String,
    pub source_path: String,
    pub extension: String,
    pub file_size: u64,
    pub summary: AssetSummary,
    /// Committed blob location when the file was copied into the store.
    #[serde(default)]
    pub blob_path: Option<String>,
    /// RFC 3339 timestamp.
    pub added_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_from_points() {
        let bounds =
            BoundingBox::from_points([[0.0, 0.0, 0.0], [10.0, -2.0, 1.0], [3.0, 4.0, 5.0]])
                .unwrap();

        assert_eq!(bounds.min, [0.0, -2.0, 0.0]);
        assert_eq!(bounds.max, [10.0, 4.0, 5.0]);
        assert_eq!(bounds.dimensions(), [10.0, 6.0, 5.0]);
    }

    #[test]
    fn test_bounding_box_empty() {
        assert!(BoundingBox::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_summary_carries_dimensions() {
        let asset = ParsedAsset {
            vertex_count: 36,
            element_count: 12,
            bounds: Some(BoundingBox {
                min: [0.0; 3],
                max: [20.0, 20.0, 20.0],
            }),
        };

        let summary = asset.summary();
        assert_eq!(summary.vertex_count, 36);
        assert_eq!(summary.element_count, 12);
        assert_eq!(summary.dimensions, Some([20.0, 20.0, 20.0]));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = CatalogRecord {
            id: Some(7),
            hash: "abcdef1234567890".into(),
            name: "benchy".into(),
            source_path: "/models/benchy.stl".into(),
            extension: "stl".into(),
            file_size: 1024,
            summary: AssetSummary::default(),
            blob_path: None,
            added_at: "2026-01-01T00:00:00+00:00".into(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["sourcePath"], "/models/benchy.stl");
        assert_eq!(json["fileSize"], 1024);
    }
}
