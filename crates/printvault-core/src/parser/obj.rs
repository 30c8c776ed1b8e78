//! Wavefront OBJ geometry counts.

use super::parse_point;
use crate::catalog::{BoundingBox, ParsedAsset};

pub(super) fn parse(bytes: &[u8]) -> Result<ParsedAsset, String> {
    let text = String::from_utf8_lossy(bytes);
    let mut points = Vec::new();
    let mut faces: u64 = 0;

    for (line_no, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let point = parse_point(&mut tokens)
                    .map_err(|e| format!("line {}: {}", line_no + 1, e))?;
                points.push(point);
            }
            Some("f") => faces += 1,
            _ => {}
        }
    }

    if points.is_empty() {
        return Err("no vertices".to_string());
    }

    Ok(ParsedAsset {
        vertex_count: points.len() as u64,
        element_count: faces,
        bounds: BoundingBox::from_points(points),
    })
}
