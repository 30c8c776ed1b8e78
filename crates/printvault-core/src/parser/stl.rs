//! STL, binary and ASCII.

use super::parse_point;
use crate::catalog::{BoundingBox, ParsedAsset};

const HEADER_LEN: usize = 80;
const TRIANGLE_LEN: usize = 50;

pub(super) fn parse(bytes: &[u8]) -> Result<ParsedAsset, String> {
    if let Some(count) = binary_triangle_count(bytes) {
        return parse_binary(bytes, count);
    }

    if looks_ascii(bytes) {
        return parse_ascii(&String::from_utf8_lossy(bytes));
    }

    Err("not a valid binary or ASCII STL".to_string())
}

/// Triangle count if the buffer is exactly the size a binary STL declares.
fn binary_triangle_count(bytes: &[u8]) -> Option<usize> {
    let count_bytes: [u8; 4] = bytes.get(HEADER_LEN..HEADER_LEN + 4)?.try_into().ok()?;
    let count = u32::from_le_bytes(count_bytes) as usize;
    let expected = count.checked_mul(TRIANGLE_LEN)?.checked_add(HEADER_LEN + 4)?;
    (expected == bytes.len()).then_some(count)
}

fn looks_ascii(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(b"solid")
}

fn parse_binary(bytes: &[u8], count: usize) -> Result<ParsedAsset, String> {
    if count == 0 {
        return Err("no triangles".to_string());
    }

    let mut bounds: Option<BoundingBox> = None;
    for triangle in bytes[HEADER_LEN + 4..].chunks_exact(TRIANGLE_LEN) {
        // Skip the 12-byte normal, then three vertices of three f32.
        for vertex in triangle[12..48].chunks_exact(12) {
            let point = [
                read_f32(&vertex[0..4]),
                read_f32(&vertex[4..8]),
                read_f32(&vertex[8..12]),
            ];
            match bounds.as_mut() {
                Some(b) => b.include(point),
                None => bounds = Some(BoundingBox::at(point)),
            }
        }
    }

    Ok(ParsedAsset {
        vertex_count: count as u64 * 3,
        element_count: count as u64,
        bounds,
    })
}

fn parse_ascii(text: &str) -> Result<ParsedAsset, String> {
    let mut facets: u64 = 0;
    let mut points = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("facet") => facets += 1,
            Some("vertex") => {
                let point = parse_point(&mut tokens)
                    .map_err(|e| format!("line {}: {}", line_no + 1, e))?;
                points.push(point);
            }
            _ => {}
        }
    }

    if facets == 0 || points.is_empty() {
        return Err("no facets".to_string());
    }

    Ok(ParsedAsset {
        vertex_count: points.len() as u64,
        element_count: facets,
        bounds: BoundingBox::from_points(points),
    })
}

fn read_f32(bytes: &[u8]) -> f32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    f32::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_stl(triangles: &[[[f32; 3]; 3]]) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
        for triangle in triangles {
            bytes.extend_from_slice(&[0u8; 12]);
            for vertex in triangle {
                for coord in vertex {
                    bytes.extend_from_slice(&coord.to_le_bytes());
                }
            }
            bytes.extend_from_slice(&[0u8; 2]);
        }
        bytes
    }

    #[test]
    fn test_binary_stl() {
        let bytes = binary_stl(&[
            [[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 5.0, 0.0]],
            [[0.0, 0.0, 2.0], [10.0, 0.0, 2.0], [0.0, 5.0, 2.0]],
        ]);

        let asset = parse(&bytes).unwrap();
        assert_eq!(asset.element_count, 2);
        assert_eq!(asset.vertex_count, 6);
        assert_eq!(asset.bounds.unwrap().dimensions(), [10.0, 5.0, 2.0]);
    }

    #[test]
    fn test_binary_stl_header_starting_with_solid() {
        let mut bytes = binary_stl(&[[[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]]);
        bytes[..5].copy_from_slice(b"solid");

        let asset = parse(&bytes).unwrap();
        assert_eq!(asset.element_count, 1);
    }

    #[test]
    fn test_ascii_stl() {
        let text = "solid tri
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 4 0 0
      vertex 0 3 1.5
    endloop
  endfacet
endsolid tri
";
        let asset = parse(text.as_bytes()).unwrap();
        assert_eq!(asset.element_count, 1);
        assert_eq!(asset.vertex_count, 3);
        assert_eq!(asset.bounds.unwrap().dimensions(), [4.0, 3.0, 1.5]);
    }

    #[test]
    fn test_ascii_stl_bad_vertex() {
        let text = "solid x\nfacet normal 0 0 1\nvertex 0 zero 0\nendsolid x\n";
        let err = parse(text.as_bytes()).unwrap_err();
        assert!(err.contains("line 3"));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse(b"definitely not a mesh").is_err());
        assert!(parse(b"solid empty\nendsolid empty\n").is_err());
    }
}
