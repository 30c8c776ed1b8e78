//! Built-in content parsers.
//!
//! [`BasicParser`] covers the formats the catalog accepts out of the box. Each
//! submodule reports failures as plain messages; they are wrapped into
//! `CatalogError::Parse` here.

mod gcode;
mod obj;
mod stl;

use crate::catalog::{ContentParser, ParsedAsset};
use crate::{CatalogError, Result};

/// Extensions [`BasicParser`] understands, lowercase.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["stl", "obj", "gcode", "gco", "g"];

/// Default parser for STL, OBJ and G-code.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicParser;

impl BasicParser {
    pub fn new() -> Self {
        Self
    }

    /// Whether `extension` (any case, optional leading dot) is supported.
    pub fn supports(extension: &str) -> bool {
        let extension = extension.strip_prefix('.').unwrap_or(extension);
        SUPPORTED_EXTENSIONS
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}

impl ContentParser for BasicParser {
    fn parse(&self, bytes: &[u8], extension: &str) -> Result<ParsedAsset> {
        if bytes.is_empty() {
            return Err(CatalogError::parse(extension, "file is empty"));
        }

        let parsed = match extension {
            "stl" => stl::parse(bytes),
            "obj" => obj::parse(bytes),
            "gcode" | "gco" | "g" => gcode::parse(bytes),
            _ => Err("unsupported format".to_string()),
        };

        parsed.map_err(|message| CatalogError::parse(extension, message))
    }
}

/// Read three coordinates from the remaining tokens of a line.
fn parse_point<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
) -> std::result::Result<[f32; 3], String> {
    let mut point = [0.0f32; 3];
    for (axis, name) in ["x", "y", "z"].iter().enumerate() {
        let token = tokens.next().ok_or_else(|| format!("missing {}", name))?;
        point[axis] = token
            .parse::<f32>()
            .map_err(|_| format!("invalid {} '{}'", name, token))?;
    }
    Ok(point)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports() {
        assert!(BasicParser::supports("stl"));
        assert!(BasicParser::supports(".GCODE"));
        assert!(!BasicParser::supports("3mf"));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = BasicParser.parse(b"PK\x03\x04", "3mf").unwrap_err();
        assert!(matches!(err, CatalogError::Parse { .. }));
        assert!(err.to_string().contains("unsupported format"));
    }

    #[test]
    fn test_empty_input() {
        let err = BasicParser.parse(b"", "stl").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_dispatch_obj() {
        let asset = BasicParser
            .parse(b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n", "obj")
            .unwrap();
        assert_eq!(asset.vertex_count, 3);
        assert_eq!(asset.element_count, 1);
    }
}
