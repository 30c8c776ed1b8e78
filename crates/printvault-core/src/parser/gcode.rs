//! G-code toolpath summary.
//!
//! Tracks G0/G1 moves in absolute or relative mode (G90/G91, M82/M83) and
//! counts extruding moves.

use crate::catalog::{BoundingBox, ParsedAsset};
use regex::Regex;
use std::sync::LazyLock;

/// A letter followed by a number, e.g. `X12.5` or `E-0.8`.
static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z])\s*([-+]?(?:\d+\.?\d*|\.\d+))").unwrap());

/// Parenthesised inline comments.
static INLINE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^)]*\)").unwrap());

#[derive(Default)]
struct Machine {
    position: [f32; 3],
    extruder: f32,
    relative_moves: bool,
    relative_extrusion: bool,
}

pub(super) fn parse(bytes: &[u8]) -> Result<ParsedAsset, String> {
    let text = String::from_utf8_lossy(bytes);
    let mut machine = Machine::default();
    let mut moves: u64 = 0;
    let mut extrusions: u64 = 0;
    let mut bounds: Option<BoundingBox> = None;

    for line in text.lines() {
        let code = line.split(';').next().unwrap_or("");
        let code = INLINE_COMMENT.replace_all(code, "");

        let words: Vec<(char, f32)> = WORD
            .captures_iter(&code)
            .filter_map(|caps| {
                let letter = caps[1].chars().next()?.to_ascii_uppercase();
                let value = caps[2].parse::<f32>().ok()?;
                Some((letter, value))
            })
            .collect();

        let Some(&(command, number)) = words.first() else {
            continue;
        };
        let args = &words[1..];

        match (command, number as u32) {
            ('G', 0) | ('G', 1) => {
                let start = machine.position;
                let extruding = machine.apply_move(args);
                if machine.position != start {
                    moves += 1;
                    match bounds.as_mut() {
                        Some(b) => b.include(machine.position),
                        None => bounds = Some(BoundingBox::at(machine.position)),
                    }
                }
                if extruding {
                    extrusions += 1;
                }
            }
            ('G', 90) => machine.relative_moves = false,
            ('G', 91) => machine.relative_moves = true,
            ('G', 92) => machine.set_position(args),
            ('M', 82) => machine.relative_extrusion = false,
            ('M', 83) => machine.relative_extrusion = true,
            _ => {}
        }
    }

    if moves == 0 {
        return Err("no motion commands".to_string());
    }

    Ok(ParsedAsset {
        vertex_count: moves,
        element_count: extrusions,
        bounds,
    })
}

impl Machine {
    /// Apply a G0/G1 and report whether it extruded filament.
    fn apply_move(&mut self, args: &[(char, f32)]) -> bool {
        let mut extruded = false;
        for &(letter, value) in args {
            match letter {
                'X' | 'Y' | 'Z' => {
                    let axis = (letter as u8 - b'X') as usize;
                    if self.relative_moves {
                        self.position[axis] += value;
                    } else {
                        self.position[axis] = value;
                    }
                }
                'E' => {
                    let delta = if self.relative_extrusion || self.relative_moves {
                        value
                    } else {
                        value - self.extruder
                    };
                    self.extruder += delta;
                    extruded = delta > 0.0;
                }
                _ => {}
            }
        }
        extruded
    }

    fn set_position(&mut self, args: &[(char, f32)]) {
        for &(letter, value) in args {
            match letter {
                'X' | 'Y' | 'Z' => self.position[(letter as u8 - b'X') as usize] = value,
                'E' => self.extruder = value,
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_moves() {
        let gcode = "; square
G90
M82
G92 E0
G0 X0 Y0 Z0.5
G1 X20 Y0 E1.0
G1 X20 Y20 E2.0 ; side two
G1 X0 Y20 E3.0
G1 X0 Y0 E4.0
G0 Z5 (lift)
";
        let asset = parse(gcode.as_bytes()).unwrap();

        assert_eq!(asset.vertex_count, 6);
        assert_eq!(asset.element_count, 4);
        assert_eq!(asset.bounds.unwrap().dimensions(), [20.0, 20.0, 4.5]);
    }

    #[test]
    fn test_relative_moves() {
        let gcode = "G91\nM83\nG1 X5 E0.5\nG1 X5 E0.5\nG1 Y-3 E-1\n";
        let asset = parse(gcode.as_bytes()).unwrap();

        assert_eq!(asset.vertex_count, 3);
        assert_eq!(asset.element_count, 2);
        let bounds = asset.bounds.unwrap();
        assert_eq!(bounds.min, [5.0, -3.0, 0.0]);
        assert_eq!(bounds.max, [10.0, 0.0, 0.0]);
    }

    #[test]
    fn test_retraction_is_not_extrusion() {
        let gcode = "G1 X1 E1\nG1 X2 E0.5\n";
        let asset = parse(gcode.as_bytes()).unwrap();
        assert_eq!(asset.element_count, 1);
    }

    #[test]
    fn test_no_moves() {
        assert!(parse(b"; just a comment\nM104 S200\n").is_err());
    }
}
