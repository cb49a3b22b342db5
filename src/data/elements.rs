//! Element feed ingestion
//!
//! Reads a cleaned three-line element file (name line followed by the two
//! data lines) into raw elements. Cleaning of formatting noise happens
//! upstream; this loader only groups lines and skips a structurally short
//! trailing group.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// One raw orbital element as published: object name plus the two
/// fixed-format data lines. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawElement {
    pub name: String,
    pub line1: String,
    pub line2: String,
}

impl RawElement {
    pub fn new(name: &str, line1: &str, line2: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            line1: line1.to_string(),
            line2: line2.to_string(),
        }
    }
}

/// Load raw elements from a three-line element file.
pub fn load_elements(path: impl AsRef<Path>) -> Result<Vec<RawElement>> {
    let path = path.as_ref();
    log::info!("Loading elements from {:?}", path);

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read element file: {:?}", path))?;

    let elements = parse_elements(&text);
    log::info!("Loaded {} elements", elements.len());

    Ok(elements)
}

/// Group the feed text into name/line1/line2 triplets.
///
/// Lines starting with '1 ' and '2 ' are data lines; the preceding
/// non-data line is the name. A trailing incomplete group is dropped.
pub fn parse_elements(text: &str) -> Vec<RawElement> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();

    let mut elements = Vec::new();
    let mut i = 0;
    // Need a name line plus both data lines.
    while i + 3 <= lines.len() {
        let (name, l1, l2) = (lines[i], lines[i + 1], lines[i + 2]);
        if l1.starts_with("1 ") && l2.starts_with("2 ") {
            elements.push(RawElement::new(name, l1, l2));
            i += 3;
        } else {
            i += 1;
        }
    }

    elements
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISS_NAME: &str = "ISS (ZARYA)";
    const ISS_L1: &str = "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
    const ISS_L2: &str = "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";

    #[test]
    fn test_parse_single_element() {
        let text = format!("{}\n{}\n{}\n", ISS_NAME, ISS_L1, ISS_L2);
        let elements = parse_elements(&text);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].name, "ISS (ZARYA)");
        assert_eq!(elements[0].line1, ISS_L1);
    }

    #[test]
    fn test_parse_skips_trailing_incomplete_group() {
        let text = format!("{}\n{}\n{}\nORPHAN NAME\n{}\n", ISS_NAME, ISS_L1, ISS_L2, ISS_L1);
        let elements = parse_elements(&text);
        assert_eq!(elements.len(), 1);
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_elements("").is_empty());
        assert!(parse_elements("\n\n").is_empty());
    }
}
