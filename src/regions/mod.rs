//! District → administrative region lookup for Belo Horizonte.
//!
//! The table ships embedded in the binary (`districts.json`) and is parsed
//! once into a read-only static. A different table can be loaded from disk.

use crate::error::ScoutError;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

static EMBEDDED: Lazy<DistrictResolver> = Lazy::new(|| {
    DistrictResolver::from_json(include_str!("districts.json"))
        .expect("embedded district table is valid JSON")
});

#[derive(Debug, Deserialize)]
struct RegionEntry {
    regional: String,
    districts: Vec<String>,
}

/// Maps district names to one of the city's regions, exact match first and
/// closest name otherwise.
#[derive(Debug, Clone)]
pub struct DistrictResolver {
    /// (normalized district, region) in table order
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl DistrictResolver {
    /// The table compiled into the binary
    pub fn embedded() -> &'static DistrictResolver {
        &EMBEDDED
    }

    /// `loaded` when present, the embedded table otherwise
    pub fn or_embedded(loaded: Option<&DistrictResolver>) -> &DistrictResolver {
        loaded.unwrap_or_else(|| Self::embedded())
    }

    /// Load a replacement table; an unreadable, malformed or empty file is a
    /// configuration error
    pub fn from_path(path: &Path) -> Result<Self, ScoutError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ScoutError::config(format!("cannot read district table {}: {e}", path.display()))
        })?;
        let resolver = Self::from_json(&json).map_err(|e| {
            ScoutError::config(format!("invalid district table {}: {e}", path.display()))
        })?;
        if resolver.is_empty() {
            return Err(ScoutError::config(format!(
                "district table {} has no districts",
                path.display()
            )));
        }

        info!(
            path = %path.display(),
            districts = resolver.len(),
            regions = resolver.regions().len(),
            "Loaded district table"
        );
        Ok(resolver)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let regions: Vec<RegionEntry> = serde_json::from_str(json)?;

        let mut entries = Vec::new();
        let mut index = HashMap::new();
        for region in regions {
            for district in region.districts {
                let key = normalize_district(&district);
                if key.is_empty() || index.contains_key(&key) {
                    continue;
                }
                index.insert(key.clone(), entries.len());
                entries.push((key, region.regional.clone()));
            }
        }

        Ok(Self { entries, index })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct region names in table order
    pub fn regions(&self) -> Vec<&str> {
        let mut regions: Vec<&str> = Vec::new();
        for (_, region) in &self.entries {
            if !regions.contains(&region.as_str()) {
                regions.push(region);
            }
        }
        regions
    }

    /// Region for a raw district name. Only `None` for blank input or an
    /// empty table; unknown names go to the most similar known district, the
    /// earliest one in table order on ties.
    pub fn resolve(&self, district: &str) -> Option<&str> {
        let key = normalize_district(district);
        if key.is_empty() {
            return None;
        }

        if let Some(&i) = self.index.get(&key) {
            return Some(&self.entries[i].1);
        }

        let mut best: Option<(usize, f64)> = None;
        for (i, (known, _)) in self.entries.iter().enumerate() {
            let score = strsim::normalized_levenshtein(&key, known);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((i, score));
            }
        }

        best.map(|(i, score)| {
            let (known, region) = &self.entries[i];
            debug!(district = %key, matched = %known, score, "Fuzzy district match");
            region.as_str()
        })
    }
}

/// ASCII, title case, no parenthetical notes: "funcionários (centro)" → "Funcionarios"
pub fn normalize_district(raw: &str) -> String {
    let mut folded = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            _ => {
                if let Some(ascii) = fold_ascii(c) {
                    folded.push(ascii);
                }
            }
        }
    }

    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    title_case(&collapsed)
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.chars() {
        if c.is_ascii_alphabetic() {
            if prev_alpha {
                out.push(c.to_ascii_lowercase());
            } else {
                out.push(c.to_ascii_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

fn fold_ascii(c: char) -> Option<char> {
    if c.is_ascii() {
        return Some(c);
    }
    let folded = match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        '\u{a0}' => ' ',
        _ => return None,
    };
    Some(folded)
}
