//! Flat keyword criteria, translated straight into a query block.

use chrono::NaiveDateTime;
use helio_attr::{Block, FieldPath};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as Json;

use crate::error::{Error, Result};
use crate::time::{format_time, parse_time};

static RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d+)?)(?:\s*-\s*(\d+(?:\.\d+)?))?(?:\s*([a-zA-Z]+))?\s*$").unwrap()
});

/// Keyword criteria in the style of the IDL client, e.g. `instrument`,
/// `start_date`, `wave = "171 - 195 Angstrom"`.
///
/// Keys are applied in insertion order. Each key resolves, possibly through
/// an alias, to one or more block fields; `a_b` addresses `a.b`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyQuery {
    criteria: Vec<(String, String)>,
}

impl LegacyQuery {
    pub fn new() -> Self { Self::default() }

    /// Criteria restricted to `[start, end]`.
    pub fn between(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self::new()
            .with("time_start", format_time(&start))
            .with("time_end", format_time(&end))
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.criteria.push((key.into(), value.into()));
        self
    }

    pub fn criteria(&self) -> &[(String, String)] { &self.criteria }

    /// Fill a copy of `template`. Every resolved field must exist in the
    /// template and may be assigned once.
    pub fn to_block(&self, template: &Block) -> Result<Block> {
        let mut block = template.clone();
        for (key, value) in &self.criteria {
            for (field, value) in resolve(key, value)? {
                let value = if field.starts_with("time") {
                    format_time(&parse_time(&value)?)
                } else {
                    value
                };
                let slot = block
                    .slot(&FieldPath::new(field.split('_')))
                    .ok_or_else(|| Error::UnexpectedArgument(key.clone()))?;
                if !is_blank(slot) {
                    return Err(Error::MultipleValues(field));
                }
                *slot = Json::String(value);
            }
        }
        Ok(block)
    }
}

fn is_blank(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Target fields of a legacy key.
fn resolve(key: &str, value: &str) -> Result<Vec<(String, String)>> {
    let field = match key {
        "wave" => return parse_wave_range(value),
        "date" => return parse_date_range(value),
        "wave_min" | "min_wave" => "wave_wavemin",
        "wave_max" | "max_wave" => "wave_wavemax",
        "wave_type" | "type_wave" => "wave_wavetype",
        "wave_unit" | "unit_wave" => "wave_waveunit",
        "inst" | "telescope" => "instrument",
        "spacecraft" | "observatory" => "source",
        "start_date" | "start" => "time_start",
        "end_date" | "end" => "time_end",
        "near_time" => "time_near",
        "layout" => "datatype",
        other => other,
    };
    Ok(vec![(field.to_string(), value.to_string())])
}

/// `"(min) - (max) (unit)"`; a single number means `min == max` and the unit
/// defaults to Angstrom.
fn parse_wave_range(value: &str) -> Result<Vec<(String, String)>> {
    let caps = RANGE
        .captures(value)
        .ok_or_else(|| Error::InvalidWave(value.to_string()))?;
    let min = caps.get(1).map_or("", |m| m.as_str());
    let max = caps.get(2).map_or(min, |m| m.as_str());
    let unit = caps.get(3).map_or("Angstrom", |m| m.as_str());
    Ok(vec![
        ("wave_wavemin".to_string(), min.to_string()),
        ("wave_wavemax".to_string(), max.to_string()),
        ("wave_waveunit".to_string(), unit.to_string()),
    ])
}

/// `"(start) - (end)"`.
fn parse_date_range(value: &str) -> Result<Vec<(String, String)>> {
    let (start, end) = value
        .split_once(" - ")
        .ok_or_else(|| Error::InvalidTime(value.to_string()))?;
    Ok(vec![
        ("time_start".to_string(), start.trim().to_string()),
        ("time_end".to_string(), end.trim().to_string()),
    ])
}
