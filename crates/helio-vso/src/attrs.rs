//! Search attributes understood by the archive, and the converter that
//! writes them into query blocks.
//!
//! ```
//! use chrono::NaiveDate;
//! use helio_vso::attrs::{Instrument, Time};
//!
//! let day = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
//! let query = helio_attr::Attr::from(Time::new(day.and_hms_opt(0, 0, 0).unwrap(), day.and_hms_opt(1, 0, 0).unwrap()))
//!     .and(Instrument::new("eit") | Instrument::new("aia"))
//!     .unwrap();
//! assert_eq!(query.disjuncts().len(), 2);
//! ```

use chrono::NaiveDateTime;
use helio_attr::{Attr, AttrType, Block, Value, ValueAttr, WalkError, Walker};
use serde_json::{Value as Json, json};

use crate::error::Result;
use crate::time::{format_time, parse_time};
use crate::units::to_angstrom;

pub const TIME: AttrType = AttrType::new("time");
pub const WAVE: AttrType = AttrType::new("wave");
pub const EXTENT: AttrType = AttrType::new("extent");
pub const FIELD: AttrType = AttrType::new("field");
pub const SAMPLE: AttrType = AttrType::new("sample");
pub const QUICKLOOK: AttrType = AttrType::new("quicklook");

/// Generates single-field string attributes.
macro_rules! simple_attrs {
    ($($(#[$doc:meta])* $name:ident => $ty:ident, $field:literal;)*) => {
        $(
            pub const $ty: AttrType = AttrType::new($field);

            $(#[$doc])*
            #[derive(Debug, Clone, PartialEq, Eq)]
            pub struct $name(pub String);

            impl $name {
                pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
            }

            impl From<$name> for Attr {
                fn from(attr: $name) -> Self {
                    ValueAttr::typed($ty, [($field, attr.0)]).exclusive().into()
                }
            }

            impl<T: Into<Attr>> std::ops::BitOr<T> for $name {
                type Output = Attr;

                fn bitor(self, rhs: T) -> Attr { Attr::from(self) | rhs }
            }
        )*

        const SIMPLE: &[AttrType] = &[$($ty),*];
    };
}

simple_attrs! {
    /// Data provider, e.g. `SDAC`.
    Provider => PROVIDER, "provider";
    /// Spacecraft or observatory, e.g. `SOHO`.
    Source => SOURCE, "source";
    Instrument => INSTRUMENT, "instrument";
    /// Physical observable.
    Physobj => PHYSOBJ, "physobj";
    Detector => DETECTOR, "detector";
    Filter => FILTER, "filter";
    Level => LEVEL, "level";
    Pixels => PIXELS, "pixels";
    Resolution => RESOLUTION, "resolution";
    /// Pixel scale in arcseconds.
    PScale => PSCALE, "pscale";
    /// Layout of the data product: image, spectrum, time series...
    Layout => LAYOUT, "datatype";
}

/// Observation time window, optionally asking for the record closest to
/// `near`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Time {
    pub start: NaiveDateTime,
    pub end:   NaiveDateTime,
    pub near:  Option<NaiveDateTime>,
}

impl Time {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self { Self { start, end, near: None } }

    pub fn parse(start: &str, end: &str) -> Result<Self> { Ok(Self::new(parse_time(start)?, parse_time(end)?)) }

    #[must_use]
    pub fn near(mut self, near: NaiveDateTime) -> Self {
        self.near = Some(near);
        self
    }
}

impl From<Time> for Attr {
    fn from(time: Time) -> Self {
        let mut fields = vec![("time.start", Value::Time(time.start)), ("time.end", Value::Time(time.end))];
        match time.near {
            Some(near) => {
                fields.push(("time.near", Value::Time(near)));
                ValueAttr::typed(TIME, fields).exclusive().into()
            }
            None => ValueAttr::typed(TIME, fields)
                .exclusive()
                .with_bounds("time.start", "time.end")
                .into(),
        }
    }
}

/// Spectral range, stored in Angstrom with `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wave {
    min: f64,
    max: f64,
}

impl Wave {
    /// Convert both ends from `unit` (length, energy or frequency).
    pub fn new(min: f64, max: f64, unit: &str) -> Result<Self> {
        Ok(Self::angstrom(to_angstrom(min, unit)?, to_angstrom(max, unit)?))
    }

    pub fn angstrom(a: f64, b: f64) -> Self {
        if b < a { Self { min: b, max: a } } else { Self { min: a, max: b } }
    }

    pub fn min(&self) -> f64 { self.min }

    pub fn max(&self) -> f64 { self.max }
}

impl From<Wave> for Attr {
    fn from(wave: Wave) -> Self {
        ValueAttr::typed(WAVE, [
            ("wave.wavemin", Value::Float(wave.min)),
            ("wave.wavemax", Value::Float(wave.max)),
            ("wave.waveunit", Value::from("Angstrom")),
        ])
        .exclusive()
        .with_bounds("wave.wavemin", "wave.wavemax")
        .into()
    }
}

/// Region of the solar disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Extent {
    pub x:      f64,
    pub y:      f64,
    pub width:  f64,
    pub length: f64,
    pub kind:   String,
}

impl From<Extent> for Attr {
    fn from(extent: Extent) -> Self {
        ValueAttr::typed(EXTENT, [
            ("extent.x", Value::Float(extent.x)),
            ("extent.y", Value::Float(extent.y)),
            ("extent.width", Value::Float(extent.width)),
            ("extent.length", Value::Float(extent.length)),
            ("extent.type", Value::Str(extent.kind)),
        ])
        .exclusive()
        .into()
    }
}

/// Extra record field to return. Several may be requested at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field(pub String);

impl Field {
    pub fn new(name: impl Into<String>) -> Self { Self(name.into()) }
}

impl From<Field> for Attr {
    fn from(field: Field) -> Self { ValueAttr::typed(FIELD, [("field.fielditem", field.0)]).into() }
}

/// Return at most one record per this many seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample(pub f64);

impl From<Sample> for Attr {
    fn from(sample: Sample) -> Self { ValueAttr::typed(SAMPLE, [("sample", sample.0)]).exclusive().into() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quicklook(pub bool);

impl From<Quicklook> for Attr {
    fn from(quicklook: Quicklook) -> Self {
        ValueAttr::typed(QUICKLOOK, [("quicklook", quicklook.0)]).exclusive().into()
    }
}

macro_rules! bitor_into_attr {
    ($($name:ty),*) => {
        $(
            impl<T: Into<Attr>> std::ops::BitOr<T> for $name {
                type Output = Attr;

                fn bitor(self, rhs: T) -> Attr { Attr::from(self) | rhs }
            }
        )*
    };
}

bitor_into_attr!(Time, Wave, Extent, Field, Sample, Quicklook);

fn wire_value(value: &Value) -> Json {
    match value {
        Value::Time(t) => Json::from(format_time(t)),
        other => other.to_json(),
    }
}

fn apply_fields(_: &Walker<Block>, leaf: &ValueAttr, _: &Block, block: &mut Block) -> std::result::Result<(), WalkError> {
    for (path, value) in leaf.fields() {
        block.set(path, wire_value(value));
    }
    Ok(())
}

fn apply_field_items(_: &Walker<Block>, leaf: &ValueAttr, _: &Block, block: &mut Block) -> std::result::Result<(), WalkError> {
    for (path, value) in leaf.fields() {
        block.push(path, wire_value(value));
    }
    Ok(())
}

/// Converter for every attribute in this module plus untyped leaves. The
/// context is the block skeleton that each new block starts from.
pub fn walker() -> Walker<Block> {
    let mut walker = Walker::dnf(Block::clone);
    for ty in [AttrType::VALUE, TIME, WAVE, EXTENT, SAMPLE, QUICKLOOK]
        .into_iter()
        .chain(SIMPLE.iter().copied())
    {
        walker.add_applier(ty, apply_fields);
    }
    walker.add_applier(FIELD, apply_field_items);
    walker
}

/// Request skeleton with every field the archive accepts left blank.
pub fn query_block() -> Block {
    let skeleton = json!({
        "time": {"start": "", "end": "", "near": ""},
        "provider": "",
        "source": "",
        "instrument": "",
        "physobj": "",
        "detector": "",
        "filter": "",
        "level": "",
        "pixels": "",
        "resolution": "",
        "pscale": "",
        "datatype": "",
        "sample": "",
        "quicklook": "",
        "extent": {"x": "", "y": "", "width": "", "length": "", "type": ""},
        "wave": {"wavemin": "", "wavemax": "", "waveunit": "", "wavetype": ""},
        "field": {"fielditem": ""},
    });
    Block::from_json(skeleton).unwrap_or_default()
}
