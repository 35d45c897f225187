//! Meter drivers.
//!
//! A driver is a static table of fields. Each field names the record it is
//! read from, the unit its value is kept in and how it is printed. The
//! generic [`TableDriver`] walks that table for every telegram, so adding a
//! meter type means adding a table and a line in the registry.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::models::{LinkMode, MeterInfo, PrintProperties};
use crate::units::{self, Quantity, Unit};
use crate::wmbus::resolver::{resolve, FieldSelector};
use crate::wmbus::structs::Telegram;
use crate::wmbus::value_decoder::decode;

pub mod multical21;
pub mod sharky_tch;

pub type FieldId = usize;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("No driver named {0}")]
    UnknownDriver(String),
}

/// One output of a driver and the record feeding it.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub quantity: Quantity,
    /// Unit the decoded value is stored in.
    pub unit: Unit,
    pub selector: FieldSelector,
    pub description: &'static str,
    /// Text attached to the telegram dump next to the value.
    pub explanation: &'static str,
    pub properties: PrintProperties,
}

pub struct DriverDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub media: &'static str,
    pub link_modes: &'static [LinkMode],
    pub fields: &'static [FieldSpec],
}

/// A named, quantity typed output of a meter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrintSpec {
    pub name: String,
    pub quantity: Quantity,
    pub unit: Unit,
    pub field: FieldId,
    pub description: String,
    pub properties: PrintProperties,
}

/// State every meter carries, independent of its type.
pub struct MeterCommon {
    info: MeterInfo,
    media: String,
    link_modes: Vec<LinkMode>,
    prints: Vec<PrintSpec>,
    slots: Vec<f64>,
    updated: Option<DateTime<Utc>>,
}

impl MeterCommon {
    pub fn new(info: MeterInfo, media: &str) -> Self {
        return MeterCommon {
            info,
            media: media.to_string(),
            link_modes: Vec::new(),
            prints: Vec::new(),
            slots: Vec::new(),
            updated: None,
        };
    }

    pub fn add_link_mode(&mut self, mode: LinkMode) {
        if !self.link_modes.contains(&mode) {
            self.link_modes.push(mode);
        }
    }

    /// Registers an output backed by a new field slot starting at zero.
    pub fn add_print(&mut self, name: &str, quantity: Quantity, unit: Unit, description: &str, properties: PrintProperties) -> FieldId {
        units::assert_quantity(unit, quantity);
        let field = self.slots.len();
        self.slots.push(0.0);
        self.prints.push(PrintSpec {
            name: name.to_string(),
            quantity,
            unit,
            field,
            description: description.to_string(),
            properties,
        });
        return field;
    }

    pub fn info(&self) -> &MeterInfo {
        return &self.info;
    }

    pub fn media(&self) -> &str {
        return &self.media;
    }

    pub fn link_modes(&self) -> &[LinkMode] {
        return &self.link_modes;
    }

    pub fn prints(&self) -> &[PrintSpec] {
        return &self.prints;
    }

    pub fn field(&self, field: FieldId) -> f64 {
        return self.slots[field];
    }

    pub fn set_field(&mut self, field: FieldId, value: f64) {
        self.slots[field] = value;
    }

    pub fn touch(&mut self) {
        self.updated = Some(Utc::now());
    }

    pub fn updated(&self) -> Option<DateTime<Utc>> {
        return self.updated;
    }

    pub fn find_print(&self, name: &str) -> Option<&PrintSpec> {
        return self.prints.iter().find(|p| p.name == name);
    }

    /// Value of the print `name` converted to `unit`.
    ///
    /// Asking for a print the driver does not have, or for a unit of another
    /// quantity, is a programming error and panics.
    pub fn get_print(&self, name: &str, unit: Unit) -> f64 {
        let print = match self.find_print(name) {
            Some(p) => p,
            None => panic!("driver {} has no print named {}", self.info.driver, name),
        };
        units::assert_quantity(unit, print.quantity);
        return units::convert(self.field(print.field), print.unit, unit);
    }

    pub fn render_json(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut doc = serde_json::Map::new();
        doc.insert("_".to_string(), "telegram".into());
        doc.insert("media".to_string(), self.media.clone().into());
        doc.insert("meter".to_string(), self.info.driver.clone().into());
        doc.insert("name".to_string(), self.info.name.clone().into());
        doc.insert("id".to_string(), self.info.id.clone().into());
        for p in self.prints.iter().filter(|p| p.properties.json) {
            doc.insert(format!("{}_{}", p.name, p.unit.suffix()), serde_json::Value::from(self.field(p.field)));
        }
        if let Some(ts) = self.updated {
            doc.insert("timestamp".to_string(), ts.to_rfc3339().into());
        }
        return doc;
    }

    /// One tab separated line: name, id and every brief print.
    pub fn render_brief(&self) -> String {
        let mut parts = vec![self.info.name.clone(), self.info.id.clone()];
        for p in self.prints.iter().filter(|p| p.properties.brief) {
            parts.push(format!("{:.3} {}", self.field(p.field), p.unit.symbol()));
        }
        return parts.join("\t");
    }
}

pub trait Meter: Send {
    fn common(&self) -> &MeterCommon;

    /// Updates every field present in the telegram, fields without a
    /// matching record keep their previous value.
    fn decode_telegram(&mut self, telegram: &mut Telegram);

    fn info(&self) -> &MeterInfo {
        return self.common().info();
    }

    fn prints(&self) -> &[PrintSpec] {
        return self.common().prints();
    }

    fn link_modes(&self) -> &[LinkMode] {
        return self.common().link_modes();
    }

    fn get_print(&self, name: &str, unit: Unit) -> f64 {
        return self.common().get_print(name, unit);
    }

    fn render_json(&self) -> serde_json::Map<String, serde_json::Value> {
        return self.common().render_json();
    }
}

/// Meter driven by a [`DriverDefinition`].
pub struct TableDriver {
    common: MeterCommon,
    definition: &'static DriverDefinition,
    fields: Vec<FieldId>,
}

impl TableDriver {
    pub fn new(definition: &'static DriverDefinition, info: MeterInfo) -> Self {
        let mut common = MeterCommon::new(info, definition.media);
        for mode in definition.link_modes.iter() {
            common.add_link_mode(*mode);
        }
        let fields = definition.fields.iter()
            .map(|f| common.add_print(f.name, f.quantity, f.unit, f.description, f.properties))
            .collect();
        return TableDriver { common, definition, fields };
    }
}

impl Meter for TableDriver {
    fn common(&self) -> &MeterCommon {
        return &self.common;
    }

    fn decode_telegram(&mut self, telegram: &mut Telegram) {
        let mut explanations: Vec<(usize, String)> = Vec::new();

        for (spec, field) in self.definition.fields.iter().zip(self.fields.iter()) {
            let record = match resolve(telegram, &spec.selector) {
                Some(r) => r,
                None => continue,
            };

            let record_unit = match record.quantity.unit {
                Some(u) => u,
                None => {
                    warn!("{}: record {} for {} carries no unit, ignored", self.definition.name, record.key(), spec.name);
                    continue;
                }
            };

            match decode(record) {
                Ok((value, offset)) => {
                    let value = units::convert(value, record_unit, spec.unit);
                    debug!("{}: {} = {} {}", self.common.info().id, spec.name, value, spec.unit.symbol());
                    self.common.set_field(*field, value);
                    explanations.push((offset, format!(" {} ({} {})", spec.explanation, value, spec.unit.symbol())));
                }
                Err(e) => {
                    warn!("{}: {} not updated: {e}", self.definition.name, spec.name);
                }
            }
        }

        /* Only a telegram that updated something counts as a reading */
        if explanations.is_empty() {
            return;
        }
        for (offset, text) in explanations {
            telegram.add_explanation(offset, text);
        }
        self.common.touch();
    }
}

pub type MeterConstructor = fn(MeterInfo) -> Box<dyn Meter>;

lazy_static! {
    static ref DRIVERS: HashMap<&'static str, MeterConstructor> = {
        let mut drivers: HashMap<&'static str, MeterConstructor> = HashMap::new();
        drivers.insert(sharky_tch::DRIVER.name, sharky_tch::create);
        drivers.insert(multical21::DRIVER.name, multical21::create);
        drivers
    };
}

/// Builds the driver named in `info.driver`.
pub fn create_meter(info: MeterInfo) -> Result<Box<dyn Meter>, DriverError> {
    return match DRIVERS.get(info.driver.as_str()) {
        Some(constructor) => Ok(constructor(info)),
        None => Err(DriverError::UnknownDriver(info.driver)),
    };
}

pub fn list_drivers() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = DRIVERS.keys().copied().collect();
    names.sort();
    return names;
}
