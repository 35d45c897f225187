use serde::{Deserialize, Serialize};


/// Radio link modes a meter may transmit in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LinkMode {
    C1,
    T1,
    S1,
    N1,
}

impl LinkMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "c1" | "C1" => Some(LinkMode::C1),
            "t1" | "T1" => Some(LinkMode::T1),
            "s1" | "S1" => Some(LinkMode::S1),
            "n1" | "N1" => Some(LinkMode::N1),
            _ => None,
        }
    }

    pub fn to_string(&self) -> String {
        match self {
            LinkMode::C1 => "c1".to_string(),
            LinkMode::T1 => "t1".to_string(),
            LinkMode::S1 => "s1".to_string(),
            LinkMode::N1 => "n1".to_string(),
        }
    }
}

/// Identity of one physical meter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MeterInfo {
    /// Human-readable name from the configuration
    pub name: String,
    /// Meter id as printed on the device, e.g. 12345678
    pub id: String,
    /// Name of the driver decoding this meter
    pub driver: String,
}

impl MeterInfo {
    pub fn new(name: &str, id: &str, driver: &str) -> Self {
        MeterInfo {
            name: name.to_string(),
            id: id.to_string(),
            driver: driver.to_string(),
        }
    }
}

/// Where a print shows up
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrintProperties {
    /// Part of the short one line summary
    pub brief: bool,
    /// Part of the JSON document
    pub json: bool,
}

impl PrintProperties {
    pub const ALL: PrintProperties = PrintProperties { brief: true, json: true };
    pub const JSON: PrintProperties = PrintProperties { brief: false, json: true };
}
