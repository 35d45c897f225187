//! Physical quantities, their units and the conversion between them.
//!
//! Every unit belongs to exactly one [`Quantity`]. A unit is described by an
//! affine transform to the base unit of its quantity (`base = value * scale + offset`),
//! plain multiplicative units simply have an offset of zero.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    Energy,
    Volume,
    Power,
    Temperature,
    TemperatureDifference,
    Time,
    VolumeFlow,
    Mass,
    MassFlow,
    Pressure,
    Voltage,
    Current,
    Dimensionless,
}

impl Quantity {
    pub fn base_unit(&self) -> Unit {
        return match self {
            Quantity::Energy => Unit::KWH,
            Quantity::Volume => Unit::M3,
            Quantity::Power => Unit::KW,
            Quantity::Temperature => Unit::C,
            Quantity::TemperatureDifference => Unit::DeltaK,
            Quantity::Time => Unit::Second,
            Quantity::VolumeFlow => Unit::M3H,
            Quantity::Mass => Unit::KG,
            Quantity::MassFlow => Unit::KGH,
            Quantity::Pressure => Unit::Bar,
            Quantity::Voltage => Unit::Volt,
            Quantity::Current => Unit::Ampere,
            Quantity::Dimensionless => Unit::Counter,
        };
    }

    pub fn name(&self) -> &'static str {
        return match self {
            Quantity::Energy => "energy",
            Quantity::Volume => "volume",
            Quantity::Power => "power",
            Quantity::Temperature => "temperature",
            Quantity::TemperatureDifference => "temperature difference",
            Quantity::Time => "time",
            Quantity::VolumeFlow => "volume flow",
            Quantity::Mass => "mass",
            Quantity::MassFlow => "mass flow",
            Quantity::Pressure => "pressure",
            Quantity::Voltage => "voltage",
            Quantity::Current => "current",
            Quantity::Dimensionless => "dimensionless",
        };
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /* Energy */
    KWH,
    WH,
    MWH,
    MJ,
    GJ,
    /* Volume */
    M3,
    L,
    /* Power */
    KW,
    W,
    MW,
    GJH,
    /* Temperature */
    C,
    K,
    F,
    DeltaK,
    /* Time */
    Second,
    Minute,
    Hour,
    Day,
    Year,
    /* Flow */
    M3H,
    LH,
    M3Min,
    M3S,
    KGH,
    /* Everything else */
    KG,
    Ton,
    Bar,
    Pa,
    Volt,
    Ampere,
    Counter,
}

struct UnitDefinition {
    quantity: Quantity,
    scale: f64,
    offset: f64,
    symbol: &'static str,
    suffix: &'static str,
}

const fn linear(quantity: Quantity, scale: f64, symbol: &'static str, suffix: &'static str) -> UnitDefinition {
    UnitDefinition { quantity, scale, offset: 0.0, symbol, suffix }
}

impl Unit {
    fn definition(&self) -> UnitDefinition {
        return match self {
            Unit::KWH => linear(Quantity::Energy, 1.0, "kWh", "kwh"),
            Unit::WH => linear(Quantity::Energy, 0.001, "Wh", "wh"),
            Unit::MWH => linear(Quantity::Energy, 1000.0, "MWh", "mwh"),
            /* 1 kWh = 3.6 MJ */
            Unit::MJ => linear(Quantity::Energy, 1.0 / 3.6, "MJ", "mj"),
            Unit::GJ => linear(Quantity::Energy, 1000.0 / 3.6, "GJ", "gj"),

            Unit::M3 => linear(Quantity::Volume, 1.0, "m³", "m3"),
            Unit::L => linear(Quantity::Volume, 0.001, "l", "l"),

            Unit::KW => linear(Quantity::Power, 1.0, "kW", "kw"),
            Unit::W => linear(Quantity::Power, 0.001, "W", "w"),
            Unit::MW => linear(Quantity::Power, 1000.0, "MW", "mw"),
            Unit::GJH => linear(Quantity::Power, 1000.0 / 3.6, "GJ/h", "gjh"),

            Unit::C => linear(Quantity::Temperature, 1.0, "°C", "c"),
            Unit::K => UnitDefinition { quantity: Quantity::Temperature, scale: 1.0, offset: -273.15, symbol: "K", suffix: "k" },
            Unit::F => UnitDefinition { quantity: Quantity::Temperature, scale: 5.0 / 9.0, offset: -32.0 * 5.0 / 9.0, symbol: "°F", suffix: "f" },
            Unit::DeltaK => linear(Quantity::TemperatureDifference, 1.0, "K", "k"),

            Unit::Second => linear(Quantity::Time, 1.0, "s", "s"),
            Unit::Minute => linear(Quantity::Time, 60.0, "min", "min"),
            Unit::Hour => linear(Quantity::Time, 3600.0, "h", "h"),
            Unit::Day => linear(Quantity::Time, 86400.0, "d", "d"),
            Unit::Year => linear(Quantity::Time, 365.0 * 86400.0, "y", "y"),

            Unit::M3H => linear(Quantity::VolumeFlow, 1.0, "m³/h", "m3h"),
            Unit::LH => linear(Quantity::VolumeFlow, 0.001, "l/h", "lh"),
            Unit::M3Min => linear(Quantity::VolumeFlow, 60.0, "m³/min", "m3min"),
            Unit::M3S => linear(Quantity::VolumeFlow, 3600.0, "m³/s", "m3s"),
            Unit::KGH => linear(Quantity::MassFlow, 1.0, "kg/h", "kgh"),

            Unit::KG => linear(Quantity::Mass, 1.0, "kg", "kg"),
            Unit::Ton => linear(Quantity::Mass, 1000.0, "t", "t"),
            Unit::Bar => linear(Quantity::Pressure, 1.0, "bar", "bar"),
            Unit::Pa => linear(Quantity::Pressure, 0.00001, "Pa", "pa"),
            Unit::Volt => linear(Quantity::Voltage, 1.0, "V", "v"),
            Unit::Ampere => linear(Quantity::Current, 1.0, "A", "a"),
            Unit::Counter => linear(Quantity::Dimensionless, 1.0, "", "counter"),
        };
    }

    pub fn quantity(&self) -> Quantity {
        return self.definition().quantity;
    }

    /// Human readable symbol, e.g. `kWh` or `°C`.
    pub fn symbol(&self) -> &'static str {
        return self.definition().symbol;
    }

    /// Lower case suffix used for JSON keys and environment variables, e.g. `kwh`.
    pub fn suffix(&self) -> &'static str {
        return self.definition().suffix;
    }

    fn to_base(&self, value: f64) -> f64 {
        let d = self.definition();
        return value * d.scale + d.offset;
    }

    fn from_base(&self, value: f64) -> f64 {
        let d = self.definition();
        return (value - d.offset) / d.scale;
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Panics when `unit` does not measure `quantity`.
///
/// A mismatch means a driver or caller asked for a meaningless conversion,
/// which is a programming error and never caused by telegram content.
pub fn assert_quantity(unit: Unit, quantity: Quantity) {
    if unit.quantity() != quantity {
        panic!("unit {:?} measures {} but {} was expected", unit, unit.quantity(), quantity);
    }
}

pub fn convert(value: f64, from: Unit, to: Unit) -> f64 {
    assert_quantity(to, from.quantity());
    if from == to {
        return value;
    }
    return to.from_base(from.to_base(value));
}
