use serde::Serialize;
use std::fmt::Write;

use crate::units::Unit;

/* Function field of the DIF, bits 5 and 4 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MeasurementType {
    Instantaneous,
    Maximum,
    Minimum,
    AtError,
}

impl MeasurementType {
    pub fn from_dif(dif: u8) -> Self {
        return match (dif >> 4) & 0x03 {
            0b00 => MeasurementType::Instantaneous,
            0b01 => MeasurementType::Maximum,
            0b10 => MeasurementType::Minimum,
            _ => MeasurementType::AtError,
        };
    }
}

/// The family a VIF belongs to, independent of its decimal exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueInformation {
    Energy,
    Volume,
    Mass,
    OnTime,
    OperatingTime,
    Power,
    VolumeFlow,
    MassFlow,
    FlowTemperature,
    ReturnTemperature,
    TemperatureDifference,
    ExternalTemperature,
    ColdWarmTemperatureLimit,
    CumulativeMaxPower,
    Pressure,
    Date,
    DateTime,
    HeatCostAllocation,
    AveragingDuration,
    ActualityDuration,
    FabricationNo,
    EnhancedIdentification,
    BusAddress,
    Credit,
    Debit,
    AccessNumber,
    Medium,
    Manufacturer,
    ModelVersion,
    HardwareVersion,
    FirmwareVersion,
    SoftwareVersion,
    ErrorFlags,
    DigitalOutput,
    DigitalInput,
    StorageInterval,
    DurationSinceReadout,
    Dimensionless,
    Voltage,
    Current,
    PlainText,
    AnyVif,
    ManufacturerSpecific,
    Unknown,
}

impl ValueInformation {
    /// Instantaneous physical values may go below zero, counters never do.
    pub fn is_signed(&self) -> bool {
        return matches!(self,
            ValueInformation::Power
            | ValueInformation::VolumeFlow
            | ValueInformation::MassFlow
            | ValueInformation::FlowTemperature
            | ValueInformation::ReturnTemperature
            | ValueInformation::TemperatureDifference
            | ValueInformation::ExternalTemperature
            | ValueInformation::ColdWarmTemperatureLimit
            | ValueInformation::Pressure
            | ValueInformation::Credit
            | ValueInformation::Debit
            | ValueInformation::Voltage
            | ValueInformation::Current);
    }
}

/// What a record measures and how its raw number is scaled.
///
/// A decoded value is `raw * 10^exponent` expressed in `unit`. Records
/// without a physical unit (dates, identifications, flags) carry `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuantityTag {
    pub info: ValueInformation,
    pub exponent: i32,
    pub unit: Option<Unit>,
}

impl QuantityTag {
    pub fn new(info: ValueInformation, exponent: i32, unit: Option<Unit>) -> Self {
        return QuantityTag { info, exponent, unit };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RecordAddress {
    pub storage: u64,
    pub tariff: u32,
    pub subunit: u32,
}

/* How the payload bytes of a record are laid out */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Encoding {
    NoData,
    /* Little endian integer of n bytes */
    Integer(usize),
    Real32,
    /* Packed decimal of n digits, least significant byte first */
    Bcd(usize),
    /* Packed decimal announced as negative through LVAR */
    NegativeBcd(usize),
    Text(usize),
}

impl Encoding {
    pub fn payload_len(&self) -> usize {
        return match self {
            Encoding::NoData => 0,
            Encoding::Integer(n) => *n,
            Encoding::Real32 => 4,
            Encoding::Bcd(digits) | Encoding::NegativeBcd(digits) => (digits + 1) / 2,
            Encoding::Text(n) => *n,
        };
    }

    pub fn is_numeric(&self) -> bool {
        return !matches!(self, Encoding::NoData | Encoding::Text(_));
    }
}

/// One self describing field of a telegram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataRecord {
    /// Offset of the DIF within the telegram.
    pub offset: usize,
    /// Offset of the first payload byte.
    pub value_offset: usize,
    pub dif: u8,
    pub difes: Vec<u8>,
    pub vif: u8,
    pub vifes: Vec<u8>,
    pub measurement: MeasurementType,
    pub quantity: QuantityTag,
    pub address: RecordAddress,
    pub encoding: Encoding,
    pub payload: Vec<u8>,
    /* Unit text of a plain text VIF */
    pub vif_text: Option<String>,
}

impl DataRecord {
    /// The header bytes as hex, e.g. `0C06` or `8C1006`.
    pub fn key(&self) -> String {
        let mut k = format!("{:02X}", self.dif);
        for b in self.difes.iter() {
            let _ = write!(k, "{b:02X}");
        }
        let _ = write!(k, "{:02X}", self.vif);
        for b in self.vifes.iter() {
            let _ = write!(k, "{b:02X}");
        }
        return k;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub offset: usize,
    pub text: String,
}

/// Where and why record parsing stopped early.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseAbort {
    pub offset: usize,
    pub reason: String,
}

/// A parsed application layer payload.
///
/// The records are fixed once parsed; drivers may only add explanations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Telegram {
    records: Vec<DataRecord>,
    explanations: Vec<Explanation>,
    aborted: Option<ParseAbort>,
    manufacturer_data: Option<(usize, Vec<u8>)>,
    len: usize,
}

impl Telegram {
    pub fn from_records(records: Vec<DataRecord>) -> Self {
        let len = records.last().map(|r| r.value_offset + r.payload.len()).unwrap_or(0);
        return Telegram { records, len, ..Default::default() };
    }

    pub(crate) fn new(records: Vec<DataRecord>,
                      aborted: Option<ParseAbort>,
                      manufacturer_data: Option<(usize, Vec<u8>)>,
                      len: usize) -> Self {
        return Telegram { records, explanations: Vec::new(), aborted, manufacturer_data, len };
    }

    pub fn records(&self) -> &[DataRecord] {
        return &self.records;
    }

    pub fn len(&self) -> usize {
        return self.len;
    }

    pub fn is_empty(&self) -> bool {
        return self.records.is_empty();
    }

    pub fn aborted(&self) -> Option<&ParseAbort> {
        return self.aborted.as_ref();
    }

    pub fn manufacturer_data(&self) -> Option<&(usize, Vec<u8>)> {
        return self.manufacturer_data.as_ref();
    }

    pub fn add_explanation(&mut self, offset: usize, text: String) {
        self.explanations.push(Explanation { offset, text });
    }

    pub fn explanations(&self) -> &[Explanation] {
        return &self.explanations;
    }

    /// Text dump of all records with the explanations drivers attached.
    pub fn analyze(&self) -> String {
        let mut out = String::new();
        for r in self.records.iter() {
            let _ = write!(out, "{:03x}: {} {:?} {:?} storage={} tariff={} subunit={} payload={}",
                           r.offset, r.key(), r.measurement, r.quantity.info,
                           r.address.storage, r.address.tariff, r.address.subunit,
                           hex::encode_upper(&r.payload));
            for e in self.explanations.iter().filter(|e| e.offset == r.value_offset) {
                let _ = write!(out, "{}", e.text);
            }
            out.push('\n');
        }
        if let Some((offset, data)) = &self.manufacturer_data {
            let _ = writeln!(out, "{offset:03x}: manufacturer specific {}", hex::encode_upper(data));
        }
        if let Some(a) = &self.aborted {
            let _ = writeln!(out, "{:03x}: parsing stopped: {}", a.offset, a.reason);
        }
        return out;
    }
}
