use log::{debug, warn};

use super::structs::*;
use super::TelegramError;
use crate::units::Unit;

/* EN 13757-3 allows at most 10 DIFE and 10 VIFE bytes */
const MAX_EXTENSIONS: usize = 10;

const DIF_IDLE_FILLER: u8 = 0x2F;
const DIF_MANUFACTURER_DATA: u8 = 0x0F;
const DIF_MANUFACTURER_DATA_MORE: u8 = 0x1F;

const VIF_EXTENSION_FB: u8 = 0xFB;
const VIF_EXTENSION_FD: u8 = 0xFD;

struct Header {
    dif: u8,
    difes: Vec<u8>,
    vif: u8,
    vifes: Vec<u8>,
    address: RecordAddress,
    quantity: QuantityTag,
    encoding: Encoding,
    vif_text: Option<String>,
    value_offset: usize,
}

/// Splits an application layer payload into its data records.
///
/// An unknown or truncated header stops the walk, the records found so far
/// are returned and [`Telegram::aborted`] tells where it stopped. A record
/// whose payload runs past the end of the data is a [`TelegramError`].
pub fn parse(payload: &[u8]) -> Result<Telegram, TelegramError> {
    let mut records: Vec<DataRecord> = Vec::new();
    let mut aborted = None;
    let mut manufacturer_data = None;

    let mut cur_pos: usize = 0;
    while cur_pos < payload.len() {
        let dif = payload[cur_pos];

        if dif == DIF_IDLE_FILLER {
            cur_pos += 1;
            continue;
        }

        /* Everything behind this DIF belongs to the manufacturer */
        if dif == DIF_MANUFACTURER_DATA || dif == DIF_MANUFACTURER_DATA_MORE {
            debug!("Manufacturer specific data at {cur_pos:#x}");
            manufacturer_data = Some((cur_pos, payload[cur_pos + 1..].to_vec()));
            break;
        }

        let header = match read_header(payload, cur_pos) {
            Ok(h) => h,
            Err(reason) => {
                warn!("Stopped parsing telegram at {cur_pos:#x}: {reason}");
                aborted = Some(ParseAbort { offset: cur_pos, reason });
                break;
            }
        };

        let declared = header.encoding.payload_len();
        let available = payload.len() - header.value_offset;
        if declared > available {
            return Err(TelegramError::Malformed {
                offset: cur_pos,
                declared,
                available,
                partial: Telegram::new(records, None, None, payload.len()),
            });
        }

        let value_end = header.value_offset + declared;
        let record = DataRecord {
            offset: cur_pos,
            value_offset: header.value_offset,
            dif: header.dif,
            difes: header.difes,
            vif: header.vif,
            vifes: header.vifes,
            measurement: MeasurementType::from_dif(header.dif),
            quantity: header.quantity,
            address: header.address,
            encoding: header.encoding,
            payload: payload[header.value_offset..value_end].to_vec(),
            vif_text: header.vif_text,
        };
        debug!("Record {} at {cur_pos:#x}: {:?} {:?}", record.key(), record.quantity.info, record.address);
        records.push(record);

        cur_pos = value_end;
    }

    return Ok(Telegram::new(records, aborted, manufacturer_data, payload.len()));
}

fn byte_at(payload: &[u8], pos: usize, what: &str) -> Result<u8, String> {
    return payload.get(pos).copied().ok_or_else(|| format!("telegram ends before {what}"));
}

fn read_header(payload: &[u8], start: usize) -> Result<Header, String> {
    let dif = payload[start];
    let mut pos = start + 1;

    /* Data field, bits 3..0. None means variable length, decided by LVAR */
    let fixed_encoding = match dif & 0x0F {
        0x00 => Some(Encoding::NoData),
        0x01 => Some(Encoding::Integer(1)),
        0x02 => Some(Encoding::Integer(2)),
        0x03 => Some(Encoding::Integer(3)),
        0x04 => Some(Encoding::Integer(4)),
        0x05 => Some(Encoding::Real32),
        0x06 => Some(Encoding::Integer(6)),
        0x07 => Some(Encoding::Integer(8)),
        /* Selection for readout */
        0x08 => Some(Encoding::NoData),
        0x09 => Some(Encoding::Bcd(2)),
        0x0A => Some(Encoding::Bcd(4)),
        0x0B => Some(Encoding::Bcd(6)),
        0x0C => Some(Encoding::Bcd(8)),
        0x0D => None,
        0x0E => Some(Encoding::Bcd(12)),
        _ => { return Err(format!("unsupported special function DIF {dif:02X}")); }
    };

    /* Storage number LSB sits in the DIF, everything else in the DIFEs */
    let mut address = RecordAddress { storage: ((dif >> 6) & 0x01) as u64, tariff: 0, subunit: 0 };
    let mut difes: Vec<u8> = Vec::new();
    let mut more = dif & 0x80 != 0;
    while more {
        if difes.len() == MAX_EXTENSIONS {
            return Err("too many DIFE bytes".to_string());
        }
        let dife = byte_at(payload, pos, "DIFE")?;
        let n = difes.len() as u32;
        address.storage |= ((dife & 0x0F) as u64) << (1 + 4 * n);
        address.tariff |= (((dife >> 4) & 0x03) as u32) << (2 * n);
        address.subunit |= (((dife >> 6) & 0x01) as u32) << n;
        difes.push(dife);
        pos += 1;
        more = dife & 0x80 != 0;
    }

    let vif = byte_at(payload, pos, "VIF")?;
    pos += 1;
    let mut vifes: Vec<u8> = Vec::new();
    let mut more = vif & 0x80 != 0;
    while more {
        if vifes.len() == MAX_EXTENSIONS {
            return Err("too many VIFE bytes".to_string());
        }
        let vife = byte_at(payload, pos, "VIFE")?;
        vifes.push(vife);
        pos += 1;
        more = vife & 0x80 != 0;
    }

    let quantity = match vif {
        VIF_EXTENSION_FB => vif_extension_fb(vifes.first().copied().unwrap_or(0)),
        VIF_EXTENSION_FD => vif_extension_fd(vifes.first().copied().unwrap_or(0)),
        _ => vif_primary(vif),
    };

    /* Plain text unit, length byte followed by the characters in reverse */
    let mut vif_text = None;
    if quantity.info == ValueInformation::PlainText {
        let len = byte_at(payload, pos, "plain text VIF length")? as usize;
        pos += 1;
        let text = payload.get(pos..pos + len).ok_or("telegram ends inside plain text VIF")?;
        vif_text = Some(text.iter().rev().map(|c| *c as char).collect());
        pos += len;
    }

    let encoding = match fixed_encoding {
        Some(e) => e,
        None => {
            let lvar = byte_at(payload, pos, "LVAR")?;
            pos += 1;
            match lvar {
                0x00..=0xBF => Encoding::Text(lvar as usize),
                0xC0..=0xCF => Encoding::Bcd(2 * (lvar - 0xC0) as usize),
                0xD0..=0xDF => Encoding::NegativeBcd(2 * (lvar - 0xD0) as usize),
                0xE0..=0xEF => Encoding::Integer((lvar - 0xE0) as usize),
                _ => { return Err(format!("unsupported LVAR {lvar:02X}")); }
            }
        }
    };

    return Ok(Header { dif, difes, vif, vifes, address, quantity, encoding, vif_text, value_offset: pos });
}

/* nn = 00 seconds, 01 minutes, 10 hours, 11 days */
fn time_unit(vif: u8) -> Unit {
    return match vif & 0x03 {
        0b00 => Unit::Second,
        0b01 => Unit::Minute,
        0b10 => Unit::Hour,
        _ => Unit::Day,
    };
}

/* Comments from https://m-bus.com/documentation-wired/08-appendix */
fn vif_primary(vif: u8) -> QuantityTag {
    let n3 = (vif & 0x07) as i32;
    let n2 = (vif & 0x03) as i32;
    return match vif & 0x7F {
        /* E0000nnn	Energy	10(nnn-3) Wh */
        0x00..=0x07 => QuantityTag::new(ValueInformation::Energy, n3 - 6, Some(Unit::KWH)),
        /* E0001nnn	Energy	10(nnn) J */
        0x08..=0x0F => QuantityTag::new(ValueInformation::Energy, n3 - 6, Some(Unit::MJ)),
        /* E0010nnn	Volume	10(nnn-6) m3 */
        0x10..=0x17 => QuantityTag::new(ValueInformation::Volume, n3 - 6, Some(Unit::M3)),
        /* E0011nnn	Mass	10(nnn-3) kg */
        0x18..=0x1F => QuantityTag::new(ValueInformation::Mass, n3 - 3, Some(Unit::KG)),
        /* E01000nn	On Time */
        0x20..=0x23 => QuantityTag::new(ValueInformation::OnTime, 0, Some(time_unit(vif))),
        /* E01001nn	Operating Time */
        0x24..=0x27 => QuantityTag::new(ValueInformation::OperatingTime, 0, Some(time_unit(vif))),
        /* E0101nnn	Power	10(nnn-3) W */
        0x28..=0x2F => QuantityTag::new(ValueInformation::Power, n3 - 6, Some(Unit::KW)),
        /* E0110nnn	Power	10(nnn) J/h */
        0x30..=0x37 => QuantityTag::new(ValueInformation::Power, n3 - 9, Some(Unit::GJH)),
        /* E0111nnn	Volume Flow	10(nnn-6) m3/h */
        0x38..=0x3F => QuantityTag::new(ValueInformation::VolumeFlow, n3 - 6, Some(Unit::M3H)),
        /* E1000nnn	Volume Flow ext.	10(nnn-7) m3/min */
        0x40..=0x47 => QuantityTag::new(ValueInformation::VolumeFlow, n3 - 7, Some(Unit::M3Min)),
        /* E1001nnn	Volume Flow ext.	10(nnn-9) m3/s */
        0x48..=0x4F => QuantityTag::new(ValueInformation::VolumeFlow, n3 - 9, Some(Unit::M3S)),
        /* E1010nnn	Mass flow	10(nnn-3) kg/h */
        0x50..=0x57 => QuantityTag::new(ValueInformation::MassFlow, n3 - 3, Some(Unit::KGH)),
        /* E10110nn	Flow Temperature	10(nn-3) °C */
        0x58..=0x5B => QuantityTag::new(ValueInformation::FlowTemperature, n2 - 3, Some(Unit::C)),
        /* E10111nn	Return Temperature	10(nn-3) °C */
        0x5C..=0x5F => QuantityTag::new(ValueInformation::ReturnTemperature, n2 - 3, Some(Unit::C)),
        /* E11000nn	Temperature Difference	10(nn-3) K */
        0x60..=0x63 => QuantityTag::new(ValueInformation::TemperatureDifference, n2 - 3, Some(Unit::DeltaK)),
        /* E11001nn	External Temperature	10(nn-3) °C */
        0x64..=0x67 => QuantityTag::new(ValueInformation::ExternalTemperature, n2 - 3, Some(Unit::C)),
        /* E11010nn	Pressure	10(nn-3) bar */
        0x68..=0x6B => QuantityTag::new(ValueInformation::Pressure, n2 - 3, Some(Unit::Bar)),
        /* E110110n	Time Point, date (type G) or date and time (type F) */
        0x6C => QuantityTag::new(ValueInformation::Date, 0, None),
        0x6D => QuantityTag::new(ValueInformation::DateTime, 0, None),
        /* E1101110	Units for H.C.A. */
        0x6E => QuantityTag::new(ValueInformation::HeatCostAllocation, 0, Some(Unit::Counter)),
        /* E11100nn	Averaging Duration */
        0x70..=0x73 => QuantityTag::new(ValueInformation::AveragingDuration, 0, Some(time_unit(vif))),
        /* E11101nn	Actuality Duration */
        0x74..=0x77 => QuantityTag::new(ValueInformation::ActualityDuration, 0, Some(time_unit(vif))),
        0x78 => QuantityTag::new(ValueInformation::FabricationNo, 0, None),
        0x79 => QuantityTag::new(ValueInformation::EnhancedIdentification, 0, None),
        0x7A => QuantityTag::new(ValueInformation::BusAddress, 0, None),
        0x7C => QuantityTag::new(ValueInformation::PlainText, 0, None),
        0x7E => QuantityTag::new(ValueInformation::AnyVif, 0, None),
        0x7F => QuantityTag::new(ValueInformation::ManufacturerSpecific, 0, None),
        _ => QuantityTag::new(ValueInformation::Unknown, 0, None),
    };
}

fn vif_extension_fb(vife: u8) -> QuantityTag {
    let n1 = (vife & 0x01) as i32;
    let n2 = (vife & 0x03) as i32;
    return match vife & 0x7F {
        /* E000000n	Energy	10(n-1) MWh */
        0x00..=0x01 => QuantityTag::new(ValueInformation::Energy, n1 + 2, Some(Unit::KWH)),
        /* E000100n	Energy	10(n-1) GJ */
        0x08..=0x09 => QuantityTag::new(ValueInformation::Energy, n1 - 1, Some(Unit::GJ)),
        /* E001000n	Volume	10(n+2) m3 */
        0x10..=0x11 => QuantityTag::new(ValueInformation::Volume, n1 + 2, Some(Unit::M3)),
        /* E001100n	Mass	10(n+2) t */
        0x18..=0x19 => QuantityTag::new(ValueInformation::Mass, n1 + 2, Some(Unit::Ton)),
        /* E010100n	Power	10(n-1) MW */
        0x28..=0x29 => QuantityTag::new(ValueInformation::Power, n1 + 2, Some(Unit::KW)),
        /* E011000n	Power	10(n-1) GJ/h */
        0x30..=0x31 => QuantityTag::new(ValueInformation::Power, n1 - 1, Some(Unit::GJH)),
        /* E10110nn	Flow Temperature	10(nn-3) °F */
        0x58..=0x5B => QuantityTag::new(ValueInformation::FlowTemperature, n2 - 3, Some(Unit::F)),
        /* E10111nn	Return Temperature	10(nn-3) °F */
        0x5C..=0x5F => QuantityTag::new(ValueInformation::ReturnTemperature, n2 - 3, Some(Unit::F)),
        /* E11001nn	External Temperature	10(nn-3) °F */
        0x64..=0x67 => QuantityTag::new(ValueInformation::ExternalTemperature, n2 - 3, Some(Unit::F)),
        /* E11100nn	Cold / Warm Temperature Limit	10(nn-3) °F */
        0x70..=0x73 => QuantityTag::new(ValueInformation::ColdWarmTemperatureLimit, n2 - 3, Some(Unit::F)),
        /* E11101nn	Cold / Warm Temperature Limit	10(nn-3) °C */
        0x74..=0x77 => QuantityTag::new(ValueInformation::ColdWarmTemperatureLimit, n2 - 3, Some(Unit::C)),
        /* E1111nnn	cumul. count max power	10(nnn-3) W */
        0x78..=0x7F => QuantityTag::new(ValueInformation::CumulativeMaxPower, (vife & 0x07) as i32 - 6, Some(Unit::KW)),
        _ => QuantityTag::new(ValueInformation::Unknown, 0, None),
    };
}

fn vif_extension_fd(vife: u8) -> QuantityTag {
    let n2 = (vife & 0x03) as i32;
    let n4 = (vife & 0x0F) as i32;
    return match vife & 0x7F {
        /* E00000nn	Credit of 10(nn-3) currency units */
        0x00..=0x03 => QuantityTag::new(ValueInformation::Credit, n2 - 3, None),
        /* E00001nn	Debit of 10(nn-3) currency units */
        0x04..=0x07 => QuantityTag::new(ValueInformation::Debit, n2 - 3, None),
        0x08 => QuantityTag::new(ValueInformation::AccessNumber, 0, Some(Unit::Counter)),
        0x09 => QuantityTag::new(ValueInformation::Medium, 0, None),
        0x0A => QuantityTag::new(ValueInformation::Manufacturer, 0, None),
        0x0B => QuantityTag::new(ValueInformation::EnhancedIdentification, 0, None),
        0x0C => QuantityTag::new(ValueInformation::ModelVersion, 0, None),
        0x0D => QuantityTag::new(ValueInformation::HardwareVersion, 0, None),
        0x0E => QuantityTag::new(ValueInformation::FirmwareVersion, 0, None),
        0x0F => QuantityTag::new(ValueInformation::SoftwareVersion, 0, None),
        0x17 => QuantityTag::new(ValueInformation::ErrorFlags, 0, None),
        0x1A => QuantityTag::new(ValueInformation::DigitalOutput, 0, None),
        0x1B => QuantityTag::new(ValueInformation::DigitalInput, 0, None),
        /* E01001nn	Storage interval [sec(s)..day(s)] */
        0x24..=0x27 => QuantityTag::new(ValueInformation::StorageInterval, 0, Some(time_unit(vife))),
        /* E01011nn	Duration since last readout [sec(s)..day(s)] */
        0x2C..=0x2F => QuantityTag::new(ValueInformation::DurationSinceReadout, 0, Some(time_unit(vife))),
        0x3A => QuantityTag::new(ValueInformation::Dimensionless, 0, Some(Unit::Counter)),
        /* E100nnnn	10(nnnn-9) Volt */
        0x40..=0x4F => QuantityTag::new(ValueInformation::Voltage, n4 - 9, Some(Unit::Volt)),
        /* E101nnnn	10(nnnn-12) A */
        0x50..=0x5F => QuantityTag::new(ValueInformation::Current, n4 - 12, Some(Unit::Ampere)),
        _ => QuantityTag::new(ValueInformation::Unknown, 0, None),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    /* Readout of a Sharky 775 heat meter, application layer only */
    fn sharky_payload() -> Vec<u8> {
        return vec![
            0x0C, /* DIF 8 digit BCD */
            0x06, /* VIF Energy kWh */
            0x05, 0x12, 0x00, 0x00, /* 1205 */
            0x0C, /* DIF 8 digit BCD */
            0x13, /* VIF Volume 10^-3 m³ */
            0x56, 0x34, 0x12, 0x00, /* 123456 */
            0x0B, /* DIF 6 digit BCD */
            0x3B, /* VIF Volume flow 10^-3 m³/h */
            0x28, 0x09, 0x00, /* 928 */
            0x0C, /* DIF 8 digit BCD */
            0x2B, /* VIF Power W */
            0x70, 0x64, 0x02, 0x00, /* 26470 */
            0x0A, /* DIF 4 digit BCD */
            0x5A, /* VIF Flow temperature 10^-1 °C */
            0x34, 0x09, /* 934 */
            0x0A, /* DIF 4 digit BCD */
            0x5E, /* VIF Return temperature 10^-1 °C */
            0x84, 0x06, /* 684 */
            0x8C, /* DIF 8 digit BCD, DIFE follows */
            0x10, /* DIFE tariff 1 */
            0x06, /* VIF Energy kWh */
            0x77, 0x00, 0x00, 0x00, /* 77 */
            0x04, /* DIF 32 bit integer */
            0x26, /* VIF Operating time hours */
            0xE8, 0x03, 0x00, 0x00, /* 1000 */
        ];
    }

    #[test]
    fn test_parse_sharky_readout() {
        let t = parse(&sharky_payload()).unwrap();
        assert_eq!(t.records().len(), 8);
        assert!(t.aborted().is_none());

        let energy = &t.records()[0];
        assert_eq!(energy.offset, 0);
        assert_eq!(energy.value_offset, 2);
        assert_eq!(energy.encoding, Encoding::Bcd(8));
        assert_eq!(energy.quantity, QuantityTag::new(ValueInformation::Energy, 0, Some(Unit::KWH)));
        assert_eq!(energy.measurement, MeasurementType::Instantaneous);
        assert_eq!(energy.payload, vec![0x05, 0x12, 0x00, 0x00]);

        let flow = &t.records()[2];
        assert_eq!(flow.encoding, Encoding::Bcd(6));
        assert_eq!(flow.quantity.info, ValueInformation::VolumeFlow);
        assert_eq!(flow.quantity.exponent, -3);

        let tariff = &t.records()[6];
        assert_eq!(tariff.offset, 31);
        assert_eq!(tariff.key(), "8C1006");
        assert_eq!(tariff.address, RecordAddress { storage: 0, tariff: 1, subunit: 0 });

        let time = &t.records()[7];
        assert_eq!(time.encoding, Encoding::Integer(4));
        assert_eq!(time.quantity.unit, Some(Unit::Hour));
    }

    #[test]
    fn test_dife_chain_addressing() {
        let data = vec![
            0xCC, /* DIF storage LSB set, DIFE follows, 8 digit BCD */
            0xE1, /* DIFE subunit 1, tariff 2, storage bits 0001, DIFE follows */
            0x01, /* DIFE storage bits 0001 */
            0x13, /* VIF Volume */
            0x00, 0x00, 0x00, 0x00,
        ];
        let t = parse(&data).unwrap();
        let r = &t.records()[0];
        /* 1 | 1 << 1 | 1 << 5 */
        assert_eq!(r.address.storage, 35);
        assert_eq!(r.address.tariff, 2);
        assert_eq!(r.address.subunit, 1);
        assert_eq!(r.value_offset, 4);
    }

    #[test]
    fn test_function_field() {
        let data = vec![0x12, 0x3B, 0x10, 0x00, 0x22, 0x3B, 0x01, 0x00, 0x32, 0x3B, 0x00, 0x00];
        let t = parse(&data).unwrap();
        assert_eq!(t.records()[0].measurement, MeasurementType::Maximum);
        assert_eq!(t.records()[1].measurement, MeasurementType::Minimum);
        assert_eq!(t.records()[2].measurement, MeasurementType::AtError);
    }

    #[test]
    fn test_idle_filler_and_manufacturer_data() {
        let data = vec![0x2F, 0x2F, 0x02, 0x5A, 0xB8, 0x00, 0x0F, 0x01, 0x02, 0x03];
        let t = parse(&data).unwrap();
        assert_eq!(t.records().len(), 1);
        assert_eq!(t.records()[0].offset, 2);
        assert_eq!(t.manufacturer_data(), Some(&(6, vec![0x01, 0x02, 0x03])));
        assert!(t.aborted().is_none());
    }

    #[test]
    fn test_manufacturer_data_more_follows() {
        let t = parse(&[0x1F]).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.manufacturer_data(), Some(&(0, vec![])));
        assert!(t.aborted().is_none());

        let t = parse(&[
            0x02, 0x5A, 0xB8, 0x00, /* flow temperature 18.4 °C */
            0x1F, /* manufacturer data, more records follow */
            0xAA,
        ]).unwrap();
        assert_eq!(t.records().len(), 1);
        assert_eq!(t.manufacturer_data(), Some(&(4, vec![0xAA])));
        assert!(t.aborted().is_none());
    }

    #[test]
    fn test_unsupported_lvar_stops_parsing() {
        let data = vec![
            0x0C, 0x06, 0x05, 0x12, 0x00, 0x00, /* energy 1205 kWh */
            0x0D, /* DIF variable length at offset 6 */
            0x13, /* VIF Volume */
            0xF5, /* LVAR from the reserved range */
        ];
        let t = parse(&data).unwrap();
        assert_eq!(t.records().len(), 1);
        let aborted = t.aborted().unwrap();
        assert_eq!(aborted.offset, 6);
        assert!(aborted.reason.contains("unsupported LVAR F5"));
    }

    #[test]
    fn test_extension_limits() {
        /* DIF with extension bit, then 11 DIFEs all announcing one more */
        let mut data = vec![0x84];
        data.extend([0x80; 11]);
        data.extend([0x13, 0x00, 0x00, 0x00, 0x00]);
        let t = parse(&data).unwrap();
        assert!(t.is_empty());
        let aborted = t.aborted().unwrap();
        assert_eq!(aborted.offset, 0);
        assert_eq!(aborted.reason, "too many DIFE bytes");

        /* Ten DIFEs are still fine */
        let mut data = vec![0x84];
        data.extend([0x80; 9]);
        data.extend([0x00, 0x13, 0x00, 0x00, 0x00, 0x00]);
        let t = parse(&data).unwrap();
        assert_eq!(t.records().len(), 1);
        assert_eq!(t.records()[0].difes.len(), 10);

        /* VIF with extension bit, then 11 VIFEs */
        let mut data = vec![0x04, 0x93];
        data.extend([0x80; 11]);
        data.extend([0x00, 0x00, 0x00, 0x00]);
        let t = parse(&data).unwrap();
        assert!(t.is_empty());
        let aborted = t.aborted().unwrap();
        assert_eq!(aborted.offset, 0);
        assert_eq!(aborted.reason, "too many VIFE bytes");
    }

    #[test]
    fn test_payload_past_end_is_malformed() {
        let data = vec![
            0x0C, 0x06, 0x05, 0x12, 0x00, 0x00,
            0x0A, 0x5E, 0x84, 0x01,
            0x0C, /* DIF 8 digit BCD at offset 10 */
            0x13, /* VIF Volume */
            0x56, 0x34, /* two of four bytes */
        ];
        match parse(&data) {
            Err(TelegramError::Malformed { offset, declared, available, partial }) => {
                assert_eq!(offset, 10);
                assert_eq!(declared, 4);
                assert_eq!(available, 2);
                assert_eq!(partial.records().len(), 2);
                assert_eq!(partial.records()[1].payload, vec![0x84, 0x01]);
            }
            other => panic!("expected malformed telegram, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_header_keeps_previous_records() {
        let data = vec![0x0C, 0x06, 0x05, 0x12, 0x00, 0x00, 0x3F, 0x06, 0x00];
        let t = parse(&data).unwrap();
        assert_eq!(t.records().len(), 1);
        let aborted = t.aborted().unwrap();
        assert_eq!(aborted.offset, 6);
        assert!(aborted.reason.contains("3F"));
    }

    #[test]
    fn test_truncated_header_stops_parsing() {
        /* DIFE announced but missing */
        let t = parse(&[0x0C, 0x06, 0x05, 0x12, 0x00, 0x00, 0x8C]).unwrap();
        assert_eq!(t.records().len(), 1);
        assert_eq!(t.aborted().unwrap().offset, 6);

        /* DIF without VIF */
        let t = parse(&[0x02]).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.aborted().unwrap().offset, 0);
    }

    #[test]
    fn test_vif_extension_tables() {
        let data = vec![
            0x04, 0xFB, 0x01, 0x10, 0x00, 0x00, 0x00, /* Energy 1 MWh steps */
            0x02, 0xFD, 0x48, 0x00, 0x09, /* Voltage 10^-1 V */
            0x03, 0xFD, 0x97, 0x1D, 0x00, 0x00, 0x00, /* Error flags with an extra VIFE */
        ];
        let t = parse(&data).unwrap();
        assert_eq!(t.records().len(), 3);
        assert_eq!(t.records()[0].quantity, QuantityTag::new(ValueInformation::Energy, 3, Some(Unit::KWH)));
        assert_eq!(t.records()[1].quantity, QuantityTag::new(ValueInformation::Voltage, -1, Some(Unit::Volt)));
        assert_eq!(t.records()[2].quantity.info, ValueInformation::ErrorFlags);
        assert_eq!(t.records()[2].vifes, vec![0x97, 0x1D]);
        assert_eq!(t.records()[2].payload, vec![0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_variable_length_and_plain_text() {
        let data = vec![
            0x0D, 0xFD, 0x0C, 0x03, b'C', b'B', b'A', /* model version "CBA" */
            0x0D, 0x7C, 0x02, b'h', b'k', 0xC2, 0x34, 0x12, /* 4 digit BCD in "kh" */
        ];
        let t = parse(&data).unwrap();
        assert_eq!(t.records()[0].encoding, Encoding::Text(3));
        assert_eq!(t.records()[0].payload, b"CBA".to_vec());
        assert_eq!(t.records()[1].vif_text.as_deref(), Some("kh"));
        assert_eq!(t.records()[1].encoding, Encoding::Bcd(4));
        assert_eq!(t.records()[1].payload, vec![0x34, 0x12]);
    }

    #[test]
    fn test_analyze_contains_every_record() {
        let mut t = parse(&sharky_payload()).unwrap();
        t.add_explanation(2, " total energy".to_string());
        let dump = t.analyze();
        assert_eq!(dump.lines().count(), 8);
        assert!(dump.lines().next().unwrap().ends_with(" total energy"));
    }
}
