use super::structs::{DataRecord, Encoding};
use super::MalformedRecord;

/* Every power of ten up to 1e22 is exactly representable in an f64 */
const EXACT_POWERS_OF_TEN: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11,
    1e12, 1e13, 1e14, 1e15, 1e16, 1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

fn power_of_ten(exp: u32) -> f64 {
    return match EXACT_POWERS_OF_TEN.get(exp as usize) {
        Some(p) => *p,
        None => 10f64.powi(exp as i32),
    };
}

/// Applies a decimal exponent. Negative exponents divide so that values like
/// 1205 * 10^-1 come out as the nearest double to 120.5.
pub fn scale(raw: f64, exponent: i32) -> f64 {
    if exponent >= 0 {
        return raw * power_of_ten(exponent as u32);
    }
    return raw / power_of_ten(exponent.unsigned_abs());
}

fn bcd_to_integer(record: &DataRecord) -> Result<(u128, bool), MalformedRecord> {
    let mut result: u128 = 0;
    let mut negative = false;
    let last = record.payload.len().saturating_sub(1);
    /* Most significant byte is the last one */
    for (i, &byte) in record.payload.iter().enumerate().rev() {
        let mut high = (byte >> 4) & 0x0F;
        let low = byte & 0x0F;
        /* 0xF in the top digit marks a negative value */
        if i == last && high == 0x0F {
            negative = true;
            high = 0;
        }
        if high > 9 || low > 9 {
            return Err(MalformedRecord::InvalidDigit { offset: record.value_offset + i });
        }
        result = result * 100 + (high * 10 + low) as u128;
    }
    return Ok((result, negative));
}

fn integer_to_f64(record: &DataRecord, width: usize) -> Result<f64, MalformedRecord> {
    if width == 0 || width > 8 {
        return Err(MalformedRecord::UnsupportedWidth { offset: record.offset, width });
    }
    let mut raw: u64 = 0;
    for (i, &byte) in record.payload.iter().enumerate() {
        raw |= (byte as u64) << (8 * i);
    }
    if !record.quantity.info.is_signed() {
        return Ok(raw as f64);
    }
    /* Sign extend from the top bit of the last byte */
    let unused = 64 - 8 * width as u32;
    let signed = ((raw << unused) as i64) >> unused;
    return Ok(signed as f64);
}

/// Turns the payload of a record into a number in the unit of its
/// [`QuantityTag`](super::structs::QuantityTag), together with the offset of
/// the value bytes in the telegram.
pub fn decode(record: &DataRecord) -> Result<(f64, usize), MalformedRecord> {
    let expected = record.encoding.payload_len();
    if record.payload.len() != expected {
        return Err(MalformedRecord::LengthMismatch {
            offset: record.offset,
            expected,
            actual: record.payload.len(),
        });
    }

    let raw = match record.encoding {
        /* LVAR C0/D0 announce a number without digits */
        Encoding::NoData | Encoding::Text(_) | Encoding::Bcd(0) | Encoding::NegativeBcd(0) => {
            return Err(MalformedRecord::NotNumeric { offset: record.offset });
        }
        Encoding::Integer(width) => integer_to_f64(record, width)?,
        Encoding::Real32 => {
            let bytes = [record.payload[0], record.payload[1], record.payload[2], record.payload[3]];
            f32::from_le_bytes(bytes) as f64
        }
        Encoding::Bcd(_) => {
            let (v, negative) = bcd_to_integer(record)?;
            if negative { -(v as f64) } else { v as f64 }
        }
        Encoding::NegativeBcd(_) => {
            let (v, _) = bcd_to_integer(record)?;
            -(v as f64)
        }
    };

    return Ok((scale(raw, record.quantity.exponent), record.value_offset));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Unit;
    use crate::wmbus::structs::*;

    fn record(encoding: Encoding, info: ValueInformation, exponent: i32, payload: Vec<u8>) -> DataRecord {
        return DataRecord {
            offset: 0,
            value_offset: 2,
            dif: 0,
            difes: Vec::new(),
            vif: 0,
            vifes: Vec::new(),
            measurement: MeasurementType::Instantaneous,
            quantity: QuantityTag::new(info, exponent, Some(Unit::KWH)),
            address: RecordAddress::default(),
            encoding,
            payload,
            vif_text: None,
        };
    }

    fn bcd_bytes(mut value: u64, digits: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for _ in 0..digits / 2 {
            let low = (value % 10) as u8;
            value /= 10;
            let high = (value % 10) as u8;
            value /= 10;
            out.push(high << 4 | low);
        }
        return out;
    }

    #[test]
    fn test_bcd_values() {
        let r = record(Encoding::Bcd(8), ValueInformation::Energy, 0, vec![0x05, 0x12, 0x00, 0x00]);
        assert_eq!(decode(&r).unwrap(), (1205.0, 2));

        let r = record(Encoding::Bcd(8), ValueInformation::Energy, -1, vec![0x05, 0x12, 0x00, 0x00]);
        assert_eq!(decode(&r).unwrap().0, 120.5);

        let r = record(Encoding::Bcd(4), ValueInformation::ReturnTemperature, -1, vec![0x84, 0x01]);
        assert_eq!(decode(&r).unwrap().0, 18.4);
    }

    #[test]
    fn test_bcd_magnitudes_come_back_exactly() {
        let cases: [(usize, u64); 6] = [(2, 99), (4, 9999), (6, 100000), (8, 99999999), (8, 12345678), (12, 999999999999)];
        for (digits, value) in cases.iter() {
            let r = record(Encoding::Bcd(*digits), ValueInformation::Volume, 0, bcd_bytes(*value, *digits));
            assert_eq!(decode(&r).unwrap().0, *value as f64);
            let r = record(Encoding::Bcd(*digits), ValueInformation::Volume, -3, bcd_bytes(*value, *digits));
            assert_eq!(decode(&r).unwrap().0, *value as f64 / 1000.0);
        }
    }

    #[test]
    fn test_bcd_sign_nibble_and_lvar_negative() {
        let r = record(Encoding::Bcd(4), ValueInformation::FlowTemperature, -1, vec![0x25, 0xF0]);
        assert_eq!(decode(&r).unwrap().0, -2.5);
        let r = record(Encoding::NegativeBcd(4), ValueInformation::FlowTemperature, 0, vec![0x25, 0x00]);
        assert_eq!(decode(&r).unwrap().0, -25.0);
    }

    #[test]
    fn test_bcd_invalid_digit() {
        let r = record(Encoding::Bcd(4), ValueInformation::Volume, 0, vec![0x1A, 0x00]);
        assert!(matches!(decode(&r), Err(MalformedRecord::InvalidDigit { offset: 2 })));
    }

    #[test]
    fn test_unsigned_integers() {
        let r = record(Encoding::Integer(1), ValueInformation::Volume, 0, vec![0xFF]);
        assert_eq!(decode(&r).unwrap().0, 255.0);
        let r = record(Encoding::Integer(2), ValueInformation::Volume, 0, vec![0x34, 0x12]);
        assert_eq!(decode(&r).unwrap().0, 4660.0);
        let r = record(Encoding::Integer(4), ValueInformation::Energy, 3, vec![0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(decode(&r).unwrap().0, 4294967295000.0);
        let r = record(Encoding::Integer(6), ValueInformation::Volume, 0, vec![0x01, 0, 0, 0, 0, 0x01]);
        assert_eq!(decode(&r).unwrap().0, 1099511627777.0);
    }

    #[test]
    fn test_signed_integers() {
        let r = record(Encoding::Integer(2), ValueInformation::FlowTemperature, -2, vec![0x0C, 0xFE]);
        assert_eq!(decode(&r).unwrap().0, -5.0);
        let r = record(Encoding::Integer(3), ValueInformation::Power, 0, vec![0xFF, 0xFF, 0xFF]);
        assert_eq!(decode(&r).unwrap().0, -1.0);
        let r = record(Encoding::Integer(8), ValueInformation::Power, 0, vec![0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(decode(&r).unwrap().0, -2.0);
        let r = record(Encoding::Integer(2), ValueInformation::Power, 0, vec![0xFF, 0x7F]);
        assert_eq!(decode(&r).unwrap().0, 32767.0);
    }

    #[test]
    fn test_real32() {
        let r = record(Encoding::Real32, ValueInformation::Power, 0, 1.5f32.to_le_bytes().to_vec());
        assert_eq!(decode(&r).unwrap().0, 1.5);
    }

    #[test]
    fn test_length_mismatch() {
        let r = record(Encoding::Bcd(8), ValueInformation::Energy, 0, vec![0x05, 0x12]);
        match decode(&r) {
            Err(MalformedRecord::LengthMismatch { expected, actual, .. }) => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 2);
            }
            other => panic!("expected length mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_text_and_wide_integers_are_rejected() {
        let r = record(Encoding::Text(2), ValueInformation::ModelVersion, 0, vec![b'A', b'B']);
        assert!(matches!(decode(&r), Err(MalformedRecord::NotNumeric { .. })));
        let r = record(Encoding::Integer(9), ValueInformation::Volume, 0, vec![0; 9]);
        assert!(matches!(decode(&r), Err(MalformedRecord::UnsupportedWidth { width: 9, .. })));
    }

    #[test]
    fn test_bcd_without_digits_is_not_a_number() {
        let r = record(Encoding::Bcd(0), ValueInformation::Energy, 0, vec![]);
        assert_eq!(decode(&r), Err(MalformedRecord::NotNumeric { offset: 0 }));
        let r = record(Encoding::NegativeBcd(0), ValueInformation::Energy, 0, vec![]);
        assert_eq!(decode(&r), Err(MalformedRecord::NotNumeric { offset: 0 }));
    }

    #[test]
    fn test_same_bytes_same_value() {
        let r = record(Encoding::Bcd(8), ValueInformation::Volume, -3, vec![0x56, 0x34, 0x12, 0x00]);
        let a = decode(&r).unwrap().0;
        let b = decode(&r.clone()).unwrap().0;
        assert_eq!(a.to_bits(), b.to_bits());
        assert_eq!(a, 123.456);
    }
}
