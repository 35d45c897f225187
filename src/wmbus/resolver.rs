use serde::Serialize;

use super::structs::{DataRecord, MeasurementType, Telegram, ValueInformation};

/// Which record a driver field is read from.
///
/// Address dimensions left as `None` match any record value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldSelector {
    pub measurement: MeasurementType,
    pub info: ValueInformation,
    pub storage: Option<u64>,
    pub tariff: Option<u32>,
    pub subunit: Option<u32>,
}

impl FieldSelector {
    pub const fn new(measurement: MeasurementType, info: ValueInformation) -> Self {
        FieldSelector { measurement, info, storage: None, tariff: None, subunit: None }
    }

    pub const fn storage(mut self, storage: u64) -> Self {
        self.storage = Some(storage);
        self
    }

    pub const fn tariff(mut self, tariff: u32) -> Self {
        self.tariff = Some(tariff);
        self
    }

    pub const fn subunit(mut self, subunit: u32) -> Self {
        self.subunit = Some(subunit);
        self
    }

    pub fn matches(&self, record: &DataRecord) -> bool {
        if record.measurement != self.measurement || record.quantity.info != self.info {
            return false;
        }
        if self.storage.is_some_and(|s| s != record.address.storage) {
            return false;
        }
        if self.tariff.is_some_and(|t| t != record.address.tariff) {
            return false;
        }
        if self.subunit.is_some_and(|s| s != record.address.subunit) {
            return false;
        }
        return true;
    }
}

/// First record in telegram order matching the selector.
///
/// `None` only means the meter did not send this value this time.
pub fn resolve<'a>(telegram: &'a Telegram, selector: &FieldSelector) -> Option<&'a DataRecord> {
    return telegram.records().iter().find(|r| selector.matches(r));
}
