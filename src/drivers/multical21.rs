use crate::models::{LinkMode, MeterInfo, PrintProperties};
use crate::units::{Quantity, Unit};
use crate::wmbus::resolver::FieldSelector;
use crate::wmbus::structs::{MeasurementType, ValueInformation};

use super::{DriverDefinition, FieldSpec, Meter, TableDriver};

/* Kamstrup Multical 21 cold and warm water meter, long frame records */
pub static DRIVER: DriverDefinition = DriverDefinition {
    name: "multical21",
    description: "Kamstrup Multical 21 water meter",
    media: "water",
    link_modes: &[LinkMode::C1],
    fields: &[
        FieldSpec {
            name: "total_volume",
            quantity: Quantity::Volume,
            unit: Unit::M3,
            selector: FieldSelector::new(MeasurementType::Instantaneous, ValueInformation::Volume).storage(0),
            description: "The total water consumption recorded by this meter.",
            explanation: "total volume",
            properties: PrintProperties::ALL,
        },
        /* Reading at the end of the last billing period */
        FieldSpec {
            name: "target_volume",
            quantity: Quantity::Volume,
            unit: Unit::M3,
            selector: FieldSelector::new(MeasurementType::Instantaneous, ValueInformation::Volume).storage(1),
            description: "The total water consumption recorded at the beginning of this month.",
            explanation: "target volume",
            properties: PrintProperties::ALL,
        },
        FieldSpec {
            name: "flow_temperature",
            quantity: Quantity::Temperature,
            unit: Unit::C,
            selector: FieldSelector::new(MeasurementType::Minimum, ValueInformation::FlowTemperature),
            description: "The water temperature.",
            explanation: "flow temperature",
            properties: PrintProperties::JSON,
        },
        FieldSpec {
            name: "external_temperature",
            quantity: Quantity::Temperature,
            unit: Unit::C,
            selector: FieldSelector::new(MeasurementType::Minimum, ValueInformation::ExternalTemperature),
            description: "The external temperature outside of the meter.",
            explanation: "external temperature",
            properties: PrintProperties::JSON,
        },
    ],
};

pub fn create(info: MeterInfo) -> Box<dyn Meter> {
    return Box::new(TableDriver::new(&DRIVER, info));
}
