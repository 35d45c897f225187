use crate::models::{LinkMode, MeterInfo, PrintProperties};
use crate::units::{Quantity, Unit};
use crate::wmbus::resolver::FieldSelector;
use crate::wmbus::structs::{MeasurementType, ValueInformation};

use super::{DriverDefinition, FieldSpec, Meter, TableDriver};

const fn now(info: ValueInformation) -> FieldSelector {
    return FieldSelector::new(MeasurementType::Instantaneous, info).storage(0).tariff(0);
}

/* Diehl Sharky 775 heat meter, TCH variant */
pub static DRIVER: DriverDefinition = DriverDefinition {
    name: "sharkytch",
    description: "Diehl Sharky 775 heat meter",
    media: "heat",
    link_modes: &[LinkMode::T1],
    fields: &[
        FieldSpec {
            name: "total_energy_consumption",
            quantity: Quantity::Energy,
            unit: Unit::KWH,
            selector: now(ValueInformation::Energy),
            description: "The total energy consumption recorded by this meter.",
            explanation: "total energy consumption",
            properties: PrintProperties::ALL,
        },
        FieldSpec {
            name: "total_volume",
            quantity: Quantity::Volume,
            unit: Unit::M3,
            selector: now(ValueInformation::Volume),
            description: "The total volume recorded by this meter.",
            explanation: "total volume",
            properties: PrintProperties::ALL,
        },
        FieldSpec {
            name: "volume_flow",
            quantity: Quantity::VolumeFlow,
            unit: Unit::M3H,
            selector: now(ValueInformation::VolumeFlow),
            description: "The current flow.",
            explanation: "volume flow",
            properties: PrintProperties::ALL,
        },
        FieldSpec {
            name: "power",
            quantity: Quantity::Power,
            unit: Unit::KW,
            selector: now(ValueInformation::Power),
            description: "The power.",
            explanation: "power",
            properties: PrintProperties::ALL,
        },
        FieldSpec {
            name: "flow_temperature",
            quantity: Quantity::Temperature,
            unit: Unit::C,
            selector: now(ValueInformation::FlowTemperature),
            description: "The flow temperature.",
            explanation: "flow temperature",
            properties: PrintProperties::ALL,
        },
        FieldSpec {
            name: "return_temperature",
            quantity: Quantity::Temperature,
            unit: Unit::C,
            selector: now(ValueInformation::ReturnTemperature),
            description: "The return temperature.",
            explanation: "return temperature",
            properties: PrintProperties::ALL,
        },
        FieldSpec {
            name: "total_energy_consumption_tariff1",
            quantity: Quantity::Energy,
            unit: Unit::KWH,
            selector: FieldSelector::new(MeasurementType::Instantaneous, ValueInformation::Energy).storage(0).tariff(1),
            description: "The total energy consumption recorded by this meter on tariff 1.",
            explanation: "total energy tariff 1",
            properties: PrintProperties::ALL,
        },
        FieldSpec {
            name: "operating_time",
            quantity: Quantity::Time,
            unit: Unit::Hour,
            selector: now(ValueInformation::OperatingTime),
            description: "How long the meter has been in operation.",
            explanation: "operating time",
            properties: PrintProperties::JSON,
        },
    ],
};

pub fn create(info: MeterInfo) -> Box<dyn Meter> {
    return Box::new(TableDriver::new(&DRIVER, info));
}
