use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;

use crate::rules::Requirement::{self, MandatoryCanBeEmpty, Optional};
use crate::Result;

decl_module! {
    /// The General Equipment Module:
    /// the device which produced the instances of a series.
    GeneralEquipmentModule, "GeneralEquipmentModule", Equipment
}

impl GeneralEquipmentModule {
    const RULES: &'static [(Tag, VR, &'static str, Requirement)] = &[
        (tags::MANUFACTURER, VR::LO, "1", MandatoryCanBeEmpty),
        (tags::INSTITUTION_NAME, VR::LO, "1", Optional),
        (tags::INSTITUTION_ADDRESS, VR::ST, "1", Optional),
        (tags::STATION_NAME, VR::SH, "1", Optional),
        (tags::INSTITUTIONAL_DEPARTMENT_NAME, VR::LO, "1", Optional),
        (tags::MANUFACTURER_MODEL_NAME, VR::LO, "1", Optional),
        (tags::DEVICE_SERIAL_NUMBER, VR::LO, "1", Optional),
        (tags::SOFTWARE_VERSIONS, VR::LO, "1-n", Optional),
    ];

    string_accessors! {
        MANUFACTURER => manufacturer, set_manufacturer;
        INSTITUTION_NAME => institution_name, set_institution_name;
        INSTITUTION_ADDRESS => institution_address, set_institution_address;
        STATION_NAME => station_name, set_station_name;
        INSTITUTIONAL_DEPARTMENT_NAME => institutional_department_name, set_institutional_department_name;
        MANUFACTURER_MODEL_NAME => manufacturer_model_name, set_manufacturer_model_name;
        DEVICE_SERIAL_NUMBER => device_serial_number, set_device_serial_number;
    }

    pub fn software_versions(&self) -> Vec<String> {
        self.component.strings(tags::SOFTWARE_VERSIONS)
    }

    pub fn set_software_versions(&self, versions: &[String], check: bool) -> Result<()> {
        self.component
            .set_strings(tags::SOFTWARE_VERSIONS, versions, check)
    }
}
