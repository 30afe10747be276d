use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;

use crate::rules::Requirement::{self, Mandatory};
use crate::Result;

decl_module! {
    /// The Enhanced General Equipment Module.
    ///
    /// Its attributes are also part of the General Equipment Module,
    /// but all of type 1.
    /// When both view the same rules, the rules declared last take over
    /// the common attributes.
    EnhancedEquipmentModule, "EnhancedGeneralEquipmentModule", Equipment
}

impl EnhancedEquipmentModule {
    const RULES: &'static [(Tag, VR, &'static str, Requirement)] = &[
        (tags::MANUFACTURER, VR::LO, "1", Mandatory),
        (tags::MANUFACTURER_MODEL_NAME, VR::LO, "1", Mandatory),
        (tags::DEVICE_SERIAL_NUMBER, VR::LO, "1", Mandatory),
        (tags::SOFTWARE_VERSIONS, VR::LO, "1-n", Mandatory),
    ];

    string_accessors! {
        MANUFACTURER => manufacturer, set_manufacturer;
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
