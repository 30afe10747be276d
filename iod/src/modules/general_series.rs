use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;

use crate::dataset::DataSetExt;
use crate::rules::Requirement::{
    self, ConditionalMandatoryCanBeEmpty, Mandatory, MandatoryCanBeEmpty, Optional,
};

decl_module! {
    /// The General Series Module.
    GeneralSeriesModule, "GeneralSeriesModule", Series
}

impl GeneralSeriesModule {
    const RULES: &'static [(Tag, VR, &'static str, Requirement)] = &[
        (tags::MODALITY, VR::CS, "1", Mandatory),
        (tags::SERIES_INSTANCE_UID, VR::UI, "1", Mandatory),
        (tags::SERIES_NUMBER, VR::IS, "1", MandatoryCanBeEmpty),
        (tags::LATERALITY, VR::CS, "1", ConditionalMandatoryCanBeEmpty),
        (tags::SERIES_DATE, VR::DA, "1", Optional),
        (tags::SERIES_TIME, VR::TM, "1", Optional),
        (tags::PERFORMING_PHYSICIAN_NAME, VR::PN, "1-n", Optional),
        (tags::PROTOCOL_NAME, VR::LO, "1", Optional),
        (tags::SERIES_DESCRIPTION, VR::LO, "1", Optional),
        (tags::OPERATORS_NAME, VR::PN, "1-n", Optional),
        (tags::BODY_PART_EXAMINED, VR::CS, "1", Optional),
        (tags::PATIENT_POSITION, VR::CS, "1", ConditionalMandatoryCanBeEmpty),
        (tags::PERFORMED_PROCEDURE_STEP_START_DATE, VR::DA, "1", Optional),
        (tags::PERFORMED_PROCEDURE_STEP_START_TIME, VR::TM, "1", Optional),
        (tags::PERFORMED_PROCEDURE_STEP_ID, VR::SH, "1", Optional),
        (tags::PERFORMED_PROCEDURE_STEP_DESCRIPTION, VR::LO, "1", Optional),
    ];

    string_accessors! {
        MODALITY => modality, set_modality;
        SERIES_INSTANCE_UID => series_instance_uid, set_series_instance_uid;
        /// `R` or `L`, for paired body parts.
        LATERALITY => laterality, set_laterality;
        SERIES_DATE => series_date, set_series_date;
        SERIES_TIME => series_time, set_series_time;
        PROTOCOL_NAME => protocol_name, set_protocol_name;
        SERIES_DESCRIPTION => series_description, set_series_description;
        BODY_PART_EXAMINED => body_part_examined, set_body_part_examined;
        PATIENT_POSITION => patient_position, set_patient_position;
        PERFORMED_PROCEDURE_STEP_START_DATE => performed_procedure_step_start_date, set_performed_procedure_step_start_date;
        PERFORMED_PROCEDURE_STEP_START_TIME => performed_procedure_step_start_time, set_performed_procedure_step_start_time;
        PERFORMED_PROCEDURE_STEP_ID => performed_procedure_step_id, set_performed_procedure_step_id;
        PERFORMED_PROCEDURE_STEP_DESCRIPTION => performed_procedure_step_description, set_performed_procedure_step_description;
    }

    pub fn series_number(&self) -> Option<i32> {
        self.component
            .data()
            .int32_values(tags::SERIES_NUMBER)
            .and_then(|v| v.first().copied())
    }

    pub fn set_series_number(&self, number: i32, check: bool) -> crate::Result<()> {
        self.component
            .set_int_string(tags::SERIES_NUMBER, i64::from(number), check)
    }

    pub fn performing_physician_name(&self) -> Vec<String> {
        self.component.strings(tags::PERFORMING_PHYSICIAN_NAME)
    }

    pub fn set_performing_physician_name(&self, names: &[String], check: bool) -> crate::Result<()> {
        self.component
            .set_strings(tags::PERFORMING_PHYSICIAN_NAME, names, check)
    }

    pub fn operators_name(&self) -> Vec<String> {
        self.component.strings(tags::OPERATORS_NAME)
    }

    pub fn set_operators_name(&self, names: &[String], check: bool) -> crate::Result<()> {
        self.component.set_strings(tags::OPERATORS_NAME, names, check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::IodComponent;
    use crate::dataset::DataSet;

    #[test]
    fn series_round_trip() {
        let mut series = GeneralSeriesModule::new();
        series.set_modality("SEG", true).unwrap();
        series.set_series_instance_uid("1.2.3.4.5", true).unwrap();
        series.set_series_number(7, true).unwrap();
        assert!(series.set_laterality("left", true).is_err());

        let mut out = DataSet::new_empty();
        series.write(&mut out).unwrap();
        assert_eq!(out.string(tags::SERIES_NUMBER).as_deref(), Some("7"));
        // 2C attributes are not written when absent
        assert!(!out.contains(tags::LATERALITY));

        let mut other = GeneralSeriesModule::new();
        other.read(&out, true).unwrap();
        assert_eq!(other.series_number(), Some(7));
        assert_eq!(other.modality().as_deref(), Some("SEG"));
    }
}
