use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;

use crate::dataset::DataSetExt;
use crate::rules::Requirement::{self, Optional};
use crate::Result;

decl_module! {
    /// The Patient Study Module:
    /// patient information relevant at the time of the study.
    PatientStudyModule, "PatientStudyModule", Study
}

impl PatientStudyModule {
    const RULES: &'static [(Tag, VR, &'static str, Requirement)] = &[
        (tags::ADMITTING_DIAGNOSES_DESCRIPTION, VR::LO, "1-n", Optional),
        (tags::PATIENT_AGE, VR::AS, "1", Optional),
        (tags::PATIENT_SIZE, VR::DS, "1", Optional),
        (tags::PATIENT_WEIGHT, VR::DS, "1", Optional),
        (tags::MEDICAL_ALERTS, VR::LO, "1-n", Optional),
        (tags::ALLERGIES, VR::LO, "1-n", Optional),
        (tags::OCCUPATION, VR::SH, "1", Optional),
        (tags::SMOKING_STATUS, VR::CS, "1", Optional),
        (tags::ADDITIONAL_PATIENT_HISTORY, VR::LT, "1", Optional),
        (tags::PREGNANCY_STATUS, VR::US, "1", Optional),
        (tags::PATIENT_SEX_NEUTERED, VR::CS, "1", Optional),
    ];

    string_accessors! {
        /// The patient's age, e.g. `045Y`.
        PATIENT_AGE => patient_age, set_patient_age;
        OCCUPATION => occupation, set_occupation;
        /// `YES`, `NO` or `UNKNOWN`.
        SMOKING_STATUS => smoking_status, set_smoking_status;
        ADDITIONAL_PATIENT_HISTORY => additional_patient_history, set_additional_patient_history;
        PATIENT_SEX_NEUTERED => patient_sex_neutered, set_patient_sex_neutered;
    }

    pub fn admitting_diagnoses_description(&self) -> Vec<String> {
        self.component.strings(tags::ADMITTING_DIAGNOSES_DESCRIPTION)
    }

    pub fn set_admitting_diagnoses_description(&self, values: &[String], check: bool) -> Result<()> {
        self.component
            .set_strings(tags::ADMITTING_DIAGNOSES_DESCRIPTION, values, check)
    }

    pub fn medical_alerts(&self) -> Vec<String> {
        self.component.strings(tags::MEDICAL_ALERTS)
    }

    pub fn set_medical_alerts(&self, values: &[String], check: bool) -> Result<()> {
        self.component.set_strings(tags::MEDICAL_ALERTS, values, check)
    }

    pub fn allergies(&self) -> Vec<String> {
        self.component.strings(tags::ALLERGIES)
    }

    pub fn set_allergies(&self, values: &[String], check: bool) -> Result<()> {
        self.component.set_strings(tags::ALLERGIES, values, check)
    }

    /// Patient size in meters.
    pub fn patient_size(&self) -> Option<f64> {
        self.component.data().float64(tags::PATIENT_SIZE, 0)
    }

    pub fn set_patient_size(&self, meters: f64, check: bool) -> Result<()> {
        self.component.set_decimals(tags::PATIENT_SIZE, &[meters], check)
    }

    /// Patient weight in kilograms.
    pub fn patient_weight(&self) -> Option<f64> {
        self.component.data().float64(tags::PATIENT_WEIGHT, 0)
    }

    pub fn set_patient_weight(&self, kilograms: f64, check: bool) -> Result<()> {
        self.component
            .set_decimals(tags::PATIENT_WEIGHT, &[kilograms], check)
    }

    /// Pregnancy status (1: not pregnant, 2: possibly pregnant,
    /// 3: definitely pregnant, 4: unknown).
    pub fn pregnancy_status(&self) -> Option<u16> {
        self.component.uint16(tags::PREGNANCY_STATUS, 0).ok()
    }

    pub fn set_pregnancy_status(&self, status: u16, check: bool) -> Result<()> {
        self.component
            .set_uint16s(tags::PREGNANCY_STATUS, &[status], check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::IodComponent;
    use crate::dataset::DataSet;

    #[test]
    fn numeric_attributes() {
        let mut study = PatientStudyModule::new();
        study.set_patient_weight(72.5, true).unwrap();
        study.set_patient_size(1.8, true).unwrap();
        study.set_pregnancy_status(4, true).unwrap();
        study.set_patient_age("045Y", true).unwrap();
        assert!(study.set_patient_age("45 years", true).is_err());
        assert_eq!(study.patient_weight(), Some(72.5));
        assert_eq!(study.pregnancy_status(), Some(4));

        let mut out = DataSet::new_empty();
        study.write(&mut out).unwrap();
        assert_eq!(out.string(tags::PATIENT_WEIGHT).as_deref(), Some("72.5"));
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn multibyte_age_is_reported_on_read() {
        let mut source = DataSet::new_empty();
        source.put_str(tags::PATIENT_AGE, VR::AS, "00é");
        let mut study = PatientStudyModule::new();
        let errors = study.component_mut().read_attributes(&source, true);
        assert!(matches!(
            errors.as_slice(),
            [crate::Error::InvalidCharacter { tag, .. }] if *tag == tags::PATIENT_AGE
        ));
        assert!(study.set_patient_age("00é", true).is_err());
    }

    #[test]
    fn multi_valued_attributes() {
        let study = PatientStudyModule::new();
        let alerts = vec!["Pacemaker".to_string(), "Claustrophobia".to_string()];
        study.set_medical_alerts(&alerts, true).unwrap();
        assert_eq!(study.medical_alerts(), alerts);
        assert!(study.allergies().is_empty());
    }
}
