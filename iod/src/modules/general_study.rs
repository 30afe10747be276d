use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;

use crate::rules::Requirement::{self, Mandatory, MandatoryCanBeEmpty, Optional};

decl_module! {
    /// The General Study Module.
    GeneralStudyModule, "GeneralStudyModule", Study
}

impl GeneralStudyModule {
    const RULES: &'static [(Tag, VR, &'static str, Requirement)] = &[
        (tags::STUDY_INSTANCE_UID, VR::UI, "1", Mandatory),
        (tags::STUDY_DATE, VR::DA, "1", MandatoryCanBeEmpty),
        (tags::STUDY_TIME, VR::TM, "1", MandatoryCanBeEmpty),
        (tags::REFERRING_PHYSICIAN_NAME, VR::PN, "1", MandatoryCanBeEmpty),
        (tags::STUDY_ID, VR::SH, "1", MandatoryCanBeEmpty),
        (tags::ACCESSION_NUMBER, VR::SH, "1", MandatoryCanBeEmpty),
        (tags::STUDY_DESCRIPTION, VR::LO, "1", Optional),
        (tags::PHYSICIANS_OF_RECORD, VR::PN, "1-n", Optional),
        (tags::NAME_OF_PHYSICIANS_READING_STUDY, VR::PN, "1-n", Optional),
    ];

    string_accessors! {
        STUDY_INSTANCE_UID => study_instance_uid, set_study_instance_uid;
        STUDY_DATE => study_date, set_study_date;
        STUDY_TIME => study_time, set_study_time;
        REFERRING_PHYSICIAN_NAME => referring_physician_name, set_referring_physician_name;
        STUDY_ID => study_id, set_study_id;
        ACCESSION_NUMBER => accession_number, set_accession_number;
        STUDY_DESCRIPTION => study_description, set_study_description;
    }

    pub fn physicians_of_record(&self) -> Vec<String> {
        self.component.strings(tags::PHYSICIANS_OF_RECORD)
    }

    pub fn set_physicians_of_record(&self, names: &[String], check: bool) -> crate::Result<()> {
        self.component
            .set_strings(tags::PHYSICIANS_OF_RECORD, names, check)
    }

    pub fn name_of_physicians_reading_study(&self) -> Vec<String> {
        self.component.strings(tags::NAME_OF_PHYSICIANS_READING_STUDY)
    }

    pub fn set_name_of_physicians_reading_study(
        &self,
        names: &[String],
        check: bool,
    ) -> crate::Result<()> {
        self.component
            .set_strings(tags::NAME_OF_PHYSICIANS_READING_STUDY, names, check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::IodComponent;
    use crate::dataset::{DataSet, DataSetExt};
    use crate::Error;

    #[test]
    fn study_instance_uid_is_required() {
        let mut study = GeneralStudyModule::new();
        let mut out = DataSet::new_empty();
        assert!(matches!(
            study.write(&mut out),
            Err(Error::MissingAttribute { tag, .. }) if tag == tags::STUDY_INSTANCE_UID
        ));
        // the type 2 attributes are written regardless
        assert_eq!(out.len(), 5);

        study.set_study_instance_uid("1.2.3.4", true).unwrap();
        assert!(study.set_study_instance_uid("1.2.03", true).is_err());
        assert_eq!(study.write(&mut out), Ok(()));
        assert_eq!(out.len(), 6);
    }
}
