use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;

use crate::rules::Requirement::{self, MandatoryCanBeEmpty, Optional};

decl_module! {
    /// The Patient Module:
    /// identification and demographics of the patient.
    PatientModule, "PatientModule", Patient
}

impl PatientModule {
    const RULES: &'static [(Tag, VR, &'static str, Requirement)] = &[
        (tags::PATIENT_NAME, VR::PN, "1", MandatoryCanBeEmpty),
        (tags::PATIENT_ID, VR::LO, "1", MandatoryCanBeEmpty),
        (tags::ISSUER_OF_PATIENT_ID, VR::LO, "1", Optional),
        (tags::TYPE_OF_PATIENT_ID, VR::CS, "1", Optional),
        (tags::PATIENT_BIRTH_DATE, VR::DA, "1", MandatoryCanBeEmpty),
        (tags::PATIENT_BIRTH_TIME, VR::TM, "1", Optional),
        (tags::PATIENT_SEX, VR::CS, "1", MandatoryCanBeEmpty),
        (tags::QUALITY_CONTROL_SUBJECT, VR::CS, "1", Optional),
        (tags::PATIENT_COMMENTS, VR::LT, "1", Optional),
        (tags::ETHNIC_GROUP, VR::SH, "1", Optional),
    ];

    string_accessors! {
        PATIENT_NAME => patient_name, set_patient_name;
        PATIENT_ID => patient_id, set_patient_id;
        ISSUER_OF_PATIENT_ID => issuer_of_patient_id, set_issuer_of_patient_id;
        /// The type of the patient identifier (`TEXT`, `RFID` or `BARCODE`).
        TYPE_OF_PATIENT_ID => type_of_patient_id, set_type_of_patient_id;
        PATIENT_BIRTH_DATE => patient_birth_date, set_patient_birth_date;
        PATIENT_BIRTH_TIME => patient_birth_time, set_patient_birth_time;
        /// `M`, `F` or `O`.
        PATIENT_SEX => patient_sex, set_patient_sex;
        QUALITY_CONTROL_SUBJECT => quality_control_subject, set_quality_control_subject;
        PATIENT_COMMENTS => patient_comments, set_patient_comments;
        ETHNIC_GROUP => ethnic_group, set_ethnic_group;
    }
}
