use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;
use tracing::{debug, warn};

use crate::dataset::DataSetExt;
use crate::rules::Requirement::{self, ConditionalMandatory, Mandatory, Optional};
use crate::util::{create_uid, current_date, current_time, is_valid_uid};
use crate::Result;

decl_module! {
    /// The SOP Common Module:
    /// SOP class and instance identification.
    SopCommonModule, "SOPCommonModule", Instance
}

impl SopCommonModule {
    const RULES: &'static [(Tag, VR, &'static str, Requirement)] = &[
        (tags::SOP_CLASS_UID, VR::UI, "1", Mandatory),
        (tags::SOP_INSTANCE_UID, VR::UI, "1", Mandatory),
        (tags::SPECIFIC_CHARACTER_SET, VR::CS, "1-n", ConditionalMandatory),
        (tags::INSTANCE_CREATION_DATE, VR::DA, "1", Optional),
        (tags::INSTANCE_CREATION_TIME, VR::TM, "1", Optional),
        (tags::INSTANCE_CREATOR_UID, VR::UI, "1", Optional),
        (tags::TIMEZONE_OFFSET_FROM_UTC, VR::SH, "1", Optional),
        (tags::INSTANCE_NUMBER, VR::IS, "1", Optional),
    ];

    string_accessors! {
        SOP_CLASS_UID => sop_class_uid, set_sop_class_uid;
        SOP_INSTANCE_UID => sop_instance_uid, set_sop_instance_uid;
        /// The first specific character set.
        SPECIFIC_CHARACTER_SET => specific_character_set, set_specific_character_set;
        INSTANCE_CREATION_DATE => instance_creation_date, set_instance_creation_date;
        INSTANCE_CREATION_TIME => instance_creation_time, set_instance_creation_time;
        INSTANCE_CREATOR_UID => instance_creator_uid, set_instance_creator_uid;
        /// Offset from UTC as `&ZZXX`, e.g. `+0100`.
        TIMEZONE_OFFSET_FROM_UTC => timezone_offset_from_utc, set_timezone_offset_from_utc;
    }

    /// All specific character sets, joined by backslashes.
    pub fn specific_character_sets(&self) -> Option<String> {
        self.component.joined_string(tags::SPECIFIC_CHARACTER_SET)
    }

    pub fn instance_number(&self) -> Option<i32> {
        self.component
            .data()
            .int32_values(tags::INSTANCE_NUMBER)
            .and_then(|v| v.first().copied())
    }

    pub fn set_instance_number(&self, number: i32, check: bool) -> Result<()> {
        self.component
            .set_int_string(tags::INSTANCE_NUMBER, i64::from(number), check)
    }

    /// Record the current date and time as the instance creation time.
    pub fn set_instance_creation_now(&self) -> Result<()> {
        self.set_instance_creation_date(&current_date(), true)?;
        self.set_instance_creation_time(&current_time(), true)
    }

    /// Make sure there is a SOP Instance UID,
    /// creating one (under `root`, if given) when it is missing
    /// or, if `correct_invalid` is set, when it is not a valid UID.
    ///
    /// Returns whether a new UID was created.
    pub fn ensure_instance_uid(&self, correct_invalid: bool, root: Option<&str>) -> bool {
        ensure_uid(&self.component, tags::SOP_INSTANCE_UID, correct_invalid, root)
    }
}

/// Make sure the UID attribute `tag` of `component` has a (valid) value.
pub(crate) fn ensure_uid(
    component: &crate::component::Component,
    tag: Tag,
    correct_invalid: bool,
    root: Option<&str>,
) -> bool {
    match component.string(tag) {
        Some(uid) if !correct_invalid || is_valid_uid(&uid) => false,
        current => {
            if let Some(invalid) = current {
                warn!("Replacing invalid UID {} in {}", invalid, tag);
            }
            let uid = create_uid(root);
            debug!("Creating new UID {} for {}", uid, tag);
            // generated UIDs are valid by construction
            let _ = component.set_string(tag, &uid, false);
            true
        }
    }
}
