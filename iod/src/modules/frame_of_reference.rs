use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;

use crate::rules::Requirement::{self, Mandatory, MandatoryCanBeEmpty};

decl_module! {
    /// The Frame of Reference Module:
    /// the spatial frame shared by images of one or more series.
    FrameOfReferenceModule, "FrameOfReferenceModule", FrameOfReference
}

impl FrameOfReferenceModule {
    const RULES: &'static [(Tag, VR, &'static str, Requirement)] = &[
        (tags::FRAME_OF_REFERENCE_UID, VR::UI, "1", Mandatory),
        (tags::POSITION_REFERENCE_INDICATOR, VR::LO, "1", MandatoryCanBeEmpty),
    ];

    string_accessors! {
        FRAME_OF_REFERENCE_UID => frame_of_reference_uid, set_frame_of_reference_uid;
        /// The anatomical reference point, e.g. `XY` or `IL`.
        POSITION_REFERENCE_INDICATOR => position_reference_indicator, set_position_reference_indicator;
    }
}
