use dicom_core::value::PrimitiveValue;
use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;

use crate::dataset::DataSetExt;
use crate::rules::Requirement::{self, Mandatory, Optional};
use crate::Result;

decl_module! {
    /// The ICC Profile Module: the color characteristics of an image.
    IccProfileModule, "ICCProfileModule", Image
}

impl IccProfileModule {
    const RULES: &'static [(Tag, VR, &'static str, Requirement)] = &[
        (tags::ICC_PROFILE, VR::OB, "1", Mandatory),
        (tags::COLOR_SPACE, VR::CS, "1", Optional),
    ];

    string_accessors! {
        /// The color space of the profile, e.g. `SRGB`.
        COLOR_SPACE => color_space, set_color_space;
    }

    /// The raw ICC profile.
    pub fn icc_profile(&self) -> Option<Vec<u8>> {
        self.component.data().bytes(tags::ICC_PROFILE)
    }

    pub fn set_icc_profile(&self, profile: &[u8], check: bool) -> Result<()> {
        self.component.set_primitive(
            tags::ICC_PROFILE,
            PrimitiveValue::U8(profile.iter().copied().collect()),
            check,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::IodComponent;
    use crate::dataset::DataSet;

    #[test]
    fn profile_round_trip() {
        let mut module = IccProfileModule::new();
        let mut out = DataSet::new_empty();
        assert!(module.write(&mut out).is_err());

        let profile = [0x00, 0x00, 0x02, 0x0C, 0x6C, 0x63, 0x6D, 0x73];
        module.set_icc_profile(&profile, true).unwrap();
        module.set_color_space("SRGB", true).unwrap();
        module.write(&mut out).unwrap();

        let mut read = IccProfileModule::new();
        read.read(&out, true).unwrap();
        assert_eq!(read.icc_profile().as_deref(), Some(&profile[..]));
        assert_eq!(read.color_space().as_deref(), Some("SRGB"));
    }
}
