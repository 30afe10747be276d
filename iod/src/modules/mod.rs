//! Modules: the attribute groups an IOD is assembled from.
//!
//! Every module wraps a [`Component`](crate::component::Component)
//! and can be created either with its own data set and rules
//! (`new`) or viewing those of an IOD (`new_shared`).

/// Declare a module type whose behavior is entirely rule driven,
/// with its rules given by an associated `RULES` table.
macro_rules! decl_module {
    ($(#[$meta: meta])* $typ: ident, $name: literal, $level: ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $typ {
            component: crate::component::Component,
        }

        impl $typ {
            pub const NAME: &'static str = $name;

            pub fn new() -> Self {
                Self::from_component(crate::component::Component::new(Self::NAME))
            }

            /// Create the module viewing the given data set and rules.
            pub fn new_shared(
                data: crate::component::SharedDataSet,
                rules: crate::component::SharedRules,
            ) -> Self {
                Self::from_component(crate::component::Component::new_shared(
                    Self::NAME,
                    data,
                    rules,
                ))
            }

            fn from_component(component: crate::component::Component) -> Self {
                let mut module = $typ { component };
                crate::component::IodComponent::reset_rules(&mut module);
                module
            }
        }

        impl Default for $typ {
            fn default() -> Self {
                Self::new()
            }
        }

        impl crate::component::IodComponent for $typ {
            fn component(&self) -> &crate::component::Component {
                &self.component
            }

            fn component_mut(&mut self) -> &mut crate::component::Component {
                &mut self.component
            }

            fn reset_rules(&mut self) {
                self.component
                    .declare_rules(crate::rules::Level::$level, Self::RULES);
            }
        }
    };
}

/// Implement a getter and a checking setter per textual attribute.
macro_rules! string_accessors {
    ($($(#[$meta: meta])* $tag: ident => $get: ident, $set: ident;)*) => {
        $(
            $(#[$meta])*
            pub fn $get(&self) -> Option<String> {
                self.component.string(dicom_dictionary_std::tags::$tag)
            }

            pub fn $set(&self, value: &str, check: bool) -> crate::Result<()> {
                self.component
                    .set_string(dicom_dictionary_std::tags::$tag, value, check)
            }
        )*
    };
}

mod common_instance_reference;
mod enhanced_equipment;
mod enhanced_us_image;
mod frame_of_reference;
mod functional_groups;
mod general_equipment;
mod general_image;
mod general_series;
mod general_study;
mod icc_profile;
mod multiframe_dimension;
mod palette_lut;
mod patient;
mod patient_study;
pub(crate) mod sop_common;

pub use common_instance_reference::{CommonInstanceReferenceModule, StudyReferenceItem};
pub use enhanced_equipment::EnhancedEquipmentModule;
pub use enhanced_us_image::{EnhancedUsImageModule, PixelDataCharacteristics};
pub use frame_of_reference::FrameOfReferenceModule;
pub use functional_groups::FunctionalGroupsModule;
pub use general_equipment::GeneralEquipmentModule;
pub use general_image::GeneralImageModule;
pub use general_series::GeneralSeriesModule;
pub use general_study::GeneralStudyModule;
pub use icc_profile::IccProfileModule;
pub use multiframe_dimension::{
    DimensionIndexItem, DimensionOrganizationItem, MultiframeDimensionModule,
};
pub use palette_lut::{pack_8bit, unpack_8bit, Channel, LutDescriptor, PaletteColorLutModule};
pub use patient::PatientModule;
pub use patient_study::PatientStudyModule;
pub use sop_common::SopCommonModule;
