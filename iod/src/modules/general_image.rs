use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;

use crate::component::{Component, IodComponent, SharedDataSet, SharedRules};
use crate::dataset::DataSetExt;
use crate::rules::Requirement::{
    self, ConditionalMandatoryCanBeEmpty, MandatoryCanBeEmpty, Optional,
};
use crate::rules::{Level, Rule};
use crate::Result;

/// The General Image Module.
///
/// Burned In Annotation defaults to `NO`.
#[derive(Debug, Clone)]
pub struct GeneralImageModule {
    component: Component,
}

impl GeneralImageModule {
    pub const NAME: &'static str = "GeneralImageModule";

    const RULES: &'static [(Tag, VR, &'static str, Requirement)] = &[
        (tags::INSTANCE_NUMBER, VR::IS, "1", MandatoryCanBeEmpty),
        (tags::PATIENT_ORIENTATION, VR::CS, "2", ConditionalMandatoryCanBeEmpty),
        (tags::CONTENT_DATE, VR::DA, "1", ConditionalMandatoryCanBeEmpty),
        (tags::CONTENT_TIME, VR::TM, "1", ConditionalMandatoryCanBeEmpty),
        (tags::IMAGE_TYPE, VR::CS, "2-n", Optional),
        (tags::ACQUISITION_NUMBER, VR::IS, "1", Optional),
        (tags::ACQUISITION_DATE, VR::DA, "1", Optional),
        (tags::ACQUISITION_TIME, VR::TM, "1", Optional),
        (tags::ACQUISITION_DATE_TIME, VR::DT, "1", Optional),
        (tags::IMAGES_IN_ACQUISITION, VR::IS, "1", Optional),
        (tags::IMAGE_COMMENTS, VR::LT, "1", Optional),
        (tags::QUALITY_CONTROL_IMAGE, VR::CS, "1", Optional),
        (tags::LOSSY_IMAGE_COMPRESSION, VR::CS, "1", Optional),
    ];

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    pub fn new_shared(data: SharedDataSet, rules: SharedRules) -> Self {
        Self::from_component(Component::new_shared(Self::NAME, data, rules))
    }

    fn from_component(component: Component) -> Self {
        let mut module = GeneralImageModule { component };
        module.reset_rules();
        module
    }

    string_accessors! {
        CONTENT_DATE => content_date, set_content_date;
        CONTENT_TIME => content_time, set_content_time;
        ACQUISITION_DATE => acquisition_date, set_acquisition_date;
        ACQUISITION_TIME => acquisition_time, set_acquisition_time;
        ACQUISITION_DATE_TIME => acquisition_date_time, set_acquisition_date_time;
        IMAGE_COMMENTS => image_comments, set_image_comments;
        QUALITY_CONTROL_IMAGE => quality_control_image, set_quality_control_image;
        /// `YES` or `NO`.
        BURNED_IN_ANNOTATION => burned_in_annotation, set_burned_in_annotation;
        /// `00` if the image never underwent lossy compression, `01` otherwise.
        LOSSY_IMAGE_COMPRESSION => lossy_image_compression, set_lossy_image_compression;
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

    /// The row and column directions, e.g. `["A", "F"]`.
    pub fn patient_orientation(&self) -> Vec<String> {
        self.component.strings(tags::PATIENT_ORIENTATION)
    }

    pub fn set_patient_orientation(&self, row: &str, column: &str, check: bool) -> Result<()> {
        self.component.set_strings(
            tags::PATIENT_ORIENTATION,
            &[row.to_string(), column.to_string()],
            check,
        )
    }

    pub fn image_type(&self) -> Vec<String> {
        self.component.strings(tags::IMAGE_TYPE)
    }

    pub fn set_image_type(&self, values: &[String], check: bool) -> Result<()> {
        self.component.set_strings(tags::IMAGE_TYPE, values, check)
    }

    pub fn acquisition_number(&self) -> Option<i32> {
        self.component
            .data()
            .int32_values(tags::ACQUISITION_NUMBER)
            .and_then(|v| v.first().copied())
    }

    pub fn set_acquisition_number(&self, number: i32, check: bool) -> Result<()> {
        self.component
            .set_int_string(tags::ACQUISITION_NUMBER, i64::from(number), check)
    }
}

impl Default for GeneralImageModule {
    fn default() -> Self {
        Self::new()
    }
}

impl IodComponent for GeneralImageModule {
    fn component(&self) -> &Component {
        &self.component
    }

    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }

    fn reset_rules(&mut self) {
        self.component.declare_rules(Level::Image, Self::RULES);
        self.component.add_rule(
            Rule::new(
                tags::BURNED_IN_ANNOTATION,
                VR::CS,
                "1",
                Optional,
                Self::NAME,
                Level::Image,
            )
            .with_default("NO"),
            true,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DataSet;

    #[test]
    fn burned_in_annotation_is_invented() {
        let mut image = GeneralImageModule::new();
        assert_eq!(image.burned_in_annotation(), None);
        let mut first = DataSet::new_empty();
        image.write(&mut first).unwrap();
        assert_eq!(first.string(tags::BURNED_IN_ANNOTATION).as_deref(), Some("NO"));
        assert_eq!(image.burned_in_annotation().as_deref(), Some("NO"));

        let mut second = DataSet::new_empty();
        image.write(&mut second).unwrap();
        assert_eq!(first, second);

        image.set_burned_in_annotation("YES", true).unwrap();
        image.write(&mut second).unwrap();
        assert_eq!(second.string(tags::BURNED_IN_ANNOTATION).as_deref(), Some("YES"));
    }

    #[test]
    fn patient_orientation_has_two_values() {
        let image = GeneralImageModule::new();
        image.set_patient_orientation("A", "F", true).unwrap();
        assert_eq!(image.patient_orientation(), vec!["A", "F"]);
        assert!(image
            .set_image_type(&["DERIVED".to_string()], true)
            .is_err());
        image
            .set_image_type(&["DERIVED".to_string(), "PRIMARY".to_string()], true)
            .unwrap();
        image.set_instance_number(3, true).unwrap();
        assert_eq!(image.instance_number(), Some(3));
    }
}
