//! The Content Identification Macro.
use dicom_core::VR;
use dicom_dictionary_std::tags;

use crate::component::{Component, IodComponent, SharedDataSet, SharedRules};
use crate::dataset::{DataSet, DataSetExt};
use crate::macros::CodeSequenceMacro;
use crate::rules::Level;
use crate::rules::Requirement::{Mandatory, MandatoryCanBeEmpty, Optional};
use crate::util::{
    check_item_count, read_single_item, read_sub_sequence, write_single_item, write_sub_sequence,
};
use crate::Result;

/// An item of the Alternate Content Description Sequence:
/// the content description in another language.
#[derive(Debug)]
pub struct AlternateContentDescriptionItem {
    component: Component,
    language: CodeSequenceMacro,
}

impl AlternateContentDescriptionItem {
    pub const NAME: &'static str = "AlternateContentDescriptionItem";

    pub fn new() -> Self {
        let mut item = AlternateContentDescriptionItem {
            component: Component::new(Self::NAME),
            language: CodeSequenceMacro::new(),
        };
        item.language.component_mut().set_parent(Some(&item.component));
        item.reset_rules();
        item
    }

    pub fn content_description(&self) -> Option<String> {
        self.component.string(tags::CONTENT_DESCRIPTION)
    }

    pub fn set_content_description(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::CONTENT_DESCRIPTION, value, check)
    }

    /// The language of the description.
    pub fn language(&self) -> &CodeSequenceMacro {
        &self.language
    }
}

impl Default for AlternateContentDescriptionItem {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for AlternateContentDescriptionItem {
    fn clone(&self) -> Self {
        let mut item = AlternateContentDescriptionItem {
            component: self.component.clone(),
            language: self.language.clone(),
        };
        item.language.component_mut().set_parent(Some(&item.component));
        item
    }
}

impl IodComponent for AlternateContentDescriptionItem {
    fn component(&self) -> &Component {
        &self.component
    }

    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }

    fn reset_rules(&mut self) {
        self.component.declare_rules(
            Level::Instance,
            &[
                (tags::CONTENT_DESCRIPTION, VR::LO, "1", Mandatory),
                (tags::LANGUAGE_CODE_SEQUENCE, VR::SQ, "1", Mandatory),
            ],
        );
    }

    fn read(&mut self, source: &DataSet, clear_old: bool) -> Result<()> {
        if clear_old {
            self.clear_data();
        }
        self.component.read(source, false)?;
        read_single_item(
            source,
            tags::LANGUAGE_CODE_SEQUENCE,
            &mut self.language,
            &self.component,
        )
    }

    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        let own = self.component.write(destination);
        let language = write_single_item(
            tags::LANGUAGE_CODE_SEQUENCE,
            &mut self.language,
            &self.component,
            destination,
        );
        own.and(language)
    }

    fn check(&self, quiet: bool) -> Result<()> {
        self.component.check(quiet)?;
        if self.language.is_empty() {
            if let Some(rule) = self.component.rule(tags::LANGUAGE_CODE_SEQUENCE) {
                return check_item_count(&rule, 0);
            }
        }
        self.language.check(quiet)
    }

    fn clear_data(&mut self) {
        self.component.clear_data();
        self.language.clear_data();
    }
}

/// Identification of the content of an instance:
/// instance number, label, description and creator.
#[derive(Debug)]
pub struct ContentIdentificationMacro {
    component: Component,
    alternate_descriptions: Vec<AlternateContentDescriptionItem>,
    creator_code: CodeSequenceMacro,
}

impl ContentIdentificationMacro {
    pub const NAME: &'static str = "ContentIdentificationMacro";

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    pub fn new_shared(data: SharedDataSet, rules: SharedRules) -> Self {
        Self::from_component(Component::new_shared(Self::NAME, data, rules))
    }

    /// Create the macro from its main attributes.
    /// The result must pass its check.
    pub fn create(
        instance_number: i32,
        label: &str,
        description: &str,
        creator_name: &str,
    ) -> Result<Self> {
        let macro_ = Self::new();
        macro_.set_instance_number(instance_number, true)?;
        macro_.set_content_label(label, true)?;
        macro_.set_content_description(description, true)?;
        macro_.set_content_creator_name(creator_name, true)?;
        macro_.check(true)?;
        Ok(macro_)
    }

    fn from_component(component: Component) -> Self {
        let mut macro_ = ContentIdentificationMacro {
            component,
            alternate_descriptions: Vec::new(),
            creator_code: CodeSequenceMacro::new(),
        };
        macro_.link_children();
        macro_.reset_rules();
        macro_
    }

    fn link_children(&mut self) {
        let parent = &self.component;
        self.creator_code.component_mut().set_parent(Some(parent));
        for item in &mut self.alternate_descriptions {
            item.component.set_parent(Some(parent));
        }
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

    pub fn content_label(&self) -> Option<String> {
        self.component.string(tags::CONTENT_LABEL)
    }

    /// Set the label, a code string such as `SEGMENTATION`.
    pub fn set_content_label(&self, value: &str, check: bool) -> Result<()> {
        self.component.set_string(tags::CONTENT_LABEL, value, check)
    }

    pub fn content_description(&self) -> Option<String> {
        self.component.string(tags::CONTENT_DESCRIPTION)
    }

    pub fn set_content_description(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::CONTENT_DESCRIPTION, value, check)
    }

    pub fn content_creator_name(&self) -> Option<String> {
        self.component.string(tags::CONTENT_CREATOR_NAME)
    }

    pub fn set_content_creator_name(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::CONTENT_CREATOR_NAME, value, check)
    }

    pub fn content_creator_identification_code(&self) -> &CodeSequenceMacro {
        &self.creator_code
    }

    pub fn set_content_creator_identification_code(&mut self, code: CodeSequenceMacro) {
        self.creator_code = code;
        self.link_children();
    }

    pub fn alternate_content_descriptions(&self) -> &[AlternateContentDescriptionItem] {
        &self.alternate_descriptions
    }

    /// Describe the content in another language.
    pub fn add_alternate_content_description(
        &mut self,
        description: &str,
        language: CodeSequenceMacro,
    ) -> Result<()> {
        let mut item = AlternateContentDescriptionItem::new();
        item.set_content_description(description, true)?;
        item.language = language;
        item.language.component_mut().set_parent(Some(&item.component));
        item.check(true)?;
        item.component.set_parent(Some(&self.component));
        self.alternate_descriptions.push(item);
        Ok(())
    }
}

impl Default for ContentIdentificationMacro {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ContentIdentificationMacro {
    fn clone(&self) -> Self {
        let mut macro_ = ContentIdentificationMacro {
            component: self.component.clone(),
            alternate_descriptions: self.alternate_descriptions.clone(),
            creator_code: self.creator_code.clone(),
        };
        macro_.link_children();
        macro_
    }
}

impl IodComponent for ContentIdentificationMacro {
    fn component(&self) -> &Component {
        &self.component
    }

    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }

    fn reset_rules(&mut self) {
        self.component.declare_rules(
            Level::Instance,
            &[
                (tags::INSTANCE_NUMBER, VR::IS, "1", Mandatory),
                (tags::CONTENT_LABEL, VR::CS, "1", Mandatory),
                (tags::CONTENT_DESCRIPTION, VR::LO, "1", MandatoryCanBeEmpty),
                (tags::ALTERNATE_CONTENT_DESCRIPTION_SEQUENCE, VR::SQ, "1-n", Optional),
                (tags::CONTENT_CREATOR_NAME, VR::PN, "1", MandatoryCanBeEmpty),
                (tags::CONTENT_CREATOR_IDENTIFICATION_CODE_SEQUENCE, VR::SQ, "1", Optional),
            ],
        );
    }

    fn read(&mut self, source: &DataSet, clear_old: bool) -> Result<()> {
        if clear_old {
            self.clear_data();
        }
        self.component.read(source, false)?;
        read_sub_sequence(
            source,
            tags::ALTERNATE_CONTENT_DESCRIPTION_SEQUENCE,
            &mut self.alternate_descriptions,
            &self.component,
        )?;
        read_single_item(
            source,
            tags::CONTENT_CREATOR_IDENTIFICATION_CODE_SEQUENCE,
            &mut self.creator_code,
            &self.component,
        )
    }

    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        let own = self.component.write(destination);
        let creator = write_single_item(
            tags::CONTENT_CREATOR_IDENTIFICATION_CODE_SEQUENCE,
            &mut self.creator_code,
            &self.component,
            destination,
        );
        let alternates = write_sub_sequence(
            tags::ALTERNATE_CONTENT_DESCRIPTION_SEQUENCE,
            &mut self.alternate_descriptions,
            &self.component,
            destination,
        );
        own.and(creator).and(alternates)
    }

    fn check(&self, quiet: bool) -> Result<()> {
        self.component.check(quiet)?;
        for item in &self.alternate_descriptions {
            item.check(quiet)?;
        }
        if !self.creator_code.is_empty() {
            self.creator_code.check(quiet)?;
        }
        Ok(())
    }

    fn clear_data(&mut self) {
        self.component.clear_data();
        self.alternate_descriptions.clear();
        self.creator_code.clear_data();
    }

    fn set_value_check_on_write(&mut self, check: bool) {
        self.component.set_value_check_on_write(check);
        self.creator_code.set_value_check_on_write(check);
        for item in &mut self.alternate_descriptions {
            item.set_value_check_on_write(check);
        }
    }
}
