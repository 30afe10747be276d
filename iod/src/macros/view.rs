//! The Mandatory View and Slice Progression Direction Macro.
use dicom_core::VR;
use dicom_dictionary_std::tags;

use crate::component::{Component, IodComponent, SharedDataSet, SharedRules};
use crate::dataset::DataSet;
use crate::macros::CodeWithModifiers;
use crate::rules::Level;
use crate::rules::Requirement::{ConditionalMandatory, ConditionalMandatoryCanBeEmpty, Mandatory};
use crate::util::{check_item_count, ensure_permitted, read_single_item, write_single_item};
use crate::Result;

/// The defined terms of Slice Progression Direction.
pub const SLICE_PROGRESSION_DIRECTIONS: [&str; 2] = ["APEX_TO_BASE", "BASE_TO_APEX"];

/// The view of an image, with its modifiers nested in the View Code Sequence item,
/// and the direction of slice progression of cardiac acquisitions.
#[derive(Debug)]
pub struct MandatoryViewAndSliceProgressionDirectionMacro {
    component: Component,
    view: CodeWithModifiers,
}

impl MandatoryViewAndSliceProgressionDirectionMacro {
    pub const NAME: &'static str = "MandatoryViewAndSliceProgressionDirectionMacro";

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    pub fn new_shared(data: SharedDataSet, rules: SharedRules) -> Self {
        Self::from_component(Component::new_shared(Self::NAME, data, rules))
    }

    fn from_component(component: Component) -> Self {
        let mut view = CodeWithModifiers::new(
            ConditionalMandatoryCanBeEmpty,
            "1-n",
            tags::VIEW_MODIFIER_CODE_SEQUENCE,
        );
        view.component_mut().set_parent(Some(&component));
        let mut macro_ = MandatoryViewAndSliceProgressionDirectionMacro { component, view };
        macro_.reset_rules();
        macro_
    }

    pub fn view(&self) -> &CodeWithModifiers {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut CodeWithModifiers {
        &mut self.view
    }

    pub fn set_view(&self, value: &str, scheme: &str, meaning: &str, check: bool) -> Result<()> {
        self.view.code().set(value, scheme, meaning, "", check)
    }

    pub fn slice_progression_direction(&self) -> Option<String> {
        self.component.string(tags::SLICE_PROGRESSION_DIRECTION)
    }

    /// Set the direction, one of [`SLICE_PROGRESSION_DIRECTIONS`] when checking.
    pub fn set_slice_progression_direction(&self, value: &str, check: bool) -> Result<()> {
        if check {
            ensure_permitted(
                tags::SLICE_PROGRESSION_DIRECTION,
                SLICE_PROGRESSION_DIRECTIONS.contains(&value),
            )?;
        }
        self.component
            .set_string(tags::SLICE_PROGRESSION_DIRECTION, value, check)
    }
}

impl Default for MandatoryViewAndSliceProgressionDirectionMacro {
    fn default() -> Self {
        Self::new()
    }
}

impl MandatoryViewAndSliceProgressionDirectionMacro {
    /// Copy the view code into a macro viewing the given data set and rules.
    pub(crate) fn clone_shared(&self, data: SharedDataSet, rules: SharedRules) -> Self {
        self.copy_onto(Component::new_shared(Self::NAME, data, rules))
    }

    fn copy_onto(&self, component: Component) -> Self {
        let mut macro_ = Self::from_component(component);
        let mut view = self.view.clone();
        view.component_mut().set_parent(Some(&macro_.component));
        macro_.view = view;
        macro_
    }
}

impl Clone for MandatoryViewAndSliceProgressionDirectionMacro {
    fn clone(&self) -> Self {
        self.copy_onto(self.component.clone())
    }
}

impl IodComponent for MandatoryViewAndSliceProgressionDirectionMacro {
    fn component(&self) -> &Component {
        &self.component
    }

    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }

    fn reset_rules(&mut self) {
        self.component.declare_rules(
            Level::Unspecified,
            &[
                (tags::VIEW_CODE_SEQUENCE, VR::SQ, "1", Mandatory),
                (tags::SLICE_PROGRESSION_DIRECTION, VR::CS, "1", ConditionalMandatory),
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
            tags::VIEW_CODE_SEQUENCE,
            &mut self.view,
            &self.component,
        )
    }

    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        let own = self.component.write(destination);
        let view = write_single_item(
            tags::VIEW_CODE_SEQUENCE,
            &mut self.view,
            &self.component,
            destination,
        );
        own.and(view)
    }

    fn check(&self, quiet: bool) -> Result<()> {
        self.component.check(quiet)?;
        if self.view.code().is_empty() {
            return match self.component.rule(tags::VIEW_CODE_SEQUENCE) {
                Some(rule) => check_item_count(&rule, 0),
                None => Ok(()),
            };
        }
        self.view.check(quiet)
    }

    fn clear_data(&mut self) {
        self.component.clear_data();
        self.view.clear_data();
    }

    fn set_value_check_on_write(&mut self, check: bool) {
        self.component.set_value_check_on_write(check);
        self.view.set_value_check_on_write(check);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DataSetExt;
    use crate::macros::CodeSequenceMacro;
    use crate::Error;
    use rstest::rstest;

    #[rstest]
    #[case("APEX_TO_BASE", true)]
    #[case("BASE_TO_APEX", true)]
    #[case("APEX", false)]
    #[case("apex_to_base", false)]
    fn slice_progression_takes_defined_terms(#[case] value: &str, #[case] ok: bool) {
        let view = MandatoryViewAndSliceProgressionDirectionMacro::new();
        assert_eq!(view.set_slice_progression_direction(value, true).is_ok(), ok);
        assert_eq!(view.slice_progression_direction().is_some(), ok);
    }

    #[test]
    fn view_modifiers_are_nested_in_the_view_item() {
        let mut view = MandatoryViewAndSliceProgressionDirectionMacro::new();
        assert!(matches!(
            view.check(true),
            Err(Error::MissingAttribute { tag, .. }) if tag == tags::VIEW_CODE_SEQUENCE
        ));
        view.set_view("G-A19B", "SRT", "Apical four chamber", true)
            .unwrap();
        view.view_mut()
            .add_modifier(CodeSequenceMacro::with_code("R-10226", "SRT", "Medio-lateral").unwrap())
            .unwrap();
        view.set_slice_progression_direction("APEX_TO_BASE", true)
            .unwrap();
        assert_eq!(view.check(true), Ok(()));

        let mut out = DataSet::new_empty();
        view.write(&mut out).unwrap();
        let items = out.sequence_items(tags::VIEW_CODE_SEQUENCE).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0]
                .sequence_items(tags::VIEW_MODIFIER_CODE_SEQUENCE)
                .map(|m| m.len()),
            Some(1)
        );
        assert!(!out.contains(tags::VIEW_MODIFIER_CODE_SEQUENCE));
        assert_eq!(
            out.string(tags::SLICE_PROGRESSION_DIRECTION).as_deref(),
            Some("APEX_TO_BASE")
        );

        let mut read = MandatoryViewAndSliceProgressionDirectionMacro::new();
        read.read(&out, true).unwrap();
        assert_eq!(read.view().modifiers().len(), 1);
        assert_eq!(read.view().code().code_value().as_deref(), Some("G-A19B"));
        assert!(read.clone().view().component().parent().is_some());
    }
}
