//! Coded entries: the Code Sequence Macro and codes with modifiers.
use std::fmt;

use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;
use snafu::ResultExt;
use tracing::error;

use crate::component::{Component, IodComponent, SharedDataSet, SharedRules};
use crate::dataset::DataSet;
use crate::rules::Requirement::{ConditionalMandatory, Mandatory};
use crate::rules::{Level, Requirement, Rule};
use crate::util::{check_item_count, read_sub_sequence, write_sub_sequence};
use crate::{InvalidElementValueSnafu, Result, ValueViolation};

/// A coded concept (Code Value, Coding Scheme Designator,
/// Coding Scheme Version and Code Meaning).
#[derive(Debug, Clone)]
pub struct CodeSequenceMacro {
    component: Component,
}

impl CodeSequenceMacro {
    pub const NAME: &'static str = "CodeSequenceMacro";

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    /// Create a macro viewing the given data set and rules.
    pub fn new_shared(data: SharedDataSet, rules: SharedRules) -> Self {
        Self::from_component(Component::new_shared(Self::NAME, data, rules))
    }

    /// Create a code from its value, scheme designator and meaning.
    pub fn with_code(value: &str, scheme: &str, meaning: &str) -> Result<Self> {
        let code = Self::new();
        code.set(value, scheme, meaning, "", true)?;
        Ok(code)
    }

    fn from_component(component: Component) -> Self {
        let mut code = CodeSequenceMacro { component };
        code.reset_rules();
        code
    }

    pub fn code_value(&self) -> Option<String> {
        self.component.string(tags::CODE_VALUE)
    }

    pub fn coding_scheme_designator(&self) -> Option<String> {
        self.component.string(tags::CODING_SCHEME_DESIGNATOR)
    }

    pub fn coding_scheme_version(&self) -> Option<String> {
        self.component.string(tags::CODING_SCHEME_VERSION)
    }

    pub fn code_meaning(&self) -> Option<String> {
        self.component.string(tags::CODE_MEANING)
    }

    pub fn set_code_value(&self, value: &str, check: bool) -> Result<()> {
        self.component.set_string(tags::CODE_VALUE, value, check)
    }

    pub fn set_coding_scheme_designator(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::CODING_SCHEME_DESIGNATOR, value, check)
    }

    pub fn set_coding_scheme_version(&self, value: &str, check: bool) -> Result<()> {
        self.component.set_string(tags::CODING_SCHEME_VERSION, value, check)
    }

    pub fn set_code_meaning(&self, value: &str, check: bool) -> Result<()> {
        self.component.set_string(tags::CODE_MEANING, value, check)
    }

    /// Set the whole code at once.
    ///
    /// When checking, code value, scheme designator and meaning
    /// must not be empty.
    /// An empty scheme version is not written.
    pub fn set(
        &self,
        value: &str,
        scheme: &str,
        meaning: &str,
        scheme_version: &str,
        check: bool,
    ) -> Result<()> {
        if check && (value.is_empty() || scheme.is_empty() || meaning.is_empty()) {
            error!("Could not set code since Code Value, Coding Scheme Designator and Code Meaning must have non-empty values");
            return Err(ValueViolation::Internal).context(InvalidElementValueSnafu {
                tag: tags::CODE_VALUE,
            });
        }
        self.set_code_value(value, check)?;
        self.set_coding_scheme_designator(scheme, check)?;
        self.set_code_meaning(meaning, check)?;
        if !scheme_version.is_empty() {
            self.set_coding_scheme_version(scheme_version, check)?;
        }
        Ok(())
    }

    /// Whether none of the code's attributes has a value.
    pub fn is_empty(&self) -> bool {
        self.code_value().is_none()
            && self.coding_scheme_designator().is_none()
            && self.coding_scheme_version().is_none()
            && self.code_meaning().is_none()
    }
}

impl Default for CodeSequenceMacro {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CodeSequenceMacro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({},{},{})",
            self.coding_scheme_designator().unwrap_or_default(),
            self.code_value().unwrap_or_default(),
            self.code_meaning().unwrap_or_default()
        )
    }
}

impl IodComponent for CodeSequenceMacro {
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
                (tags::CODE_VALUE, VR::SH, "1", Mandatory),
                (tags::CODING_SCHEME_DESIGNATOR, VR::SH, "1", Mandatory),
                (tags::CODING_SCHEME_VERSION, VR::SH, "1", ConditionalMandatory),
                (tags::CODE_MEANING, VR::LO, "1", Mandatory),
            ],
        );
    }
}

/// A code with a sequence of modifier codes.
#[derive(Debug)]
pub struct CodeWithModifiers {
    code: CodeSequenceMacro,
    modifiers: Vec<CodeSequenceMacro>,
    modifier_requirement: Requirement,
    modifier_vm: String,
    modifier_sequence: Tag,
}

impl CodeWithModifiers {
    /// Create a code whose modifiers live in the given sequence.
    pub fn new(modifier_requirement: Requirement, modifier_vm: &str, modifier_sequence: Tag) -> Self {
        let mut code = CodeWithModifiers {
            code: CodeSequenceMacro::new(),
            modifiers: Vec::new(),
            modifier_requirement,
            modifier_vm: modifier_vm.to_string(),
            modifier_sequence,
        };
        code.reset_rules();
        code
    }

    pub fn code(&self) -> &CodeSequenceMacro {
        &self.code
    }

    pub fn modifiers(&self) -> &[CodeSequenceMacro] {
        &self.modifiers
    }

    pub fn modifiers_mut(&mut self) -> &mut Vec<CodeSequenceMacro> {
        &mut self.modifiers
    }

    /// Append a modifier code.
    pub fn add_modifier(&mut self, modifier: CodeSequenceMacro) -> Result<()> {
        modifier.check(true)?;
        let mut modifier = modifier;
        modifier.component_mut().set_parent(Some(&self.code.component));
        self.modifiers.push(modifier);
        Ok(())
    }
}

impl Clone for CodeWithModifiers {
    /// Deep copy, with the modifiers linked to the copied code.
    fn clone(&self) -> Self {
        let code = self.code.clone();
        let modifiers = self
            .modifiers
            .iter()
            .map(|m| {
                let mut m = m.clone();
                m.component_mut().set_parent(Some(&code.component));
                m
            })
            .collect();
        CodeWithModifiers {
            code,
            modifiers,
            modifier_requirement: self.modifier_requirement,
            modifier_vm: self.modifier_vm.clone(),
            modifier_sequence: self.modifier_sequence,
        }
    }
}

impl Default for CodeWithModifiers {
    fn default() -> Self {
        CodeWithModifiers::new(
            Requirement::Optional,
            "1-n",
            tags::MODIFIER_CODE_SEQUENCE,
        )
    }
}

impl IodComponent for CodeWithModifiers {
    fn component(&self) -> &Component {
        &self.code.component
    }

    fn component_mut(&mut self) -> &mut Component {
        &mut self.code.component
    }

    fn reset_rules(&mut self) {
        self.code.reset_rules();
        self.code.component.add_rule(
            Rule::new(
                self.modifier_sequence,
                VR::SQ,
                self.modifier_vm.as_str(),
                self.modifier_requirement,
                CodeSequenceMacro::NAME,
                Level::Unspecified,
            ),
            true,
        );
    }

    fn check(&self, quiet: bool) -> Result<()> {
        let result = self
            .code
            .check(quiet)
            .and_then(|_| self.modifiers.iter().try_for_each(|m| m.check(quiet)))
            .and_then(|_| match self.code.component.rule(self.modifier_sequence) {
                Some(rule) => check_item_count(&rule, self.modifiers.len()),
                None => Ok(()),
            });
        if result.is_err() && !quiet {
            error!("Invalid code in Code Sequence Macro or its modifiers");
        }
        result
    }

    fn read(&mut self, source: &DataSet, clear_old: bool) -> Result<()> {
        if clear_old {
            self.clear_data();
        }
        self.code.read(source, clear_old)?;
        read_sub_sequence(
            source,
            self.modifier_sequence,
            &mut self.modifiers,
            &self.code.component,
        )
    }

    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        let written = write_sub_sequence(
            self.modifier_sequence,
            &mut self.modifiers,
            &self.code.component,
            destination,
        );
        written.and_then(|_| self.code.write(destination))
    }

    fn clear_data(&mut self) {
        self.code.clear_data();
        self.modifiers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::dataset::DataSetExt;

    #[test]
    fn code_set_requires_all_parts() {
        let code = CodeSequenceMacro::new();
        assert!(code.is_empty());
        assert!(matches!(
            code.set("121322", "", "Source image", "", true),
            Err(Error::InvalidElementValue { .. })
        ));
        assert!(code.is_empty());

        code.set("121322", "DCM", "Source image for image processing operation", "", true)
            .unwrap();
        assert!(!code.is_empty());
        assert_eq!(code.to_string(), "(DCM,121322,Source image for image processing operation)");
        assert_eq!(code.check(true), Ok(()));
        assert_eq!(code.coding_scheme_version(), None);
    }

    #[test]
    fn code_round_trip() {
        let mut code = CodeSequenceMacro::with_code("T-D3000", "SRT", "Chest").unwrap();
        let mut item = DataSet::new_empty();
        code.write(&mut item).unwrap();
        assert_eq!(item.len(), 3);

        let mut other = CodeSequenceMacro::new();
        other.read(&item, true).unwrap();
        assert_eq!(other.to_string(), "(SRT,T-D3000,Chest)");
        assert_eq!(other.compare(&code), std::cmp::Ordering::Equal);
    }

    #[test]
    fn modifiers_are_nested_items() {
        let mut code = CodeWithModifiers::default();
        code.code().set("T-D3000", "SRT", "Chest", "", true).unwrap();
        code.add_modifier(CodeSequenceMacro::with_code("G-A101", "SRT", "Left").unwrap())
            .unwrap();
        assert!(code.add_modifier(CodeSequenceMacro::new()).is_err());

        let mut item = DataSet::new_empty();
        code.write(&mut item).unwrap();
        let modifiers = item.sequence_items(tags::MODIFIER_CODE_SEQUENCE).unwrap();
        assert_eq!(modifiers.len(), 1);
        assert_eq!(modifiers[0].string(tags::CODE_MEANING).as_deref(), Some("Left"));

        let mut read = CodeWithModifiers::default();
        read.read(&item, true).unwrap();
        assert_eq!(read.modifiers().len(), 1);
        assert!(read.modifiers()[0].component().parent().is_some());
        assert_eq!(read.code().code_meaning().as_deref(), Some("Chest"));
        assert_eq!(read.check(true), Ok(()));
    }

    #[test]
    fn cloned_modifiers_follow_the_copy() {
        let mut code = CodeWithModifiers::default();
        code.code().set("T-D3000", "SRT", "Chest", "", true).unwrap();
        code.add_modifier(CodeSequenceMacro::with_code("G-A101", "SRT", "Left").unwrap())
            .unwrap();
        let copy = code.clone();
        drop(code);
        let parent = copy.modifiers()[0].component().parent().unwrap();
        assert!(std::rc::Rc::ptr_eq(&parent, &copy.code().component().shared_data()));
    }
}
