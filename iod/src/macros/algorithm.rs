//! The Algorithm Identification Macro.
use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;

use crate::component::{Component, IodComponent, SharedDataSet, SharedRules};
use crate::dataset::DataSet;
use crate::macros::CodeSequenceMacro;
use crate::rules::Level;
use crate::rules::Requirement::{Mandatory, Optional};
use crate::util::{check_item_count, read_single_item, write_single_item};
use crate::Result;

/// Identification of the algorithm that created or processed content:
/// its family and name codes, name, version,
/// and optionally its parameters and source.
#[derive(Debug)]
pub struct AlgorithmIdentificationMacro {
    component: Component,
    family: CodeSequenceMacro,
    name_code: CodeSequenceMacro,
}

impl AlgorithmIdentificationMacro {
    pub const NAME: &'static str = "AlgorithmIdentificationMacro";

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    pub fn new_shared(data: SharedDataSet, rules: SharedRules) -> Self {
        Self::from_component(Component::new_shared(Self::NAME, data, rules))
    }

    /// Identify an algorithm by family, name and version.
    pub fn create(family: CodeSequenceMacro, name: &str, version: &str) -> Result<Self> {
        let mut macro_ = Self::new();
        macro_.set_algorithm_family(family);
        macro_.set_algorithm_name(name, true)?;
        macro_.set_algorithm_version(version, true)?;
        macro_.check(true)?;
        Ok(macro_)
    }

    fn from_component(component: Component) -> Self {
        let mut macro_ = AlgorithmIdentificationMacro {
            component,
            family: CodeSequenceMacro::new(),
            name_code: CodeSequenceMacro::new(),
        };
        macro_.link_children();
        macro_.reset_rules();
        macro_
    }

    fn link_children(&mut self) {
        let parent = &self.component;
        self.family.component_mut().set_parent(Some(parent));
        self.name_code.component_mut().set_parent(Some(parent));
    }

    pub fn algorithm_family(&self) -> &CodeSequenceMacro {
        &self.family
    }

    pub fn set_algorithm_family(&mut self, code: CodeSequenceMacro) {
        self.family = code;
        self.link_children();
    }

    pub fn algorithm_name_code(&self) -> &CodeSequenceMacro {
        &self.name_code
    }

    pub fn set_algorithm_name_code(&mut self, code: CodeSequenceMacro) {
        self.name_code = code;
        self.link_children();
    }

    pub fn algorithm_name(&self) -> Option<String> {
        self.component.string(tags::ALGORITHM_NAME)
    }

    pub fn algorithm_version(&self) -> Option<String> {
        self.component.string(tags::ALGORITHM_VERSION)
    }

    pub fn algorithm_parameters(&self) -> Option<String> {
        self.component.string(tags::ALGORITHM_PARAMETERS)
    }

    pub fn algorithm_source(&self) -> Option<String> {
        self.component.string(tags::ALGORITHM_SOURCE)
    }

    pub fn set_algorithm_name(&self, value: &str, check: bool) -> Result<()> {
        self.component.set_string(tags::ALGORITHM_NAME, value, check)
    }

    pub fn set_algorithm_version(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::ALGORITHM_VERSION, value, check)
    }

    /// Set the parameters, free text of up to 10240 characters.
    pub fn set_algorithm_parameters(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::ALGORITHM_PARAMETERS, value, check)
    }

    /// Set the source (e.g. the manufacturer) of the algorithm.
    pub fn set_algorithm_source(&self, value: &str, check: bool) -> Result<()> {
        self.component.set_string(tags::ALGORITHM_SOURCE, value, check)
    }

    fn check_code(&self, tag: Tag, code: &CodeSequenceMacro, quiet: bool) -> Result<()> {
        if !code.is_empty() {
            return code.check(quiet);
        }
        match self.component.rule(tag) {
            Some(rule) => check_item_count(&rule, 0),
            None => Ok(()),
        }
    }
}

impl Default for AlgorithmIdentificationMacro {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for AlgorithmIdentificationMacro {
    fn clone(&self) -> Self {
        let mut macro_ = AlgorithmIdentificationMacro {
            component: self.component.clone(),
            family: self.family.clone(),
            name_code: self.name_code.clone(),
        };
        macro_.link_children();
        macro_
    }
}

impl IodComponent for AlgorithmIdentificationMacro {
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
                (tags::ALGORITHM_FAMILY_CODE_SEQUENCE, VR::SQ, "1", Mandatory),
                (tags::ALGORITHM_NAME_CODE_SEQUENCE, VR::SQ, "1", Optional),
                (tags::ALGORITHM_NAME, VR::LO, "1", Mandatory),
                (tags::ALGORITHM_VERSION, VR::LO, "1", Mandatory),
                (tags::ALGORITHM_PARAMETERS, VR::LT, "1", Optional),
                (tags::ALGORITHM_SOURCE, VR::LO, "1", Optional),
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
            tags::ALGORITHM_FAMILY_CODE_SEQUENCE,
            &mut self.family,
            &self.component,
        )?;
        read_single_item(
            source,
            tags::ALGORITHM_NAME_CODE_SEQUENCE,
            &mut self.name_code,
            &self.component,
        )
    }

    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        let own = self.component.write(destination);
        let family = write_single_item(
            tags::ALGORITHM_FAMILY_CODE_SEQUENCE,
            &mut self.family,
            &self.component,
            destination,
        );
        let name_code = write_single_item(
            tags::ALGORITHM_NAME_CODE_SEQUENCE,
            &mut self.name_code,
            &self.component,
            destination,
        );
        own.and(family).and(name_code)
    }

    fn check(&self, quiet: bool) -> Result<()> {
        self.component.check(quiet)?;
        self.check_code(tags::ALGORITHM_FAMILY_CODE_SEQUENCE, &self.family, quiet)?;
        self.check_code(tags::ALGORITHM_NAME_CODE_SEQUENCE, &self.name_code, quiet)
    }

    fn clear_data(&mut self) {
        self.component.clear_data();
        self.family.clear_data();
        self.name_code.clear_data();
    }

    fn set_value_check_on_write(&mut self, check: bool) {
        self.component.set_value_check_on_write(check);
        self.family.set_value_check_on_write(check);
        self.name_code.set_value_check_on_write(check);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DataSetExt;
    use crate::Error;

    fn segmentation_family() -> CodeSequenceMacro {
        CodeSequenceMacro::with_code("123109", "DCM", "Manual Processing").unwrap()
    }

    #[test]
    fn family_name_and_version_are_required() {
        let algorithm = AlgorithmIdentificationMacro::new();
        algorithm.set_algorithm_name("Region Grower", true).unwrap();
        algorithm.set_algorithm_version("1.0", true).unwrap();
        assert!(matches!(
            algorithm.check(true),
            Err(Error::MissingAttribute { tag, .. }) if tag == tags::ALGORITHM_FAMILY_CODE_SEQUENCE
        ));

        assert!(matches!(
            AlgorithmIdentificationMacro::create(segmentation_family(), "Region Grower", ""),
            Err(Error::MissingValue { tag, .. }) if tag == tags::ALGORITHM_VERSION
        ));
        let algorithm =
            AlgorithmIdentificationMacro::create(segmentation_family(), "Region Grower", "1.0")
                .unwrap();
        assert_eq!(algorithm.algorithm_name().as_deref(), Some("Region Grower"));
    }

    #[test]
    fn algorithm_round_trip() {
        let mut algorithm =
            AlgorithmIdentificationMacro::create(segmentation_family(), "Region Grower", "1.0")
                .unwrap();
        algorithm
            .set_algorithm_parameters("seed=12,40,7", true)
            .unwrap();
        algorithm.set_algorithm_source("ACME Imaging", true).unwrap();

        let mut out = DataSet::new_empty();
        algorithm.write(&mut out).unwrap();
        assert!(!out.contains(tags::ALGORITHM_NAME_CODE_SEQUENCE));
        let family = out
            .sequence_items(tags::ALGORITHM_FAMILY_CODE_SEQUENCE)
            .unwrap();
        assert_eq!(family[0].string(tags::CODE_VALUE).as_deref(), Some("123109"));

        let mut read = AlgorithmIdentificationMacro::new();
        read.read(&out, true).unwrap();
        assert_eq!(read.check(true), Ok(()));
        assert_eq!(read.algorithm_parameters().as_deref(), Some("seed=12,40,7"));
        assert_eq!(
            read.algorithm_family().code_meaning().as_deref(),
            Some("Manual Processing")
        );
        assert!(read.algorithm_family().component().parent().is_some());
    }
}
