//! The General Anatomy Macro and the Primary Anatomic Structure Macro.
use std::cmp::Ordering;

use dicom_core::VR;
use dicom_dictionary_std::tags;

use crate::component::{Component, IodComponent, SharedDataSet, SharedRules};
use crate::dataset::DataSet;
use crate::macros::{CodeSequenceMacro, CodeWithModifiers};
use crate::rules::Level;
use crate::rules::Requirement::{self, Mandatory, Optional};
use crate::util::{
    check_item_count, read_single_item, read_sub_sequence, write_single_item, write_sub_sequence,
};
use crate::Result;

/// An item of the Primary Anatomic Structure Sequence:
/// a structure code with optional modifier codes.
#[derive(Debug, Clone)]
pub struct PrimaryAnatomicStructureItem {
    code: CodeWithModifiers,
}

impl PrimaryAnatomicStructureItem {
    pub fn new() -> Self {
        PrimaryAnatomicStructureItem {
            code: CodeWithModifiers::new(
                Optional,
                "1-n",
                tags::PRIMARY_ANATOMIC_STRUCTURE_MODIFIER_SEQUENCE,
            ),
        }
    }

    pub fn with_code(value: &str, scheme: &str, meaning: &str) -> Result<Self> {
        let item = Self::new();
        item.code.code().set(value, scheme, meaning, "", true)?;
        Ok(item)
    }

    pub fn structure(&self) -> &CodeSequenceMacro {
        self.code.code()
    }

    pub fn modifiers(&self) -> &[CodeSequenceMacro] {
        self.code.modifiers()
    }

    pub fn add_modifier(&mut self, modifier: CodeSequenceMacro) -> Result<()> {
        self.code.add_modifier(modifier)
    }
}

impl Default for PrimaryAnatomicStructureItem {
    fn default() -> Self {
        Self::new()
    }
}

impl IodComponent for PrimaryAnatomicStructureItem {
    fn component(&self) -> &Component {
        self.code.component()
    }

    fn component_mut(&mut self) -> &mut Component {
        self.code.component_mut()
    }

    fn reset_rules(&mut self) {
        self.code.reset_rules();
    }

    fn read(&mut self, source: &DataSet, clear_old: bool) -> Result<()> {
        self.code.read(source, clear_old)
    }

    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        self.code.write(destination)
    }

    fn check(&self, quiet: bool) -> Result<()> {
        self.code.check(quiet)
    }

    fn clear_data(&mut self) {
        self.code.clear_data();
    }
}

/// The Primary Anatomic Structure Sequence (type 3).
#[derive(Debug)]
pub struct PrimaryAnatomicStructureMacro {
    component: Component,
    items: Vec<PrimaryAnatomicStructureItem>,
}

impl PrimaryAnatomicStructureMacro {
    pub const NAME: &'static str = "PrimaryAnatomicStructureMacro";

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    pub fn new_shared(data: SharedDataSet, rules: SharedRules) -> Self {
        Self::from_component(Component::new_shared(Self::NAME, data, rules))
    }

    fn from_component(component: Component) -> Self {
        let mut macro_ = PrimaryAnatomicStructureMacro {
            component,
            items: Vec::new(),
        };
        macro_.reset_rules();
        macro_
    }

    pub fn items(&self) -> &[PrimaryAnatomicStructureItem] {
        &self.items
    }

    /// Append a structure, which must pass its check.
    pub fn add_item(&mut self, item: PrimaryAnatomicStructureItem) -> Result<()> {
        item.check(true)?;
        let mut item = item;
        item.component_mut().set_parent(Some(&self.component));
        self.items.push(item);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn compare_items(&self, other: &Self) -> Ordering {
        self.items.len().cmp(&other.items.len()).then_with(|| {
            self.items
                .iter()
                .zip(&other.items)
                .map(|(a, b)| a.structure().compare(b.structure()))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        })
    }
}

impl Default for PrimaryAnatomicStructureMacro {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PrimaryAnatomicStructureMacro {
    fn clone(&self) -> Self {
        let mut macro_ = Self::from_component(self.component.clone());
        for item in &self.items {
            let mut item = item.clone();
            item.component_mut().set_parent(Some(&macro_.component));
            macro_.items.push(item);
        }
        macro_
    }
}

impl IodComponent for PrimaryAnatomicStructureMacro {
    fn component(&self) -> &Component {
        &self.component
    }

    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }

    fn reset_rules(&mut self) {
        self.component.declare_rules(
            Level::Unspecified,
            &[(tags::PRIMARY_ANATOMIC_STRUCTURE_SEQUENCE, VR::SQ, "1-n", Optional)],
        );
    }

    fn read(&mut self, source: &DataSet, clear_old: bool) -> Result<()> {
        if clear_old {
            self.clear_data();
        }
        read_sub_sequence(
            source,
            tags::PRIMARY_ANATOMIC_STRUCTURE_SEQUENCE,
            &mut self.items,
            &self.component,
        )
    }

    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        write_sub_sequence(
            tags::PRIMARY_ANATOMIC_STRUCTURE_SEQUENCE,
            &mut self.items,
            &self.component,
            destination,
        )
    }

    fn check(&self, quiet: bool) -> Result<()> {
        for item in &self.items {
            item.check(quiet)?;
        }
        match self.component.rule(tags::PRIMARY_ANATOMIC_STRUCTURE_SEQUENCE) {
            Some(rule) => check_item_count(&rule, self.items.len()),
            None => Ok(()),
        }
    }

    fn clear_data(&mut self) {
        self.component.clear_data();
        self.items.clear();
    }
}

/// The General Anatomy Macro: the anatomic region (with modifiers)
/// and the primary anatomic structures of an image.
///
/// How strictly the Anatomic Region Sequence is required
/// depends on the module using the macro.
#[derive(Debug)]
pub struct GeneralAnatomyMacro {
    component: Component,
    region_requirement: Requirement,
    anatomic_region: CodeWithModifiers,
    primary_anatomic_structure: PrimaryAnatomicStructureMacro,
}

impl GeneralAnatomyMacro {
    pub const NAME: &'static str = "GeneralAnatomyMacro";

    pub fn new(region_requirement: Requirement) -> Self {
        Self::from_component(Component::new(Self::NAME), region_requirement)
    }

    pub fn new_shared(data: SharedDataSet, rules: SharedRules, region_requirement: Requirement) -> Self {
        Self::from_component(
            Component::new_shared(Self::NAME, data, rules),
            region_requirement,
        )
    }

    fn from_component(component: Component, region_requirement: Requirement) -> Self {
        let primary_anatomic_structure = PrimaryAnatomicStructureMacro::new_shared(
            component.shared_data(),
            component.shared_rules(),
        );
        let mut anatomic_region =
            CodeWithModifiers::new(Optional, "1-n", tags::ANATOMIC_REGION_MODIFIER_SEQUENCE);
        anatomic_region.component_mut().set_parent(Some(&component));
        let mut macro_ = GeneralAnatomyMacro {
            component,
            region_requirement,
            anatomic_region,
            primary_anatomic_structure,
        };
        macro_.reset_rules();
        macro_
    }

    /// The anatomic region, whose modifiers are nested in its item.
    pub fn anatomic_region(&self) -> &CodeWithModifiers {
        &self.anatomic_region
    }

    pub fn anatomic_region_mut(&mut self) -> &mut CodeWithModifiers {
        &mut self.anatomic_region
    }

    pub fn set_anatomic_region(&self, value: &str, scheme: &str, meaning: &str, check: bool) -> Result<()> {
        self.anatomic_region.code().set(value, scheme, meaning, "", check)
    }

    pub fn primary_anatomic_structure(&self) -> &PrimaryAnatomicStructureMacro {
        &self.primary_anatomic_structure
    }

    pub fn primary_anatomic_structure_mut(&mut self) -> &mut PrimaryAnatomicStructureMacro {
        &mut self.primary_anatomic_structure
    }

    /// Order by anatomic region, then by its modifiers,
    /// then by the primary anatomic structures.
    pub fn compare_anatomy(&self, other: &GeneralAnatomyMacro) -> Ordering {
        let (ours, theirs) = (&self.anatomic_region, &other.anatomic_region);
        ours.code()
            .compare(theirs.code())
            .then_with(|| ours.modifiers().len().cmp(&theirs.modifiers().len()))
            .then_with(|| {
                ours.modifiers()
                    .iter()
                    .zip(theirs.modifiers())
                    .map(|(a, b)| a.compare(b))
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| {
                self.primary_anatomic_structure
                    .compare_items(&other.primary_anatomic_structure)
            })
    }
}

impl Default for GeneralAnatomyMacro {
    fn default() -> Self {
        Self::new(Mandatory)
    }
}

impl GeneralAnatomyMacro {
    /// Copy the anatomy codes into a macro viewing the given data set and rules.
    pub(crate) fn clone_shared(&self, data: SharedDataSet, rules: SharedRules) -> Self {
        self.copy_onto(Component::new_shared(Self::NAME, data, rules))
    }

    fn copy_onto(&self, component: Component) -> Self {
        let mut macro_ = Self::from_component(component, self.region_requirement);
        let mut region = self.anatomic_region.clone();
        region.component_mut().set_parent(Some(&macro_.component));
        macro_.anatomic_region = region;
        for item in &self.primary_anatomic_structure.items {
            let mut item = item.clone();
            item.component_mut()
                .set_parent(Some(&macro_.primary_anatomic_structure.component));
            macro_.primary_anatomic_structure.items.push(item);
        }
        macro_
    }
}

impl Clone for GeneralAnatomyMacro {
    fn clone(&self) -> Self {
        self.copy_onto(self.component.clone())
    }
}

impl IodComponent for GeneralAnatomyMacro {
    fn component(&self) -> &Component {
        &self.component
    }

    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }

    fn reset_rules(&mut self) {
        self.component.declare_rules(
            Level::Unspecified,
            &[(tags::ANATOMIC_REGION_SEQUENCE, VR::SQ, "1", self.region_requirement)],
        );
        self.primary_anatomic_structure.reset_rules();
    }

    fn read(&mut self, source: &DataSet, clear_old: bool) -> Result<()> {
        if clear_old {
            self.clear_data();
        }
        read_single_item(
            source,
            tags::ANATOMIC_REGION_SEQUENCE,
            &mut self.anatomic_region,
            &self.component,
        )?;
        self.primary_anatomic_structure.read(source, false)
    }

    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        let region = write_single_item(
            tags::ANATOMIC_REGION_SEQUENCE,
            &mut self.anatomic_region,
            &self.component,
            destination,
        );
        let primary = self.primary_anatomic_structure.write(destination);
        region.and(primary)
    }

    fn check(&self, quiet: bool) -> Result<()> {
        if self.anatomic_region.code().is_empty() {
            if let Some(rule) = self.component.rule(tags::ANATOMIC_REGION_SEQUENCE) {
                check_item_count(&rule, 0)?;
            }
        } else {
            self.anatomic_region.check(quiet)?;
        }
        if !self.primary_anatomic_structure.is_empty() {
            self.primary_anatomic_structure.check(quiet)?;
        }
        Ok(())
    }

    fn clear_data(&mut self) {
        self.component.clear_data();
        self.anatomic_region.clear_data();
        self.primary_anatomic_structure.clear_data();
    }

    fn set_value_check_on_write(&mut self, check: bool) {
        self.component.set_value_check_on_write(check);
        self.anatomic_region.set_value_check_on_write(check);
        self.primary_anatomic_structure.set_value_check_on_write(check);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DataSetExt;
    use crate::Error;
    use std::rc::Rc;

    fn chest() -> GeneralAnatomyMacro {
        let mut anatomy = GeneralAnatomyMacro::default();
        anatomy.set_anatomic_region("T-D3000", "SRT", "Chest", true).unwrap();
        anatomy
            .anatomic_region_mut()
            .add_modifier(CodeSequenceMacro::with_code("G-A101", "SRT", "Left").unwrap())
            .unwrap();
        anatomy
    }

    #[test]
    fn mandatory_region_must_be_present() {
        let mut anatomy = GeneralAnatomyMacro::default();
        assert!(matches!(
            anatomy.check(true),
            Err(Error::MissingAttribute { tag, .. }) if tag == tags::ANATOMIC_REGION_SEQUENCE
        ));
        let mut out = DataSet::new_empty();
        assert!(anatomy.write(&mut out).is_err());
        assert!(!out.contains(tags::ANATOMIC_REGION_SEQUENCE));

        let optional = GeneralAnatomyMacro::new(Requirement::ConditionalMandatory);
        assert_eq!(optional.check(true), Ok(()));
    }

    #[test]
    fn region_modifiers_are_nested_in_the_region_item() {
        let mut anatomy = chest();
        let structure = PrimaryAnatomicStructureItem::with_code("T-32000", "SRT", "Heart").unwrap();
        anatomy
            .primary_anatomic_structure_mut()
            .add_item(structure)
            .unwrap();
        assert!(anatomy
            .primary_anatomic_structure_mut()
            .add_item(PrimaryAnatomicStructureItem::new())
            .is_err());
        assert_eq!(anatomy.check(true), Ok(()));

        let mut out = DataSet::new_empty();
        anatomy.write(&mut out).unwrap();
        let region = out.sequence_items(tags::ANATOMIC_REGION_SEQUENCE).unwrap();
        assert_eq!(region.len(), 1);
        assert_eq!(region[0].string(tags::CODE_MEANING).as_deref(), Some("Chest"));
        let modifiers = region[0]
            .sequence_items(tags::ANATOMIC_REGION_MODIFIER_SEQUENCE)
            .unwrap();
        assert_eq!(modifiers[0].string(tags::CODE_MEANING).as_deref(), Some("Left"));
        assert!(!out.contains(tags::ANATOMIC_REGION_MODIFIER_SEQUENCE));
        let structures = out
            .sequence_items(tags::PRIMARY_ANATOMIC_STRUCTURE_SEQUENCE)
            .unwrap();
        assert_eq!(structures[0].string(tags::CODE_VALUE).as_deref(), Some("T-32000"));

        let mut read = GeneralAnatomyMacro::default();
        read.read(&out, true).unwrap();
        assert_eq!(read.anatomic_region().modifiers().len(), 1);
        assert_eq!(
            read.primary_anatomic_structure().items()[0]
                .structure()
                .code_meaning()
                .as_deref(),
            Some("Heart")
        );
        assert_eq!(read.compare_anatomy(&anatomy), Ordering::Equal);
    }

    #[test]
    fn anatomy_orders_by_region_then_modifiers() {
        let left = chest();
        let plain = GeneralAnatomyMacro::default();
        plain.set_anatomic_region("T-D3000", "SRT", "Chest", true).unwrap();
        assert_eq!(plain.compare_anatomy(&left), Ordering::Less);
        assert_eq!(left.compare_anatomy(&plain), Ordering::Greater);
        assert_eq!(left.compare_anatomy(&left.clone()), Ordering::Equal);
    }

    #[test]
    fn clone_links_sub_components_to_the_copy() {
        let mut anatomy = chest();
        anatomy
            .primary_anatomic_structure_mut()
            .add_item(PrimaryAnatomicStructureItem::with_code("T-32000", "SRT", "Heart").unwrap())
            .unwrap();
        let copy = anatomy.clone();
        let data = copy.component().shared_data();
        assert!(copy
            .primary_anatomic_structure()
            .component()
            .shares_data_with(copy.component()));
        let linked = copy.anatomic_region().component().parent().unwrap();
        assert!(Rc::ptr_eq(&linked, &data));
        let linked = copy.primary_anatomic_structure().items()[0]
            .component()
            .parent()
            .unwrap();
        assert!(Rc::ptr_eq(&linked, &data));
    }
}
