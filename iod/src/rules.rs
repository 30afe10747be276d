//! Attribute rules and rule sets.
//!
//! A [`Rule`] declares how one attribute takes part in a module or macro.
//! A [`RuleSet`] keeps at most one rule per attribute tag,
//! in insertion order.
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use dicom_core::{Tag, VR};
use snafu::Snafu;

use crate::check::{ElementCheck, ValueViolation};
use crate::dataset::Element;
use crate::{
    Error, InternalValidationSnafu, InvalidCharacterSnafu, MaximumLengthViolatedSnafu,
    MissingAttributeSnafu, MissingValueSnafu, MultiplicityViolatedSnafu,
    RepresentationViolatedSnafu,
};

/// The requirement type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// Type 1: must be present with a value.
    Mandatory,
    /// Type 2: must be present, may be empty.
    MandatoryCanBeEmpty,
    /// Type 1C: conditionally present, never empty when present.
    ConditionalMandatory,
    /// Type 2C: conditionally present, may be empty.
    ConditionalMandatoryCanBeEmpty,
    /// Type 3.
    Optional,
}

impl Requirement {
    /// The type designation as written in the standard.
    pub fn as_str(self) -> &'static str {
        match self {
            Requirement::Mandatory => "1",
            Requirement::MandatoryCanBeEmpty => "2",
            Requirement::ConditionalMandatory => "1C",
            Requirement::ConditionalMandatoryCanBeEmpty => "2C",
            Requirement::Optional => "3",
        }
    }

    /// Whether the attribute must always be present (type 1 or 2).
    pub fn must_be_present(self) -> bool {
        matches!(self, Requirement::Mandatory | Requirement::MandatoryCanBeEmpty)
    }

    /// Whether a present attribute must not be empty (type 1 or 1C).
    pub fn must_have_value(self) -> bool {
        matches!(self, Requirement::Mandatory | Requirement::ConditionalMandatory)
    }

    /// Whether an empty value is written out (type 2 or 2C).
    pub fn allows_empty(self) -> bool {
        matches!(
            self,
            Requirement::MandatoryCanBeEmpty | Requirement::ConditionalMandatoryCanBeEmpty
        )
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for an unknown requirement type designation.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(display("unknown requirement type `{}`", designation))]
pub struct ParseRequirementError {
    designation: String,
}

impl FromStr for Requirement {
    type Err = ParseRequirementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Requirement::Mandatory),
            "2" => Ok(Requirement::MandatoryCanBeEmpty),
            "1C" | "1c" => Ok(Requirement::ConditionalMandatory),
            "2C" | "2c" => Ok(Requirement::ConditionalMandatoryCanBeEmpty),
            "3" => Ok(Requirement::Optional),
            other => ParseRequirementSnafu { designation: other }.fail(),
        }
    }
}

/// The level of the real world information hierarchy
/// to which an attribute belongs.
/// This is informative only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Attributes describing the patient.
    Patient,
    /// Attributes of the study, shared by all its series.
    Study,
    /// Attributes of the equipment which produced the series.
    Equipment,
    /// Attributes of the spatial or temporal frame of reference.
    FrameOfReference,
    /// Attributes of the series, shared by all its instances.
    Series,
    /// Attributes of an image instance.
    Image,
    /// Attributes of one composite instance.
    Instance,
    /// No particular level, as for most macros.
    Unspecified,
}

/// The declaration of one attribute of a module or macro.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    tag: Tag,
    vr: VR,
    vm: String,
    requirement: Requirement,
    module: String,
    level: Level,
    default_value: String,
    private_creator: Option<String>,
}

impl Rule {
    pub fn new(
        tag: Tag,
        vr: VR,
        vm: impl Into<String>,
        requirement: Requirement,
        module: impl Into<String>,
        level: Level,
    ) -> Self {
        Rule {
            tag,
            vr,
            vm: vm.into(),
            requirement,
            module: module.into(),
            level,
            default_value: String::new(),
            private_creator: None,
        }
    }

    /// Set the value written when the attribute has no value of its own.
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = value.into();
        self
    }

    /// Qualify the rule with the private creator of a private attribute.
    pub fn with_private_creator(mut self, creator: impl Into<String>) -> Self {
        self.private_creator = Some(creator.into());
        self
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn vr(&self) -> VR {
        self.vr
    }

    /// The value multiplicity expression.
    pub fn vm(&self) -> &str {
        &self.vm
    }

    pub fn requirement(&self) -> Requirement {
        self.requirement
    }

    pub fn set_requirement(&mut self, requirement: Requirement) {
        self.requirement = requirement;
    }

    /// The name of the module or macro owning the attribute.
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// The default value, empty if there is none.
    pub fn default_value(&self) -> &str {
        &self.default_value
    }

    pub fn private_creator(&self) -> Option<&str> {
        self.private_creator.as_deref()
    }

    /// Whether the attribute holds a sequence of items.
    pub fn is_sequence(&self) -> bool {
        self.vr == VR::SQ
    }

    /// Validate an element looked up for this rule.
    ///
    /// `element` is `None` if the attribute is absent.
    /// Type 1C and 2C attributes are never considered missing,
    /// since their condition cannot be evaluated here.
    pub fn validate(&self, element: Option<&Element>) -> Result<(), Error> {
        let element = match element {
            None if self.requirement.must_be_present() => {
                return MissingAttributeSnafu {
                    tag: self.tag,
                    module: self.module.as_str(),
                    requirement: self.requirement,
                }
                .fail()
            }
            None => return Ok(()),
            Some(element) => element,
        };
        if element.is_empty_normalized() {
            if self.requirement.must_have_value() {
                return MissingValueSnafu {
                    tag: self.tag,
                    module: self.module.as_str(),
                    requirement: self.requirement,
                }
                .fail();
            }
            return Ok(());
        }
        element
            .check_value(&self.vm)
            .map_err(|violation| self.violation_error(violation))
    }

    /// Turn a value violation into an error for this rule's attribute.
    pub fn violation_error(&self, violation: ValueViolation) -> Error {
        let tag = self.tag;
        let module = self.module.as_str();
        match violation {
            ValueViolation::InvalidCharacter => InvalidCharacterSnafu { tag, module }.build(),
            ValueViolation::RepresentationViolated | ValueViolation::NotPermitted => {
                RepresentationViolatedSnafu { tag, module }.build()
            }
            ValueViolation::MultiplicityViolated { vm, found } => MultiplicityViolatedSnafu {
                tag,
                module,
                vm,
                found,
            }
            .build(),
            ValueViolation::MaximumLengthViolated => {
                MaximumLengthViolatedSnafu { tag, module }.build()
            }
            ValueViolation::Internal => InternalValidationSnafu { tag, module }.build(),
        }
    }
}

/// An ordered collection of rules with at most one rule per tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
    index: HashMap<Tag, usize>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule.
    ///
    /// Returns `false` and leaves the set unchanged
    /// if a rule for the same tag exists and `overwrite` is not set.
    pub fn add(&mut self, rule: Rule, overwrite: bool) -> bool {
        match self.index.get(&rule.tag) {
            Some(&pos) if overwrite => {
                self.rules[pos] = rule;
                true
            }
            Some(_) => false,
            None => {
                self.index.insert(rule.tag, self.rules.len());
                self.rules.push(rule);
                true
            }
        }
    }

    /// Remove the rule for the given tag, reporting whether it was present.
    pub fn remove(&mut self, tag: Tag) -> bool {
        match self.index.remove(&tag) {
            Some(pos) => {
                self.rules.remove(pos);
                self.reindex();
                true
            }
            None => false,
        }
    }

    /// Remove all rules owned by the given module.
    pub fn remove_module(&mut self, module: &str) {
        self.rules.retain(|r| r.module != module);
        self.reindex();
    }

    pub fn get(&self, tag: Tag) -> Option<&Rule> {
        self.index.get(&tag).map(|&pos| &self.rules[pos])
    }

    pub fn get_mut(&mut self, tag: Tag) -> Option<&mut Rule> {
        match self.index.get(&tag) {
            Some(&pos) => self.rules.get_mut(pos),
            None => None,
        }
    }

    /// All rules owned by the given module, in insertion order.
    pub fn by_module<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| r.module == module)
    }

    /// Turn every rule of the given module into a type 3 rule.
    pub fn make_optional(&mut self, module: &str) {
        for rule in self.rules.iter_mut().filter(|r| r.module == module) {
            rule.requirement = Requirement::Optional;
        }
    }

    pub fn clear(&mut self) {
        self.rules.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    fn reindex(&mut self) {
        self.index = self
            .rules
            .iter()
            .enumerate()
            .map(|(i, r)| (r.tag, i))
            .collect();
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::value::PrimitiveValue;
    use dicom_core::DataElement;
    use dicom_dictionary_std::tags;
    use rstest::rstest;

    fn rule(tag: Tag, requirement: Requirement, module: &str) -> Rule {
        Rule::new(tag, VR::LO, "1", requirement, module, Level::Patient)
    }

    #[test]
    fn add_without_overwrite_keeps_first() {
        let mut rules = RuleSet::new();
        assert!(rules.add(rule(tags::PATIENT_ID, Requirement::Mandatory, "A"), false));
        assert!(!rules.add(rule(tags::PATIENT_ID, Requirement::Optional, "B"), false));
        assert_eq!(rules.len(), 1);
        let kept = rules.get(tags::PATIENT_ID).unwrap();
        assert_eq!(kept.module(), "A");
        assert_eq!(kept.requirement(), Requirement::Mandatory);

        assert!(rules.add(rule(tags::PATIENT_ID, Requirement::Optional, "B"), true));
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.get(tags::PATIENT_ID).unwrap().module(), "B");
    }

    #[test]
    fn by_module_follows_insertion_order() {
        let mut rules = RuleSet::new();
        rules.add(rule(tags::PATIENT_SEX, Requirement::Optional, "A"), false);
        rules.add(rule(tags::STUDY_ID, Requirement::Optional, "B"), false);
        rules.add(rule(tags::PATIENT_ID, Requirement::Optional, "A"), false);
        let owned: Vec<_> = rules.by_module("A").map(|r| r.tag()).collect();
        assert_eq!(owned, vec![tags::PATIENT_SEX, tags::PATIENT_ID]);

        assert!(rules.remove(tags::PATIENT_SEX));
        assert!(!rules.remove(tags::PATIENT_SEX));
        assert_eq!(rules.get(tags::PATIENT_ID).unwrap().module(), "A");
        assert_eq!(rules.get(tags::STUDY_ID).unwrap().module(), "B");

        rules.make_optional("B");
        rules.remove_module("A");
        assert_eq!(rules.len(), 1);
        assert!(rules.get(tags::PATIENT_ID).is_none());
    }

    #[rstest]
    #[case("1", Requirement::Mandatory)]
    #[case("2", Requirement::MandatoryCanBeEmpty)]
    #[case("1C", Requirement::ConditionalMandatory)]
    #[case("2C", Requirement::ConditionalMandatoryCanBeEmpty)]
    #[case("3", Requirement::Optional)]
    fn requirement_designations(#[case] text: &str, #[case] requirement: Requirement) {
        assert_eq!(text.parse::<Requirement>(), Ok(requirement));
        assert_eq!(requirement.to_string(), text);
    }

    #[test]
    fn validate_requirement_types() {
        let empty: Element = DataElement::empty(tags::PATIENT_ID, VR::LO);
        let filled: Element =
            DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from("123"));

        let type1 = rule(tags::PATIENT_ID, Requirement::Mandatory, "Patient");
        assert!(matches!(type1.validate(None), Err(Error::MissingAttribute { .. })));
        assert!(matches!(type1.validate(Some(&empty)), Err(Error::MissingValue { .. })));
        assert_eq!(type1.validate(Some(&filled)), Ok(()));

        let type2 = rule(tags::PATIENT_ID, Requirement::MandatoryCanBeEmpty, "Patient");
        assert!(matches!(type2.validate(None), Err(Error::MissingAttribute { .. })));
        assert_eq!(type2.validate(Some(&empty)), Ok(()));

        let type1c = rule(tags::PATIENT_ID, Requirement::ConditionalMandatory, "Patient");
        assert_eq!(type1c.validate(None), Ok(()));
        assert!(matches!(type1c.validate(Some(&empty)), Err(Error::MissingValue { .. })));

        let type2c = rule(
            tags::PATIENT_ID,
            Requirement::ConditionalMandatoryCanBeEmpty,
            "Patient",
        );
        assert_eq!(type2c.validate(None), Ok(()));
        assert_eq!(type2c.validate(Some(&empty)), Ok(()));

        let type3 = rule(tags::PATIENT_ID, Requirement::Optional, "Patient");
        assert_eq!(type3.validate(None), Ok(()));
        assert_eq!(type3.validate(Some(&empty)), Ok(()));
    }
}
