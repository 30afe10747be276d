//! The generic IOD component engine.
//!
//! A [`Component`] reads, writes, validates and clears the attributes
//! whose rules name it as their owner.
//! Its data set and rule set are reference-counted handles,
//! so that many components (e.g. all modules of one IOD)
//! can view the same underlying attributes.
use std::cell::{Ref, RefCell, RefMut};
use std::cmp::Ordering;
use std::rc::{Rc, Weak};

use dicom_core::header::Header;
use dicom_core::value::PrimitiveValue;
use dicom_core::{DataElement, Tag, VR};
use snafu::{OptionExt, ResultExt};
use tracing::{debug, warn};

use crate::check::{check_string_value, ElementCheck};
use crate::dataset::{empty_element, DataSet, DataSetExt, Element};
use crate::rules::{Level, Requirement, Rule, RuleSet};
use crate::{
    Error, InvalidElementValueSnafu, MissingValueSnafu, NoSuchRuleSnafu, Result,
    ValueNotFoundSnafu,
};

/// A shared handle to a data set.
pub type SharedDataSet = Rc<RefCell<DataSet>>;

/// A shared handle to a rule set.
pub type SharedRules = Rc<RefCell<RuleSet>>;

/// Create a handle to a new, empty data set.
pub fn new_shared_data() -> SharedDataSet {
    Rc::new(RefCell::new(DataSet::new_empty()))
}

/// An attribute group bound to a data set and a rule set.
#[derive(Debug)]
pub struct Component {
    name: String,
    data: SharedDataSet,
    rules: SharedRules,
    parent: Option<Weak<RefCell<DataSet>>>,
    value_check_on_write: bool,
}

impl Component {
    /// Create a component with its own empty data set and rule set.
    pub fn new(name: impl Into<String>) -> Self {
        Component {
            name: name.into(),
            data: new_shared_data(),
            rules: Rc::default(),
            parent: None,
            value_check_on_write: true,
        }
    }

    /// Create a component viewing the given data set and rule set.
    ///
    /// Changes through this component are visible
    /// to every other holder of the same handles.
    pub fn new_shared(name: impl Into<String>, data: SharedDataSet, rules: SharedRules) -> Self {
        Component {
            name: name.into(),
            data,
            rules,
            parent: None,
            value_check_on_write: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrow the component's data set.
    pub fn data(&self) -> Ref<'_, DataSet> {
        self.data.borrow()
    }

    /// Mutably borrow the component's data set.
    pub fn data_mut(&self) -> RefMut<'_, DataSet> {
        self.data.borrow_mut()
    }

    /// A new handle to the component's data set.
    pub fn shared_data(&self) -> SharedDataSet {
        Rc::clone(&self.data)
    }

    pub fn rules(&self) -> Ref<'_, RuleSet> {
        self.rules.borrow()
    }

    pub fn rules_mut(&self) -> RefMut<'_, RuleSet> {
        self.rules.borrow_mut()
    }

    /// A new handle to the component's rule set.
    pub fn shared_rules(&self) -> SharedRules {
        Rc::clone(&self.rules)
    }

    /// Whether this component views the same data set as `other`.
    pub fn shares_data_with(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    /// Whether `data` is this component's own data set.
    pub fn is_own_data(&self, data: &DataSet) -> bool {
        std::ptr::eq(data as *const DataSet, self.data.as_ptr() as *const DataSet)
    }

    /// The data set of the enclosing component, if still alive.
    pub fn parent(&self) -> Option<SharedDataSet> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Link this component to the component whose sequence contains it.
    pub fn set_parent(&mut self, parent: Option<&Component>) {
        self.parent = parent.map(|p| Rc::downgrade(&p.data));
    }

    pub fn value_check_on_write(&self) -> bool {
        self.value_check_on_write
    }

    /// Whether values are validated before being written.
    /// When disabled, only requirement types are enforced on write.
    pub fn set_value_check_on_write(&mut self, check: bool) {
        self.value_check_on_write = check;
    }

    /// Declare a rule for this component in the rule set.
    ///
    /// The rule must name this component as its owner.
    pub fn add_rule(&self, rule: Rule, overwrite: bool) -> bool {
        self.rules.borrow_mut().add(rule, overwrite)
    }

    /// Declare a table of rules owned by this component,
    /// replacing previous rules for the same attributes.
    pub fn declare_rules(&self, level: Level, table: &[(Tag, VR, &str, Requirement)]) {
        let mut rules = self.rules.borrow_mut();
        for &(tag, vr, vm, requirement) in table {
            rules.add(Rule::new(tag, vr, vm, requirement, self.name.as_str(), level), true);
        }
    }

    /// Retrieve (a copy of) the rule for the given attribute.
    pub fn rule(&self, tag: Tag) -> Option<Rule> {
        self.rules.borrow().get(tag).cloned()
    }

    /// The rules owned by this component, in declaration order.
    pub fn owned_rules(&self) -> Vec<Rule> {
        self.rules.borrow().by_module(&self.name).cloned().collect()
    }

    /// Read the component's attributes from `source`,
    /// recording a diagnostic for each attribute failing its rule.
    ///
    /// Non-sequence attributes are copied even if they fail validation.
    /// Sequence attributes are only validated.
    pub fn read_attributes(&mut self, source: &DataSet, clear_old: bool) -> Vec<Error> {
        let aliased = self.is_own_data(source);
        if clear_old && !aliased {
            self.clear_data();
        }
        let mut errors = Vec::new();
        for rule in self.owned_rules() {
            let element = source.find(rule.tag());
            if let Err(e) = rule.validate(element) {
                warn!("{}", e);
                errors.push(e);
            }
            if rule.is_sequence() || aliased {
                continue;
            }
            if let Some(element) = element {
                self.data.borrow_mut().put(element.clone());
            }
        }
        errors
    }

    /// Read the component's attributes from `source`.
    ///
    /// Reading is best effort: problems are only logged,
    /// and this method always succeeds.
    /// Use [`read_attributes`](Component::read_attributes)
    /// to retrieve them.
    pub fn read(&mut self, source: &DataSet, clear_old: bool) -> Result<()> {
        let _ = self.read_attributes(source, clear_old);
        Ok(())
    }

    /// Write the component's attributes to `destination`,
    /// inventing default values first.
    ///
    /// Every attribute is attempted,
    /// and the first failure is returned.
    pub fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        let rules = self.owned_rules();
        if self.is_own_data(destination) {
            invent_missing_in(&rules, destination);
            return first_failure(rules.iter().map(|r| r.validate(destination.find(r.tag()))));
        }

        self.invent_missing();
        let check = self.value_check_on_write;
        let data = self.data.borrow();
        let mut result = Ok(());
        for rule in &rules {
            let element = data.find(rule.tag());
            if rule.is_sequence() && element.is_none() {
                // sequences are produced by the concrete component
                continue;
            }
            let outcome = add_element_to_dataset(destination, element.cloned(), rule, check);
            if result.is_ok() {
                result = outcome;
            }
        }
        result
    }

    /// Validate the component's own attributes against its rules.
    ///
    /// Sequences held by sub-components are not in the data set
    /// and must be checked by the concrete component.
    /// Returns the first failure.
    /// Failures are logged unless `quiet` is set.
    pub fn check(&self, quiet: bool) -> Result<()> {
        let data = self.data.borrow();
        let rules = self.owned_rules();
        let checked = rules
            .iter()
            .filter(|rule| !rule.is_sequence() || data.contains(rule.tag()));
        first_failure(checked.map(|rule| {
            let outcome = rule.validate(data.find(rule.tag()));
            if let Err(e) = &outcome {
                if !quiet {
                    warn!("{}", e);
                }
            }
            outcome
        }))
    }

    /// Remove the component's attributes from its data set.
    pub fn clear_data(&mut self) {
        let rules = self.owned_rules();
        let mut data = self.data.borrow_mut();
        for rule in rules {
            data.delete(rule.tag());
        }
    }

    /// Put the default value of every rule having one
    /// into attributes which are absent or empty.
    pub fn invent_missing(&mut self) {
        let rules = self.owned_rules();
        invent_missing_in(&rules, &mut self.data.borrow_mut());
    }

    /// Turn all of this component's rules into type 3 rules.
    pub fn make_optional(&mut self) {
        self.rules.borrow_mut().make_optional(&self.name);
    }

    /// Compare the data sets of two components.
    pub fn compare(&self, other: &Component) -> Ordering {
        if Rc::ptr_eq(&self.data, &other.data) {
            return Ordering::Equal;
        }
        self.data.borrow().compare(&other.data.borrow())
    }

    // -- typed value access --

    /// The value at position `pos` of a textual attribute.
    pub fn get_string(&self, tag: Tag, pos: usize) -> Result<String> {
        self.data
            .borrow()
            .string_at(tag, pos)
            .context(ValueNotFoundSnafu { tag })
    }

    /// The first value of a textual attribute, if any.
    pub fn string(&self, tag: Tag) -> Option<String> {
        self.data.borrow().string(tag)
    }

    /// All values of an attribute joined with backslashes.
    pub fn joined_string(&self, tag: Tag) -> Option<String> {
        self.data.borrow().joined_string(tag)
    }

    pub fn strings(&self, tag: Tag) -> Vec<String> {
        self.data.borrow().strings(tag)
    }

    pub fn uint16(&self, tag: Tag, pos: usize) -> Result<u16> {
        self.data
            .borrow()
            .uint16(tag, pos)
            .context(ValueNotFoundSnafu { tag })
    }

    /// Set a textual attribute,
    /// checking the value against the attribute's rule if `check` is set.
    ///
    /// An empty value leaves an empty attribute.
    pub fn set_string(&self, tag: Tag, value: &str, check: bool) -> Result<()> {
        let (vr, vm) = self.vr_and_vm(tag)?;
        if check && !value.is_empty() {
            check_string_value(vr, value, &vm).context(InvalidElementValueSnafu { tag })?;
        }
        let element = if value.is_empty() {
            empty_element(tag, vr)
        } else if value.contains('\\') {
            DataElement::new(
                tag,
                vr,
                PrimitiveValue::Strs(value.split('\\').map(str::to_string).collect()),
            )
        } else {
            DataElement::new(tag, vr, PrimitiveValue::from(value))
        };
        self.data.borrow_mut().put(element);
        Ok(())
    }

    /// Set a multi-valued textual attribute.
    pub fn set_strings(&self, tag: Tag, values: &[String], check: bool) -> Result<()> {
        self.set_string(tag, &values.join("\\"), check)
    }

    /// Set an unsigned short attribute.
    pub fn set_uint16s(&self, tag: Tag, values: &[u16], check: bool) -> Result<()> {
        self.set_primitive(tag, PrimitiveValue::U16(values.iter().copied().collect()), check)
    }

    pub fn set_uint32s(&self, tag: Tag, values: &[u32], check: bool) -> Result<()> {
        self.set_primitive(tag, PrimitiveValue::U32(values.iter().copied().collect()), check)
    }

    pub fn set_int32s(&self, tag: Tag, values: &[i32], check: bool) -> Result<()> {
        self.set_primitive(tag, PrimitiveValue::I32(values.iter().copied().collect()), check)
    }

    pub fn set_float64s(&self, tag: Tag, values: &[f64], check: bool) -> Result<()> {
        self.set_primitive(tag, PrimitiveValue::F64(values.iter().copied().collect()), check)
    }

    /// Set an attribute to the given binary value,
    /// keeping the value representation declared by its rule.
    pub fn set_primitive(&self, tag: Tag, value: PrimitiveValue, check: bool) -> Result<()> {
        let (vr, vm) = self.vr_and_vm(tag)?;
        let element: Element = DataElement::new(tag, vr, value);
        if check {
            element
                .check_value(&vm)
                .context(InvalidElementValueSnafu { tag })?;
        }
        self.data.borrow_mut().put(element);
        Ok(())
    }

    /// Set an attribute to an integer string value.
    pub fn set_int_string(&self, tag: Tag, value: i64, check: bool) -> Result<()> {
        self.set_string(tag, &value.to_string(), check)
    }

    /// Set a decimal string attribute from floating point numbers.
    pub fn set_decimals(&self, tag: Tag, values: &[f64], check: bool) -> Result<()> {
        let text: Vec<String> = values.iter().map(|v| format_decimal(*v)).collect();
        self.set_strings(tag, &text, check)
    }

    /// Remove an attribute from the data set.
    pub fn remove(&self, tag: Tag) -> bool {
        self.data.borrow_mut().delete(tag)
    }

    fn vr_and_vm(&self, tag: Tag) -> Result<(VR, String)> {
        let rules = self.rules.borrow();
        let rule = rules.get(tag).context(NoSuchRuleSnafu { tag })?;
        Ok((rule.vr(), rule.vm().to_string()))
    }
}

impl Clone for Component {
    /// Copy the data set and rule set into new, unshared handles.
    /// The copy has no parent.
    fn clone(&self) -> Self {
        Component {
            name: self.name.clone(),
            data: Rc::new(RefCell::new(self.data.borrow().clone())),
            rules: Rc::new(RefCell::new(self.rules.borrow().clone())),
            parent: None,
            value_check_on_write: self.value_check_on_write,
        }
    }
}

/// Common interface of all modules and macros.
///
/// Implementors only need to provide access to their [`Component`]
/// and declare their rules.
/// Those with nested items override `read`, `write` and `clear_data`
/// to also handle their sub-components.
pub trait IodComponent {
    fn component(&self) -> &Component;

    fn component_mut(&mut self) -> &mut Component;

    /// (Re-)declare the canonical rules of this component.
    fn reset_rules(&mut self);

    fn name(&self) -> &str {
        self.component().name()
    }

    fn read(&mut self, source: &DataSet, clear_old: bool) -> Result<()> {
        self.component_mut().read(source, clear_old)
    }

    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        self.component_mut().write(destination)
    }

    fn check(&self, quiet: bool) -> Result<()> {
        self.component().check(quiet)
    }

    fn clear_data(&mut self) {
        self.component_mut().clear_data()
    }

    fn make_optional(&mut self) {
        self.component_mut().make_optional()
    }

    fn set_value_check_on_write(&mut self, check: bool) {
        self.component_mut().set_value_check_on_write(check)
    }

    fn compare(&self, other: &dyn IodComponent) -> Ordering {
        self.component().compare(other.component())
    }
}

impl IodComponent for Component {
    fn component(&self) -> &Component {
        self
    }

    fn component_mut(&mut self) -> &mut Component {
        self
    }

    fn reset_rules(&mut self) {}
}

/// Insert an element into `destination` following its rule.
///
/// An absent type 2 attribute is written empty,
/// an absent type 1 attribute is a failure,
/// and other absent attributes are skipped.
/// A value failing the check (if `check` is set) is not written,
/// and any previous value in the destination is removed.
pub fn add_element_to_dataset(
    destination: &mut DataSet,
    element: Option<Element>,
    rule: &Rule,
    check: bool,
) -> Result<()> {
    let requirement = rule.requirement();
    let element = match element {
        Some(element) => element,
        None => {
            if requirement == Requirement::MandatoryCanBeEmpty {
                destination.put(empty_element(rule.tag(), rule.vr()));
                return Ok(());
            }
            return rule.validate(None).map_err(|e| {
                warn!("{}", e);
                e
            });
        }
    };

    if element.is_empty_normalized() {
        if requirement.must_have_value() {
            let e = MissingValueSnafu {
                tag: rule.tag(),
                module: rule.module(),
                requirement,
            }
            .build();
            warn!("{}", e);
            return Err(e);
        }
        if requirement.allows_empty() {
            destination.put(element);
        }
        return Ok(());
    }

    if check {
        if let Err(violation) = element.check_value(rule.vm()) {
            destination.delete(element.tag());
            let e = rule.violation_error(violation);
            warn!("{}", e);
            return Err(e);
        }
    }
    destination.put(element);
    Ok(())
}

/// Put the default values of the given rules
/// into absent or empty attributes of `data`.
fn invent_missing_in(rules: &[Rule], data: &mut DataSet) {
    for rule in rules {
        if rule.default_value().is_empty() {
            continue;
        }
        let missing = data
            .find(rule.tag())
            .map_or(true, |e| e.is_empty_normalized());
        if missing {
            debug!(
                "Inventing default value {} for {} in {}",
                rule.default_value(),
                rule.tag(),
                rule.module()
            );
            let values = rule.default_value().split('\\');
            match rule.vr() {
                VR::US => {
                    let numbers: Vec<u16> = values.filter_map(|v| v.trim().parse().ok()).collect();
                    data.put_u16s(rule.tag(), VR::US, &numbers);
                }
                VR::UL => {
                    let numbers: Vec<u32> = values.filter_map(|v| v.trim().parse().ok()).collect();
                    data.put_u32s(rule.tag(), VR::UL, &numbers);
                }
                VR::FD => {
                    let numbers: Vec<f64> = values.filter_map(|v| v.trim().parse().ok()).collect();
                    data.put_f64s(rule.tag(), VR::FD, &numbers);
                }
                vr => {
                    let values: Vec<String> = values.map(str::to_string).collect();
                    data.put_strs(rule.tag(), vr, &values);
                }
            }
        }
    }
}

fn first_failure(outcomes: impl Iterator<Item = Result<()>>) -> Result<()> {
    let mut result = Ok(());
    for outcome in outcomes {
        if result.is_ok() {
            result = outcome;
        }
    }
    result
}

/// Format a number as a decimal string of at most 16 characters.
pub(crate) fn format_decimal(value: f64) -> String {
    let text = value.to_string();
    if text.len() <= 16 {
        return text;
    }
    // trade precision for length
    for precision in (1..16).rev() {
        let text = format!("{:.*e}", precision, value);
        if text.len() <= 16 {
            return text;
        }
    }
    format!("{:e}", value)
}
