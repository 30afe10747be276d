//! The Content Item Macro: a typed, possibly nested value node
//! whose kind is given by its Value Type attribute.
use std::fmt;
use std::str::FromStr;

use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;
use tracing::warn;

use crate::component::{Component, IodComponent, SharedDataSet, SharedRules};
use crate::dataset::{DataSet, DataSetExt};
use crate::macros::{CodeSequenceMacro, ImageSopInstanceReferenceMacro};
use crate::rules::Level;
use crate::rules::Requirement::{self, ConditionalMandatory, Mandatory, Optional};
use crate::util::{
    check_item_count, read_single_item, read_sub_sequence, write_single_item, write_sub_sequence,
};
use crate::{MissingAttributeSnafu, Result};

/// The kind of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// No value type is set.
    Empty,
    /// A value type this library does not know about.
    Unknown,
    Date,
    Time,
    DateTime,
    PersonName,
    UidReference,
    Text,
    Code,
    Numeric,
    Composite,
    Image,
}

impl ValueType {
    /// The defined term of this value type,
    /// or `None` for `Empty` and `Unknown`.
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            ValueType::Empty | ValueType::Unknown => None,
            ValueType::Date => Some("DATE"),
            ValueType::Time => Some("TIME"),
            ValueType::DateTime => Some("DATETIME"),
            ValueType::PersonName => Some("PNAME"),
            ValueType::UidReference => Some("UIDREF"),
            ValueType::Text => Some("TEXT"),
            ValueType::Code => Some("CODE"),
            ValueType::Numeric => Some("NUMERIC"),
            ValueType::Composite => Some("COMPOSITE"),
            ValueType::Image => Some("IMAGE"),
        }
    }

    /// The attribute or sequence carrying the value of this type.
    fn payload_tag(self) -> Option<Tag> {
        match self {
            ValueType::Empty | ValueType::Unknown => None,
            ValueType::Date => Some(tags::DATE),
            ValueType::Time => Some(tags::TIME),
            ValueType::DateTime => Some(tags::DATE_TIME),
            ValueType::PersonName => Some(tags::PERSON_NAME),
            ValueType::UidReference => Some(tags::UID),
            ValueType::Text => Some(tags::TEXT_VALUE),
            ValueType::Code => Some(tags::CONCEPT_CODE_SEQUENCE),
            ValueType::Numeric => Some(tags::NUMERIC_VALUE),
            ValueType::Composite | ValueType::Image => Some(tags::REFERENCED_SOP_SEQUENCE),
        }
    }
}

impl FromStr for ValueType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim() {
            "" => ValueType::Empty,
            "DATE" => ValueType::Date,
            "TIME" => ValueType::Time,
            "DATETIME" => ValueType::DateTime,
            "PNAME" => ValueType::PersonName,
            "UIDREF" => ValueType::UidReference,
            "TEXT" => ValueType::Text,
            "CODE" => ValueType::Code,
            "NUMERIC" => ValueType::Numeric,
            "COMPOSITE" => ValueType::Composite,
            "IMAGE" => ValueType::Image,
            _ => ValueType::Unknown,
        })
    }
}

/// A numeric measurement and its units.
#[derive(Debug, Clone, Default)]
pub struct NumericValue {
    /// The decimal string value(s), backslash separated.
    pub value: String,
    pub floating_point: Vec<f64>,
    pub rational_numerators: Vec<i32>,
    pub rational_denominators: Vec<u32>,
    pub units: Option<CodeSequenceMacro>,
}

/// The value of a content item, as one of its kinds.
#[derive(Debug, Clone)]
pub enum ContentValue {
    Empty,
    /// An unrecognized value type, with its defined term.
    Unknown(String),
    Date(String),
    Time(String),
    DateTime(String),
    PersonName(String),
    UidReference(String),
    Text(String),
    Code(CodeSequenceMacro),
    Numeric(NumericValue),
    Composite(ImageSopInstanceReferenceMacro),
    Image(ImageSopInstanceReferenceMacro),
}

impl ContentValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            ContentValue::Empty => ValueType::Empty,
            ContentValue::Unknown(_) => ValueType::Unknown,
            ContentValue::Date(_) => ValueType::Date,
            ContentValue::Time(_) => ValueType::Time,
            ContentValue::DateTime(_) => ValueType::DateTime,
            ContentValue::PersonName(_) => ValueType::PersonName,
            ContentValue::UidReference(_) => ValueType::UidReference,
            ContentValue::Text(_) => ValueType::Text,
            ContentValue::Code(_) => ValueType::Code,
            ContentValue::Numeric(_) => ValueType::Numeric,
            ContentValue::Composite(_) => ValueType::Composite,
            ContentValue::Image(_) => ValueType::Image,
        }
    }
}

/// Attributes holding the plain values of content items.
const VALUE_ATTRIBUTES: [Tag; 10] = [
    tags::DATE_TIME,
    tags::DATE,
    tags::TIME,
    tags::PERSON_NAME,
    tags::UID,
    tags::TEXT_VALUE,
    tags::NUMERIC_VALUE,
    tags::FLOATING_POINT_VALUE,
    tags::RATIONAL_NUMERATOR_VALUE,
    tags::RATIONAL_DENOMINATOR_VALUE,
];

/// A content item: a concept name paired with a typed value,
/// optionally followed by related child content items.
///
/// The kind of value is always derived from the Value Type attribute.
/// [`set_value`](ContentItemMacro::set_value) changes the value
/// together with its kind.
#[derive(Debug)]
pub struct ContentItemMacro {
    component: Component,
    concept_name: CodeSequenceMacro,
    concept_code: CodeSequenceMacro,
    measurement_units: CodeSequenceMacro,
    referenced_sop: ImageSopInstanceReferenceMacro,
    content: Vec<ContentItemMacro>,
}

impl ContentItemMacro {
    pub const NAME: &'static str = "ContentItemMacro";

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    pub fn new_shared(data: SharedDataSet, rules: SharedRules) -> Self {
        Self::from_component(Component::new_shared(Self::NAME, data, rules))
    }

    /// Create a content item with the given concept name and value.
    pub fn with_value(concept_name: CodeSequenceMacro, value: ContentValue) -> Result<Self> {
        let mut item = Self::new();
        item.set_concept_name(concept_name);
        item.set_value(value, true)?;
        Ok(item)
    }

    fn from_component(component: Component) -> Self {
        let mut item = ContentItemMacro {
            component,
            concept_name: CodeSequenceMacro::new(),
            concept_code: CodeSequenceMacro::new(),
            measurement_units: CodeSequenceMacro::new(),
            referenced_sop: ImageSopInstanceReferenceMacro::new(),
            content: Vec::new(),
        };
        item.link_children();
        item.reset_rules();
        item
    }

    fn link_children(&mut self) {
        let parent = &self.component;
        self.concept_name.component_mut().set_parent(Some(parent));
        self.concept_code.component_mut().set_parent(Some(parent));
        self.measurement_units
            .component_mut()
            .set_parent(Some(parent));
        self.referenced_sop.component_mut().set_parent(Some(parent));
        for child in &mut self.content {
            child.component.set_parent(Some(parent));
        }
    }

    /// The kind of this item, as declared by its Value Type.
    pub fn value_type(&self) -> ValueType {
        match self.component.string(tags::VALUE_TYPE) {
            Some(text) => text.parse().unwrap_or(ValueType::Unknown),
            None => ValueType::Empty,
        }
    }

    pub fn concept_name(&self) -> &CodeSequenceMacro {
        &self.concept_name
    }

    pub fn set_concept_name(&mut self, code: CodeSequenceMacro) {
        self.concept_name = code;
        self.link_children();
    }

    /// The coded value of a `CODE` item.
    pub fn concept_code(&self) -> &CodeSequenceMacro {
        &self.concept_code
    }

    pub fn measurement_units(&self) -> &CodeSequenceMacro {
        &self.measurement_units
    }

    /// The referenced instance of a `COMPOSITE` or `IMAGE` item.
    pub fn referenced_sop(&self) -> &ImageSopInstanceReferenceMacro {
        &self.referenced_sop
    }

    pub fn relationship_type(&self) -> Option<String> {
        self.component.string(tags::RELATIONSHIP_TYPE)
    }

    /// Set how this item relates to its parent item
    /// (e.g. `CONTAINS`, `HAS PROPERTIES`).
    pub fn set_relationship_type(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::RELATIONSHIP_TYPE, value, check)
    }

    /// The child content items.
    pub fn content_items(&self) -> &[ContentItemMacro] {
        &self.content
    }

    pub fn content_items_mut(&mut self) -> &mut Vec<ContentItemMacro> {
        &mut self.content
    }

    /// Append a child item with the given relationship to this item.
    ///
    /// The child must pass its check.
    pub fn add_content_item(&mut self, relationship: &str, mut item: ContentItemMacro) -> Result<()> {
        item.set_relationship_type(relationship, true)?;
        item.check(true)?;
        item.component.set_parent(Some(&self.component));
        self.content.push(item);
        Ok(())
    }

    /// The value of this item, in the kind declared by its Value Type.
    pub fn value(&self) -> ContentValue {
        let text = |tag: Tag| self.component.joined_string(tag).unwrap_or_default();
        match self.value_type() {
            ValueType::Empty => ContentValue::Empty,
            ValueType::Unknown => ContentValue::Unknown(text(tags::VALUE_TYPE)),
            ValueType::Date => ContentValue::Date(text(tags::DATE)),
            ValueType::Time => ContentValue::Time(text(tags::TIME)),
            ValueType::DateTime => ContentValue::DateTime(text(tags::DATE_TIME)),
            ValueType::PersonName => ContentValue::PersonName(text(tags::PERSON_NAME)),
            ValueType::UidReference => ContentValue::UidReference(text(tags::UID)),
            ValueType::Text => ContentValue::Text(text(tags::TEXT_VALUE)),
            ValueType::Code => ContentValue::Code(self.concept_code.clone()),
            ValueType::Numeric => {
                let data = self.component.data();
                ContentValue::Numeric(NumericValue {
                    value: text(tags::NUMERIC_VALUE),
                    floating_point: data
                        .float64_values(tags::FLOATING_POINT_VALUE)
                        .unwrap_or_default(),
                    rational_numerators: data
                        .int32_values(tags::RATIONAL_NUMERATOR_VALUE)
                        .unwrap_or_default(),
                    rational_denominators: data
                        .uint32_values(tags::RATIONAL_DENOMINATOR_VALUE)
                        .unwrap_or_default(),
                    units: if self.measurement_units.is_empty() {
                        None
                    } else {
                        Some(self.measurement_units.clone())
                    },
                })
            }
            ValueType::Composite => ContentValue::Composite(self.referenced_sop.clone()),
            ValueType::Image => ContentValue::Image(self.referenced_sop.clone()),
        }
    }

    /// Replace the value of this item and its Value Type.
    ///
    /// Any value of the previous kind is removed first.
    pub fn set_value(&mut self, value: ContentValue, check: bool) -> Result<()> {
        self.clear_value();
        let value_type = match &value {
            ContentValue::Unknown(term) => term.as_str(),
            other => other.value_type().as_str().unwrap_or_default(),
        };
        if value_type.is_empty() {
            self.component.remove(tags::VALUE_TYPE);
        } else {
            self.component
                .set_string(tags::VALUE_TYPE, value_type, check)?;
        }

        match value {
            ContentValue::Empty | ContentValue::Unknown(_) => Ok(()),
            ContentValue::Date(v) => self.component.set_string(tags::DATE, &v, check),
            ContentValue::Time(v) => self.component.set_string(tags::TIME, &v, check),
            ContentValue::DateTime(v) => self.component.set_string(tags::DATE_TIME, &v, check),
            ContentValue::PersonName(v) => self.component.set_string(tags::PERSON_NAME, &v, check),
            ContentValue::UidReference(v) => self.component.set_string(tags::UID, &v, check),
            ContentValue::Text(v) => self.component.set_string(tags::TEXT_VALUE, &v, check),
            ContentValue::Code(code) => {
                if check {
                    code.check(true)?;
                }
                self.concept_code = code;
                self.link_children();
                Ok(())
            }
            ContentValue::Numeric(numeric) => self.set_numeric(numeric, check),
            ContentValue::Composite(reference) | ContentValue::Image(reference) => {
                if check {
                    reference.check(true)?;
                }
                self.referenced_sop = reference;
                self.link_children();
                Ok(())
            }
        }
    }

    fn set_numeric(&mut self, numeric: NumericValue, check: bool) -> Result<()> {
        self.component
            .set_string(tags::NUMERIC_VALUE, &numeric.value, check)?;
        if !numeric.floating_point.is_empty() {
            self.component
                .set_float64s(tags::FLOATING_POINT_VALUE, &numeric.floating_point, check)?;
        }
        if !numeric.rational_numerators.is_empty() {
            self.component.set_int32s(
                tags::RATIONAL_NUMERATOR_VALUE,
                &numeric.rational_numerators,
                check,
            )?;
        }
        if !numeric.rational_denominators.is_empty() {
            self.component.set_uint32s(
                tags::RATIONAL_DENOMINATOR_VALUE,
                &numeric.rational_denominators,
                check,
            )?;
        }
        if let Some(units) = numeric.units {
            if check {
                units.check(true)?;
            }
            self.measurement_units = units;
            self.link_children();
        }
        Ok(())
    }

    fn clear_value(&mut self) {
        for tag in VALUE_ATTRIBUTES {
            self.component.remove(tag);
        }
        self.concept_code.clear_data();
        self.measurement_units.clear_data();
        self.referenced_sop.clear_data();
    }

    /// Whether the value required by the item's Value Type is present.
    fn check_value_presence(&self, quiet: bool) -> Result<()> {
        let value_type = self.value_type();
        let present = match value_type {
            ValueType::Empty | ValueType::Unknown => true,
            ValueType::Code => !self.concept_code.is_empty(),
            ValueType::Composite | ValueType::Image => {
                self.referenced_sop.reference().referenced_sop_instance_uid().is_some()
            }
            other => other
                .payload_tag()
                .map_or(true, |tag| self.component.string(tag).is_some()),
        };
        if present {
            return Ok(());
        }
        let e = MissingAttributeSnafu {
            tag: value_type.payload_tag().unwrap_or(tags::VALUE_TYPE),
            module: Self::NAME,
            requirement: ConditionalMandatory,
        }
        .build();
        if !quiet {
            warn!("{}", e);
        }
        Err(e)
    }

    fn check_single_item(&self, tag: Tag, item: &dyn IodComponent, empty: bool, quiet: bool) -> Result<()> {
        match self.component.rule(tag) {
            Some(rule) if empty => check_item_count(&rule, 0),
            Some(_) => item.check(quiet),
            None => Ok(()),
        }
    }
}

impl Clone for ContentItemMacro {
    /// Deep copy. The sub-components and child items of the copy
    /// are linked to the copy, not to the original.
    fn clone(&self) -> Self {
        let mut item = ContentItemMacro {
            component: self.component.clone(),
            concept_name: self.concept_name.clone(),
            concept_code: self.concept_code.clone(),
            measurement_units: self.measurement_units.clone(),
            referenced_sop: self.referenced_sop.clone(),
            content: self.content.clone(),
        };
        item.link_children();
        item
    }
}

impl Default for ContentItemMacro {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContentItemMacro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.concept_name.is_empty() {
            write!(f, "<no name>: ")?;
        } else {
            write!(f, "{}: ", self.concept_name)?;
        }
        match self.value() {
            ContentValue::Empty => write!(f, "<no value>"),
            ContentValue::Unknown(term) => write!(f, "{}: <unknown value type>", term),
            ContentValue::Date(v) => write!(f, "DATE: {}", v),
            ContentValue::Time(v) => write!(f, "TIME: {}", v),
            ContentValue::DateTime(v) => write!(f, "DATETIME: {}", v),
            ContentValue::PersonName(v) => write!(f, "PNAME: {}", v),
            ContentValue::UidReference(v) => write!(f, "UIDREF: {}", v),
            ContentValue::Text(v) => write!(f, "TEXT: {}", v),
            ContentValue::Code(code) => write!(f, "CODE: {}", code),
            ContentValue::Numeric(numeric) => {
                write!(f, "NUMERIC: {}", numeric.value)?;
                if let Some(units) = &numeric.units {
                    write!(f, ", Units: {}", units)?;
                }
                if !numeric.floating_point.is_empty() {
                    write!(f, ", Float value(s): {:?}", numeric.floating_point)?;
                }
                Ok(())
            }
            ContentValue::Composite(r) | ContentValue::Image(r) => {
                write!(
                    f,
                    "{}: {} / {}",
                    self.value_type().as_str().unwrap_or_default(),
                    r.reference().referenced_sop_class_uid().unwrap_or_default(),
                    r.reference().referenced_sop_instance_uid().unwrap_or_default()
                )?;
                let frames = r.referenced_frame_numbers().unwrap_or_default();
                if !frames.is_empty() {
                    write!(f, " / Frames: {:?}", frames)?;
                }
                let segments = r.referenced_segment_numbers();
                if !segments.is_empty() {
                    write!(f, " / Segments: {:?}", segments)?;
                }
                Ok(())
            }
        }
    }
}

impl IodComponent for ContentItemMacro {
    fn component(&self) -> &Component {
        &self.component
    }

    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }

    fn reset_rules(&mut self) {
        let rules: [(Tag, VR, &str, Requirement); 17] = [
            (tags::VALUE_TYPE, VR::CS, "1", Mandatory),
            (tags::CONCEPT_NAME_CODE_SEQUENCE, VR::SQ, "1", Mandatory),
            (tags::DATE_TIME, VR::DT, "1", ConditionalMandatory),
            (tags::DATE, VR::DA, "1", ConditionalMandatory),
            (tags::TIME, VR::TM, "1", ConditionalMandatory),
            (tags::PERSON_NAME, VR::PN, "1", ConditionalMandatory),
            (tags::UID, VR::UI, "1", ConditionalMandatory),
            (tags::TEXT_VALUE, VR::UT, "1", ConditionalMandatory),
            (tags::CONCEPT_CODE_SEQUENCE, VR::SQ, "1", ConditionalMandatory),
            (tags::NUMERIC_VALUE, VR::DS, "1-n", ConditionalMandatory),
            (tags::FLOATING_POINT_VALUE, VR::FD, "1-n", ConditionalMandatory),
            (tags::RATIONAL_NUMERATOR_VALUE, VR::SL, "1-n", ConditionalMandatory),
            (tags::RATIONAL_DENOMINATOR_VALUE, VR::UL, "1-n", ConditionalMandatory),
            (tags::MEASUREMENT_UNITS_CODE_SEQUENCE, VR::SQ, "1", ConditionalMandatory),
            (tags::REFERENCED_SOP_SEQUENCE, VR::SQ, "1", ConditionalMandatory),
            (tags::RELATIONSHIP_TYPE, VR::CS, "1", ConditionalMandatory),
            (tags::CONTENT_SEQUENCE, VR::SQ, "1-n", Optional),
        ];
        self.component.declare_rules(Level::Unspecified, &rules);
    }

    fn read(&mut self, source: &DataSet, clear_old: bool) -> Result<()> {
        if clear_old {
            self.clear_data();
        }
        self.component.read(source, false)?;
        let parent = &self.component;
        read_single_item(
            source,
            tags::CONCEPT_NAME_CODE_SEQUENCE,
            &mut self.concept_name,
            parent,
        )?;
        read_single_item(source, tags::CONCEPT_CODE_SEQUENCE, &mut self.concept_code, parent)?;
        read_single_item(
            source,
            tags::MEASUREMENT_UNITS_CODE_SEQUENCE,
            &mut self.measurement_units,
            parent,
        )?;
        read_single_item(
            source,
            tags::REFERENCED_SOP_SEQUENCE,
            &mut self.referenced_sop,
            parent,
        )?;
        read_sub_sequence(source, tags::CONTENT_SEQUENCE, &mut self.content, parent)
    }

    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        let parent = &self.component;
        let outcomes = [
            write_single_item(
                tags::CONCEPT_NAME_CODE_SEQUENCE,
                &mut self.concept_name,
                parent,
                destination,
            ),
            write_single_item(
                tags::CONCEPT_CODE_SEQUENCE,
                &mut self.concept_code,
                parent,
                destination,
            ),
            write_single_item(
                tags::MEASUREMENT_UNITS_CODE_SEQUENCE,
                &mut self.measurement_units,
                parent,
                destination,
            ),
            write_single_item(
                tags::REFERENCED_SOP_SEQUENCE,
                &mut self.referenced_sop,
                parent,
                destination,
            ),
            write_sub_sequence(tags::CONTENT_SEQUENCE, &mut self.content, parent, destination),
        ];
        let own = self.component.write(destination);
        outcomes.into_iter().fold(Ok(()), Result::and).and(own)
    }

    fn check(&self, quiet: bool) -> Result<()> {
        self.component.check(quiet)?;
        self.check_single_item(
            tags::CONCEPT_NAME_CODE_SEQUENCE,
            &self.concept_name,
            self.concept_name.is_empty(),
            quiet,
        )?;
        if !self.concept_code.is_empty() {
            self.concept_code.check(quiet)?;
        }
        if !self.measurement_units.is_empty() {
            self.measurement_units.check(quiet)?;
        }
        let has_reference = self
            .referenced_sop
            .reference()
            .referenced_sop_instance_uid()
            .is_some();
        self.check_single_item(
            tags::REFERENCED_SOP_SEQUENCE,
            &self.referenced_sop,
            !has_reference,
            quiet,
        )?;
        for child in &self.content {
            child.check(quiet)?;
        }
        self.check_value_presence(quiet)
    }

    fn clear_data(&mut self) {
        self.component.clear_data();
        self.concept_name.clear_data();
        self.concept_code.clear_data();
        self.measurement_units.clear_data();
        self.referenced_sop.clear_data();
        self.content.clear();
    }

    fn set_value_check_on_write(&mut self, check: bool) {
        self.component.set_value_check_on_write(check);
        self.concept_name.set_value_check_on_write(check);
        self.concept_code.set_value_check_on_write(check);
        self.measurement_units.set_value_check_on_write(check);
        self.referenced_sop.set_value_check_on_write(check);
        for child in &mut self.content {
            child.set_value_check_on_write(check);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::rc::Rc;

    fn finding() -> CodeSequenceMacro {
        CodeSequenceMacro::with_code("121071", "DCM", "Finding").unwrap()
    }

    #[test]
    fn value_type_follows_the_attribute() {
        let mut item = ContentItemMacro::new();
        assert_eq!(item.value_type(), ValueType::Empty);
        assert!(matches!(item.value(), ContentValue::Empty));

        item.set_value(ContentValue::Text("no findings".into()), true)
            .unwrap();
        assert_eq!(item.value_type(), ValueType::Text);
        assert_eq!(item.component().string(tags::VALUE_TYPE).as_deref(), Some("TEXT"));

        item.component()
            .set_string(tags::VALUE_TYPE, "WAVEFORM", false)
            .unwrap();
        assert_eq!(item.value_type(), ValueType::Unknown);
        assert!(matches!(item.value(), ContentValue::Unknown(term) if term == "WAVEFORM"));
    }

    #[test]
    fn changing_the_kind_drops_the_old_value() {
        let mut item = ContentItemMacro::with_value(finding(), ContentValue::Date("20240131".into()))
            .unwrap();
        assert!(matches!(item.value(), ContentValue::Date(d) if d == "20240131"));

        let code = CodeSequenceMacro::with_code("T-D3000", "SRT", "Chest").unwrap();
        item.set_value(ContentValue::Code(code), true).unwrap();
        assert_eq!(item.value_type(), ValueType::Code);
        assert!(item.component().string(tags::DATE).is_none());
        assert_eq!(item.to_string(), "(DCM,121071,Finding): CODE: (SRT,T-D3000,Chest)");
        assert_eq!(item.check(true), Ok(()));
    }

    #[test]
    fn missing_payload_fails_the_check() {
        let item = ContentItemMacro::new();
        item.component()
            .set_string(tags::VALUE_TYPE, "CODE", true)
            .unwrap();
        let mut item = item;
        item.set_concept_name(finding());
        assert!(matches!(
            item.check(true),
            Err(Error::MissingAttribute { tag, .. }) if tag == tags::CONCEPT_CODE_SEQUENCE
        ));
    }

    #[test]
    fn numeric_items_round_trip() {
        let units = CodeSequenceMacro::with_code("mm", "UCUM", "millimeter").unwrap();
        let numeric = NumericValue {
            value: "12.5".into(),
            floating_point: vec![12.5],
            units: Some(units),
            ..NumericValue::default()
        };
        let mut item = ContentItemMacro::with_value(finding(), ContentValue::Numeric(numeric))
            .unwrap();

        let mut out = DataSet::new_empty();
        item.write(&mut out).unwrap();
        assert!(out.contains(tags::MEASUREMENT_UNITS_CODE_SEQUENCE));
        assert!(out.contains(tags::CONCEPT_NAME_CODE_SEQUENCE));
        assert!(!out.contains(tags::CONCEPT_CODE_SEQUENCE));

        let mut read = ContentItemMacro::new();
        read.read(&out, true).unwrap();
        match read.value() {
            ContentValue::Numeric(n) => {
                assert_eq!(n.value, "12.5");
                assert_eq!(n.floating_point, vec![12.5]);
                assert_eq!(n.units.map(|u| u.to_string()).as_deref(), Some("(UCUM,mm,millimeter)"));
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn image_references_and_nested_items() {
        let reference = ImageSopInstanceReferenceMacro::create(
            "1.2.840.10008.5.1.4.1.1.2",
            "1.2.3.4",
            &[2],
        )
        .unwrap();
        let source = ContentItemMacro::with_value(
            CodeSequenceMacro::with_code("121112", "DCM", "Source of Measurement").unwrap(),
            ContentValue::Image(reference),
        )
        .unwrap();

        let mut root = ContentItemMacro::with_value(finding(), ContentValue::Text("lesion".into()))
            .unwrap();
        root.add_content_item("INFERRED FROM", source).unwrap();
        assert!(root
            .add_content_item("CONTAINS", ContentItemMacro::new())
            .is_err());
        assert_eq!(root.content_items().len(), 1);

        let mut out = DataSet::new_empty();
        root.write(&mut out).unwrap();
        let children = out.sequence_items(tags::CONTENT_SEQUENCE).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(
            children[0].string(tags::RELATIONSHIP_TYPE).as_deref(),
            Some("INFERRED FROM")
        );
        assert!(children[0].contains(tags::REFERENCED_SOP_SEQUENCE));

        let mut read = ContentItemMacro::new();
        read.read(&out, true).unwrap();
        assert_eq!(read.check(true), Ok(()));
        let child = &read.content_items()[0];
        assert_eq!(child.value_type(), ValueType::Image);
        assert!(child.component().parent().is_some());
        assert_eq!(
            child.to_string(),
            "(DCM,121112,Source of Measurement): IMAGE: 1.2.840.10008.5.1.4.1.1.2 / 1.2.3.4 / Frames: [2]"
        );
    }

    #[test]
    fn own_attributes_are_written_when_a_sequence_fails() {
        let mut item = ContentItemMacro::new();
        item.set_value(ContentValue::Text("hello".into()), true)
            .unwrap();
        item.set_relationship_type("CONTAINS", true).unwrap();

        let mut out = DataSet::new_empty();
        assert!(matches!(
            item.write(&mut out),
            Err(Error::MissingAttribute { tag, .. }) if tag == tags::CONCEPT_NAME_CODE_SEQUENCE
        ));
        assert_eq!(out.string(tags::VALUE_TYPE).as_deref(), Some("TEXT"));
        assert_eq!(out.string(tags::TEXT_VALUE).as_deref(), Some("hello"));
        assert_eq!(out.string(tags::RELATIONSHIP_TYPE).as_deref(), Some("CONTAINS"));
    }

    #[test]
    fn clone_links_children_to_the_copy() {
        let child = ContentItemMacro::with_value(finding(), ContentValue::Text("child".into()))
            .unwrap();
        let mut root = ContentItemMacro::with_value(finding(), ContentValue::Text("root".into()))
            .unwrap();
        root.add_content_item("CONTAINS", child).unwrap();

        let copy = root.clone();
        let copy_data = copy.component().shared_data();
        let linked = copy.content_items()[0].component().parent().unwrap();
        assert!(Rc::ptr_eq(&linked, &copy_data));
        let linked = copy.concept_name().component().parent().unwrap();
        assert!(Rc::ptr_eq(&linked, &copy_data));

        drop(root);
        assert!(copy.content_items()[0].component().parent().is_some());
        assert_eq!(copy.check(true), Ok(()));
    }
}
