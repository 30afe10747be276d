//! The in-memory attribute container viewed by IOD components.
//!
//! A [`DataSet`] is a `dicom-object` in-memory DICOM object:
//! it maps attribute tags to data elements
//! whose nested sequence items are data sets themselves.
//! The [`DataSetExt`] trait adds the item navigation,
//! typed access and comparison used by the components.
//! Lookups never descend into nested items.
use std::cmp::Ordering;

use dicom_core::header::Header;
use dicom_core::value::{DataSetSequence, PrimitiveValue, Value};
use dicom_core::{DataElement, Length, Tag, VR};
use dicom_object::mem::{InMemElement, InMemFragment};
use dicom_object::InMemDicomObject;

use crate::check::primitive_strings;

/// An in-memory, tag-ordered collection of data elements.
pub type DataSet = InMemDicomObject;

/// A data element of a [`DataSet`].
pub type Element = InMemElement;

/// The position of a sequence item to look up or create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemIndex {
    /// The item at the given zero-based position.
    /// Positions past the last item refer to a new item after it.
    At(usize),
    /// A new item after the last one.
    Append,
}

/// Container operations over a [`DataSet`].
pub trait DataSetExt {
    /// The number of elements on this level.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The tags of all elements in ascending order.
    fn tags(&self) -> Vec<Tag>;

    fn contains(&self, tag: Tag) -> bool {
        self.find(tag).is_some()
    }

    /// Look up an element on this level of the data set.
    fn find(&self, tag: Tag) -> Option<&Element>;

    /// Insert an element.
    ///
    /// If an element with the same tag exists,
    /// it is only replaced if `overwrite` is set.
    /// Returns whether the element was inserted.
    fn insert(&mut self, element: Element, overwrite: bool) -> bool;

    /// Remove an element, reporting whether it was present.
    fn delete(&mut self, tag: Tag) -> bool;

    /// Remove and return an element.
    fn take(&mut self, tag: Tag) -> Option<Element>;

    /// Remove all elements.
    fn clear(&mut self);

    /// Retrieve the item at `index` of the sequence with the given tag.
    fn find_sequence_item(&self, tag: Tag, index: usize) -> Option<&DataSet> {
        self.sequence_items(tag).and_then(|items| items.get(index))
    }

    /// All items of the sequence with the given tag,
    /// or `None` if there is no such sequence.
    fn sequence_items(&self, tag: Tag) -> Option<&[DataSet]> {
        self.find(tag).and_then(|e| e.value().items())
    }

    /// Modify the items of an existing sequence in place.
    ///
    /// Returns `None` if the attribute is absent or not a sequence.
    fn modify_sequence_items<F, R>(&mut self, tag: Tag, f: F) -> Option<R>
    where
        F: FnOnce(&mut Vec<DataSet>) -> R;

    /// Apply `f` to the item at `index` of the sequence with the given tag.
    ///
    /// Returns `None` if there is no such item.
    fn find_sequence_item_mut<F, R>(&mut self, tag: Tag, index: usize, f: F) -> Option<R>
    where
        F: FnOnce(&mut DataSet) -> R,
    {
        self.sequence_items(tag)?.get(index)?;
        self.modify_sequence_items(tag, |items| f(&mut items[index]))
    }

    /// Apply `f` to a sequence item, creating the sequence
    /// and the item if missing.
    ///
    /// An index past the last item creates one new item at the end.
    /// A non-sequence element under the same tag is replaced.
    fn find_or_create_sequence_item<F, R>(&mut self, tag: Tag, index: ItemIndex, f: F) -> R
    where
        F: FnOnce(&mut DataSet) -> R;

    /// Remove the item at `index` of a sequence, reporting whether it existed.
    fn delete_sequence_item(&mut self, tag: Tag, index: usize) -> bool {
        self.modify_sequence_items(tag, |items| {
            if index < items.len() {
                items.remove(index);
                true
            } else {
                false
            }
        })
        .unwrap_or(false)
    }

    /// Structural comparison of two data sets:
    /// tags first, then value representations and values.
    fn compare(&self, other: &DataSet) -> Ordering;

    /// The first value of a textual attribute, without padding.
    fn string(&self, tag: Tag) -> Option<String> {
        self.string_at(tag, 0)
    }

    /// The value at position `pos` of a textual attribute, without padding.
    fn string_at(&self, tag: Tag, pos: usize) -> Option<String> {
        self.strings(tag).into_iter().nth(pos)
    }

    /// All values of a textual attribute, without padding.
    /// Empty if the attribute is absent or empty.
    fn strings(&self, tag: Tag) -> Vec<String> {
        match self.find(tag).map(|e| (e.vr(), e.value())) {
            Some((vr, Value::Primitive(v))) => {
                let values = primitive_strings(vr, v);
                if values.iter().all(|s| s.trim_matches(PADDING).is_empty()) {
                    return Vec::new();
                }
                values
                    .into_iter()
                    .map(|s| s.trim_matches(PADDING).to_string())
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// All values of an attribute as one string, joined with backslashes.
    fn joined_string(&self, tag: Tag) -> Option<String> {
        let values = self.strings(tag);
        if values.is_empty() {
            None
        } else {
            Some(values.join("\\"))
        }
    }

    fn uint16(&self, tag: Tag, pos: usize) -> Option<u16> {
        self.uint16_values(tag).and_then(|v| v.get(pos).copied())
    }

    /// The values of an US, OW or US/SS attribute.
    fn uint16_values(&self, tag: Tag) -> Option<Vec<u16>> {
        match primitive(self.find(tag)?)? {
            PrimitiveValue::U16(v) => Some(v.to_vec()),
            PrimitiveValue::I16(v) => Some(v.iter().map(|&x| x as u16).collect()),
            PrimitiveValue::U8(bytes) => Some(
                bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            _ => None,
        }
    }

    fn uint32_values(&self, tag: Tag) -> Option<Vec<u32>> {
        match primitive(self.find(tag)?)? {
            PrimitiveValue::U32(v) => Some(v.to_vec()),
            PrimitiveValue::U16(v) => Some(v.iter().map(|&x| u32::from(x)).collect()),
            _ => None,
        }
    }

    fn int32_values(&self, tag: Tag) -> Option<Vec<i32>> {
        match primitive(self.find(tag)?)? {
            PrimitiveValue::I32(v) => Some(v.to_vec()),
            PrimitiveValue::I16(v) => Some(v.iter().map(|&x| i32::from(x)).collect()),
            PrimitiveValue::Str(_) | PrimitiveValue::Strs(_) => self
                .strings(tag)
                .iter()
                .map(|s| s.parse().ok())
                .collect(),
            _ => None,
        }
    }

    fn float64(&self, tag: Tag, pos: usize) -> Option<f64> {
        self.float64_values(tag).and_then(|v| v.get(pos).copied())
    }

    fn float64_values(&self, tag: Tag) -> Option<Vec<f64>> {
        match primitive(self.find(tag)?)? {
            PrimitiveValue::F64(v) => Some(v.to_vec()),
            PrimitiveValue::F32(v) => Some(v.iter().map(|&x| f64::from(x)).collect()),
            PrimitiveValue::Str(_) | PrimitiveValue::Strs(_) => self
                .strings(tag)
                .iter()
                .map(|s| s.parse().ok())
                .collect(),
            _ => None,
        }
    }

    fn tag_values(&self, tag: Tag) -> Option<Vec<Tag>> {
        match primitive(self.find(tag)?)? {
            PrimitiveValue::Tags(v) => Some(v.to_vec()),
            _ => None,
        }
    }

    fn bytes(&self, tag: Tag) -> Option<Vec<u8>> {
        match primitive(self.find(tag)?)? {
            PrimitiveValue::U8(v) => Some(v.to_vec()),
            _ => None,
        }
    }

    /// Insert an element, replacing (and returning) any previous element
    /// of the same attribute.
    fn put_element(&mut self, element: Element) -> Option<Element>;

    /// Put a single textual value.
    fn put_str(&mut self, tag: Tag, vr: VR, value: &str) -> Option<Element> {
        self.put_element(DataElement::new(tag, vr, PrimitiveValue::from(value)))
    }

    /// Put a multi-valued textual attribute.
    fn put_strs(&mut self, tag: Tag, vr: VR, values: &[String]) -> Option<Element> {
        self.put_element(DataElement::new(
            tag,
            vr,
            PrimitiveValue::Strs(values.iter().cloned().collect()),
        ))
    }

    fn put_u16s(&mut self, tag: Tag, vr: VR, values: &[u16]) -> Option<Element> {
        self.put_element(DataElement::new(
            tag,
            vr,
            PrimitiveValue::U16(values.iter().copied().collect()),
        ))
    }

    fn put_u32s(&mut self, tag: Tag, vr: VR, values: &[u32]) -> Option<Element> {
        self.put_element(DataElement::new(
            tag,
            vr,
            PrimitiveValue::U32(values.iter().copied().collect()),
        ))
    }

    fn put_i32s(&mut self, tag: Tag, vr: VR, values: &[i32]) -> Option<Element> {
        self.put_element(DataElement::new(
            tag,
            vr,
            PrimitiveValue::I32(values.iter().copied().collect()),
        ))
    }

    fn put_f64s(&mut self, tag: Tag, vr: VR, values: &[f64]) -> Option<Element> {
        self.put_element(DataElement::new(
            tag,
            vr,
            PrimitiveValue::F64(values.iter().copied().collect()),
        ))
    }

    fn put_tags(&mut self, tag: Tag, values: &[Tag]) -> Option<Element> {
        self.put_element(DataElement::new(
            tag,
            VR::AT,
            PrimitiveValue::Tags(values.iter().copied().collect()),
        ))
    }

    fn put_bytes(&mut self, tag: Tag, vr: VR, bytes: &[u8]) -> Option<Element> {
        self.put_element(DataElement::new(
            tag,
            vr,
            PrimitiveValue::U8(bytes.iter().copied().collect()),
        ))
    }

    /// Put an element without a value.
    fn put_empty(&mut self, tag: Tag, vr: VR) -> Option<Element> {
        self.put_element(empty_element(tag, vr))
    }

    /// Put a sequence with the given items.
    fn put_sequence(&mut self, tag: Tag, items: Vec<DataSet>) -> Option<Element> {
        self.put_element(sequence_element(tag, items))
    }
}

const PADDING: &[char] = &[' ', '\0'];

impl DataSetExt for DataSet {
    fn len(&self) -> usize {
        self.into_iter().count()
    }

    fn tags(&self) -> Vec<Tag> {
        self.into_iter().map(|e| e.tag()).collect()
    }

    fn find(&self, tag: Tag) -> Option<&Element> {
        self.element(tag).ok()
    }

    fn insert(&mut self, element: Element, overwrite: bool) -> bool {
        if !overwrite && self.contains(element.tag()) {
            return false;
        }
        self.put_element(element);
        true
    }

    fn delete(&mut self, tag: Tag) -> bool {
        self.remove_element(tag)
    }

    fn take(&mut self, tag: Tag) -> Option<Element> {
        self.take_element(tag).ok()
    }

    fn clear(&mut self) {
        for tag in DataSetExt::tags(self) {
            self.remove_element(tag);
        }
    }

    fn modify_sequence_items<F, R>(&mut self, tag: Tag, f: F) -> Option<R>
    where
        F: FnOnce(&mut Vec<DataSet>) -> R,
    {
        let is_sequence = matches!(self.find(tag).map(|e| e.value()), Some(Value::Sequence(_)));
        if !is_sequence {
            return None;
        }
        let mut items = take_items(self, tag);
        let out = f(&mut items);
        self.put_sequence(tag, items);
        Some(out)
    }

    fn find_or_create_sequence_item<F, R>(&mut self, tag: Tag, index: ItemIndex, f: F) -> R
    where
        F: FnOnce(&mut DataSet) -> R,
    {
        let mut items = take_items(self, tag);
        let pos = match index {
            ItemIndex::At(pos) if pos < items.len() => pos,
            _ => {
                items.push(DataSet::new_empty());
                items.len() - 1
            }
        };
        let out = f(&mut items[pos]);
        self.put_sequence(tag, items);
        out
    }

    fn compare(&self, other: &DataSet) -> Ordering {
        let mut left = self.into_iter();
        let mut right = other.into_iter();
        loop {
            match (left.next(), right.next()) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(e1), Some(e2)) => {
                    let ord = e1
                        .tag()
                        .cmp(&e2.tag())
                        .then_with(|| e1.vr().cmp(&e2.vr()))
                        .then_with(|| compare_values(e1, e2));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
            }
        }
    }

    fn put_element(&mut self, element: Element) -> Option<Element> {
        self.put(element)
    }
}

fn primitive(element: &Element) -> Option<&PrimitiveValue> {
    element.value().primitive()
}

/// Remove a sequence and return its items,
/// or no items if the attribute is absent or not a sequence.
fn take_items(data: &mut DataSet, tag: Tag) -> Vec<DataSet> {
    data.take(tag)
        .and_then(|e| e.into_value().into_items())
        .map(|items| items.into_vec())
        .unwrap_or_default()
}

/// Create an element holding a sequence of the given items.
pub fn sequence_element(tag: Tag, items: Vec<DataSet>) -> Element {
    DataElement::new(tag, VR::SQ, DataSetSequence::new(items, Length::UNDEFINED))
}

/// Create an element without a value.
/// Sequence attributes get a sequence without items.
pub fn empty_element(tag: Tag, vr: VR) -> Element {
    if vr == VR::SQ {
        sequence_element(tag, Vec::new())
    } else {
        DataElement::empty(tag, vr)
    }
}

fn compare_values(e1: &Element, e2: &Element) -> Ordering {
    match (e1.value(), e2.value()) {
        (Value::Primitive(p1), Value::Primitive(p2)) => p1
            .multiplicity()
            .cmp(&p2.multiplicity())
            .then_with(|| p1.to_str().cmp(&p2.to_str())),
        (Value::Sequence(s1), Value::Sequence(s2)) => {
            let (items1, items2) = (s1.items(), s2.items());
            items1.len().cmp(&items2.len()).then_with(|| {
                items1
                    .iter()
                    .zip(items2)
                    .map(|(a, b)| a.compare(b))
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            })
        }
        (Value::PixelSequence(f1), Value::PixelSequence(f2)) => {
            f1.fragments().cmp(f2.fragments())
        }
        (v1, v2) => value_kind(v1).cmp(&value_kind(v2)),
    }
}

fn value_kind(value: &Value<DataSet, InMemFragment>) -> u8 {
    match value {
        Value::Primitive(_) => 0,
        Value::Sequence(_) => 1,
        Value::PixelSequence(_) => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_dictionary_std::tags;

    #[test]
    fn insert_respects_overwrite() {
        let mut ds = DataSet::new_empty();
        assert!(ds.insert(DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from("A")), false));
        assert!(!ds.insert(DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from("B")), false));
        assert_eq!(ds.string(tags::PATIENT_ID).as_deref(), Some("A"));
        assert!(ds.insert(DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from("B")), true));
        assert_eq!(ds.string(tags::PATIENT_ID).as_deref(), Some("B"));
        assert!(ds.delete(tags::PATIENT_ID));
        assert!(!ds.delete(tags::PATIENT_ID));
    }

    #[test]
    fn strings_strip_padding_and_split() {
        let mut ds = DataSet::new_empty();
        ds.put_str(tags::IMAGE_TYPE, VR::CS, "ORIGINAL\\PRIMARY ");
        assert_eq!(ds.strings(tags::IMAGE_TYPE), vec!["ORIGINAL", "PRIMARY"]);
        assert_eq!(ds.string_at(tags::IMAGE_TYPE, 1).as_deref(), Some("PRIMARY"));
        assert_eq!(ds.string_at(tags::IMAGE_TYPE, 2), None);
        ds.put_str(tags::PATIENT_NAME, VR::PN, " ");
        assert!(ds.strings(tags::PATIENT_NAME).is_empty());
        assert_eq!(ds.len(), 2);
        ds.clear();
        assert!(DataSetExt::is_empty(&ds));
    }

    #[test]
    fn sequence_items_are_created_on_demand() {
        let mut ds = DataSet::new_empty();
        assert!(ds.find_sequence_item(tags::REFERENCED_SERIES_SEQUENCE, 0).is_none());
        ds.find_or_create_sequence_item(tags::REFERENCED_SERIES_SEQUENCE, ItemIndex::At(0), |item| {
            item.put_str(tags::SERIES_INSTANCE_UID, VR::UI, "1.2.3");
        });
        ds.find_or_create_sequence_item(tags::REFERENCED_SERIES_SEQUENCE, ItemIndex::Append, |item| {
            item.put_str(tags::SERIES_INSTANCE_UID, VR::UI, "1.2.4");
        });
        ds.find_or_create_sequence_item(tags::REFERENCED_SERIES_SEQUENCE, ItemIndex::At(0), |item| {
            item.put_str(tags::SERIES_DESCRIPTION, VR::LO, "first");
        });
        let items = ds.sequence_items(tags::REFERENCED_SERIES_SEQUENCE).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].string(tags::SERIES_DESCRIPTION).as_deref(), Some("first"));
        assert_eq!(items[1].string(tags::SERIES_INSTANCE_UID).as_deref(), Some("1.2.4"));

        assert!(ds.delete_sequence_item(tags::REFERENCED_SERIES_SEQUENCE, 0));
        assert!(!ds.delete_sequence_item(tags::REFERENCED_SERIES_SEQUENCE, 5));
        let changed = ds.find_sequence_item_mut(tags::REFERENCED_SERIES_SEQUENCE, 0, |item| {
            item.put_str(tags::SERIES_INSTANCE_UID, VR::UI, "1.2.5");
        });
        assert!(changed.is_some());
        assert!(ds
            .find_sequence_item_mut(tags::REFERENCED_SERIES_SEQUENCE, 1, |_| ())
            .is_none());
    }

    #[test]
    fn far_item_index_appends_a_single_item() {
        let mut ds = DataSet::new_empty();
        ds.find_or_create_sequence_item(
            tags::REFERENCED_SERIES_SEQUENCE,
            ItemIndex::At(usize::MAX),
            |item| {
                item.put_str(tags::SERIES_INSTANCE_UID, VR::UI, "1.2.3");
            },
        );
        let items = ds.sequence_items(tags::REFERENCED_SERIES_SEQUENCE).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].string(tags::SERIES_INSTANCE_UID).as_deref(), Some("1.2.3"));
    }

    #[test]
    fn compare_orders_by_content() {
        let mut a = DataSet::new_empty();
        let mut b = DataSet::new_empty();
        assert_eq!(a.compare(&b), Ordering::Equal);
        a.put_str(tags::PATIENT_ID, VR::LO, "1");
        assert_eq!(a.compare(&b), Ordering::Greater);
        assert_eq!(b.compare(&a), Ordering::Less);
        b.put_str(tags::PATIENT_ID, VR::LO, "2");
        assert_eq!(a.compare(&b), Ordering::Less);
        b.put_str(tags::PATIENT_ID, VR::LO, "1");
        assert_eq!(a.compare(&b), Ordering::Equal);

        let mut item = DataSet::new_empty();
        item.put_str(tags::CODE_VALUE, VR::SH, "121");
        a.put_sequence(tags::CONCEPT_NAME_CODE_SEQUENCE, vec![item.clone()]);
        b.put_sequence(tags::CONCEPT_NAME_CODE_SEQUENCE, vec![item]);
        assert_eq!(a.compare(&b), Ordering::Equal);
        b.put_sequence(tags::CONCEPT_NAME_CODE_SEQUENCE, vec![]);
        assert_eq!(a.compare(&b), Ordering::Greater);
    }
}
