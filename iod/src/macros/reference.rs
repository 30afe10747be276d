//! References to other composite instances:
//! the SOP Instance Reference Macro, its image flavour
//! and the Series and Instance Reference Macro.
use dicom_core::VR;
use dicom_dictionary_std::{tags, uids};
use snafu::ResultExt;
use tracing::{debug, warn};

use crate::component::{Component, IodComponent, SharedDataSet, SharedRules};
use crate::dataset::{DataSet, DataSetExt};
use crate::rules::Level;
use crate::rules::Requirement::{ConditionalMandatory, Mandatory};
use crate::util::{check_item_count, read_sub_sequence, write_sub_sequence};
use crate::{InvalidElementValueSnafu, Result, ValueViolation};

/// Referenced SOP Class UID and Referenced SOP Instance UID.
#[derive(Debug, Clone)]
pub struct SopInstanceReferenceMacro {
    component: Component,
}

impl SopInstanceReferenceMacro {
    pub const NAME: &'static str = "SOPInstanceReferenceMacro";

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    /// Create a macro viewing the given data set and rules.
    pub fn new_shared(data: SharedDataSet, rules: SharedRules) -> Self {
        Self::from_component(Component::new_shared(Self::NAME, data, rules))
    }

    /// Create a reference to the given instance.
    pub fn with_reference(sop_class_uid: &str, sop_instance_uid: &str) -> Result<Self> {
        let reference = Self::new();
        reference.set_referenced_sop_class_uid(sop_class_uid, true)?;
        reference.set_referenced_sop_instance_uid(sop_instance_uid, true)?;
        Ok(reference)
    }

    fn from_component(component: Component) -> Self {
        let mut reference = SopInstanceReferenceMacro { component };
        reference.reset_rules();
        reference
    }

    pub fn referenced_sop_class_uid(&self) -> Option<String> {
        self.component.string(tags::REFERENCED_SOP_CLASS_UID)
    }

    pub fn referenced_sop_instance_uid(&self) -> Option<String> {
        self.component.string(tags::REFERENCED_SOP_INSTANCE_UID)
    }

    pub fn set_referenced_sop_class_uid(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::REFERENCED_SOP_CLASS_UID, value, check)
    }

    pub fn set_referenced_sop_instance_uid(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::REFERENCED_SOP_INSTANCE_UID, value, check)
    }
}

impl Default for SopInstanceReferenceMacro {
    fn default() -> Self {
        Self::new()
    }
}

impl IodComponent for SopInstanceReferenceMacro {
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
                (tags::REFERENCED_SOP_CLASS_UID, VR::UI, "1", Mandatory),
                (tags::REFERENCED_SOP_INSTANCE_UID, VR::UI, "1", Mandatory),
            ],
        );
    }
}

/// A SOP instance reference which may point to
/// individual frames or segments of the referenced image.
///
/// The frame and segment numbers live in the same data set
/// as the SOP instance reference.
#[derive(Debug)]
pub struct ImageSopInstanceReferenceMacro {
    component: Component,
    reference: SopInstanceReferenceMacro,
}

impl ImageSopInstanceReferenceMacro {
    pub const NAME: &'static str = "ImageSOPInstanceReferenceMacro";

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    /// Create a macro viewing the given data set and rules.
    pub fn new_shared(data: SharedDataSet, rules: SharedRules) -> Self {
        Self::from_component(Component::new_shared(Self::NAME, data, rules))
    }

    fn from_component(component: Component) -> Self {
        let reference =
            SopInstanceReferenceMacro::new_shared(component.shared_data(), component.shared_rules());
        let mut macro_ = ImageSopInstanceReferenceMacro {
            component,
            reference,
        };
        macro_.reset_rules();
        macro_
    }

    /// Create a reference to the given instance.
    ///
    /// Non-empty `frames_or_segments` become Referenced Segment Numbers
    /// if the referenced instance is a segmentation,
    /// and Referenced Frame Numbers otherwise.
    pub fn create(
        sop_class_uid: &str,
        sop_instance_uid: &str,
        frames_or_segments: &[u16],
    ) -> Result<Self> {
        let macro_ = Self::new();
        macro_
            .reference
            .set_referenced_sop_class_uid(sop_class_uid, true)?;
        macro_
            .reference
            .set_referenced_sop_instance_uid(sop_instance_uid, true)?;
        if !frames_or_segments.is_empty() {
            if sop_class_uid == uids::SEGMENTATION_STORAGE {
                macro_.set_referenced_segment_numbers(frames_or_segments, true)?;
            } else {
                macro_.set_referenced_frame_numbers(frames_or_segments, true)?;
            }
        }
        Ok(macro_)
    }

    /// The embedded SOP Instance Reference Macro.
    pub fn reference(&self) -> &SopInstanceReferenceMacro {
        &self.reference
    }

    /// The referenced frame numbers, empty if there are none.
    pub fn referenced_frame_numbers(&self) -> Result<Vec<u16>> {
        let values = self
            .component
            .data()
            .int32_values(tags::REFERENCED_FRAME_NUMBER)
            .unwrap_or_default();
        values
            .into_iter()
            .map(|n| {
                u16::try_from(n).map_err(|_| {
                    warn!(
                        "Invalid Referenced Frame Number in Image SOP Instance Reference Macro: {}",
                        n
                    );
                    ValueViolation::RepresentationViolated
                })
                .context(InvalidElementValueSnafu {
                    tag: tags::REFERENCED_FRAME_NUMBER,
                })
            })
            .collect()
    }

    /// The referenced segment numbers, empty if there are none.
    pub fn referenced_segment_numbers(&self) -> Vec<u16> {
        self.component
            .data()
            .uint16_values(tags::REFERENCED_SEGMENT_NUMBER)
            .unwrap_or_default()
    }

    pub fn set_referenced_frame_numbers(&self, values: &[u16], check: bool) -> Result<()> {
        let text: Vec<String> = values.iter().map(u16::to_string).collect();
        self.component
            .set_strings(tags::REFERENCED_FRAME_NUMBER, &text, check)
    }

    pub fn add_referenced_frame_number(&self, value: u16) -> Result<()> {
        let mut values = self.referenced_frame_numbers()?;
        values.push(value);
        self.set_referenced_frame_numbers(&values, false)
    }

    pub fn set_referenced_segment_numbers(&self, values: &[u16], check: bool) -> Result<()> {
        self.component
            .set_uint16s(tags::REFERENCED_SEGMENT_NUMBER, values, check)
    }

    pub fn add_referenced_segment_number(&self, value: u16) -> Result<()> {
        let mut values = self.referenced_segment_numbers();
        values.push(value);
        self.set_referenced_segment_numbers(&values, false)
    }
}

impl Default for ImageSopInstanceReferenceMacro {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ImageSopInstanceReferenceMacro {
    fn clone(&self) -> Self {
        Self::from_component(self.component.clone())
    }
}

impl IodComponent for ImageSopInstanceReferenceMacro {
    fn component(&self) -> &Component {
        &self.component
    }

    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }

    fn reset_rules(&mut self) {
        self.reference.reset_rules();
        self.component.declare_rules(
            Level::Unspecified,
            &[
                (tags::REFERENCED_FRAME_NUMBER, VR::IS, "1-n", ConditionalMandatory),
                (tags::REFERENCED_SEGMENT_NUMBER, VR::US, "1-n", ConditionalMandatory),
            ],
        );
    }

    fn read(&mut self, source: &DataSet, clear_old: bool) -> Result<()> {
        if clear_old {
            self.clear_data();
        }
        self.reference.read(source, false)?;
        self.component.read(source, false)
    }

    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        let own = self.component.write(destination);
        let reference = self.reference.write(destination);
        own.and(reference)
    }

    fn check(&self, quiet: bool) -> Result<()> {
        self.reference
            .check(quiet)
            .and_then(|_| self.component.check(quiet))
    }

    fn clear_data(&mut self) {
        self.reference.clear_data();
        self.component.clear_data();
    }

    fn make_optional(&mut self) {
        self.reference.make_optional();
        self.component.make_optional();
    }

    fn set_value_check_on_write(&mut self, check: bool) {
        self.reference.set_value_check_on_write(check);
        self.component.set_value_check_on_write(check);
    }
}

/// An item of the Referenced Series Sequence:
/// one series and the instances referenced within it.
#[derive(Debug, Clone)]
pub struct ReferencedSeriesItem {
    component: Component,
    instances: Vec<SopInstanceReferenceMacro>,
}

impl ReferencedSeriesItem {
    pub const NAME: &'static str = "ReferencedSeriesSequence";

    pub fn new() -> Self {
        let mut item = ReferencedSeriesItem {
            component: Component::new(Self::NAME),
            instances: Vec::new(),
        };
        item.reset_rules();
        item
    }

    pub fn series_instance_uid(&self) -> Option<String> {
        self.component.string(tags::SERIES_INSTANCE_UID)
    }

    pub fn set_series_instance_uid(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::SERIES_INSTANCE_UID, value, check)
    }

    pub fn referenced_instances(&self) -> &[SopInstanceReferenceMacro] {
        &self.instances
    }

    pub fn referenced_instances_mut(&mut self) -> &mut Vec<SopInstanceReferenceMacro> {
        &mut self.instances
    }

    /// Add a reference to an instance of this series.
    ///
    /// An instance which is already referenced is not added again.
    pub fn add_reference(&mut self, sop_class_uid: &str, sop_instance_uid: &str) -> Result<()> {
        let known = self
            .instances
            .iter()
            .any(|i| i.referenced_sop_instance_uid().as_deref() == Some(sop_instance_uid));
        if known {
            debug!("Skipping doubled instance reference when adding to Series and Instance Reference Macro");
            return Ok(());
        }
        let mut reference =
            SopInstanceReferenceMacro::with_reference(sop_class_uid, sop_instance_uid)?;
        reference.component_mut().set_parent(Some(&self.component));
        self.instances.push(reference);
        Ok(())
    }
}

impl Default for ReferencedSeriesItem {
    fn default() -> Self {
        Self::new()
    }
}

impl IodComponent for ReferencedSeriesItem {
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
                (tags::SERIES_INSTANCE_UID, VR::UI, "1", Mandatory),
                (tags::REFERENCED_INSTANCE_SEQUENCE, VR::SQ, "1-n", Mandatory),
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
            tags::REFERENCED_INSTANCE_SEQUENCE,
            &mut self.instances,
            &self.component,
        )
    }

    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        let own = self.component.write(destination);
        let instances = write_sub_sequence(
            tags::REFERENCED_INSTANCE_SEQUENCE,
            &mut self.instances,
            &self.component,
            destination,
        );
        own.and(instances)
    }

    fn check(&self, quiet: bool) -> Result<()> {
        self.component.check(quiet)?;
        for instance in &self.instances {
            instance.check(quiet)?;
        }
        match self.component.rule(tags::REFERENCED_INSTANCE_SEQUENCE) {
            Some(rule) => check_item_count(&rule, self.instances.len()),
            None => Ok(()),
        }
    }

    fn clear_data(&mut self) {
        self.component.clear_data();
        self.instances.clear();
    }
}

/// The Referenced Series Sequence with the instances referenced per series.
#[derive(Debug, Clone)]
pub struct SeriesAndInstanceReferenceMacro {
    component: Component,
    series: Vec<ReferencedSeriesItem>,
}

impl SeriesAndInstanceReferenceMacro {
    pub const NAME: &'static str = "SeriesAndInstanceReferenceMacro";

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    /// Create a macro viewing the given data set and rules.
    pub fn new_shared(data: SharedDataSet, rules: SharedRules) -> Self {
        Self::from_component(Component::new_shared(Self::NAME, data, rules))
    }

    fn from_component(component: Component) -> Self {
        let mut macro_ = SeriesAndInstanceReferenceMacro {
            component,
            series: Vec::new(),
        };
        macro_.reset_rules();
        macro_
    }

    pub fn referenced_series(&self) -> &[ReferencedSeriesItem] {
        &self.series
    }

    pub fn referenced_series_mut(&mut self) -> &mut Vec<ReferencedSeriesItem> {
        &mut self.series
    }

    /// Reference an instance of the given series,
    /// adding a new series item if the series is not referenced yet.
    pub fn add_reference(
        &mut self,
        series_instance_uid: &str,
        sop_class_uid: &str,
        sop_instance_uid: &str,
    ) -> Result<()> {
        add_series_reference(
            &mut self.series,
            &self.component,
            series_instance_uid,
            sop_class_uid,
            sop_instance_uid,
        )
    }
}

/// Reference an instance within the items of a Referenced Series Sequence,
/// adding a new item (linked to `parent`) if the series is not referenced yet.
pub(crate) fn add_series_reference(
    series: &mut Vec<ReferencedSeriesItem>,
    parent: &Component,
    series_instance_uid: &str,
    sop_class_uid: &str,
    sop_instance_uid: &str,
) -> Result<()> {
    let position = series
        .iter()
        .position(|s| s.series_instance_uid().as_deref() == Some(series_instance_uid));
    if let Some(index) = position {
        return series[index].add_reference(sop_class_uid, sop_instance_uid);
    }
    let mut item = ReferencedSeriesItem::new();
    item.set_series_instance_uid(series_instance_uid, true)?;
    item.add_reference(sop_class_uid, sop_instance_uid)?;
    item.component_mut().set_parent(Some(parent));
    series.push(item);
    Ok(())
}

impl Default for SeriesAndInstanceReferenceMacro {
    fn default() -> Self {
        Self::new()
    }
}

impl IodComponent for SeriesAndInstanceReferenceMacro {
    fn component(&self) -> &Component {
        &self.component
    }

    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }

    fn reset_rules(&mut self) {
        self.component.declare_rules(
            Level::Instance,
            &[(tags::REFERENCED_SERIES_SEQUENCE, VR::SQ, "1-n", Mandatory)],
        );
    }

    fn read(&mut self, source: &DataSet, clear_old: bool) -> Result<()> {
        if clear_old {
            self.clear_data();
        }
        read_sub_sequence(
            source,
            tags::REFERENCED_SERIES_SEQUENCE,
            &mut self.series,
            &self.component,
        )
    }

    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        write_sub_sequence(
            tags::REFERENCED_SERIES_SEQUENCE,
            &mut self.series,
            &self.component,
            destination,
        )
    }

    fn check(&self, quiet: bool) -> Result<()> {
        for series in &self.series {
            series.check(quiet)?;
        }
        match self.component.rule(tags::REFERENCED_SERIES_SEQUENCE) {
            Some(rule) => check_item_count(&rule, self.series.len()),
            None => Ok(()),
        }
    }

    fn clear_data(&mut self) {
        self.component.clear_data();
        self.series.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    const CT_IMAGE: &str = "1.2.840.10008.5.1.4.1.1.2";

    #[test]
    fn image_reference_shares_its_data_set() {
        let image = ImageSopInstanceReferenceMacro::create(CT_IMAGE, "1.2.3.4", &[1, 3]).unwrap();
        assert!(image.reference().component().shares_data_with(image.component()));
        assert_eq!(image.reference().referenced_sop_instance_uid().as_deref(), Some("1.2.3.4"));
        assert_eq!(image.referenced_frame_numbers(), Ok(vec![1, 3]));
        assert!(image.referenced_segment_numbers().is_empty());

        let mut item = DataSet::new_empty();
        let mut image = image;
        image.write(&mut item).unwrap();
        assert_eq!(item.len(), 3);

        let mut read = ImageSopInstanceReferenceMacro::new();
        read.read(&item, true).unwrap();
        assert_eq!(read.referenced_frame_numbers(), Ok(vec![1, 3]));
        assert_eq!(read.reference().referenced_sop_class_uid().as_deref(), Some(CT_IMAGE));
    }

    #[test]
    fn segmentation_references_point_to_segments() {
        let seg = ImageSopInstanceReferenceMacro::create(uids::SEGMENTATION_STORAGE, "1.2.3.5", &[2])
            .unwrap();
        assert_eq!(seg.referenced_segment_numbers(), vec![2]);
        assert_eq!(seg.referenced_frame_numbers(), Ok(vec![]));
        seg.add_referenced_segment_number(4).unwrap();
        assert_eq!(seg.referenced_segment_numbers(), vec![2, 4]);
    }

    #[test]
    fn negative_frame_numbers_are_rejected() {
        let image = ImageSopInstanceReferenceMacro::new();
        image
            .component()
            .set_string(tags::REFERENCED_FRAME_NUMBER, "-1", false)
            .unwrap();
        assert!(matches!(
            image.referenced_frame_numbers(),
            Err(Error::InvalidElementValue { .. })
        ));
    }

    #[test]
    fn clones_keep_data_shared_with_the_embedded_reference() {
        let image = ImageSopInstanceReferenceMacro::create(CT_IMAGE, "1.2.3.4", &[]).unwrap();
        let copy = image.clone();
        assert!(!copy.component().shares_data_with(image.component()));
        assert!(copy.reference().component().shares_data_with(copy.component()));
        assert_eq!(copy.reference().referenced_sop_instance_uid().as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn doubled_instance_references_are_skipped() {
        let mut refs = SeriesAndInstanceReferenceMacro::new();
        assert!(refs.check(true).is_err());
        refs.add_reference("1.2.3", CT_IMAGE, "1.2.3.1").unwrap();
        refs.add_reference("1.2.3", CT_IMAGE, "1.2.3.1").unwrap();
        refs.add_reference("1.2.3", CT_IMAGE, "1.2.3.2").unwrap();
        refs.add_reference("1.2.4", CT_IMAGE, "1.2.4.1").unwrap();
        assert!(matches!(
            refs.add_reference("1.2.5", CT_IMAGE, "not a uid"),
            Err(Error::InvalidElementValue { .. })
        ));

        let series = refs.referenced_series();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].referenced_instances().len(), 2);
        assert_eq!(series[1].referenced_instances().len(), 1);
        assert!(series[0].referenced_instances()[0].component().parent().is_some());
    }

    #[test]
    fn series_references_round_trip() {
        let mut refs = SeriesAndInstanceReferenceMacro::new();
        refs.add_reference("1.2.3", CT_IMAGE, "1.2.3.1").unwrap();
        refs.add_reference("1.2.3", CT_IMAGE, "1.2.3.2").unwrap();

        let mut out = DataSet::new_empty();
        refs.write(&mut out).unwrap();
        let series = out.sequence_items(tags::REFERENCED_SERIES_SEQUENCE).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(
            series[0]
                .sequence_items(tags::REFERENCED_INSTANCE_SEQUENCE)
                .map(|i| i.len()),
            Some(2)
        );

        let mut read = SeriesAndInstanceReferenceMacro::new();
        read.read(&out, true).unwrap();
        assert_eq!(read.check(true), Ok(()));
        assert_eq!(
            read.referenced_series()[0].series_instance_uid().as_deref(),
            Some("1.2.3")
        );
    }
}
