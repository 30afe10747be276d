//! The Multi-frame Functional Groups Module.
//!
//! Functional groups are sequences describing frames,
//! either for all frames at once (in the single item of the
//! Shared Functional Groups Sequence)
//! or per frame (one item of the Per-frame Functional Groups Sequence
//! per frame).
//! Both sequences are kept as they are in the module's data set,
//! so that other modules viewing the same data set
//! (e.g. the Multi-frame Dimension Module) can inspect them.
use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;
use tracing::debug;

use crate::component::{Component, IodComponent, SharedDataSet, SharedRules};
use crate::dataset::{DataSet, DataSetExt, ItemIndex};
use crate::rules::Level;
use crate::rules::Requirement::{
    ConditionalMandatory, Mandatory, MandatoryCanBeEmpty, Optional,
};
use crate::util::{current_date, current_time, limit_max_frames};
use crate::Result;

/// The Multi-frame Functional Groups Module.
#[derive(Debug, Clone)]
pub struct FunctionalGroupsModule {
    component: Component,
}

impl FunctionalGroupsModule {
    pub const NAME: &'static str = "MultiframeFunctionalGroupsModule";

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    pub fn new_shared(data: SharedDataSet, rules: SharedRules) -> Self {
        Self::from_component(Component::new_shared(Self::NAME, data, rules))
    }

    fn from_component(component: Component) -> Self {
        let mut module = FunctionalGroupsModule { component };
        module.reset_rules();
        module
    }

    string_accessors! {
        CONTENT_DATE => content_date, set_content_date;
        CONTENT_TIME => content_time, set_content_time;
        CONCATENATION_UID => concatenation_uid, set_concatenation_uid;
        SOP_INSTANCE_UID_OF_CONCATENATION_SOURCE => concatenation_source_uid, set_concatenation_source_uid;
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

    /// The declared number of frames.
    /// It is updated from the per-frame functional groups on write.
    pub fn number_of_frames(&self) -> Option<i32> {
        self.component
            .data()
            .int32_values(tags::NUMBER_OF_FRAMES)
            .and_then(|v| v.first().copied())
    }

    pub fn representative_frame_number(&self) -> Option<u16> {
        self.component.uint16(tags::REPRESENTATIVE_FRAME_NUMBER, 0).ok()
    }

    pub fn set_representative_frame_number(&self, frame: u16, check: bool) -> Result<()> {
        self.component
            .set_uint16s(tags::REPRESENTATIVE_FRAME_NUMBER, &[frame], check)
    }

    pub fn concatenation_frame_offset_number(&self) -> Option<u32> {
        self.component
            .data()
            .uint32_values(tags::CONCATENATION_FRAME_OFFSET_NUMBER)
            .and_then(|v| v.first().copied())
    }

    pub fn set_concatenation_frame_offset_number(&self, offset: u32, check: bool) -> Result<()> {
        self.component
            .set_uint32s(tags::CONCATENATION_FRAME_OFFSET_NUMBER, &[offset], check)
    }

    pub fn in_concatenation_number(&self) -> Option<u16> {
        self.component.uint16(tags::IN_CONCATENATION_NUMBER, 0).ok()
    }

    pub fn set_in_concatenation_number(&self, number: u16, check: bool) -> Result<()> {
        self.component
            .set_uint16s(tags::IN_CONCATENATION_NUMBER, &[number], check)
    }

    pub fn in_concatenation_total_number(&self) -> Option<u16> {
        self.component
            .uint16(tags::IN_CONCATENATION_TOTAL_NUMBER, 0)
            .ok()
    }

    pub fn set_in_concatenation_total_number(&self, total: u16, check: bool) -> Result<()> {
        self.component
            .set_uint16s(tags::IN_CONCATENATION_TOTAL_NUMBER, &[total], check)
    }

    /// Use the current date and time as content date and time.
    pub fn set_content_date_time_now(&self) -> Result<()> {
        self.set_content_date(&current_date(), true)?;
        self.set_content_time(&current_time(), true)
    }

    /// The number of frames described by per-frame functional groups.
    pub fn frame_count(&self) -> usize {
        self.component
            .data()
            .sequence_items(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE)
            .map_or(0, |items| items.len())
    }

    /// The item of the Shared Functional Groups Sequence, if any.
    pub fn shared_functional_groups(&self) -> Option<DataSet> {
        self.component
            .data()
            .find_sequence_item(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE, 0)
            .cloned()
    }

    /// The per-frame functional groups of a frame (counting from 0).
    pub fn per_frame_functional_groups(&self, frame: usize) -> Option<DataSet> {
        self.component
            .data()
            .find_sequence_item(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE, frame)
            .cloned()
    }

    /// Set a functional group shared by all frames,
    /// replacing any previous group of the same kind.
    pub fn set_shared_functional_group(&self, group_tag: Tag, group: DataSet) {
        self.component.data_mut().find_or_create_sequence_item(
            tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE,
            ItemIndex::At(0),
            |shared| shared.put_sequence(group_tag, vec![group]),
        );
    }

    /// Set a functional group of one frame,
    /// creating the per-frame items up to that frame if necessary.
    pub fn set_per_frame_functional_group(&self, frame: usize, group_tag: Tag, group: DataSet) {
        self.component.data_mut().find_or_create_sequence_item(
            tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE,
            ItemIndex::At(frame),
            |item| item.put_sequence(group_tag, vec![group]),
        );
    }

    /// Append a frame with the given per-frame functional groups,
    /// returning the new frame's index.
    pub fn add_frame(&self, groups: DataSet) -> usize {
        self.component.data_mut().find_or_create_sequence_item(
            tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE,
            ItemIndex::Append,
            |item| {
                *item = groups;
            },
        );
        self.frame_count() - 1
    }

    /// The functional group of the given kind describing a frame:
    /// the frame's own group if there is one, the shared group otherwise.
    pub fn functional_group(&self, frame: usize, group_tag: Tag) -> Option<DataSet> {
        let data = self.component.data();
        data.find_sequence_item(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE, frame)
            .and_then(|item| item.find_sequence_item(group_tag, 0))
            .or_else(|| {
                data.find_sequence_item(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE, 0)
                    .and_then(|shared| shared.find_sequence_item(group_tag, 0))
            })
            .cloned()
    }

    /// Whether the functional group of the given kind is shared by all frames.
    pub fn is_shared(&self, group_tag: Tag) -> bool {
        self.component
            .data()
            .find_sequence_item(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE, 0)
            .map_or(false, |shared| shared.contains(group_tag))
    }
}

impl Default for FunctionalGroupsModule {
    fn default() -> Self {
        Self::new()
    }
}

impl IodComponent for FunctionalGroupsModule {
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
                (tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE, VR::SQ, "1", MandatoryCanBeEmpty),
                (tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE, VR::SQ, "1-n", Mandatory),
                (tags::INSTANCE_NUMBER, VR::IS, "1", Mandatory),
                (tags::CONTENT_DATE, VR::DA, "1", Mandatory),
                (tags::CONTENT_TIME, VR::TM, "1", Mandatory),
                (tags::NUMBER_OF_FRAMES, VR::IS, "1", Mandatory),
                (tags::CONCATENATION_FRAME_OFFSET_NUMBER, VR::UL, "1", ConditionalMandatory),
                (tags::REPRESENTATIVE_FRAME_NUMBER, VR::US, "1", Optional),
                (tags::CONCATENATION_UID, VR::UI, "1", ConditionalMandatory),
                (tags::SOP_INSTANCE_UID_OF_CONCATENATION_SOURCE, VR::UI, "1", ConditionalMandatory),
                (tags::IN_CONCATENATION_NUMBER, VR::US, "1", ConditionalMandatory),
                (tags::IN_CONCATENATION_TOTAL_NUMBER, VR::US, "1", Optional),
            ],
        );
    }

    /// Read the module's attributes,
    /// taking over both functional group sequences unchanged.
    fn read(&mut self, source: &DataSet, clear_old: bool) -> Result<()> {
        self.component.read(source, clear_old)?;
        if self.component.is_own_data(source) {
            return Ok(());
        }
        let mut data = self.component.data_mut();
        for tag in [
            tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE,
            tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE,
        ] {
            if let Some(sequence) = source.find(tag) {
                data.put(sequence.clone());
            }
        }
        Ok(())
    }

    /// Write the module's attributes.
    ///
    /// The number of frames is set from the per-frame functional groups,
    /// and missing content date and time are set to the current time.
    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        let has_shared = self
            .component
            .data()
            .contains(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE);
        if !has_shared {
            self.component
                .data_mut()
                .put_empty(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE, VR::SQ);
        }
        let frames = self.frame_count();
        if frames > 0 {
            let frames = limit_max_frames(
                frames,
                "Number of frames exceeds the maximum, Number of Frames is limited",
            );
            self.component
                .set_int_string(tags::NUMBER_OF_FRAMES, i64::from(frames), false)?;
        }
        if self.content_date().is_none() && self.content_time().is_none() {
            debug!("Setting missing content date and time to now");
            self.set_content_date_time_now()?;
        }
        let written = self.component.write(destination);
        if frames == 0 {
            // absent sequences are not reported by the generic write
            let missing = self
                .component
                .rule(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE)
                .map_or(Ok(()), |rule| rule.validate(None));
            return written.and(missing);
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn frame_content(stack_position: u32) -> DataSet {
        let mut group = DataSet::new_empty();
        group.put_u32s(tags::IN_STACK_POSITION_NUMBER, VR::UL, &[stack_position]);
        group
    }

    fn pixel_measures() -> DataSet {
        let mut group = DataSet::new_empty();
        group.put_strs(
            tags::PIXEL_SPACING,
            VR::DS,
            &["0.5".to_string(), "0.5".to_string()],
        );
        group
    }

    #[test]
    fn per_frame_groups_override_shared_ones() {
        let fg = FunctionalGroupsModule::new();
        fg.set_shared_functional_group(tags::PIXEL_MEASURES_SEQUENCE, pixel_measures());
        fg.set_per_frame_functional_group(1, tags::FRAME_CONTENT_SEQUENCE, frame_content(2));
        assert_eq!(fg.frame_count(), 2);
        assert!(fg.is_shared(tags::PIXEL_MEASURES_SEQUENCE));
        assert!(!fg.is_shared(tags::FRAME_CONTENT_SEQUENCE));

        assert!(fg.functional_group(0, tags::FRAME_CONTENT_SEQUENCE).is_none());
        let content = fg.functional_group(1, tags::FRAME_CONTENT_SEQUENCE).unwrap();
        assert_eq!(
            content.uint32_values(tags::IN_STACK_POSITION_NUMBER),
            Some(vec![2])
        );
        assert_eq!(
            fg.functional_group(0, tags::PIXEL_MEASURES_SEQUENCE),
            Some(pixel_measures())
        );
    }

    #[test]
    fn write_counts_frames() {
        let mut fg = FunctionalGroupsModule::new();
        let mut out = DataSet::new_empty();
        assert!(matches!(
            fg.write(&mut out),
            Err(Error::MissingAttribute { .. })
        ));

        fg.set_instance_number(1, true).unwrap();
        for position in 1..=3 {
            let mut frame = DataSet::new_empty();
            frame.put_sequence(tags::FRAME_CONTENT_SEQUENCE, vec![frame_content(position)]);
            assert_eq!(fg.add_frame(frame), position as usize - 1);
        }
        let mut out = DataSet::new_empty();
        fg.write(&mut out).unwrap();
        assert_eq!(out.string(tags::NUMBER_OF_FRAMES).as_deref(), Some("3"));
        assert!(out.contains(tags::CONTENT_DATE));
        // shared groups are type 2
        assert_eq!(
            out.sequence_items(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE).map(|i| i.len()),
            Some(0)
        );

        let mut read = FunctionalGroupsModule::new();
        read.read(&out, true).unwrap();
        assert_eq!(read.frame_count(), 3);
        assert_eq!(read.number_of_frames(), Some(3));
    }

    #[test]
    fn concatenation_attributes() {
        let fg = FunctionalGroupsModule::new();
        fg.set_concatenation_uid("1.2.3.4", true).unwrap();
        fg.set_in_concatenation_number(2, true).unwrap();
        fg.set_in_concatenation_total_number(4, true).unwrap();
        fg.set_concatenation_frame_offset_number(100, true).unwrap();
        assert_eq!(fg.concatenation_frame_offset_number(), Some(100));
        assert_eq!(fg.in_concatenation_number(), Some(2));
        assert_eq!(fg.in_concatenation_total_number(), Some(4));
    }
}
