//! The Common Instance Reference Module:
//! references to instances of the same study
//! and of other studies.
use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;
use snafu::OptionExt;
use tracing::debug;

use crate::component::{Component, IodComponent, SharedDataSet, SharedRules};
use crate::dataset::{DataSet, DataSetExt};
use crate::macros::reference::add_series_reference;
use crate::macros::{ReferencedSeriesItem, SeriesAndInstanceReferenceMacro};
use crate::rules::Level;
use crate::rules::Requirement::{ConditionalMandatory, Mandatory};
use crate::util::{check_item_count, read_sub_sequence, write_sub_sequence};
use crate::{Result, ValueNotFoundSnafu};

/// An item of the Studies Containing Other Referenced Instances Sequence:
/// a study and the series and instances referenced within it.
#[derive(Debug)]
pub struct StudyReferenceItem {
    component: Component,
    series: SeriesAndInstanceReferenceMacro,
}

impl StudyReferenceItem {
    pub const NAME: &'static str = "StudiesContainingOtherReferencedInstancesSequence";

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    fn from_component(component: Component) -> Self {
        let series = SeriesAndInstanceReferenceMacro::new_shared(
            component.shared_data(),
            component.shared_rules(),
        );
        let mut item = StudyReferenceItem { component, series };
        item.reset_rules();
        item
    }

    pub fn study_instance_uid(&self) -> Option<String> {
        self.component.string(tags::STUDY_INSTANCE_UID)
    }

    pub fn set_study_instance_uid(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::STUDY_INSTANCE_UID, value, check)
    }

    pub fn series(&self) -> &SeriesAndInstanceReferenceMacro {
        &self.series
    }

    pub fn series_mut(&mut self) -> &mut SeriesAndInstanceReferenceMacro {
        &mut self.series
    }
}

impl Default for StudyReferenceItem {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for StudyReferenceItem {
    fn clone(&self) -> Self {
        let mut item = Self::from_component(self.component.clone());
        let mut series = self.series.referenced_series().to_vec();
        for s in &mut series {
            s.component_mut().set_parent(Some(item.series.component()));
        }
        *item.series.referenced_series_mut() = series;
        item
    }
}

impl IodComponent for StudyReferenceItem {
    fn component(&self) -> &Component {
        &self.component
    }

    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }

    fn reset_rules(&mut self) {
        self.component.declare_rules(
            Level::Study,
            &[(tags::STUDY_INSTANCE_UID, VR::UI, "1", Mandatory)],
        );
        self.series.reset_rules();
    }

    fn read(&mut self, source: &DataSet, clear_old: bool) -> Result<()> {
        if clear_old {
            self.clear_data();
        }
        self.component.read(source, false)?;
        self.series.read(source, false)
    }

    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        let own = self.component.write(destination);
        let series = self.series.write(destination);
        own.and(series)
    }

    fn check(&self, quiet: bool) -> Result<()> {
        self.component.check(quiet)?;
        self.series.check(quiet)
    }

    fn clear_data(&mut self) {
        self.component.clear_data();
        self.series.clear_data();
    }

    fn set_value_check_on_write(&mut self, check: bool) {
        self.component.set_value_check_on_write(check);
        self.series.set_value_check_on_write(check);
    }
}

/// The Common Instance Reference Module.
#[derive(Debug, Clone)]
pub struct CommonInstanceReferenceModule {
    component: Component,
    series: Vec<ReferencedSeriesItem>,
    other_studies: Vec<StudyReferenceItem>,
}

impl CommonInstanceReferenceModule {
    pub const NAME: &'static str = "CommonInstanceReferenceModule";

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    /// Create the module viewing the given data set and rules.
    ///
    /// References to the study found in that data set
    /// are recorded as references within the same study.
    pub fn new_shared(data: SharedDataSet, rules: SharedRules) -> Self {
        Self::from_component(Component::new_shared(Self::NAME, data, rules))
    }

    fn from_component(component: Component) -> Self {
        let mut module = CommonInstanceReferenceModule {
            component,
            series: Vec::new(),
            other_studies: Vec::new(),
        };
        module.reset_rules();
        module
    }

    /// Referenced series of the same study.
    pub fn referenced_series(&self) -> &[ReferencedSeriesItem] {
        &self.series
    }

    pub fn referenced_series_mut(&mut self) -> &mut Vec<ReferencedSeriesItem> {
        &mut self.series
    }

    /// Referenced studies other than this instance's study.
    pub fn other_studies(&self) -> &[StudyReferenceItem] {
        &self.other_studies
    }

    pub fn other_studies_mut(&mut self) -> &mut Vec<StudyReferenceItem> {
        &mut self.other_studies
    }

    /// Reference an instance.
    ///
    /// An empty study UID, or the UID of this instance's own study,
    /// refers to the same study.
    pub fn add_reference(
        &mut self,
        study_instance_uid: &str,
        series_instance_uid: &str,
        sop_class_uid: &str,
        sop_instance_uid: &str,
    ) -> Result<()> {
        let own_study = self.component.string(tags::STUDY_INSTANCE_UID);
        if study_instance_uid.is_empty() || own_study.as_deref() == Some(study_instance_uid) {
            return add_series_reference(
                &mut self.series,
                &self.component,
                series_instance_uid,
                sop_class_uid,
                sop_instance_uid,
            );
        }

        let position = self
            .other_studies
            .iter()
            .position(|s| s.study_instance_uid().as_deref() == Some(study_instance_uid));
        if let Some(index) = position {
            return self.other_studies[index].series_mut().add_reference(
                series_instance_uid,
                sop_class_uid,
                sop_instance_uid,
            );
        }
        debug!("Adding reference to other study {}", study_instance_uid);
        let mut study = StudyReferenceItem::new();
        study.set_study_instance_uid(study_instance_uid, true)?;
        study
            .series_mut()
            .add_reference(series_instance_uid, sop_class_uid, sop_instance_uid)?;
        study.component_mut().set_parent(Some(&self.component));
        self.other_studies.push(study);
        Ok(())
    }

    /// Reference the instance held by `instance`,
    /// which must provide its study, series, SOP class and SOP instance UIDs.
    pub fn add_reference_to(&mut self, instance: &DataSet) -> Result<()> {
        let get = |tag: Tag| instance.string(tag).context(ValueNotFoundSnafu { tag });
        let study = get(tags::STUDY_INSTANCE_UID)?;
        let series = get(tags::SERIES_INSTANCE_UID)?;
        let class = get(tags::SOP_CLASS_UID)?;
        let sop_instance = get(tags::SOP_INSTANCE_UID)?;
        self.add_reference(&study, &series, &class, &sop_instance)
    }
}

impl Default for CommonInstanceReferenceModule {
    fn default() -> Self {
        Self::new()
    }
}

impl IodComponent for CommonInstanceReferenceModule {
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
                (tags::REFERENCED_SERIES_SEQUENCE, VR::SQ, "1-n", ConditionalMandatory),
                (
                    tags::STUDIES_CONTAINING_OTHER_REFERENCED_INSTANCES_SEQUENCE,
                    VR::SQ,
                    "1-n",
                    ConditionalMandatory,
                ),
            ],
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
        )?;
        read_sub_sequence(
            source,
            tags::STUDIES_CONTAINING_OTHER_REFERENCED_INSTANCES_SEQUENCE,
            &mut self.other_studies,
            &self.component,
        )?;
        self.component.read(source, false)
    }

    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        let series = write_sub_sequence(
            tags::REFERENCED_SERIES_SEQUENCE,
            &mut self.series,
            &self.component,
            destination,
        );
        let studies = write_sub_sequence(
            tags::STUDIES_CONTAINING_OTHER_REFERENCED_INSTANCES_SEQUENCE,
            &mut self.other_studies,
            &self.component,
            destination,
        );
        let own = self.component.write(destination);
        series.and(studies).and(own)
    }

    fn check(&self, quiet: bool) -> Result<()> {
        for series in &self.series {
            series.check(quiet)?;
        }
        for study in &self.other_studies {
            study.check(quiet)?;
        }
        let count = |tag: Tag, n: usize| match self.component.rule(tag) {
            Some(rule) => check_item_count(&rule, n),
            None => Ok(()),
        };
        count(tags::REFERENCED_SERIES_SEQUENCE, self.series.len())?;
        count(
            tags::STUDIES_CONTAINING_OTHER_REFERENCED_INSTANCES_SEQUENCE,
            self.other_studies.len(),
        )
    }

    fn clear_data(&mut self) {
        self.component.clear_data();
        self.series.clear();
        self.other_studies.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use dicom_dictionary_std::uids;

    const STUDY: &str = "1.2.826.0.1.3680043.9.7433.1";
    const OTHER_STUDY: &str = "1.2.826.0.1.3680043.9.7433.2";
    const SERIES: &str = "1.2.826.0.1.3680043.9.7433.1.1";

    fn shared_with_study() -> CommonInstanceReferenceModule {
        let data = crate::component::new_shared_data();
        data.borrow_mut()
            .put_str(tags::STUDY_INSTANCE_UID, VR::UI, STUDY);
        CommonInstanceReferenceModule::new_shared(data, Default::default())
    }

    #[test]
    fn references_are_sorted_by_study() {
        let mut module = shared_with_study();
        module
            .add_reference(STUDY, SERIES, uids::CT_IMAGE_STORAGE, "1.2.3.1")
            .unwrap();
        module
            .add_reference("", SERIES, uids::CT_IMAGE_STORAGE, "1.2.3.2")
            .unwrap();
        module
            .add_reference(OTHER_STUDY, "1.2.4", uids::CT_IMAGE_STORAGE, "1.2.4.1")
            .unwrap();
        module
            .add_reference(OTHER_STUDY, "1.2.4", uids::CT_IMAGE_STORAGE, "1.2.4.2")
            .unwrap();

        assert_eq!(module.referenced_series().len(), 1);
        assert_eq!(module.referenced_series()[0].referenced_instances().len(), 2);
        assert_eq!(module.other_studies().len(), 1);
        let other = &module.other_studies()[0];
        assert_eq!(other.study_instance_uid().as_deref(), Some(OTHER_STUDY));
        assert_eq!(other.series().referenced_series()[0].referenced_instances().len(), 2);
        assert_eq!(module.check(true), Ok(()));
    }

    #[test]
    fn reference_from_instance_data() {
        let mut module = shared_with_study();
        let mut instance = DataSet::new_empty();
        instance.put_str(tags::STUDY_INSTANCE_UID, VR::UI, OTHER_STUDY);
        instance.put_str(tags::SERIES_INSTANCE_UID, VR::UI, "1.2.4");
        instance.put_str(tags::SOP_CLASS_UID, VR::UI, uids::CT_IMAGE_STORAGE);
        assert!(matches!(
            module.add_reference_to(&instance),
            Err(Error::ValueNotFound { tag }) if tag == tags::SOP_INSTANCE_UID
        ));
        instance.put_str(tags::SOP_INSTANCE_UID, VR::UI, "1.2.4.1");
        module.add_reference_to(&instance).unwrap();
        assert_eq!(module.other_studies().len(), 1);
    }

    #[test]
    fn round_trip() {
        let mut module = shared_with_study();
        module
            .add_reference(STUDY, SERIES, uids::CT_IMAGE_STORAGE, "1.2.3.1")
            .unwrap();
        module
            .add_reference(OTHER_STUDY, "1.2.4", uids::CT_IMAGE_STORAGE, "1.2.4.1")
            .unwrap();
        let mut out = DataSet::new_empty();
        module.write(&mut out).unwrap();
        let studies = out
            .sequence_items(tags::STUDIES_CONTAINING_OTHER_REFERENCED_INSTANCES_SEQUENCE)
            .unwrap();
        assert_eq!(studies.len(), 1);
        assert!(studies[0].contains(tags::REFERENCED_SERIES_SEQUENCE));

        let mut read = CommonInstanceReferenceModule::new();
        read.read(&out, true).unwrap();
        assert_eq!(read.referenced_series().len(), 1);
        let copy = read.other_studies()[0].clone();
        assert_eq!(copy.study_instance_uid().as_deref(), Some(OTHER_STUDY));
        assert_eq!(copy.series().referenced_series().len(), 1);
        assert!(copy.series().referenced_series()[0].component().parent().is_some());
    }
}
