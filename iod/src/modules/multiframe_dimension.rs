//! The Multi-frame Dimension Module.
//!
//! Each dimension of a multi-frame instance names the attribute
//! (the _index pointer_) inside a functional group (the _functional group
//! pointer_) which holds the frame's position along that dimension.
//! Dimensions are grouped by dimension organization UID.
use dicom_core::value::PrimitiveValue;
use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;
use tracing::{debug, error, warn};

use crate::component::{Component, IodComponent, SharedDataSet, SharedRules};
use crate::dataset::{DataSet, DataSetExt};
use crate::rules::Level;
use crate::rules::Requirement::{ConditionalMandatory, Mandatory, Optional};
use crate::util::{check_item_count, read_sub_sequence, write_sub_sequence};
use crate::{InvalidDimensionsSnafu, MissingAttributeSnafu, Result};

fn is_private(tag: Tag) -> bool {
    tag.group() % 2 == 1
}

/// An item of the Dimension Index Sequence.
#[derive(Debug, Clone)]
pub struct DimensionIndexItem {
    component: Component,
}

impl DimensionIndexItem {
    pub const NAME: &'static str = "DimensionIndexSequence";

    pub fn new() -> Self {
        let mut item = DimensionIndexItem {
            component: Component::new(Self::NAME),
        };
        item.reset_rules();
        item
    }

    fn tag_value(&self, tag: Tag) -> Option<Tag> {
        self.component
            .data()
            .tag_values(tag)
            .and_then(|v| v.first().copied())
    }

    fn set_tag_value(&self, tag: Tag, value: Tag, check: bool) -> Result<()> {
        self.component
            .set_primitive(tag, PrimitiveValue::Tags([value].into_iter().collect()), check)
    }

    pub fn dimension_index_pointer(&self) -> Option<Tag> {
        self.tag_value(tags::DIMENSION_INDEX_POINTER)
    }

    pub fn set_dimension_index_pointer(&self, pointer: Tag, check: bool) -> Result<()> {
        self.set_tag_value(tags::DIMENSION_INDEX_POINTER, pointer, check)
    }

    pub fn functional_group_pointer(&self) -> Option<Tag> {
        self.tag_value(tags::FUNCTIONAL_GROUP_POINTER)
    }

    pub fn set_functional_group_pointer(&self, pointer: Tag, check: bool) -> Result<()> {
        self.set_tag_value(tags::FUNCTIONAL_GROUP_POINTER, pointer, check)
    }

    pub fn dimension_index_private_creator(&self) -> Option<String> {
        self.component.string(tags::DIMENSION_INDEX_PRIVATE_CREATOR)
    }

    pub fn set_dimension_index_private_creator(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::DIMENSION_INDEX_PRIVATE_CREATOR, value, check)
    }

    pub fn functional_group_private_creator(&self) -> Option<String> {
        self.component.string(tags::FUNCTIONAL_GROUP_PRIVATE_CREATOR)
    }

    pub fn set_functional_group_private_creator(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::FUNCTIONAL_GROUP_PRIVATE_CREATOR, value, check)
    }

    pub fn dimension_organization_uid(&self) -> Option<String> {
        self.component.string(tags::DIMENSION_ORGANIZATION_UID)
    }

    pub fn set_dimension_organization_uid(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::DIMENSION_ORGANIZATION_UID, value, check)
    }

    pub fn dimension_description_label(&self) -> Option<String> {
        self.component.string(tags::DIMENSION_DESCRIPTION_LABEL)
    }

    pub fn set_dimension_description_label(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::DIMENSION_DESCRIPTION_LABEL, value, check)
    }
}

impl Default for DimensionIndexItem {
    fn default() -> Self {
        Self::new()
    }
}

impl IodComponent for DimensionIndexItem {
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
                (tags::DIMENSION_INDEX_POINTER, VR::AT, "1", Mandatory),
                (tags::DIMENSION_INDEX_PRIVATE_CREATOR, VR::LO, "1", ConditionalMandatory),
                (tags::FUNCTIONAL_GROUP_POINTER, VR::AT, "1", ConditionalMandatory),
                (tags::FUNCTIONAL_GROUP_PRIVATE_CREATOR, VR::LO, "1", ConditionalMandatory),
                (tags::DIMENSION_ORGANIZATION_UID, VR::UI, "1", ConditionalMandatory),
                (tags::DIMENSION_DESCRIPTION_LABEL, VR::LO, "1", Optional),
            ],
        );
    }
}

/// An item of the Dimension Organization Sequence.
#[derive(Debug, Clone)]
pub struct DimensionOrganizationItem {
    component: Component,
}

impl DimensionOrganizationItem {
    pub const NAME: &'static str = "DimensionOrganizationSequence";

    pub fn new() -> Self {
        let mut item = DimensionOrganizationItem {
            component: Component::new(Self::NAME),
        };
        item.reset_rules();
        item
    }

    pub fn dimension_organization_uid(&self) -> Option<String> {
        self.component.string(tags::DIMENSION_ORGANIZATION_UID)
    }

    pub fn set_dimension_organization_uid(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::DIMENSION_ORGANIZATION_UID, value, check)
    }
}

impl Default for DimensionOrganizationItem {
    fn default() -> Self {
        Self::new()
    }
}

impl IodComponent for DimensionOrganizationItem {
    fn component(&self) -> &Component {
        &self.component
    }

    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }

    fn reset_rules(&mut self) {
        self.component.declare_rules(
            Level::Instance,
            &[(tags::DIMENSION_ORGANIZATION_UID, VR::UI, "1", Mandatory)],
        );
    }
}

/// The Multi-frame Dimension Module.
#[derive(Debug, Clone)]
pub struct MultiframeDimensionModule {
    component: Component,
    index: Vec<DimensionIndexItem>,
    organizations: Vec<DimensionOrganizationItem>,
    check_on_write: bool,
}

impl MultiframeDimensionModule {
    pub const NAME: &'static str = "MultiframeDimensionModule";

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    /// Create the module viewing the given data set and rules.
    ///
    /// Dimensions are checked against the per-frame functional groups
    /// found in that data set.
    pub fn new_shared(data: SharedDataSet, rules: SharedRules) -> Self {
        Self::from_component(Component::new_shared(Self::NAME, data, rules))
    }

    fn from_component(component: Component) -> Self {
        let mut module = MultiframeDimensionModule {
            component,
            index: Vec::new(),
            organizations: Vec::new(),
            check_on_write: true,
        };
        module.reset_rules();
        module
    }

    pub fn dimension_index(&self) -> &[DimensionIndexItem] {
        &self.index
    }

    pub fn dimension_index_mut(&mut self) -> &mut Vec<DimensionIndexItem> {
        &mut self.index
    }

    pub fn dimension_organizations(&self) -> &[DimensionOrganizationItem] {
        &self.organizations
    }

    /// `SINGLE`, `3D` or `3D_TEMPORAL`, among others.
    pub fn dimension_organization_type(&self) -> Option<String> {
        self.component.string(tags::DIMENSION_ORGANIZATION_TYPE)
    }

    pub fn set_dimension_organization_type(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::DIMENSION_ORGANIZATION_TYPE, value, check)
    }

    /// Whether the dimensions are checked against the
    /// per-frame functional groups before writing.
    pub fn check_on_write(&self) -> bool {
        self.check_on_write
    }

    pub fn set_check_on_write(&mut self, check: bool) {
        self.check_on_write = check;
    }

    /// Add a dimension.
    ///
    /// Private pointers require their private creators.
    /// The dimension organization is added as well if not known yet.
    pub fn add_dimension_index(
        &mut self,
        index_pointer: Tag,
        organization_uid: &str,
        functional_group_pointer: Tag,
        description_label: &str,
        index_private_creator: &str,
        functional_group_private_creator: &str,
    ) -> Result<()> {
        let missing = |tag: Tag| MissingAttributeSnafu {
            tag,
            module: DimensionIndexItem::NAME,
            requirement: ConditionalMandatory,
        };
        if is_private(index_pointer) && index_private_creator.is_empty() {
            error!("Dimension index pointer {} is private but no private creator is given", index_pointer);
            return missing(tags::DIMENSION_INDEX_PRIVATE_CREATOR).fail();
        }
        if is_private(functional_group_pointer) && functional_group_private_creator.is_empty() {
            error!(
                "Functional group pointer {} is private but no private creator is given",
                functional_group_pointer
            );
            return missing(tags::FUNCTIONAL_GROUP_PRIVATE_CREATOR).fail();
        }
        if organization_uid.is_empty() {
            error!("Dimension organization UID must not be empty");
            return missing(tags::DIMENSION_ORGANIZATION_UID).fail();
        }

        let mut item = DimensionIndexItem::new();
        item.set_dimension_index_pointer(index_pointer, true)?;
        item.set_functional_group_pointer(functional_group_pointer, true)?;
        item.set_dimension_organization_uid(organization_uid, true)?;
        if !description_label.is_empty() {
            item.set_dimension_description_label(description_label, true)?;
        }
        if !index_private_creator.is_empty() {
            item.set_dimension_index_private_creator(index_private_creator, true)?;
        }
        if !functional_group_private_creator.is_empty() {
            item.set_functional_group_private_creator(functional_group_private_creator, true)?;
        }

        let known = self
            .organizations
            .iter()
            .any(|o| o.dimension_organization_uid().as_deref() == Some(organization_uid));
        if !known {
            let mut organization = DimensionOrganizationItem::new();
            organization.set_dimension_organization_uid(organization_uid, true)?;
            organization.component_mut().set_parent(Some(&self.component));
            self.organizations.push(organization);
        }
        item.component_mut().set_parent(Some(&self.component));
        self.index.push(item);
        Ok(())
    }

    /// Check the dimensions for completeness
    /// and against the per-frame functional groups of `functional_groups`
    /// (or of the module's own data set if `None`).
    ///
    /// Every frame must hold the index attribute of every dimension
    /// in the first item of the dimension's functional group.
    pub fn check_dimensions(&self, functional_groups: Option<&DataSet>) -> Result<()> {
        let own;
        let data = match functional_groups {
            Some(data) => data,
            None => {
                own = self.component.data();
                &*own
            }
        };
        let per_frame = data.sequence_items(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE);
        if per_frame.is_none() {
            warn!("Will not check dimension consistency with functional groups (no per-frame functional groups found)");
        }

        let mut errors = Vec::new();
        for (i, dim) in self.index.iter().enumerate() {
            let n = i + 1;
            let index_pointer = dim.dimension_index_pointer();
            let fg_pointer = dim.functional_group_pointer();
            if index_pointer.is_none() {
                errors.push(format!("Dimension {} does not provide a dimension index pointer", n));
            }
            if dim.dimension_organization_uid().is_none() {
                errors.push(format!("Dimension {} does not provide a dimension organization UID", n));
            }
            if fg_pointer.is_none() {
                errors.push(format!("Dimension {} does not provide a functional group pointer", n));
            }
            let index_creator = dim.dimension_index_private_creator();
            let fg_creator = dim.functional_group_private_creator();
            if let Some(pointer) = index_pointer.filter(|&t| is_private(t)) {
                if index_creator.is_none() {
                    errors.push(format!(
                        "Dimension {} has private index pointer {} but private creator is not set",
                        n, pointer
                    ));
                }
            }
            if let Some(pointer) = fg_pointer.filter(|&t| is_private(t)) {
                if fg_creator.is_none() {
                    errors.push(format!(
                        "Dimension {} has private functional group pointer {} but private creator is not set",
                        n, pointer
                    ));
                }
            }

            if let (Some(frames), Some(fg), Some(index)) = (per_frame, fg_pointer, index_pointer) {
                for (frame, item) in frames.iter().enumerate() {
                    let found = find_private(item, fg, fg_creator.as_deref())
                        .then(|| item.find_sequence_item(fg, 0))
                        .flatten()
                        .map_or(false, |group| find_private(group, index, index_creator.as_deref()));
                    if !found {
                        errors.push(format!(
                            "Dimension {}: index attribute {} not found in functional group {} of frame {}",
                            n,
                            index,
                            fg,
                            frame + 1
                        ));
                    }
                }
            }
        }

        if errors.is_empty() {
            return Ok(());
        }
        for e in &errors {
            error!("{}", e);
        }
        InvalidDimensionsSnafu { errors }.fail()
    }

    /// Rebuild the organization items from the UIDs used by the dimensions.
    fn regenerate_organizations(&mut self) -> Result<()> {
        let mut uids: Vec<String> = Vec::new();
        for uid in self.index.iter().filter_map(|d| d.dimension_organization_uid()) {
            if !uids.contains(&uid) {
                uids.push(uid);
            }
        }
        debug!("Writing {} dimension organization(s)", uids.len());
        self.organizations.clear();
        for uid in uids {
            let mut organization = DimensionOrganizationItem::new();
            organization.set_dimension_organization_uid(&uid, false)?;
            organization.component_mut().set_parent(Some(&self.component));
            self.organizations.push(organization);
        }
        Ok(())
    }
}

/// Whether `data` holds the attribute `tag`,
/// reserved by `creator` if the tag is private and a creator is given.
fn find_private(data: &DataSet, tag: Tag, creator: Option<&str>) -> bool {
    if !data.contains(tag) {
        return false;
    }
    match creator {
        Some(creator) if is_private(tag) => {
            let reservation = Tag(tag.group(), tag.element() >> 8);
            data.string(reservation).as_deref() == Some(creator)
        }
        _ => true,
    }
}

impl Default for MultiframeDimensionModule {
    fn default() -> Self {
        Self::new()
    }
}

impl IodComponent for MultiframeDimensionModule {
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
                (tags::DIMENSION_ORGANIZATION_SEQUENCE, VR::SQ, "1-n", Mandatory),
                (tags::DIMENSION_ORGANIZATION_TYPE, VR::CS, "1", Optional),
                (tags::DIMENSION_INDEX_SEQUENCE, VR::SQ, "1-n", Mandatory),
            ],
        );
    }

    fn read(&mut self, source: &DataSet, clear_old: bool) -> Result<()> {
        if clear_old {
            self.clear_data();
        }
        read_sub_sequence(
            source,
            tags::DIMENSION_INDEX_SEQUENCE,
            &mut self.index,
            &self.component,
        )?;
        read_sub_sequence(
            source,
            tags::DIMENSION_ORGANIZATION_SEQUENCE,
            &mut self.organizations,
            &self.component,
        )?;
        self.component.read(source, false)
    }

    /// Write the dimensions.
    ///
    /// If checking on write is enabled,
    /// nothing is written unless the dimensions pass
    /// [`check_dimensions`](Self::check_dimensions).
    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        if self.check_on_write {
            self.check_dimensions(None)?;
        }
        self.regenerate_organizations()?;
        let organizations = write_sub_sequence(
            tags::DIMENSION_ORGANIZATION_SEQUENCE,
            &mut self.organizations,
            &self.component,
            destination,
        );
        let index = write_sub_sequence(
            tags::DIMENSION_INDEX_SEQUENCE,
            &mut self.index,
            &self.component,
            destination,
        );
        let own = self.component.write(destination);
        organizations.and(index).and(own)
    }

    fn check(&self, quiet: bool) -> Result<()> {
        self.component.check(quiet)?;
        for item in &self.index {
            item.check(quiet)?;
        }
        for item in &self.organizations {
            item.check(quiet)?;
        }
        let count = |tag: Tag, n: usize| match self.component.rule(tag) {
            Some(rule) => check_item_count(&rule, n),
            None => Ok(()),
        };
        count(tags::DIMENSION_INDEX_SEQUENCE, self.index.len())?;
        count(tags::DIMENSION_ORGANIZATION_SEQUENCE, self.organizations.len())
    }

    fn clear_data(&mut self) {
        self.component.clear_data();
        self.index.clear();
        self.organizations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::dataset::ItemIndex;

    const ORGANIZATION: &str = "1.2.826.0.1.3680043.9.7433.3.1";

    fn per_frame(frames: &[u16]) -> DataSet {
        let mut data = DataSet::new_empty();
        for (i, &segment) in frames.iter().enumerate() {
            data.find_or_create_sequence_item(
                tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE,
                ItemIndex::At(i),
                |frame| {
                    let mut group = DataSet::new_empty();
                    group.put_u16s(tags::REFERENCED_SEGMENT_NUMBER, VR::US, &[segment]);
                    frame.put_sequence(tags::SEGMENT_IDENTIFICATION_SEQUENCE, vec![group]);
                },
            );
        }
        data
    }

    fn segment_dimension() -> MultiframeDimensionModule {
        let mut module = MultiframeDimensionModule::new();
        module
            .add_dimension_index(
                tags::REFERENCED_SEGMENT_NUMBER,
                ORGANIZATION,
                tags::SEGMENT_IDENTIFICATION_SEQUENCE,
                "Segment",
                "",
                "",
            )
            .unwrap();
        module
    }

    #[test]
    fn add_dimension_index_validates_input() {
        let mut module = MultiframeDimensionModule::new();
        assert!(matches!(
            module.add_dimension_index(Tag(0x0009, 0x1001), ORGANIZATION, tags::FRAME_CONTENT_SEQUENCE, "", "", ""),
            Err(Error::MissingAttribute { tag, .. }) if tag == tags::DIMENSION_INDEX_PRIVATE_CREATOR
        ));
        assert!(matches!(
            module.add_dimension_index(tags::IN_STACK_POSITION_NUMBER, "", tags::FRAME_CONTENT_SEQUENCE, "", "", ""),
            Err(Error::MissingAttribute { tag, .. }) if tag == tags::DIMENSION_ORGANIZATION_UID
        ));
        assert!(module.dimension_index().is_empty());

        module
            .add_dimension_index(tags::STACK_ID, ORGANIZATION, tags::FRAME_CONTENT_SEQUENCE, "", "", "")
            .unwrap();
        module
            .add_dimension_index(tags::IN_STACK_POSITION_NUMBER, ORGANIZATION, tags::FRAME_CONTENT_SEQUENCE, "", "", "")
            .unwrap();
        assert_eq!(module.dimension_index().len(), 2);
        assert_eq!(module.dimension_organizations().len(), 1);
        assert_eq!(
            module.dimension_index()[1].dimension_index_pointer(),
            Some(tags::IN_STACK_POSITION_NUMBER)
        );
    }

    #[test]
    fn dimensions_are_checked_against_frames() {
        let module = segment_dimension();
        assert_eq!(module.check_dimensions(Some(&per_frame(&[1, 2, 1]))), Ok(()));

        let mut frames = per_frame(&[1, 2]);
        frames.find_sequence_item_mut(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE, 1, |frame| {
            frame.delete(tags::SEGMENT_IDENTIFICATION_SEQUENCE)
        });
        match module.check_dimensions(Some(&frames)) {
            Err(Error::InvalidDimensions { errors }) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn write_checks_shared_functional_groups() {
        let data = crate::component::new_shared_data();
        let rules: SharedRules = Default::default();
        let mut module = MultiframeDimensionModule::new_shared(data.clone(), rules);
        module
            .add_dimension_index(
                tags::REFERENCED_SEGMENT_NUMBER,
                ORGANIZATION,
                tags::SEGMENT_IDENTIFICATION_SEQUENCE,
                "",
                "",
                "",
            )
            .unwrap();

        let mut frames = per_frame(&[1]);
        frames.find_sequence_item_mut(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE, 0, |frame| {
            frame.delete(tags::SEGMENT_IDENTIFICATION_SEQUENCE)
        });
        let per_frame_sequence = frames
            .take(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE)
            .unwrap();
        data.borrow_mut().put(per_frame_sequence);

        let mut out = DataSet::new_empty();
        assert!(matches!(module.write(&mut out), Err(Error::InvalidDimensions { .. })));
        assert!(out.is_empty());

        module.set_check_on_write(false);
        module.write(&mut out).unwrap();
        assert_eq!(out.sequence_items(tags::DIMENSION_INDEX_SEQUENCE).unwrap().len(), 1);
    }

    #[test]
    fn organizations_are_regenerated_on_write() {
        let mut module = segment_dimension();
        module.set_check_on_write(false);
        module.organizations.clear();
        let mut out = DataSet::new_empty();
        module.write(&mut out).unwrap();
        let organizations = out
            .sequence_items(tags::DIMENSION_ORGANIZATION_SEQUENCE)
            .unwrap();
        assert_eq!(organizations.len(), 1);
        assert_eq!(
            organizations[0].string(tags::DIMENSION_ORGANIZATION_UID).as_deref(),
            Some(ORGANIZATION)
        );

        let mut read = MultiframeDimensionModule::new();
        read.read(&out, true).unwrap();
        assert_eq!(read.dimension_index().len(), 1);
        assert_eq!(
            read.dimension_index()[0].dimension_description_label().as_deref(),
            Some("Segment")
        );
        assert_eq!(read.check(true), Ok(()));
    }

    #[test]
    fn private_index_needs_reservation() {
        let mut item = DataSet::new_empty();
        item.put_u16s(Tag(0x0029, 0x1010), VR::US, &[1]);
        assert!(find_private(&item, Tag(0x0029, 0x1010), None));
        assert!(!find_private(&item, Tag(0x0029, 0x1010), Some("ACME 1.0")));
        item.put_str(Tag(0x0029, 0x0010), VR::LO, "ACME 1.0");
        assert!(find_private(&item, Tag(0x0029, 0x1010), Some("ACME 1.0")));
    }
}
