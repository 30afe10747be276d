//! Assembling IODs from the common modules and further modules.
use dicom_core::VR;
use dicom_dictionary_std::{tags, uids};
use dicom_iod::modules::{
    FunctionalGroupsModule, GeneralImageModule, MultiframeDimensionModule, PaletteColorLutModule,
    Channel, LutDescriptor,
};
use dicom_iod::{DataSet, DataSetExt, Error, HierarchyImport, IodCommon, IodComponent, IodOptions};

const ROOT: &str = "1.2.826.0.1.3680043.9.7433";

fn hierarchy_uids(data: &DataSet) -> [Option<String>; 3] {
    [
        data.string(tags::STUDY_INSTANCE_UID),
        data.string(tags::SERIES_INSTANCE_UID),
        data.string(tags::SOP_INSTANCE_UID),
    ]
}

fn secondary_capture() -> IodCommon {
    let iod = IodCommon::with_options(IodOptions::new().uid_root(ROOT));
    iod.sop_common()
        .set_sop_class_uid(uids::SECONDARY_CAPTURE_IMAGE_STORAGE, true)
        .unwrap();
    iod.general_series().set_modality("OT", true).unwrap();
    iod.patient().set_patient_name("Doe^Jane", true).unwrap();
    iod
}

#[test]
fn new_series_in_same_study() {
    let mut iod = secondary_capture();
    let [study, series, instance] = hierarchy_uids(&iod.data());
    assert!(study.as_deref().unwrap().starts_with(ROOT));

    let mut first = DataSet::new_empty();
    iod.write(&mut first).unwrap();

    iod.create_new_series(false);
    iod.general_series().set_modality("OT", true).unwrap();
    let mut second = DataSet::new_empty();
    iod.write(&mut second).unwrap();

    let [study2, series2, instance2] = hierarchy_uids(&second);
    assert_eq!(study, study2);
    assert_ne!(series, series2);
    assert_ne!(instance, instance2);
    assert_eq!(hierarchy_uids(&first), [study, series, instance]);
    assert_eq!(
        second.string(tags::PATIENT_NAME).as_deref(),
        Some("Doe^Jane")
    );
    assert_eq!(
        first.string(tags::FRAME_OF_REFERENCE_UID),
        second.string(tags::FRAME_OF_REFERENCE_UID)
    );
}

#[test]
fn derived_instance_takes_over_the_hierarchy() {
    let mut original = secondary_capture();
    original
        .general_equipment()
        .set_manufacturer("ACME", true)
        .unwrap();
    let mut source = DataSet::new_empty();
    original.write(&mut source).unwrap();

    let mut derived = IodCommon::new();
    derived
        .import_hierarchy(&source, HierarchyImport::new().patient(true).study(true))
        .unwrap();
    derived.create_new_series(true);

    assert_eq!(
        derived.general_study().study_instance_uid(),
        source.string(tags::STUDY_INSTANCE_UID)
    );
    assert_ne!(
        derived.general_series().series_instance_uid(),
        source.string(tags::SERIES_INSTANCE_UID)
    );
    assert_eq!(derived.patient().patient_name().as_deref(), Some("Doe^Jane"));
    assert_eq!(derived.general_equipment().manufacturer(), None);

    derived
        .common_instance_reference_mut()
        .add_reference_to(&source)
        .unwrap();
    assert_eq!(derived.common_instance_reference().referenced_series().len(), 1);
    assert!(derived.common_instance_reference().other_studies().is_empty());
}

#[test]
fn multiframe_instance_with_dimensions() {
    let mut iod = secondary_capture();
    let groups = FunctionalGroupsModule::new_shared(iod.shared_data(), iod.shared_rules());
    let mut dimensions = MultiframeDimensionModule::new_shared(iod.shared_data(), iod.shared_rules());
    let image = GeneralImageModule::new_shared(iod.shared_data(), iod.shared_rules());

    dimensions
        .add_dimension_index(
            tags::IN_STACK_POSITION_NUMBER,
            "1.2.826.0.1.3680043.9.7433.4",
            tags::FRAME_CONTENT_SEQUENCE,
            "Position",
            "",
            "",
        )
        .unwrap();
    for position in 1..=3u32 {
        let mut content = DataSet::new_empty();
        content.put_u32s(tags::IN_STACK_POSITION_NUMBER, VR::UL, &[position]);
        let mut frame = DataSet::new_empty();
        frame.put_sequence(tags::FRAME_CONTENT_SEQUENCE, vec![content]);
        groups.add_frame(frame);
    }
    groups.set_instance_number(1, true).unwrap();
    assert_eq!(dimensions.check_dimensions(None), Ok(()));

    iod.add_module(Box::new(groups)).unwrap();
    iod.add_module(Box::new(dimensions)).unwrap();
    iod.add_module(Box::new(image)).unwrap();

    let mut out = DataSet::new_empty();
    iod.write(&mut out).unwrap();
    assert_eq!(out.string(tags::NUMBER_OF_FRAMES).as_deref(), Some("3"));
    assert_eq!(
        out.sequence_items(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE)
            .map(|items| items.len()),
        Some(3)
    );
    assert!(out.contains(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE));
    assert_eq!(
        out.sequence_items(tags::DIMENSION_ORGANIZATION_SEQUENCE)
            .map(|items| items.len()),
        Some(1)
    );
    assert_eq!(out.string(tags::BURNED_IN_ANNOTATION).as_deref(), Some("NO"));

    // a frame lacking the dimension value makes the dimensions invalid
    let mut reread = IodCommon::new();
    let mut groups = FunctionalGroupsModule::new_shared(reread.shared_data(), reread.shared_rules());
    let mut dimensions =
        MultiframeDimensionModule::new_shared(reread.shared_data(), reread.shared_rules());
    groups.read(&out, true).unwrap();
    dimensions.read(&out, true).unwrap();
    groups.add_frame(DataSet::new_empty());
    assert!(matches!(
        dimensions.check_dimensions(None),
        Err(Error::InvalidDimensions { .. })
    ));
    reread.add_module(Box::new(dimensions)).unwrap();
    assert!(reread.module(MultiframeDimensionModule::NAME).is_some());
}

#[test]
fn palette_in_an_iod() {
    let mut iod = secondary_capture();
    let palette = PaletteColorLutModule::new_shared(iod.shared_data(), iod.shared_rules());
    palette
        .set_descriptors(
            LutDescriptor {
                entries: 3,
                first_mapped: 0,
                bits: 8,
            },
            true,
        )
        .unwrap();
    palette
        .set_data_8bit(Channel::Red, &[0x12, 0x34, 0x56], true)
        .unwrap();
    palette
        .set_data_8bit(Channel::Green, &[0x12, 0x34, 0x56], true)
        .unwrap();
    iod.add_module(Box::new(palette)).unwrap();

    // blue data is missing
    let mut out = DataSet::new_empty();
    assert!(matches!(
        iod.write(&mut out),
        Err(Error::InvalidColorPalette { .. })
    ));

    let palette = PaletteColorLutModule::new_shared(iod.shared_data(), iod.shared_rules());
    palette
        .set_data_16bit(Channel::Blue, &[0x1234, 0x5600], false)
        .unwrap();
    let mut out = DataSet::new_empty();
    iod.write(&mut out).unwrap();
    assert_eq!(out.uint16_values(tags::BLUE_PALETTE_COLOR_LOOKUP_TABLE_DATA), Some(vec![0x1234, 0x5600]));
}
