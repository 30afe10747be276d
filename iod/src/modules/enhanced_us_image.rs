use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;

use crate::component::{Component, IodComponent, SharedDataSet, SharedRules};
use crate::dataset::{DataSet, DataSetExt};
use crate::macros::{
    CodeSequenceMacro, GeneralAnatomyMacro, MandatoryViewAndSliceProgressionDirectionMacro,
};
use crate::rules::Requirement::{self, ConditionalMandatory, Mandatory, Optional};
use crate::rules::{Level, Rule};
use crate::util::{
    check_item_count, ensure_permitted, read_single_item, read_sub_sequence, write_single_item,
    write_sub_sequence,
};
use crate::Result;

/// Whether the pixel data are the original acquired data,
/// the first value of Image Type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelDataCharacteristics {
    Original,
    Derived,
}

impl PixelDataCharacteristics {
    pub fn as_str(self) -> &'static str {
        match self {
            PixelDataCharacteristics::Original => "ORIGINAL",
            PixelDataCharacteristics::Derived => "DERIVED",
        }
    }
}

/// The Enhanced US Image Module of 3D ultrasound images.
///
/// The view and anatomy macros share the module's data set,
/// while the transducer codes are sub-components written as sequences.
/// Samples per Pixel, Photometric Interpretation, Pixel Representation,
/// Presentation LUT Shape, rescaling and Burned In Annotation
/// are invented with their only permitted value when missing.
#[derive(Debug)]
pub struct EnhancedUsImageModule {
    component: Component,
    view: MandatoryViewAndSliceProgressionDirectionMacro,
    anatomy: GeneralAnatomyMacro,
    transducer_scan_pattern: CodeSequenceMacro,
    transducer_geometry: CodeSequenceMacro,
    transducer_application: CodeSequenceMacro,
    transducer_beam_steering: Vec<CodeSequenceMacro>,
}

impl EnhancedUsImageModule {
    pub const NAME: &'static str = "EnhancedUSImageModule";

    const RULES: &'static [(Tag, VR, &'static str, Requirement)] = &[
        (tags::IMAGE_TYPE, VR::CS, "4", Mandatory),
        (tags::ROWS, VR::US, "1", Mandatory),
        (tags::COLUMNS, VR::US, "1", Mandatory),
        (tags::BITS_ALLOCATED, VR::US, "1", Mandatory),
        (tags::BITS_STORED, VR::US, "1", Mandatory),
        (tags::HIGH_BIT, VR::US, "1", Mandatory),
        (tags::DIMENSION_ORGANIZATION_TYPE, VR::CS, "1", Mandatory),
        (tags::ACQUISITION_DATE_TIME, VR::DT, "1", Mandatory),
        (tags::ACQUISITION_DURATION, VR::FD, "1", Mandatory),
        (tags::PIXEL_SPACING, VR::DS, "2", Mandatory),
        (tags::POSITION_MEASURING_DEVICE_USED, VR::CS, "1", ConditionalMandatory),
        (tags::LOSSY_IMAGE_COMPRESSION, VR::CS, "1", Mandatory),
        (tags::LOSSY_IMAGE_COMPRESSION_RATIO, VR::DS, "1-n", ConditionalMandatory),
        (tags::LOSSY_IMAGE_COMPRESSION_METHOD, VR::CS, "1-n", ConditionalMandatory),
        (tags::TRANSDUCER_SCAN_PATTERN_CODE_SEQUENCE, VR::SQ, "1", Mandatory),
        (tags::TRANSDUCER_GEOMETRY_CODE_SEQUENCE, VR::SQ, "1", Mandatory),
        (tags::TRANSDUCER_BEAM_STEERING_CODE_SEQUENCE, VR::SQ, "1-n", Mandatory),
        (tags::TRANSDUCER_APPLICATION_CODE_SEQUENCE, VR::SQ, "1", Mandatory),
        (tags::PROCESSING_FUNCTION, VR::LO, "1", Optional),
        (tags::MECHANICAL_INDEX, VR::DS, "1", Mandatory),
        (tags::BONE_THERMAL_INDEX, VR::DS, "1", Mandatory),
        (tags::CRANIAL_THERMAL_INDEX, VR::DS, "1", Mandatory),
        (tags::SOFT_TISSUE_THERMAL_INDEX, VR::DS, "1", Mandatory),
        (tags::DEPTHS_OF_FOCUS, VR::FD, "1-n", Mandatory),
        (tags::DEPTH_OF_SCAN_FIELD, VR::IS, "1", Mandatory),
    ];

    const DEFAULTS: &'static [(Tag, VR, Requirement, &'static str)] = &[
        (tags::SAMPLES_PER_PIXEL, VR::US, Mandatory, "1"),
        (tags::PHOTOMETRIC_INTERPRETATION, VR::CS, Mandatory, "MONOCHROME2"),
        (tags::PIXEL_REPRESENTATION, VR::US, Mandatory, "0"),
        (tags::PRESENTATION_LUT_SHAPE, VR::CS, Mandatory, "IDENTITY"),
        (tags::RESCALE_SLOPE, VR::DS, Mandatory, "1"),
        (tags::RESCALE_INTERCEPT, VR::DS, Mandatory, "0"),
        (tags::BURNED_IN_ANNOTATION, VR::CS, Mandatory, "NO"),
        (tags::RECOGNIZABLE_VISUAL_FEATURES, VR::CS, Optional, "NO"),
    ];

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    pub fn new_shared(data: SharedDataSet, rules: SharedRules) -> Self {
        Self::from_component(Component::new_shared(Self::NAME, data, rules))
    }

    fn from_component(component: Component) -> Self {
        let view = MandatoryViewAndSliceProgressionDirectionMacro::new_shared(
            component.shared_data(),
            component.shared_rules(),
        );
        let anatomy =
            GeneralAnatomyMacro::new_shared(component.shared_data(), component.shared_rules(), Mandatory);
        let mut module = EnhancedUsImageModule {
            component,
            view,
            anatomy,
            transducer_scan_pattern: CodeSequenceMacro::new(),
            transducer_geometry: CodeSequenceMacro::new(),
            transducer_application: CodeSequenceMacro::new(),
            transducer_beam_steering: Vec::new(),
        };
        module.link_children();
        module.reset_rules();
        module
    }

    fn link_children(&mut self) {
        let parent = &self.component;
        self.transducer_scan_pattern
            .component_mut()
            .set_parent(Some(parent));
        self.transducer_geometry.component_mut().set_parent(Some(parent));
        self.transducer_application
            .component_mut()
            .set_parent(Some(parent));
        for code in &mut self.transducer_beam_steering {
            code.component_mut().set_parent(Some(parent));
        }
    }

    pub fn view(&self) -> &MandatoryViewAndSliceProgressionDirectionMacro {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut MandatoryViewAndSliceProgressionDirectionMacro {
        &mut self.view
    }

    pub fn anatomy(&self) -> &GeneralAnatomyMacro {
        &self.anatomy
    }

    pub fn anatomy_mut(&mut self) -> &mut GeneralAnatomyMacro {
        &mut self.anatomy
    }

    pub fn transducer_scan_pattern(&self) -> &CodeSequenceMacro {
        &self.transducer_scan_pattern
    }

    pub fn set_transducer_scan_pattern(&mut self, code: CodeSequenceMacro) {
        self.transducer_scan_pattern = code;
        self.link_children();
    }

    pub fn transducer_geometry(&self) -> &CodeSequenceMacro {
        &self.transducer_geometry
    }

    pub fn set_transducer_geometry(&mut self, code: CodeSequenceMacro) {
        self.transducer_geometry = code;
        self.link_children();
    }

    pub fn transducer_application(&self) -> &CodeSequenceMacro {
        &self.transducer_application
    }

    pub fn set_transducer_application(&mut self, code: CodeSequenceMacro) {
        self.transducer_application = code;
        self.link_children();
    }

    pub fn transducer_beam_steering(&self) -> &[CodeSequenceMacro] {
        &self.transducer_beam_steering
    }

    /// Add a beam steering code, which must be complete.
    pub fn add_transducer_beam_steering(&mut self, mut code: CodeSequenceMacro) -> Result<()> {
        code.check(false)?;
        code.component_mut().set_parent(Some(&self.component));
        self.transducer_beam_steering.push(code);
        Ok(())
    }

    pub fn image_type(&self) -> Vec<String> {
        self.component.strings(tags::IMAGE_TYPE)
    }

    /// Set Image Type to `<characteristics>\PRIMARY\<flavor>\<derived contrast>`.
    pub fn set_image_type(
        &self,
        characteristics: PixelDataCharacteristics,
        flavor: &str,
        derived_contrast: &str,
        check: bool,
    ) -> Result<()> {
        let values = [
            characteristics.as_str().to_string(),
            "PRIMARY".to_string(),
            flavor.to_string(),
            derived_contrast.to_string(),
        ];
        self.component.set_strings(tags::IMAGE_TYPE, &values, check)
    }

    pub fn samples_per_pixel(&self) -> Option<u16> {
        self.component.data().uint16(tags::SAMPLES_PER_PIXEL, 0)
    }

    pub fn photometric_interpretation(&self) -> Option<String> {
        self.component.string(tags::PHOTOMETRIC_INTERPRETATION)
    }

    pub fn rows(&self) -> Option<u16> {
        self.component.data().uint16(tags::ROWS, 0)
    }

    pub fn set_rows(&self, rows: u16, check: bool) -> Result<()> {
        self.set_dimension(tags::ROWS, rows, check)
    }

    pub fn columns(&self) -> Option<u16> {
        self.component.data().uint16(tags::COLUMNS, 0)
    }

    pub fn set_columns(&self, columns: u16, check: bool) -> Result<()> {
        self.set_dimension(tags::COLUMNS, columns, check)
    }

    fn set_dimension(&self, tag: Tag, value: u16, check: bool) -> Result<()> {
        if check {
            ensure_permitted(tag, value != 0)?;
        }
        self.component.set_uint16s(tag, &[value], check)
    }

    pub fn bits_allocated(&self) -> Option<u16> {
        self.component.data().uint16(tags::BITS_ALLOCATED, 0)
    }

    /// Set Bits Allocated, 8 or 16 when checking.
    pub fn set_bits_allocated(&self, bits: u16, check: bool) -> Result<()> {
        self.set_restricted_u16(tags::BITS_ALLOCATED, bits, &[8, 16], check)
    }

    pub fn bits_stored(&self) -> Option<u16> {
        self.component.data().uint16(tags::BITS_STORED, 0)
    }

    /// Set Bits Stored, 8 or 16 when checking.
    pub fn set_bits_stored(&self, bits: u16, check: bool) -> Result<()> {
        self.set_restricted_u16(tags::BITS_STORED, bits, &[8, 16], check)
    }

    pub fn high_bit(&self) -> Option<u16> {
        self.component.data().uint16(tags::HIGH_BIT, 0)
    }

    /// Set High Bit, 7 or 15 when checking.
    pub fn set_high_bit(&self, bit: u16, check: bool) -> Result<()> {
        self.set_restricted_u16(tags::HIGH_BIT, bit, &[7, 15], check)
    }

    fn set_restricted_u16(&self, tag: Tag, value: u16, permitted: &[u16], check: bool) -> Result<()> {
        if check {
            ensure_permitted(tag, permitted.contains(&value))?;
        }
        self.component.set_uint16s(tag, &[value], check)
    }

    fn set_restricted_string(&self, tag: Tag, value: &str, permitted: &[&str], check: bool) -> Result<()> {
        if check {
            ensure_permitted(tag, permitted.contains(&value))?;
        }
        self.component.set_string(tag, value, check)
    }

    pub fn pixel_representation(&self) -> Option<u16> {
        self.component.data().uint16(tags::PIXEL_REPRESENTATION, 0)
    }

    pub fn dimension_organization_type(&self) -> Option<String> {
        self.component.string(tags::DIMENSION_ORGANIZATION_TYPE)
    }

    /// Set the organization, `3D` or `3D_TEMPORAL` when checking.
    pub fn set_dimension_organization_type(&self, value: &str, check: bool) -> Result<()> {
        self.set_restricted_string(
            tags::DIMENSION_ORGANIZATION_TYPE,
            value,
            &["3D", "3D_TEMPORAL"],
            check,
        )
    }

    pub fn acquisition_date_time(&self) -> Option<String> {
        self.component.string(tags::ACQUISITION_DATE_TIME)
    }

    pub fn set_acquisition_date_time(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::ACQUISITION_DATE_TIME, value, check)
    }

    /// The duration of the acquisition in seconds.
    pub fn acquisition_duration(&self) -> Option<f64> {
        self.component.data().float64(tags::ACQUISITION_DURATION, 0)
    }

    pub fn set_acquisition_duration(&self, seconds: f64, check: bool) -> Result<()> {
        self.component
            .set_float64s(tags::ACQUISITION_DURATION, &[seconds], check)
    }

    /// Row and column spacing in mm.
    pub fn pixel_spacing(&self) -> Option<Vec<f64>> {
        self.component.data().float64_values(tags::PIXEL_SPACING)
    }

    pub fn set_pixel_spacing(&self, row: f64, column: f64, check: bool) -> Result<()> {
        self.component
            .set_decimals(tags::PIXEL_SPACING, &[row, column], check)
    }

    pub fn position_measuring_device_used(&self) -> Option<String> {
        self.component.string(tags::POSITION_MEASURING_DEVICE_USED)
    }

    /// Set the device, `RIGID` or `FREEHAND` when checking.
    pub fn set_position_measuring_device_used(&self, value: &str, check: bool) -> Result<()> {
        self.set_restricted_string(
            tags::POSITION_MEASURING_DEVICE_USED,
            value,
            &["RIGID", "FREEHAND"],
            check,
        )
    }

    pub fn lossy_image_compression(&self) -> Option<String> {
        self.component.string(tags::LOSSY_IMAGE_COMPRESSION)
    }

    /// `00` if the image never underwent lossy compression, `01` otherwise.
    pub fn set_lossy_image_compression(&self, value: &str, check: bool) -> Result<()> {
        self.set_restricted_string(tags::LOSSY_IMAGE_COMPRESSION, value, &["00", "01"], check)
    }

    pub fn lossy_image_compression_ratio(&self) -> Option<Vec<f64>> {
        self.component
            .data()
            .float64_values(tags::LOSSY_IMAGE_COMPRESSION_RATIO)
    }

    pub fn set_lossy_image_compression_ratio(&self, ratios: &[f64], check: bool) -> Result<()> {
        self.component
            .set_decimals(tags::LOSSY_IMAGE_COMPRESSION_RATIO, ratios, check)
    }

    pub fn lossy_image_compression_method(&self) -> Vec<String> {
        self.component.strings(tags::LOSSY_IMAGE_COMPRESSION_METHOD)
    }

    pub fn set_lossy_image_compression_method(&self, methods: &[String], check: bool) -> Result<()> {
        self.component
            .set_strings(tags::LOSSY_IMAGE_COMPRESSION_METHOD, methods, check)
    }

    pub fn presentation_lut_shape(&self) -> Option<String> {
        self.component.string(tags::PRESENTATION_LUT_SHAPE)
    }

    pub fn burned_in_annotation(&self) -> Option<String> {
        self.component.string(tags::BURNED_IN_ANNOTATION)
    }

    pub fn recognizable_visual_features(&self) -> Option<String> {
        self.component.string(tags::RECOGNIZABLE_VISUAL_FEATURES)
    }

    /// `YES` or `NO` when checking.
    pub fn set_recognizable_visual_features(&self, value: &str, check: bool) -> Result<()> {
        self.set_restricted_string(
            tags::RECOGNIZABLE_VISUAL_FEATURES,
            value,
            &["YES", "NO"],
            check,
        )
    }

    pub fn processing_function(&self) -> Option<String> {
        self.component.string(tags::PROCESSING_FUNCTION)
    }

    pub fn set_processing_function(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::PROCESSING_FUNCTION, value, check)
    }

    pub fn mechanical_index(&self) -> Option<f64> {
        self.component.data().float64(tags::MECHANICAL_INDEX, 0)
    }

    pub fn set_mechanical_index(&self, value: f64, check: bool) -> Result<()> {
        self.component
            .set_decimals(tags::MECHANICAL_INDEX, &[value], check)
    }

    pub fn bone_thermal_index(&self) -> Option<f64> {
        self.component.data().float64(tags::BONE_THERMAL_INDEX, 0)
    }

    pub fn set_bone_thermal_index(&self, value: f64, check: bool) -> Result<()> {
        self.component
            .set_decimals(tags::BONE_THERMAL_INDEX, &[value], check)
    }

    pub fn cranial_thermal_index(&self) -> Option<f64> {
        self.component.data().float64(tags::CRANIAL_THERMAL_INDEX, 0)
    }

    pub fn set_cranial_thermal_index(&self, value: f64, check: bool) -> Result<()> {
        self.component
            .set_decimals(tags::CRANIAL_THERMAL_INDEX, &[value], check)
    }

    pub fn soft_tissue_thermal_index(&self) -> Option<f64> {
        self.component
            .data()
            .float64(tags::SOFT_TISSUE_THERMAL_INDEX, 0)
    }

    pub fn set_soft_tissue_thermal_index(&self, value: f64, check: bool) -> Result<()> {
        self.component
            .set_decimals(tags::SOFT_TISSUE_THERMAL_INDEX, &[value], check)
    }

    /// Depths of the transmit focus in mm.
    pub fn depths_of_focus(&self) -> Option<Vec<f64>> {
        self.component.data().float64_values(tags::DEPTHS_OF_FOCUS)
    }

    pub fn set_depths_of_focus(&self, depths: &[f64], check: bool) -> Result<()> {
        self.component
            .set_float64s(tags::DEPTHS_OF_FOCUS, depths, check)
    }

    /// Depth of the scan field in mm.
    pub fn depth_of_scan_field(&self) -> Option<i32> {
        self.component
            .data()
            .int32_values(tags::DEPTH_OF_SCAN_FIELD)
            .and_then(|v| v.first().copied())
    }

    pub fn set_depth_of_scan_field(&self, depth: i32, check: bool) -> Result<()> {
        self.component
            .set_int_string(tags::DEPTH_OF_SCAN_FIELD, i64::from(depth), check)
    }

    fn check_code(&self, tag: Tag, code: &CodeSequenceMacro, quiet: bool) -> Result<()> {
        if !code.is_empty() {
            return code.check(quiet);
        }
        match self.component.rule(tag) {
            Some(rule) => check_item_count(&rule, 0),
            None => Ok(()),
        }
    }
}

impl Default for EnhancedUsImageModule {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EnhancedUsImageModule {
    fn clone(&self) -> Self {
        let component = self.component.clone();
        let view = self
            .view
            .clone_shared(component.shared_data(), component.shared_rules());
        let anatomy = self
            .anatomy
            .clone_shared(component.shared_data(), component.shared_rules());
        let mut module = EnhancedUsImageModule {
            component,
            view,
            anatomy,
            transducer_scan_pattern: self.transducer_scan_pattern.clone(),
            transducer_geometry: self.transducer_geometry.clone(),
            transducer_application: self.transducer_application.clone(),
            transducer_beam_steering: self.transducer_beam_steering.clone(),
        };
        module.link_children();
        module
    }
}

impl IodComponent for EnhancedUsImageModule {
    fn component(&self) -> &Component {
        &self.component
    }

    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }

    fn reset_rules(&mut self) {
        self.component.declare_rules(Level::Image, Self::RULES);
        for &(tag, vr, requirement, default) in Self::DEFAULTS {
            self.component.add_rule(
                Rule::new(tag, vr, "1", requirement, Self::NAME, Level::Image).with_default(default),
                true,
            );
        }
    }

    fn read(&mut self, source: &DataSet, clear_old: bool) -> Result<()> {
        if clear_old {
            self.clear_data();
        }
        self.component.read(source, false)?;
        self.view.read(source, false)?;
        self.anatomy.read(source, false)?;
        read_single_item(
            source,
            tags::TRANSDUCER_SCAN_PATTERN_CODE_SEQUENCE,
            &mut self.transducer_scan_pattern,
            &self.component,
        )?;
        read_single_item(
            source,
            tags::TRANSDUCER_GEOMETRY_CODE_SEQUENCE,
            &mut self.transducer_geometry,
            &self.component,
        )?;
        read_single_item(
            source,
            tags::TRANSDUCER_APPLICATION_CODE_SEQUENCE,
            &mut self.transducer_application,
            &self.component,
        )?;
        read_sub_sequence(
            source,
            tags::TRANSDUCER_BEAM_STEERING_CODE_SEQUENCE,
            &mut self.transducer_beam_steering,
            &self.component,
        )
    }

    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        let own = self.component.write(destination);
        let view = self.view.write(destination);
        let anatomy = self.anatomy.write(destination);
        let scan_pattern = write_single_item(
            tags::TRANSDUCER_SCAN_PATTERN_CODE_SEQUENCE,
            &mut self.transducer_scan_pattern,
            &self.component,
            destination,
        );
        let geometry = write_single_item(
            tags::TRANSDUCER_GEOMETRY_CODE_SEQUENCE,
            &mut self.transducer_geometry,
            &self.component,
            destination,
        );
        let application = write_single_item(
            tags::TRANSDUCER_APPLICATION_CODE_SEQUENCE,
            &mut self.transducer_application,
            &self.component,
            destination,
        );
        let beam_steering = write_sub_sequence(
            tags::TRANSDUCER_BEAM_STEERING_CODE_SEQUENCE,
            &mut self.transducer_beam_steering,
            &self.component,
            destination,
        );
        own.and(view)
            .and(anatomy)
            .and(scan_pattern)
            .and(geometry)
            .and(application)
            .and(beam_steering)
    }

    fn check(&self, quiet: bool) -> Result<()> {
        self.component.check(quiet)?;
        self.view.check(quiet)?;
        self.anatomy.check(quiet)?;
        self.check_code(
            tags::TRANSDUCER_SCAN_PATTERN_CODE_SEQUENCE,
            &self.transducer_scan_pattern,
            quiet,
        )?;
        self.check_code(
            tags::TRANSDUCER_GEOMETRY_CODE_SEQUENCE,
            &self.transducer_geometry,
            quiet,
        )?;
        self.check_code(
            tags::TRANSDUCER_APPLICATION_CODE_SEQUENCE,
            &self.transducer_application,
            quiet,
        )?;
        for code in &self.transducer_beam_steering {
            code.check(quiet)?;
        }
        match self
            .component
            .rule(tags::TRANSDUCER_BEAM_STEERING_CODE_SEQUENCE)
        {
            Some(rule) => check_item_count(&rule, self.transducer_beam_steering.len()),
            None => Ok(()),
        }
    }

    fn clear_data(&mut self) {
        self.component.clear_data();
        self.view.clear_data();
        self.anatomy.clear_data();
        self.transducer_scan_pattern.clear_data();
        self.transducer_geometry.clear_data();
        self.transducer_application.clear_data();
        self.transducer_beam_steering.clear();
    }

    fn set_value_check_on_write(&mut self, check: bool) {
        self.component.set_value_check_on_write(check);
        self.view.set_value_check_on_write(check);
        self.anatomy.set_value_check_on_write(check);
        self.transducer_scan_pattern.set_value_check_on_write(check);
        self.transducer_geometry.set_value_check_on_write(check);
        self.transducer_application.set_value_check_on_write(check);
        for code in &mut self.transducer_beam_steering {
            code.set_value_check_on_write(check);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, ValueViolation};
    use rstest::rstest;
    use std::rc::Rc;

    fn code(value: &str, meaning: &str) -> CodeSequenceMacro {
        CodeSequenceMacro::with_code(value, "DCM", meaning).unwrap()
    }

    fn complete_module() -> EnhancedUsImageModule {
        let mut us = EnhancedUsImageModule::new();
        us.set_image_type(PixelDataCharacteristics::Original, "VOLUME", "NONE", true)
            .unwrap();
        us.set_rows(480, true).unwrap();
        us.set_columns(640, true).unwrap();
        us.set_bits_allocated(8, true).unwrap();
        us.set_bits_stored(8, true).unwrap();
        us.set_high_bit(7, true).unwrap();
        us.set_dimension_organization_type("3D", true).unwrap();
        us.set_acquisition_date_time("20240105101500", true).unwrap();
        us.set_acquisition_duration(2.5, true).unwrap();
        us.set_pixel_spacing(0.2, 0.2, true).unwrap();
        us.set_lossy_image_compression("00", true).unwrap();
        us.set_mechanical_index(0.7, true).unwrap();
        us.set_bone_thermal_index(0.1, true).unwrap();
        us.set_cranial_thermal_index(0.2, true).unwrap();
        us.set_soft_tissue_thermal_index(0.3, true).unwrap();
        us.set_depths_of_focus(&[40.0, 60.0], true).unwrap();
        us.set_depth_of_scan_field(120, true).unwrap();
        us.set_transducer_scan_pattern(code("125241", "Helical scan pattern"));
        us.set_transducer_geometry(code("125252", "Linear ultrasound transducer geometry"));
        us.set_transducer_application(code("125261", "External Transducer"));
        us.add_transducer_beam_steering(code("125258", "Fixed beam direction"))
            .unwrap();
        us.view()
            .set_view("G-A19B", "SRT", "Apical four chamber", true)
            .unwrap();
        us.anatomy()
            .set_anatomic_region("T-32000", "SRT", "Heart", true)
            .unwrap();
        us
    }

    #[test]
    fn fixed_values_are_invented() {
        let mut us = complete_module();
        assert_eq!(us.samples_per_pixel(), None);
        let mut out = DataSet::new_empty();
        us.write(&mut out).unwrap();
        assert_eq!(out.uint16(tags::SAMPLES_PER_PIXEL, 0), Some(1));
        assert_eq!(out.uint16(tags::PIXEL_REPRESENTATION, 0), Some(0));
        assert_eq!(
            out.string(tags::PHOTOMETRIC_INTERPRETATION).as_deref(),
            Some("MONOCHROME2")
        );
        assert_eq!(out.string(tags::PRESENTATION_LUT_SHAPE).as_deref(), Some("IDENTITY"));
        assert_eq!(out.string(tags::BURNED_IN_ANNOTATION).as_deref(), Some("NO"));
        assert_eq!(us.samples_per_pixel(), Some(1));
        assert_eq!(us.rows(), Some(480));
    }

    #[rstest]
    #[case(tags::ROWS, 0, false)]
    #[case(tags::ROWS, 480, true)]
    #[case(tags::BITS_ALLOCATED, 12, false)]
    #[case(tags::BITS_ALLOCATED, 16, true)]
    #[case(tags::BITS_STORED, 8, true)]
    #[case(tags::HIGH_BIT, 8, false)]
    #[case(tags::HIGH_BIT, 15, true)]
    fn pixel_attributes_take_permitted_values(
        #[case] tag: Tag,
        #[case] value: u16,
        #[case] ok: bool,
    ) {
        let us = EnhancedUsImageModule::new();
        let outcome = match tag {
            tags::ROWS => us.set_rows(value, true),
            tags::BITS_ALLOCATED => us.set_bits_allocated(value, true),
            tags::BITS_STORED => us.set_bits_stored(value, true),
            _ => us.set_high_bit(value, true),
        };
        assert_eq!(outcome.is_ok(), ok);
        if !ok {
            assert!(matches!(
                outcome,
                Err(Error::InvalidElementValue {
                    tag: t,
                    source: ValueViolation::NotPermitted,
                }) if t == tag
            ));
        }
        // unchecked values are kept as given
        let unchecked = match tag {
            tags::ROWS => us.set_rows(value, false),
            tags::BITS_ALLOCATED => us.set_bits_allocated(value, false),
            tags::BITS_STORED => us.set_bits_stored(value, false),
            _ => us.set_high_bit(value, false),
        };
        assert_eq!(unchecked, Ok(()));
        assert_eq!(us.component().data().uint16(tag, 0), Some(value));
    }

    #[rstest]
    #[case("3D", true)]
    #[case("3D_TEMPORAL", true)]
    #[case("TILED_FULL", false)]
    fn dimension_organization_is_three_dimensional(#[case] value: &str, #[case] ok: bool) {
        let us = EnhancedUsImageModule::new();
        assert_eq!(us.set_dimension_organization_type(value, true).is_ok(), ok);
    }

    #[test]
    fn restricted_code_strings() {
        let us = EnhancedUsImageModule::new();
        assert!(us.set_position_measuring_device_used("ROBOTIC", true).is_err());
        us.set_position_measuring_device_used("FREEHAND", true)
            .unwrap();
        assert!(us.set_lossy_image_compression("02", true).is_err());
        assert!(us.set_recognizable_visual_features("MAYBE", true).is_err());
        us.set_recognizable_visual_features("YES", true).unwrap();
        assert_eq!(us.recognizable_visual_features().as_deref(), Some("YES"));
    }

    #[test]
    fn image_type_has_four_values() {
        let us = EnhancedUsImageModule::new();
        us.set_image_type(PixelDataCharacteristics::Derived, "VOLUME", "FILTERED", true)
            .unwrap();
        assert_eq!(
            us.image_type(),
            vec!["DERIVED", "PRIMARY", "VOLUME", "FILTERED"]
        );
    }

    #[test]
    fn missing_transducer_codes_fail() {
        let mut us = complete_module();
        assert_eq!(us.check(true), Ok(()));
        us.set_transducer_geometry(CodeSequenceMacro::new());
        assert!(matches!(
            us.check(true),
            Err(Error::MissingAttribute { tag, .. }) if tag == tags::TRANSDUCER_GEOMETRY_CODE_SEQUENCE
        ));
        let mut out = DataSet::new_empty();
        assert!(us.write(&mut out).is_err());
        // everything else is still written
        assert!(out.contains(tags::TRANSDUCER_SCAN_PATTERN_CODE_SEQUENCE));
        assert!(out.contains(tags::ANATOMIC_REGION_SEQUENCE));
        assert!(!out.contains(tags::TRANSDUCER_GEOMETRY_CODE_SEQUENCE));
    }

    #[test]
    fn enhanced_us_round_trip() {
        let mut us = complete_module();
        us.view()
            .set_slice_progression_direction("APEX_TO_BASE", true)
            .unwrap();
        let mut out = DataSet::new_empty();
        us.write(&mut out).unwrap();
        assert_eq!(
            out.sequence_items(tags::TRANSDUCER_BEAM_STEERING_CODE_SEQUENCE)
                .map(|items| items.len()),
            Some(1)
        );

        let mut read = EnhancedUsImageModule::new();
        read.read(&out, true).unwrap();
        assert_eq!(read.check(true), Ok(()));
        assert_eq!(read.depths_of_focus(), Some(vec![40.0, 60.0]));
        assert_eq!(read.depth_of_scan_field(), Some(120));
        assert_eq!(read.pixel_spacing(), Some(vec![0.2, 0.2]));
        assert_eq!(
            read.view().view().code().code_value().as_deref(),
            Some("G-A19B")
        );
        assert_eq!(
            read.view().slice_progression_direction().as_deref(),
            Some("APEX_TO_BASE")
        );
        assert_eq!(
            read.anatomy()
                .anatomic_region()
                .code()
                .code_meaning()
                .as_deref(),
            Some("Heart")
        );
        assert_eq!(
            read.transducer_geometry().code_value().as_deref(),
            Some("125252")
        );
    }

    #[test]
    fn clone_shares_one_data_set_between_the_parts() {
        let us = complete_module();
        let copy = us.clone();
        drop(us);
        let data = copy.component().shared_data();
        assert!(Rc::ptr_eq(&copy.view().component().shared_data(), &data));
        assert!(Rc::ptr_eq(&copy.anatomy().component().shared_data(), &data));
        copy.view()
            .set_slice_progression_direction("BASE_TO_APEX", true)
            .unwrap();
        assert_eq!(
            copy.component()
                .string(tags::SLICE_PROGRESSION_DIRECTION)
                .as_deref(),
            Some("BASE_TO_APEX")
        );
        assert!(copy.transducer_scan_pattern().component().parent().is_some());
        assert_eq!(copy.transducer_beam_steering().len(), 1);
    }
}
