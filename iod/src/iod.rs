//! The modules common to all composite IODs, bundled over one data set.
use std::cell::Ref;
use std::fmt;
use std::rc::Rc;

use dicom_core::Tag;
use dicom_dictionary_std::tags;
use snafu::ensure;
use tracing::{debug, warn};

use crate::component::{Component, IodComponent, SharedDataSet, SharedRules};
use crate::dataset::{DataSet, DataSetExt};
use crate::modules::sop_common::ensure_uid;
use crate::modules::{
    CommonInstanceReferenceModule, FrameOfReferenceModule, GeneralEquipmentModule,
    GeneralSeriesModule, GeneralStudyModule, PatientModule, PatientStudyModule, SopCommonModule,
};
use crate::options::IodOptions;
use crate::{DuplicateModuleSnafu, Result, UnsharedModuleSnafu};

/// Which parts of the patient/study/series hierarchy
/// to take over from another data set.
///
/// See [`IodCommon::import_hierarchy`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyImport {
    patient: bool,
    study: bool,
    equipment: bool,
    series: bool,
    frame_of_reference: bool,
    sop_common: bool,
}

impl HierarchyImport {
    /// Import nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Import patient, study, equipment, series and frame of reference,
    /// but not the SOP Common attributes.
    pub fn hierarchy() -> Self {
        HierarchyImport {
            patient: true,
            study: true,
            equipment: true,
            series: true,
            frame_of_reference: true,
            sop_common: false,
        }
    }

    /// The Patient Module.
    pub fn patient(mut self, import: bool) -> Self {
        self.patient = import;
        self
    }

    /// The General Study and Patient Study Modules.
    pub fn study(mut self, import: bool) -> Self {
        self.study = import;
        self
    }

    pub fn equipment(mut self, import: bool) -> Self {
        self.equipment = import;
        self
    }

    pub fn series(mut self, import: bool) -> Self {
        self.series = import;
        self
    }

    pub fn frame_of_reference(mut self, import: bool) -> Self {
        self.frame_of_reference = import;
        self
    }

    /// The SOP Common Module, including the SOP instance identification.
    pub fn sop_common(mut self, import: bool) -> Self {
        self.sop_common = import;
        self
    }
}

/// The modules shared by all composite IODs.
///
/// All modules view one common data set and rule set.
/// They are read and written in a fixed order:
/// SOP Common, Patient, Patient Study, General Study, General Equipment,
/// General Series, Frame of Reference and Common Instance Reference,
/// followed by any modules registered with [`add_module`](IodCommon::add_module).
///
/// New study, series and SOP instance UIDs are generated on construction.
///
/// # Example
///
/// ```
/// use dicom_iod::{DataSet, DataSetExt, IodCommon};
/// use dicom_iod::modules::GeneralImageModule;
///
/// let mut iod = IodCommon::new();
/// iod.sop_common().set_sop_class_uid("1.2.840.10008.5.1.4.1.1.7", true)?;
/// iod.general_series().set_modality("OT", true)?;
/// iod.add_module(Box::new(GeneralImageModule::new_shared(
///     iod.shared_data(),
///     iod.shared_rules(),
/// )))?;
///
/// let mut out = DataSet::new_empty();
/// iod.write(&mut out)?;
/// assert!(out.string(dicom_dictionary_std::tags::STUDY_INSTANCE_UID).is_some());
/// # Result::<(), dicom_iod::Error>::Ok(())
/// ```
pub struct IodCommon {
    data: SharedDataSet,
    rules: SharedRules,
    options: IodOptions,
    sop_common: SopCommonModule,
    patient: PatientModule,
    patient_study: PatientStudyModule,
    general_study: GeneralStudyModule,
    general_equipment: GeneralEquipmentModule,
    general_series: GeneralSeriesModule,
    frame_of_reference: FrameOfReferenceModule,
    common_instance_reference: CommonInstanceReferenceModule,
    additional: Vec<Box<dyn IodComponent>>,
}

impl fmt::Debug for IodCommon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modules: Vec<&str> = self.modules().iter().map(|m| m.name()).collect();
        f.debug_struct("IodCommon")
            .field("data", &self.data.borrow())
            .field("options", &self.options)
            .field("modules", &modules)
            .finish()
    }
}

impl Default for IodCommon {
    fn default() -> Self {
        Self::new()
    }
}

impl IodCommon {
    pub fn new() -> Self {
        Self::with_options(IodOptions::default())
    }

    pub fn with_options(options: IodOptions) -> Self {
        let data = crate::component::new_shared_data();
        let rules = SharedRules::default();
        let mut iod = IodCommon {
            sop_common: SopCommonModule::new_shared(Rc::clone(&data), Rc::clone(&rules)),
            patient: PatientModule::new_shared(Rc::clone(&data), Rc::clone(&rules)),
            patient_study: PatientStudyModule::new_shared(Rc::clone(&data), Rc::clone(&rules)),
            general_study: GeneralStudyModule::new_shared(Rc::clone(&data), Rc::clone(&rules)),
            general_equipment: GeneralEquipmentModule::new_shared(
                Rc::clone(&data),
                Rc::clone(&rules),
            ),
            general_series: GeneralSeriesModule::new_shared(Rc::clone(&data), Rc::clone(&rules)),
            frame_of_reference: FrameOfReferenceModule::new_shared(
                Rc::clone(&data),
                Rc::clone(&rules),
            ),
            common_instance_reference: CommonInstanceReferenceModule::new_shared(
                Rc::clone(&data),
                Rc::clone(&rules),
            ),
            additional: Vec::new(),
            data,
            rules,
            options,
        };
        iod.set_value_check_on_write(iod.options.checks_values_on_write());
        iod.create_new_study(true);
        iod
    }

    pub fn options(&self) -> &IodOptions {
        &self.options
    }

    /// The data set viewed by all modules.
    pub fn data(&self) -> Ref<'_, DataSet> {
        self.data.borrow()
    }

    /// A handle to the data set viewed by all modules,
    /// for creating further modules with `new_shared`.
    pub fn shared_data(&self) -> SharedDataSet {
        Rc::clone(&self.data)
    }

    /// A handle to the rule set of all modules,
    /// for creating further modules with `new_shared`.
    pub fn shared_rules(&self) -> SharedRules {
        Rc::clone(&self.rules)
    }

    /// Register a further module, to be read and written
    /// after the common modules.
    ///
    /// The module must have been created
    /// with the data set and rule set of this IOD
    /// and no module of the same name may already be present.
    pub fn add_module(&mut self, mut module: Box<dyn IodComponent>) -> Result<()> {
        let component = module.component();
        ensure!(
            Rc::ptr_eq(&component.shared_data(), &self.data)
                && Rc::ptr_eq(&component.shared_rules(), &self.rules),
            UnsharedModuleSnafu {
                module: component.name()
            }
        );
        ensure!(
            self.module(component.name()).is_none(),
            DuplicateModuleSnafu {
                module: component.name()
            }
        );
        debug!("Adding module {} to IOD", component.name());
        module.set_value_check_on_write(self.options.checks_values_on_write());
        self.additional.push(module);
        Ok(())
    }

    /// Look up a module by name.
    pub fn module(&self, name: &str) -> Option<&dyn IodComponent> {
        self.modules().into_iter().find(|m| m.name() == name)
    }

    pub fn module_mut(&mut self, name: &str) -> Option<&mut (dyn IodComponent + 'static)> {
        self.modules_mut().into_iter().find(|m| m.name() == name)
    }

    /// All modules in reading and writing order.
    pub fn modules(&self) -> Vec<&dyn IodComponent> {
        let mut modules: Vec<&dyn IodComponent> = vec![
            &self.sop_common,
            &self.patient,
            &self.patient_study,
            &self.general_study,
            &self.general_equipment,
            &self.general_series,
            &self.frame_of_reference,
            &self.common_instance_reference,
        ];
        modules.extend(self.additional.iter().map(|m| m.as_ref()));
        modules
    }

    fn modules_mut(&mut self) -> Vec<&mut (dyn IodComponent + 'static)> {
        let mut modules: Vec<&mut (dyn IodComponent + 'static)> = vec![
            &mut self.sop_common,
            &mut self.patient,
            &mut self.patient_study,
            &mut self.general_study,
            &mut self.general_equipment,
            &mut self.general_series,
            &mut self.frame_of_reference,
            &mut self.common_instance_reference,
        ];
        modules.extend(self.additional.iter_mut().map(|m| m.as_mut()));
        modules
    }

    /// Replace the data of all modules by the attributes read from `source`.
    ///
    /// Reading is best effort: problems are logged and reading goes on.
    pub fn read(&mut self, source: &DataSet) -> Result<()> {
        self.clear_data();
        for module in self.modules_mut() {
            if let Err(e) = module.read(source, false) {
                warn!("Could not read module {}: {}", module.name(), e);
            }
        }
        Ok(())
    }

    /// Write all modules to `destination`,
    /// stopping at the first module failing to be written.
    pub fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        for module in self.modules_mut() {
            module.write(destination).map_err(|e| {
                warn!("Could not write module {}: {}", module.name(), e);
                e
            })?;
        }
        Ok(())
    }

    /// Check all modules, returning the first failure.
    pub fn check(&self, quiet: bool) -> Result<()> {
        self.modules().iter().try_for_each(|m| m.check(quiet))
    }

    pub fn clear_data(&mut self) {
        for module in self.modules_mut() {
            module.clear_data();
        }
    }

    /// Enable or disable validation of values when writing, for all modules.
    pub fn set_value_check_on_write(&mut self, check: bool) {
        self.options = self.options.clone().value_check_on_write(check);
        for module in self.modules_mut() {
            module.set_value_check_on_write(check);
        }
    }

    /// Make sure there are study, series and SOP instance UIDs
    /// (in that order), creating those missing or,
    /// if `correct_invalid` is set, those not being valid UIDs.
    ///
    /// Returns whether any UID was created.
    pub fn ensure_instance_uids(&mut self, correct_invalid: bool) -> bool {
        let root = self.options.root();
        let study = ensure_uid(
            self.general_study.component(),
            tags::STUDY_INSTANCE_UID,
            correct_invalid,
            root,
        );
        let series = ensure_uid(
            self.general_series.component(),
            tags::SERIES_INSTANCE_UID,
            correct_invalid,
            root,
        );
        let instance = self.sop_common.ensure_instance_uid(correct_invalid, root);
        study || series || instance
    }

    /// Start a new study: clear study related data
    /// (and equipment data if `clear_equipment` is set),
    /// create a new study UID and continue with a new series.
    pub fn create_new_study(&mut self, clear_equipment: bool) {
        self.general_study.clear_data();
        self.patient_study.clear_data();
        if clear_equipment {
            self.general_equipment.clear_data();
        }
        self.renew_uid(self.general_study.component(), tags::STUDY_INSTANCE_UID);
        self.create_new_series(true);
    }

    /// Start a new series: clear series data
    /// (and start a new frame of reference if `clear_frame_of_reference` is set),
    /// create a new series UID and continue with a new SOP instance.
    pub fn create_new_series(&mut self, clear_frame_of_reference: bool) {
        self.general_series.clear_data();
        if clear_frame_of_reference {
            self.frame_of_reference.clear_data();
            self.renew_uid(
                self.frame_of_reference.component(),
                tags::FRAME_OF_REFERENCE_UID,
            );
        }
        self.renew_uid(self.general_series.component(), tags::SERIES_INSTANCE_UID);
        self.create_new_sop_instance();
    }

    /// Start a new SOP instance: clear the SOP Common data,
    /// except for the SOP Class UID, and create a new SOP instance UID.
    pub fn create_new_sop_instance(&mut self) {
        let sop_class = self.sop_common.sop_class_uid();
        self.sop_common.clear_data();
        if let Some(class) = sop_class {
            if let Err(e) = self.sop_common.set_sop_class_uid(&class, false) {
                warn!("Could not keep SOP Class UID: {}", e);
            }
        }
        self.renew_uid(self.sop_common.component(), tags::SOP_INSTANCE_UID);
    }

    fn renew_uid(&self, component: &Component, tag: Tag) {
        let uid = self.options.new_uid();
        debug!("Creating new UID {} for {}", uid, tag);
        if let Err(e) = component.set_string(tag, &uid, false) {
            warn!("Could not set new UID for {}: {}", tag, e);
        }
    }

    /// Take over parts of the patient/study/series hierarchy from `source`,
    /// replacing the corresponding data of this IOD.
    pub fn import_hierarchy(&mut self, source: &DataSet, import: HierarchyImport) -> Result<()> {
        if import.series && !import.study {
            warn!("Importing series without its study, UIDs may not match the hierarchy");
        }
        if import.patient {
            self.patient.read(source, true)?;
        }
        if import.study {
            self.patient_study.read(source, true)?;
            self.general_study.read(source, true)?;
        }
        if import.equipment {
            self.general_equipment.read(source, true)?;
        }
        if import.series {
            self.general_series.read(source, true)?;
        }
        if import.frame_of_reference {
            self.frame_of_reference.read(source, true)?;
        }
        if import.sop_common {
            self.sop_common.read(source, true)?;
        }
        Ok(())
    }

    pub fn sop_common(&self) -> &SopCommonModule {
        &self.sop_common
    }

    pub fn sop_common_mut(&mut self) -> &mut SopCommonModule {
        &mut self.sop_common
    }

    pub fn patient(&self) -> &PatientModule {
        &self.patient
    }

    pub fn patient_mut(&mut self) -> &mut PatientModule {
        &mut self.patient
    }

    pub fn patient_study(&self) -> &PatientStudyModule {
        &self.patient_study
    }

    pub fn patient_study_mut(&mut self) -> &mut PatientStudyModule {
        &mut self.patient_study
    }

    pub fn general_study(&self) -> &GeneralStudyModule {
        &self.general_study
    }

    pub fn general_study_mut(&mut self) -> &mut GeneralStudyModule {
        &mut self.general_study
    }

    pub fn general_equipment(&self) -> &GeneralEquipmentModule {
        &self.general_equipment
    }

    pub fn general_equipment_mut(&mut self) -> &mut GeneralEquipmentModule {
        &mut self.general_equipment
    }

    pub fn general_series(&self) -> &GeneralSeriesModule {
        &self.general_series
    }

    pub fn general_series_mut(&mut self) -> &mut GeneralSeriesModule {
        &mut self.general_series
    }

    pub fn frame_of_reference(&self) -> &FrameOfReferenceModule {
        &self.frame_of_reference
    }

    pub fn frame_of_reference_mut(&mut self) -> &mut FrameOfReferenceModule {
        &mut self.frame_of_reference
    }

    pub fn common_instance_reference(&self) -> &CommonInstanceReferenceModule {
        &self.common_instance_reference
    }

    pub fn common_instance_reference_mut(&mut self) -> &mut CommonInstanceReferenceModule {
        &mut self.common_instance_reference
    }
}
