//! The HL7 v2 Hierarchic Designator Macro.
use dicom_core::VR;
use dicom_dictionary_std::tags;
use tracing::warn;

use crate::component::{Component, IodComponent, SharedDataSet, SharedRules};
use crate::rules::Level;
use crate::rules::Requirement::ConditionalMandatory;
use crate::{MissingAttributeSnafu, Result};

/// Identification of an issuing entity,
/// by local namespace and/or by universal entity ID and its type.
#[derive(Debug, Clone)]
pub struct Hl7HierarchicDesignatorMacro {
    component: Component,
}

impl Hl7HierarchicDesignatorMacro {
    pub const NAME: &'static str = "HL7HierarchicDesignatorMacro";

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    pub fn new_shared(data: SharedDataSet, rules: SharedRules) -> Self {
        Self::from_component(Component::new_shared(Self::NAME, data, rules))
    }

    fn from_component(component: Component) -> Self {
        let mut macro_ = Hl7HierarchicDesignatorMacro { component };
        macro_.reset_rules();
        macro_
    }

    pub fn local_namespace_entity_id(&self) -> Option<String> {
        self.component.string(tags::LOCAL_NAMESPACE_ENTITY_ID)
    }

    pub fn universal_entity_id(&self) -> Option<String> {
        self.component.string(tags::UNIVERSAL_ENTITY_ID)
    }

    pub fn universal_entity_id_type(&self) -> Option<String> {
        self.component.string(tags::UNIVERSAL_ENTITY_ID_TYPE)
    }

    pub fn set_local_namespace_entity_id(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::LOCAL_NAMESPACE_ENTITY_ID, value, check)
    }

    pub fn set_universal_entity_id(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::UNIVERSAL_ENTITY_ID, value, check)
    }

    /// Set the type of the universal entity ID (e.g. `ISO`, `DNS`, `UUID`).
    pub fn set_universal_entity_id_type(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::UNIVERSAL_ENTITY_ID_TYPE, value, check)
    }
}

impl Default for Hl7HierarchicDesignatorMacro {
    fn default() -> Self {
        Self::new()
    }
}

impl IodComponent for Hl7HierarchicDesignatorMacro {
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
                (tags::LOCAL_NAMESPACE_ENTITY_ID, VR::UT, "1", ConditionalMandatory),
                (tags::UNIVERSAL_ENTITY_ID, VR::UT, "1", ConditionalMandatory),
                (tags::UNIVERSAL_ENTITY_ID_TYPE, VR::CS, "1", ConditionalMandatory),
            ],
        );
    }

    /// Besides the rules, the universal entity ID and its type
    /// must come together.
    fn check(&self, quiet: bool) -> Result<()> {
        self.component.check(quiet)?;
        let id = self.universal_entity_id();
        let id_type = self.universal_entity_id_type();
        let (missing, requirement) = match (&id, &id_type) {
            (Some(_), None) => (tags::UNIVERSAL_ENTITY_ID_TYPE, ConditionalMandatory),
            (None, Some(_)) => (tags::UNIVERSAL_ENTITY_ID, ConditionalMandatory),
            _ => return Ok(()),
        };
        let e = MissingAttributeSnafu {
            tag: missing,
            module: Self::NAME,
            requirement,
        }
        .build();
        if !quiet {
            warn!("{}", e);
        }
        Err(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DataSet, DataSetExt};
    use crate::Error;

    #[test]
    fn universal_id_needs_its_type() {
        let mut hl7 = Hl7HierarchicDesignatorMacro::new();
        hl7.set_local_namespace_entity_id("HOSPITAL_A", true).unwrap();
        assert_eq!(hl7.check(true), Ok(()));

        hl7.set_universal_entity_id("1.2.826.0.1.3680043.9.7433", true)
            .unwrap();
        assert!(matches!(
            hl7.check(true),
            Err(Error::MissingAttribute { tag, .. }) if tag == tags::UNIVERSAL_ENTITY_ID_TYPE
        ));
        hl7.set_universal_entity_id_type("ISO", true).unwrap();
        assert_eq!(hl7.check(true), Ok(()));
        assert!(hl7.set_universal_entity_id_type("iso", true).is_err());

        let mut item = DataSet::new_empty();
        hl7.write(&mut item).unwrap();
        assert_eq!(item.len(), 3);
        assert_eq!(item.string(tags::UNIVERSAL_ENTITY_ID_TYPE).as_deref(), Some("ISO"));
    }
}
