#![allow(clippy::derive_partial_eq_without_eq)]
//! This crate implements a rule-driven engine for DICOM
//! Information Object Definitions (IODs).
//!
//! Each standard attribute of an attribute group (a _module_ or a _macro_)
//! is described by a [`Rule`]:
//! its tag, value representation, value multiplicity,
//! requirement type (1, 1C, 2, 2C or 3),
//! owning group and an optional default value.
//! Rules are collected in a [`RuleSet`],
//! which may be shared by many components.
//!
//! A [`Component`] holds a reference-counted handle to an in-memory
//! [`DataSet`] and to a rule set,
//! and implements the generic operations of reading attributes from
//! another data set, writing them out, validating, clearing and comparing
//! against the rules which name that component.
//! Concrete modules and macros
//! (see the [`modules`] and [`macros`] modules)
//! are thin typed layers over a component.
//! [`IodCommon`] bundles the modules shared by all composite IODs,
//! all viewing one common data set.
//!
//! # Example
//!
//! ```
//! use dicom_dictionary_std::tags;
//! use dicom_iod::{DataSet, DataSetExt, IodComponent};
//! use dicom_iod::modules::PatientModule;
//!
//! let mut source = DataSet::new_empty();
//! source.put_str(tags::PATIENT_NAME, dicom_core::VR::PN, "Doe^John");
//! source.put_str(tags::PATIENT_ID, dicom_core::VR::LO, "12345");
//!
//! let mut patient = PatientModule::new();
//! patient.read(&source, true)?;
//! assert_eq!(patient.patient_name().as_deref(), Some("Doe^John"));
//!
//! let mut out = DataSet::new_empty();
//! patient.write(&mut out)?;
//! assert_eq!(out.string(tags::PATIENT_ID).as_deref(), Some("12345"));
//! # Result::<(), dicom_iod::Error>::Ok(())
//! ```
use dicom_core::Tag;
use snafu::Snafu;

pub mod check;
pub mod component;
pub mod dataset;
pub mod iod;
pub mod macros;
pub mod modules;
pub mod options;
pub mod rules;
pub mod util;

pub use crate::check::{Multiplicity, ValueViolation};
pub use crate::component::{Component, IodComponent};
pub use crate::dataset::{DataSet, DataSetExt, Element, ItemIndex};
pub use crate::iod::{HierarchyImport, IodCommon};
pub use crate::options::IodOptions;
pub use crate::rules::{Level, Requirement, Rule, RuleSet};

/// An error occurring while reading, writing or validating
/// the attributes of an IOD component.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// A type 1 or type 2 attribute is not present.
    #[snafu(display("{} absent in {} (type {})", tag, module, requirement))]
    MissingAttribute {
        tag: Tag,
        module: String,
        requirement: Requirement,
    },
    /// A type 1 or type 1C attribute is present but empty.
    #[snafu(display("{} empty in {} (type {})", tag, module, requirement))]
    MissingValue {
        tag: Tag,
        module: String,
        requirement: Requirement,
    },
    #[snafu(display("{} contains invalid character(s) in {}", tag, module))]
    InvalidCharacter { tag: Tag, module: String },
    #[snafu(display("{} violates VR definition in {}", tag, module))]
    RepresentationViolated { tag: Tag, module: String },
    #[snafu(display("{} VM ({}) != {} in {}", tag, found, vm, module))]
    MultiplicityViolated {
        tag: Tag,
        module: String,
        vm: String,
        found: u32,
    },
    #[snafu(display("{} violates maximum VR length in {}", tag, module))]
    MaximumLengthViolated { tag: Tag, module: String },
    #[snafu(display("Internal error while checking value of {} in {}", tag, module))]
    InternalValidation { tag: Tag, module: String },
    /// No rule is declared for the given attribute.
    #[snafu(display("No rule for attribute {}", tag))]
    NoSuchRule { tag: Tag },
    #[snafu(display("Invalid color palette: {}", message))]
    InvalidColorPalette { message: String },
    /// A value given to a setter does not fit the attribute.
    #[snafu(display("Invalid value for {}: {}", tag, source))]
    InvalidElementValue { tag: Tag, source: ValueViolation },
    #[snafu(display("Invalid dimensions: {}", errors.join("; ")))]
    InvalidDimensions { errors: Vec<String> },
    #[snafu(display("No value found for {}", tag))]
    ValueNotFound { tag: Tag },
    #[snafu(display("Invalid unique identifier `{}`", uid))]
    InvalidUid { uid: String },
    /// A module given to an IOD does not view the IOD's data set and rules.
    #[snafu(display("Module {} does not share the data set and rules of the IOD", module))]
    UnsharedModule { module: String },
    #[snafu(display("Module {} is already part of the IOD", module))]
    DuplicateModule { module: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether this error reports a failed attribute check
    /// (as opposed to a usage error).
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Error::MissingAttribute { .. }
                | Error::MissingValue { .. }
                | Error::InvalidCharacter { .. }
                | Error::RepresentationViolated { .. }
                | Error::MultiplicityViolated { .. }
                | Error::MaximumLengthViolated { .. }
                | Error::InternalValidation { .. }
        )
    }
}
