//! Macros: attribute groups reused inside modules,
//! typically as the items of a sequence attribute.
mod algorithm;
mod anatomy;
mod code;
mod content_identification;
mod content_item;
mod hl7;
pub(crate) mod reference;
mod view;

pub use algorithm::AlgorithmIdentificationMacro;
pub use anatomy::{GeneralAnatomyMacro, PrimaryAnatomicStructureItem, PrimaryAnatomicStructureMacro};
pub use code::{CodeSequenceMacro, CodeWithModifiers};
pub use content_identification::{AlternateContentDescriptionItem, ContentIdentificationMacro};
pub use content_item::{ContentItemMacro, ContentValue, NumericValue, ValueType};
pub use hl7::Hl7HierarchicDesignatorMacro;
pub use reference::{
    ImageSopInstanceReferenceMacro, ReferencedSeriesItem, SeriesAndInstanceReferenceMacro,
    SopInstanceReferenceMacro,
};
pub use view::{MandatoryViewAndSliceProgressionDirectionMacro, SLICE_PROGRESSION_DIRECTIONS};
