//! Helpers shared by modules and macros:
//! reading and writing nested sequences of sub-components,
//! unique identifier generation and other small utilities.
use dicom_core::Tag;
use dicom_dictionary_std::tags;
use snafu::{OptionExt, ResultExt};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::check::check_multiplicity;
use crate::component::{Component, IodComponent};
use crate::dataset::{DataSet, DataSetExt};
use crate::rules::{Requirement, Rule};
use crate::{
    InvalidElementValueSnafu, InvalidUidSnafu, NoSuchRuleSnafu, Result, ValueNotFoundSnafu,
    ValueViolation,
};

/// The maximum number of frames of a multi-frame instance.
pub const MAX_FRAMES: u16 = u16::MAX;

fn rule_for(parent: &Component, tag: Tag) -> Result<Rule> {
    parent.rule(tag).with_context(|| {
        debug!("Will not handle sequence {}: no rule declared", tag);
        NoSuchRuleSnafu { tag }
    })
}

/// Validate the sequence attribute `rule` describes in `data`.
pub fn check_sub_sequence(data: &DataSet, rule: &Rule) -> Result<()> {
    rule.validate(data.find(rule.tag())).map_err(|e| {
        warn!("{}", e);
        e
    })
}

/// Validate a sequence rule against the number of items
/// currently held by sub-components.
pub fn check_item_count(rule: &Rule, count: usize) -> Result<()> {
    if count == 0 {
        return rule.validate(None);
    }
    check_multiplicity(count as u32, rule.vm()).map_err(|v| rule.violation_error(v))
}

/// Fail for `tag` unless the value about to be set is `permitted`,
/// as when an attribute only takes a few defined terms.
pub fn ensure_permitted(tag: Tag, permitted: bool) -> Result<()> {
    if permitted {
        return Ok(());
    }
    warn!("Value not permitted for {}", tag);
    Err(ValueViolation::NotPermitted).context(InvalidElementValueSnafu { tag })
}

/// Read every item of the sequence `tag` of `source`
/// into a new sub-component, replacing the contents of `destination`.
///
/// Problems with the sequence are logged.
/// Items that cannot be read are skipped.
pub fn read_sub_sequence<T>(
    source: &DataSet,
    tag: Tag,
    destination: &mut Vec<T>,
    parent: &Component,
) -> Result<()>
where
    T: IodComponent + Default,
{
    let rule = rule_for(parent, tag)?;
    destination.clear();
    let _ = check_sub_sequence(source, &rule);
    let items = match source.sequence_items(tag) {
        Some(items) => items,
        None => return Ok(()),
    };
    for (i, item) in items.iter().enumerate() {
        let mut child = T::default();
        child.component_mut().set_parent(Some(parent));
        match child.read(item, false) {
            Ok(()) => destination.push(child),
            Err(e) => warn!("Could not read item #{} from {} (skipping item): {}", i, tag, e),
        }
    }
    Ok(())
}

/// Write the given sub-components as the items of sequence `tag`
/// in `destination`, replacing any previous sequence.
///
/// Items failing to be written are left out.
/// On failure the whole sequence is removed again
/// and the first error is returned.
pub fn write_sub_sequence<T>(
    tag: Tag,
    items: &mut [T],
    parent: &Component,
    destination: &mut DataSet,
) -> Result<()>
where
    T: IodComponent,
{
    let rule = rule_for(parent, tag)?;
    destination.delete(tag);

    let mut result = Ok(());
    if !items.is_empty() {
        let mut written = Vec::with_capacity(items.len());
        for (i, item) in items.iter_mut().enumerate() {
            let mut out = DataSet::new_empty();
            match item.write(&mut out) {
                Ok(()) => written.push(out),
                Err(e) => {
                    warn!("Could not write item #{} of {}: {}", i, tag, e);
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }
        destination.put_sequence(tag, written);
    } else if rule.requirement() == Requirement::MandatoryCanBeEmpty {
        destination.put_sequence(tag, Vec::new());
    }

    if result.is_ok() {
        result = check_sub_sequence(destination, &rule);
    }
    if result.is_err() {
        destination.delete(tag);
    }
    result
}

/// Read the first item of sequence `tag` of `source` into `destination`.
pub fn read_single_item<T>(
    source: &DataSet,
    tag: Tag,
    destination: &mut T,
    parent: &Component,
) -> Result<()>
where
    T: IodComponent,
{
    let rule = rule_for(parent, tag)?;
    let _ = check_sub_sequence(source, &rule);
    let items = match source.sequence_items(tag) {
        Some(items) => items,
        None => return Ok(()),
    };
    if items.len() > 1 {
        warn!(
            "Only single item allowed in {}, ignoring {} other items",
            tag,
            items.len() - 1
        );
    }
    match items.first() {
        Some(item) => destination.read(item, true),
        None => Ok(()),
    }
}

/// Write `source` as the single item of sequence `tag` in `destination`.
///
/// Nothing is written unless the sub-component passes its check,
/// and an item without attributes is not kept.
pub fn write_single_item<T>(
    tag: Tag,
    source: &mut T,
    parent: &Component,
    destination: &mut DataSet,
) -> Result<()>
where
    T: IodComponent,
{
    let rule = rule_for(parent, tag)?;
    destination.delete(tag);

    if source.check(true).is_ok() {
        let mut item = DataSet::new_empty();
        source.write(&mut item)?;
        if !item.is_empty() {
            destination.put_sequence(tag, vec![item]);
        }
    } else if rule.requirement() == Requirement::MandatoryCanBeEmpty {
        destination.put_sequence(tag, Vec::new());
    } else if rule.requirement() == Requirement::ConditionalMandatory {
        trace!(
            "Skipping type 1C sequence {}: no data or incomplete data available",
            tag
        );
    }
    check_sub_sequence(destination, &rule)
}

/// Copy the element `rule` describes from `source` into `destination`,
/// validating it on the way.
///
/// The element is copied even if it fails validation;
/// the failure is logged and returned.
pub fn get_and_check_element(source: &DataSet, rule: &Rule, destination: &mut DataSet) -> Result<()> {
    let element = source.find(rule.tag());
    let outcome = rule.validate(element);
    if let Some(element) = element {
        destination.put(element.clone());
    }
    outcome.map_err(|e| {
        warn!("{}", e);
        e
    })
}

/// Create a new globally unique identifier
/// derived from a random UUID (`2.25.<decimal>`).
pub fn generate_uid() -> String {
    format!("2.25.{}", Uuid::new_v4().as_u128())
}

/// Create a new unique identifier under the given root.
///
/// The result is cut to the maximum length of 64 characters.
pub fn generate_uid_with_root(root: &str) -> String {
    let root = root.trim().trim_end_matches('.');
    if root.is_empty() {
        return generate_uid();
    }
    let mut uid = format!("{}.{}", root, Uuid::new_v4().as_u128());
    uid.truncate(64);
    while uid.ends_with('.') {
        uid.pop();
    }
    uid
}

/// Create a unique identifier, under `root` if one is given.
pub fn create_uid(root: Option<&str>) -> String {
    match root {
        Some(root) => generate_uid_with_root(root),
        None => generate_uid(),
    }
}

/// Whether `uid` is a syntactically valid unique identifier:
/// dot separated numeric components without leading zeros,
/// at most 64 characters long.
pub fn is_valid_uid(uid: &str) -> bool {
    !uid.is_empty()
        && uid.len() <= 64
        && uid.split('.').all(|component| {
            !component.is_empty()
                && component.bytes().all(|b| b.is_ascii_digit())
                && (component == "0" || !component.starts_with('0'))
        })
}

/// The current date in DICOM date format (`YYYYMMDD`).
pub fn current_date() -> String {
    chrono::Local::now().format("%Y%m%d").to_string()
}

/// The current time in DICOM time format (`HHMMSS`).
pub fn current_time() -> String {
    chrono::Local::now().format("%H%M%S").to_string()
}

/// Clamp a number of frames to the maximum supported by the
/// Number of Frames attribute, logging `warning` if it had to be limited.
pub fn limit_max_frames(frames: usize, warning: &str) -> u16 {
    match u16::try_from(frames) {
        Ok(n) => n,
        Err(_) => {
            warn!("{}", warning);
            MAX_FRAMES
        }
    }
}

/// Check whether `data` declares the expected SOP Class UID.
///
/// Returns the SOP Class UID found.
pub fn check_sop_class(data: &DataSet, expected: &str) -> Result<String> {
    let found = data.string(tags::SOP_CLASS_UID).with_context(|| {
        trace!("No SOP Class UID in data set");
        ValueNotFoundSnafu {
            tag: tags::SOP_CLASS_UID,
        }
    })?;
    if found != expected {
        trace!("Data set is not of SOP Class {}, but {}", expected, found);
        return InvalidUidSnafu { uid: found }.fail();
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::rules::Level;
    use dicom_core::VR;

    #[test]
    fn generated_uids_are_valid_and_unique() {
        let a = generate_uid();
        let b = generate_uid();
        assert!(a.starts_with("2.25."));
        assert!(is_valid_uid(&a), "{}", a);
        assert_ne!(a, b);

        let rooted = generate_uid_with_root("1.2.826.0.1.3680043.9.7433.1.1.1.1.1.1.1.1.1.1.1.");
        assert!(rooted.len() <= 64);
        assert!(is_valid_uid(&rooted), "{}", rooted);
        assert!(rooted.starts_with("1.2.826.0.1.3680043.9.7433"));
        assert!(create_uid(None).starts_with("2.25."));
    }

    #[test]
    fn uid_syntax() {
        assert!(is_valid_uid("1.2.840.10008.5.1.4.1.1.2"));
        assert!(is_valid_uid("1.2.0.3"));
        assert!(!is_valid_uid(""));
        assert!(!is_valid_uid("1..2"));
        assert!(!is_valid_uid("1.02"));
        assert!(!is_valid_uid("1.2."));
        assert!(!is_valid_uid("1.2a"));
        assert!(!is_valid_uid(&"1.".repeat(40)));
    }

    #[test]
    fn frames_are_limited() {
        assert_eq!(limit_max_frames(12, "too many"), 12);
        assert_eq!(limit_max_frames(70_000, "too many"), 65535);
    }

    #[test]
    fn sop_class_check() {
        let mut data = DataSet::new_empty();
        assert!(matches!(
            check_sop_class(&data, "1.2.3"),
            Err(Error::ValueNotFound { .. })
        ));
        data.put_str(tags::SOP_CLASS_UID, VR::UI, "1.2.4");
        assert!(matches!(check_sop_class(&data, "1.2.3"), Err(Error::InvalidUid { .. })));
        assert_eq!(check_sop_class(&data, "1.2.4").as_deref(), Ok("1.2.4"));
    }

    #[test]
    fn date_and_time_are_well_formed() {
        let date = current_date();
        assert_eq!(date.len(), 8);
        assert!(crate::check::check_string_value(VR::DA, &date, "1").is_ok());
        let time = current_time();
        assert_eq!(time.len(), 6);
        assert!(crate::check::check_string_value(VR::TM, &time, "1").is_ok());
    }

    #[test]
    fn item_counts() {
        let rule = Rule::new(
            tags::REFERENCED_SERIES_SEQUENCE,
            VR::SQ,
            "1-n",
            Requirement::Mandatory,
            "Test",
            Level::Unspecified,
        );
        assert!(matches!(check_item_count(&rule, 0), Err(Error::MissingAttribute { .. })));
        assert_eq!(check_item_count(&rule, 3), Ok(()));
        let single = Rule::new(
            tags::REFERENCED_SERIES_SEQUENCE,
            VR::SQ,
            "1",
            Requirement::Optional,
            "Test",
            Level::Unspecified,
        );
        assert_eq!(check_item_count(&single, 0), Ok(()));
        assert!(matches!(
            check_item_count(&single, 2),
            Err(Error::MultiplicityViolated { found: 2, .. })
        ));
    }

    #[test]
    fn copied_element_is_checked() {
        let rule = Rule::new(
            tags::PATIENT_SEX,
            VR::CS,
            "1",
            Requirement::Mandatory,
            "Test",
            Level::Patient,
        );
        let mut source = DataSet::new_empty();
        let mut destination = DataSet::new_empty();
        assert!(matches!(
            get_and_check_element(&source, &rule, &mut destination),
            Err(Error::MissingAttribute { .. })
        ));
        source.put_str(tags::PATIENT_SEX, VR::CS, "f");
        assert!(get_and_check_element(&source, &rule, &mut destination).is_err());
        assert_eq!(destination.string(tags::PATIENT_SEX).as_deref(), Some("f"));
        source.put_str(tags::PATIENT_SEX, VR::CS, "F");
        assert_eq!(get_and_check_element(&source, &rule, &mut destination), Ok(()));
    }

    #[test]
    fn values_outside_defined_terms_are_refused() {
        assert_eq!(ensure_permitted(tags::ROWS, true), Ok(()));
        assert!(matches!(
            ensure_permitted(tags::ROWS, false),
            Err(Error::InvalidElementValue {
                tag,
                source: ValueViolation::NotPermitted,
            }) if tag == tags::ROWS
        ));
    }
}
