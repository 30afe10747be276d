//! Validation of element values against their value representation
//! and a value multiplicity expression.
//!
//! The checks here only look at a single element.
//! Requirement types are handled by [`Rule::validate`](crate::Rule::validate).
use std::str::FromStr;

use dicom_core::value::{PrimitiveValue, Value};
use dicom_core::VR;
use snafu::{ensure, Snafu};

use crate::dataset::Element;

/// The reason why a value does not conform to its attribute definition.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[non_exhaustive]
pub enum ValueViolation {
    /// A character outside of the repertoire of the VR.
    #[snafu(display("invalid character(s)"))]
    InvalidCharacter,
    /// The value does not follow the format of the VR.
    #[snafu(display("VR definition violated"))]
    RepresentationViolated,
    /// The number of values does not fit the multiplicity.
    #[snafu(display("{} value(s) where VM {} is expected", found, vm))]
    MultiplicityViolated { vm: String, found: u32 },
    /// A value is longer than the VR permits.
    #[snafu(display("maximum VR length exceeded"))]
    MaximumLengthViolated,
    /// The value could not be checked.
    #[snafu(display("value could not be checked"))]
    Internal,
    /// The value is valid for the VR but not among the values
    /// the attribute allows.
    #[snafu(display("value not permitted for this attribute"))]
    NotPermitted,
}

/// A parsed value multiplicity expression.
///
/// The accepted forms are
/// `n` (exactly n values),
/// `n-m` (between n and m values),
/// `n-n` or `1-n` (at least n values, no upper bound)
/// and `k-kn` (a multiple of k values, e.g. `2-2n`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Multiplicity {
    min: u32,
    max: Option<u32>,
    step: u32,
}

impl Multiplicity {
    /// Exactly `n` values.
    pub const fn exact(n: u32) -> Self {
        Multiplicity {
            min: n,
            max: Some(n),
            step: 1,
        }
    }

    /// The minimum number of values.
    pub fn min(&self) -> u32 {
        self.min
    }

    /// The maximum number of values, if bounded.
    pub fn max(&self) -> Option<u32> {
        self.max
    }

    /// Whether `count` values satisfy this multiplicity.
    pub fn accepts(&self, count: u32) -> bool {
        count >= self.min
            && self.max.map_or(true, |max| count <= max)
            && count % self.step == 0
    }
}

/// Error type for an unparseable multiplicity expression.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(display("invalid value multiplicity `{}`", text))]
pub struct ParseMultiplicityError {
    text: String,
}

impl FromStr for Multiplicity {
    type Err = ParseMultiplicityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseMultiplicitySnafu { text: s }.build();
        match s.split_once('-') {
            None => s.parse().map(Multiplicity::exact).map_err(|_| err()),
            Some((low, high)) => {
                let high = high.trim();
                let min = match low.trim() {
                    // "n-n": at least one value
                    "n" => 1,
                    low => low.parse().map_err(|_| err())?,
                };
                if let Some(factor) = high.strip_suffix('n') {
                    let step = if factor.is_empty() {
                        1
                    } else {
                        factor.parse().map_err(|_| err())?
                    };
                    ensure!(step != 0, ParseMultiplicitySnafu { text: s });
                    Ok(Multiplicity {
                        min,
                        max: None,
                        step,
                    })
                } else {
                    let max = high.parse().map_err(|_| err())?;
                    ensure!(max >= min, ParseMultiplicitySnafu { text: s });
                    Ok(Multiplicity {
                        min,
                        max: Some(max),
                        step: 1,
                    })
                }
            }
        }
    }
}

/// Check a value count against a multiplicity expression.
pub fn check_multiplicity(count: u32, vm: &str) -> Result<(), ValueViolation> {
    let multiplicity: Multiplicity = vm.parse().map_err(|_| InternalSnafu.build())?;
    ensure!(
        multiplicity.accepts(count),
        MultiplicityViolatedSnafu { vm, found: count }
    );
    Ok(())
}

/// Self-validation capabilities of a data element.
pub trait ElementCheck {
    /// Whether the element holds a nested data set sequence.
    fn is_sequence(&self) -> bool;

    /// Whether the element is empty after removing padding.
    fn is_empty_normalized(&self) -> bool;

    /// The number of values in the element.
    fn value_count(&self) -> u32;

    /// Check the value against its value representation
    /// and the given multiplicity expression.
    fn check_value(&self, vm: &str) -> Result<(), ValueViolation>;
}

impl ElementCheck for Element {
    fn is_sequence(&self) -> bool {
        self.vr() == VR::SQ || matches!(self.value(), Value::Sequence(_))
    }

    fn is_empty_normalized(&self) -> bool {
        match self.value() {
            Value::Primitive(v) => primitive_is_empty(v),
            Value::Sequence(seq) => seq.items().is_empty(),
            Value::PixelSequence(seq) => seq.fragments().is_empty(),
        }
    }

    fn value_count(&self) -> u32 {
        match self.value() {
            Value::Primitive(v) => primitive_count(self.vr(), v),
            Value::Sequence(seq) => seq.items().len() as u32,
            Value::PixelSequence(_) => 1,
        }
    }

    fn check_value(&self, vm: &str) -> Result<(), ValueViolation> {
        match self.value() {
            Value::Primitive(v) => {
                check_primitive(self.vr(), v)?;
                check_multiplicity(primitive_count(self.vr(), v), vm)
            }
            Value::Sequence(seq) => check_multiplicity(seq.items().len() as u32, vm),
            Value::PixelSequence(_) => Ok(()),
        }
    }
}

/// Check a textual value for a given VR and multiplicity,
/// as done by typed setters before storing a value.
pub fn check_string_value(vr: VR, value: &str, vm: &str) -> Result<(), ValueViolation> {
    let values = split_values(vr, value);
    for v in &values {
        check_text(vr, v)?;
    }
    let count = if value.trim_matches(PADDING).is_empty() {
        0
    } else {
        values.len() as u32
    };
    check_multiplicity(count, vm)
}

const PADDING: &[char] = &[' ', '\0'];

/// Value representations whose value is never split into multiple values.
fn is_single_valued(vr: VR) -> bool {
    matches!(
        vr,
        VR::LT | VR::ST | VR::UT | VR::UR | VR::OB | VR::OW | VR::OF | VR::OD | VR::OL | VR::OV | VR::UN
    )
}

fn is_text(vr: VR) -> bool {
    matches!(
        vr,
        VR::AE
            | VR::AS
            | VR::CS
            | VR::DA
            | VR::DS
            | VR::DT
            | VR::IS
            | VR::LO
            | VR::LT
            | VR::PN
            | VR::SH
            | VR::ST
            | VR::TM
            | VR::UC
            | VR::UI
            | VR::UR
            | VR::UT
    )
}

fn split_values(vr: VR, text: &str) -> Vec<&str> {
    if is_single_valued(vr) {
        vec![text]
    } else {
        text.split('\\').collect()
    }
}

/// Obtain the individual textual values of a primitive value.
pub(crate) fn primitive_strings(vr: VR, value: &PrimitiveValue) -> Vec<String> {
    match value {
        PrimitiveValue::Empty => Vec::new(),
        PrimitiveValue::Str(s) => split_values(vr, s).into_iter().map(str::to_string).collect(),
        PrimitiveValue::Strs(values) => values
            .iter()
            .flat_map(|s| split_values(vr, s))
            .map(str::to_string)
            .collect(),
        other => split_values(vr, &other.to_str())
            .into_iter()
            .map(str::to_string)
            .collect(),
    }
}

fn primitive_is_empty(value: &PrimitiveValue) -> bool {
    match value {
        PrimitiveValue::Empty => true,
        PrimitiveValue::Str(s) => s.trim_matches(PADDING).is_empty(),
        PrimitiveValue::Strs(values) => values.iter().all(|s| s.trim_matches(PADDING).is_empty()),
        other => other.multiplicity() == 0,
    }
}

fn primitive_count(vr: VR, value: &PrimitiveValue) -> u32 {
    if primitive_is_empty(value) {
        return 0;
    }
    if is_single_valued(vr) {
        return 1;
    }
    match value {
        PrimitiveValue::Str(_) | PrimitiveValue::Strs(_) => primitive_strings(vr, value).len() as u32,
        other => other.multiplicity(),
    }
}

fn check_primitive(vr: VR, value: &PrimitiveValue) -> Result<(), ValueViolation> {
    if is_text(vr) {
        return match value {
            PrimitiveValue::Str(_) | PrimitiveValue::Strs(_) => {
                for v in primitive_strings(vr, value) {
                    check_text(vr, &v)?;
                }
                Ok(())
            }
            // decoded dates, times and numbers are well formed by construction
            PrimitiveValue::Date(_)
            | PrimitiveValue::Time(_)
            | PrimitiveValue::DateTime(_)
            | PrimitiveValue::I16(_)
            | PrimitiveValue::I32(_)
            | PrimitiveValue::I64(_)
            | PrimitiveValue::U16(_)
            | PrimitiveValue::U32(_)
            | PrimitiveValue::U64(_)
            | PrimitiveValue::F32(_)
            | PrimitiveValue::F64(_)
            | PrimitiveValue::Empty => Ok(()),
            _ => RepresentationViolatedSnafu.fail(),
        };
    }

    let consistent = match vr {
        VR::US => matches!(value, PrimitiveValue::U16(_)),
        VR::SS => matches!(value, PrimitiveValue::I16(_)),
        VR::UL => matches!(value, PrimitiveValue::U32(_)),
        VR::SL => matches!(value, PrimitiveValue::I32(_)),
        VR::UV => matches!(value, PrimitiveValue::U64(_)),
        VR::SV => matches!(value, PrimitiveValue::I64(_)),
        VR::FL | VR::OF => matches!(value, PrimitiveValue::F32(_)),
        VR::FD | VR::OD => matches!(value, PrimitiveValue::F64(_)),
        VR::AT => matches!(value, PrimitiveValue::Tags(_)),
        VR::OB => matches!(value, PrimitiveValue::U8(_)),
        VR::OW => matches!(value, PrimitiveValue::U16(_) | PrimitiveValue::U8(_)),
        VR::OL => matches!(value, PrimitiveValue::U32(_) | PrimitiveValue::U8(_)),
        VR::OV => matches!(value, PrimitiveValue::U64(_) | PrimitiveValue::U8(_)),
        VR::UN => true,
        _ => false,
    };
    ensure!(
        consistent || matches!(value, PrimitiveValue::Empty),
        RepresentationViolatedSnafu
    );
    Ok(())
}

/// Maximum length in bytes of a single value.
fn max_length(vr: VR) -> Option<usize> {
    match vr {
        VR::AE => Some(16),
        VR::AS => Some(4),
        VR::CS => Some(16),
        VR::DA => Some(8),
        VR::DS => Some(16),
        VR::DT => Some(26),
        VR::IS => Some(12),
        VR::LO => Some(64),
        VR::LT => Some(10240),
        VR::SH => Some(16),
        VR::ST => Some(1024),
        VR::TM => Some(16),
        VR::UI => Some(64),
        _ => None,
    }
}

/// Check a single textual value (already split at backslashes).
fn check_text(vr: VR, value: &str) -> Result<(), ValueViolation> {
    let value = match vr {
        VR::LT | VR::ST | VR::UT => value.trim_end_matches(PADDING),
        _ => value.trim_matches(PADDING),
    };

    if vr == VR::PN {
        // each component group is limited individually
        for group in value.split('=') {
            ensure!(group.len() <= 64, MaximumLengthViolatedSnafu);
        }
    } else if let Some(max) = max_length(vr) {
        ensure!(value.len() <= max, MaximumLengthViolatedSnafu);
    }

    if value.is_empty() {
        return Ok(());
    }

    match vr {
        VR::CS => check_chars(value, |c| {
            c.is_ascii_uppercase() || c.is_ascii_digit() || c == ' ' || c == '_'
        }),
        VR::IS => {
            check_chars(value, |c| c.is_ascii_digit() || c == '+' || c == '-')?;
            value
                .parse::<i32>()
                .map(|_| ())
                .map_err(|_| RepresentationViolatedSnafu.build())
        }
        VR::DS => {
            check_chars(value, |c| {
                c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')
            })?;
            value
                .parse::<f64>()
                .map(|_| ())
                .map_err(|_| RepresentationViolatedSnafu.build())
        }
        VR::UI => {
            check_chars(value, |c| c.is_ascii_digit() || c == '.')?;
            representation(crate::util::is_valid_uid(value))
        }
        VR::DA => {
            check_chars(value, |c| c.is_ascii_digit())?;
            representation(is_valid_date(value))
        }
        VR::TM => {
            check_chars(value, |c| c.is_ascii_digit() || c == '.')?;
            representation(is_valid_time(value))
        }
        VR::DT => {
            check_chars(value, |c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-'))?;
            representation(is_valid_datetime(value))
        }
        VR::AS => {
            check_chars(value, |c| c.is_ascii_digit() || matches!(c, 'D' | 'W' | 'M' | 'Y'))?;
            representation(is_valid_age(value))
        }
        VR::AE | VR::LO | VR::SH | VR::UC => {
            check_chars(value, |c| !c.is_control() || c == '\u{1b}')
        }
        VR::PN => check_chars(value, |c| !c.is_control() || c == '\u{1b}'),
        VR::LT | VR::ST | VR::UT => check_chars(value, |c| {
            !c.is_control() || matches!(c, '\u{1b}' | '\r' | '\n' | '\u{0c}' | '\t')
        }),
        VR::UR => check_chars(value, |c| !c.is_control() && c != ' '),
        _ => Ok(()),
    }
}

fn check_chars(value: &str, allowed: impl Fn(char) -> bool) -> Result<(), ValueViolation> {
    ensure!(value.chars().all(allowed), InvalidCharacterSnafu);
    Ok(())
}

fn representation(valid: bool) -> Result<(), ValueViolation> {
    ensure!(valid, RepresentationViolatedSnafu);
    Ok(())
}

fn parse_range(digits: &str, min: u32, max: u32) -> bool {
    digits.len() == 2
        && digits
            .parse::<u32>()
            .map(|v| v >= min && v <= max)
            .unwrap_or(false)
}

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn is_valid_date(value: &str) -> bool {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let (year, month, day) = match (
        value[0..4].parse::<u32>(),
        value[4..6].parse::<u32>(),
        value[6..8].parse::<u32>(),
    ) {
        (Ok(y), Ok(m), Ok(d)) => (y, m, d),
        _ => return false,
    };
    (1..=12).contains(&month) && day >= 1 && day <= days_in_month(year, month)
}

fn is_valid_time(value: &str) -> bool {
    let (hms, fraction) = match value.split_once('.') {
        Some((hms, fraction)) => (hms, Some(fraction)),
        None => (value, None),
    };
    if let Some(fraction) = fraction {
        if hms.len() != 6
            || fraction.is_empty()
            || fraction.len() > 6
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return false;
        }
    }
    match hms.len() {
        2 => parse_range(&hms[0..2], 0, 23),
        4 => parse_range(&hms[0..2], 0, 23) && parse_range(&hms[2..4], 0, 59),
        6 => {
            parse_range(&hms[0..2], 0, 23)
                && parse_range(&hms[2..4], 0, 59)
                && parse_range(&hms[4..6], 0, 60)
        }
        _ => false,
    }
}

fn is_valid_datetime(value: &str) -> bool {
    // split off the UTC offset suffix
    let (main, offset) = match value.rfind(|c| c == '+' || c == '-') {
        Some(pos) => (&value[..pos], Some(&value[pos + 1..])),
        None => (value, None),
    };
    if let Some(offset) = offset {
        if offset.len() != 4
            || !parse_range(&offset[0..2], 0, 14)
            || !parse_range(&offset[2..4], 0, 59)
        {
            return false;
        }
    }
    let (digits, fraction) = match main.split_once('.') {
        Some((digits, fraction)) => (digits, Some(fraction)),
        None => (main, None),
    };
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if fraction.is_some() && digits.len() != 14 {
        return false;
    }
    if let Some(fraction) = fraction {
        if fraction.is_empty() || fraction.len() > 6 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    match digits.len() {
        4 => true,
        6 => parse_range(&digits[4..6], 1, 12),
        8 => is_valid_date(digits),
        10 | 12 | 14 => is_valid_date(&digits[0..8]) && is_valid_time(&digits[8..]),
        _ => false,
    }
}

fn is_valid_age(value: &str) -> bool {
    match value.as_bytes() {
        [a, b, c, unit] => {
            [a, b, c].iter().all(|d| d.is_ascii_digit()) && matches!(unit, b'D' | b'W' | b'M' | b'Y')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{DataElement, Tag};
    use rstest::rstest;

    #[rstest]
    #[case("1", 0, false)]
    #[case("1", 1, true)]
    #[case("1", 2, false)]
    #[case("1-n", 0, false)]
    #[case("1-n", 1, true)]
    #[case("1-n", 250, true)]
    #[case("2-n", 1, false)]
    #[case("2-n", 2, true)]
    #[case("1-3", 3, true)]
    #[case("1-3", 4, false)]
    #[case("2-2n", 3, false)]
    #[case("2-2n", 4, true)]
    #[case("3-3n", 6, true)]
    #[case("n-n", 1, true)]
    #[case("n-n", 0, false)]
    fn multiplicity_grammar(#[case] vm: &str, #[case] count: u32, #[case] accepted: bool) {
        let multiplicity: Multiplicity = vm.parse().unwrap();
        assert_eq!(multiplicity.accepts(count), accepted);
    }

    #[test]
    fn multiplicity_rejects_garbage() {
        assert!("".parse::<Multiplicity>().is_err());
        assert!("x".parse::<Multiplicity>().is_err());
        assert!("3-1".parse::<Multiplicity>().is_err());
        assert!("1-0n".parse::<Multiplicity>().is_err());
        assert_eq!(check_multiplicity(1, "bogus"), Err(ValueViolation::Internal));
    }

    #[rstest]
    #[case(VR::CS, "ORIGINAL\\PRIMARY", "2-n", Ok(()))]
    #[case(VR::CS, "original", "1", Err(ValueViolation::InvalidCharacter))]
    #[case(VR::CS, "AN_OVERLY_LONG_CODE_STRING", "1", Err(ValueViolation::MaximumLengthViolated))]
    #[case(VR::DA, "20240229", "1", Ok(()))]
    #[case(VR::DA, "20230229", "1", Err(ValueViolation::RepresentationViolated))]
    #[case(VR::TM, "235959.123456", "1", Ok(()))]
    #[case(VR::TM, "2460", "1", Err(ValueViolation::RepresentationViolated))]
    #[case(VR::DT, "20240101120000.5+0100", "1", Ok(()))]
    #[case(VR::IS, "12a", "1", Err(ValueViolation::InvalidCharacter))]
    #[case(VR::DS, "-1.5e3", "1", Ok(()))]
    #[case(VR::UI, "1.2.840.10008.1.2", "1", Ok(()))]
    #[case(VR::UI, "1.02.3", "1", Err(ValueViolation::RepresentationViolated))]
    #[case(VR::AS, "045Y", "1", Ok(()))]
    #[case(VR::AS, "45Y", "1", Err(ValueViolation::RepresentationViolated))]
    #[case(VR::AS, "00é", "1", Err(ValueViolation::InvalidCharacter))]
    #[case(VR::AS, "0é", "1", Err(ValueViolation::InvalidCharacter))]
    #[case(VR::AS, "Y045", "1", Err(ValueViolation::RepresentationViolated))]
    #[case(VR::DA, "202401é", "1", Err(ValueViolation::InvalidCharacter))]
    #[case(VR::TM, "12é", "1", Err(ValueViolation::InvalidCharacter))]
    #[case(VR::DT, "2024é+0100", "1", Err(ValueViolation::InvalidCharacter))]
    #[case(VR::CS, "ÄÖ", "1", Err(ValueViolation::InvalidCharacter))]
    #[case(VR::LO, "Müller", "1", Ok(()))]
    #[case(VR::LO, "a\\b", "1", Err(ValueViolation::MultiplicityViolated { vm: "1".into(), found: 2 }))]
    #[case(VR::LT, "a\\b", "1", Ok(()))]
    fn string_values(
        #[case] vr: VR,
        #[case] value: &str,
        #[case] vm: &str,
        #[case] expected: Result<(), ValueViolation>,
    ) {
        assert_eq!(check_string_value(vr, value, vm), expected);
    }

    #[test]
    fn element_checks() {
        let elem: Element = DataElement::new(
            Tag(0x0028, 0x1101),
            VR::US,
            PrimitiveValue::U16(vec![256, 0, 16].into()),
        );
        assert_eq!(elem.value_count(), 3);
        assert!(!elem.is_empty_normalized());
        assert_eq!(elem.check_value("3"), Ok(()));
        assert!(matches!(
            elem.check_value("1"),
            Err(ValueViolation::MultiplicityViolated { found: 3, .. })
        ));

        let padded: Element = DataElement::new(
            Tag(0x0010, 0x0010),
            VR::PN,
            PrimitiveValue::from("  "),
        );
        assert!(padded.is_empty_normalized());
        assert_eq!(padded.value_count(), 0);

        let mismatched: Element = DataElement::new(
            Tag(0x0028, 0x0010),
            VR::US,
            PrimitiveValue::from("512"),
        );
        assert_eq!(
            mismatched.check_value("1"),
            Err(ValueViolation::RepresentationViolated)
        );
    }
}
