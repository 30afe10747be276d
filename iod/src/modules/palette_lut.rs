//! The Palette Color Lookup Table Module.
//!
//! Each of the red, green and blue channels has a descriptor
//! (number of entries, first mapped value, bits per entry)
//! and either direct or segmented lookup table data.
//! LUT data is always stored as 16-bit words:
//! 8-bit entries are packed in pairs,
//! the first entry of a pair in the high byte.
use dicom_core::value::PrimitiveValue;
use dicom_core::{Tag, VR};
use dicom_dictionary_std::tags;
use snafu::OptionExt;
use tracing::{error, warn};

use crate::component::{Component, IodComponent, SharedDataSet, SharedRules};
use crate::dataset::{DataSet, DataSetExt};
use crate::rules::Level;
use crate::rules::Requirement::{ConditionalMandatory, Mandatory, Optional};
use crate::{InvalidColorPaletteSnafu, Result, ValueNotFoundSnafu};

/// A color channel of the palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Red => "Red",
            Channel::Green => "Green",
            Channel::Blue => "Blue",
        }
    }

    pub fn descriptor_tag(self) -> Tag {
        match self {
            Channel::Red => tags::RED_PALETTE_COLOR_LOOKUP_TABLE_DESCRIPTOR,
            Channel::Green => tags::GREEN_PALETTE_COLOR_LOOKUP_TABLE_DESCRIPTOR,
            Channel::Blue => tags::BLUE_PALETTE_COLOR_LOOKUP_TABLE_DESCRIPTOR,
        }
    }

    pub fn data_tag(self) -> Tag {
        match self {
            Channel::Red => tags::RED_PALETTE_COLOR_LOOKUP_TABLE_DATA,
            Channel::Green => tags::GREEN_PALETTE_COLOR_LOOKUP_TABLE_DATA,
            Channel::Blue => tags::BLUE_PALETTE_COLOR_LOOKUP_TABLE_DATA,
        }
    }

    pub fn segmented_data_tag(self) -> Tag {
        match self {
            Channel::Red => tags::SEGMENTED_RED_PALETTE_COLOR_LOOKUP_TABLE_DATA,
            Channel::Green => tags::SEGMENTED_GREEN_PALETTE_COLOR_LOOKUP_TABLE_DATA,
            Channel::Blue => tags::SEGMENTED_BLUE_PALETTE_COLOR_LOOKUP_TABLE_DATA,
        }
    }
}

/// The descriptor of one channel's lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LutDescriptor {
    /// The number of entries, 0 standing for 65536.
    pub entries: u16,
    /// The first pixel value mapped.
    pub first_mapped: u16,
    /// Bits per entry, 8 or 16.
    pub bits: u16,
}

impl LutDescriptor {
    /// The actual number of entries,
    /// resolving 0 to the maximum for the descriptor's bit depth.
    pub fn entry_count(&self) -> usize {
        match (self.entries, self.bits) {
            (0, 8) => 256,
            (0, _) => 65536,
            (n, _) => usize::from(n),
        }
    }
}

/// Pack 8-bit entries into 16-bit words, two entries per word.
///
/// The first entry of each pair goes into the high byte.
/// For an odd number of entries the low byte of the last word is zero.
pub fn pack_8bit(entries: &[u8]) -> Vec<u16> {
    entries
        .chunks(2)
        .map(|pair| {
            let high = u16::from(pair[0]) << 8;
            let low = pair.get(1).copied().map_or(0, u16::from);
            high | low
        })
        .collect()
}

/// Unpack `count` 8-bit entries from 16-bit words.
///
/// A `count` of 0 stands for 256 entries.
/// The number of words must fit the count exactly:
/// `count` is either twice the number of words,
/// or one less when the last word holds a single entry.
pub fn unpack_8bit(words: &[u16], count: usize) -> Result<Vec<u8>> {
    let count = if count == 0 { 256 } else { count };
    if count != 2 * words.len() && count + 1 != 2 * words.len() {
        return InvalidColorPaletteSnafu {
            message: format!(
                "{} 16-bit words cannot hold {} 8-bit entries",
                words.len(),
                count
            ),
        }
        .fail();
    }
    let entries = words
        .iter()
        .flat_map(|w| [(w >> 8) as u8, (w & 0xFF) as u8])
        .take(count)
        .collect();
    Ok(entries)
}

/// The Palette Color Lookup Table Module.
#[derive(Debug, Clone)]
pub struct PaletteColorLutModule {
    component: Component,
}

impl PaletteColorLutModule {
    pub const NAME: &'static str = "PaletteColorLookupTableModule";

    pub fn new() -> Self {
        Self::from_component(Component::new(Self::NAME))
    }

    pub fn new_shared(data: SharedDataSet, rules: SharedRules) -> Self {
        Self::from_component(Component::new_shared(Self::NAME, data, rules))
    }

    fn from_component(component: Component) -> Self {
        let mut module = PaletteColorLutModule { component };
        module.reset_rules();
        module
    }

    pub fn palette_color_lookup_table_uid(&self) -> Option<String> {
        self.component.string(tags::PALETTE_COLOR_LOOKUP_TABLE_UID)
    }

    pub fn set_palette_color_lookup_table_uid(&self, value: &str, check: bool) -> Result<()> {
        self.component
            .set_string(tags::PALETTE_COLOR_LOOKUP_TABLE_UID, value, check)
    }

    pub fn descriptor(&self, channel: Channel) -> Option<LutDescriptor> {
        let values = self
            .component
            .data()
            .uint16_values(channel.descriptor_tag())?;
        match values[..] {
            [entries, first_mapped, bits] => Some(LutDescriptor {
                entries,
                first_mapped,
                bits,
            }),
            _ => None,
        }
    }

    /// Set the descriptor of one channel.
    pub fn set_descriptor(&self, channel: Channel, descriptor: LutDescriptor, check: bool) -> Result<()> {
        if check && descriptor.bits != 8 && descriptor.bits != 16 {
            return InvalidColorPaletteSnafu {
                message: format!(
                    "{} descriptor: {} bits per entry (must be 8 or 16)",
                    channel.name(),
                    descriptor.bits
                ),
            }
            .fail();
        }
        self.component.set_uint16s(
            channel.descriptor_tag(),
            &[descriptor.entries, descriptor.first_mapped, descriptor.bits],
            check,
        )
    }

    /// Set the same descriptor for all three channels.
    pub fn set_descriptors(&self, descriptor: LutDescriptor, check: bool) -> Result<()> {
        Channel::ALL
            .iter()
            .try_for_each(|&channel| self.set_descriptor(channel, descriptor, check))
    }

    /// The bits per entry common to all descriptors,
    /// or `None` if they are missing, disagree or are neither 8 nor 16.
    pub fn bits_per_entry(&self) -> Option<u16> {
        let bits: Vec<u16> = Channel::ALL
            .iter()
            .map(|&c| self.descriptor(c).map(|d| d.bits))
            .collect::<Option<_>>()?;
        match bits[..] {
            [r, g, b] if r == g && g == b && (r == 8 || r == 16) => Some(r),
            _ => {
                warn!("Palette descriptors disagree on bits per entry or hold invalid values: {:?}", bits);
                None
            }
        }
    }

    /// The raw (16-bit word) lookup table data of a channel.
    pub fn data(&self, channel: Channel) -> Option<Vec<u16>> {
        self.component.data().uint16_values(channel.data_tag())
    }

    /// The lookup table data of a channel as 8-bit entries.
    ///
    /// The descriptors must declare 8 bits per entry.
    pub fn data_8bit(&self, channel: Channel) -> Result<Vec<u8>> {
        if self.bits_per_entry() != Some(8) {
            return InvalidColorPaletteSnafu {
                message: "Descriptors do not declare 8-bit entries".to_string(),
            }
            .fail();
        }
        let descriptor = self.descriptor(channel).context(ValueNotFoundSnafu {
            tag: channel.descriptor_tag(),
        })?;
        let words = self.data(channel).context(ValueNotFoundSnafu {
            tag: channel.data_tag(),
        })?;
        unpack_8bit(&words, usize::from(descriptor.entries))
    }

    /// Set the lookup table data of a channel from 16-bit entries.
    ///
    /// When checking, the descriptors must not declare 8-bit entries.
    pub fn set_data_16bit(&self, channel: Channel, entries: &[u16], check: bool) -> Result<()> {
        if check && self.bits_per_entry() == Some(8) {
            return InvalidColorPaletteSnafu {
                message: "Cannot set 16-bit data: descriptors declare 8-bit entries".to_string(),
            }
            .fail();
        }
        self.put_words(channel.data_tag(), entries, check)
    }

    /// Set the lookup table data of a channel from 8-bit entries,
    /// packing them into 16-bit words.
    ///
    /// The descriptors must declare 8-bit entries.
    pub fn set_data_8bit(&self, channel: Channel, entries: &[u8], check: bool) -> Result<()> {
        if self.bits_per_entry() != Some(8) {
            return InvalidColorPaletteSnafu {
                message: "Cannot set 8-bit data: descriptors do not declare 8-bit entries"
                    .to_string(),
            }
            .fail();
        }
        self.put_words(channel.data_tag(), &pack_8bit(entries), check)
    }

    pub fn segmented_data(&self, channel: Channel) -> Option<Vec<u16>> {
        self.component
            .data()
            .uint16_values(channel.segmented_data_tag())
    }

    pub fn set_segmented_data(&self, channel: Channel, words: &[u16], check: bool) -> Result<()> {
        self.put_words(channel.segmented_data_tag(), words, check)
    }

    fn put_words(&self, tag: Tag, words: &[u16], check: bool) -> Result<()> {
        self.component
            .set_primitive(tag, PrimitiveValue::U16(words.iter().copied().collect()), check)
    }

    /// Check that a channel has lookup table data and a descriptor
    /// of the expected value representations.
    pub fn check_lut(&self, channel: Channel, as_error: bool) -> bool {
        report(self.lut_problem(channel), as_error)
    }

    /// Check that all descriptors agree on first mapped value and bit depth.
    pub fn check_descriptor_consistency(&self, as_error: bool) -> bool {
        report(self.descriptor_problem(), as_error)
    }

    /// Check that the number of entries declared by each descriptor
    /// matches the entries held by the data of its channel,
    /// and that all channels have the same number of entries.
    pub fn check_data_consistency(&self, as_error: bool) -> bool {
        report(self.data_problem(), as_error)
    }

    /// Check that segmented and direct lookup table data are not mixed,
    /// and that one of them is complete.
    pub fn check_segment_consistency(&self, as_error: bool) -> bool {
        report(self.segment_problem(), as_error)
    }

    /// Whether the palette uses segmented lookup table data.
    pub fn is_segmented(&self) -> bool {
        let data = self.component.data();
        Channel::ALL
            .iter()
            .any(|c| data.contains(c.segmented_data_tag()))
    }

    /// The first problem found by any of the consistency checks.
    fn palette_problem(&self) -> Option<String> {
        if let Some(problem) = self.segment_problem() {
            return Some(problem);
        }
        if self.is_segmented() {
            return self.descriptor_problem();
        }
        Channel::ALL
            .iter()
            .find_map(|&c| self.lut_problem(c))
            .or_else(|| self.descriptor_problem())
            .or_else(|| self.data_problem())
    }

    fn lut_problem(&self, channel: Channel) -> Option<String> {
        let data = self.component.data();
        let lut = match data.find(channel.data_tag()) {
            Some(e) => e,
            None => return Some(format!("{} Palette Color Lookup Table Data missing", channel.name())),
        };
        let descriptor = match data.find(channel.descriptor_tag()) {
            Some(e) => e,
            None => return Some(format!("{} Palette Color Lookup Table Descriptor missing", channel.name())),
        };
        if lut.vr() != VR::OW {
            return Some(format!(
                "{} Palette Color Lookup Table Data has VR {} instead of OW",
                channel.name(),
                lut.vr()
            ));
        }
        if descriptor.vr() != VR::US && descriptor.vr() != VR::SS {
            return Some(format!(
                "{} Palette Color Lookup Table Descriptor has VR {} instead of US or SS",
                channel.name(),
                descriptor.vr()
            ));
        }
        None
    }

    fn descriptor_problem(&self) -> Option<String> {
        let descriptors: Option<Vec<LutDescriptor>> =
            Channel::ALL.iter().map(|&c| self.descriptor(c)).collect();
        let descriptors = match descriptors {
            Some(d) => d,
            None => return Some("Palette Color Lookup Table Descriptors missing or incomplete".to_string()),
        };
        let first = descriptors[0];
        if descriptors.iter().any(|d| d.first_mapped != first.first_mapped) {
            return Some("Palette descriptors disagree on the first mapped value".to_string());
        }
        if descriptors.iter().any(|d| d.bits != first.bits) {
            return Some("Palette descriptors disagree on the bits per entry".to_string());
        }
        if first.bits != 8 && first.bits != 16 {
            return Some(format!("Palette descriptors declare {} bits per entry", first.bits));
        }
        None
    }

    fn data_problem(&self) -> Option<String> {
        let mut counts = Vec::with_capacity(3);
        for channel in Channel::ALL {
            let descriptor = match self.descriptor(channel) {
                Some(d) => d,
                None => return Some(format!("{} palette descriptor missing", channel.name())),
            };
            let words = match self.data(channel) {
                Some(w) => w,
                None => return Some(format!("{} palette data missing", channel.name())),
            };
            let expected = descriptor.entry_count();
            let actual = if descriptor.bits == 8 {
                match unpack_8bit(&words, usize::from(descriptor.entries)) {
                    Ok(entries) => entries.len(),
                    Err(e) => return Some(format!("{} channel: {}", channel.name(), e)),
                }
            } else {
                words.len()
            };
            if actual != expected {
                return Some(format!(
                    "{} descriptor declares {} entries, but data holds {}",
                    channel.name(),
                    expected,
                    actual
                ));
            }
            counts.push(actual);
        }
        if counts.windows(2).any(|w| w[0] != w[1]) {
            return Some(format!("Palette channels differ in number of entries: {:?}", counts));
        }
        None
    }

    fn segment_problem(&self) -> Option<String> {
        let data = self.component.data();
        let present = |tag: fn(Channel) -> Tag| -> usize {
            Channel::ALL.iter().filter(|&&c| data.contains(tag(c))).count()
        };
        let direct = present(Channel::data_tag);
        let segmented = present(Channel::segmented_data_tag);
        match (direct, segmented) {
            (3, 0) | (0, 3) => None,
            (0, 0) => Some("Neither direct nor segmented palette data present".to_string()),
            (d, 0) => Some(format!("Only {} of 3 channels have palette data", d)),
            (0, s) => Some(format!("Only {} of 3 channels have segmented palette data", s)),
            _ => Some("Both direct and segmented palette data present".to_string()),
        }
    }
}

fn report(problem: Option<String>, as_error: bool) -> bool {
    match problem {
        None => true,
        Some(message) => {
            if as_error {
                error!("{}", message);
            } else {
                warn!("{}", message);
            }
            false
        }
    }
}

impl Default for PaletteColorLutModule {
    fn default() -> Self {
        Self::new()
    }
}

impl IodComponent for PaletteColorLutModule {
    fn component(&self) -> &Component {
        &self.component
    }

    fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }

    fn reset_rules(&mut self) {
        let mut table = Vec::with_capacity(10);
        for channel in Channel::ALL {
            table.push((channel.descriptor_tag(), VR::US, "3", Mandatory));
        }
        table.push((tags::PALETTE_COLOR_LOOKUP_TABLE_UID, VR::UI, "1", Optional));
        for channel in Channel::ALL {
            table.push((channel.data_tag(), VR::OW, "1", ConditionalMandatory));
        }
        for channel in Channel::ALL {
            table.push((channel.segmented_data_tag(), VR::OW, "1", ConditionalMandatory));
        }
        self.component.declare_rules(Level::Image, &table);
    }

    /// Read the palette, logging inconsistencies as warnings.
    fn read(&mut self, source: &DataSet, clear_old: bool) -> Result<()> {
        self.component.read(source, clear_old)?;
        let _ = report(self.palette_problem(), false);
        Ok(())
    }

    /// Write the palette, refusing to write an inconsistent one.
    fn write(&mut self, destination: &mut DataSet) -> Result<()> {
        if let Some(message) = self.palette_problem() {
            error!("{}", message);
            return InvalidColorPaletteSnafu { message }.fail();
        }
        self.component.write(destination)
    }
}
