use crate::error::{DenonError, Result};
use std::collections::{BTreeMap, HashMap};

/// Label shown by the receiver when the master volume is fully down
pub const MINUS_INFINITY: &str = "---.-dB";

/// Granularity of a scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// One code per integer value
    Whole,
    /// An extra `…5` code after each integer value
    Half,
}

/// A linear dB scale as encoded on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale {
    pub name: &'static str,
    /// Lowest raw value (inclusive)
    pub min: u32,
    /// Highest raw value. Generation stops before it, decoding accepts it.
    pub max: u32,
    pub step: Step,
    /// Raw value corresponding to 0 dB
    pub zero_ref: i32,
    /// Number of digits of the integer part
    pub width: usize,
}

pub const MASTER_VOLUME: Scale = Scale {
    name: "Master volume",
    min: 0,
    max: 99,
    step: Step::Half,
    zero_ref: 80,
    width: 2,
};

pub const CHANNEL_VOLUME: Scale = Scale {
    name: "Channel volume",
    min: 38,
    max: 62,
    step: Step::Half,
    zero_ref: 50,
    width: 2,
};

pub const TONE: Scale = Scale {
    name: "Tone",
    min: 44,
    max: 56,
    step: Step::Whole,
    zero_ref: 50,
    width: 2,
};

/// Raw value is attenuation: `00` is 0 dB, `10` is -10 dB
pub const LFE: Scale = Scale {
    name: "LFE",
    min: 0,
    max: 10,
    step: Step::Whole,
    zero_ref: 0,
    width: 2,
};

pub const EFFECT_LEVEL: Scale = Scale {
    name: "Effect level",
    min: 1,
    max: 15,
    step: Step::Whole,
    zero_ref: 0,
    width: 2,
};

impl Scale {
    /// Consecutive fixed-width codes over `[min, max)`
    pub fn codes(&self) -> impl Iterator<Item = String> {
        let width = self.width;
        let half = self.step == Step::Half;
        (self.min..self.max).flat_map(move |value| {
            let whole = format!("{value:0width$}");
            let half_step = half.then(|| format!("{whole}5"));
            std::iter::once(whole).chain(half_step)
        })
    }

    /// Generate the code → label table for this scale
    pub fn series(&self, label: impl Fn(&str) -> Option<String>) -> BTreeMap<String, String> {
        self.codes()
            .filter_map(|code| label(&code).map(|l| (code, l)))
            .collect()
    }

    /// Offset of a raw code from the zero reference, in tenths of a dB
    ///
    /// Out-of-range and malformed codes are logged and yield `None`.
    pub fn tenths(&self, code: &str) -> Option<i32> {
        if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
            tracing::error!("{} value {:?} is not numeric", self.name, code);
            return None;
        }

        let (digits, half) = if code.len() == self.width {
            (code, false)
        } else if code.len() == self.width + 1 && self.step == Step::Half && code.ends_with('5') {
            (&code[..self.width], true)
        } else {
            tracing::error!("{} value {} of length {} is unparsable", self.name, code, code.len());
            return None;
        };

        let value: u32 = digits.parse().ok()?;
        if value < self.min || value > self.max {
            tracing::error!(
                "{} value {} out of bounds ({}-{})",
                self.name,
                code,
                self.min,
                self.max
            );
            return None;
        }

        // Integer arithmetic keeps the sign right around 0 dB ("795" is -0.5)
        let raw_tenths = value as i32 * 10 + if half { 5 } else { 0 };
        Some(raw_tenths - self.zero_ref * 10)
    }
}

/// Fixed width like the front panel: sign or blank, two digit columns
fn display_label(tenths: i32) -> String {
    let sign = if tenths < 0 { '-' } else { ' ' };
    let abs = tenths.unsigned_abs();
    format!("{sign}{:>2}.{}dB", abs / 10, abs % 10)
}

fn signed_label(tenths: i32) -> String {
    let sign = if tenths < 0 { '-' } else { '+' };
    let abs = tenths.unsigned_abs();
    format!("{sign}{}.{}dB", abs / 10, abs % 10)
}

/// Master volume label, e.g. `"18"` → `"-62.0dB"`, `"80"` → `"  0.0dB"`
pub fn master_volume_label(code: &str) -> Option<String> {
    match code {
        "99" => Some(MINUS_INFINITY.to_string()),
        // Half step below the "99" sentinel, reported by the device at the bottom of the range
        "995" => Some("-80.5dB".to_string()),
        _ => MASTER_VOLUME.tenths(code).map(display_label),
    }
}

/// Channel volume label, e.g. `"50"` → `"+0.0dB"`, `"385"` → `"-11.5dB"`
pub fn channel_volume_label(code: &str) -> Option<String> {
    CHANNEL_VOLUME.tenths(code).map(signed_label)
}

/// Bass/treble label, e.g. `"44"` → `"-6.0dB"`
pub fn tone_label(code: &str) -> Option<String> {
    TONE.tenths(code).map(signed_label)
}

/// LFE level label, e.g. `"00"` → `"+0.0dB"`, `"05"` → `"-5.0dB"`
pub fn lfe_label(code: &str) -> Option<String> {
    LFE.tenths(code).map(|t| signed_label(-t))
}

/// Effect level label, e.g. `"01"` → `"+1.0dB"`
pub fn effect_level_label(code: &str) -> Option<String> {
    EFFECT_LEVEL.tenths(code).map(signed_label)
}

/// Label → raw code lookup built from a forward table
///
/// Labels are matched ignoring whitespace and a leading `+`, so both the
/// padded display form `"- 5.0dB"` and `"-5.0dB"` resolve.
#[derive(Debug, Clone, Default)]
pub struct ReverseIndex {
    by_label: HashMap<String, String>,
}

impl ReverseIndex {
    pub fn from_table(table: &BTreeMap<String, String>) -> Self {
        let by_label = table
            .iter()
            .map(|(code, label)| (normalize(label), code.clone()))
            .collect();
        Self { by_label }
    }

    /// Raw code for a label, or [`DenonError::UnknownVolume`]
    pub fn raw_code(&self, label: &str) -> Result<&str> {
        self.by_label
            .get(&normalize(label))
            .map(String::as_str)
            .ok_or_else(|| DenonError::UnknownVolume(label.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }
}

fn normalize(label: &str) -> String {
    let compact: String = label.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.strip_prefix('+') {
        Some(rest) => rest.to_string(),
        None => compact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_codes_are_fixed_width_half_steps() {
        let codes: Vec<String> = MASTER_VOLUME.codes().collect();
        assert_eq!(&codes[..4], ["00", "005", "01", "015"]);
        assert_eq!(codes.len(), 198);
        assert_eq!(codes.last().map(String::as_str), Some("985"));
    }

    #[test]
    fn whole_step_codes() {
        let codes: Vec<String> = EFFECT_LEVEL.codes().collect();
        assert_eq!(codes.first().map(String::as_str), Some("01"));
        assert_eq!(codes.last().map(String::as_str), Some("14"));
        assert_eq!(codes.len(), 14);
    }

    #[test]
    fn master_labels() {
        assert_eq!(master_volume_label("00").as_deref(), Some("-80.0dB"));
        assert_eq!(master_volume_label("005").as_deref(), Some("-79.5dB"));
        assert_eq!(master_volume_label("62").as_deref(), Some("-18.0dB"));
        assert_eq!(master_volume_label("75").as_deref(), Some("- 5.0dB"));
        assert_eq!(master_volume_label("80").as_deref(), Some("  0.0dB"));
        assert_eq!(master_volume_label("90").as_deref(), Some(" 10.0dB"));
        assert_eq!(master_volume_label("985").as_deref(), Some(" 18.5dB"));
    }

    #[test]
    fn master_half_steps_around_zero() {
        assert_eq!(master_volume_label("795").as_deref(), Some("- 0.5dB"));
        assert_eq!(master_volume_label("805").as_deref(), Some("  0.5dB"));
        assert_eq!(master_volume_label("185").as_deref(), Some("-61.5dB"));
    }

    #[test]
    fn master_quirks() {
        assert_eq!(master_volume_label("99").as_deref(), Some(MINUS_INFINITY));
        assert_eq!(master_volume_label("995").as_deref(), Some("-80.5dB"));
    }

    #[test]
    fn malformed_codes_have_no_label() {
        assert_eq!(master_volume_label("9"), None);
        assert_eq!(master_volume_label("1234"), None);
        assert_eq!(master_volume_label("ab"), None);
        assert_eq!(master_volume_label(""), None);
        assert_eq!(master_volume_label("186"), None);
        assert_eq!(tone_label("60"), None);
        assert_eq!(tone_label("445"), None);
    }

    #[test]
    fn channel_labels() {
        assert_eq!(channel_volume_label("38").as_deref(), Some("-12.0dB"));
        assert_eq!(channel_volume_label("385").as_deref(), Some("-11.5dB"));
        assert_eq!(channel_volume_label("495").as_deref(), Some("-0.5dB"));
        assert_eq!(channel_volume_label("50").as_deref(), Some("+0.0dB"));
        assert_eq!(channel_volume_label("615").as_deref(), Some("+11.5dB"));
        assert_eq!(channel_volume_label("37"), None);
    }

    #[test]
    fn derived_scale_labels() {
        assert_eq!(tone_label("44").as_deref(), Some("-6.0dB"));
        assert_eq!(tone_label("50").as_deref(), Some("+0.0dB"));
        assert_eq!(tone_label("55").as_deref(), Some("+5.0dB"));
        assert_eq!(lfe_label("00").as_deref(), Some("+0.0dB"));
        assert_eq!(lfe_label("05").as_deref(), Some("-5.0dB"));
        assert_eq!(effect_level_label("01").as_deref(), Some("+1.0dB"));
        assert_eq!(effect_level_label("14").as_deref(), Some("+14.0dB"));
    }

    #[test]
    fn series_labels_every_code() {
        let table = MASTER_VOLUME.series(master_volume_label);
        assert_eq!(table.len(), MASTER_VOLUME.codes().count());
        assert_eq!(table.get("62").map(String::as_str), Some("-18.0dB"));
    }

    #[test]
    fn reverse_index_round_trips_master_codes() {
        let table = MASTER_VOLUME.series(master_volume_label);
        let index = ReverseIndex::from_table(&table);
        for (code, label) in &table {
            assert_eq!(index.raw_code(label).ok(), Some(code.as_str()), "label {label:?}");
        }
    }

    #[test]
    fn reverse_index_ignores_padding() {
        let table = MASTER_VOLUME.series(master_volume_label);
        let index = ReverseIndex::from_table(&table);
        assert_eq!(index.raw_code("- 5.0dB").ok(), Some("75"));
        assert_eq!(index.raw_code("-5.0dB").ok(), Some("75"));
        assert_eq!(index.raw_code("0.0dB").ok(), Some("80"));
        assert_eq!(index.raw_code("+10.0dB").ok(), Some("90"));
    }

    #[test]
    fn reverse_index_unknown_label() {
        let table = MASTER_VOLUME.series(master_volume_label);
        let index = ReverseIndex::from_table(&table);
        match index.raw_code("-18.3dB") {
            Err(DenonError::UnknownVolume(label)) => assert_eq!(label, "-18.3dB"),
            other => panic!("expected UnknownVolume, got {other:?}"),
        }
    }
}
