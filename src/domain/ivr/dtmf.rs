/// DTMF tone vocabulary reported by the provider's recognizer
use serde::{Deserialize, Serialize};

/// DTMF tone representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DtmfTone {
    Zero,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    A,
    B,
    C,
    D,
    Asterisk,
    Pound,
}

impl DtmfTone {
    /// Convert to keypad character
    pub fn to_char(&self) -> char {
        match self {
            DtmfTone::Zero => '0',
            DtmfTone::One => '1',
            DtmfTone::Two => '2',
            DtmfTone::Three => '3',
            DtmfTone::Four => '4',
            DtmfTone::Five => '5',
            DtmfTone::Six => '6',
            DtmfTone::Seven => '7',
            DtmfTone::Eight => '8',
            DtmfTone::Nine => '9',
            DtmfTone::A => 'A',
            DtmfTone::B => 'B',
            DtmfTone::C => 'C',
            DtmfTone::D => 'D',
            DtmfTone::Asterisk => '*',
            DtmfTone::Pound => '#',
        }
    }

    /// Parse from keypad character
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(DtmfTone::Zero),
            '1' => Some(DtmfTone::One),
            '2' => Some(DtmfTone::Two),
            '3' => Some(DtmfTone::Three),
            '4' => Some(DtmfTone::Four),
            '5' => Some(DtmfTone::Five),
            '6' => Some(DtmfTone::Six),
            '7' => Some(DtmfTone::Seven),
            '8' => Some(DtmfTone::Eight),
            '9' => Some(DtmfTone::Nine),
            'A' | 'a' => Some(DtmfTone::A),
            'B' | 'b' => Some(DtmfTone::B),
            'C' | 'c' => Some(DtmfTone::C),
            'D' | 'd' => Some(DtmfTone::D),
            '*' => Some(DtmfTone::Asterisk),
            '#' => Some(DtmfTone::Pound),
            _ => None,
        }
    }

    /// Parse a tone name as sent in recognition results (`"one"`, `"pound"`).
    ///
    /// Single keypad characters are accepted as well.
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.trim().to_ascii_lowercase();
        let tone = match lowered.as_str() {
            "zero" => DtmfTone::Zero,
            "one" => DtmfTone::One,
            "two" => DtmfTone::Two,
            "three" => DtmfTone::Three,
            "four" => DtmfTone::Four,
            "five" => DtmfTone::Five,
            "six" => DtmfTone::Six,
            "seven" => DtmfTone::Seven,
            "eight" => DtmfTone::Eight,
            "nine" => DtmfTone::Nine,
            "asterisk" | "star" => DtmfTone::Asterisk,
            "pound" | "hash" => DtmfTone::Pound,
            other => {
                let mut chars = other.chars();
                return match (chars.next(), chars.next()) {
                    (Some(c), None) => Self::from_char(c),
                    _ => None,
                };
            }
        };
        Some(tone)
    }
}

/// Convert a list of tone names into the keypad string.
///
/// Unknown names are kept verbatim so the result never matches a menu option.
pub fn tones_to_string<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|name| match DtmfTone::from_name(name.as_ref()) {
            Some(tone) => tone.to_char().to_string(),
            None => name.as_ref().to_string(),
        })
        .collect()
}
