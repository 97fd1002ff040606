use serde::{Deserialize, Serialize};

/// Target languages offered in the translation menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Cornish,
    Manx,
    Breton,
    Inuktitut,
    Kalaallisut,
    Romani,
    Occitan,
    Ladino,
    NorthernSami,
    UpperSorbian,
    Kashubian,
    Zazaki,
    Chuvash,
    Livonian,
    Tsakonian,
    Saramaccan,
    Bislama,
}

impl Language {
    pub const ALL: [Language; 17] = [
        Language::Cornish,
        Language::Manx,
        Language::Breton,
        Language::Inuktitut,
        Language::Kalaallisut,
        Language::Romani,
        Language::Occitan,
        Language::Ladino,
        Language::NorthernSami,
        Language::UpperSorbian,
        Language::Kashubian,
        Language::Zazaki,
        Language::Chuvash,
        Language::Livonian,
        Language::Tsakonian,
        Language::Saramaccan,
        Language::Bislama,
    ];

    /// Display name, also the value posted by the language picker.
    pub fn name(self) -> &'static str {
        match self {
            Language::Cornish => "Cornish",
            Language::Manx => "Manx",
            Language::Breton => "Breton",
            Language::Inuktitut => "Inuktitut",
            Language::Kalaallisut => "Kalaallisut",
            Language::Romani => "Romani",
            Language::Occitan => "Occitan",
            Language::Ladino => "Ladino",
            Language::NorthernSami => "Northern Sami",
            Language::UpperSorbian => "Upper Sorbian",
            Language::Kashubian => "Kashubian",
            Language::Zazaki => "Zazaki",
            Language::Chuvash => "Chuvash",
            Language::Livonian => "Livonian",
            Language::Tsakonian => "Tsakonian",
            Language::Saramaccan => "Saramaccan",
            Language::Bislama => "Bislama",
        }
    }

    /// Case-insensitive lookup by display name. `_` is accepted in place of a space.
    pub fn parse(raw: &str) -> Option<Language> {
        let wanted = raw.trim().replace('_', " ");
        Language::ALL
            .into_iter()
            .find(|lang| lang.name().eq_ignore_ascii_case(&wanted))
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
