/// Display names for the ISO-639 codes we expect to see on media tracks.
/// Both the two-letter and the bibliographic three-letter forms are accepted.
const LANGUAGES: &[(&str, &str, &str)] = &[
    ("en", "eng", "English"),
    ("es", "spa", "Spanish"),
    ("fr", "fre", "French"),
    ("de", "ger", "German"),
    ("it", "ita", "Italian"),
    ("pt", "por", "Portuguese"),
    ("ru", "rus", "Russian"),
    ("ja", "jpn", "Japanese"),
    ("ko", "kor", "Korean"),
    ("zh", "chi", "Chinese"),
    ("ar", "ara", "Arabic"),
    ("hi", "hin", "Hindi"),
    ("nl", "dut", "Dutch"),
    ("sv", "swe", "Swedish"),
    ("no", "nor", "Norwegian"),
    ("da", "dan", "Danish"),
    ("fi", "fin", "Finnish"),
    ("pl", "pol", "Polish"),
    ("tr", "tur", "Turkish"),
    ("el", "gre", "Greek"),
    ("he", "heb", "Hebrew"),
    ("th", "tha", "Thai"),
    ("cs", "cze", "Czech"),
    ("hu", "hun", "Hungarian"),
];

// Terminology codes some muxers write instead of the bibliographic ones
const ALIASES: &[(&str, &str)] = &[
    ("fra", "fr"),
    ("deu", "de"),
    ("zho", "zh"),
    ("nld", "nl"),
    ("ell", "el"),
    ("ces", "cs"),
    ("nob", "no"),
];

/// Human-readable language name; unknown codes come back upper-cased
pub fn display_name(code: &str) -> String {
    let code = code.trim().to_ascii_lowercase();
    let code = ALIASES
        .iter()
        .find(|(alias, _)| *alias == code)
        .map(|(_, short)| short.to_string())
        .unwrap_or(code);

    LANGUAGES
        .iter()
        .find(|(short, long, _)| *short == code || *long == code)
        .map(|(_, _, name)| name.to_string())
        .unwrap_or_else(|| code.to_uppercase())
}
