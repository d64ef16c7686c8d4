/*!
 * Tests for ISO language code normalization and prompt naming.
 */

use lingosub::language_utils::{
    get_language_name, language_codes_match, normalize_to_part2t, prompt_name,
};

/// Test normalizing 2-letter codes to ISO 639-2/T
#[test]
fn test_normalizeToPart2t_with2LetterCode_shouldReturn3Letter() {
    assert_eq!(normalize_to_part2t("en").unwrap(), "eng");
    assert_eq!(normalize_to_part2t("zh").unwrap(), "zho");
    assert_eq!(normalize_to_part2t(" FR ").unwrap(), "fra");
}

/// Test that ISO 639-2/B codes resolve to their /T equivalents
#[test]
fn test_normalizeToPart2t_withPart2bCode_shouldReturnPart2t() {
    assert_eq!(normalize_to_part2t("fre").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("chi").unwrap(), "zho");
    assert_eq!(normalize_to_part2t("ger").unwrap(), "deu");
}

/// Test that invalid codes are rejected
#[test]
fn test_normalizeToPart2t_withInvalidCode_shouldFail() {
    assert!(normalize_to_part2t("xx").is_err());
    assert!(normalize_to_part2t("notacode").is_err());
    assert!(normalize_to_part2t("").is_err());
}

/// Test matching codes across formats
#[test]
fn test_languageCodesMatch_shouldCompareNormalizedForms() {
    assert!(language_codes_match("en", "eng"));
    assert!(language_codes_match("zh", "chi"));
    assert!(!language_codes_match("en", "fr"));
    assert!(!language_codes_match("en", "invalid"));
}

/// Test resolving English names from codes
#[test]
fn test_getLanguageName_withValidCode_shouldReturnEnglishName() {
    assert_eq!(get_language_name("en").unwrap(), "English");
    assert_eq!(get_language_name("fr").unwrap(), "French");
    assert!(get_language_name("zz").is_err());
}

/// Test that prompt names fall back to the raw tag for free-form input
#[test]
fn test_promptName_withFreeFormName_shouldPassThrough() {
    assert_eq!(prompt_name("en"), "English");
    assert_eq!(prompt_name("Simplified Chinese"), "Simplified Chinese");
    assert_eq!(prompt_name("  Klingon  "), "Klingon");
}
