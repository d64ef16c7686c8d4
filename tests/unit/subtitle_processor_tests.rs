/*!
 * Tests for the cue model, SRT parsing and text utilities.
 */

use lingosub::subtitle_processor::{
    SubtitleCue, clean_punctuation, compose_srt, count_cjk_chars, format_timecode,
    format_timestamp, parse_srt_string, renumber, write_srt_file,
};

use crate::common;

/// Test parsing a valid SRT timestamp to milliseconds
#[test]
fn test_parseTimestamp_withValidTimestamp_shouldReturnMillis() {
    assert_eq!(SubtitleCue::parse_timestamp("01:02:03,456").unwrap(), 3_723_456);
    assert_eq!(SubtitleCue::parse_timestamp("00:00:01.500").unwrap(), 1_500);
}

/// Test that out-of-range components are rejected
#[test]
fn test_parseTimestamp_withInvalidComponents_shouldFail() {
    assert!(SubtitleCue::parse_timestamp("00:61:00,000").is_err());
    assert!(SubtitleCue::parse_timestamp("00:00:00,1000").is_err());
    assert!(SubtitleCue::parse_timestamp("garbage").is_err());
}

/// Test formatting milliseconds back to SRT form
#[test]
fn test_formatTimestamp_shouldMatchSrtForm() {
    assert_eq!(format_timestamp(3_723_456), "01:02:03,456");
    assert_eq!(format_timestamp(0), "00:00:00,000");
}

/// Test the short prompt timecode form (no leading zero on hours)
#[test]
fn test_formatTimecode_shouldUseShortForm() {
    assert_eq!(format_timecode(1.0), "0:00:01.000");
    assert_eq!(format_timecode(3723.456), "1:02:03.456");
}

/// Test parsing the shared sample document
#[test]
fn test_parseSrtString_withSampleDocument_shouldParseAllCues() {
    let cues = parse_srt_string(common::SAMPLE_SRT).unwrap();

    assert_eq!(cues.len(), 3);
    assert_eq!(cues[0].index, 1);
    assert_eq!(cues[0].start_ms, 1_000);
    assert_eq!(cues[0].end_ms, 4_000);
    assert_eq!(cues[0].content, "This is a test subtitle.");
    assert_eq!(cues[2].content, "For testing purposes.");
}

/// Test that a BOM is tolerated and out-of-order cues are sorted and
/// renumbered by start time
#[test]
fn test_parseSrtString_withBomAndOutOfOrder_shouldSortAndRenumber() {
    let content = "\u{feff}2\n00:00:05,000 --> 00:00:08,000\nSecond\n\n1\n00:00:01,000 --> 00:00:04,000\nFirst\n";
    let cues = parse_srt_string(content).unwrap();

    assert_eq!(cues.len(), 2);
    assert_eq!(cues[0].content, "First");
    assert_eq!(cues[1].content, "Second");
    assert_eq!(cues[0].index, 1);
    assert_eq!(cues[1].index, 2);
}

/// Test that an invalid block is skipped instead of failing the parse
#[test]
fn test_parseSrtString_withInvalidBlock_shouldSkipIt() {
    // Second block has a reversed time range
    let content = "1\n00:00:01,000 --> 00:00:04,000\nGood\n\n2\n00:00:08,000 --> 00:00:05,000\nBad\n\n3\n00:00:09,000 --> 00:00:12,000\nAlso good\n";
    let cues = parse_srt_string(content).unwrap();

    assert_eq!(cues.len(), 2);
    assert_eq!(cues[0].content, "Good");
    assert_eq!(cues[1].content, "Also good");
    assert_eq!(cues[1].index, 2);
}

/// Test that a document with no valid cues is an error
#[test]
fn test_parseSrtString_withOnlyGarbage_shouldFail() {
    assert!(parse_srt_string("this is not a subtitle file").is_err());
    assert!(parse_srt_string("").is_err());
}

/// Test that multi-line cue content is joined with newlines
#[test]
fn test_parseSrtString_withMultilineContent_shouldJoinLines() {
    let content = "1\n00:00:01,000 --> 00:00:04,000\nFirst line\nSecond line\n";
    let cues = parse_srt_string(content).unwrap();

    assert_eq!(cues.len(), 1);
    assert_eq!(cues[0].content, "First line\nSecond line");
}

/// Test that serializing and re-parsing preserves the cues
#[test]
fn test_composeSrt_thenParse_shouldRoundTrip() {
    let cues = parse_srt_string(common::SAMPLE_SRT).unwrap();
    let document = compose_srt(&cues);
    let reparsed = parse_srt_string(&document).unwrap();

    assert_eq!(cues, reparsed);
}

/// Test that writing creates parent directories and a readable file
#[test]
fn test_writeSrtFile_shouldCreateParentDirectories() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = temp_dir.path().join("nested").join("output.srt");
    let cues = parse_srt_string(common::SAMPLE_SRT).unwrap();

    write_srt_file(&cues, &path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("00:00:01,000 --> 00:00:04,000"));
    assert_eq!(parse_srt_string(&written).unwrap(), cues);
}

/// Test renumbering to a contiguous 1..N sequence
#[test]
fn test_renumber_shouldAssignContiguousIndices() {
    let mut cues = vec![
        SubtitleCue::new(7, 0, 1000, "a".to_string()),
        SubtitleCue::new(9, 2000, 3000, "b".to_string()),
    ];
    renumber(&mut cues);

    assert_eq!(cues[0].index, 1);
    assert_eq!(cues[1].index, 2);
}

/// Test that only CJK ideographs are counted
#[test]
fn test_countCjkChars_shouldCountOnlyIdeographs() {
    assert_eq!(count_cjk_chars("Hello 你好!"), 2);
    assert_eq!(count_cjk_chars("no cjk here"), 0);
    assert_eq!(count_cjk_chars("字幕翻译"), 4);
}

/// Test punctuation replacement and whitespace collapsing
#[test]
fn test_cleanPunctuation_shouldReplaceMarksWithSpaces() {
    assert_eq!(clean_punctuation("你好，世界！"), "你好 世界");
    assert_eq!(clean_punctuation("Hello, world!"), "Hello world");
    assert_eq!(clean_punctuation("【注】《标题》。"), "注 标题");
}
