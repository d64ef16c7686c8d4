/*!
 * Tests for hearing-impaired cleanup and the cue merge/balance stages.
 */

use lingosub::segmentation::{
    SegmentationOptions, balance_cue_length, merge_similar_consecutive, remove_hearing_impaired,
    segment, smart_merge_short_cues, strip_hearing_impaired,
};
use lingosub::subtitle_processor::SubtitleCue;

fn cue(index: usize, start_ms: u64, end_ms: u64, content: &str) -> SubtitleCue {
    SubtitleCue::new(index, start_ms, end_ms, content.to_string())
}

/// Test stripping bracketed annotations while keeping dialogue
#[test]
fn test_removeHearingImpaired_withBracketedAnnotation_shouldKeepDialogue() {
    assert_eq!(remove_hearing_impaired("[door slams] Hello"), "Hello");
    assert_eq!(remove_hearing_impaired("(laughs) Sure"), "Sure");
}

/// Test that annotation-only cues collapse to an empty string
#[test]
fn test_removeHearingImpaired_withAnnotationOnly_shouldReturnEmpty() {
    assert_eq!(remove_hearing_impaired("- [sighs]"), "");
    assert_eq!(remove_hearing_impaired("[music]"), "");
    assert_eq!(remove_hearing_impaired("Music"), "");
}

/// Test that a lone dash line left behind by cleanup is removed
#[test]
fn test_removeHearingImpaired_withLeftoverDash_shouldDropIt() {
    assert_eq!(remove_hearing_impaired("Hello\n- [gunshot]"), "Hello");
}

/// Test that cues emptied by cleanup are dropped and the rest renumbered
#[test]
fn test_stripHearingImpaired_shouldDropEmptyCuesAndRenumber() {
    let cues = vec![
        cue(1, 0, 1000, "[music]"),
        cue(2, 2000, 3000, "Hello there"),
    ];
    let result = strip_hearing_impaired(cues);

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].index, 1);
    assert_eq!(result[0].content, "Hello there");
}

/// Test merging identical consecutive cues within the gap threshold
#[test]
fn test_mergeSimilarConsecutive_withIdenticalAdjacent_shouldMerge() {
    let cues = vec![
        cue(1, 0, 1000, "Same line"),
        cue(2, 1500, 2500, "Same line"),
        cue(3, 3000, 4000, "Different"),
    ];
    let result = merge_similar_consecutive(cues, &SegmentationOptions::default());

    assert_eq!(result.len(), 2);
    assert_eq!(result[0].start_ms, 0);
    assert_eq!(result[0].end_ms, 2500);
    assert_eq!(result[1].content, "Different");
}

/// Test that a gap beyond the threshold prevents the merge
#[test]
fn test_mergeSimilarConsecutive_withLargeGap_shouldNotMerge() {
    let cues = vec![
        cue(1, 0, 1000, "Same line"),
        cue(2, 3500, 4500, "Same line"),
    ];
    let result = merge_similar_consecutive(cues, &SegmentationOptions::default());

    assert_eq!(result.len(), 2);
}

/// Test merging a run of very short cues into one
#[test]
fn test_smartMergeShortCues_withShortRun_shouldMergeGroup() {
    let cues = vec![
        cue(1, 0, 500, "Hi"),
        cue(2, 600, 1000, "ok"),
        cue(3, 1100, 1500, "no"),
    ];
    let result = smart_merge_short_cues(cues, &SegmentationOptions::default());

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].content, "Hiokno");
    assert_eq!(result[0].start_ms, 0);
    assert_eq!(result[0].end_ms, 1500);
}

/// Test that a group containing a long cue is left untouched
#[test]
fn test_smartMergeShortCues_withLongMember_shouldLeaveGroupAlone() {
    let cues = vec![
        cue(1, 0, 500, "Hi"),
        cue(2, 600, 2000, "This one is much longer"),
    ];
    let result = smart_merge_short_cues(cues, &SegmentationOptions::default());

    assert_eq!(result.len(), 2);
}

/// Test splitting an over-long cue at sentence breaks with contiguous,
/// conserved timing
#[test]
fn test_balanceCueLength_withTwoSentences_shouldSplitAndConserveTiming() {
    let content = "This is the first sentence here. And this is the second sentence.";
    let cues = vec![cue(1, 0, 10_000, content)];
    let result = balance_cue_length(cues, &SegmentationOptions::default());

    assert_eq!(result.len(), 2);
    assert_eq!(result[0].content, "This is the first sentence here.");
    assert_eq!(result[1].content.trim(), "And this is the second sentence.");

    // First part keeps the start, last part keeps the end, parts touch
    assert_eq!(result[0].start_ms, 0);
    assert_eq!(result[1].end_ms, 10_000);
    assert_eq!(result[0].end_ms, result[1].start_ms);
    assert!(result[0].end_ms > 0 && result[0].end_ms < 10_000);
}

/// Test that a cue within the length cap is not split
#[test]
fn test_balanceCueLength_withShortCue_shouldLeaveUntouched() {
    let cues = vec![cue(1, 0, 2000, "Short enough.")];
    let result = balance_cue_length(cues.clone(), &SegmentationOptions::default());

    assert_eq!(result, cues);
}

/// Test the full pipeline renumbers contiguously and drops annotation cues
#[test]
fn test_segment_shouldRenumberContiguously() {
    let cues = vec![
        cue(1, 0, 1000, "[music]"),
        cue(2, 2000, 3000, "Hello there, friend."),
        cue(3, 4000, 5000, "Another line of dialogue."),
    ];
    let result = segment(cues, &SegmentationOptions::default());

    assert_eq!(result.len(), 2);
    for (i, cue) in result.iter().enumerate() {
        assert_eq!(cue.index, i + 1);
        assert!(!cue.content.trim().is_empty());
    }
}
