/*!
 * Prompt templates for the translation pipelines.
 *
 * The instructions are written in the target-audience language (Chinese)
 * because models follow formatting contracts more reliably when the
 * contract language matches the expected output language. Placeholders
 * use `{name}` and are filled by simple substitution.
 */

use crate::subtitle_processor::{format_timecode, SubtitleCue};

/// A rendered system/user message pair
#[derive(Debug, Clone)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// A prompt template with `{name}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: &'static str,
}

impl PromptTemplate {
    pub const fn new(template: &'static str) -> Self {
        Self { template }
    }

    /// Render the template with the given variables.
    pub fn render(&self, values: &[(&str, &str)]) -> String {
        let mut rendered = self.template.to_string();
        for (name, value) in values {
            rendered = rendered.replace(&format!("{{{}}}", name), value);
        }
        rendered
    }
}

const BATCH_SYSTEM: PromptTemplate = PromptTemplate::new(
    r#"你是一个专业的{source_language}到{target_language}字幕翻译专家。
请遵循以下翻译规则:
1. 只翻译提供的字幕文本，保持语义准确
2. 翻译要自然流畅，符合目标语言习惯，不要生硬直译
3. 保持术语一致性
4. 严格保留提供的编号格式 [数字]
5. 直接翻译，不要输出原文
6. 不要添加任何解释、注释或前缀
7. 不要出现"翻译："、"最终翻译"等文字
8. 不要输出"根据您提供的规则"、"以下是翻译结果"等任何引导性文字
9. 每个编号只对应一个翻译内容，不要混淆或重复编号
10. 严格按照原始编号顺序翻译，不要跳过或重复编号
11. 只输出翻译结果，不要有任何多余的文字
12. 不要输出"根据时间轴和字幕长度要求"等任何解释性文字
13. 只需直接输出格式为[编号] 翻译内容的结果，不需要任何其他内容
14. 禁止在翻译内容前添加任何形式的说明或解释
15. 即使是第一条翻译，也不要添加任何说明

输出格式示例（正确的）:
[1] 这是第一条翻译
[2] 这是第二条翻译

错误的输出示例:
根据您提供的规则，以下是翻译结果：
[1] 这是第一条翻译
[2] 这是第二条翻译
"#,
);

const BATCH_USER: PromptTemplate = PromptTemplate::new(
    r#"请将以下{source_language}字幕批量翻译为{target_language}:

{batch_text}

请注意:
1. 直接翻译，不要输出原文
2. 严格保持[数字]格式
3. 不要添加任何解释或注释
4. 不要输出"翻译："、"最终翻译"等任何前缀
5. 不要输出"根据您提供的规则"等任何引导性文字
6. 只输出翻译结果，不要有任何其他内容

直接以下列格式返回结果:
[1] 翻译内容1
[2] 翻译内容2
...
"#,
);

const DRAFT_SYSTEM: PromptTemplate = PromptTemplate::new(
    r#"你是一位专业的{source_language}到{target_language}字幕翻译专家。
请将提供的字幕批量翻译。
请遵循以下规则:
1. 保持翻译的准确性和流畅度
2. 保持一致的翻译风格
3. 在翻译过程中注意提取专业术语
4. 提供简洁有效的译文，不过度解释或增加内容
"#,
);

const DRAFT_USER: PromptTemplate = PromptTemplate::new(
    r#"请翻译以下字幕，并从中提取专业术语:

{batch_text}

请以如下格式返回结果:
1. 首先列出所有翻译结果，使用[编号]标记
2. 然后提供你发现的术语表

返回格式:
[1] 翻译1
[2] 翻译2
...

术语表:
术语1 | 翻译1
术语2 | 翻译2
...
"#,
);

const TERMINOLOGY_SYSTEM: PromptTemplate = PromptTemplate::new(
    r#"你是一位{source_language}到{target_language}的专业术语专家。
请审核和改进以下从字幕中提取的术语表，确保术语翻译的准确性和一致性。
你需要:
1. 合并重复或相似的术语
2. 纠正不准确的翻译
3. 标准化术语的翻译方式
4. 删除不是真正术语的条目
"#,
);

const TERMINOLOGY_USER: PromptTemplate = PromptTemplate::new(
    r#"请审核以下术语表:

{terms_list}

请返回改进后的术语表，格式为:
术语1 | 翻译1
术语2 | 翻译2
...
"#,
);

const REFINE_SYSTEM: PromptTemplate = PromptTemplate::new(
    r#"你是一位专业的{source_language}到{target_language}字幕翻译专家。
请对初步翻译的字幕进行优化和调整。

请遵循以下规则:
1. 保持翻译的准确性和流畅度
2. 确保每条字幕语义完整，长度适中（每行不超过42个字符）
3. 使用术语表中的标准翻译
4. 考虑时间轴信息，为每条字幕进行时间轴优化
5. 优化时间轴时，请确保每个句子显示时长与原字幕中一致，尽量与原字幕时间轴匹配，尤其是未合并也未拆分的句子时间轴应保持不变
6. 合并过短的字幕，拆分过长的字幕
7. 调整断句时，要将原文和译文联合考虑，使最终的原文和译文行数相同
8. 以结构化数据格式返回结果，包含原文、时间轴和翻译
9. 保留完整的原文内容，不要修改原文
10. 确保原文和翻译都包含在最终输出中
"#,
);

const REFINE_USER: PromptTemplate = PromptTemplate::new(
    r#"请根据以下字幕的初步翻译和时间轴信息进行最终优化和调整。确保字幕语义完整、长度适中，且与原字幕时间轴匹配：

{entries_block}
{terminology_section}

请以结构化格式返回结果，每个字幕包含四部分信息：编号、时间轴、原文和翻译。
格式如下：

#1#
TIME: 0:00:00.000 --> 0:00:00.000
ORIG: 原始文本1
TRANS: 翻译文本1

#2#
TIME: 0:00:00.000 --> 0:00:00.000
ORIG: 原始文本2
TRANS: 翻译文本2

... 依此类推 ...

严格按照这个格式，这样我们可以准确提取出每条字幕的完整信息。不要添加任何其他内容或解释。
"#,
);

const CORRECTION_SYSTEM: PromptTemplate = PromptTemplate::new(
    r##"你是一位专业的字幕翻译修复专家。
请修复以下字幕中存在问题的部分（标记为"未翻译"或以"#"开头的行）。

请遵循以下规则:
1. 只修改有问题的字幕行，如果有需要，有问题行的前后3行也可以进行修改调整以优化断句，但其他行应保持不变
2. 使用上下文理解内容，确保翻译的连贯性和准确性
3. 返回完整的修复后字幕块，包括未修改的行
4. 确保每条字幕格式与原格式一致
5. 如果是双语字幕（包含原文和译文），保持双语格式
6. 修复后的字幕应与上下文保持一致的语言风格
7. 确保时间轴信息正确（按照格式：小时:分钟:秒,毫秒）
8. 不要添加任何额外的解释、注释或前缀
9. 只返回修复后的字幕块，不要包含其他内容

必须严格按照以下格式返回结果:

<translation index="1">修复后的译文1</translation>
<translation index="2">修复后的译文2</translation>
...

注意事项：
- 只返回需要修复的字幕，不需要返回没有问题的字幕
- index是字幕的序号，应该与原字幕序号一致
- 不要添加任何额外的解释或注释，只返回XML标签包裹的翻译内容
- 不要包含时间轴信息或原文内容，只需要返回翻译文本
- 不要使用Markdown格式或其他标记语言"##,
);

const CORRECTION_USER: PromptTemplate = PromptTemplate::new(
    r##"以下是需要检查和修复的字幕块（每个字幕块包含字幕序号、时间码、译文和原文）：

{subtitle_blocks}

请识别并修复含有"未翻译"字样或以"#"开头的字幕行。

仅输出修复后的字幕翻译结果，使用以下XML格式：
<translation index="字幕序号">修复后的译文</translation>

示例：
<translation index="1272">在争吵中对方</translation>
<translation index="1273">在争吵中</translation>

注意：
1. 只输出需要修复的字幕，不需要输出没有问题的字幕
2. 字幕序号必须与原字幕序号完全匹配
3. 不要包含任何解释、注释或其他内容
4. 不要输出时间轴信息或原文，只输出译文"##,
);

/// Prompt factory bound to a language pair.
///
/// Language names should already be human-readable; see
/// [`crate::language_utils::prompt_name`].
#[derive(Debug, Clone)]
pub struct PromptSet {
    source_language: String,
    target_language: String,
}

impl PromptSet {
    pub fn new(source_language: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            source_language: source_language.into(),
            target_language: target_language.into(),
        }
    }

    fn languages(&self) -> [(&str, &str); 2] {
        [
            ("source_language", self.source_language.as_str()),
            ("target_language", self.target_language.as_str()),
        ]
    }

    /// Standard-pipeline batch request. Items carry their display
    /// number, which also anchors response parsing.
    pub fn batch(&self, items: &[(usize, &str)]) -> PromptPair {
        let batch_text = items
            .iter()
            .map(|(number, text)| format!("[{}] {}", number, text))
            .collect::<Vec<_>>()
            .join("\n");

        let [source, target] = self.languages();
        PromptPair {
            system: BATCH_SYSTEM.render(&[source, target]),
            user: BATCH_USER.render(&[source, target, ("batch_text", &batch_text)]),
        }
    }

    /// Draft-phase request: translations plus an extracted glossary
    pub fn draft(&self, texts: &[String]) -> PromptPair {
        let batch_text = texts
            .iter()
            .enumerate()
            .map(|(i, text)| format!("[{}] {}", i + 1, text))
            .collect::<Vec<_>>()
            .join("\n");

        let [source, target] = self.languages();
        PromptPair {
            system: DRAFT_SYSTEM.render(&[source, target]),
            user: DRAFT_USER.render(&[source, target, ("batch_text", &batch_text)]),
        }
    }

    /// Terminology-review request over `source | target` lines
    pub fn terminology_review(&self, terms_list: &str) -> PromptPair {
        let [source, target] = self.languages();
        PromptPair {
            system: TERMINOLOGY_SYSTEM.render(&[source, target]),
            user: TERMINOLOGY_USER.render(&[("terms_list", terms_list)]),
        }
    }

    /// Refinement-phase request pairing each cue with its draft and
    /// timing.
    pub fn refine(
        &self,
        cues: &[SubtitleCue],
        drafts: &[String],
        terminology_section: &str,
    ) -> PromptPair {
        let mut entries_block = String::new();
        for (i, cue) in cues.iter().enumerate() {
            let draft = drafts.get(i).map(String::as_str).unwrap_or("");
            let start = cue.start_ms as f64 / 1000.0;
            let end = cue.end_ms as f64 / 1000.0;
            entries_block.push_str(&format!(
                "[{number}] 原文: {content}\n时间轴: {start} --> {end} (时长: {duration:.2}秒)\n初步翻译: [{number}] {draft}\n\n",
                number = i + 1,
                content = cue.content,
                start = format_timecode(start),
                end = format_timecode(end),
                duration = end - start,
            ));
        }

        let [source, target] = self.languages();
        PromptPair {
            system: REFINE_SYSTEM.render(&[source, target]),
            user: REFINE_USER.render(&[
                ("entries_block", entries_block.trim_end()),
                ("terminology_section", terminology_section),
            ]),
        }
    }
}

/// Error-correction request over pre-formatted subtitle blocks.
///
/// Language-independent: the repair instructions reference the
/// surrounding context rather than the language pair.
pub fn correction(subtitle_blocks: &str) -> PromptPair {
    PromptPair {
        system: CORRECTION_SYSTEM.render(&[]),
        user: CORRECTION_USER.render(&[("subtitle_blocks", subtitle_blocks)]),
    }
}
