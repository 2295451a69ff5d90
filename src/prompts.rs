//! Prompt builders, one per AI task. All functions are pure.

use crate::models::TranslationStyle;

pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are an experienced English teacher who builds \
    vocabulary lists for advanced Chinese-speaking learners. Always respond with a valid JSON \
    array in the requested format and nothing else.";

pub const TRANSLATION_SYSTEM_PROMPT: &str =
    "You are a professional song lyric translator working from English into Simplified Chinese.";

pub const EVALUATION_SYSTEM_PROMPT: &str = "You are a fair but precise English teacher grading \
    vocabulary exercises. Always respond with valid JSON in the requested format.";

pub const GENERATION_SYSTEM_PROMPT: &str = "You are an English teacher writing short practice \
    material. Always respond with valid JSON in the requested format.";

pub const TRANSLATION_EVALUATION_SYSTEM_PROMPT: &str = "You are an English teacher grading \
    Chinese-to-English translations. Reply using exactly the three-line template you are given.";

/// Everyday words that never count as advanced vocabulary, however often they appear in lyrics
const COMMON_LYRIC_WORDS: &[&str] = &[
    "love", "baby", "heart", "night", "day", "time", "life", "world", "feel", "know", "want",
    "need", "never", "forever", "tonight", "girl", "boy", "dance", "dream", "cry", "kiss", "home",
    "light", "fire", "rain", "sky", "yeah", "oh", "hey", "gonna", "wanna", "gotta",
];

impl TranslationStyle {
    /// Directive appended to translation-bearing prompts
    pub fn instruction(&self) -> &'static str {
        match self {
            TranslationStyle::Natural => {
                "Translate naturally and fluently, the way a native Chinese speaker would phrase \
                 it, keeping the original meaning."
            }
            TranslationStyle::Literal => {
                "Translate faithfully and close to the original wording and structure, so a \
                 learner can map each part back to the English."
            }
            TranslationStyle::Poetic => {
                "Translate with a lyrical, poetic tone that keeps the mood and imagery of the \
                 song, while staying accurate."
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionPromptParams<'a> {
    pub lyrics: &'a str,
    pub song_title: &'a str,
    pub style: TranslationStyle,
    /// Words the user never wants to see
    pub blacklist: &'a [String],
    /// Words already collected in earlier rounds
    pub exclude: &'a [String],
    pub max_items: usize,
}

pub fn vocabulary_extraction(params: &ExtractionPromptParams<'_>) -> String {
    let mut clauses = String::new();

    if !params.blacklist.is_empty() {
        clauses.push_str(&format!(
            "\n- NEVER include any of these words (the learner has blacklisted them): {}",
            params.blacklist.join(", ")
        ));
    }

    if !params.exclude.is_empty() {
        clauses.push_str(&format!(
            "\n- These words were already extracted, do NOT repeat them: {}",
            params.exclude.join(", ")
        ));
    }

    format!(
        r#"Extract advanced English vocabulary from the lyrics of the song "{title}".

Lyrics:
"""
{lyrics}
"""

RULES:
- Only pick words at CEFR level B2, C1 or C2. Skip anything a B1 learner already knows.
- Skip everyday high-frequency lyric words such as: {common}.
- Skip proper nouns, interjections, fillers and slang contractions.
- Normalise each word to its dictionary form: verbs in the base form ("wandered" -> "wander"),
  nouns in the singular, adjectives in the positive degree.
- Keep a phrasal verb or fixed phrase whole when its meaning differs from its parts.
- "replaceWord" must be the exact form as it appears in the lyric line (e.g. "wandered"),
  so it can be highlighted.
- "meaning" is a concise Simplified Chinese gloss; separate multiple senses with "；".
- "sentenceEn" is the full lyric line containing the word; "sentence" is its Chinese translation.
- "example" is a NEW everyday English sentence using the word;
  "exampleZh" is its Chinese translation.
- Return at most {max_items} items, most valuable first.{clauses}

TRANSLATION STYLE: {style}

Respond with a JSON array in this exact format:
[
    {{
        "word": "wander",
        "pos": "v.",
        "meaning": "漫游；徘徊",
        "level": "B2",
        "sentence": "我在空荡的街道上徘徊",
        "sentenceEn": "I wandered through the empty streets",
        "replaceWord": "wandered",
        "example": "We wandered around the old town all afternoon.",
        "exampleZh": "我们整个下午都在老城里闲逛。"
    }}
]

If there are no suitable words, respond with an empty array []."#,
        title = params.song_title,
        lyrics = params.lyrics.trim(),
        common = COMMON_LYRIC_WORDS.join(", "),
        max_items = params.max_items,
        clauses = clauses,
        style = params.style.instruction(),
    )
}

pub fn lyric_translation(lyrics: &str, style: TranslationStyle) -> String {
    format!(
        r#"Translate the following song lyrics into Simplified Chinese.

- Translate whole sentences in context. Do NOT translate word by word.
- Keep the original line breaks: one translated line for each original line.
- Output only the translation, without notes or the original text.

STYLE: {}

Lyrics:
"""
{}
""""#,
        style.instruction(),
        lyrics.trim()
    )
}

#[derive(Debug, Clone)]
pub struct FillEvaluationParams<'a> {
    /// Sentence with the target word blanked out
    pub sentence: &'a str,
    pub translation: &'a str,
    pub expected: &'a str,
    pub meaning: &'a str,
    pub answer: &'a str,
}

pub fn fill_blank_evaluation(params: &FillEvaluationParams<'_>) -> String {
    format!(
        r#"A learner is completing a fill-in-the-blank exercise.

Sentence: {sentence}
Chinese translation: {translation}
Expected word: {expected}
Meaning: {meaning}
Learner's answer: {answer}

GRADING RULES:
- Accept the expected word in any grammatically correct form for this blank (tense, plural, etc.).
- Tolerate at most ONE character of spelling deviation (a single typo) and still mark it
  correct, with a slightly lower score.
- Accept a synonym only if it fits the sentence and carries the same meaning; give it a lower score.
- Anything else is incorrect.

Give a score from 0 to 100, where 70 or more means correct.

Respond with a JSON object in this exact format:
{{
    "isCorrect": true,
    "score": 85,
    "feedback": "简短的中文反馈，指出正确或错误之处"
}}"#,
        sentence = params.sentence,
        translation = params.translation,
        expected = params.expected,
        meaning = params.meaning,
        answer = params.answer.trim(),
    )
}

pub fn practice_sentence(word: &str, meaning: &str, level: &str) -> String {
    format!(
        r#"Write one new, natural English sentence (10-20 words) that uses
the word "{word}" (meaning: {meaning}, level {level}).

- The word must appear exactly once, in the form "{word}" or a regular inflection of it.
- The context must make the meaning guessable, so the sentence works as a
  fill-in-the-blank exercise.
- Provide a Simplified Chinese translation.

Respond with a JSON object in this exact format:
{{
    "sentence": "English sentence here",
    "translation": "中文翻译"
}}"#
    )
}

pub fn reverse_question(word: &str, meaning: &str) -> String {
    format!(
        r#"Create a translation exercise for a Chinese-speaking learner practising
the English word "{word}" (meaning: {meaning}).

- Write one natural Simplified Chinese sentence (10-25 characters) whose most natural
  English translation uses "{word}".
- Do not include any English in the sentence.

Respond with a JSON object in this exact format:
{{
    "sentence": "中文句子"
}}"#
    )
}

pub fn translation_evaluation(question: &str, word: &str, answer: &str) -> String {
    format!(
        r#"A learner translated a Chinese sentence into English and was asked to use
the word "{word}".

Chinese sentence: {question}
Learner's translation: {answer}

Grade the translation from 0 to 100 for meaning, grammar and correct use of "{word}".
70 or more means acceptable.

Reply with EXACTLY these three lines and nothing else:
Score: <number>/100
Correct: "<a natural English translation that uses {word}>"
Reason: <one short sentence of feedback in Chinese>"#,
        answer = answer.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params<'a>(blacklist: &'a [String], exclude: &'a [String]) -> ExtractionPromptParams<'a> {
        ExtractionPromptParams {
            lyrics: "  I wandered through the empty streets\nChasing ephemeral light  ",
            song_title: "Empty Streets",
            style: TranslationStyle::Poetic,
            blacklist,
            exclude,
            max_items: 20,
        }
    }

    #[test]
    fn test_extraction_prompt_embeds_inputs() {
        let prompt = vocabulary_extraction(&params(&[], &[]));

        assert!(prompt.contains("\"Empty Streets\""));
        assert!(prompt.contains("I wandered through the empty streets\nChasing ephemeral light"));
        assert!(prompt.contains("at most 20 items"));
        assert!(prompt.contains(TranslationStyle::Poetic.instruction()));
        assert!(prompt.contains("\"replaceWord\""));
        assert!(!prompt.contains("blacklisted"));
        assert!(!prompt.contains("already extracted"));
    }

    #[test]
    fn test_extraction_prompt_blacklist_and_exclusions() {
        let blacklist = vec!["ephemeral".to_string(), "wander".to_string()];
        let exclude = vec!["serene".to_string()];
        let prompt = vocabulary_extraction(&params(&blacklist, &exclude));

        assert!(prompt.contains("blacklisted them): ephemeral, wander"));
        assert!(prompt.contains("do NOT repeat them: serene"));
    }

    #[test]
    fn test_translation_prompt_is_sentence_level() {
        let prompt = lyric_translation("Hello darkness", TranslationStyle::Literal);
        assert!(prompt.contains("Do NOT translate word by word"));
        assert!(prompt.contains(TranslationStyle::Literal.instruction()));
        assert!(prompt.contains("Hello darkness"));
    }

    #[test]
    fn test_fill_evaluation_prompt() {
        let prompt = fill_blank_evaluation(&FillEvaluationParams {
            sentence: "We ____ around the old town.",
            translation: "我们在老城里闲逛。",
            expected: "wander",
            meaning: "漫游；徘徊",
            answer: "  wandered ",
        });

        assert!(prompt.contains("Expected word: wander"));
        assert!(prompt.contains("Learner's answer: wandered\n"));
        assert!(prompt.contains("ONE character"));
        assert!(prompt.contains("\"isCorrect\""));
    }

    #[test]
    fn test_generation_prompts_name_the_word() {
        let prompt = practice_sentence("resilient", "有韧性的", "C1");
        assert!(prompt.contains("\"resilient\" (meaning: 有韧性的, level C1)"));
        assert!(reverse_question("resilient", "有韧性的").contains("uses \"resilient\""));
    }

    #[test]
    fn test_translation_evaluation_prompt_uses_template() {
        let prompt = translation_evaluation("她很有韧性。", "resilient", "She is resilient.");
        assert!(prompt.contains("Score: <number>/100"));
        assert!(
            prompt.contains("Correct: \"<a natural English translation that uses resilient>\"")
        );
        assert!(prompt.contains("Reason: "));
        assert!(prompt.contains("Learner's translation: She is resilient."));
    }
}
