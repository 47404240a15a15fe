//! crates/edem_core/src/emotion.rs
//!
//! Keyword-based emotional classification of incoming messages. Two layers:
//! the coarse five-state classifier that feeds the prompt composer, and the
//! richer `MessageAnalyzer` whose output drives automatic voice selection.
//! Both are pure functions over fixed tables.

use regex::Regex;

/// Coarse emotional state of a message. Transient; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmotionState {
    Tired,
    Anxious,
    Lost,
    Angry,
    Neutral,
}

impl EmotionState {
    /// The state's name as the system prompt spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionState::Tired => "tired",
            EmotionState::Anxious => "anxious",
            EmotionState::Lost => "lost",
            EmotionState::Angry => "angry",
            EmotionState::Neutral => "neutral",
        }
    }
}

/// Classifier over an ordered rule table: the first matching category wins,
/// so the table order IS the priority order (tired > anxious > lost > angry).
pub struct EmotionClassifier {
    rules: Vec<(EmotionState, Regex)>,
}

impl EmotionClassifier {
    pub fn new(rules: Vec<(EmotionState, Regex)>) -> Self {
        Self { rules }
    }

    pub fn with_default_rules() -> Self {
        let table = [
            (
                EmotionState::Tired,
                r"(не хочу|устал|устала|устали|сил нет|выгорел|выгорела|выгорели|tired|exhausted|burned out|no energy|drained)",
            ),
            (
                EmotionState::Anxious,
                r"(боюсь|тревога|тревожно|паника|страшно|беспокоюсь|волнуюсь|нервничаю|anxious|panic|scared|afraid|worried)",
            ),
            (
                EmotionState::Lost,
                r"(не знаю|пусто|ничего не чувствую|потерялся|потерялась|запутался|запуталась|не понимаю|confused|don't know|don't understand)",
            ),
            (
                EmotionState::Angry,
                r"(злюсь|злишься|злится|бесит|выбесило|ненавижу|angry|furious|hate)",
            ),
        ];
        Self::new(
            table
                .into_iter()
                .map(|(state, pattern)| (state, Regex::new(pattern).unwrap()))
                .collect(),
        )
    }

    /// Total function: every input maps to exactly one state.
    pub fn classify(&self, message: &str) -> EmotionState {
        let text = message.to_lowercase();
        self.rules
            .iter()
            .find(|(_, pattern)| pattern.is_match(&text))
            .map(|(state, _)| *state)
            .unwrap_or(EmotionState::Neutral)
    }
}

/// Overall tone of a message as seen by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Aggressive,
    Sad,
    Lost,
    Neutral,
}

/// Word-count bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthBucket {
    Short,
    Medium,
    Long,
}

/// Structured analysis of one message, used only to decide between the two
/// voices — the five emotion buckets come from `EmotionClassifier`.
#[derive(Debug, Clone)]
pub struct MessageAnalysis {
    pub tone: Tone,
    pub emotional_markers: Vec<String>,
    pub has_questions: bool,
    pub length: LengthBucket,
    pub self_doubt: bool,
    pub needs_clarity: bool,
    pub needs_comfort: bool,
    pub needs_challenge: bool,
}

/// Marker tables for the analyzer; substring containment, lowercased input.
pub struct MessageAnalyzer {
    aggressive_markers: Vec<&'static str>,
    sad_markers: Vec<&'static str>,
    lost_markers: Vec<&'static str>,
    question_markers: Vec<&'static str>,
    self_doubt_markers: Vec<&'static str>,
    comfort_markers: Vec<&'static str>,
    challenge_markers: Vec<&'static str>,
}

impl Default for MessageAnalyzer {
    fn default() -> Self {
        Self {
            aggressive_markers: vec![
                "бесит", "ненавижу", "достало", "fuck", "hate", "angry", "furious",
            ],
            sad_markers: vec![
                "грустно", "плохо", "устал", "устала", "устало", "depressed", "sad", "tired",
                "exhausted", "hopeless",
            ],
            lost_markers: vec![
                "не знаю",
                "не понимаю",
                "запутался",
                "запуталась",
                "потерян",
                "lost",
                "confused",
                "don't know",
                "don't understand",
            ],
            question_markers: vec![
                "?", "почему", "как", "что", "зачем", "why", "how", "what", "when", "where",
            ],
            self_doubt_markers: vec![
                "может быть",
                "наверное",
                "не уверен",
                "не уверена",
                "maybe",
                "perhaps",
                "not sure",
                "uncertain",
            ],
            comfort_markers: vec![
                "страшно", "боюсь", "страх", "scared", "afraid", "fear", "anxious", "worry",
            ],
            challenge_markers: vec![
                "всё равно",
                "не важно",
                "doesn't matter",
                "whatever",
                "who cares",
            ],
        }
    }
}

impl MessageAnalyzer {
    pub fn analyze(&self, message: &str) -> MessageAnalysis {
        let text = message.to_lowercase();
        let word_count = text.split_whitespace().count();

        let mut tone = Tone::Neutral;
        let mut emotional_markers = Vec::new();

        if contains_any(&text, &self.aggressive_markers) {
            tone = Tone::Aggressive;
            emotional_markers.push("aggression".to_string());
        } else if contains_any(&text, &self.sad_markers) {
            tone = Tone::Sad;
            emotional_markers.push("sadness".to_string());
        } else if contains_any(&text, &self.lost_markers) {
            tone = Tone::Lost;
            emotional_markers.push("confusion".to_string());
        } else if contains_any(&text, &self.comfort_markers) {
            tone = Tone::Sad;
            emotional_markers.push("fear".to_string());
        }

        let has_questions = contains_any(&text, &self.question_markers);

        let length = if word_count < 5 {
            LengthBucket::Short
        } else if word_count > 30 {
            LengthBucket::Long
        } else {
            LengthBucket::Medium
        };

        let self_doubt = contains_any(&text, &self.self_doubt_markers);
        let needs_comfort = tone == Tone::Sad || contains_any(&text, &self.comfort_markers);

        MessageAnalysis {
            tone,
            emotional_markers,
            has_questions,
            length,
            self_doubt,
            needs_clarity: has_questions || tone == Tone::Lost,
            needs_comfort,
            needs_challenge: tone == Tone::Aggressive
                || contains_any(&text, &self.challenge_markers),
        }
    }
}

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| text.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> EmotionClassifier {
        EmotionClassifier::with_default_rules()
    }

    #[test]
    fn english_tiredness_is_classified() {
        assert_eq!(classifier().classify("I am so tired today"), EmotionState::Tired);
    }

    #[test]
    fn russian_lostness_is_classified() {
        assert_eq!(classifier().classify("не знаю что делать"), EmotionState::Lost);
    }

    #[test]
    fn tired_wins_over_angry_by_priority() {
        // Matches both the tired and angry tables; tired comes first.
        assert_eq!(
            classifier().classify("я устал и меня всё бесит"),
            EmotionState::Tired
        );
    }

    #[test]
    fn anxious_wins_over_lost_by_priority() {
        assert_eq!(
            classifier().classify("мне страшно и я не понимаю"),
            EmotionState::Anxious
        );
    }

    #[test]
    fn unmatched_input_is_neutral() {
        assert_eq!(classifier().classify("доброе утро"), EmotionState::Neutral);
        assert_eq!(classifier().classify(""), EmotionState::Neutral);
    }

    #[test]
    fn analyzer_flags_aggression_as_needing_challenge() {
        let analysis = MessageAnalyzer::default().analyze("ненавижу всё это");
        assert_eq!(analysis.tone, Tone::Aggressive);
        assert!(analysis.needs_challenge);
        assert_eq!(analysis.emotional_markers, vec!["aggression".to_string()]);
    }

    #[test]
    fn analyzer_flags_indifference_as_needing_challenge() {
        let analysis = MessageAnalyzer::default().analyze("whatever, nothing helps anyway");
        assert!(analysis.needs_challenge);
    }

    #[test]
    fn analyzer_detects_questions_and_clarity_need() {
        let analysis = MessageAnalyzer::default().analyze("why does this keep happening to me");
        assert!(analysis.has_questions);
        assert!(analysis.needs_clarity);
    }

    #[test]
    fn analyzer_buckets_length_by_word_count() {
        let analyzer = MessageAnalyzer::default();
        assert_eq!(analyzer.analyze("help me now").length, LengthBucket::Short);
        assert_eq!(
            analyzer.analyze("one two three four five six").length,
            LengthBucket::Medium
        );
        let long = "word ".repeat(31);
        assert_eq!(analyzer.analyze(&long).length, LengthBucket::Long);
    }

    #[test]
    fn analyzer_detects_self_doubt_and_comfort_need() {
        let analysis = MessageAnalyzer::default().analyze("maybe I am just scared of this");
        assert!(analysis.self_doubt);
        assert!(analysis.needs_comfort);
    }
}
