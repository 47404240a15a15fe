//! crates/edem_core/src/language.rs
//!
//! Heuristic language detection for incoming chat messages. For each
//! supported language an ordered set of regex signals is evaluated (script
//! characters, common function words, greetings); the highest-scoring
//! language wins. This is a deterministic rule table, not a statistical
//! classifier.

use regex::Regex;

/// Languages the prompt layer knows how to instruct the model about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedLanguage {
    Ru,
    En,
    Vi,
    Es,
    Pt,
    Fr,
    De,
    Ko,
    Ja,
    Zh,
}

impl SupportedLanguage {
    pub fn code(&self) -> &'static str {
        match self {
            SupportedLanguage::Ru => "ru",
            SupportedLanguage::En => "en",
            SupportedLanguage::Vi => "vi",
            SupportedLanguage::Es => "es",
            SupportedLanguage::Pt => "pt",
            SupportedLanguage::Fr => "fr",
            SupportedLanguage::De => "de",
            SupportedLanguage::Ko => "ko",
            SupportedLanguage::Ja => "ja",
            SupportedLanguage::Zh => "zh",
        }
    }

    pub fn parse(value: &str) -> Option<SupportedLanguage> {
        match value {
            "ru" => Some(SupportedLanguage::Ru),
            "en" => Some(SupportedLanguage::En),
            "vi" => Some(SupportedLanguage::Vi),
            "es" => Some(SupportedLanguage::Es),
            "pt" => Some(SupportedLanguage::Pt),
            "fr" => Some(SupportedLanguage::Fr),
            "de" => Some(SupportedLanguage::De),
            "ko" => Some(SupportedLanguage::Ko),
            "ja" => Some(SupportedLanguage::Ja),
            "zh" => Some(SupportedLanguage::Zh),
            _ => None,
        }
    }

    /// How the language is named inside the response-language instruction.
    /// Russian is declined to fit the surrounding sentence.
    pub fn instruction_name(&self) -> &'static str {
        match self {
            SupportedLanguage::Ru => "русском",
            SupportedLanguage::En => "English",
            SupportedLanguage::Vi => "Tiếng Việt",
            SupportedLanguage::Es => "Español",
            SupportedLanguage::Pt => "Português",
            SupportedLanguage::Fr => "Français",
            SupportedLanguage::De => "Deutsch",
            SupportedLanguage::Ko => "한국어",
            SupportedLanguage::Ja => "日本語",
            SupportedLanguage::Zh => "中文",
        }
    }
}

/// Detection result for one message. Not persisted; recomputed per turn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LanguageDetection {
    pub language: SupportedLanguage,
    pub confidence: f32,
    pub detected: bool,
}

/// The signal table for one language. Earlier entries in the detector's
/// table win score ties, so the default language should come first.
pub struct LanguageSignals {
    pub language: SupportedLanguage,
    pub patterns: Vec<Regex>,
}

/// Immutable detector built once at startup and shared across requests.
pub struct LanguageDetector {
    signals: Vec<LanguageSignals>,
    default_language: SupportedLanguage,
}

// Inputs shorter than this always resolve to the default language.
const MIN_DETECTABLE_CHARS: usize = 3;

const SHORT_INPUT_CONFIDENCE: f32 = 0.5;
const NO_MATCH_CONFIDENCE: f32 = 0.3;
const DETECTED_THRESHOLD: f32 = 0.3;

impl LanguageDetector {
    pub fn new(signals: Vec<LanguageSignals>, default_language: SupportedLanguage) -> Self {
        Self {
            signals,
            default_language,
        }
    }

    /// Builds the detector with the compiled-in signal tables, defaulting
    /// to Russian.
    pub fn with_default_signals() -> Self {
        Self::new(default_signals(), SupportedLanguage::Ru)
    }

    pub fn detect(&self, message: &str) -> LanguageDetection {
        let text = message.trim().to_lowercase();

        if text.chars().count() < MIN_DETECTABLE_CHARS {
            return LanguageDetection {
                language: self.default_language,
                confidence: SHORT_INPUT_CONFIDENCE,
                detected: false,
            };
        }

        let mut best: Option<(&LanguageSignals, usize)> = None;
        for signals in &self.signals {
            let score = signals
                .patterns
                .iter()
                .filter(|pattern| pattern.is_match(&text))
                .count();
            // Strict comparison keeps the earliest table entry on ties.
            if score > best.map_or(0, |(_, s)| s) {
                best = Some((signals, score));
            }
        }

        let Some((signals, score)) = best else {
            return LanguageDetection {
                language: self.default_language,
                confidence: NO_MATCH_CONFIDENCE,
                detected: false,
            };
        };

        let confidence = (score as f32 / signals.patterns.len() as f32).min(1.0);
        LanguageDetection {
            language: signals.language,
            confidence,
            detected: confidence > DETECTED_THRESHOLD,
        }
    }
}

fn signals(language: SupportedLanguage, patterns: &[&str]) -> LanguageSignals {
    LanguageSignals {
        language,
        patterns: patterns
            .iter()
            .map(|p| Regex::new(p).unwrap())
            .collect(),
    }
}

/// Script, function-word and greeting signals per language. Three signals
/// each, except ko/ja/zh where script presence already carries most of the
/// information.
fn default_signals() -> Vec<LanguageSignals> {
    vec![
        signals(
            SupportedLanguage::Ru,
            &[
                r"[а-яё]",
                r"\b(как|что|где|когда|почему|это|этот|эта|быть|был|была|было|были)\b",
                r"\b(привет|здравствуй|спасибо|пожалуйста|да|нет)\b",
            ],
        ),
        signals(
            SupportedLanguage::En,
            &[
                r"[a-z]",
                r"\b(the|and|or|but|in|on|at|to|for|of|with|by)\b",
                r"\b(hello|hi|thanks|please|yes|no|what|where|when|why|how)\b",
            ],
        ),
        signals(
            SupportedLanguage::Vi,
            &[
                r"[àáạảãâầấậẩẫăằắặẳẵèéẹẻẽêềếệểễìíịỉĩòóọỏõôồốộổỗơờớợởỡùúụủũưừứựửữỳýỵỷỹđ]",
                r"\b(tôi|bạn|đó|này|đây|và|hoặc|nhưng|trong|trên|với|bởi)\b",
                r"\b(xin chào|cảm ơn|vui lòng|có|không|gì|ở đâu|khi nào|tại sao)\b",
            ],
        ),
        signals(
            SupportedLanguage::Es,
            &[
                r"[áéíóúñü]",
                r"\b(el|la|los|las|y|o|pero|en|de|con|por|para)\b",
                r"\b(hola|gracias|por favor|sí|no|qué|dónde|cuándo|por qué|cómo)\b",
            ],
        ),
        signals(
            SupportedLanguage::Pt,
            &[
                r"[áàâãéêíóôõúüç]",
                r"\b(o|a|os|as|e|ou|mas|em|de|com|por|para)\b",
                r"\b(olá|obrigado|por favor|sim|não|o que|onde|quando|por quê|como)\b",
            ],
        ),
        signals(
            SupportedLanguage::Fr,
            &[
                r"[àâäéèêëïîôùûüÿç]",
                r"\b(le|la|les|et|ou|mais|dans|de|avec|par|pour)\b",
                r"\b(bonjour|merci|s'il vous plaît|oui|non|quoi|où|quand|pourquoi|comment)\b",
            ],
        ),
        signals(
            SupportedLanguage::De,
            &[
                r"[äöüß]",
                r"\b(der|die|das|und|oder|aber|in|von|mit|durch|für)\b",
                r"\b(hallo|danke|bitte|ja|nein|was|wo|wann|warum|wie)\b",
            ],
        ),
        signals(
            SupportedLanguage::Ko,
            &[
                r"[가-힣]",
                r"(안녕|감사|부탁|무엇|어디|언제|왜|어떻게)",
            ],
        ),
        signals(
            SupportedLanguage::Ja,
            &[
                r"[\p{Hiragana}\p{Katakana}]",
                r"(こんにちは|ありがとう|お願い|はい|いいえ|何|どこ|いつ|なぜ)",
            ],
        ),
        signals(
            SupportedLanguage::Zh,
            &[
                r"[一-龯]",
                r"(你好|谢谢|请|什么|哪里|什么时候|为什么|如何)",
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> LanguageDetector {
        LanguageDetector::with_default_signals()
    }

    #[test]
    fn short_input_falls_back_to_default() {
        let result = detector().detect("ok");
        assert_eq!(result.language, SupportedLanguage::Ru);
        assert_eq!(result.confidence, 0.5);
        assert!(!result.detected);
    }

    #[test]
    fn empty_input_falls_back_to_default() {
        let result = detector().detect("   ");
        assert_eq!(result.language, SupportedLanguage::Ru);
        assert!(!result.detected);
    }

    #[test]
    fn english_message_is_detected() {
        let result = detector().detect("I am so tired today");
        assert_eq!(result.language, SupportedLanguage::En);
        assert!(result.detected);
    }

    #[test]
    fn russian_message_is_detected() {
        let result = detector().detect("не знаю что делать");
        assert_eq!(result.language, SupportedLanguage::Ru);
        assert!(result.detected);
    }

    #[test]
    fn cyrillic_with_function_word_beats_everything_else() {
        let result = detector().detect("привет, как дела");
        assert_eq!(result.language, SupportedLanguage::Ru);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn digits_only_score_nothing_and_fall_back() {
        let result = detector().detect("1234567");
        assert_eq!(result.language, SupportedLanguage::Ru);
        assert_eq!(result.confidence, 0.3);
        assert!(!result.detected);
    }

    #[test]
    fn german_umlauts_and_function_words_win() {
        let result = detector().detect("hallo, wie geht es dir? schön und gut");
        assert_eq!(result.language, SupportedLanguage::De);
        assert!(result.detected);
    }

    #[test]
    fn korean_script_is_detected() {
        let result = detector().detect("안녕하세요 잘 지내세요");
        assert_eq!(result.language, SupportedLanguage::Ko);
        assert!(result.detected);
    }
}
