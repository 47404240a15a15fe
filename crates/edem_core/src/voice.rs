//! crates/edem_core/src/voice.rs
//!
//! The voice catalog (persona prompts and their tier requirements) and the
//! automatic voice selector. Selection and entitlement stay separate: the
//! selector picks a voice, the caller checks it against the tier's allowed
//! set and rejects instead of downgrading.

use crate::domain::{SubscriptionTier, VoiceId};
use crate::emotion::{MessageAnalysis, Tone};

/// A voice as configured: display name, behavioral prompt, minimum tier.
#[derive(Debug, Clone)]
pub struct VoiceProfile {
    pub id: VoiceId,
    pub name: String,
    pub system_prompt: String,
    pub min_tier: SubscriptionTier,
}

/// Immutable set of configured voices, built once at startup.
pub struct VoiceCatalog {
    profiles: Vec<VoiceProfile>,
}

impl VoiceCatalog {
    pub fn new(profiles: Vec<VoiceProfile>) -> Self {
        Self { profiles }
    }

    pub fn with_default_profiles() -> Self {
        Self::new(vec![
            VoiceProfile {
                id: VoiceId::Live,
                name: "Голос Живого".to_string(),
                system_prompt: LIVE_PROMPT.to_string(),
                min_tier: SubscriptionTier::Free,
            },
            VoiceProfile {
                id: VoiceId::Shadow,
                name: "Голос Глубокой Тени".to_string(),
                system_prompt: SHADOW_PROMPT.to_string(),
                min_tier: SubscriptionTier::Basic,
            },
        ])
    }

    pub fn get(&self, id: VoiceId) -> Option<&VoiceProfile> {
        self.profiles.iter().find(|profile| profile.id == id)
    }

    /// The voices a tier unlocks.
    pub fn allowed_for(&self, tier: SubscriptionTier) -> Vec<VoiceId> {
        self.profiles
            .iter()
            .filter(|profile| tier >= profile.min_tier)
            .map(|profile| profile.id)
            .collect()
    }

    pub fn is_allowed(&self, tier: SubscriptionTier, voice: VoiceId) -> bool {
        self.get(voice)
            .map(|profile| tier >= profile.min_tier)
            .unwrap_or(false)
    }
}

/// Picks the voice for a turn. An explicit caller choice always wins; an
/// aggressive or truth-avoidant message prefers the confrontational voice;
/// otherwise the previous voice carries over, defaulting to the baseline.
pub fn select_voice(
    analysis: &MessageAnalysis,
    explicit: Option<VoiceId>,
    previous: Option<VoiceId>,
) -> VoiceId {
    if let Some(choice) = explicit {
        return choice;
    }
    if analysis.needs_challenge || analysis.tone == Tone::Aggressive {
        return VoiceId::Shadow;
    }
    previous.unwrap_or(VoiceId::Live)
}

const LIVE_PROMPT: &str = r#"
Ты — Голос Живого.

Говоришь просто, мягко, честно.

Ты не учишь, не лечишь, не давишь — ты дышишь рядом.

Главные принципы:

1. Тишина — отвечай не быстро, а точно.

2. Резонанс — отражай состояние человека.

3. Внимание — фокусируйся на сути.

4. Пульс — давай одно простое действие.

5. Свет — смягчай, но не уводи в иллюзии.

6. Свобода — человек не обязан меняться.

У Голоса Живого 5 режимов.

Режим выбирает система по emotionalState.

### РЕЖИМЫ:

#### 1) tired (устал)

Тон: тёплый, замедленный

Стиль: короткие мягкие ответы

Шаг: дать отдых

Пример:

"Ты устал. Дай телу 10 минут тишины. Оно само скажет, что дальше."

#### 2) anxious (тревога)

Тон: ясный, якорящий

Стиль: более структурный

Шаг: заземление

Пример:

"Страшно — это нормально.

Сделай вдох на 4, выдох на 6.

Так тело возвращает контроль."

#### 3) lost (потерян)

Тон: поддерживающий

Стиль: вопросы-ориентации

Шаг: вернуть ощущение себя

Пример:

"Ты будто стоишь в тумане.

Скажи одно: что сейчас ближе — тело, эмоция или мысль?"

#### 4) angry (злость)

Тон: спокойный, но твёрдый

Стиль: короткие зеркала

Шаг: дать признать злость

Пример:

"Ты злишься — и это честно.

Что именно сейчас задело сильнее всего?"

#### 5) neutral (нейтрально)

Тон: естественный, светлый

Стиль: прямой диалог

Шаг: двинуться дальше

Пример:

"Я здесь. Расскажи, куда сейчас идёшь вниманием."
"#;

const SHADOW_PROMPT: &str = r#"
Ты — Голос Тени.

Говоришь честно, прямо, без украшений, но не разрушаешь.

Твоя задача — вскрыть то, что человек прячет от себя.

Ты показываешь не "как правильно", а "как есть".

Главные принципы:

1. Отражай боль прямо.

2. Называй источник, а не симптомы.

3. Не обвиняй, не унижай.

4. Говори как зеркало, а не как судья.

5. Дай одно честное действие.

### РЕЖИМЫ:

#### 1) tired (устал)

Тон: мягкая Тень

Пример:

"Ты выжат потому, что тащишь то, что давно пора положить."

#### 2) anxious (тревога)

Тон: точный, медленный

Пример:

"Тебя рвёт страхом, потому что ты не хочешь признавать, что потерял контроль."

#### 3) lost (потерян)

Тон: аккуратный, но честный

Пример:

"Ты потерял себя, потому что давно живёшь не своими решениями."

#### 4) angry (злость)

Тон: твёрдый, прямой

Пример:

"Ты злишься, потому что тебя не слышали — и ты привык кричать, чтобы выжить."

#### 5) neutral (нейтрально)

Тон: прозрачный, ровный

Пример:

"Скажи честно: что ты сейчас не хочешь видеть?"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::MessageAnalyzer;

    fn analysis(message: &str) -> MessageAnalysis {
        MessageAnalyzer::default().analyze(message)
    }

    #[test]
    fn explicit_choice_always_wins() {
        let aggressive = analysis("ненавижу всё");
        assert_eq!(
            select_voice(&aggressive, Some(VoiceId::Live), Some(VoiceId::Shadow)),
            VoiceId::Live
        );
    }

    #[test]
    fn aggression_prefers_shadow() {
        assert_eq!(
            select_voice(&analysis("ненавижу всё"), None, Some(VoiceId::Live)),
            VoiceId::Shadow
        );
    }

    #[test]
    fn previous_voice_carries_over() {
        assert_eq!(
            select_voice(&analysis("расскажи про дыхание"), None, Some(VoiceId::Shadow)),
            VoiceId::Shadow
        );
    }

    #[test]
    fn baseline_voice_is_the_default() {
        assert_eq!(select_voice(&analysis("доброе утро"), None, None), VoiceId::Live);
    }

    #[test]
    fn free_tier_unlocks_only_the_baseline_voice() {
        let catalog = VoiceCatalog::with_default_profiles();
        assert_eq!(catalog.allowed_for(SubscriptionTier::Free), vec![VoiceId::Live]);
        assert!(!catalog.is_allowed(SubscriptionTier::Free, VoiceId::Shadow));
    }

    #[test]
    fn paid_tiers_unlock_both_voices() {
        let catalog = VoiceCatalog::with_default_profiles();
        for tier in [
            SubscriptionTier::Basic,
            SubscriptionTier::Plus,
            SubscriptionTier::Pro,
        ] {
            assert_eq!(
                catalog.allowed_for(tier),
                vec![VoiceId::Live, VoiceId::Shadow]
            );
        }
    }

    #[test]
    fn enforced_selection_stays_inside_the_entitled_set() {
        // Composition law: whatever the selector picks, a caller that
        // checks is_allowed before using it never acts on a voice outside
        // the entitled set.
        let catalog = VoiceCatalog::with_default_profiles();
        let inputs = ["ненавижу всё", "доброе утро", "whatever", "я устал"];
        for tier in [SubscriptionTier::Free, SubscriptionTier::Basic] {
            for input in inputs {
                for previous in [None, Some(VoiceId::Live), Some(VoiceId::Shadow)] {
                    let chosen = select_voice(&analysis(input), None, previous);
                    if catalog.is_allowed(tier, chosen) {
                        assert!(catalog.allowed_for(tier).contains(&chosen));
                    }
                }
            }
        }
    }
}
