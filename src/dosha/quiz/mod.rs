
use serde::{Deserialize, Serialize};

use super::Answer;

/// A quiz question with exactly three options, mapped in order to vata, pitta and kapha
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub text: &'static str,
    pub options: [&'static str; 3],
}

impl Question {
    /// The answer symbol recorded when the option at `index` is chosen
    #[inline]
    pub fn answer_for(&self, index: usize) -> Option<Answer> {
        Answer::from_option_index(index)
    }
}

/// Which question set to ask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum QuizKind {
    /// Body frame, appetite, emotions, sleep and energy
    #[default]
    BodyProfile,
    /// Temperature, energy, digestion, skin and sleep
    DailyTraits,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    questions: [Question; 5],
}

impl Quiz {
    #[inline]
    pub fn for_kind(kind: QuizKind) -> Self {
        match kind {
            QuizKind::BodyProfile => Self::body_profile(),
            QuizKind::DailyTraits => Self::daily_traits(),
        }
    }

    #[inline]
    pub fn body_profile() -> Self {
        Self {
            questions: [
                Question {
                    text: "What is your body frame like?",
                    options: ["Light and thin", "Medium and muscular", "Heavy and solid"],
                },
                Question {
                    text: "How is your appetite?",
                    options: [
                        "Irregular, sometimes high, sometimes low",
                        "Strong and consistent",
                        "Slow but steady",
                    ],
                },
                Question {
                    text: "How do you usually feel emotionally?",
                    options: [
                        "Anxious or restless",
                        "Irritable or intense",
                        "Calm and stable",
                    ],
                },
                Question {
                    text: "How is your sleep pattern?",
                    options: [
                        "Light sleeper, wake easily",
                        "Moderate sleeper",
                        "Heavy sleeper",
                    ],
                },
                Question {
                    text: "How would you describe your energy levels?",
                    options: [
                        "Quick bursts of energy, then fatigue",
                        "High energy, sometimes burnout",
                        "Slow but sustained energy",
                    ],
                },
            ],
        }
    }

    #[inline]
    pub fn daily_traits() -> Self {
        Self {
            questions: [
                Question {
                    text: "Do you usually feel...",
                    options: ["Cold", "Warm", "Moderate"],
                },
                Question {
                    text: "Your energy is...",
                    options: [
                        "Irregular and quick to tire",
                        "Strong and intense",
                        "Steady and slow",
                    ],
                },
                Question {
                    text: "Your digestion is...",
                    options: ["Irregular or sensitive", "Strong or fast", "Slow or heavy"],
                },
                Question {
                    text: "Your skin is...",
                    options: ["Dry or rough", "Sensitive or rashy", "Oily or thick"],
                },
                Question {
                    text: "You sleep...",
                    options: [
                        "Lightly and wake easily",
                        "Moderately",
                        "Deeply or for long hours",
                    ],
                },
            ],
        }
    }

    #[inline]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
