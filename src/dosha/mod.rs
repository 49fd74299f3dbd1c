// Dosha classification
// Scores quiz answers into the three constitutions and resolves the dominant one

#[cfg(test)]
mod tests;

pub mod quiz;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::{AyurbotError, Result};

pub use quiz::{Question, Quiz, QuizKind};

/// One of the three Ayurvedic constitutions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dosha {
    Vata,
    Pitta,
    Kapha,
}

impl Dosha {
    /// Canonical enumeration order, also used to break ties
    pub const ALL: [Self; 3] = [Self::Vata, Self::Pitta, Self::Kapha];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vata => "vata",
            Self::Pitta => "pitta",
            Self::Kapha => "kapha",
        }
    }
}

impl fmt::Display for Dosha {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recognized quiz answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    A,
    B,
    C,
}

impl Answer {
    /// Parse an answer symbol, returning `None` for anything outside `a`, `b`, `c`
    #[inline]
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "a" | "A" => Some(Self::A),
            "b" | "B" => Some(Self::B),
            "c" | "C" => Some(Self::C),
            _ => None,
        }
    }

    /// Answer symbol for the option at `index` (0, 1 or 2)
    #[inline]
    pub fn from_option_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::A),
            1 => Some(Self::B),
            2 => Some(Self::C),
            _ => None,
        }
    }

    #[inline]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
            Self::C => "c",
        }
    }

    #[inline]
    pub fn dosha(self) -> Dosha {
        match self {
            Self::A => Dosha::Vata,
            Self::B => Dosha::Pitta,
            Self::C => Dosha::Kapha,
        }
    }
}

/// Vote counters for each dosha
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoshaScore {
    vata: u32,
    pitta: u32,
    kapha: u32,
}

impl DoshaScore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally a sequence of raw answer symbols, skipping unrecognized ones
    #[inline]
    pub fn from_answers<S: AsRef<str>>(answers: &[S]) -> Self {
        let mut score = Self::new();
        for raw in answers {
            match Answer::parse(raw.as_ref()) {
                Some(answer) => score.record(answer),
                None => debug!("Skipping unrecognized answer {:?}", raw.as_ref()),
            }
        }
        score
    }

    #[inline]
    pub fn record(&mut self, answer: Answer) {
        match answer.dosha() {
            Dosha::Vata => self.vata += 1,
            Dosha::Pitta => self.pitta += 1,
            Dosha::Kapha => self.kapha += 1,
        }
    }

    #[inline]
    pub fn count(&self, dosha: Dosha) -> u32 {
        match dosha {
            Dosha::Vata => self.vata,
            Dosha::Pitta => self.pitta,
            Dosha::Kapha => self.kapha,
        }
    }

    /// Number of recognized answers recorded so far
    #[inline]
    pub fn total(&self) -> u32 {
        self.vata + self.pitta + self.kapha
    }

    /// The dosha with the highest count.
    ///
    /// Ties go to whichever tied dosha comes first in [`Dosha::ALL`].
    #[inline]
    pub fn dominant(&self) -> Dosha {
        let mut best = Dosha::Vata;
        for dosha in Dosha::ALL {
            if self.count(dosha) > self.count(best) {
                best = dosha;
            }
        }
        best
    }
}

/// Classify a sequence of quiz answers into a dosha.
///
/// The quiz has five questions, but any number of answers is counted.
/// Unrecognized symbols are skipped. An empty sequence is rejected with
/// [`AyurbotError::InvalidInput`].
#[inline]
pub fn classify<S: AsRef<str>>(answers: &[S]) -> Result<Dosha> {
    if answers.is_empty() {
        return Err(AyurbotError::InvalidInput);
    }

    let score = DoshaScore::from_answers(answers);
    let dosha = score.dominant();
    debug!(
        "Classified {} answers (vata={}, pitta={}, kapha={}) as {}",
        answers.len(),
        score.count(Dosha::Vata),
        score.count(Dosha::Pitta),
        score.count(Dosha::Kapha),
        dosha
    );
    Ok(dosha)
}
