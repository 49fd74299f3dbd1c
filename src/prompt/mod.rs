//! Prompt assembly for the remedy assistant
//!
//! The instruction text is fixed. Only the dosha, the retrieved context and the
//! user's question vary between calls.


use itertools::Itertools;

use crate::dosha::Dosha;
use crate::session::Passage;

/// Instruction template. `{dosha}`, `{context}` and `{question}` are substituted by [`build_prompt`].
pub const REMEDY_PROMPT_TEMPLATE: &str = "\
You are Ayurbot, an expert assistant in Ayurvedic remedies.
The user has a {dosha} dosha constitution.
Use the following context to answer the user's question with clarity and care. \
Do NOT reference chapters, appendices, or page numbers. \
Your answers should be self-contained, practical, and rooted in Ayurvedic principles. \
Tailor every suggestion to the user's {dosha} dosha. \
Avoid phrases like \"explained in Chapter 6\" or \"described in Appendix 4\".
If relevant, include suggestions on diet, lifestyle, yoga, breathwork, herbs, or daily routines. \
Keep the tone supportive and informative.

Context:
{context}

Question:
{question}

Helpful Answer:
";

const PASSAGE_SEPARATOR: &str = "\n\n";

/// Join passages into one context block, keeping the retriever's ranking
#[inline]
pub fn format_context(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| p.text.trim())
        .filter(|text| !text.is_empty())
        .join(PASSAGE_SEPARATOR)
}

/// Fill the remedy template for one question
#[inline]
pub fn build_prompt(dosha: Dosha, context: &str, question: &str) -> String {
    // Question and context are substituted last so user text containing a
    // placeholder is never expanded.
    let (head, tail) = REMEDY_PROMPT_TEMPLATE
        .split_once("{context}")
        .unwrap_or((REMEDY_PROMPT_TEMPLATE, ""));
    let head = head.replace("{dosha}", dosha.as_str());
    let tail = tail.replace("{question}", question.trim());

    let mut prompt = String::with_capacity(head.len() + context.len() + tail.len());
    prompt.push_str(&head);
    prompt.push_str(context);
    prompt.push_str(&tail);
    prompt
}
