// src/classify/prompt.rs

/// Literal shown to the model when there is no previous content.
pub const NO_PREVIOUS_CONTENT: &str = "None";

/// First `max` chars of `s` (never splits a code point).
pub fn excerpt(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Build the old-vs-new comparison prompt. Only the first `excerpt_chars` of each side
/// are embedded.
pub fn build_prompt(old: Option<&str>, new: &str, excerpt_chars: usize, audience: &str) -> String {
    let old = excerpt(old.unwrap_or(NO_PREVIOUS_CONTENT), excerpt_chars);
    let new = excerpt(new, excerpt_chars);
    format!(
        r#"You review changes to monitored web pages and decide whether a change matters to {audience}.

Compare the OLD and NEW page content and respond ONLY with JSON.

OLD:
{old}

NEW:
{new}

Set is_meaningful = true ONLY when the change affects what {audience} must know or do:
- Deadlines or open/close status of applications and admissions
- Eligibility rules
- Fees, prices, or payment forms
- Merit lists or admission results being announced
- Schedules (date sheets, exam dates, holidays)
- Policies (grading, housing, conduct rules)

Set is_meaningful = false for:
- Layout, design, or navigation changes
- Typo fixes
- Year changes in footers or copyright lines
- Rephrasing with no factual change
- Generic headers or announcement blocks moving around

Return JSON ONLY, in exactly this shape:
{{
  "is_meaningful": true or false,
  "summary": ["short bullet point", "another bullet point"],
  "confidence": 0.0 to 1.0
}}
"#
    )
}
