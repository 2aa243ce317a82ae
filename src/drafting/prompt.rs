use crate::config::DraftingConfig;

pub const SYSTEM_PROMPT: &str = "You write concise, professor-ready academic emails.";

pub fn drafting_prompt(
    professor: &str,
    profile_excerpt: &str,
    interests: &[String],
    config: &DraftingConfig,
) -> String {
    let interests = if interests.is_empty() {
        "N/A".to_string()
    } else {
        interests.join(", ")
    };

    format!(
        r#"You are writing a short, high-quality PhD interest email.

{student_line}
Hard rules:
- Do NOT use placeholders like [Your Name] or any bracketed text.
- The email must be concise: 140-190 words total.
- Use 3 short paragraphs followed by a single-line closing.
- Include ONE clear call-to-action: request a 15-20 minute meeting.
- Mention at most ONE publication title, and only if one appears in the profile.
- Avoid repetition and generic filler.
- The output must follow the exact format below.

## Professor
- Name: {professor}
- Research interests: {interests}

## Profile
{profile_excerpt}

{background_section}

## Output format (exactly)
SUBJECT: <one line>
---
BODY:
<email body with no SUBJECT line inside>"#,
        student_line = if config.student_name.is_empty() {
            String::new()
        } else {
            format!("Student name: {}.", config.student_name)
        },
        background_section = if config.student_background.is_empty() {
            String::new()
        } else {
            format!("## Student background\n{}", config.student_background)
        }
    )
}
