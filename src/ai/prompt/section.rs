//! Single-section rewrite prompts

use crate::types::Tonality;

/// Short tonality phrase used inside a sentence
fn tonality_phrase(tonality: Option<Tonality>) -> &'static str {
    match tonality.unwrap_or(Tonality::SemiFormal) {
        Tonality::Formal => "formellt, sakligt",
        Tonality::SemiFormal => "professionellt men tillgängligt",
        Tonality::Conversational => "varmt, engagerande",
    }
}

pub fn build_section_system_prompt(
    org_name: &str,
    tonality: Option<Tonality>,
    feedback: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Du är expert på att skriva professionella verksamhetsrapporter på svenska.\n\
         Du ska regenerera ETT avsnitt i en rapport för {}.\n\
         Använd {} språk.\n\
         Behåll ALLA detaljer från originaltexten. Förkorta INTE.",
        org_name,
        tonality_phrase(tonality)
    );

    if let Some(feedback) = feedback.filter(|f| !f.trim().is_empty()) {
        prompt.push_str(&format!(
            "\n\nAnvändarens feedback: \"{}\"\nAnpassa texten baserat på denna feedback.",
            feedback
        ));
    }
    prompt
}

/// Blank raw input or generated text leaves its block out
pub fn build_section_user_prompt(
    title: &str,
    raw_input: Option<&str>,
    generated: Option<&str>,
) -> String {
    let mut prompt = format!("Avsnitt: {}\n\n", title);
    if let Some(raw) = raw_input.filter(|r| !r.trim().is_empty()) {
        prompt.push_str(&format!("ORIGINALTEXT (input):\n{}\n\n", raw));
    }
    if let Some(current) = generated.filter(|g| !g.trim().is_empty()) {
        prompt.push_str(&format!(
            "NUVARANDE GENERERAD TEXT (förbättra denna):\n{}\n\n",
            current
        ));
    }
    prompt.push_str(&format!(
        "Skriv en förbättrad version av avsnittet \"{}\".",
        title
    ));
    prompt
}
