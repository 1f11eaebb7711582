//! Reference-document style analysis prompt

/// Asks for a JSON style profile and nothing else
pub const STYLE_ANALYSIS_PROMPT: &str = r#"Du är expert på att analysera skrivstil i svenska texter. Analysera följande text och extrahera detaljerade stilmönster. Texten är en verksamhetsberättelse/rapport från en organisation.

ANALYSERA OCH RETURNERA ENBART JSON (ingen annan text):

{
  "tonality": "formal" | "semi-formal" | "conversational",
  "formality_score": 0.0-1.0,
  "avg_sentence_length": <antal ord per mening>,
  "vocabulary_level": "simple" | "professional" | "academic",
  "active_voice_ratio": 0.0-1.0,
  "common_phrases": ["fras1", "fras2", ...],
  "section_transition_style": "beskrivning",
  "number_presentation": "beskrivning",
  "person_reference": "vi" | "organisationen" | "styrelsen" | "blandat",
  "tense_preference": "preteritum" | "presens" | "blandat",
  "paragraph_style": "korta stycken" | "långa stycken" | "blandade",
  "use_of_subheadings": true | false,
  "analysis_summary": "3-5 meningar som sammanfattar stilen"
}"#;

pub fn build_style_user_prompt(text: &str) -> String {
    format!("TEXT ATT ANALYSERA:\n\n{}", text)
}
