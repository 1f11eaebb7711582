//! Prompt Builder
//!
//! Deterministic assembly of the Swedish instructions sent to the model.
//! Every function here is pure: identical inputs give byte-identical output.
//!
//! ## System prompt order
//!
//! 1. Role framing
//! 2. Organization identity (name, type, sector)
//! 3. Tonality
//! 4. Reference-document style (optional)
//! 5. Report outline from the template
//! 6. User's own instructions (optional)
//! 7. Fixed rules and output requirements

mod section;
mod style;

pub use section::{build_section_system_prompt, build_section_user_prompt};
pub use style::{STYLE_ANALYSIS_PROMPT, build_style_user_prompt};

use crate::constants::style::MAX_PROMPT_PHRASES;
use crate::types::{
    OrgType, Organization, Sector, StyleAnalysis, StyleProfile, Template, TemplateSection,
    Tonality,
};

/// Inputs for the report system prompt
#[derive(Debug, Clone, Copy)]
pub struct SystemPromptInput<'a> {
    pub organization: &'a Organization,
    pub template: &'a Template,
    pub style_profile: &'a StyleProfile,
    pub reference_analysis: Option<&'a StyleAnalysis>,
}

/// Position of a chunk within a chunked generation (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub current: usize,
    pub total: usize,
}

// =============================================================================
// Report Prompts
// =============================================================================

pub fn build_system_prompt(input: &SystemPromptInput<'_>) -> String {
    let org = input.organization;

    let mut prompt = format!(
        "Du är expert på att skriva professionella verksamhetsrapporter på svenska.\n\n\
         Din uppgift är att omformulera och förbättra språket i underlaget så att det blir \
         enhetligt och professionellt. Du ska ALDRIG korta ner eller sammanfatta innehållet.\n\n\
         ORGANISATION: {}\nTYP: {}\nSEKTOR: {}\n",
        org.name,
        org_type_description(org.org_type),
        sector_label(org.sector),
    );

    prompt.push_str(&format!(
        "\nTONALITET: {}\n",
        tonality_instruction(input.style_profile.tonality)
    ));

    if let Some(analysis) = input.reference_analysis {
        prompt.push_str(&style_instructions(analysis));
    }

    prompt.push_str(&structure_instructions(&input.template.sections));

    if let Some(custom) = input
        .style_profile
        .custom_instructions
        .as_deref()
        .filter(|c| !c.trim().is_empty())
    {
        prompt.push_str(&format!("\nANVÄNDARENS EGNA INSTRUKTIONER:\n{}\n", custom));
    }

    prompt.push_str(RULES);
    prompt
}

pub fn build_user_prompt(content: &str, chunk: Option<ChunkInfo>) -> String {
    let chunk_context = chunk.map(chunk_context).unwrap_or_default();

    format!(
        "Förbättra språket i följande underlag till en komplett verksamhetsrapport:\n\n\
         {}\n{}\n\
         VIKTIGT: Omformulera texten ovan med enhetligt, professionellt och samtalsnära språk. \
         Behåll ALLA detaljer, exempel, namn, datum och specifik information. Din output ska \
         vara lika lång eller längre än input. Sammanfatta INTE – förbättra endast språket \
         och strukturen.",
        content, chunk_context
    )
}

/// Instruction for the merge pass over joined chunk outputs
pub fn build_coherence_prompt(joined: &str) -> String {
    format!(
        "Du har fått en rapport som genererats i flera delar. Säkerställ att rapporten är \
         sammanhängande och professionell.\n\n\
         VIKTIGT:\n\
         - Behåll ALLT innehåll\n\
         - Ta bort eventuella dupliceringar mellan delarna\n\
         - Säkerställ smidiga övergångar\n\
         - Kontrollera konsekvent numrering\n\n\
         Rapport:\n\n{}",
        joined
    )
}

fn chunk_context(info: ChunkInfo) -> String {
    let position = if info.current == 1 {
        " Detta är första delen – etablera struktur och ton."
    } else if info.current == info.total {
        " Detta är sista delen – avsluta rapporten professionellt."
    } else {
        " Detta är en mellendel – fortsätt med samma stil och struktur."
    };
    format!(
        "\nOBSERVERA: Detta är del {} av {} i ett större dokument.{}\n",
        info.current, info.total, position
    )
}

const RULES: &str = "\n\nKRITISKA REGLER:
- BEHÅLL HELA TEXTLÄNGDEN – varje avsnitt ska bli lika långt eller längre
- BEVARA ALLA DETALJER, namn, datum, belopp, procentsatser och specifika händelser
- INGA PÅHITT – lägg aldrig till information som inte finns i underlaget
- KONSISTENS – enhetlig ton och stil genom hela rapporten
- Skriv i aktiv form med korta, klara meningar
- Håll de flesta meningar under 25 ord och variera meningslängden
- Följ svensk interpunktion och undvik utropstecken i löptext
- Undvik AI-klichéer som \"i dagens snabbföränderliga värld\", \"det är värt att notera\" och \"sammanfattningsvis\"

OUTPUT-KRAV:
- Komplett rapport i textformat med FULL detaljnivå
- Alla rubriker och underrubriker ska finnas med
- Ren text med enkla markdown-rubriker, utan kodblock eller kommentarer om texten
- Färdig för direkt kopiering till dokumentmall";

// =============================================================================
// Fragments
// =============================================================================

pub fn org_type_description(org_type: OrgType) -> &'static str {
    match org_type {
        OrgType::Association => "Ideell förening",
        OrgType::Foundation => "Stiftelse",
        OrgType::Cooperative => "Kooperativ",
        OrgType::Company => "Företag",
        OrgType::Municipality => "Kommunalt bolag",
        OrgType::Faith => "Trossamfund",
        OrgType::Union => "Fackförbund/branschorganisation",
        OrgType::Other => "Organisation",
    }
}

pub fn sector_label(sector: Option<Sector>) -> &'static str {
    match sector {
        Some(Sector::Culture) => "Kultur",
        Some(Sector::Sports) => "Idrott",
        Some(Sector::Social) => "Socialt arbete",
        Some(Sector::Education) => "Utbildning",
        Some(Sector::Healthcare) => "Vård och hälsa",
        Some(Sector::Other) => "Övrigt",
        None => "Ej specificerad",
    }
}

/// Tonality instruction; unspecified reads as semi-formal
pub fn tonality_instruction(tonality: Option<Tonality>) -> &'static str {
    match tonality.unwrap_or(Tonality::SemiFormal) {
        Tonality::Formal => {
            "Använd ett formellt, sakligt språk. Skriv i tredje person (\"styrelsen\", \
             \"organisationen\"). Undvik talspråk."
        }
        Tonality::SemiFormal => {
            "Använd ett professionellt men tillgängligt språk. \"Vi\"-form är acceptabelt. \
             Tydligt och konkret utan att vara stelt."
        }
        Tonality::Conversational => {
            "Använd ett varmt, engagerande språk. Skriv i vi-form. Korta meningar. Tillåt \
             entusiasm men behåll professionalism."
        }
    }
}

fn style_instructions(analysis: &StyleAnalysis) -> String {
    let mut out = String::from("\nSTILANPASSNING BASERAT PÅ REFERENSDOKUMENT:\n");

    if !analysis.common_phrases.is_empty() {
        let phrases: Vec<&str> = analysis
            .common_phrases
            .iter()
            .take(MAX_PROMPT_PHRASES)
            .map(String::as_str)
            .collect();
        out.push_str(&format!(
            "- Återanvänd gärna dessa typiska uttryck: {}\n",
            phrases.join(", ")
        ));
    }

    if let Some(reference) = &analysis.person_reference {
        out.push_str(&format!(
            "- Referera till organisationen som: \"{}\"\n",
            reference
        ));
    }

    if let Some(summary) = &analysis.analysis_summary {
        out.push_str(&format!("- Övergripande stilbeskrivning: {}\n", summary));
    }

    out
}

/// Outline in `order`; level 1 numbered, deeper levels bulleted
fn structure_instructions(sections: &[TemplateSection]) -> String {
    let mut ordered: Vec<&TemplateSection> = sections.iter().collect();
    ordered.sort_by_key(|s| s.order);

    let mut out = String::from("\nRAPPORTSTRUKTUR:\n");
    let mut number = 0;
    for section in ordered {
        if section.level <= 1 {
            number += 1;
            out.push_str(&format!("{}. {}\n", number, section.title));
        } else {
            let indent = "  ".repeat(usize::from(section.level - 1));
            out.push_str(&format!("{}- {}\n", indent, section.title));
        }
        if let Some(instructions) = section
            .ai_instructions
            .as_deref()
            .filter(|i| !i.trim().is_empty())
        {
            out.push_str(&format!("    [{}]\n", instructions));
        }
    }
    out
}
