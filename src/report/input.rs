//! Section input collection
//!
//! Turns a template plus per-section notes into the ordered `SectionInput`
//! list the generator works on.

use std::collections::{BTreeMap, HashSet};

use crate::types::{SectionContent, SectionInput, Template};

/// Collect non-blank section inputs
///
/// Template sections come first in `order`. Notes keyed by an id the template
/// does not know follow in id order, titled by their id.
pub fn collect_section_inputs(
    template: &Template,
    sections_content: &BTreeMap<String, SectionContent>,
) -> Vec<SectionInput> {
    let mut ordered: Vec<_> = template.sections.iter().collect();
    ordered.sort_by_key(|s| s.order);

    let mut inputs = Vec::with_capacity(sections_content.len());
    let mut known = HashSet::with_capacity(ordered.len());

    for section in ordered {
        known.insert(section.id.as_str());
        if let Some(content) = sections_content.get(&section.id)
            && !content.raw_input.trim().is_empty()
        {
            inputs.push(SectionInput::new(
                &section.id,
                &section.title,
                &content.raw_input,
            ));
        }
    }

    for (id, content) in sections_content {
        if !known.contains(id.as_str()) && !content.raw_input.trim().is_empty() {
            inputs.push(SectionInput::new(id, id, &content.raw_input));
        }
    }

    inputs
}

/// Flatten inputs to `"{title}:\n{text}"` blocks separated by blank lines
pub fn content_text(inputs: &[SectionInput]) -> String {
    inputs
        .iter()
        .map(|s| format!("{}:\n{}", s.title, s.raw_text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Title of a template section, falling back to its id
pub fn section_title<'a>(template: Option<&'a Template>, section_id: &'a str) -> &'a str {
    template
        .and_then(|t| t.sections.iter().find(|s| s.id == section_id))
        .map(|s| s.title.as_str())
        .unwrap_or(section_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::prompt::tests::section;

    fn content(text: &str) -> SectionContent {
        SectionContent {
            raw_input: text.to_string(),
            ..Default::default()
        }
    }

    fn template() -> Template {
        Template {
            id: "tpl".to_string(),
            name: String::new(),
            sections: vec![
                section("b", "Verksamhet", 1, 1),
                section("a", "Sammanfattning", 1, 0),
                section("c", "Ekonomi", 1, 2),
            ],
        }
    }

    #[test]
    fn test_template_order_and_blank_filtering() {
        let mut notes = BTreeMap::new();
        notes.insert("b".to_string(), content("Vi höll läger."));
        notes.insert("a".to_string(), content("Ett bra år."));
        notes.insert("c".to_string(), content("   \n\t"));

        let inputs = collect_section_inputs(&template(), &notes);
        let titles: Vec<_> = inputs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Sammanfattning", "Verksamhet"]);
        assert_eq!(inputs[0].section_id, "a");
    }

    #[test]
    fn test_orphan_notes_follow_template() {
        let mut notes = BTreeMap::new();
        notes.insert("zz-extra".to_string(), content("Tack till alla."));
        notes.insert("a".to_string(), content("Ett bra år."));
        notes.insert("m-other".to_string(), content("Övrigt."));

        let inputs = collect_section_inputs(&template(), &notes);
        let titles: Vec<_> = inputs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Sammanfattning", "m-other", "zz-extra"]);
    }

    #[test]
    fn test_content_text() {
        let inputs = vec![
            SectionInput::new("a", "Sammanfattning", "Ett bra år."),
            SectionInput::new("b", "Verksamhet", "Läger."),
        ];
        assert_eq!(
            content_text(&inputs),
            "Sammanfattning:\nEtt bra år.\n\nVerksamhet:\nLäger."
        );
        assert_eq!(content_text(&[]), "");
    }

    #[test]
    fn test_section_title_fallback() {
        let t = template();
        assert_eq!(section_title(Some(&t), "b"), "Verksamhet");
        assert_eq!(section_title(Some(&t), "nope"), "nope");
        assert_eq!(section_title(None, "b"), "b");
    }
}
