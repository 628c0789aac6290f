//! Tolerant JSON extraction from LLM prose (§4.3).
//!
//! LLM responses may wrap JSON in markdown fences, include leading/trailing
//! prose, or occasionally fail to be valid JSON at all. This module finds
//! and parses the JSON array regardless, returning an empty list rather
//! than an error when nothing usable is found.

use serde::Deserialize;

/// One concept as returned by the LLM concept-extraction prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLlmConcept {
    pub name: String,
    #[serde(rename = "type")]
    pub concept_type: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub related_concepts: Vec<String>,
}

/// One relationship as returned by the LLM relationship-analysis prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLlmRelation {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub strength: f64,
    pub description: Option<String>,
}

/// Parses a concept-extraction LLM response. Returns an empty vec (with a
/// logged warning) on malformed JSON rather than failing the extraction.
pub fn parse_concepts_json(response: &str) -> Vec<RawLlmConcept> {
    let json_str = extract_json_array(response);
    match serde_json::from_str::<Vec<RawLlmConcept>>(&json_str) {
        Ok(concepts) => concepts
            .into_iter()
            .filter(|c| !c.name.trim().is_empty())
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse concepts JSON from LLM response");
            Vec::new()
        }
    }
}

/// Parses a relationship-analysis LLM response. `type` is upper-cased with
/// spaces replaced by underscores and must match `^[A-Z_]+$` afterward, or
/// the relation is dropped; `strength` is clamped to `[0, 1]`.
pub fn parse_relationships_json(response: &str) -> Vec<RawLlmRelation> {
    let json_str = extract_json_array(response);
    match serde_json::from_str::<Vec<RawLlmRelation>>(&json_str) {
        Ok(relations) => relations
            .into_iter()
            .filter_map(|mut r| {
                let normalized_type = r.rel_type.trim().to_uppercase().replace(' ', "_");
                if normalized_type.is_empty() || !normalized_type.chars().all(|c| c == '_' || c.is_ascii_uppercase()) {
                    return None;
                }
                r.rel_type = normalized_type;
                r.strength = r.strength.clamp(0.0, 1.0);
                if r.source.trim().is_empty() || r.target.trim().is_empty() {
                    return None;
                }
                Some(r)
            })
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse relationships JSON from LLM response");
            Vec::new()
        }
    }
}

/// Extract a JSON array from a response that may contain extra text.
///
/// Tries, in order: strip markdown code fences; if the cleaned text starts
/// with `[`, take up to its matching `]`; else search for the first `[`
/// anywhere and take up to its matching `]`; else return the text as-is.
pub fn extract_json_array(response: &str) -> String {
    let response = response.trim();
    let stripped = strip_code_fences(response);

    if stripped.starts_with('[') {
        if let Some(end) = find_matching_bracket(stripped) {
            return stripped[..=end].to_string();
        }
    }

    if let Some(start) = stripped.find('[') {
        if let Some(end) = find_matching_bracket(&stripped[start..]) {
            return stripped[start..=start + end].to_string();
        }
    }

    stripped.to_string()
}

fn strip_code_fences(s: &str) -> &str {
    let s = s.trim();
    if s.starts_with("```") {
        if let Some(first_newline) = s.find('\n') {
            let inner = &s[first_newline + 1..];
            if let Some(closing) = inner.rfind("```") {
                return inner[..closing].trim();
            }
        }
    }
    s
}

/// Finds the index of the `]` that matches the first `[` in the string.
fn find_matching_bracket(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.chars().enumerate() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if c == '\\' && in_string {
            escape_next = true;
            continue;
        }
        if c == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_clean_array() {
        let input = r#"[{"name":"GraphRAG","related_concepts":[]}]"#;
        assert_eq!(extract_json_array(input), input);
    }

    #[test]
    fn extracts_with_markdown_fences() {
        let input = "```json\n[{\"name\":\"GraphRAG\"}]\n```";
        let result = extract_json_array(input);
        assert!(result.starts_with('['));
        assert!(result.ends_with(']'));
    }

    #[test]
    fn extracts_with_leading_and_trailing_prose() {
        let input = r#"Here are the concepts: [{"name":"a"}] Hope this helps!"#;
        let result = extract_json_array(input);
        assert_eq!(result, r#"[{"name":"a"}]"#);
    }

    #[test]
    fn ignores_brackets_inside_strings() {
        let input = r#"[{"name":"array[0]"}]"#;
        let result = extract_json_array(input);
        assert_eq!(result, input);
    }

    #[test]
    fn parse_concepts_filters_empty_names() {
        let input = r#"[{"name":"GraphRAG","type":"Technology","related_concepts":["RAG"]},{"name":""}]"#;
        let concepts = parse_concepts_json(input);
        assert_eq!(concepts.len(), 1);
        assert_eq!(concepts[0].name, "GraphRAG");
        assert_eq!(concepts[0].related_concepts, vec!["RAG".to_string()]);
    }

    #[test]
    fn parse_concepts_invalid_json_is_empty() {
        assert!(parse_concepts_json("not json at all").is_empty());
    }

    #[test]
    fn parse_relationships_normalizes_type_and_clamps_strength() {
        let input = r#"[{"source":"a","target":"b","type":"is a","strength":4.5}]"#;
        let relations = parse_relationships_json(input);
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].rel_type, "IS_A");
        assert_eq!(relations[0].strength, 1.0);
    }

    #[test]
    fn parse_relationships_drops_invalid_type_after_normalization() {
        let input = r#"[{"source":"a","target":"b","type":"is-a","strength":0.5}]"#;
        assert!(parse_relationships_json(input).is_empty());
    }

    #[test]
    fn parse_relationships_drops_blank_endpoints() {
        let input = r#"[{"source":"","target":"b","type":"RELATED_TO","strength":0.5}]"#;
        assert!(parse_relationships_json(input).is_empty());
    }
}
