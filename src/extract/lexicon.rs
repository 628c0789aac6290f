//! Closed keyword lexicons for the PE and domain keyword passes (§4.3 passes
//! 2-3). These term sets are carried forward verbatim from the original
//! implementation's keyword tables, not invented here.

/// Prompt-engineering terms, matched case-insensitively against raw text.
/// `(term, abbreviation)`.
pub const PE_LEXICON: &[(&str, &str)] = &[
    ("prompt engineering", "PE"),
    ("chain of thought", "COT"),
    ("few-shot learning", "FSL"),
    ("zero-shot learning", "ZSL"),
    ("in-context learning", "ICL"),
    ("retrieval augmented generation", "RAG"),
    ("prompt template", "PT"),
    ("system prompt", "SP"),
    ("user prompt", "UP"),
    ("assistant prompt", "AP"),
    ("prompt chaining", "PC"),
    ("prompt tuning", "PTU"),
    ("prompt optimization", "PO"),
    ("prompt injection", "PI"),
    ("prompt leaking", "PL"),
    ("prompt hacking", "PH"),
    ("jailbreaking", "JB"),
    ("role prompting", "RP"),
    ("persona prompting", "PP"),
    ("instruction prompting", "IP"),
    ("task-specific prompting", "TSP"),
    ("self-consistency", "SC"),
    ("tree of thought", "TOT"),
    ("reasoning", "RE"),
    ("step-by-step", "SBS"),
    ("fine-tuning", "FT"),
    ("parameter efficient fine-tuning", "PEFT"),
    ("low-rank adaptation", "LORA"),
    ("knowledge graph", "KG"),
    ("vector database", "VDB"),
    ("embedding", "EMB"),
    ("token", "TOK"),
    ("tokenization", "TKZ"),
    ("temperature", "TEMP"),
    ("top-p sampling", "TPS"),
    ("top-k sampling", "TKS"),
    ("beam search", "BS"),
    ("greedy decoding", "GD"),
    ("hallucination", "HAL"),
    ("context window", "CW"),
    ("attention mechanism", "AM"),
    ("transformer", "TR"),
    ("large language model", "LLM"),
    ("generative ai", "GAI"),
    ("natural language processing", "NLP"),
    ("natural language understanding", "NLU"),
    ("natural language generation", "NLG"),
    ("semantic search", "SS"),
    ("similarity search", "SIS"),
    ("cosine similarity", "CS"),
    ("vector embedding", "VE"),
    ("text embedding", "TE"),
    ("document embedding", "DE"),
    ("sentence embedding", "SE"),
    ("word embedding", "WE"),
    ("contextual embedding", "CE"),
    ("knowledge distillation", "KD"),
    ("knowledge extraction", "KE"),
    ("knowledge representation", "KR"),
    ("knowledge base", "KB"),
    ("ontology", "ONT"),
    ("taxonomy", "TAX"),
    ("semantic network", "SN"),
    ("semantic web", "SW"),
    ("semantic triple", "ST"),
    ("entity extraction", "EE"),
    ("named entity recognition", "NER"),
    ("relation extraction", "RE"),
    ("information extraction", "IE"),
    ("information retrieval", "IR"),
    ("question answering", "QA"),
    ("chatbot", "CB"),
    ("conversational ai", "CAI"),
    ("dialogue system", "DS"),
    ("dialogue management", "DM"),
    ("dialogue state tracking", "DST"),
    ("dialogue policy", "DP"),
    ("dialogue generation", "DG"),
    ("dialogue understanding", "DU"),
    ("dialogue context", "DC"),
    ("dialogue history", "DH"),
    ("dialogue turn", "DT"),
    ("dialogue act", "DA"),
    ("dialogue intent", "DI"),
    ("dialogue knowledge", "DK"),
    ("dialogue feedback", "DF"),
    ("dialogue optimization", "DO"),
    ("dialogue learning", "DL"),
    ("dialogue domain", "DD"),
];

/// General ML/AI terms matched case-insensitively against raw text.
/// `(term, abbreviation)`.
pub const COMMON_LEXICON: &[(&str, &str)] = &[
    ("machine learning", "ML"),
    ("neural network", "NN"),
    ("deep learning", "DL"),
    ("artificial intelligence", "AI"),
    ("natural language processing", "NLP"),
    ("computer vision", "CV"),
    ("reinforcement learning", "RL"),
    ("supervised learning", "SL"),
    ("unsupervised learning", "UL"),
    ("transformer", "TR"),
    ("attention mechanism", "AM"),
    ("convolutional neural network", "CNN"),
    ("recurrent neural network", "RNN"),
    ("long short-term memory", "LSTM"),
    ("gated recurrent unit", "GRU"),
    ("generative adversarial network", "GAN"),
    ("transfer learning", "TL"),
    ("fine-tuning", "FT"),
    ("backpropagation", "BP"),
    ("gradient descent", "GD"),
    ("retrieval-augmented generation", "RAG"),
    ("graphrag", "GRAG"),
    ("knowledge graph", "KG"),
    ("vector database", "VDB"),
    ("embedding", "EMB"),
    ("hybrid search", "HS"),
    ("deduplication", "DD"),
    ("large language model", "LLM"),
    ("neo4j", "NEO"),
    ("chromadb", "CHROMA"),
];

/// Per-domain keyword lexicons matched case-insensitively; `domain` selects
/// which sub-table (besides [`COMMON_LEXICON`]) applies to a document.
pub const DOMAIN_LEXICONS: &[(&str, &[(&str, &str)])] = &[
    (
        "AI",
        &[
            ("prompt engineering", "PE"),
            ("chain of thought", "COT"),
            ("few-shot learning", "FSL"),
            ("zero-shot learning", "ZSL"),
            ("multimodal", "MM"),
            ("text-to-image", "T2I"),
            ("diffusion model", "DM"),
            ("stable diffusion", "SD"),
            ("dall-e", "DALLE"),
            ("midjourney", "MJ"),
            ("gpt", "GPT"),
            ("bert", "BERT"),
            ("t5", "T5"),
            ("llama", "LLAMA"),
            ("claude", "CLAUDE"),
        ],
    ),
    (
        "Programming",
        &[
            ("python", "PY"),
            ("javascript", "JS"),
            ("typescript", "TS"),
            ("java", "JAVA"),
            ("c++", "CPP"),
            ("rust", "RUST"),
            ("go", "GO"),
            ("docker", "DOCKER"),
            ("kubernetes", "K8S"),
            ("microservices", "MS"),
            ("api", "API"),
            ("rest", "REST"),
            ("graphql", "GQL"),
            ("database", "DB"),
            ("sql", "SQL"),
            ("nosql", "NOSQL"),
            ("git", "GIT"),
            ("ci/cd", "CICD"),
            ("devops", "DEVOPS"),
        ],
    ),
];

/// Looks up the keyword table for a domain name (case-insensitive), if any.
pub fn domain_lexicon(domain: &str) -> Option<&'static [(&'static str, &'static str)]> {
    DOMAIN_LEXICONS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(domain))
        .map(|(_, table)| *table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_lexicon_lookup_is_case_insensitive() {
        assert!(domain_lexicon("ai").is_some());
        assert!(domain_lexicon("Programming").is_some());
        assert!(domain_lexicon("unknown-domain").is_none());
    }

    #[test]
    fn lexicons_are_non_empty() {
        assert!(!PE_LEXICON.is_empty());
        assert!(!COMMON_LEXICON.is_empty());
    }
}
