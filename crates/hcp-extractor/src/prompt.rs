//! LLM prompts for chunk extraction, aggregation and coordination

use crate::chunking::Chunk;
use hcp_domain::{AggregatedResult, Candidate, Category};
use indexmap::IndexMap;

/// Builds the per-chunk extraction prompt
pub struct ExtractionPrompt<'c, 'a> {
    category: Category,
    entity: &'c str,
    chunk: &'c Chunk<'a>,
    index: usize,
    total: usize,
}

impl<'c, 'a> ExtractionPrompt<'c, 'a> {
    /// Prompt for chunk `index` (zero based) of `total`
    pub fn new(
        category: Category,
        entity: &'c str,
        chunk: &'c Chunk<'a>,
        index: usize,
        total: usize,
    ) -> Self {
        Self {
            category,
            entity,
            chunk,
            index,
            total,
        }
    }

    /// Build the complete prompt
    pub fn build(&self) -> String {
        let (role, goal) = self.category.persona();
        let [example_a, example_b] = self.category.example_values();
        let mut prompt = String::new();

        // 1. Persona
        prompt.push_str(&format!("You are a {}. {}.\n\n", role, goal));

        // 2. Task and sources
        prompt.push_str(&format!(
            "Extract ALL {} for {} from this data chunk ({} of {}):\n\n",
            self.category.subject(),
            self.entity,
            self.index + 1,
            self.total
        ));
        for (i, entry) in self.chunk.entries().iter().enumerate() {
            if i > 0 {
                prompt.push_str("\n\n");
            }
            prompt.push_str(&format!("SOURCE {} URL: {}\n", i + 1, entry.url()));
            prompt.push_str(entry.text);
        }
        prompt.push_str("\n\n");

        // 3. Category hint
        prompt.push_str(&format!("For each source, {}.\n\n", self.category.hint()));

        // 4. Rules and output format
        prompt.push_str(EXTRACTION_RULES);
        prompt.push_str("\n\n");
        prompt.push_str(&format!(
            "Format your response as a JSON object:\n\
             {{\n  \"chunk_results\": [\n    {{\"value\": \"{}\", \"source_url\": \"url1\"}},\n    \
             {{\"value\": \"{}\", \"source_url\": \"url2\"}}\n  ]\n}}\n",
            example_a, example_b
        ));
        prompt.push_str(OUTPUT_REMINDER);

        prompt
    }
}

const EXTRACTION_RULES: &str = r#"IMPORTANT:
1. Extract ALL values you can find from EACH source, even when sources repeat each other
2. Include the exact source URL for each extracted value
3. Only report what the sources state; never guess or fill in values
4. If no source mentions a value, return an empty "chunk_results" list"#;

const OUTPUT_REMINDER: &str = "Respond with the JSON object only, no additional text.";

/// Builds the cross-chunk aggregation prompt
pub fn aggregation_prompt(category: Category, entity: &str, candidates: &[Candidate]) -> String {
    let listing = serde_json::to_string_pretty(candidates).unwrap_or_else(|_| "[]".to_string());
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "Aggregate these {} results for {} from multiple data chunks:\n\n",
        category.subject(),
        entity
    ));
    prompt.push_str(&listing);
    prompt.push_str("\n\n");
    prompt.push_str(AGGREGATION_RULES);
    prompt.push_str("\n\n");
    prompt.push_str(AGGREGATION_FORMAT);
    prompt.push_str(OUTPUT_REMINDER);
    prompt
}

const AGGREGATION_RULES: &str = r#"IMPORTANT:
1. Combine all extracted values from all chunks
2. Treat values that name the same thing in different words as one value
3. Identify the MOST COMMON value across all sources
4. "count" is the number of listed values that support the most common value
5. Keep every listed value in "all_values" with its source URL"#;

const AGGREGATION_FORMAT: &str = r#"Format your response as a JSON object:
{
  "most_common": {
    "value": "The most common value",
    "count": 3,
    "source_urls": ["url1", "url2", "url3"]
  },
  "all_values": [
    {"value": "Value 1", "source_url": "url1"},
    {"value": "Value 2", "source_url": "url2"}
  ]
}
"#;

/// Builds the final coordination prompt
pub fn coordination_prompt(entity: &str, results: &IndexMap<Category, AggregatedResult>) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "Integrate these extracted data points about {} with multiple sources into a single, structured format:\n\n",
        entity
    ));
    for (category, result) in results {
        let json = serde_json::to_string(result).unwrap_or_else(|_| "{}".to_string());
        prompt.push_str(&format!("{}: {}\n", category.field_name(), json));
    }
    prompt.push_str("\n");
    prompt.push_str(COORDINATION_RULES);
    prompt.push_str("\n\n");

    prompt.push_str("Format your response as a complete JSON object with these keys: ");
    let keys: Vec<&str> = results.keys().map(|c| c.field_name()).collect();
    prompt.push_str(&keys.join(", "));
    prompt.push_str("\n");
    prompt.push_str(COORDINATION_FORMAT);
    prompt.push_str(OUTPUT_REMINDER);
    prompt
}

const COORDINATION_RULES: &str = r#"Create a structured JSON object with all these fields:
1. For each field, use the "most_common" value as the primary value
2. Include source URLs for each piece of information
3. Add confidence based on agreement across sources:
   - "High" if the same value appears in 3+ sources
   - "Medium" if the same value appears in 2 sources
   - "Low" if there's no consensus or only 1 source
4. For each field, also include an "alternatives" list with the other values found
5. Keep sentinel values such as "No data available" unchanged"#;

const COORDINATION_FORMAT: &str = r#"{
  "FIELD_NAME": {
    "value": "...",
    "source_urls": ["url1", "url2"],
    "confidence": "High",
    "alternatives": [
      {"value": "...", "source_urls": ["url3"]}
    ]
  }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Chunker;
    use crate::tokens::WordCountEstimator;
    use hcp_domain::Evidence;
    use std::sync::Arc;

    #[test]
    fn test_extraction_prompt_embeds_sources_verbatim() {
        let corpus = vec![
            Evidence::new("https://a.ae/contact", "Call 800 342 for appointments."),
            Evidence::new("https://b.ae/about", "Main line: +971 4 219 2000"),
        ];
        let chunker = Chunker::new(10_000, Arc::new(WordCountEstimator));
        let chunks = chunker.chunk(&corpus);

        let prompt = ExtractionPrompt::new(Category::Phone, "Rashid Hospital", &chunks[0], 0, 1).build();

        assert!(prompt.contains("(1 of 1)"));
        assert!(prompt.contains("SOURCE 1 URL: https://a.ae/contact\nCall 800 342 for appointments."));
        assert!(prompt.contains("SOURCE 2 URL: https://b.ae/about\nMain line: +971 4 219 2000"));
        assert!(prompt.contains("\"chunk_results\""));
        assert!(prompt.contains("Rashid Hospital"));
        assert!(prompt.contains(Category::Phone.subject()));
    }

    #[test]
    fn test_aggregation_prompt_lists_candidates() {
        let candidates = vec![
            Candidate::new("Blue Cross", "u1"),
            Candidate::new("BCBS", "u2"),
        ];
        let prompt = aggregation_prompt(Category::Insurance, "Rashid Hospital", &candidates);
        assert!(prompt.contains("\"Blue Cross\""));
        assert!(prompt.contains("\"BCBS\""));
        assert!(prompt.contains("most_common"));
    }

    #[test]
    fn test_coordination_prompt_uses_field_names() {
        let mut results = IndexMap::new();
        results.insert(Category::Revenue, AggregatedResult::no_data());
        results.insert(Category::Location, AggregatedResult::no_data());

        let prompt = coordination_prompt("Rashid Hospital", &results);
        assert!(prompt.contains("NETREVENUEYEARLY: {"));
        assert!(prompt.contains("UAE_LOCATION: {"));
        assert!(prompt.contains("NETREVENUEYEARLY, UAE_LOCATION"));
    }
}
