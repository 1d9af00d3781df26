//! Token-bounded chunking of a category corpus

use crate::tokens::TokenEstimator;
use hcp_domain::Evidence;
use std::sync::Arc;

/// One evidence item, or one contiguous slice of it, inside a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkEntry<'a> {
    /// The evidence this entry came from
    pub evidence: &'a Evidence,
    /// Text to submit: the whole evidence text, or a run of its paragraphs
    pub text: &'a str,
    /// Position of the evidence in the corpus
    pub source_index: usize,
    /// Piece number when an oversized evidence item was split
    pub part: Option<usize>,
}

impl ChunkEntry<'_> {
    /// Source URL
    pub fn url(&self) -> &str {
        &self.evidence.url
    }
}

/// Token-bounded group of evidence submitted in one extraction call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<'a> {
    entries: Vec<ChunkEntry<'a>>,
    estimated_tokens: usize,
}

impl<'a> Chunk<'a> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            estimated_tokens: 0,
        }
    }

    /// Entries in corpus order
    pub fn entries(&self) -> &[ChunkEntry<'a>] {
        &self.entries
    }

    /// Sum of the entries' estimated costs
    pub fn estimated_tokens(&self) -> usize {
        self.estimated_tokens
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chunk has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, entry: ChunkEntry<'a>, cost: usize) {
        self.entries.push(entry);
        self.estimated_tokens += cost;
    }
}

/// Header placed before every source inside an extraction prompt
pub fn source_header(url: &str) -> String {
    format!("SOURCE URL: {}\n", url)
}

/// Splits a corpus into chunks whose estimated cost stays under a ceiling.
///
/// Evidence is taken in corpus order. An item that does not fit in the
/// running chunk closes it. An item that alone exceeds the ceiling is split
/// on blank lines into pieces carrying the same URL; a single paragraph
/// larger than the ceiling is passed through as its own chunk.
pub struct Chunker {
    ceiling: usize,
    estimator: Arc<dyn TokenEstimator>,
}

struct ChunkBuilder<'a> {
    ceiling: usize,
    chunks: Vec<Chunk<'a>>,
    current: Chunk<'a>,
}

impl<'a> ChunkBuilder<'a> {
    fn fits(&self, cost: usize) -> bool {
        self.current.estimated_tokens + cost <= self.ceiling
    }

    fn close(&mut self) {
        if !self.current.is_empty() {
            let full = std::mem::replace(&mut self.current, Chunk::new());
            self.chunks.push(full);
        }
    }

    fn finish(mut self) -> Vec<Chunk<'a>> {
        self.close();
        self.chunks
    }
}

impl Chunker {
    /// Create a chunker with the given ceiling and estimator
    pub fn new(ceiling: usize, estimator: Arc<dyn TokenEstimator>) -> Self {
        Self { ceiling, estimator }
    }

    /// Token ceiling per chunk
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Estimated cost of one whole evidence item including its header
    pub fn evidence_cost(&self, evidence: &Evidence) -> usize {
        let mut text = source_header(&evidence.url);
        text.push_str(&evidence.text);
        self.estimator.estimate(&text)
    }

    /// Chunk `corpus`. An empty corpus yields no chunks.
    pub fn chunk<'a>(&self, corpus: &'a [Evidence]) -> Vec<Chunk<'a>> {
        let mut builder = ChunkBuilder {
            ceiling: self.ceiling,
            chunks: Vec::new(),
            current: Chunk::new(),
        };

        for (source_index, evidence) in corpus.iter().enumerate() {
            let cost = self.evidence_cost(evidence);
            if cost <= self.ceiling {
                if !builder.fits(cost) {
                    builder.close();
                }
                builder.current.push(
                    ChunkEntry {
                        evidence,
                        text: &evidence.text,
                        source_index,
                        part: None,
                    },
                    cost,
                );
            } else {
                self.split_oversized(&mut builder, source_index, evidence, cost);
            }
        }

        builder.finish()
    }

    fn split_oversized<'a>(
        &self,
        builder: &mut ChunkBuilder<'a>,
        source_index: usize,
        evidence: &'a Evidence,
        whole_cost: usize,
    ) {
        let text = evidence.text.as_str();
        let spans = paragraph_spans(text);
        if spans.is_empty() {
            // Nothing to split on: the cost is all header
            builder.close();
            builder.current.push(
                ChunkEntry {
                    evidence,
                    text,
                    source_index,
                    part: None,
                },
                whole_cost,
            );
            builder.close();
            return;
        }

        let header_cost = self.estimator.estimate(&source_header(&evidence.url));
        let mut part = 0;
        // Open piece: first paragraph span start, last span end, accumulated cost
        let mut piece: Option<(usize, usize, usize)> = None;

        for (start, end) in spans {
            let paragraph_cost = self.estimator.estimate(&text[start..end]);
            let added = match piece {
                Some(_) => paragraph_cost,
                None => header_cost + paragraph_cost,
            };
            let pending = piece.map_or(0, |(_, _, cost)| cost);

            if builder.current.estimated_tokens + pending + added > builder.ceiling {
                if let Some((piece_start, piece_end, piece_cost)) = piece.take() {
                    builder.current.push(
                        ChunkEntry {
                            evidence,
                            text: &text[piece_start..piece_end],
                            source_index,
                            part: Some(part),
                        },
                        piece_cost,
                    );
                    part += 1;
                }
                builder.close();
            }

            piece = Some(match piece {
                Some((piece_start, _, cost)) => (piece_start, end, cost + paragraph_cost),
                None => (start, end, header_cost + paragraph_cost),
            });
        }

        if let Some((piece_start, piece_end, piece_cost)) = piece {
            builder.current.push(
                ChunkEntry {
                    evidence,
                    text: &text[piece_start..piece_end],
                    source_index,
                    part: Some(part),
                },
                piece_cost,
            );
        }
    }
}

/// Byte ranges of the non-blank paragraphs of `text`, split on `\n\n`
fn paragraph_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (idx, sep) in text.match_indices("\n\n") {
        spans.push((start, idx));
        start = idx + sep.len();
    }
    spans.push((start, text.len()));
    spans.retain(|&(s, e)| !text[s..e].trim().is_empty());
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::WordCountEstimator;
    use proptest::prelude::*;

    fn chunker(ceiling: usize) -> Chunker {
        Chunker::new(ceiling, Arc::new(WordCountEstimator))
    }

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_empty_corpus_yields_no_chunks() {
        assert!(chunker(100).chunk(&[]).is_empty());
    }

    #[test]
    fn test_small_corpus_fits_one_chunk() {
        let corpus = vec![
            Evidence::new("https://a.ae", words(10)),
            Evidence::new("https://b.ae", words(10)),
        ];
        let chunks = chunker(1_000).chunk(&corpus);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 2);
        assert_eq!(chunks[0].entries()[1].url(), "https://b.ae");
        assert!(chunks[0].entries().iter().all(|e| e.part.is_none()));
    }

    #[test]
    fn test_overflow_starts_new_chunk() {
        // header "SOURCE URL: x" is 3 words; 3 + 20 words = 23 words = 35 tokens
        let corpus = vec![
            Evidence::new("x", words(20)),
            Evidence::new("y", words(20)),
            Evidence::new("z", words(20)),
        ];
        let chunks = chunker(70).chunk(&corpus);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 2);
        assert_eq!(chunks[0].estimated_tokens(), 70);
        assert_eq!(chunks[1].entries()[0].source_index, 2);
    }

    #[test]
    fn test_oversized_evidence_split_on_paragraphs() {
        let text = [words(10), words(10), words(10), words(10)].join("\n\n");
        let corpus = vec![Evidence::new("x", text)];

        // header 3 words (5 tokens) + paragraphs of 15 tokens each
        let chunks = chunker(40).chunk(&corpus);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.estimated_tokens() <= 40);
            for entry in chunk.entries() {
                assert_eq!(entry.url(), "x");
                assert!(entry.part.is_some());
            }
        }
        let parts: Vec<usize> = chunks
            .iter()
            .flat_map(|c| c.entries().iter().filter_map(|e| e.part))
            .collect();
        assert_eq!(parts, (0..parts.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_single_huge_paragraph_passes_through() {
        let corpus = vec![
            Evidence::new("a", words(5)),
            Evidence::new("b", words(200)),
            Evidence::new("c", words(5)),
        ];
        let chunks = chunker(50).chunk(&corpus);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].len(), 1);
        assert_eq!(chunks[1].entries()[0].url(), "b");
        assert!(chunks[1].estimated_tokens() > 50);
        assert_eq!(chunks[2].entries()[0].url(), "c");
    }

    #[test]
    fn test_paragraph_spans_skip_blank_runs() {
        let text = "a\n\n\n\n  \n\nb";
        let spans = paragraph_spans(text);
        assert_eq!(spans.len(), 2);
        assert_eq!(&text[spans[0].0..spans[0].1], "a");
        assert_eq!(&text[spans[1].0..spans[1].1], "b");
    }

    fn corpus_strategy() -> impl Strategy<Value = Vec<Evidence>> {
        let paragraph = (1usize..40).prop_map(words);
        let text = prop::collection::vec(paragraph, 1..6).prop_map(|ps| ps.join("\n\n"));
        prop::collection::vec(text, 0..12).prop_map(|texts| {
            texts
                .into_iter()
                .enumerate()
                .map(|(i, t)| Evidence::new(format!("https://s{}.ae", i), t))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_every_evidence_covered_once(corpus in corpus_strategy(), ceiling in 20usize..300) {
            let chunker = chunker(ceiling);
            let chunks = chunker.chunk(&corpus);

            for (i, evidence) in corpus.iter().enumerate() {
                let entries: Vec<&ChunkEntry> = chunks
                    .iter()
                    .flat_map(|c| c.entries())
                    .filter(|e| e.source_index == i)
                    .collect();
                prop_assert!(!entries.is_empty());

                if entries[0].part.is_none() {
                    prop_assert_eq!(entries.len(), 1);
                    prop_assert_eq!(entries[0].text, evidence.text.as_str());
                } else {
                    let rebuilt: Vec<&str> = entries
                        .iter()
                        .flat_map(|e| e.text.split("\n\n"))
                        .filter(|p| !p.trim().is_empty())
                        .collect();
                    let original: Vec<&str> = evidence
                        .text
                        .split("\n\n")
                        .filter(|p| !p.trim().is_empty())
                        .collect();
                    prop_assert_eq!(rebuilt, original);
                }
            }
        }

        #[test]
        fn prop_chunks_respect_ceiling(corpus in corpus_strategy(), ceiling in 20usize..300) {
            let chunks = chunker(ceiling).chunk(&corpus);
            for chunk in &chunks {
                prop_assert!(!chunk.is_empty());
                let single_paragraph = chunk.len() == 1
                    && !chunk.entries()[0].text.contains("\n\n");
                prop_assert!(chunk.estimated_tokens() <= ceiling || single_paragraph);
            }
        }

        #[test]
        fn prop_chunks_preserve_corpus_order(corpus in corpus_strategy(), ceiling in 20usize..300) {
            let chunks = chunker(ceiling).chunk(&corpus);
            let order: Vec<usize> = chunks
                .iter()
                .flat_map(|c| c.entries().iter().map(|e| e.source_index))
                .collect();
            let mut sorted = order.clone();
            sorted.sort();
            prop_assert_eq!(order, sorted);
        }
    }
}
