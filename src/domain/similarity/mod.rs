//! Similarity domain - pluggable text similarity

mod lexical;
mod scorer;

pub use lexical::{LexicalSimilarity, cosine_similarity};
pub use scorer::SimilarityScorer;

#[cfg(test)]
pub use scorer::mock::MockSimilarity;
