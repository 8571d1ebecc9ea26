mod error;
mod index;
mod tokenize;

pub use error::FulltextError;
pub use index::{FulltextIndex, ScoredId};
pub use tokenize::{TokenizeOptions, Tokenizer, tokenize};
