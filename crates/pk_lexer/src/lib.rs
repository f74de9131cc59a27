//! pk_lexer: lexer crate.
//!
//! Normalizes source text and tokenizes it into the layout-aware token stream the compiler reads.
//! Entry points: `Lexer::new(filename, input).lex()`, `normalize_source` and `decode_source`.
mod keywords;
mod lexer;
mod normalize;

pub use keywords::keyword_kind;
pub use lexer::{LexResult, Lexer};
pub use normalize::{decode_source, normalize_source};
