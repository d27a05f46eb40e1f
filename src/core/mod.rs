// src/core/mod.rs

//! The templating engine: classifier, escaper, tokenizer and placeholder expander.

pub mod charset;
pub mod escaper;
pub mod template;
pub mod tokenizer;
