pub mod cleaner;
pub mod cli;
pub mod database;
pub mod detect;
pub mod extractors;
pub mod model;
pub mod pyexpr;
pub mod scope;
pub mod source_root;
pub mod tokenizer;
pub mod util;
