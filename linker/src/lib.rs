// gatelink — network linker for reactive control-logic modules
//
// Library root. Front end (lexer, parser, load), link passes in pipeline
// order, then the consumers of a linked network.

pub mod ast;
pub mod diag;
pub mod id;
pub mod lexer;
pub mod load;
pub mod name;
pub mod network;
pub mod parser;

pub mod alias;
pub mod alloc;
pub mod bitio;
pub mod count;
pub mod fill;
pub mod pass;
pub mod pipeline;
pub mod split;
pub mod symtab;
pub mod validate;

pub mod dot;
pub mod emit_c;
pub mod interp;
pub mod linked;
pub mod listing;
pub mod summary;
