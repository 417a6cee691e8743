//! Core of SiftQL: the query vault, guards, grammar registry, compiler
//! pipeline and predicate backend, with the ergonomics exported via the
//! `prelude`.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod compile;
pub mod error;
pub mod expr;
pub mod guard;
pub mod predicate;
pub mod syntax;
pub mod value;
pub mod vault;

///
/// Prelude
///
/// Types needed to compile a query and run the resulting filter.
///

pub mod prelude {
    pub use crate::{
        compile::{Compiler, Settings, TranspileOptions, Transpiled},
        error::{ErrorKind, QueryError},
        predicate::{FilterPredicate, PredicateMode},
        syntax::{GrammarRule, SynonymRule, SyntaxExtension},
    };
}
