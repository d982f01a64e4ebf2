//! Interned symbols
//!
//! Every interpreter owns one table. Symbol names are stored upper-cased so
//! `get-env` and `GET-ENV` resolve to the same binding.

use string_interner::{DefaultStringInterner, DefaultSymbol};

/// Interned symbol handle, only meaningful for the table that produced it
pub type Symbol = DefaultSymbol;

/// Symbols the evaluator dispatches on, interned once up front
#[derive(Debug, Clone, Copy)]
pub struct Keywords {
    pub quote: Symbol,
    pub quasiquote: Symbol,
    pub unquote: Symbol,
    pub unquote_splicing: Symbol,
    pub if_: Symbol,
    pub define: Symbol,
    pub set: Symbol,
    pub lambda: Symbol,
    pub begin: Symbol,
    pub let_: Symbol,
    pub let_star: Symbol,
    pub cond: Symbol,
    pub else_: Symbol,
    pub and: Symbol,
    pub or: Symbol,
    pub when: Symbol,
    pub unless: Symbol,
    pub t: Symbol,
}

pub struct SymbolTable {
    interner: DefaultStringInterner,
    keywords: Keywords,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut interner = DefaultStringInterner::new();
        let keywords = Keywords {
            quote: interner.get_or_intern_static("QUOTE"),
            quasiquote: interner.get_or_intern_static("QUASIQUOTE"),
            unquote: interner.get_or_intern_static("UNQUOTE"),
            unquote_splicing: interner.get_or_intern_static("UNQUOTE-SPLICING"),
            if_: interner.get_or_intern_static("IF"),
            define: interner.get_or_intern_static("DEFINE"),
            set: interner.get_or_intern_static("SET!"),
            lambda: interner.get_or_intern_static("LAMBDA"),
            begin: interner.get_or_intern_static("BEGIN"),
            let_: interner.get_or_intern_static("LET"),
            let_star: interner.get_or_intern_static("LET*"),
            cond: interner.get_or_intern_static("COND"),
            else_: interner.get_or_intern_static("ELSE"),
            and: interner.get_or_intern_static("AND"),
            or: interner.get_or_intern_static("OR"),
            when: interner.get_or_intern_static("WHEN"),
            unless: interner.get_or_intern_static("UNLESS"),
            t: interner.get_or_intern_static("T"),
        };
        Self { interner, keywords }
    }

    /// Intern `name`, folding it to upper case
    pub fn intern(&mut self, name: &str) -> Symbol {
        if name.bytes().any(|b| b.is_ascii_lowercase()) {
            self.interner.get_or_intern(name.to_ascii_uppercase())
        } else {
            self.interner.get_or_intern(name)
        }
    }

    /// Name of an interned symbol
    pub fn name(&self, symbol: Symbol) -> &str {
        self.interner.resolve(symbol).unwrap_or("<unknown-symbol>")
    }

    pub fn keywords(&self) -> &Keywords {
        &self.keywords
    }

    pub fn len(&self) -> usize {
        self.interner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interner.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_folds_case() {
        let mut symbols = SymbolTable::new();
        let a = symbols.intern("get-env");
        let b = symbols.intern("GET-ENV");
        assert_eq!(a, b);
        assert_eq!(symbols.name(a), "GET-ENV");
    }

    #[test]
    fn test_keywords_are_preinterned() {
        let mut symbols = SymbolTable::new();
        let quote = symbols.keywords().quote;
        assert_eq!(symbols.intern("quote"), quote);
    }
}
