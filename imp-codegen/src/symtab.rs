//! Maps identifier names to variable descriptors.
//!
//! Scalars and arrays are kept as a single tagged [`Descriptor`] enum
//! rather than two structs behind a shared trait — there is no shared
//! behavior beyond "has an address and a declaration line", and a trait
//! object would only get in the way of the `match`-heavy initialization
//! checks the code generator does at every use site.

use std::collections::{HashMap, HashSet};

use imp_syntax::ast::Line;

use crate::diagnostics::Diagnostic;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ArrayInit {
    /// Tracks exactly which literal indices have been written.
    PerElement(HashSet<i64>),
    /// Reached either because the array is "big" (§9: arrays over 1000
    /// elements skip per-element tracking) or because it was indexed by a
    /// scalar at least once, which conservatively initializes every cell.
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    Scalar {
        line: Line,
        address: i64,
        initialized: bool,
        is_iterator: bool,
    },
    Array {
        line: Line,
        lower: i64,
        upper: i64,
        base: i64,
        is_big: bool,
        init: ArrayInit,
    },
}

impl Descriptor {
    pub fn line(&self) -> Line {
        match self {
            Descriptor::Scalar { line, .. } => *line,
            Descriptor::Array { line, .. } => *line,
        }
    }

    pub fn address(&self) -> i64 {
        match self {
            Descriptor::Scalar { address, .. } => *address,
            Descriptor::Array { base, .. } => *base,
        }
    }

    pub fn element_count(&self) -> i64 {
        match self {
            Descriptor::Scalar { .. } => 1,
            Descriptor::Array { lower, upper, .. } => upper - lower + 1,
        }
    }
}

#[derive(Default)]
pub struct SymbolTable {
    vars: HashMap<String, Descriptor>,
    shadowed: HashMap<String, Vec<Descriptor>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_scalar(&mut self, name: &str, line: Line, address: i64) -> Result<(), Diagnostic> {
        if self.vars.contains_key(name) {
            return Err(Diagnostic::Redeclared {
                name: name.to_owned(),
                line,
            });
        }
        self.vars.insert(
            name.to_owned(),
            Descriptor::Scalar {
                line,
                address,
                initialized: false,
                is_iterator: false,
            },
        );
        Ok(())
    }

    pub fn declare_array(
        &mut self,
        name: &str,
        line: Line,
        lower: i64,
        upper: i64,
        base: i64,
        is_big: bool,
    ) -> Result<(), Diagnostic> {
        if self.vars.contains_key(name) {
            return Err(Diagnostic::Redeclared {
                name: name.to_owned(),
                line,
            });
        }
        let init = if is_big {
            ArrayInit::Full
        } else {
            ArrayInit::PerElement(HashSet::new())
        };
        self.vars.insert(
            name.to_owned(),
            Descriptor::Array {
                line,
                lower,
                upper,
                base,
                is_big,
                init,
            },
        );
        Ok(())
    }

    /// Shadows any current binding of `name`, then installs a freshly
    /// allocated, already-initialized iterator scalar.
    pub fn introduce_iterator(&mut self, name: &str, line: Line, address: i64) {
        if let Some(previous) = self.vars.remove(name) {
            self.shadowed.entry(name.to_owned()).or_default().push(previous);
        }
        self.vars.insert(
            name.to_owned(),
            Descriptor::Scalar {
                line,
                address,
                initialized: true,
                is_iterator: true,
            },
        );
    }

    /// Removes the iterator binding for `name`, restoring whatever it
    /// shadowed. Returns the iterator's cell address so the caller can
    /// release it back to the allocator.
    pub fn retire_iterator(&mut self, name: &str) -> Option<i64> {
        let current = self.vars.remove(name)?;
        let address = current.address();
        if let Some(mut stack) = self.shadowed.remove(name) {
            if let Some(restored) = stack.pop() {
                self.vars.insert(name.to_owned(), restored);
            }
            if !stack.is_empty() {
                self.shadowed.insert(name.to_owned(), stack);
            }
        }
        Some(address)
    }

    pub fn lookup(&self, name: &str, line: Line) -> Result<&Descriptor, Diagnostic> {
        self.vars.get(name).ok_or_else(|| Diagnostic::Undeclared {
            name: name.to_owned(),
            line,
        })
    }

    pub fn is_iterator(&self, name: &str) -> bool {
        matches!(
            self.vars.get(name),
            Some(Descriptor::Scalar { is_iterator: true, .. })
        )
    }

    pub fn mark_scalar_initialized(&mut self, name: &str) {
        if let Some(Descriptor::Scalar { initialized, .. }) = self.vars.get_mut(name) {
            *initialized = true;
        }
    }

    pub fn is_scalar_initialized(&self, name: &str) -> bool {
        matches!(
            self.vars.get(name),
            Some(Descriptor::Scalar { initialized: true, .. })
        )
    }

    pub fn mark_array_element_initialized(&mut self, name: &str, index: i64) {
        if let Some(Descriptor::Array { init, is_big, .. }) = self.vars.get_mut(name) {
            if !*is_big {
                if let ArrayInit::PerElement(set) = init {
                    set.insert(index);
                }
            }
        }
    }

    /// Scalar-indexed writes/reads cannot be checked at compile time, so
    /// they conservatively mark the whole array initialized (§3).
    pub fn mark_array_fully_initialized(&mut self, name: &str) {
        if let Some(Descriptor::Array { init, .. }) = self.vars.get_mut(name) {
            *init = ArrayInit::Full;
        }
    }

    pub fn is_array_element_initialized(&self, name: &str, index: i64) -> bool {
        match self.vars.get(name) {
            Some(Descriptor::Array { init, .. }) => match init {
                ArrayInit::Full => true,
                ArrayInit::PerElement(set) => set.contains(&index),
            },
            _ => false,
        }
    }

    pub fn bounds_check(&self, name: &str, index: i64, line: Line) -> Result<(), Diagnostic> {
        match self.vars.get(name) {
            Some(Descriptor::Array { lower, upper, .. }) => {
                if index < *lower || index > *upper {
                    Err(Diagnostic::IndexOutOfBounds {
                        name: name.to_owned(),
                        line,
                    })
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn redeclaration_is_rejected() {
        let mut tab = SymbolTable::new();
        tab.declare_scalar("x", 1, 2).unwrap();
        assert_eq!(
            tab.declare_scalar("x", 2, 3),
            Err(Diagnostic::Redeclared {
                name: "x".into(),
                line: 2
            })
        );
    }

    #[test]
    fn iterator_shadows_and_restores() {
        let mut tab = SymbolTable::new();
        tab.declare_scalar("i", 1, 10).unwrap();
        tab.mark_scalar_initialized("i");
        tab.introduce_iterator("i", 2, 99);
        assert!(tab.is_iterator("i"));
        assert_eq!(tab.retire_iterator("i"), Some(99));
        assert!(!tab.is_iterator("i"));
        assert_eq!(tab.lookup("i", 3).unwrap().address(), 10);
    }

    #[test]
    fn array_element_initialization_is_tracked_per_index() {
        let mut tab = SymbolTable::new();
        tab.declare_array("t", 1, 0, 3, 10, false).unwrap();
        assert!(!tab.is_array_element_initialized("t", 0));
        tab.mark_array_element_initialized("t", 0);
        assert!(tab.is_array_element_initialized("t", 0));
        assert!(!tab.is_array_element_initialized("t", 1));
    }

    #[test]
    fn big_arrays_are_always_initialized() {
        let mut tab = SymbolTable::new();
        tab.declare_array("big", 1, 0, 2000, 10, true).unwrap();
        assert!(tab.is_array_element_initialized("big", 1999));
    }

    #[test]
    fn scalar_indexed_access_marks_whole_array_initialized() {
        let mut tab = SymbolTable::new();
        tab.declare_array("t", 1, 0, 3, 10, false).unwrap();
        tab.mark_array_fully_initialized("t");
        assert!(tab.is_array_element_initialized("t", 3));
    }
}
