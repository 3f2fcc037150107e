//! The Compiscript type lattice.
//!
//! A [`Type`] is a small tagged value. `Null` is never the type of a
//! well-typed expression: it marks a subexpression that already produced
//! a diagnostic, and every rule that sees it stays silent so one error
//! does not cascade into a dozen.

use compiscript_base::Symbol;
use compiscript_syntax::{TypeExpr, TypeName};

/// A resolved Compiscript type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Integer,
    Float,
    Boolean,
    Str,
    Void,
    /// Error sentinel; suppresses cascaded diagnostics.
    Null,
    /// A function value (signatures live on the symbol, not the type).
    Function,
    /// An instance of the named class.
    Class(Symbol),
    /// `base[]...[]` with `dims >= 1`; `base` is always a scalar type.
    Array { base: Box<Type>, dims: u32 },
}

impl Type {
    /// Builds an array type over a scalar base.
    pub fn array(base: Type, dims: u32) -> Type {
        debug_assert!(dims >= 1);
        Type::Array { base: Box::new(base), dims }
    }

    /// The short tag used in diagnostics (`integer`, `class`, `array`, ...).
    ///
    /// Messages name the kind of type, not the specific class, matching
    /// the wording the test corpus expects.
    pub fn tag(&self) -> &'static str {
        match self {
            Type::Integer => "integer",
            Type::Float => "float",
            Type::Boolean => "boolean",
            Type::Str => "string",
            Type::Void => "void",
            Type::Null => "null",
            Type::Function => "function",
            Type::Class(_) => "class",
            Type::Array { .. } => "array",
        }
    }

    /// Storage width in bytes for frame and global layout.
    ///
    /// Boolean is conceptually one byte but occupies a full word in the
    /// frame model; references (strings, arrays, objects, functions) are
    /// 8-byte.
    pub fn byte_size(&self) -> u32 {
        match self {
            Type::Integer | Type::Boolean => 4,
            Type::Float => 8,
            Type::Str | Type::Array { .. } | Type::Class(_) | Type::Function | Type::Null => 8,
            Type::Void => 0,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Integer | Type::Float)
    }

    /// The type of one indexing step into this type.
    ///
    /// `integer[][]` indexes to `integer[]`; `integer[]` indexes to
    /// `integer`. Returns `None` for non-arrays.
    pub fn element_type(&self) -> Option<Type> {
        match self {
            Type::Array { base, dims } if *dims > 1 => {
                Some(Type::Array { base: base.clone(), dims: dims - 1 })
            }
            Type::Array { base, .. } => Some((**base).clone()),
            _ => None,
        }
    }

    /// Exact-equality assignment compatibility: no implicit widening,
    /// and `Null` is never a wildcard.
    pub fn assignable_from(&self, rhs: &Type) -> bool {
        if matches!(self, Type::Null) || matches!(rhs, Type::Null) {
            return false;
        }
        self == rhs
    }

    /// Resolves a syntactic annotation against no context: class names
    /// stay symbolic, arrays keep base + depth. Class existence is the
    /// analyzer's job.
    pub fn from_annotation(annotation: &TypeExpr) -> Type {
        let base = match annotation.base {
            TypeName::Integer => Type::Integer,
            TypeName::Str => Type::Str,
            TypeName::Boolean => Type::Boolean,
            TypeName::Void => Type::Void,
            TypeName::Float => Type::Float,
            TypeName::Named(sym) => Type::Class(sym),
        };
        if annotation.dims == 0 {
            base
        } else {
            Type::array(base, annotation.dims)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compiscript_base::Loc;

    #[test]
    fn byte_sizes_match_the_frame_model() {
        assert_eq!(Type::Integer.byte_size(), 4);
        assert_eq!(Type::Boolean.byte_size(), 4);
        assert_eq!(Type::Float.byte_size(), 8);
        assert_eq!(Type::Str.byte_size(), 8);
        assert_eq!(Type::array(Type::Integer, 1).byte_size(), 8);
        assert_eq!(Type::Void.byte_size(), 0);
    }

    #[test]
    fn assignment_requires_exact_equality() {
        assert!(Type::Integer.assignable_from(&Type::Integer));
        assert!(!Type::Integer.assignable_from(&Type::Boolean));
        assert!(!Type::Str.assignable_from(&Type::Integer));
    }

    #[test]
    fn null_is_never_a_wildcard() {
        assert!(!Type::Integer.assignable_from(&Type::Null));
        assert!(!Type::Null.assignable_from(&Type::Integer));
    }

    #[test]
    fn class_assignment_distinguishes_names() {
        let a = Symbol::EMPTY;
        let punto = Type::Class(a);
        assert!(punto.assignable_from(&Type::Class(a)));
    }

    #[test]
    fn array_assignment_compares_base_and_depth() {
        let a = Type::array(Type::Integer, 2);
        let b = Type::array(Type::Integer, 2);
        let c = Type::array(Type::Integer, 1);
        let d = Type::array(Type::Str, 2);
        assert!(a.assignable_from(&b));
        assert!(!a.assignable_from(&c));
        assert!(!a.assignable_from(&d));
    }

    #[test]
    fn element_type_peels_one_dimension() {
        let matrix = Type::array(Type::Integer, 2);
        assert_eq!(matrix.element_type(), Some(Type::array(Type::Integer, 1)));
        let row = Type::array(Type::Integer, 1);
        assert_eq!(row.element_type(), Some(Type::Integer));
        assert_eq!(Type::Integer.element_type(), None);
    }

    #[test]
    fn annotation_resolution_keeps_array_depth() {
        let annotation = TypeExpr {
            base: TypeName::Integer,
            dims: 2,
            loc: Loc::new(1, 0),
        };
        assert_eq!(Type::from_annotation(&annotation), Type::array(Type::Integer, 2));
    }
}
