//! The Tern type system: the closed vocabulary of §4.4 plus the
//! assignability/promotion/cast predicates every pass shares.

use crate::ast::CompositeKind;
use std::fmt;

/// A resolved type. Primitive and composite forms are the closed
/// vocabulary spec.md describes as "strings"; this enum is the typed
/// equivalent, with [`Type::name`] producing the canonical string form
/// (`"int"`, `"struct Point"`, `"array<int,4>"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Bool,
    Text,
    Void,
    Struct(String),
    Class(String),
    Array(Box<Type>, u64),
}

impl Type {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::Bool)
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Type::Struct(_) | Type::Class(_))
    }

    /// The name of a composite type, if this is one.
    pub fn composite_name(&self) -> Option<&str> {
        match self {
            Type::Struct(n) | Type::Class(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Bool => write!(f, "bool"),
            Type::Text => write!(f, "text"),
            Type::Void => write!(f, "void"),
            Type::Struct(n) => write!(f, "struct {}", n),
            Type::Class(n) => write!(f, "class {}", n),
            Type::Array(elem, n) => write!(f, "array<{},{}>", elem, n),
        }
    }
}

/// `dst` accepts a value of type `src` without an explicit cast.
pub fn is_assignable(dst: &Type, src: &Type) -> bool {
    if dst == src {
        return true;
    }
    match (dst, src) {
        (Type::Int, Type::Bool) | (Type::Bool, Type::Int) => true,
        (Type::Float, Type::Int) | (Type::Float, Type::Float) | (Type::Float, Type::Bool) => true,
        _ => false,
    }
}

/// The result type of a numeric binary operator applied to `a` and `b`:
/// float if either operand is float, otherwise int.
pub fn numeric_result(a: &Type, b: &Type) -> Type {
    if matches!(a, Type::Float) || matches!(b, Type::Float) {
        Type::Float
    } else {
        Type::Int
    }
}

/// `src` can be explicitly cast to `dst` with a `TYPE(expr)` cast.
pub fn is_castable(src: &Type, dst: &Type) -> bool {
    if src == dst {
        return true;
    }
    match (src, dst) {
        (s, Type::Int) | (s, Type::Float) | (s, Type::Bool) if s.is_numeric() => true,
        (Type::Text, Type::Text) => true,
        _ => false,
    }
}

/// A struct/class declaration: an ordered field-name -> field-type
/// mapping. Field order is preserved because it determines C struct
/// layout and (eventually) field offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeType {
    pub kind: CompositeKind,
    pub name: String,
    pub fields: Vec<(String, Type)>,
}

impl CompositeType {
    pub fn field_type(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

/// Integer division rounds toward negative infinity, matching the
/// reference evaluator this language's semantics were distilled from.
/// Both the constant evaluator (semantic analysis) and constant folding
/// (the optimizer) call this so `7 / -2` is `-4` everywhere, not just in
/// diagnostics.
pub fn floor_div_i64(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// A function's arity and types, collected in the function-signature
/// collection pass before any body is analyzed.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub return_type: Type,
    pub params: Vec<(String, Type)>,
}

impl FunctionSignature {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignability_matches_spec() {
        assert!(is_assignable(&Type::Int, &Type::Int));
        assert!(is_assignable(&Type::Int, &Type::Bool));
        assert!(is_assignable(&Type::Bool, &Type::Int));
        assert!(is_assignable(&Type::Float, &Type::Int));
        assert!(is_assignable(&Type::Float, &Type::Bool));
        assert!(!is_assignable(&Type::Int, &Type::Float));
        assert!(!is_assignable(&Type::Text, &Type::Int));
    }

    #[test]
    fn numeric_result_prefers_float() {
        assert_eq!(numeric_result(&Type::Int, &Type::Int), Type::Int);
        assert_eq!(numeric_result(&Type::Int, &Type::Float), Type::Float);
        assert_eq!(numeric_result(&Type::Bool, &Type::Bool), Type::Int);
    }

    #[test]
    fn floor_div_rounds_toward_negative_infinity() {
        assert_eq!(floor_div_i64(7, 2), 3);
        assert_eq!(floor_div_i64(-7, 2), -4);
        assert_eq!(floor_div_i64(7, -2), -4);
        assert_eq!(floor_div_i64(-7, -2), 3);
    }

    #[test]
    fn display_renders_closed_vocabulary() {
        assert_eq!(Type::Struct("Point".into()).to_string(), "struct Point");
        assert_eq!(
            Type::Array(Box::new(Type::Int), 4).to_string(),
            "array<int,4>"
        );
    }
}
