use std::fmt;
use std::rc::Rc;

/// The kind of a type expression (spec.md section 3.2).
///
/// `Basic(0)` is the kind of normal values; `Basic(1)` is the kind of types.
/// Higher basic levels only ever appear nested inside a `Poly` kind -- there
/// is no surface syntax for writing a level-2 kind directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    Basic(u32),
    Poly(Rc<Kind>, Rc<Kind>),
}

impl Kind {
    pub fn value() -> Kind {
        Kind::Basic(0)
    }

    pub fn type_() -> Kind {
        Kind::Basic(1)
    }

    pub fn poly(arg: Kind, result: Kind) -> Kind {
        Kind::Poly(Rc::new(arg), Rc::new(result))
    }

    /// The level of this kind: a basic kind's own level, or one more than the
    /// level of a poly kind's result (its arg's level never contributes --
    /// applying a poly reduces to its result kind, not a level sum).
    pub fn level(&self) -> u32 {
        match self {
            Kind::Basic(level) => *level,
            Kind::Poly(_, result) => result.level(),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Basic(0) => write!(f, "%"),
            Kind::Basic(level) => write!(f, "%{level}"),
            Kind::Poly(arg, result) => write!(f, "<{arg}> {result}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_and_type_levels() {
        assert_eq!(Kind::value().level(), 0);
        assert_eq!(Kind::type_().level(), 1);
    }

    #[test]
    fn poly_kind_level_is_result_level() {
        let k = Kind::poly(Kind::type_(), Kind::value());
        assert_eq!(k.level(), 0);
    }

    #[test]
    fn equality_structural() {
        let a = Kind::poly(Kind::type_(), Kind::value());
        let b = Kind::poly(Kind::type_(), Kind::value());
        assert_eq!(a, b);
        assert_ne!(a, Kind::value());
    }
}
