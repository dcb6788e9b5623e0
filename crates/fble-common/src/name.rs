use std::fmt;

use crate::loc::Loc;

/// Which lexical namespace a name lives in (spec.md section 3.1).
///
/// `Foo` binds in the `Normal` namespace (values); `Foo@` binds in the
/// `Type` namespace. The two namespaces never collide: a module may declare
/// both a value `Point` and a type `Point@` with no ambiguity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameSpace {
    Normal,
    Type,
}

impl fmt::Display for NameSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameSpace::Normal => Ok(()),
            NameSpace::Type => write!(f, "@"),
        }
    }
}

/// A name: text, namespace, and the location it was written at.
///
/// Two names are equal iff `text` and `space` match -- `loc` is provenance,
/// not identity, and is excluded from `PartialEq`/`Hash` so names can be used
/// as map keys regardless of where they were written.
#[derive(Debug, Clone)]
pub struct Name {
    pub text: String,
    pub space: NameSpace,
    pub loc: Loc,
}

impl Name {
    pub fn new(text: impl Into<String>, space: NameSpace, loc: Loc) -> Self {
        Self {
            text: text.into(),
            space,
            loc,
        }
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.space == other.space
    }
}

impl Eq for Name {}

impl std::hash::Hash for Name {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.text.hash(state);
        self.space.hash(state);
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.text, self.space)
    }
}

/// An ordered sequence of names denoting a module, e.g. `/Core/Stdio/IO%`.
///
/// Equality is componentwise over the `Name` sequence (see `Name::eq`):
/// `loc` never affects whether two module paths name the same module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModulePath {
    pub components: Vec<Name>,
}

impl ModulePath {
    pub fn new(components: Vec<Name>) -> Self {
        Self { components }
    }

    /// Whether `self` is a prefix of `other`, i.e. `self` names a package
    /// that `other` belongs to (spec.md section 4.3.5).
    pub fn is_prefix_of(&self, other: &ModulePath) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }

    /// Join this module path with a directory root to get the `.fble` file
    /// that should define it (spec.md section 4.1 search-path policy).
    pub fn to_relative_file_path(&self) -> std::path::PathBuf {
        let mut path = std::path::PathBuf::new();
        for (i, name) in self.components.iter().enumerate() {
            if i + 1 == self.components.len() {
                path.push(format!("{}.fble", name.text));
            } else {
                path.push(&name.text);
            }
        }
        path
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in &self.components {
            write!(f, "/{}", name.text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn name(text: &str, space: NameSpace) -> Name {
        Name::new(text, space, Loc::new(Rc::from("t.fble"), 1, 1))
    }

    #[test]
    fn name_equality_ignores_loc() {
        let a = Name::new("Foo", NameSpace::Normal, Loc::new(Rc::from("a.fble"), 1, 1));
        let b = Name::new("Foo", NameSpace::Normal, Loc::new(Rc::from("b.fble"), 99, 3));
        assert_eq!(a, b);
    }

    #[test]
    fn name_namespace_distinguishes() {
        let a = name("Foo", NameSpace::Normal);
        let b = name("Foo", NameSpace::Type);
        assert_ne!(a, b);
    }

    #[test]
    fn module_path_prefix() {
        let pkg = ModulePath::new(vec![name("Core", NameSpace::Normal)]);
        let module = ModulePath::new(vec![
            name("Core", NameSpace::Normal),
            name("Stdio", NameSpace::Normal),
        ]);
        assert!(pkg.is_prefix_of(&module));
        assert!(!module.is_prefix_of(&pkg));
    }

    #[test]
    fn module_path_display() {
        let path = ModulePath::new(vec![
            name("Core", NameSpace::Normal),
            name("Stdio%", NameSpace::Normal),
        ]);
        assert_eq!(path.to_string(), "/Core/Stdio%");
    }

    #[test]
    fn module_path_to_file_path() {
        let path = ModulePath::new(vec![
            name("Core", NameSpace::Normal),
            name("Stdio%", NameSpace::Normal),
        ]);
        assert_eq!(
            path.to_relative_file_path(),
            std::path::PathBuf::from("Core/Stdio%.fble")
        );
    }
}
