/// Where a resolved variable reference lives at runtime (spec.md section 3.4).
///
/// This is the Checker's final word on name resolution: by the time a `Tc`
/// tree exists, every `Var` has been rewritten to a `VarIndex` and no name
/// lookup is ever needed again downstream (Lowerer, Interpreter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarIndex {
    pub source: VarSource,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarSource {
    /// Captured from an enclosing scope into this function's statics.
    Static,
    /// Bound locally (function argument, let binding, or a compiler temp).
    Local,
}

impl VarIndex {
    pub fn local(index: u32) -> Self {
        Self {
            source: VarSource::Local,
            index,
        }
    }

    pub fn static_(index: u32) -> Self {
        Self {
            source: VarSource::Static,
            index,
        }
    }
}
