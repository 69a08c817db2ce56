use crate::{CallableId, Signature, TypeList};

/// Description of something the code under test calls out to.
///
/// Passing a `Dependency` to [`Harness::mimic`](crate::Harness::mimic)
/// produces a [`StandIn`](crate::StandIn) with the same identity and
/// signature.
///
/// ```rust
/// use callrelay::Dependency;
///
/// let get = Dependency::method::<(String,), (String, Option<String>)>("Store", "get");
/// assert_eq!(get.id().as_str(), "Store.get");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    id: CallableId,
    signature: Signature,
}

impl Dependency {
    pub fn new(id: impl Into<CallableId>, signature: Signature) -> Self {
        Self {
            id: id.into(),
            signature,
        }
    }

    /// Named function dependency with parameter types `P` and return types `R`.
    pub fn of<P: TypeList, R: TypeList>(id: impl Into<CallableId>) -> Self {
        Self::new(id, Signature::of::<P, R>())
    }

    /// A method on an interface, identified as `Owner.method`.
    pub fn method<P: TypeList, R: TypeList>(owner: &str, method: &str) -> Self {
        Self::new(CallableId::method(owner, method), Signature::of::<P, R>())
    }

    /// A function value with no name of its own, such as a callback.
    ///
    /// Gets a generated identity (`dependency#N`); match its calls through
    /// the returned stand-in rather than by name.
    pub fn anonymous(signature: Signature) -> Self {
        Self::new(CallableId::anonymous("dependency"), signature)
    }

    #[inline]
    pub fn id(&self) -> &CallableId {
        &self.id
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}
