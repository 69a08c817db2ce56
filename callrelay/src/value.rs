use std::{
    any::{Any, type_name},
    fmt,
    ops::Deref,
    sync::Arc,
};

use crate::TypeSpec;

/// Types that can travel through the relay as a [`Value`].
///
/// Blanket-implemented for every `'static` type that is thread-safe,
/// printable, and comparable. Types that can't be compared (closures,
/// connection handles) travel wrapped in [`Opaque`].
pub trait ValueType: Any + Send + Sync + fmt::Debug + PartialEq {}

impl<T: Any + Send + Sync + fmt::Debug + PartialEq> ValueType for T {}

type Erased = dyn Any + Send + Sync;
type EqFn = fn(&Erased, &Erased) -> bool;
type FmtFn = fn(&Erased, &mut fmt::Formatter<'_>) -> fmt::Result;

/// One type-tagged argument, return, or panic payload.
///
/// `Value` erases the concrete type but remembers how to compare and print
/// it, so matching and diagnostics work without knowing the type. Cloning
/// is cheap; clones share the payload.
///
/// # Example
///
/// ```rust
/// use callrelay::Value;
///
/// let v = Value::new(String::from("42"));
/// assert_eq!(v, Value::new(String::from("42")));
/// assert_ne!(v, Value::new(42_u32));
/// assert_eq!(v.downcast_ref::<String>().map(String::as_str), Some("42"));
/// ```
#[derive(Clone)]
pub struct Value {
    inner: Arc<Erased>,
    type_spec: TypeSpec,
    eq: EqFn,
    fmt: FmtFn,
}

impl Value {
    pub fn new<T: ValueType>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_spec: TypeSpec::of::<T>(),
            eq: eq_as::<T>,
            fmt: fmt_as::<T>,
        }
    }

    #[inline]
    pub fn type_spec(&self) -> TypeSpec {
        self.type_spec
    }

    /// Short name of the carried type, for diagnostics.
    pub fn type_name(&self) -> String {
        self.type_spec.short_name()
    }

    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Returns true if both values share the same payload allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.type_spec == other.type_spec && (self.eq)(&*self.inner, &*other.inner)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.fmt)(&*self.inner, f)
    }
}

fn eq_as<T: ValueType>(a: &Erased, b: &Erased) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn fmt_as<T: ValueType>(value: &Erased, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value.downcast_ref::<T>() {
        Some(value) => fmt::Debug::fmt(value, f),
        None => f.write_str(type_name::<T>()),
    }
}

/// Wrapper for payloads that can't be compared structurally.
///
/// Equality is identity: two `Opaque`s are equal only when they point at the
/// same allocation. Use it for callables and other values the code under
/// test passes through without inspecting.
///
/// ```rust
/// use std::sync::Arc;
/// use callrelay::Opaque;
///
/// let inc: Arc<dyn Fn(u32) -> u32 + Send + Sync> = Arc::new(|x: u32| x + 1);
/// let f = Opaque::from_arc(inc);
/// assert_eq!(f, f.clone());
/// assert_eq!((f.get())(1), 2);
/// ```
pub struct Opaque<T: ?Sized>(Arc<T>);

impl<T> Opaque<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl<T: ?Sized> Opaque<T> {
    pub fn from_arc(value: Arc<T>) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(&self) -> &T {
        &self.0
    }

    pub fn to_arc(&self) -> Arc<T> {
        self.0.clone()
    }
}

impl<T: ?Sized> Clone for Opaque<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: ?Sized> PartialEq for Opaque<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Eq for Opaque<T> {}

impl<T: ?Sized> Deref for Opaque<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized> fmt::Debug for Opaque<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Opaque<{}>@{:p}",
            crate::type_spec::short_type_name(type_name::<T>()),
            Arc::as_ptr(&self.0)
        )
    }
}
