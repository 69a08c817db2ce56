use std::{fmt, slice};

use crate::{Error, Result, TypeList, TypeSpec, Value, ValueType};

/// An arity-tagged collection of [`Value`]s: the arguments of a call, or the
/// values a callable returns.
///
/// The engine only ever stores and transports `Values`. Typed views are
/// provided through [`IntoValues`] and [`FromValues`], both implemented for
/// tuples of up to eight elements.
///
/// # Example
///
/// ```rust
/// use callrelay::{IntoValues, Values};
///
/// let values = (String::from("hello"), None::<String>).into_values();
/// assert_eq!(values.len(), 2);
///
/// let (text, err): (String, Option<String>) = values.typed().unwrap();
/// assert_eq!(text, "hello");
/// assert!(err.is_none());
/// ```
#[derive(Clone, Default, PartialEq)]
pub struct Values(Vec<Value>);

impl Values {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// The zero-arity collection.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn get(&self, position: usize) -> Option<&Value> {
        self.0.get(position)
    }

    pub fn iter(&self) -> slice::Iter<'_, Value> {
        self.0.iter()
    }

    /// Type of each carried value, in order.
    pub fn types(&self) -> Vec<TypeSpec> {
        self.0.iter().map(Value::type_spec).collect()
    }

    /// Clone out the value at `position` as a `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongValueCount`] if there is no such position and
    /// [`Error::WrongValueType`] if the value is not a `T`.
    pub fn arg<T: ValueType + Clone>(&self, position: usize) -> Result<T> {
        let value = self.get(position).ok_or(Error::WrongValueCount {
            expected: position + 1,
            actual: self.len(),
        })?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| Error::WrongValueType {
                position,
                expected: TypeSpec::of::<T>().short_name(),
                actual: value.type_name(),
            })
    }

    /// View the whole collection as a typed tuple.
    pub fn typed<T: FromValues>(&self) -> Result<T> {
        T::from_values(self)
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }
}

impl fmt::Debug for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            fmt::Debug::fmt(value, f)?;
        }
        f.write_str(")")
    }
}

impl From<Vec<Value>> for Values {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl FromIterator<Value> for Values {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Values {
    type Item = &'a Value;
    type IntoIter = slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Conversion into an untyped [`Values`] collection.
pub trait IntoValues {
    fn into_values(self) -> Values;
}

/// Typed view over an untyped [`Values`] collection.
pub trait FromValues: Sized {
    fn from_values(values: &Values) -> Result<Self>;
}

impl IntoValues for Values {
    fn into_values(self) -> Values {
        self
    }
}

impl IntoValues for Vec<Value> {
    fn into_values(self) -> Values {
        Values(self)
    }
}

impl IntoValues for Value {
    fn into_values(self) -> Values {
        Values(vec![self])
    }
}

impl FromValues for Values {
    fn from_values(values: &Values) -> Result<Self> {
        Ok(values.clone())
    }
}

macro_rules! tuple_values {
    ($($name:ident $idx:tt),*) => {
        impl<$($name: ValueType),*> TypeList for ($($name,)*) {
            fn type_specs() -> Vec<TypeSpec> {
                vec![$(TypeSpec::of::<$name>()),*]
            }
        }

        impl<$($name: ValueType),*> IntoValues for ($($name,)*) {
            #[allow(unused_variables)]
            fn into_values(self) -> Values {
                Values(vec![$(Value::new(self.$idx)),*])
            }
        }

        impl<$($name: ValueType + Clone),*> FromValues for ($($name,)*) {
            fn from_values(values: &Values) -> Result<Self> {
                let expected = <Self as TypeList>::type_specs().len();
                if values.len() != expected {
                    return Err(Error::WrongValueCount {
                        expected,
                        actual: values.len(),
                    });
                }
                Ok(($(values.arg::<$name>($idx)?,)*))
            }
        }
    };
}

tuple_values!();
tuple_values!(A 0);
tuple_values!(A 0, B 1);
tuple_values!(A 0, B 1, C 2);
tuple_values!(A 0, B 1, C 2, D 3);
tuple_values!(A 0, B 1, C 2, D 3, E 4);
tuple_values!(A 0, B 1, C 2, D 3, E 4, F 5);
tuple_values!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
tuple_values!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);
