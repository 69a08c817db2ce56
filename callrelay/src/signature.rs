use std::{fmt, sync::Arc};

use crate::{CallableId, Error, Result, TypeList, TypeSpec, Values};

/// Expected parameter and return types of a dependency or target.
///
/// Attached when a [`Dependency`](crate::Dependency) or
/// [`Target`](crate::Target) is described and used only for validation:
/// arguments are checked when a call is made, returns when a response is
/// injected or a target finishes.
///
/// ```rust
/// use callrelay::Signature;
///
/// // fn get(id: String) -> (String, Option<String>)
/// let sig = Signature::of::<(String,), (String, Option<String>)>();
/// assert_eq!(sig.to_string(), "fn(String) -> (String, Option<String>)");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    params: Arc<[TypeSpec]>,
    returns: Arc<[TypeSpec]>,
}

impl Signature {
    pub fn new(params: Vec<TypeSpec>, returns: Vec<TypeSpec>) -> Self {
        Self {
            params: params.into(),
            returns: returns.into(),
        }
    }

    /// Signature from tuple type lists: `P` for parameters, `R` for returns.
    pub fn of<P: TypeList, R: TypeList>() -> Self {
        Self::new(P::type_specs(), R::type_specs())
    }

    #[inline]
    pub fn params(&self) -> &[TypeSpec] {
        &self.params
    }

    #[inline]
    pub fn returns(&self) -> &[TypeSpec] {
        &self.returns
    }

    /// Check call arguments for `target` against the parameter list.
    pub fn check_args(&self, target: &CallableId, args: &Values) -> Result<()> {
        if args.len() != self.params.len() {
            return Err(Error::WrongArgCount {
                target: target.clone(),
                expected: self.params.len(),
                actual: args.len(),
            });
        }
        for (position, (expected, value)) in self.params.iter().zip(args).enumerate() {
            if *expected != value.type_spec() {
                return Err(Error::WrongArgType {
                    target: target.clone(),
                    position,
                    expected: expected.short_name(),
                    actual: value.type_name(),
                });
            }
        }
        Ok(())
    }

    /// Check returned values for `target` against the return list.
    pub fn check_returns(&self, target: &CallableId, values: &Values) -> Result<()> {
        if values.len() != self.returns.len() {
            return Err(Error::WrongReturnCount {
                target: target.clone(),
                expected: self.returns.len(),
                actual: values.len(),
            });
        }
        for (position, (expected, value)) in self.returns.iter().zip(values).enumerate() {
            if *expected != value.type_spec() {
                return Err(Error::WrongReturnType {
                    target: target.clone(),
                    position,
                    expected: expected.short_name(),
                    actual: value.type_name(),
                });
            }
        }
        Ok(())
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, types: &[TypeSpec]) -> fmt::Result {
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{ty}")?;
    }
    Ok(())
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fn(")?;
        write_list(f, &self.params)?;
        f.write_str(")")?;
        match self.returns.len() {
            0 => Ok(()),
            1 => write!(f, " -> {}", self.returns[0]),
            _ => {
                f.write_str(" -> (")?;
                write_list(f, &self.returns)?;
                f.write_str(")")
            }
        }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}
