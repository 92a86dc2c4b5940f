//! Method signatures and the type-erased record behind each registered name.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use crosscall_types::{FfiArgument, FfiError, FfiReturn, ReturnType};

use crate::params::ParameterSet;

/// A registered native callable: a plain function pointer from a parameter
/// set to a typed result.
///
/// All parameters except a chunked call's designated threaded one must be
/// treated as read-only for the duration of a batch; a callable that writes
/// outside its assigned slice breaks the executor's non-aliasing contract.
pub type MethodFn<T> = fn(&ParameterSet<'_>) -> Result<T, String>;

/// Declared metadata for one registered method, reported verbatim by
/// `Module::signature` in registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    pub args: Vec<FfiArgument>,
    pub return_type: ReturnType,
    /// When set, the callable returns an ordered sequence and the declared
    /// return type describes its elements.
    pub vectorized: bool,
}

/// Signature plus the type-erased handle to the concrete callable.
///
/// Records are created during single-threaded module construction, never
/// mutated, and dropped together with their owning module.
pub struct MethodRecord {
    signature: MethodSignature,
    callable: Box<dyn Any + Send + Sync>,
}

impl fmt::Debug for MethodRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRecord")
            .field("signature", &self.signature)
            .finish()
    }
}

impl MethodRecord {
    pub(crate) fn new(signature: MethodSignature, callable: Box<dyn Any + Send + Sync>) -> Self {
        Self {
            signature,
            callable,
        }
    }

    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// Re-associate the stored callable with the compile-time type `T`.
    ///
    /// This is the single erased-downcast boundary in the system; the tag and
    /// vectorized-flag comparison is the gate in front of it, so a caller
    /// asking for the wrong type gets `TypeMismatch`, never a bad cast.
    pub fn resolve<T: FfiReturn>(&self) -> Result<MethodFn<T>, FfiError> {
        if self.signature.vectorized {
            return Err(FfiError::TypeMismatch {
                method: self.signature.name.clone(),
                expected: format!("vectorized {}", self.signature.return_type.tag()),
                found: format!("scalar {}", T::TYPE),
            });
        }
        if self.signature.return_type.tag() != T::TYPE {
            return Err(FfiError::TypeMismatch {
                method: self.signature.name.clone(),
                expected: self.signature.return_type.tag().to_string(),
                found: T::TYPE.to_string(),
            });
        }
        self.downcast::<MethodFn<T>>()
    }

    /// Vectorized counterpart of [`resolve`](Self::resolve): yields the
    /// `Vec<T>`-returning callable of a method registered as vectorized.
    pub fn resolve_vectorized<T: FfiReturn>(&self) -> Result<MethodFn<Vec<T>>, FfiError> {
        if !self.signature.vectorized {
            return Err(FfiError::TypeMismatch {
                method: self.signature.name.clone(),
                expected: format!("scalar {}", self.signature.return_type.tag()),
                found: format!("vectorized {}", T::TYPE),
            });
        }
        if self.signature.return_type.tag() != T::TYPE {
            return Err(FfiError::TypeMismatch {
                method: self.signature.name.clone(),
                expected: self.signature.return_type.tag().to_string(),
                found: T::TYPE.to_string(),
            });
        }
        self.downcast::<MethodFn<Vec<T>>>()
    }

    fn downcast<F: Copy + 'static>(&self) -> Result<F, FfiError> {
        self.callable
            .downcast_ref::<F>()
            .copied()
            .ok_or_else(|| FfiError::TypeMismatch {
                method: self.signature.name.clone(),
                expected: self.signature.return_type.tag().to_string(),
                found: "a callable of a different compiled type".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosscall_types::FfiType;

    fn one(_: &ParameterSet<'_>) -> Result<f64, String> {
        Ok(1.0)
    }

    fn ones(_: &ParameterSet<'_>) -> Result<Vec<f64>, String> {
        Ok(vec![1.0, 1.0])
    }

    fn record(signature: MethodSignature, callable: Box<dyn Any + Send + Sync>) -> MethodRecord {
        MethodRecord::new(signature, callable)
    }

    fn scalar_signature() -> MethodSignature {
        MethodSignature {
            name: "one".to_string(),
            args: vec![],
            return_type: ReturnType::Primitive(FfiType::Float64),
            vectorized: false,
        }
    }

    #[test]
    fn resolve_matches_declared_tag() {
        let rec = record(scalar_signature(), Box::new(one as MethodFn<f64>));
        let func = rec.resolve::<f64>().unwrap();
        assert_eq!(func(&ParameterSet::new()).unwrap(), 1.0);
    }

    #[test]
    fn resolve_rejects_wrong_tag() {
        let rec = record(scalar_signature(), Box::new(one as MethodFn<f64>));
        let err = rec.resolve::<i32>().unwrap_err();
        assert_eq!(
            err,
            FfiError::TypeMismatch {
                method: "one".to_string(),
                expected: "float64".to_string(),
                found: "int32".to_string(),
            }
        );
    }

    #[test]
    fn resolve_rejects_vectorized_flag_mismatch() {
        let mut signature = scalar_signature();
        signature.vectorized = true;
        let rec = record(signature, Box::new(ones as MethodFn<Vec<f64>>));
        assert!(matches!(
            rec.resolve::<f64>(),
            Err(FfiError::TypeMismatch { .. })
        ));
        assert!(rec.resolve_vectorized::<f64>().is_ok());
    }
}
