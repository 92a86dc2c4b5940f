//! A module: an ordered collection of method records plus the registration
//! and call surface the host embedding layer consumes.

use std::any::Any;

use crosscall_types::{
    CompoundType, CompoundValue, FfiArgument, FfiError, FfiReturn, FfiScalar, FfiType, HostValue,
    ReturnType,
};

use crate::dispatch;
use crate::method::{MethodFn, MethodRecord, MethodSignature};
use crate::params::ParameterSet;
use crate::threading::{self, ExecStrategy};

/// Owns every method registered under one name-spaced unit. Registration
/// happens through `&mut self` during single-threaded module construction;
/// all records drop together when the module is torn down.
#[derive(Debug)]
pub struct Module {
    name: String,
    doc: String,
    methods: Vec<MethodRecord>,
}

impl Module {
    pub fn new(name: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: doc.into(),
            methods: Vec::new(),
        }
    }

    /// Build and populate a module in one step through a loader function.
    pub fn load(
        name: impl Into<String>,
        doc: impl Into<String>,
        loader: fn(&mut Module) -> Result<(), FfiError>,
    ) -> Result<Self, FfiError> {
        let mut module = Module::new(name, doc);
        loader(&mut module)?;
        Ok(module)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    /// Register a method whose return tag is inferred from `T`.
    pub fn add<T: FfiReturn>(
        &mut self,
        name: impl Into<String>,
        args: Vec<FfiArgument>,
        func: MethodFn<T>,
    ) -> Result<(), FfiError> {
        self.register(
            MethodSignature {
                name: name.into(),
                args,
                return_type: ReturnType::Primitive(T::TYPE),
                vectorized: false,
            },
            Box::new(func),
        )
    }

    /// Register with an explicitly declared return tag, checked against the
    /// callable's compiled return type.
    pub fn add_with_tag<T: FfiReturn>(
        &mut self,
        name: impl Into<String>,
        args: Vec<FfiArgument>,
        tag: FfiType,
        func: MethodFn<T>,
    ) -> Result<(), FfiError> {
        let name = name.into();
        if tag != T::TYPE {
            return Err(FfiError::TypeMismatch {
                method: name,
                expected: tag.to_string(),
                found: T::TYPE.to_string(),
            });
        }
        self.register(
            MethodSignature {
                name,
                args,
                return_type: ReturnType::Primitive(tag),
                vectorized: false,
            },
            Box::new(func),
        )
    }

    /// Register a vectorized method: the callable returns an ordered sequence
    /// whose elements carry the declared tag.
    pub fn add_vectorized<T: FfiReturn>(
        &mut self,
        name: impl Into<String>,
        args: Vec<FfiArgument>,
        func: MethodFn<Vec<T>>,
    ) -> Result<(), FfiError> {
        self.register(
            MethodSignature {
                name: name.into(),
                args,
                return_type: ReturnType::Primitive(T::TYPE),
                vectorized: true,
            },
            Box::new(func),
        )
    }

    pub fn add_vectorized_with_tag<T: FfiReturn>(
        &mut self,
        name: impl Into<String>,
        args: Vec<FfiArgument>,
        tag: FfiType,
        func: MethodFn<Vec<T>>,
    ) -> Result<(), FfiError> {
        let name = name.into();
        if tag != T::TYPE {
            return Err(FfiError::TypeMismatch {
                method: name,
                expected: tag.to_string(),
                found: T::TYPE.to_string(),
            });
        }
        self.register(
            MethodSignature {
                name,
                args,
                return_type: ReturnType::Primitive(tag),
                vectorized: true,
            },
            Box::new(func),
        )
    }

    /// Register a method returning a structured record described by `ty`.
    pub fn add_compound(
        &mut self,
        name: impl Into<String>,
        args: Vec<FfiArgument>,
        ty: CompoundType,
        func: MethodFn<CompoundValue>,
    ) -> Result<(), FfiError> {
        self.register(
            MethodSignature {
                name: name.into(),
                args,
                return_type: ReturnType::Compound(ty),
                vectorized: false,
            },
            Box::new(func),
        )
    }

    pub fn add_compound_vectorized(
        &mut self,
        name: impl Into<String>,
        args: Vec<FfiArgument>,
        ty: CompoundType,
        func: MethodFn<Vec<CompoundValue>>,
    ) -> Result<(), FfiError> {
        self.register(
            MethodSignature {
                name: name.into(),
                args,
                return_type: ReturnType::Compound(ty),
                vectorized: true,
            },
            Box::new(func),
        )
    }

    fn register(
        &mut self,
        signature: MethodSignature,
        callable: Box<dyn Any + Send + Sync>,
    ) -> Result<(), FfiError> {
        if self
            .methods
            .iter()
            .any(|record| record.signature().name == signature.name)
        {
            return Err(FfiError::DuplicateMethod {
                module: self.name.clone(),
                method: signature.name,
            });
        }
        // Arguments carry primitive tags only; structured data enters as
        // tagged buffers and comes back out as compound returns.
        if let Some(arg) = signature
            .args
            .iter()
            .find(|arg| arg.ty == FfiType::Compound)
        {
            return Err(FfiError::TypeMismatch {
                method: signature.name.clone(),
                expected: format!("a primitive tag for argument `{}`", arg.name),
                found: FfiType::Compound.to_string(),
            });
        }
        log::debug!(
            "module `{}`: registered `{}` returning {}{}",
            self.name,
            signature.name,
            signature.return_type.tag(),
            if signature.vectorized {
                " (vectorized)"
            } else {
                ""
            }
        );
        self.methods.push(MethodRecord::new(signature, callable));
        Ok(())
    }

    /// Find a registered method by name; linear scan in registration order.
    pub fn lookup(&self, name: &str) -> Result<&MethodRecord, FfiError> {
        self.methods
            .iter()
            .find(|record| record.signature().name == name)
            .ok_or_else(|| FfiError::MethodNotFound {
                module: self.name.clone(),
                method: name.to_string(),
            })
    }

    /// Typed resolution: the stored callable re-associated with `T`.
    pub fn resolve<T: FfiReturn>(&self, name: &str) -> Result<MethodFn<T>, FfiError> {
        self.lookup(name)?.resolve::<T>()
    }

    pub fn resolve_vectorized<T: FfiReturn>(
        &self,
        name: &str,
    ) -> Result<MethodFn<Vec<T>>, FfiError> {
        self.lookup(name)?.resolve_vectorized::<T>()
    }

    /// Declared signatures of every method, in registration order.
    pub fn signature(&self) -> Vec<MethodSignature> {
        self.methods
            .iter()
            .map(|record| record.signature().clone())
            .collect()
    }

    /// Invoke a method and hand back its native return value.
    pub fn call_typed<T: FfiReturn>(
        &self,
        name: &str,
        params: &ParameterSet<'_>,
    ) -> Result<T, FfiError> {
        let func = self.resolve::<T>(name)?;
        func(params).map_err(|message| FfiError::CallableFailure {
            method: name.to_string(),
            message,
        })
    }

    /// Invoke a method once per slice of `var`'s leading axis, returning the
    /// native per-slice results in slice order.
    pub fn call_typed_chunked<'a, T: FfiReturn, C: FfiScalar>(
        &self,
        name: &str,
        params: &ParameterSet<'a>,
        var: &str,
        strategy: ExecStrategy,
    ) -> Result<Vec<T>, FfiError> {
        let func = self.resolve::<T>(name)?;
        threading::call_chunked::<T, C>(name, func, params, var, strategy)
    }

    /// Tag-driven host entry point: dispatch on the method's declared return
    /// tag and convert the result into a host value.
    pub fn call(&self, name: &str, params: &ParameterSet<'_>) -> Result<HostValue, FfiError> {
        dispatch::call(self, name, params)
    }

    /// Tag-driven chunked entry point: split `var` along its leading axis and
    /// run one call per slice under the named strategy.
    pub fn call_threaded(
        &self,
        name: &str,
        params: &ParameterSet<'_>,
        var: &str,
        strategy_name: &str,
    ) -> Result<HostValue, FfiError> {
        dispatch::call_threaded(self, name, params, var, strategy_name)
    }
}
