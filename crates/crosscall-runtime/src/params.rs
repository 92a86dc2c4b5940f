//! Typed, shaped parameter views and the named sets passed into calls.
//!
//! A [`Parameter`] couples an argument descriptor with a non-owning
//! [`BufferView`] over host memory; a [`ParameterSet`] maps argument names to
//! parameters. Cloning a set duplicates the mapping but reuses the views, so
//! each chunked-execution slice can override exactly one entry without
//! touching the underlying buffers.

use std::collections::HashMap;

use crosscall_types::{BufferView, FfiArgument, FfiScalar, FfiType};

/// One named, typed, shaped argument view. The buffer is owned by the host
/// caller (or, for chunk slices, by the parent parameter); the parameter
/// never outlives it.
#[derive(Debug, Clone)]
pub struct Parameter<'a> {
    pub(crate) descriptor: FfiArgument,
    pub(crate) view: BufferView<'a>,
}

impl<'a> Parameter<'a> {
    /// Build a parameter, checking that the view's tag matches the
    /// descriptor's and that its length matches the shape product (an empty
    /// shape requires exactly one element).
    pub fn new(descriptor: FfiArgument, view: BufferView<'a>) -> Result<Self, String> {
        if view.tag() != descriptor.ty {
            return Err(format!(
                "parameter '{}' declares {} but view holds {}",
                descriptor.name,
                descriptor.ty,
                view.tag()
            ));
        }
        let expected: usize = descriptor.shape.iter().product();
        if view.len() != expected {
            return Err(format!(
                "parameter '{}' data length {} doesn't match shape {:?} ({} elements)",
                descriptor.name,
                view.len(),
                descriptor.shape,
                expected
            ));
        }
        Ok(Parameter { descriptor, view })
    }

    /// Scalar parameter wrapping a single element.
    pub fn scalar<C: FfiScalar>(name: impl Into<String>, value: &'a [C; 1]) -> Self {
        Parameter {
            descriptor: FfiArgument::scalar(name, C::TYPE),
            view: C::as_view(value.as_slice()),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &FfiArgument {
        &self.descriptor
    }

    pub fn ty(&self) -> FfiType {
        self.descriptor.ty
    }

    pub fn shape(&self) -> &[usize] {
        &self.descriptor.shape
    }

    pub fn view(&self) -> BufferView<'a> {
        self.view
    }

    /// Typed access to the full buffer. The returned slice carries the
    /// buffer's lifetime, not the parameter's.
    pub fn values<C: FfiScalar>(&self) -> Result<&'a [C], String> {
        C::from_view(self.view).ok_or_else(|| {
            format!(
                "parameter '{}' holds {}, not {}",
                self.descriptor.name,
                self.descriptor.ty,
                C::TYPE
            )
        })
    }

    /// Typed access to a single-element parameter.
    pub fn value<C: FfiScalar>(&self) -> Result<C, String> {
        let values = self.values::<C>()?;
        if values.len() != 1 {
            return Err(format!(
                "parameter '{}' has {} elements, expected a scalar",
                self.descriptor.name,
                values.len()
            ));
        }
        Ok(values[0])
    }

    /// Raw byte access to an opaque buffer parameter.
    pub fn bytes(&self) -> Result<&'a [u8], String> {
        match self.view {
            BufferView::Opaque(bytes) => Ok(bytes),
            _ => Err(format!(
                "parameter '{}' holds {}, not buffer",
                self.descriptor.name, self.descriptor.ty
            )),
        }
    }
}

/// Named collection of parameters with unique keys. Insertion order is
/// irrelevant; lookup is by name.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet<'a> {
    entries: HashMap<String, Parameter<'a>>,
}

impl<'a> ParameterSet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, replacing any previous entry under the same name.
    pub fn insert(&mut self, param: Parameter<'a>) -> Option<Parameter<'a>> {
        self.entries.insert(param.name().to_string(), param)
    }

    pub fn get(&self, name: &str) -> Option<&Parameter<'a>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Typed access to the named parameter's full buffer.
    pub fn values<C: FfiScalar>(&self, name: &str) -> Result<&'a [C], String> {
        self.get(name)
            .ok_or_else(|| format!("unknown parameter '{name}'"))?
            .values::<C>()
    }

    /// Typed access to the named single-element parameter.
    pub fn scalar<C: FfiScalar>(&self, name: &str) -> Result<C, String> {
        self.get(name)
            .ok_or_else(|| format!("unknown parameter '{name}'"))?
            .value::<C>()
    }

    /// Raw byte access to the named opaque buffer parameter.
    pub fn bytes(&self, name: &str) -> Result<&'a [u8], String> {
        self.get(name)
            .ok_or_else(|| format!("unknown parameter '{name}'"))?
            .bytes()
    }
}
