//! CrossCall runtime: typed call dispatch and chunked parallel execution.
//!
//! Native functions are registered once on a [`Module`] with tagged
//! signatures, then invoked from a dynamically-typed host through a single
//! narrow boundary: the dispatcher maps the method's runtime return tag to
//! the matching compile-time specialization, invokes the resolved callable,
//! and converts the result back into a host value. `call_threaded` re-invokes
//! one method across the leading dimension of an array parameter under a
//! thread-pool, work-stealing, or sequential strategy.
//!
//! ```
//! use crosscall_runtime::{ExecStrategy, Module, Parameter, ParameterSet};
//! use crosscall_types::{FfiArgument, FfiType, HostValue};
//!
//! fn square(params: &ParameterSet<'_>) -> Result<f64, String> {
//!     let x: f64 = params.scalar("x")?;
//!     Ok(x * x)
//! }
//!
//! let mut module = Module::new("demo", "example module");
//! module
//!     .add("square", vec![FfiArgument::scalar("x", FfiType::Float64)], square)
//!     .unwrap();
//!
//! let x = [3.0f64];
//! let mut params = ParameterSet::new();
//! params.insert(Parameter::scalar("x", &x));
//! assert_eq!(module.call("square", &params).unwrap(), HostValue::Float64(9.0));
//! ```

pub mod dispatch;
pub mod handle;
pub mod method;
pub mod module;
pub mod params;
pub mod threading;

pub use handle::{export_module, module_from_handle, release_module, ModuleHandle};
pub use method::{MethodFn, MethodRecord, MethodSignature};
pub use module::Module;
pub use params::{Parameter, ParameterSet};
pub use threading::ExecStrategy;

pub use crosscall_types::{
    ArrayData, BufferView, CompoundField, CompoundType, CompoundValue, FfiArgument, FfiError,
    FfiReturn, FfiScalar, FfiType, HostArray, HostValue, OpaqueBuffer, ReturnType,
};
