//! The tag-driven call dispatcher: the single narrow point where a runtime
//! type tag is matched to its compile-time specialization.
//!
//! Dispatch walks a fixed ordered table with one entry per supported tag,
//! each holding a monomorphized thunk. The table must stay total over
//! [`FfiType::ALL`]; a tag missing from it is a registration bug surfaced as
//! `UnhandledTypeTag`, never a silent fallthrough.

use crosscall_types::{CompoundValue, FfiError, FfiReturn, FfiScalar, FfiType, HostValue, OpaqueBuffer};

use crate::module::Module;
use crate::params::ParameterSet;
use crate::threading::ExecStrategy;

type CallThunk = fn(&Module, &str, &ParameterSet<'_>) -> Result<HostValue, FfiError>;

type ThreadedThunk =
    fn(&Module, &str, &ParameterSet<'_>, &str, FfiType, ExecStrategy) -> Result<HostValue, FfiError>;

/// One entry per supported return tag, in tag order.
const RETURN_DISPATCH: &[(FfiType, CallThunk)] = &[
    (FfiType::Bool, call_returning::<bool>),
    (FfiType::Int8, call_returning::<i8>),
    (FfiType::Int16, call_returning::<i16>),
    (FfiType::Int32, call_returning::<i32>),
    (FfiType::Int64, call_returning::<i64>),
    (FfiType::UInt8, call_returning::<u8>),
    (FfiType::UInt16, call_returning::<u16>),
    (FfiType::UInt32, call_returning::<u32>),
    (FfiType::UInt64, call_returning::<u64>),
    (FfiType::Float32, call_returning::<f32>),
    (FfiType::Float64, call_returning::<f64>),
    (FfiType::Buffer, call_returning::<OpaqueBuffer>),
    (FfiType::Compound, call_returning::<CompoundValue>),
];

const THREADED_DISPATCH: &[(FfiType, ThreadedThunk)] = &[
    (FfiType::Bool, call_threaded_returning::<bool>),
    (FfiType::Int8, call_threaded_returning::<i8>),
    (FfiType::Int16, call_threaded_returning::<i16>),
    (FfiType::Int32, call_threaded_returning::<i32>),
    (FfiType::Int64, call_threaded_returning::<i64>),
    (FfiType::UInt8, call_threaded_returning::<u8>),
    (FfiType::UInt16, call_threaded_returning::<u16>),
    (FfiType::UInt32, call_threaded_returning::<u32>),
    (FfiType::UInt64, call_threaded_returning::<u64>),
    (FfiType::Float32, call_threaded_returning::<f32>),
    (FfiType::Float64, call_threaded_returning::<f64>),
    (FfiType::Buffer, call_threaded_returning::<OpaqueBuffer>),
    (FfiType::Compound, call_threaded_returning::<CompoundValue>),
];

/// Invoke `name` and convert its result into a host value, dispatching on
/// the method's declared return tag.
pub fn call(
    module: &Module,
    name: &str,
    params: &ParameterSet<'_>,
) -> Result<HostValue, FfiError> {
    let record = module.lookup(name)?;
    let tag = record.signature().return_type.tag();
    for (entry, thunk) in RETURN_DISPATCH {
        if *entry == tag {
            log::trace!("dispatching `{name}` with return tag {tag}");
            return thunk(module, name, params);
        }
    }
    Err(FfiError::UnhandledTypeTag {
        method: name.to_string(),
        tag,
    })
}

/// Chunked entry point: resolve the return tag, then the element tag of the
/// parameter being split, and drive one call per leading-axis slice.
pub fn call_threaded(
    module: &Module,
    name: &str,
    params: &ParameterSet<'_>,
    var: &str,
    strategy_name: &str,
) -> Result<HostValue, FfiError> {
    let record = module.lookup(name)?;
    let strategy = ExecStrategy::parse(strategy_name)?;
    let element = params
        .get(var)
        .ok_or_else(|| FfiError::UnknownParameter {
            method: name.to_string(),
            name: var.to_string(),
        })?
        .ty();
    let tag = record.signature().return_type.tag();
    for (entry, thunk) in THREADED_DISPATCH {
        if *entry == tag {
            log::trace!(
                "dispatching chunked `{name}` with return tag {tag}, element tag {element}, strategy {}",
                strategy.name()
            );
            return thunk(module, name, params, var, element, strategy);
        }
    }
    Err(FfiError::UnhandledTypeTag {
        method: name.to_string(),
        tag,
    })
}

fn call_returning<T: FfiReturn>(
    module: &Module,
    name: &str,
    params: &ParameterSet<'_>,
) -> Result<HostValue, FfiError> {
    let record = module.lookup(name)?;
    if record.signature().vectorized {
        let func = record.resolve_vectorized::<T>()?;
        let values = func(params).map_err(|message| FfiError::CallableFailure {
            method: name.to_string(),
            message,
        })?;
        Ok(T::seq_into_host(values))
    } else {
        let func = record.resolve::<T>()?;
        let value = func(params).map_err(|message| FfiError::CallableFailure {
            method: name.to_string(),
            message,
        })?;
        Ok(value.into_host())
    }
}

fn call_threaded_returning<T: FfiReturn>(
    module: &Module,
    name: &str,
    params: &ParameterSet<'_>,
    var: &str,
    element: FfiType,
    strategy: ExecStrategy,
) -> Result<HostValue, FfiError> {
    match element {
        FfiType::Bool => chunk_and_collect::<T, bool>(module, name, params, var, strategy),
        FfiType::Int8 => chunk_and_collect::<T, i8>(module, name, params, var, strategy),
        FfiType::Int16 => chunk_and_collect::<T, i16>(module, name, params, var, strategy),
        FfiType::Int32 => chunk_and_collect::<T, i32>(module, name, params, var, strategy),
        FfiType::Int64 => chunk_and_collect::<T, i64>(module, name, params, var, strategy),
        FfiType::UInt8 => chunk_and_collect::<T, u8>(module, name, params, var, strategy),
        FfiType::UInt16 => chunk_and_collect::<T, u16>(module, name, params, var, strategy),
        FfiType::UInt32 => chunk_and_collect::<T, u32>(module, name, params, var, strategy),
        FfiType::UInt64 => chunk_and_collect::<T, u64>(module, name, params, var, strategy),
        FfiType::Float32 => chunk_and_collect::<T, f32>(module, name, params, var, strategy),
        FfiType::Float64 => chunk_and_collect::<T, f64>(module, name, params, var, strategy),
        // Only scalar element types can be split along a leading axis.
        FfiType::Buffer | FfiType::Compound => Err(FfiError::UnhandledTypeTag {
            method: name.to_string(),
            tag: element,
        }),
    }
}

fn chunk_and_collect<T: FfiReturn, C: FfiScalar>(
    module: &Module,
    name: &str,
    params: &ParameterSet<'_>,
    var: &str,
    strategy: ExecStrategy,
) -> Result<HostValue, FfiError> {
    let values = module.call_typed_chunked::<T, C>(name, params, var, strategy)?;
    Ok(T::seq_into_host(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_tables_are_total_over_supported_tags() {
        for tag in FfiType::ALL {
            assert_eq!(
                RETURN_DISPATCH.iter().filter(|(entry, _)| *entry == tag).count(),
                1,
                "return dispatch must list {tag} exactly once"
            );
            assert_eq!(
                THREADED_DISPATCH.iter().filter(|(entry, _)| *entry == tag).count(),
                1,
                "threaded dispatch must list {tag} exactly once"
            );
        }
        assert_eq!(RETURN_DISPATCH.len(), FfiType::ALL.len());
        assert_eq!(THREADED_DISPATCH.len(), FfiType::ALL.len());
    }
}
