//! Chunked execution: re-invoke one method per slice along the leading axis
//! of a designated parameter.
//!
//! A parameter of shape `[n, d1, ..., dk]` yields `n` independent calls; call
//! `i` sees a parameter set identical to the original except that the
//! designated entry is replaced by a zero-copy view of the contiguous block
//! `[i * d1*...*dk, (i+1) * d1*...*dk)` with shape `[d1, ..., dk]`. Result
//! slot `i` always holds slice `i`'s value regardless of which strategy ran
//! it. The batch fans out for the duration of one call and fans back in; no
//! work survives past the return.

#[cfg(feature = "threads")]
use std::sync::Mutex;

#[cfg(feature = "threads")]
use crossbeam_utils::thread;

use crosscall_types::{FfiArgument, FfiError, FfiReturn, FfiScalar};

use crate::method::MethodFn;
use crate::params::{Parameter, ParameterSet};

/// Concurrency backend for one chunked batch, selected by case-sensitive
/// name: `"threads"`, `"rayon"`, or `"serial"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStrategy {
    /// Scoped worker threads over contiguous index ranges.
    Threads,
    /// Rayon's work-stealing pool, finer-grained load balancing.
    Rayon,
    /// Index 0..n in order on the calling thread.
    Serial,
}

impl ExecStrategy {
    pub fn parse(name: &str) -> Result<Self, FfiError> {
        match name {
            "threads" => Ok(ExecStrategy::Threads),
            "rayon" => Ok(ExecStrategy::Rayon),
            "serial" => Ok(ExecStrategy::Serial),
            other => Err(FfiError::UnknownExecutionStrategy {
                name: other.to_string(),
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExecStrategy::Threads => "threads",
            ExecStrategy::Rayon => "rayon",
            ExecStrategy::Serial => "serial",
        }
    }
}

/// Everything one slice call needs, shared read-only across workers.
struct ChunkPlan<'p, 'a, T, C> {
    method: &'p str,
    func: MethodFn<T>,
    params: &'p ParameterSet<'a>,
    var: &'p str,
    values: &'a [C],
    block: usize,
    sub_shape: &'p [usize],
}

impl<'p, 'a, T: FfiReturn, C: FfiScalar> ChunkPlan<'p, 'a, T, C> {
    fn run(&self, index: usize) -> Result<T, FfiError> {
        let start = index * self.block;
        let chunk = &self.values[start..start + self.block];
        let mut call_params = self.params.clone();
        call_params.insert(Parameter {
            descriptor: FfiArgument::new(self.var, C::TYPE, self.sub_shape.to_vec()),
            view: C::as_view(chunk),
        });
        (self.func)(&call_params).map_err(|message| FfiError::CallableFailure {
            method: self.method.to_string(),
            message,
        })
    }
}

/// Split `params[var]` along its leading axis and invoke `func` once per
/// slice, collecting results in slice order.
///
/// When concurrent slices fail, whichever error reaches the shared slot first
/// wins; the selection is racy by design and only a single error surfaces.
pub fn call_chunked<'a, T: FfiReturn, C: FfiScalar>(
    method: &str,
    func: MethodFn<T>,
    params: &ParameterSet<'a>,
    var: &str,
    strategy: ExecStrategy,
) -> Result<Vec<T>, FfiError> {
    let param = params.get(var).ok_or_else(|| FfiError::UnknownParameter {
        method: method.to_string(),
        name: var.to_string(),
    })?;
    let shape = param.shape();
    if shape.is_empty() {
        return Err(FfiError::TypeMismatch {
            method: method.to_string(),
            expected: format!("an array-shaped parameter `{var}` to split"),
            found: "scalar shape".to_string(),
        });
    }
    let values = param.values::<C>().map_err(|_| FfiError::TypeMismatch {
        method: method.to_string(),
        expected: C::TYPE.to_string(),
        found: param.ty().to_string(),
    })?;
    let n = shape[0];
    let sub_shape = shape[1..].to_vec();
    let block: usize = sub_shape.iter().product();
    log::debug!(
        "chunked call of `{method}` over `{var}`: {n} slice(s) of {block} element(s), strategy {}",
        strategy.name()
    );
    if n == 0 {
        return Ok(Vec::new());
    }
    let plan = ChunkPlan {
        method,
        func,
        params,
        var,
        values,
        block,
        sub_shape: &sub_shape,
    };
    match strategy {
        ExecStrategy::Serial => call_serial(&plan, n),
        ExecStrategy::Threads => call_threads(&plan, n),
        ExecStrategy::Rayon => call_rayon(&plan, n),
    }
}

fn call_serial<T: FfiReturn, C: FfiScalar>(
    plan: &ChunkPlan<'_, '_, T, C>,
    n: usize,
) -> Result<Vec<T>, FfiError> {
    let mut results = Vec::with_capacity(n);
    for index in 0..n {
        results.push(plan.run(index)?);
    }
    Ok(results)
}

#[cfg(feature = "threads")]
fn call_threads<T: FfiReturn, C: FfiScalar>(
    plan: &ChunkPlan<'_, '_, T, C>,
    n: usize,
) -> Result<Vec<T>, FfiError> {
    let workers = worker_count(n);
    // One contiguous index range per worker; each owns a disjoint window of
    // the result vector, so slot writes are race-free by construction.
    let span = n.div_ceil(workers);
    let mut slots: Vec<Option<T>> = Vec::with_capacity(n);
    slots.resize_with(n, || None);
    let error: Mutex<Option<FfiError>> = Mutex::new(None);
    thread::scope(|scope| {
        for (worker, window) in slots.chunks_mut(span).enumerate() {
            let error = &error;
            let base = worker * span;
            scope.spawn(move |_| {
                for (offset, slot) in window.iter_mut().enumerate() {
                    if error.lock().unwrap().is_some() {
                        return;
                    }
                    match plan.run(base + offset) {
                        Ok(value) => *slot = Some(value),
                        Err(err) => {
                            let mut guard = error.lock().unwrap();
                            if guard.is_none() {
                                *guard = Some(err);
                            }
                            return;
                        }
                    }
                }
            });
        }
    })
    .expect("chunked execution scope");
    if let Some(err) = error.lock().unwrap().take() {
        return Err(err);
    }
    Ok(slots
        .into_iter()
        .map(|slot| slot.expect("missing chunked call result"))
        .collect())
}

#[cfg(not(feature = "threads"))]
fn call_threads<T: FfiReturn, C: FfiScalar>(
    _plan: &ChunkPlan<'_, '_, T, C>,
    _n: usize,
) -> Result<Vec<T>, FfiError> {
    Err(FfiError::StrategyUnavailable {
        name: ExecStrategy::Threads.name().to_string(),
    })
}

#[cfg(feature = "rayon")]
fn call_rayon<T: FfiReturn, C: FfiScalar>(
    plan: &ChunkPlan<'_, '_, T, C>,
    n: usize,
) -> Result<Vec<T>, FfiError> {
    use rayon::prelude::*;

    (0..n).into_par_iter().map(|index| plan.run(index)).collect()
}

#[cfg(not(feature = "rayon"))]
fn call_rayon<T: FfiReturn, C: FfiScalar>(
    _plan: &ChunkPlan<'_, '_, T, C>,
    _n: usize,
) -> Result<Vec<T>, FfiError> {
    Err(FfiError::StrategyUnavailable {
        name: ExecStrategy::Rayon.name().to_string(),
    })
}

#[cfg(feature = "threads")]
fn worker_count(n: usize) -> usize {
    let available = std::env::var("CROSSCALL_THREADS")
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .filter(|&count| count > 0)
        .unwrap_or_else(num_cpus::get);
    available.min(n).max(1)
}
