//! End-to-end registry and dispatch tests: registration, signature
//! reporting, tag-driven calls, and the failure surface.

use crosscall_runtime::{Module, Parameter, ParameterSet};
use crosscall_types::{
    ArrayData, CompoundField, CompoundType, CompoundValue, FfiArgument, FfiError, FfiReturn,
    FfiScalar, FfiType, HostArray, HostValue, OpaqueBuffer, ReturnType,
};

fn square(params: &ParameterSet<'_>) -> Result<f64, String> {
    let x: f64 = params.scalar("x")?;
    Ok(x * x)
}

fn squares(params: &ParameterSet<'_>) -> Result<Vec<f64>, String> {
    let xs = params.values::<f64>("x")?;
    Ok(xs.iter().map(|x| x * x).collect())
}

fn always_fails(_: &ParameterSet<'_>) -> Result<f64, String> {
    Err("deliberate failure".to_string())
}

fn summary(params: &ParameterSet<'_>) -> Result<CompoundValue, String> {
    let xs = params.values::<f64>("x")?;
    let mut record = CompoundValue::new();
    record.push("total", xs.iter().sum::<f64>());
    record.push("count", xs.len() as i64);
    Ok(record)
}

fn summaries(params: &ParameterSet<'_>) -> Result<Vec<CompoundValue>, String> {
    let xs = params.values::<f64>("x")?;
    Ok(xs
        .iter()
        .map(|&x| {
            let mut record = CompoundValue::new();
            record.push("value", x);
            record
        })
        .collect())
}

fn zero<T: FfiReturn + Default>(_: &ParameterSet<'_>) -> Result<T, String> {
    Ok(T::default())
}

fn square_module() -> Module {
    let mut module = Module::new("math", "test module");
    module
        .add(
            "square",
            vec![FfiArgument::scalar("x", FfiType::Float64)],
            square,
        )
        .unwrap();
    module
}

#[test]
fn scalar_call_round_trips() {
    let module = square_module();
    let x = [3.0f64];
    let mut params = ParameterSet::new();
    params.insert(Parameter::scalar("x", &x));
    assert_eq!(
        module.call("square", &params).unwrap(),
        HostValue::Float64(9.0)
    );
}

#[test]
fn unknown_method_is_named_in_the_error() {
    let module = square_module();
    let err = module.call("missing", &ParameterSet::new()).unwrap_err();
    assert_eq!(
        err,
        FfiError::MethodNotFound {
            module: "math".to_string(),
            method: "missing".to_string(),
        }
    );
    assert!(err.to_string().contains("missing"));
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut module = square_module();
    let err = module
        .add(
            "square",
            vec![FfiArgument::scalar("x", FfiType::Float64)],
            square,
        )
        .unwrap_err();
    assert_eq!(
        err,
        FfiError::DuplicateMethod {
            module: "math".to_string(),
            method: "square".to_string(),
        }
    );
}

#[test]
fn declared_tag_must_match_compiled_return_type() {
    let mut module = Module::new("math", "");
    let err = module
        .add_with_tag(
            "square",
            vec![FfiArgument::scalar("x", FfiType::Float64)],
            FfiType::Int32,
            square,
        )
        .unwrap_err();
    assert!(matches!(err, FfiError::TypeMismatch { .. }));
    // The honest tag goes through.
    module
        .add_with_tag(
            "square",
            vec![FfiArgument::scalar("x", FfiType::Float64)],
            FfiType::Float64,
            square,
        )
        .unwrap();
}

#[test]
fn compound_tagged_arguments_are_rejected() {
    let mut module = Module::new("math", "");
    let err = module
        .add(
            "bad",
            vec![FfiArgument::scalar("record", FfiType::Compound)],
            square,
        )
        .unwrap_err();
    assert!(matches!(err, FfiError::TypeMismatch { .. }));
}

#[test]
fn signature_reports_registration_verbatim_in_order() {
    let mut module = square_module();
    module
        .add_vectorized(
            "squares",
            vec![FfiArgument::new("x", FfiType::Float64, vec![3])],
            squares,
        )
        .unwrap();

    let signatures = module.signature();
    assert_eq!(signatures.len(), 2);
    assert_eq!(signatures[0].name, "square");
    assert_eq!(
        signatures[0].args,
        vec![FfiArgument::scalar("x", FfiType::Float64)]
    );
    assert_eq!(
        signatures[0].return_type,
        ReturnType::Primitive(FfiType::Float64)
    );
    assert!(!signatures[0].vectorized);
    assert_eq!(signatures[1].name, "squares");
    assert!(signatures[1].vectorized);

    // Signatures are host-serializable.
    let json = serde_json::to_string(&signatures).unwrap();
    assert!(json.contains("\"square\""));
}

#[test]
fn typed_resolution_is_gated_by_the_return_tag() {
    let module = square_module();
    assert!(module.resolve::<f64>("square").is_ok());
    let err = module.resolve::<i64>("square").unwrap_err();
    assert_eq!(
        err,
        FfiError::TypeMismatch {
            method: "square".to_string(),
            expected: "float64".to_string(),
            found: "int64".to_string(),
        }
    );
}

#[test]
fn every_supported_return_tag_dispatches() {
    let mut module = Module::new("tags", "");
    module.add("ret_bool", vec![], zero::<bool>).unwrap();
    module.add("ret_int8", vec![], zero::<i8>).unwrap();
    module.add("ret_int16", vec![], zero::<i16>).unwrap();
    module.add("ret_int32", vec![], zero::<i32>).unwrap();
    module.add("ret_int64", vec![], zero::<i64>).unwrap();
    module.add("ret_uint8", vec![], zero::<u8>).unwrap();
    module.add("ret_uint16", vec![], zero::<u16>).unwrap();
    module.add("ret_uint32", vec![], zero::<u32>).unwrap();
    module.add("ret_uint64", vec![], zero::<u64>).unwrap();
    module.add("ret_float32", vec![], zero::<f32>).unwrap();
    module.add("ret_float64", vec![], zero::<f64>).unwrap();
    module
        .add("ret_buffer", vec![], zero::<OpaqueBuffer>)
        .unwrap();
    module
        .add_compound(
            "ret_compound",
            vec![],
            CompoundType::new(vec![]),
            zero::<CompoundValue>,
        )
        .unwrap();

    let params = ParameterSet::new();
    for signature in module.signature() {
        let result = module.call(&signature.name, &params);
        assert!(
            result.is_ok(),
            "`{}` should dispatch, got {result:?}",
            signature.name
        );
    }
}

#[test]
fn vectorized_results_become_rank_one_arrays() {
    let mut module = Module::new("math", "");
    module
        .add_vectorized(
            "squares",
            vec![FfiArgument::new("x", FfiType::Float64, vec![3])],
            squares,
        )
        .unwrap();

    let xs = [1.0f64, 2.0, 3.0];
    let mut params = ParameterSet::new();
    params.insert(
        Parameter::new(
            FfiArgument::new("x", FfiType::Float64, vec![3]),
            f64::as_view(&xs),
        )
        .unwrap(),
    );
    let expected = HostValue::Array(
        HostArray::new(ArrayData::Float64(vec![1.0, 4.0, 9.0]), vec![3]).unwrap(),
    );
    assert_eq!(module.call("squares", &params).unwrap(), expected);
}

#[test]
fn compound_returns_become_records_with_declared_field_order() {
    let mut module = Module::new("math", "");
    module
        .add_compound(
            "summary",
            vec![FfiArgument::new("x", FfiType::Float64, vec![4])],
            CompoundType::new(vec![
                CompoundField::new("total", FfiType::Float64, vec![]),
                CompoundField::new("count", FfiType::Int64, vec![]),
            ]),
            summary,
        )
        .unwrap();

    let xs = [1.0f64, 2.0, 3.0, 4.0];
    let mut params = ParameterSet::new();
    params.insert(
        Parameter::new(
            FfiArgument::new("x", FfiType::Float64, vec![4]),
            f64::as_view(&xs),
        )
        .unwrap(),
    );
    match module.call("summary", &params).unwrap() {
        HostValue::Record(record) => {
            assert_eq!(record.fields[0].0, "total");
            assert_eq!(record.fields[1].0, "count");
            assert_eq!(record.get("total"), Some(&HostValue::Float64(10.0)));
            assert_eq!(record.get("count"), Some(&HostValue::Int64(4)));
        }
        other => panic!("expected record, got {other:?}"),
    }
}

#[test]
fn vectorized_compound_returns_become_lists_of_records() {
    let mut module = Module::new("math", "");
    module
        .add_compound_vectorized(
            "summaries",
            vec![FfiArgument::new("x", FfiType::Float64, vec![2])],
            CompoundType::new(vec![CompoundField::new("value", FfiType::Float64, vec![])]),
            summaries,
        )
        .unwrap();

    let xs = [1.5f64, 2.5];
    let mut params = ParameterSet::new();
    params.insert(
        Parameter::new(
            FfiArgument::new("x", FfiType::Float64, vec![2]),
            f64::as_view(&xs),
        )
        .unwrap(),
    );
    match module.call("summaries", &params).unwrap() {
        HostValue::List(items) => {
            assert_eq!(items.len(), 2);
            match &items[0] {
                HostValue::Record(record) => {
                    assert_eq!(record.get("value"), Some(&HostValue::Float64(1.5)))
                }
                other => panic!("expected record, got {other:?}"),
            }
        }
        other => panic!("expected list, got {other:?}"),
    }
}

#[test]
fn callable_errors_are_wrapped_with_the_method_name() {
    let mut module = Module::new("math", "");
    module.add("broken", vec![], always_fails).unwrap();
    let err = module.call("broken", &ParameterSet::new()).unwrap_err();
    assert_eq!(
        err,
        FfiError::CallableFailure {
            method: "broken".to_string(),
            message: "deliberate failure".to_string(),
        }
    );
}

#[test]
fn loader_populates_a_module_in_one_step() {
    fn loader(module: &mut Module) -> Result<(), FfiError> {
        module.add(
            "square",
            vec![FfiArgument::scalar("x", FfiType::Float64)],
            square,
        )
    }
    let module = Module::load("math", "loaded module", loader).unwrap();
    assert_eq!(module.name(), "math");
    assert_eq!(module.doc(), "loaded module");
    assert_eq!(module.signature().len(), 1);
}
