//! Guards `OrchestratorError`'s in-memory size so clippy's
//! `large_enum_variant` lint stays quiet and the error type stays cheap to
//! move through `Result<T, OrchestratorError>` on every fallible call.

use orchestrator_core::error::OrchestratorError;

#[test]
fn test_orchestrator_error_size() {
    let error_size = std::mem::size_of::<OrchestratorError>();

    assert!(
        error_size <= 128,
        "OrchestratorError size is {} bytes, which is too large. Consider boxing large variants.",
        error_size
    );
}

#[test]
fn test_result_size() {
    let result_unit_size = std::mem::size_of::<Result<(), OrchestratorError>>();
    let result_string_size = std::mem::size_of::<Result<String, OrchestratorError>>();
    let result_value_size = std::mem::size_of::<Result<serde_json::Value, OrchestratorError>>();

    assert!(result_unit_size <= 136, "Result<(), OrchestratorError> is too large");
    assert!(result_string_size <= 160, "Result<String, OrchestratorError> is too large");
    assert!(result_value_size <= 160, "Result<Value, OrchestratorError> is too large");
}
