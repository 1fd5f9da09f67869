//! Tests for error handling

use dacbridge_core::error::{status_of, BridgeError, HResult, Result};

#[test]
fn test_hresult_success_and_failure()
{
    assert!(HResult::S_OK.is_success());
    assert!(HResult::S_FALSE.is_success());
    assert!(HResult::E_FAIL.is_failure());
    assert!(HResult::E_NOTIMPL.is_failure());
    assert!(!HResult::E_ACCESSDENIED.is_success());
}

#[test]
fn test_hresult_display_is_hex()
{
    assert_eq!(HResult::E_FAIL.to_string(), "0x80004005");
    assert_eq!(HResult::S_OK.to_string(), "0x00000000");
}

#[test]
fn test_hresult_raw_round_trip()
{
    let status = HResult::from_raw(-2_147_467_259);
    assert_eq!(status, HResult::E_FAIL);
    assert_eq!(status.raw(), -2_147_467_259);
}

#[test]
fn test_hresult_into_result_keeps_code()
{
    assert!(HResult::S_FALSE.into_result().is_ok());
    match HResult::E_OUTOFMEMORY.into_result() {
        Err(BridgeError::Propagated(status)) => assert_eq!(status, HResult::E_OUTOFMEMORY),
        other => panic!("Expected Propagated, got {other:?}"),
    }
}

#[test]
fn test_error_status_mapping()
{
    assert_eq!(BridgeError::ServiceUnavailable("x".into()).status(), HResult::E_UNEXPECTED);
    assert_eq!(BridgeError::Unsupported("x".into()).status(), HResult::E_NOTIMPL);
    assert_eq!(BridgeError::InvalidArgument("x".into()).status(), HResult::E_INVALIDARG);
    assert_eq!(BridgeError::NotFound("x".into()).status(), HResult::E_FAIL);
    assert_eq!(BridgeError::HostFailure("x".into()).status(), HResult::E_FAIL);
    assert_eq!(BridgeError::Failed("x".into()).status(), HResult::E_FAIL);
    assert_eq!(
        BridgeError::AccessDenied {
            address: 0x1000,
            size: 8
        }
        .status(),
        HResult::E_ACCESSDENIED
    );
}

#[test]
fn test_propagated_status_passes_through()
{
    let status = HResult::from_raw(0x8013_1c4f_u32 as i32);
    assert_eq!(BridgeError::Propagated(status).status(), status);
}

#[test]
fn test_access_denied_message()
{
    let error = BridgeError::AccessDenied {
        address: 0x7ff0_0000,
        size: 16,
    };
    let message = error.to_string();
    assert!(message.contains("Access denied"));
    assert!(message.contains("16 bytes"));
    assert!(message.contains("0x000000007ff00000"));
}

#[test]
fn test_io_error_converts()
{
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "scratch");
    let error: BridgeError = io.into();
    assert!(matches!(error, BridgeError::Io(_)));
    assert!(error.to_string().contains("scratch"));
}

#[test]
fn test_is_not_found()
{
    assert!(BridgeError::NotFound("line".into()).is_not_found());
    assert!(!BridgeError::Failed("line".into()).is_not_found());
}

#[test]
fn test_status_of_result()
{
    let ok: Result<u32> = Ok(4);
    let err: Result<u32> = Err(BridgeError::Unsupported("WriteVirtual".into()));
    assert_eq!(status_of(&ok), HResult::S_OK);
    assert_eq!(status_of(&err), HResult::E_NOTIMPL);
}
