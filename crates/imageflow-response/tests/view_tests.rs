//! Round-trip tests: native writer -> tracked region -> response view

use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::thread;

use imageflow_response::{
    imageflow_response_free, imageflow_response_new, BoolWidth, ImageFlowResponseC,
    ImageFlowResponseIntC, ResponseView, Runtime, RuntimeConfig, ViewError,
};
use pretty_assertions::assert_eq;
use serde_json::Value;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("imageflow_response=debug")
        .with_test_writer()
        .try_init();
}

fn explicit_runtime(name: &str) -> Runtime {
    Runtime::new(RuntimeConfig {
        name: name.to_string(),
        ..Default::default()
    })
    .unwrap()
}

/// Helper standing in for a native call: allocate a response the way the
/// library does and return its pointer.
fn native_call(success: bool, data: Option<&str>) -> *mut ImageFlowResponseC {
    match data {
        Some(text) => {
            let text = CString::new(text).unwrap();
            imageflow_response_new(success, text.as_ptr())
        }
        None => imageflow_response_new(success, ptr::null()),
    }
}

#[test]
fn test_default_runtime_ok_scenario() {
    init_tracing();
    let runtime = Runtime::system();
    let view = ResponseView::new();

    let native = native_call(true, Some("ok"));
    let region = unsafe { runtime.track_response(native.cast_const()) }.unwrap();

    let response = view.bind(region).unwrap().into_response().unwrap();
    assert!(response.success);
    assert_eq!(response.data.as_deref(), Some("ok"));

    assert!(runtime.release(region));
    imageflow_response_free(native);
}

#[test]
fn test_explicit_runtime_failure_scenario() {
    init_tracing();
    let runtime = explicit_runtime("explicit");
    let view = ResponseView::with_runtime(&runtime);

    let native = native_call(false, None);
    let region = unsafe { runtime.track_response(native.cast_const()) }.unwrap();
    let bound = view.bind(region).unwrap();

    assert!(!bound.success().unwrap());
    // Contractually meaningless, but must not crash
    assert!(bound.data().is_ok());

    runtime.release(region);
    imageflow_response_free(native);
}

#[test]
fn test_construction_does_not_fault() {
    let runtime = explicit_runtime("construct-only");
    let _default = ResponseView::new();
    let _explicit = ResponseView::with_runtime(&runtime);

    // Even a shut-down runtime can be used to construct a view
    runtime.shutdown();
    let _late = ResponseView::with_runtime(&runtime);
}

#[test]
fn test_exact_text_round_trip() {
    let runtime = explicit_runtime("round-trip");

    for text in ["abc", "café", "", "日本語 ✓ 🖼", r#"{"code":200}"#] {
        let native = native_call(true, Some(text));
        let region = unsafe { runtime.track_response(native.cast_const()) }.unwrap();
        let bound = ResponseView::with_runtime(&runtime).bind(region).unwrap();

        assert!(bound.success().unwrap());
        assert_eq!(bound.data().unwrap().as_deref(), Some(text));
        assert_eq!(bound.data_bytes().unwrap().unwrap(), text.as_bytes());

        runtime.release(region);
        imageflow_response_free(native);
    }
}

#[test]
fn test_failure_with_message_is_readable() {
    let runtime = explicit_runtime("failure-message");
    let native = native_call(false, Some("unsupported codec"));
    let region = unsafe { runtime.track_response(native.cast_const()) }.unwrap();
    let bound = ResponseView::with_runtime(&runtime).bind(region).unwrap();

    assert!(!bound.success().unwrap());
    assert_eq!(bound.data().unwrap(), None);
    // The reference writer always sets data, so the message is readable
    let message = unsafe { bound.failure_data() }.unwrap();
    assert_eq!(message.as_deref(), Some("unsupported codec"));

    // into_response does not carry untrusted failure data
    let response = bound.into_response().unwrap();
    assert_eq!(response.data, None);
    assert!(matches!(
        response.into_result(),
        Err(ViewError::NativeFailure { message: None })
    ));

    runtime.release(region);
    imageflow_response_free(native);
}

#[test]
fn test_failed_call_data_pointer_is_not_followed() {
    let runtime = explicit_runtime("dangling");
    // Garbage pointer the native side never set; must not be dereferenced
    let raw = ImageFlowResponseC {
        success: false,
        data: 0x1 as *const c_char,
    };
    let region = unsafe { runtime.track_response(&raw as *const ImageFlowResponseC) }.unwrap();

    let response = ResponseView::with_runtime(&runtime)
        .bind(region)
        .unwrap()
        .into_response()
        .unwrap();
    assert!(!response.success);
    assert_eq!(response.data, None);

    runtime.release(region);
}

#[test]
fn test_data_read_on_failed_call_ignores_garbage_pointer() {
    let runtime = explicit_runtime("garbage-data");
    let raw = ImageFlowResponseC {
        success: false,
        data: 0x10 as *const c_char,
    };
    let region = unsafe { runtime.track_response(&raw as *const ImageFlowResponseC) }.unwrap();
    let bound = ResponseView::with_runtime(&runtime).bind(region).unwrap();

    assert!(!bound.success().unwrap());
    assert_eq!(bound.data().unwrap(), None);
    assert_eq!(bound.data_bytes().unwrap(), None);

    runtime.release(region);
}

#[test]
fn test_read_after_release_faults() {
    init_tracing();
    let runtime = explicit_runtime("released");
    let native = native_call(true, Some("stale"));
    let region = unsafe { runtime.track_response(native.cast_const()) }.unwrap();
    let bound = ResponseView::with_runtime(&runtime).bind(region).unwrap();

    runtime.release(region);
    imageflow_response_free(native);

    let err = bound.success().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        ViewError::MemoryAccessFault {
            reason: "region released",
            ..
        }
    ));
    assert!(bound.data().unwrap_err().is_fatal());
    assert!(bound.into_response().unwrap_err().is_fatal());
}

#[test]
fn test_read_after_shutdown_faults() {
    let runtime = explicit_runtime("shutdown");
    let native = native_call(true, Some("ok"));
    let region = unsafe { runtime.track_response(native.cast_const()) }.unwrap();
    let bound = ResponseView::with_runtime(&runtime).bind(region).unwrap();

    assert!(runtime.shutdown());
    assert!(matches!(
        bound.success(),
        Err(ViewError::MemoryAccessFault {
            reason: "runtime shut down",
            ..
        })
    ));

    imageflow_response_free(native);
}

#[test]
fn test_bind_to_released_region_faults() {
    let runtime = explicit_runtime("bind-released");
    let region = runtime.allocate_response().unwrap();
    runtime.release(region);

    let err = ResponseView::with_runtime(&runtime).bind(region).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_region_from_other_runtime_is_not_readable() {
    let first = explicit_runtime("first");
    let second = explicit_runtime("second");
    let region = first.allocate(64).unwrap();
    let _unused = second.allocate(64).unwrap();
    let foreign = second.allocate(64).unwrap();

    // Ids are per-runtime; the second id was never issued by `first`
    assert!(first.is_live(region));
    let err = ResponseView::with_runtime(&first).bind(foreign).unwrap_err();
    assert!(matches!(
        err,
        ViewError::MemoryAccessFault {
            reason: "region not tracked",
            ..
        }
    ));
}

#[test]
fn test_out_parameter_allocation() {
    let runtime = explicit_runtime("out-param");
    let region = runtime.allocate_response().unwrap();
    let out = runtime.region_ptr(region).unwrap() as *mut ImageFlowResponseC;

    // Native call writes into caller-provided memory
    unsafe { ptr::write(out, ImageFlowResponseC::ok("written")) };

    let bound = ResponseView::with_runtime(&runtime).bind(region).unwrap();
    assert!(bound.success().unwrap());
    assert_eq!(bound.data().unwrap().as_deref(), Some("written"));

    let written = unsafe { ptr::read(out) };
    imageflow_response_free(Box::into_raw(Box::new(written)));
    runtime.release(region);
}

#[test]
fn test_int_width_flag() {
    let runtime = Runtime::new(RuntimeConfig {
        name: "int-flag".to_string(),
        bool_width: BoolWidth::Int,
        ..Default::default()
    })
    .unwrap();

    let text = CString::new("int ok").unwrap();
    let raw = ImageFlowResponseIntC {
        success: 1 as c_int,
        data: text.as_ptr(),
    };
    let region =
        unsafe { runtime.track_response(&raw as *const ImageFlowResponseIntC) }.unwrap();

    let response = ResponseView::with_runtime(&runtime)
        .bind(region)
        .unwrap()
        .into_response()
        .unwrap();
    assert!(response.success);
    assert_eq!(response.data.as_deref(), Some("int ok"));

    runtime.release(region);
}

#[test]
fn test_bind_rejects_region_smaller_than_int_layout() {
    let runtime = Runtime::new(RuntimeConfig {
        name: "layout-mismatch".to_string(),
        bool_width: BoolWidth::Int,
        ..Default::default()
    })
    .unwrap();
    let region = runtime.allocate(4).unwrap();

    let err = ResponseView::with_runtime(&runtime).bind(region).unwrap_err();
    assert!(matches!(err, ViewError::RegionTooSmall { len: 4, .. }));
}

#[test]
fn test_oversize_data_is_rejected() {
    let runtime = Runtime::new(RuntimeConfig {
        name: "small-limit".to_string(),
        max_data_len: 4,
        ..Default::default()
    })
    .unwrap();
    let native = native_call(true, Some("abcdefgh"));
    let region = unsafe { runtime.track_response(native.cast_const()) }.unwrap();
    let bound = ResponseView::with_runtime(&runtime).bind(region).unwrap();

    assert!(matches!(
        bound.data(),
        Err(ViewError::DataTooLarge { limit: 4 })
    ));

    runtime.release(region);
    imageflow_response_free(native);
}

#[test]
fn test_invalid_utf8_keeps_bytes_readable() {
    let runtime = explicit_runtime("invalid-utf8");
    let bytes = CString::new(vec![b'o', b'k', 0xff]).unwrap();
    let raw = ImageFlowResponseC {
        success: true,
        data: bytes.as_ptr(),
    };
    let region = unsafe { runtime.track_response(&raw as *const ImageFlowResponseC) }.unwrap();
    let bound = ResponseView::with_runtime(&runtime).bind(region).unwrap();

    assert!(matches!(
        bound.data(),
        Err(ViewError::InvalidUtf8 { valid_up_to: 2 })
    ));
    assert_eq!(bound.data_bytes().unwrap().unwrap(), vec![b'o', b'k', 0xff]);

    runtime.release(region);
}

#[test]
fn test_json_envelope_end_to_end() {
    let runtime = explicit_runtime("envelope");
    let native = native_call(
        true,
        Some(r#"{"code":200,"success":true,"message":"OK","data":{"job_result":{"encodes":[]}}}"#),
    );
    let region = unsafe { runtime.track_response(native.cast_const()) }.unwrap();

    let response = ResponseView::with_runtime(&runtime)
        .bind(region)
        .unwrap()
        .into_response()
        .unwrap();
    let envelope = response.envelope().unwrap();
    assert!(envelope.is_ok());
    assert_eq!(envelope.data["job_result"]["encodes"], Value::Array(vec![]));

    runtime.release(region);
    imageflow_response_free(native);
}

#[test]
fn test_system_runtime_across_threads() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            thread::spawn(move || {
                let runtime = Runtime::system();
                let text = format!("thread-{}", i);
                let native = native_call(true, Some(&text));
                let region = unsafe { runtime.track_response(native.cast_const()) }.unwrap();

                let response = ResponseView::new()
                    .bind(region)
                    .unwrap()
                    .into_response()
                    .unwrap();

                runtime.release(region);
                imageflow_response_free(native);
                response.data
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), Some(format!("thread-{}", i)));
    }
}
