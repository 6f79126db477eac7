//! Error taxonomy shared by every fallible GPU call.

use thiserror::Error;

/// Closed set of failures a device, resource or swapchain call can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorCode {
    /// A descriptor failed validation. No backend state was created.
    #[error("invalid arguments")]
    InvalidArgs,
    #[error("out of host memory")]
    OutOfHostMemory,
    #[error("out of device memory")]
    OutOfDeviceMemory,
    #[error("initialization failed")]
    InitializationFailed,
    #[error("backend not supported")]
    BackendNotSupported,
    /// The chosen queue cannot present to the given surface.
    #[error("surface presentation not supported")]
    SurfacePresentationNotSupported,
    #[error("format not supported")]
    FormatNotSupported,
    #[error("incompatible format")]
    IncompatibleFormat,
    #[error("incompatible resource usage")]
    IncompatibleResourceUsage,
    /// Two shader stages disagree about a binding, or a binding kind is unsupported.
    #[error("invalid shader resource binding")]
    InvalidShaderResourceBinding,
    #[error("memory usage not supported")]
    MemoryUsageNotSupported,
    #[error("unimplemented")]
    Unimplemented,
    /// Unexpected backend failure.
    #[error("internal error")]
    InternalError,
}

/// Result of every fallible GPU call.
pub type GpuResult<T> = Result<T, ErrorCode>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        assert_eq!(ErrorCode::InvalidArgs.to_string(), "invalid arguments");
        assert_eq!(
            ErrorCode::InvalidShaderResourceBinding.to_string(),
            "invalid shader resource binding"
        );
    }

    #[test]
    fn result_accessors_follow_variant() {
        let ok: GpuResult<u32> = Ok(7);
        let err: GpuResult<u32> = Err(ErrorCode::FormatNotSupported);
        assert!(ok.is_ok());
        assert_eq!(ok.unwrap(), 7);
        assert!(err.is_err());
        assert_eq!(err.unwrap_err(), ErrorCode::FormatNotSupported);
    }

    #[test]
    #[should_panic]
    fn value_on_error_fails_fast() {
        let err: GpuResult<u32> = Err(ErrorCode::InternalError);
        let _ = err.unwrap();
    }
}
