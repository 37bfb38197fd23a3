// CLASSIFICATION: COMMUNITY
// Filename: error.rs v0.3
// Date Modified: 2026-06-14
// Author: Lukas Bower

//! Error taxonomy for the audio DSP IPC channel.
//!
//! Two layers: [`ReplyStatus`] is the raw status code the firmware places
//! in the low 24 bits of a reply header, [`IpcError`] is what callers of
//! this crate actually see. Most firmware failures collapse into
//! [`IpcError::InvalidRequest`] carrying the raw status; only the codes a
//! caller can meaningfully react to get their own variant.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type IpcResult<T> = Result<T, IpcError>;

/// Status code reported by the firmware in a reply header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// Request completed.
    Success,
    /// Message type not recognised by the firmware.
    UnknownMsgType,
    /// A parameter in the request was rejected.
    InvalidParam,
    /// Firmware cannot take the request right now.
    Busy,
    /// Request accepted, completion still outstanding.
    Pending,
    /// Unspecified failure.
    Failure,
    /// Request malformed or not valid in the current state.
    InvalidRequest,
    /// Firmware heap exhausted.
    OutOfMemory,
    /// No processing budget left on the target core.
    OutOfMips,
    /// Referenced resource does not exist.
    InvalidResourceId,
    /// Referenced resource is in the wrong state.
    InvalidResourceState,
    /// Module manager internal error.
    ModMgmtError,
    /// Module code-loader transfer failed.
    ModLoadClFailed,
    /// Module image failed hash verification.
    ModLoadInvalidHash,
    /// Module still has live instances and cannot be unloaded.
    ModUnloadInstExist,
    /// Module was never initialised.
    ModNotInitialized,
    /// Config parameter id not known to the module.
    InvalidConfigParamId,
    /// Config payload length rejected by the module.
    InvalidConfigDataLen,
    /// Audio gateway was never initialised.
    GatewayNotInitialized,
    /// Audio gateway does not exist.
    GatewayNotExist,
    /// Pipeline was never initialised.
    PipelineNotInitialized,
    /// Pipeline does not exist.
    PipelineNotExist,
    /// Pipeline context save failed.
    PipelineSaveFailed,
    /// Pipeline context restore failed.
    PipelineRestoreFailed,
    /// Status value this crate does not know about.
    Unknown(u32),
}

impl ReplyStatus {
    /// Decode the status field of a reply header.
    pub fn from_wire(raw: u32) -> Self {
        match raw {
            0 => ReplyStatus::Success,
            1 => ReplyStatus::UnknownMsgType,
            2 => ReplyStatus::InvalidParam,
            3 => ReplyStatus::Busy,
            4 => ReplyStatus::Pending,
            5 => ReplyStatus::Failure,
            6 => ReplyStatus::InvalidRequest,
            7 => ReplyStatus::OutOfMemory,
            8 => ReplyStatus::OutOfMips,
            9 => ReplyStatus::InvalidResourceId,
            10 => ReplyStatus::InvalidResourceState,
            100 => ReplyStatus::ModMgmtError,
            101 => ReplyStatus::ModLoadClFailed,
            102 => ReplyStatus::ModLoadInvalidHash,
            103 => ReplyStatus::ModUnloadInstExist,
            104 => ReplyStatus::ModNotInitialized,
            120 => ReplyStatus::InvalidConfigParamId,
            121 => ReplyStatus::InvalidConfigDataLen,
            140 => ReplyStatus::GatewayNotInitialized,
            141 => ReplyStatus::GatewayNotExist,
            160 => ReplyStatus::PipelineNotInitialized,
            161 => ReplyStatus::PipelineNotExist,
            162 => ReplyStatus::PipelineSaveFailed,
            163 => ReplyStatus::PipelineRestoreFailed,
            other => ReplyStatus::Unknown(other),
        }
    }

    /// Encode back to the wire value.
    pub fn to_wire(self) -> u32 {
        match self {
            ReplyStatus::Success => 0,
            ReplyStatus::UnknownMsgType => 1,
            ReplyStatus::InvalidParam => 2,
            ReplyStatus::Busy => 3,
            ReplyStatus::Pending => 4,
            ReplyStatus::Failure => 5,
            ReplyStatus::InvalidRequest => 6,
            ReplyStatus::OutOfMemory => 7,
            ReplyStatus::OutOfMips => 8,
            ReplyStatus::InvalidResourceId => 9,
            ReplyStatus::InvalidResourceState => 10,
            ReplyStatus::ModMgmtError => 100,
            ReplyStatus::ModLoadClFailed => 101,
            ReplyStatus::ModLoadInvalidHash => 102,
            ReplyStatus::ModUnloadInstExist => 103,
            ReplyStatus::ModNotInitialized => 104,
            ReplyStatus::InvalidConfigParamId => 120,
            ReplyStatus::InvalidConfigDataLen => 121,
            ReplyStatus::GatewayNotInitialized => 140,
            ReplyStatus::GatewayNotExist => 141,
            ReplyStatus::PipelineNotInitialized => 160,
            ReplyStatus::PipelineNotExist => 161,
            ReplyStatus::PipelineSaveFailed => 162,
            ReplyStatus::PipelineRestoreFailed => 163,
            ReplyStatus::Unknown(other) => other,
        }
    }

    /// True for a successful reply.
    pub fn is_success(self) -> bool {
        self == ReplyStatus::Success
    }
}

impl std::fmt::Display for ReplyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ReplyStatus::Success => "success",
            ReplyStatus::UnknownMsgType => "unknown message type",
            ReplyStatus::InvalidParam => "invalid parameter",
            ReplyStatus::Busy => "firmware busy",
            ReplyStatus::Pending => "pending",
            ReplyStatus::Failure => "failure",
            ReplyStatus::InvalidRequest => "invalid request",
            ReplyStatus::OutOfMemory => "out of memory",
            ReplyStatus::OutOfMips => "out of mips",
            ReplyStatus::InvalidResourceId => "invalid resource id",
            ReplyStatus::InvalidResourceState => "invalid resource state",
            ReplyStatus::ModMgmtError => "module management error",
            ReplyStatus::ModLoadClFailed => "module code-load failed",
            ReplyStatus::ModLoadInvalidHash => "module hash invalid",
            ReplyStatus::ModUnloadInstExist => "module instances still exist",
            ReplyStatus::ModNotInitialized => "module not initialised",
            ReplyStatus::InvalidConfigParamId => "invalid config param id",
            ReplyStatus::InvalidConfigDataLen => "invalid config data length",
            ReplyStatus::GatewayNotInitialized => "gateway not initialised",
            ReplyStatus::GatewayNotExist => "gateway does not exist",
            ReplyStatus::PipelineNotInitialized => "pipeline not initialised",
            ReplyStatus::PipelineNotExist => "pipeline does not exist",
            ReplyStatus::PipelineSaveFailed => "pipeline save failed",
            ReplyStatus::PipelineRestoreFailed => "pipeline restore failed",
            ReplyStatus::Unknown(v) => return write!(f, "unknown status {v:#x}"),
        };
        f.write_str(text)
    }
}

/// Errors surfaced to callers of the IPC channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpcError {
    /// Firmware heap exhausted.
    #[error("coprocessor out of memory")]
    OutOfMemory,
    /// Firmware cannot accept the request right now.
    #[error("coprocessor busy")]
    Busy,
    /// Firmware rejected the request; the raw status is preserved for
    /// diagnosis.
    #[error("request rejected by firmware: {status}")]
    InvalidRequest {
        /// Status code from the reply header.
        status: ReplyStatus,
    },
    /// A request field or payload failed validation against its wire
    /// format, in either direction.
    #[error("value does not fit its wire field")]
    InvalidParameter,
    /// No reply arrived within the configured window.
    #[error("timed out waiting for coprocessor reply")]
    Timeout,
}

impl IpcError {
    /// Collapse a firmware status into the caller-facing taxonomy.
    ///
    /// Only out-of-memory and busy keep their identity; everything else
    /// is a rejected request carrying the raw status.
    pub fn from_status(status: ReplyStatus) -> Self {
        match status {
            ReplyStatus::OutOfMemory => IpcError::OutOfMemory,
            ReplyStatus::Busy => IpcError::Busy,
            other => IpcError::InvalidRequest { status: other },
        }
    }
}
