// CLASSIFICATION: COMMUNITY
// Filename: header.rs v0.5
// Date Modified: 2026-07-02
// Author: Lukas Bower

//! Wire envelope codec for the DSP doorbell registers.
//!
//! Every message is two 32-bit words, written to (or read from) the
//! primary and extension doorbell registers. Fields are packed with the
//! explicit shift/mask pairs below; encode and decode share the same
//! [`Field`] constant so the two directions cannot drift apart.
//!
//! Primary word, request direction:
//!
//! ```text
//! 31  30     29    28..24   23..16        15..0
//! --  target dir   type     instance id   family-specific
//! ```
//!
//! Bit 31 is the hardware busy bit and never part of the message. The
//! extension word is entirely family-specific; see the constants below.
//! Replies carry the replied-to type at bits 24..28, the direction bit
//! set, and the status in the low 24 bits. Notifications carry the
//! direction bit clear with the notify class at bits 16..23.

/// One bit-field within a header word.
///
/// `mask` is the field width mask before shifting, so a value fits the
/// field iff `value <= mask`. [`Field::set`] masks silently; range
/// validation belongs to the typed request layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Left shift applied to the masked value.
    pub shift: u32,
    /// Unshifted width mask.
    pub mask: u32,
}

impl Field {
    /// Field at `shift` spanning `width` bits.
    pub const fn new(shift: u32, width: u32) -> Self {
        Field {
            shift,
            mask: (1u32 << width) - 1,
        }
    }

    /// Largest encodable value.
    pub const fn max(self) -> u32 {
        self.mask
    }

    /// True if `value` fits the field without truncation.
    pub const fn fits(self, value: u32) -> bool {
        value <= self.mask
    }

    /// Write `value` into the field of `word`, replacing previous bits.
    pub fn set(self, word: &mut u32, value: u32) {
        *word = (*word & !(self.mask << self.shift)) | ((value & self.mask) << self.shift);
    }

    /// Read the field out of `word`.
    pub const fn get(self, word: u32) -> u32 {
        (word >> self.shift) & self.mask
    }
}

// Primary word, both directions.

/// Message target: firmware-global or module-addressed.
pub const TARGET: Field = Field::new(30, 1);
/// Direction: request or reply. Clear on notifications.
pub const DIRECTION: Field = Field::new(29, 1);
/// Message type within the target family.
pub const MSG_TYPE: Field = Field::new(24, 5);

// Primary word, global requests.

/// Pipeline instance id.
pub const INSTANCE_ID: Field = Field::new(16, 8);
/// Pipeline type.
pub const PPL_TYPE: Field = Field::new(11, 5);
/// Pipeline memory size, in memory pages.
pub const PPL_MEM_SIZE: Field = Field::new(0, 11);
/// Requested pipeline state.
pub const PPL_STATE: Field = Field::new(0, 5);
/// Number of module ids carried in a load/unload payload.
pub const LOAD_MODULE_COUNT: Field = Field::new(0, 8);

// Primary word, module requests.

/// Module id.
pub const MODULE_ID: Field = Field::new(0, 16);
/// Module instance id.
pub const MODULE_INSTANCE_ID: Field = Field::new(16, 8);

// Primary word, replies and notifications.

/// Reply status code.
pub const REPLY_STATUS: Field = Field::new(0, 24);
/// Notification class.
pub const NOTIFY_CLASS: Field = Field::new(16, 8);
/// Core the notification originated from.
pub const NOTIFY_CORE: Field = Field::new(12, 4);

// Extension word.

/// Create-pipeline: low-power mode flag.
pub const PPL_LP_MODE: Field = Field::new(0, 1);
/// Save-pipeline: DMA channel carrying the context.
pub const SAVE_DMA_ID: Field = Field::new(0, 5);
/// Init-instance: parameter block size in dwords.
pub const PARAM_BLOCK_SIZE: Field = Field::new(0, 16);
/// Init-instance: owning pipeline instance.
pub const PPL_INSTANCE_ID: Field = Field::new(16, 8);
/// Init-instance: target core.
pub const CORE_ID: Field = Field::new(24, 4);
/// Init-instance: processing domain (low-latency or data-processing).
pub const PROC_DOMAIN: Field = Field::new(28, 1);
/// Bind/unbind: destination module id.
pub const DST_MODULE_ID: Field = Field::new(0, 16);
/// Bind/unbind: destination module instance.
pub const DST_INSTANCE_ID: Field = Field::new(16, 8);
/// Bind/unbind: destination queue.
pub const DST_QUEUE: Field = Field::new(24, 3);
/// Bind/unbind: source queue.
pub const SRC_QUEUE: Field = Field::new(27, 3);
/// Large config: byte offset of this block, or the total size (or
/// ride-along size) on the initial block; block size on replies.
pub const DATA_OFF_SIZE: Field = Field::new(0, 20);
/// Large config: parameter id.
pub const LARGE_PARAM_ID: Field = Field::new(20, 8);
/// Large config: final-block flag.
pub const FINAL_BLOCK: Field = Field::new(28, 1);
/// Large config: initial-block flag.
pub const INITIAL_BLOCK: Field = Field::new(29, 1);
/// D0ix: wake-capable flag.
pub const D0IX_WAKE: Field = Field::new(0, 1);
/// D0ix: streaming-active flag.
pub const D0IX_STREAMING: Field = Field::new(1, 1);
/// Core-exception notification: faulting core.
pub const EXCEPT_CORE: Field = Field::new(0, 2);
/// Core-exception notification: captured stack size in bytes.
pub const EXCEPT_STACK_SIZE: Field = Field::new(2, 30);

/// Addressing family of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MsgTarget {
    /// Firmware-global request, handled by the base firmware.
    FwGen = 0,
    /// Request addressed to a module instance.
    Module = 1,
}

/// Direction bit of the primary word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MsgDir {
    /// Host-originated request; also firmware notifications.
    Request = 0,
    /// Firmware reply to an in-flight request.
    Reply = 1,
}

/// Firmware-global message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum GlobalMsg {
    /// Query the firmware version block.
    GetFwVersion = 0,
    /// Load a batch of modules, completion signalled separately.
    LoadMultipleModules = 15,
    /// Unload a batch of modules.
    UnloadMultipleModules = 16,
    /// Create a pipeline shell.
    CreatePipeline = 17,
    /// Delete a pipeline.
    DeletePipeline = 18,
    /// Drive a pipeline to a new state.
    SetPipelineState = 19,
    /// Query the current pipeline state.
    GetPipelineState = 20,
    /// Query the saved-context size of a pipeline.
    GetPipelineContextSize = 21,
    /// Save pipeline context over DMA.
    SavePipeline = 22,
    /// Restore previously saved pipeline context.
    RestorePipeline = 23,
    /// Load a module library image.
    LoadLibrary = 24,
    /// Firmware notification; never sent by the host.
    Notify = 26,
}

/// Module-addressed message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ModuleMsg {
    /// Initialise a module instance.
    InitInstance = 0,
    /// Read a small config parameter.
    ConfigGet = 1,
    /// Write a small config parameter.
    ConfigSet = 2,
    /// Read a parameter larger than the inbound window.
    LargeConfigGet = 3,
    /// Write a parameter larger than the outbound window.
    LargeConfigSet = 4,
    /// Connect two module instances.
    Bind = 5,
    /// Disconnect two module instances.
    Unbind = 6,
    /// Set the D-state of cores used by a module.
    SetDx = 7,
    /// Set the D0ix idling policy; sent without waiting for a reply.
    SetD0ix = 8,
    /// Tear down a module instance.
    DeleteInstance = 11,
}

/// Two-word message envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IpcHeader {
    /// Primary doorbell word.
    pub primary: u32,
    /// Extension doorbell word.
    pub extension: u32,
}

impl IpcHeader {
    /// Request envelope for a firmware-global message.
    pub fn global_request(msg: GlobalMsg) -> Self {
        let mut primary = 0;
        TARGET.set(&mut primary, MsgTarget::FwGen as u32);
        DIRECTION.set(&mut primary, MsgDir::Request as u32);
        MSG_TYPE.set(&mut primary, msg as u32);
        IpcHeader {
            primary,
            extension: 0,
        }
    }

    /// Request envelope addressed to a module instance.
    pub fn module_request(msg: ModuleMsg, module_id: u16, instance_id: u8) -> Self {
        let mut primary = 0;
        TARGET.set(&mut primary, MsgTarget::Module as u32);
        DIRECTION.set(&mut primary, MsgDir::Request as u32);
        MSG_TYPE.set(&mut primary, msg as u32);
        MODULE_ID.set(&mut primary, module_id as u32);
        MODULE_INSTANCE_ID.set(&mut primary, instance_id as u32);
        IpcHeader {
            primary,
            extension: 0,
        }
    }

    /// Direction bit of the primary word.
    pub fn direction(&self) -> MsgDir {
        if DIRECTION.get(self.primary) == MsgDir::Reply as u32 {
            MsgDir::Reply
        } else {
            MsgDir::Request
        }
    }

    /// Target family of the primary word.
    pub fn target(&self) -> MsgTarget {
        if TARGET.get(self.primary) == MsgTarget::Module as u32 {
            MsgTarget::Module
        } else {
            MsgTarget::FwGen
        }
    }

    /// True when the direction bit marks a reply. A clear bit on a
    /// firmware-originated message marks a notification instead.
    pub fn is_reply(&self) -> bool {
        self.direction() == MsgDir::Reply
    }

    /// Raw message-type field.
    pub fn msg_type(&self) -> u32 {
        MSG_TYPE.get(self.primary)
    }

    /// True when this header is a reply to the given global message.
    pub fn replies_to_global(&self, msg: GlobalMsg) -> bool {
        self.target() == MsgTarget::FwGen && self.msg_type() == msg as u32
    }

    /// True when this header is a reply to the given module message.
    pub fn replies_to_module(&self, msg: ModuleMsg) -> bool {
        self.target() == MsgTarget::Module && self.msg_type() == msg as u32
    }
}
