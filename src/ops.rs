// CLASSIFICATION: COMMUNITY
// Filename: ops.rs v0.6
// Date Modified: 2026-08-02
// Author: Lukas Bower

//! Typed request constructors for the DSP firmware.
//!
//! Every operation validates its fields against the wire format before
//! encoding, so the codec itself never needs to fail. Operations block
//! on the reply unless noted; module loading completes through
//! [`IpcChannel::wait_module_load`] and D0ix is sent without waiting.

use log::error;

use crate::channel::IpcChannel;
use crate::error::{IpcError, IpcResult};
use crate::fragment::BlockCursor;
use crate::header::{
    GlobalMsg, IpcHeader, ModuleMsg, CORE_ID, D0IX_STREAMING, D0IX_WAKE, DATA_OFF_SIZE,
    DST_INSTANCE_ID, DST_MODULE_ID, DST_QUEUE, FINAL_BLOCK, INITIAL_BLOCK, INSTANCE_ID,
    LARGE_PARAM_ID, LOAD_MODULE_COUNT, MODULE_ID, MODULE_INSTANCE_ID, PARAM_BLOCK_SIZE,
    PPL_INSTANCE_ID, PPL_LP_MODE, PPL_MEM_SIZE, PPL_STATE, PPL_TYPE, PROC_DOMAIN, SAVE_DMA_ID,
    SRC_QUEUE,
};

/// Large-config parameter id of the firmware configuration block.
pub const FW_CONFIG_PARAM_ID: u8 = 7;

/// Lifecycle states a pipeline moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PipelineState {
    /// Reported for pipelines the firmware does not recognise.
    Invalid = 0,
    /// Created but not yet initialised.
    Uninitialized = 1,
    /// Initialised and stopped.
    Reset = 2,
    /// Data path constructed but not running.
    Paused = 3,
    /// Processing data.
    Running = 4,
    /// Drained to end of stream.
    EndOfStream = 5,
    /// Context saved ahead of a power transition.
    Saved = 6,
    /// Context restored after a power transition.
    Restored = 7,
}

impl PipelineState {
    /// Decode a state dword from a reply payload.
    pub fn from_dword(value: u32) -> Option<Self> {
        Some(match value {
            0 => PipelineState::Invalid,
            1 => PipelineState::Uninitialized,
            2 => PipelineState::Reset,
            3 => PipelineState::Paused,
            4 => PipelineState::Running,
            5 => PipelineState::EndOfStream,
            6 => PipelineState::Saved,
            7 => PipelineState::Restored,
            _ => return None,
        })
    }
}

/// Processing domain a module instance runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ProcDomain {
    /// Low-latency domain, scheduled every millisecond.
    LowLatency = 0,
    /// Data-processing domain, scheduled on demand.
    DataProcessing = 1,
}

/// Addressing and placement of a new module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitInstance {
    /// Module to instantiate.
    pub module_id: u16,
    /// Instance id to assign.
    pub instance_id: u8,
    /// Pipeline the instance joins.
    pub pipeline_instance: u8,
    /// Core the instance runs on.
    pub core_id: u8,
    /// Scheduling domain.
    pub domain: ProcDomain,
}

/// Endpoints of a bind or unbind request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindUnbind {
    /// Source module.
    pub module_id: u16,
    /// Source instance.
    pub instance_id: u8,
    /// Destination module.
    pub dst_module_id: u16,
    /// Destination instance.
    pub dst_instance_id: u8,
    /// Destination pin queue, 3 bits.
    pub dst_queue: u8,
    /// Source pin queue, 3 bits.
    pub src_queue: u8,
}

/// Addressing of a large-config parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LargeConfig {
    /// Module owning the parameter.
    pub module_id: u16,
    /// Instance owning the parameter.
    pub instance_id: u8,
    /// Parameter id within the module.
    pub param_id: u8,
}

/// D-state masks for [`IpcChannel::set_dx`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DxState {
    /// Cores the request addresses.
    pub core_mask: u32,
    /// Requested D-state per addressed core.
    pub dx_mask: u32,
}

impl DxState {
    /// Wire encoding: two little-endian dwords.
    pub fn to_bytes(self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[0..4].copy_from_slice(&self.core_mask.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.dx_mask.to_le_bytes());
        bytes
    }
}

/// D0ix idling policy for [`IpcChannel::set_d0ix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct D0ix {
    /// Module the policy concerns.
    pub module_id: u16,
    /// Instance the policy concerns.
    pub instance_id: u8,
    /// Keep a wake source armed while idling.
    pub wake: bool,
    /// A stream is active.
    pub streaming: bool,
}

fn module_ids_bytes(ids: &[u16]) -> Vec<u8> {
    ids.iter().flat_map(|id| id.to_le_bytes()).collect()
}

fn param_dwords(len: usize) -> usize {
    len.div_ceil(4)
}

impl IpcChannel {
    /// Create a pipeline shell of `mem_pages` pages.
    pub fn create_pipeline(
        &self,
        mem_pages: u16,
        pipeline_type: u8,
        instance_id: u8,
        low_power: bool,
    ) -> IpcResult<()> {
        if !PPL_MEM_SIZE.fits(mem_pages as u32) || !PPL_TYPE.fits(pipeline_type as u32) {
            return Err(IpcError::InvalidParameter);
        }
        let mut header = IpcHeader::global_request(GlobalMsg::CreatePipeline);
        INSTANCE_ID.set(&mut header.primary, instance_id as u32);
        PPL_TYPE.set(&mut header.primary, pipeline_type as u32);
        PPL_MEM_SIZE.set(&mut header.primary, mem_pages as u32);
        PPL_LP_MODE.set(&mut header.extension, low_power as u32);
        self.transact(header, Vec::new(), 0)?;
        Ok(())
    }

    /// Delete a pipeline and everything scheduled on it.
    pub fn delete_pipeline(&self, instance_id: u8) -> IpcResult<()> {
        let mut header = IpcHeader::global_request(GlobalMsg::DeletePipeline);
        INSTANCE_ID.set(&mut header.primary, instance_id as u32);
        self.transact(header, Vec::new(), 0)?;
        Ok(())
    }

    /// Drive a pipeline to `state`.
    pub fn set_pipeline_state(&self, instance_id: u8, state: PipelineState) -> IpcResult<()> {
        let mut header = IpcHeader::global_request(GlobalMsg::SetPipelineState);
        INSTANCE_ID.set(&mut header.primary, instance_id as u32);
        PPL_STATE.set(&mut header.primary, state as u32);
        self.transact(header, Vec::new(), 0)?;
        Ok(())
    }

    /// Query the current state of a pipeline.
    pub fn get_pipeline_state(&self, instance_id: u8) -> IpcResult<PipelineState> {
        let mut header = IpcHeader::global_request(GlobalMsg::GetPipelineState);
        INSTANCE_ID.set(&mut header.primary, instance_id as u32);
        let data = self.transact(header, Vec::new(), 4)?;
        if data.len() < 4 {
            error!("pipeline state reply too short: {} bytes", data.len());
            return Err(IpcError::InvalidParameter);
        }
        let dword = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        match PipelineState::from_dword(dword) {
            Some(state) => Ok(state),
            None => {
                error!("unknown pipeline state dword {dword:#x}");
                Err(IpcError::InvalidParameter)
            }
        }
    }

    /// Save pipeline context through DMA channel `dma_id`.
    pub fn save_pipeline(&self, instance_id: u8, dma_id: u8) -> IpcResult<()> {
        if !SAVE_DMA_ID.fits(dma_id as u32) {
            return Err(IpcError::InvalidParameter);
        }
        let mut header = IpcHeader::global_request(GlobalMsg::SavePipeline);
        INSTANCE_ID.set(&mut header.primary, instance_id as u32);
        SAVE_DMA_ID.set(&mut header.extension, dma_id as u32);
        self.transact(header, Vec::new(), 0)?;
        Ok(())
    }

    /// Restore previously saved pipeline context.
    pub fn restore_pipeline(&self, instance_id: u8) -> IpcResult<()> {
        let mut header = IpcHeader::global_request(GlobalMsg::RestorePipeline);
        INSTANCE_ID.set(&mut header.primary, instance_id as u32);
        self.transact(header, Vec::new(), 0)?;
        Ok(())
    }

    /// Initialise a module instance with its parameter blob.
    pub fn init_instance(&self, msg: &InitInstance, param_blob: &[u8]) -> IpcResult<()> {
        let dwords = param_dwords(param_blob.len());
        if !PARAM_BLOCK_SIZE.fits(dwords as u32) || !CORE_ID.fits(msg.core_id as u32) {
            return Err(IpcError::InvalidParameter);
        }
        let mut header =
            IpcHeader::module_request(ModuleMsg::InitInstance, msg.module_id, msg.instance_id);
        PARAM_BLOCK_SIZE.set(&mut header.extension, dwords as u32);
        PPL_INSTANCE_ID.set(&mut header.extension, msg.pipeline_instance as u32);
        CORE_ID.set(&mut header.extension, msg.core_id as u32);
        PROC_DOMAIN.set(&mut header.extension, msg.domain as u32);
        self.transact(header, param_blob.to_vec(), 0)?;
        Ok(())
    }

    /// Tear down a module instance.
    pub fn delete_instance(&self, module_id: u16, instance_id: u8) -> IpcResult<()> {
        let header = IpcHeader::module_request(ModuleMsg::DeleteInstance, module_id, instance_id);
        self.transact(header, Vec::new(), 0)?;
        Ok(())
    }

    /// Connect the source pin of one instance to another.
    pub fn bind(&self, msg: &BindUnbind) -> IpcResult<()> {
        self.bind_unbind(msg, ModuleMsg::Bind)
    }

    /// Disconnect two instances.
    pub fn unbind(&self, msg: &BindUnbind) -> IpcResult<()> {
        self.bind_unbind(msg, ModuleMsg::Unbind)
    }

    fn bind_unbind(&self, msg: &BindUnbind, kind: ModuleMsg) -> IpcResult<()> {
        if !DST_QUEUE.fits(msg.dst_queue as u32) || !SRC_QUEUE.fits(msg.src_queue as u32) {
            return Err(IpcError::InvalidParameter);
        }
        let mut header = IpcHeader::module_request(kind, msg.module_id, msg.instance_id);
        DST_MODULE_ID.set(&mut header.extension, msg.dst_module_id as u32);
        DST_INSTANCE_ID.set(&mut header.extension, msg.dst_instance_id as u32);
        DST_QUEUE.set(&mut header.extension, msg.dst_queue as u32);
        SRC_QUEUE.set(&mut header.extension, msg.src_queue as u32);
        self.transact(header, Vec::new(), 0)?;
        Ok(())
    }

    /// Ask the firmware to load a batch of modules. Returns once the
    /// request is queued; completion arrives through
    /// [`IpcChannel::wait_module_load`] after the loader DMA finishes.
    pub fn load_modules(&self, module_ids: &[u16]) -> IpcResult<()> {
        if !LOAD_MODULE_COUNT.fits(module_ids.len() as u32) {
            return Err(IpcError::InvalidParameter);
        }
        self.clear_module_load();
        let mut header = IpcHeader::global_request(GlobalMsg::LoadMultipleModules);
        LOAD_MODULE_COUNT.set(&mut header.primary, module_ids.len() as u32);
        self.send_nowait(header, module_ids_bytes(module_ids))
    }

    /// Unload a batch of modules, waiting for the reply.
    pub fn unload_modules(&self, module_ids: &[u16]) -> IpcResult<()> {
        if !LOAD_MODULE_COUNT.fits(module_ids.len() as u32) {
            return Err(IpcError::InvalidParameter);
        }
        let mut header = IpcHeader::global_request(GlobalMsg::UnloadMultipleModules);
        LOAD_MODULE_COUNT.set(&mut header.primary, module_ids.len() as u32);
        self.transact(header, module_ids_bytes(module_ids), 0)?;
        Ok(())
    }

    /// Load a module library image via DMA channel `dma_id` into
    /// library table slot `table_id`. With `wait` the reply is awaited
    /// here; either way the load outcome latches for
    /// [`IpcChannel::wait_module_load`].
    pub fn load_library(&self, dma_id: u8, table_id: u8, wait: bool) -> IpcResult<()> {
        self.clear_module_load();
        let mut header = IpcHeader::global_request(GlobalMsg::LoadLibrary);
        MODULE_ID.set(&mut header.primary, dma_id as u32);
        MODULE_INSTANCE_ID.set(&mut header.primary, table_id as u32);
        if wait {
            self.transact(header, Vec::new(), 0)?;
            Ok(())
        } else {
            self.send_nowait(header, Vec::new())
        }
    }

    /// Set the D-state of the cores a module runs on.
    pub fn set_dx(&self, instance_id: u8, module_id: u16, dx: &DxState) -> IpcResult<()> {
        let header = IpcHeader::module_request(ModuleMsg::SetDx, module_id, instance_id);
        self.transact(header, dx.to_bytes().to_vec(), 0)?;
        Ok(())
    }

    /// Set the D0ix idling policy. Sent without waiting for a reply;
    /// errors surface only from submission.
    pub fn set_d0ix(&self, msg: &D0ix) -> IpcResult<()> {
        let mut header =
            IpcHeader::module_request(ModuleMsg::SetD0ix, msg.module_id, msg.instance_id);
        D0IX_WAKE.set(&mut header.extension, msg.wake as u32);
        D0IX_STREAMING.set(&mut header.extension, msg.streaming as u32);
        self.send_nowait(header, Vec::new())
    }

    /// Write a parameter larger than the outbound window, one block per
    /// round trip. An empty payload sends nothing.
    pub fn set_large_config(&self, msg: &LargeConfig, data: &[u8]) -> IpcResult<()> {
        if !DATA_OFF_SIZE.fits(data.len() as u32) {
            return Err(IpcError::InvalidParameter);
        }
        let window = self.outbox_capacity();
        for block in BlockCursor::new(data.len(), window) {
            let mut header =
                IpcHeader::module_request(ModuleMsg::LargeConfigSet, msg.module_id, msg.instance_id);
            LARGE_PARAM_ID.set(&mut header.extension, msg.param_id as u32);
            INITIAL_BLOCK.set(&mut header.extension, block.first as u32);
            FINAL_BLOCK.set(&mut header.extension, block.last as u32);
            // Initial block announces the total size; later blocks
            // carry their byte offset.
            let field = if block.first { data.len() } else { block.offset };
            DATA_OFF_SIZE.set(&mut header.extension, field as u32);
            let chunk = data[block.offset..block.offset + block.len].to_vec();
            self.transact(header, chunk, 0)?;
        }
        Ok(())
    }

    /// Read a parameter larger than the inbound window. `expected` is
    /// the total size to collect; `tx_param` optionally rides along on
    /// the initial request to qualify the query. Loops until every
    /// expected byte has arrived, advancing by the block size each
    /// reply reports.
    pub fn get_large_config(
        &self,
        msg: &LargeConfig,
        expected: usize,
        tx_param: Option<&[u8]>,
    ) -> IpcResult<Vec<u8>> {
        if !DATA_OFF_SIZE.fits(expected as u32) {
            return Err(IpcError::InvalidParameter);
        }
        let window = self.inbox_capacity();
        let mut out = Vec::with_capacity(expected);
        let mut remaining = expected;
        let mut offset = 0usize;
        while remaining > 0 {
            let first = offset == 0;
            let want = remaining.min(window);
            let mut header =
                IpcHeader::module_request(ModuleMsg::LargeConfigGet, msg.module_id, msg.instance_id);
            LARGE_PARAM_ID.set(&mut header.extension, msg.param_id as u32);
            INITIAL_BLOCK.set(&mut header.extension, first as u32);
            FINAL_BLOCK.set(&mut header.extension, (want == remaining) as u32);
            let field = match (first, tx_param) {
                (true, Some(param)) => param.len(),
                (true, None) => expected,
                (false, _) => offset,
            };
            DATA_OFF_SIZE.set(&mut header.extension, field as u32);
            let payload = match (first, tx_param) {
                (true, Some(param)) => param.to_vec(),
                _ => Vec::new(),
            };
            let block = self.transact(header, payload, want)?;
            if block.is_empty() {
                error!("large config get stalled, firmware reported a zero-size block");
                return Err(IpcError::InvalidParameter);
            }
            remaining -= block.len().min(remaining);
            offset += block.len();
            out.extend_from_slice(&block);
        }
        Ok(out)
    }

    /// Push a firmware configuration TLV blob through the large-config
    /// path.
    pub fn set_fw_config(&self, module_id: u16, instance_id: u8, blob: &[u8]) -> IpcResult<()> {
        let msg = LargeConfig {
            module_id,
            instance_id,
            param_id: FW_CONFIG_PARAM_ID,
        };
        self.set_large_config(&msg, blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_state_decode() {
        assert_eq!(PipelineState::from_dword(4), Some(PipelineState::Running));
        assert_eq!(PipelineState::from_dword(7), Some(PipelineState::Restored));
        assert_eq!(PipelineState::from_dword(8), None);
    }

    #[test]
    fn dx_state_wire_layout() {
        let dx = DxState {
            core_mask: 0x0102_0304,
            dx_mask: 0xA0B0_C0D0,
        };
        let bytes = dx.to_bytes();
        assert_eq!(&bytes[0..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[4..8], &[0xD0, 0xC0, 0xB0, 0xA0]);
    }

    #[test]
    fn module_id_payload_little_endian() {
        assert_eq!(module_ids_bytes(&[0x0201, 0x0403]), vec![1, 2, 3, 4]);
    }

    #[test]
    fn param_block_dword_rounding() {
        assert_eq!(param_dwords(0), 0);
        assert_eq!(param_dwords(1), 1);
        assert_eq!(param_dwords(4), 1);
        assert_eq!(param_dwords(5), 2);
        assert_eq!(param_dwords(16), 4);
    }
}
