// CLASSIFICATION: COMMUNITY
// Filename: tests/common/mod.rs v0.3
// Date Modified: 2026-08-10
// Author: Lukas Bower

//! Shared test harness: a scripted doorbell block plus recording
//! platform hooks. Tests play the firmware side by mutating the bus
//! state and pushing interrupts through the channel.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use cohesix_adsp::header::{
    GlobalMsg, IpcHeader, DIRECTION, MSG_TYPE, NOTIFY_CLASS, NOTIFY_CORE, REPLY_STATUS,
};
use cohesix_adsp::{
    IpcChannel, IpcConfig, IpcResult, MailboxBus, MailboxReg, ModuleNotification, PlatformHooks,
    CMD_BUSY, CMD_DONE,
};

/// One host-to-firmware message captured at doorbell-write time.
#[derive(Debug, Clone)]
pub struct SentMsg {
    pub primary: u32,
    pub extension: u32,
    pub payload: Vec<u8>,
}

/// Register and window state shared between the bus handed to the
/// channel and the test acting as firmware.
pub struct BusState {
    pub outbox_cmd: u32,
    pub outbox_ext: u32,
    pub inbox_cmd: u32,
    pub inbox_ext: u32,
    pub int_control: u32,
    pub int_status: u32,
    pub ipc_control: u32,
    pub outbox_cap: usize,
    pub inbox_cap: usize,
    pub inbox: Vec<u8>,
    pub trace: HashMap<u8, Vec<u8>>,
    pending_tx: Vec<u8>,
    sent: VecDeque<SentMsg>,
}

impl BusState {
    fn new(outbox_cap: usize, inbox_cap: usize) -> Self {
        BusState {
            outbox_cmd: 0,
            outbox_ext: 0,
            inbox_cmd: 0,
            inbox_ext: 0,
            int_control: 0,
            int_status: 0,
            ipc_control: 0,
            outbox_cap,
            inbox_cap,
            inbox: vec![0u8; inbox_cap],
            trace: HashMap::new(),
            pending_tx: Vec::new(),
            sent: VecDeque::new(),
        }
    }
}

/// The bus the channel owns; everything lives in the shared state.
pub struct MockBus(Arc<Mutex<BusState>>);

impl MockBus {
    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.0.lock().expect("bus state poisoned")
    }
}

impl MailboxBus for MockBus {
    fn read_reg(&self, reg: MailboxReg) -> u32 {
        let st = self.lock();
        match reg {
            MailboxReg::OutboxCmd => st.outbox_cmd,
            MailboxReg::OutboxExt => st.outbox_ext,
            MailboxReg::InboxCmd => st.inbox_cmd,
            MailboxReg::InboxExt => st.inbox_ext,
            MailboxReg::IntControl => st.int_control,
            MailboxReg::IntStatus => st.int_status,
            MailboxReg::IpcControl => st.ipc_control,
        }
    }

    fn write_reg(&mut self, reg: MailboxReg, value: u32) {
        let mut st = self.lock();
        match reg {
            MailboxReg::OutboxCmd => {
                st.outbox_cmd = value;
                if value & CMD_BUSY != 0 {
                    // Doorbell rang: capture the full message.
                    let payload = std::mem::take(&mut st.pending_tx);
                    let extension = st.outbox_ext;
                    st.sent.push_back(SentMsg {
                        primary: value & !CMD_BUSY,
                        extension,
                        payload,
                    });
                }
            }
            MailboxReg::OutboxExt => st.outbox_ext = value,
            MailboxReg::InboxCmd => st.inbox_cmd = value,
            MailboxReg::InboxExt => st.inbox_ext = value,
            MailboxReg::IntControl => st.int_control = value,
            MailboxReg::IntStatus => st.int_status = value,
            MailboxReg::IpcControl => st.ipc_control = value,
        }
    }

    fn outbox_write(&mut self, data: &[u8]) {
        let mut st = self.lock();
        assert!(data.len() <= st.outbox_cap, "outbox overrun");
        st.pending_tx = data.to_vec();
    }

    fn inbox_read(&mut self, buf: &mut [u8]) {
        let st = self.lock();
        assert!(buf.len() <= st.inbox_cap, "inbox overrun");
        buf.copy_from_slice(&st.inbox[..buf.len()]);
    }

    fn outbox_size(&self) -> usize {
        self.lock().outbox_cap
    }

    fn inbox_size(&self) -> usize {
        self.lock().inbox_cap
    }

    fn with_trace_window(&mut self, core: u8, f: &mut dyn FnMut(&mut [u8])) -> bool {
        let mut st = self.lock();
        match st.trace.get_mut(&core) {
            Some(window) => {
                f(window);
                true
            }
            None => false,
        }
    }
}

/// Platform call observed by [`RecordingHooks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookCall {
    ClockGating(bool),
    PowerGating(bool),
    Reinit,
    CrashDump { core: u8, stack_bytes: u32 },
    ModuleEvent(ModuleNotification),
}

/// Hooks that record every invocation in order.
#[derive(Default)]
pub struct RecordingHooks {
    calls: Mutex<Vec<HookCall>>,
}

impl RecordingHooks {
    pub fn calls(&self) -> Vec<HookCall> {
        self.calls.lock().expect("hook log poisoned").clone()
    }

    fn record(&self, call: HookCall) {
        self.calls.lock().expect("hook log poisoned").push(call);
    }
}

impl PlatformHooks for RecordingHooks {
    fn enable_clock_gating(&self, enable: bool) {
        self.record(HookCall::ClockGating(enable));
    }

    fn enable_power_gating(&self, enable: bool) {
        self.record(HookCall::PowerGating(enable));
    }

    fn reinit_firmware(&self) -> IpcResult<()> {
        self.record(HookCall::Reinit);
        Ok(())
    }

    fn read_crash_dump(&self, core: u8, stack_bytes: u32) -> IpcResult<()> {
        self.record(HookCall::CrashDump { core, stack_bytes });
        Ok(())
    }

    fn module_notification(&self, event: ModuleNotification) {
        self.record(HookCall::ModuleEvent(event));
    }
}

/// Channel plus the firmware-side controls of its bus.
pub struct Harness {
    pub channel: Arc<IpcChannel>,
    pub state: Arc<Mutex<BusState>>,
    pub hooks: Arc<RecordingHooks>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(64, 64, IpcConfig::default())
    }

    pub fn with(outbox_cap: usize, inbox_cap: usize, cfg: IpcConfig) -> Self {
        init_logs();
        let state = Arc::new(Mutex::new(BusState::new(outbox_cap, inbox_cap)));
        let hooks = Arc::new(RecordingHooks::default());
        let channel = Arc::new(IpcChannel::new(
            Box::new(MockBus(Arc::clone(&state))),
            Arc::clone(&hooks) as Arc<dyn PlatformHooks>,
            cfg,
        ));
        channel.enable_interrupts();
        Harness {
            channel,
            state,
            hooks,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().expect("bus state poisoned")
    }

    /// Next message the host rang the doorbell for, waiting up to
    /// `timeout` for one to appear.
    pub fn take_sent(&self, timeout: Duration) -> Option<SentMsg> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(msg) = self.lock().sent.pop_front() {
                return Some(msg);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// True while the host-side busy bit is still set, meaning the
    /// firmware has not accepted the last message.
    pub fn host_busy(&self) -> bool {
        self.lock().outbox_cmd & CMD_BUSY != 0
    }

    /// Reply to `sent` with `status`, echoing its target and type, and
    /// raise the interrupt. `extension` and `payload` are the reply
    /// body.
    pub fn reply(&self, sent: &SentMsg, status: u32, extension: u32, payload: &[u8]) {
        let mut primary = sent.primary;
        DIRECTION.set(&mut primary, 1);
        REPLY_STATUS.set(&mut primary, status);
        {
            let mut st = self.lock();
            // Firmware accepted the outbound message and signals done.
            st.outbox_cmd &= !CMD_BUSY;
            st.outbox_ext |= CMD_DONE;
            assert!(payload.len() <= st.inbox_cap, "reply payload overrun");
            st.inbox[..payload.len()].copy_from_slice(payload);
            st.inbox_cmd = primary | CMD_BUSY;
            st.inbox_ext = extension;
        }
        self.channel.handle_irq();
    }

    /// Raise a notification of `class` from `core`, with `payload`
    /// staged in the inbound window.
    pub fn notify(&self, class: u32, core: u32, extension: u32, payload: &[u8]) {
        let mut primary = 0u32;
        MSG_TYPE.set(&mut primary, GlobalMsg::Notify as u32);
        NOTIFY_CLASS.set(&mut primary, class);
        NOTIFY_CORE.set(&mut primary, core);
        {
            let mut st = self.lock();
            assert!(payload.len() <= st.inbox_cap, "notification payload overrun");
            st.inbox[..payload.len()].copy_from_slice(payload);
            st.inbox_cmd = primary | CMD_BUSY;
            st.inbox_ext = extension;
        }
        self.channel.handle_irq();
    }

    /// Deliver a raw header as an interrupt, window untouched.
    pub fn deliver(&self, header: IpcHeader) -> bool {
        {
            let mut st = self.lock();
            st.inbox_cmd = header.primary | CMD_BUSY;
            st.inbox_ext = header.extension;
        }
        self.channel.handle_irq()
    }
}

pub fn init_logs() {
    let _ = env_logger::Builder::from_default_env()
        .is_test(true)
        .try_init();
}
