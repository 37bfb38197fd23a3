// CLASSIFICATION: COMMUNITY
// Filename: channel.rs v0.7
// Date Modified: 2026-08-02
// Author: Lukas Bower

//! The IPC channel: transmit scheduling, reply demultiplexing and
//! timeout recovery over one [`MailboxBus`].
//!
//! Three contexts touch the channel: caller threads submitting
//! requests, the platform's interrupt thread driving [`IpcChannel::
//! handle_irq`], and the dispatch worker owned by the channel. All of
//! them serialise on a single scheduler lock owning the bus, the
//! transmit FIFO, the in-flight slot and the recovery bookkeeping.
//! Callers block only on their private completion channel, never on
//! the lock, so a slow caller cannot stall interrupt service.
//!
//! Platform hooks are invoked outside the scheduler lock.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, trace};

use crate::config::IpcConfig;
use crate::error::{IpcError, IpcResult, ReplyStatus};
use crate::header::{
    GlobalMsg, IpcHeader, ModuleMsg, DATA_OFF_SIZE, EXCEPT_CORE, EXCEPT_STACK_SIZE, REPLY_STATUS,
};
use crate::mailbox::{IpcCtl, MailboxBus, MailboxReg, CMD_BUSY, CMD_DONE, INT_IPC};
use crate::notify::{
    module_notify_payload_len, notify_core, ModuleNotification, NotifyClass, ResourceEvent,
    MODULE_NOTIFY_BYTES, RESOURCE_EVENT_BYTES,
};
use crate::queue::{PendingRequest, TxState};
use crate::recovery::{self, RecoveryCtl, RecoveryPhase};
use crate::trace as fwtrace;
use crate::PlatformHooks;

/// Hook invocations collected under the lock, run after release.
enum DeferredHook {
    ClockGatingOff,
    CrashDump { core: u8, stack_bytes: u32 },
    ModuleEvent(ModuleNotification),
}

/// Everything the scheduler lock protects.
struct ChannelInner {
    bus: Box<dyn MailboxBus>,
    tx: TxState,
    recovery: RecoveryCtl,
    clock_gating_disabled: bool,
    hex_limit: usize,
}

impl ChannelInner {
    /// Hand the oldest queued request to the doorbell if the slot and
    /// the hardware are both free. Safe to call from any context.
    fn dispatch_next(&mut self) {
        if !self.tx.can_dispatch() || self.bus.is_busy() {
            return;
        }
        let Some(req) = self.tx.queue.pop_front() else {
            return;
        };
        debug!(
            "ipc tx {:#010x}|{:#010x}",
            req.header.primary, req.header.extension
        );
        if !req.tx.is_empty() {
            debug!("tx payload {}", hex_dump(&req.tx, self.hex_limit));
            self.bus.outbox_write(&req.tx);
        }
        // Extension first; the primary write with the busy bit hands
        // the message over.
        self.bus
            .write_reg(MailboxReg::OutboxExt, req.header.extension);
        self.bus
            .write_reg(MailboxReg::OutboxCmd, req.header.primary | CMD_BUSY);
        self.tx.in_flight = Some(req);
    }
}

/// Latching event flag with wake-up for blocked waiters.
struct EventGate<T: Clone> {
    state: Mutex<GateState<T>>,
}

struct GateState<T> {
    latched: Option<T>,
    waiters: Vec<Sender<T>>,
}

impl<T: Clone> EventGate<T> {
    fn new() -> Self {
        EventGate {
            state: Mutex::new(GateState {
                latched: None,
                waiters: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState<T>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn signal(&self, value: T) {
        let mut st = self.lock();
        st.latched = Some(value.clone());
        for waiter in st.waiters.drain(..) {
            let _ = waiter.try_send(value.clone());
        }
    }

    fn clear(&self) {
        self.lock().latched = None;
    }

    fn is_set(&self) -> bool {
        self.lock().latched.is_some()
    }

    /// Latched value, or block until a signal or the timeout.
    fn wait(&self, timeout: Duration) -> Option<T> {
        let rx = {
            let mut st = self.lock();
            if let Some(value) = &st.latched {
                return Some(value.clone());
            }
            let (tx, rx) = bounded(1);
            st.waiters.push(tx);
            rx
        };
        rx.recv_timeout(timeout).ok()
    }
}

/// Host side of the DSP mailbox transport.
///
/// One channel per coprocessor. Typed request constructors live in
/// [`crate::ops`]; this type carries the transport machinery.
pub struct IpcChannel {
    inner: Arc<Mutex<ChannelInner>>,
    hooks: Arc<dyn PlatformHooks>,
    cfg: IpcConfig,
    stop_tx: Sender<()>,
    worker: Option<JoinHandle<()>>,
    boot_gate: EventGate<()>,
    load_gate: EventGate<IpcResult<()>>,
}

impl IpcChannel {
    /// Build a channel over `bus`. Interrupts stay masked until
    /// [`IpcChannel::enable_interrupts`] is called by platform
    /// bring-up.
    pub fn new(bus: Box<dyn MailboxBus>, hooks: Arc<dyn PlatformHooks>, cfg: IpcConfig) -> Self {
        let inner = Arc::new(Mutex::new(ChannelInner {
            bus,
            tx: TxState::default(),
            recovery: RecoveryCtl::default(),
            clock_gating_disabled: false,
            hex_limit: cfg.hex_dump_limit,
        }));
        let (stop_tx, stop_rx) = unbounded();
        let worker_inner = Arc::clone(&inner);
        let poll = cfg.poll_interval;
        let worker = thread::spawn(move || worker_loop(worker_inner, stop_rx, poll));
        info!("dsp ipc channel up, reply timeout {:?}", cfg.reply_timeout);
        IpcChannel {
            inner,
            hooks,
            cfg,
            stop_tx,
            worker: Some(worker),
            boot_gate: EventGate::new(),
            load_gate: EventGate::new(),
        }
    }

    /// Unmask the doorbell interrupts (busy, done and the master line).
    pub fn enable_interrupts(&self) {
        let mut st = lock_inner(&self.inner);
        st.bus.update_reg(
            MailboxReg::IpcControl,
            IpcCtl::all().bits(),
            IpcCtl::all().bits(),
        );
        st.bus.update_reg(MailboxReg::IntControl, INT_IPC, INT_IPC);
    }

    /// Mask the doorbell interrupts.
    pub fn disable_interrupts(&self) {
        let mut st = lock_inner(&self.inner);
        st.bus.update_reg(MailboxReg::IntControl, INT_IPC, 0);
        st.bus.update_reg(MailboxReg::IpcControl, IpcCtl::all().bits(), 0);
    }

    /// True while the doorbell block has an unserviced interrupt.
    /// Platforms sharing the line use this to route it.
    pub fn irq_pending(&self) -> bool {
        let st = lock_inner(&self.inner);
        st.bus.read_reg(MailboxReg::IntStatus) & INT_IPC != 0
    }

    /// Bytes one outbound message can carry.
    pub fn outbox_capacity(&self) -> usize {
        lock_inner(&self.inner).bus.outbox_size()
    }

    /// Bytes one reply can carry.
    pub fn inbox_capacity(&self) -> usize {
        lock_inner(&self.inner).bus.inbox_size()
    }

    /// True once the firmware-ready notification has been seen.
    pub fn firmware_ready(&self) -> bool {
        self.boot_gate.is_set()
    }

    /// True after a phrase-detection notification disabled clock
    /// gating; the platform re-enables it when streaming starts.
    pub fn clock_gating_disabled(&self) -> bool {
        lock_inner(&self.inner).clock_gating_disabled
    }

    /// Current phase of the timeout-recovery state machine.
    pub fn recovery_phase(&self) -> RecoveryPhase {
        lock_inner(&self.inner).recovery.phase()
    }

    /// Block until the firmware signals ready.
    pub fn wait_firmware_ready(&self, timeout: Duration) -> IpcResult<()> {
        self.boot_gate.wait(timeout).ok_or(IpcError::Timeout)
    }

    /// Block until the outcome of the most recent module-load or
    /// library-load request is known.
    pub fn wait_module_load(&self, timeout: Duration) -> IpcResult<()> {
        match self.load_gate.wait(timeout) {
            Some(result) => result,
            None => Err(IpcError::Timeout),
        }
    }

    /// Forget any previous module-load outcome before a new load is
    /// submitted.
    pub(crate) fn clear_module_load(&self) {
        self.load_gate.clear();
    }

    /// Queue a request and wait for its reply or the timeout.
    pub(crate) fn transact(
        &self,
        header: IpcHeader,
        tx: Vec<u8>,
        rx_limit: usize,
    ) -> IpcResult<Vec<u8>> {
        let (id, done_rx) = {
            let mut st = lock_inner(&self.inner);
            if tx.len() > st.bus.outbox_size() || rx_limit > st.bus.inbox_size() {
                return Err(IpcError::InvalidParameter);
            }
            let id = st.tx.next_id();
            let (done_tx, done_rx) = bounded(1);
            st.recovery.begin_wait();
            st.tx.push(PendingRequest {
                id,
                header,
                tx,
                rx_limit,
                done: Some(done_tx),
            });
            st.dispatch_next();
            (id, done_rx)
        };
        match done_rx.recv_timeout(self.cfg.reply_timeout) {
            Ok(result) => {
                lock_inner(&self.inner).recovery.end_wait();
                result
            }
            Err(_) => self.reply_timed_out(id, &done_rx),
        }
    }

    /// Queue a request nobody will wait for. The reply still frees the
    /// in-flight slot when it arrives.
    pub(crate) fn send_nowait(&self, header: IpcHeader, tx: Vec<u8>) -> IpcResult<()> {
        let mut st = lock_inner(&self.inner);
        if tx.len() > st.bus.outbox_size() {
            return Err(IpcError::InvalidParameter);
        }
        let id = st.tx.next_id();
        st.tx.push(PendingRequest {
            id,
            header,
            tx,
            rx_limit: 0,
            done: None,
        });
        st.dispatch_next();
        Ok(())
    }

    fn reply_timed_out(
        &self,
        id: u64,
        done_rx: &Receiver<IpcResult<Vec<u8>>>,
    ) -> IpcResult<Vec<u8>> {
        let claimed = {
            let mut st = lock_inner(&self.inner);
            st.recovery.end_wait();
            if !st.tx.remove(id) {
                // The reply landed between the timeout firing and us
                // taking the lock; return it instead of restarting the
                // firmware.
                if let Ok(result) = done_rx.try_recv() {
                    return result;
                }
            }
            let claimed = st.recovery.claim();
            st.dispatch_next();
            claimed
        };
        if claimed {
            // The restart invalidates any earlier ready latch.
            self.boot_gate.clear();
            recovery::run(self.hooks.as_ref());
            lock_inner(&self.inner).recovery.release();
        } else {
            debug!("request {id} abandoned while recovery already running");
        }
        Err(IpcError::Timeout)
    }

    /// Service one doorbell interrupt.
    ///
    /// Called from the platform's interrupt thread after its hard
    /// handler masked the IPC line; the line is re-enabled here once
    /// the inbound doorbell has been handed back. Returns true when
    /// either doorbell had work.
    pub fn handle_irq(&self) -> bool {
        let mut serviced = false;
        let mut deferred: Vec<DeferredHook> = Vec::new();
        {
            let mut st = lock_inner(&self.inner);

            let outbox_ext = st.bus.read_reg(MailboxReg::OutboxExt);
            if outbox_ext & CMD_DONE != 0 {
                // Done handshake: mask the done interrupt, clear the
                // bit, unmask.
                st.bus
                    .update_reg(MailboxReg::IpcControl, IpcCtl::DONE.bits(), 0);
                st.bus.update_reg(MailboxReg::OutboxExt, CMD_DONE, 0);
                st.bus.update_reg(
                    MailboxReg::IpcControl,
                    IpcCtl::DONE.bits(),
                    IpcCtl::DONE.bits(),
                );
                serviced = true;
            }

            let inbox_cmd = st.bus.read_reg(MailboxReg::InboxCmd);
            if inbox_cmd & CMD_BUSY != 0 {
                let header = IpcHeader {
                    primary: inbox_cmd,
                    extension: st.bus.read_reg(MailboxReg::InboxExt),
                };
                if header.is_reply() {
                    self.process_reply(&mut st, header);
                } else {
                    self.process_notification(&mut st, header, &mut deferred);
                }
                // Hand the inbound doorbell back and re-enable the
                // line.
                st.bus.update_reg(MailboxReg::InboxCmd, CMD_BUSY, 0);
                st.bus.update_reg(MailboxReg::IntControl, INT_IPC, INT_IPC);
                serviced = true;
            }

            st.dispatch_next();
        }
        for hook in deferred {
            self.run_hook(hook);
        }
        serviced
    }

    fn process_reply(&self, st: &mut ChannelInner, header: IpcHeader) {
        let Some(mut req) = st.tx.in_flight.take() else {
            error!(
                "reply {:#010x}|{:#010x} arrived with nothing in flight",
                header.primary, header.extension
            );
            return;
        };
        let status = ReplyStatus::from_wire(REPLY_STATUS.get(header.primary));
        let result = if status.is_success() {
            let mut take = req.rx_limit;
            if header.replies_to_module(ModuleMsg::LargeConfigGet) {
                // The firmware reports the block size it actually
                // produced.
                take = (DATA_OFF_SIZE.get(header.extension) as usize).min(req.rx_limit);
            }
            take = take.min(st.bus.inbox_size());
            let mut data = vec![0u8; take];
            if take > 0 {
                st.bus.inbox_read(&mut data);
                debug!("rx payload {}", hex_dump(&data, st.hex_limit));
            }
            debug!("ipc reply {:#010x}: success", header.primary);
            Ok(data)
        } else {
            error!("ipc reply {:#010x}: {status}", header.primary);
            Err(IpcError::from_status(status))
        };
        if header.replies_to_global(GlobalMsg::LoadMultipleModules)
            || header.replies_to_global(GlobalMsg::LoadLibrary)
        {
            self.load_gate
                .signal(result.as_ref().map(|_| ()).map_err(|e| e.clone()));
        }
        match req.done.take() {
            Some(done) => {
                // A caller that already timed out dropped its receiver;
                // the failed send is deliberate silence.
                let _ = done.try_send(result);
            }
            None => debug!("no-wait request {:#010x} completed", header.primary),
        }
    }

    fn process_notification(
        &self,
        st: &mut ChannelInner,
        header: IpcHeader,
        deferred: &mut Vec<DeferredHook>,
    ) {
        let class = NotifyClass::from_header(&header);
        match class {
            NotifyClass::Underrun => error!("firmware reported gateway underrun"),
            NotifyClass::ResourceEvent => {
                if st.bus.inbox_size() < RESOURCE_EVENT_BYTES {
                    error!("inbound window too small for a resource event");
                    return;
                }
                let mut bytes = [0u8; RESOURCE_EVENT_BYTES];
                st.bus.inbox_read(&mut bytes);
                let event = ResourceEvent::parse(&bytes);
                error!(
                    "resource event: {} (resource type {} id {})",
                    event.event_name(),
                    event.resource_type,
                    event.resource_id
                );
            }
            NotifyClass::FwReady => {
                info!("firmware ready");
                self.boot_gate.signal(());
            }
            NotifyClass::LogBufferStatus => {
                let core = notify_core(&header);
                let mut drained = None;
                let present = st
                    .bus
                    .with_trace_window(core, &mut |window| drained = fwtrace::drain(window));
                if !present {
                    error!("trace notification for unknown core {core}");
                } else if let Some(bytes) = drained {
                    trace!("core{core} fw log: {}", String::from_utf8_lossy(&bytes));
                }
            }
            NotifyClass::PhraseDetected => {
                info!("voice phrase detected, disabling clock gating");
                st.clock_gating_disabled = true;
                deferred.push(DeferredHook::ClockGatingOff);
            }
            NotifyClass::ExceptionCaught => {
                let core = EXCEPT_CORE.get(header.extension) as u8;
                let stack_bytes = EXCEPT_STACK_SIZE.get(header.extension);
                error!("coprocessor exception on core {core}, stack {stack_bytes} bytes");
                deferred.push(DeferredHook::CrashDump { core, stack_bytes });
            }
            NotifyClass::ModuleNotification => {
                if st.bus.inbox_size() < MODULE_NOTIFY_BYTES {
                    error!("inbound window too small for a module notification");
                    return;
                }
                let mut head = [0u8; MODULE_NOTIFY_BYTES];
                st.bus.inbox_read(&mut head);
                let payload_len = module_notify_payload_len(&head);
                let total = MODULE_NOTIFY_BYTES + payload_len;
                if total > st.bus.inbox_size() {
                    // Declared length is firmware-controlled input;
                    // never allocate past the window it writes through.
                    error!(
                        "module notification claims {payload_len} payload bytes, window holds {}",
                        st.bus.inbox_size() - MODULE_NOTIFY_BYTES
                    );
                    return;
                }
                let mut record = vec![0u8; total];
                st.bus.inbox_read(&mut record);
                deferred.push(DeferredHook::ModuleEvent(ModuleNotification::parse(
                    &record,
                )));
            }
            NotifyClass::Glitch
            | NotifyClass::Overrun
            | NotifyClass::EndStream
            | NotifyClass::TimestampCaptured
            | NotifyClass::AudioClassifierResult
            | NotifyClass::Unknown(_) => {
                error!("unhandled notification {class:?} ({:#010x})", header.primary);
            }
        }
    }

    fn run_hook(&self, hook: DeferredHook) {
        match hook {
            DeferredHook::ClockGatingOff => self.hooks.enable_clock_gating(false),
            DeferredHook::CrashDump { core, stack_bytes } => {
                if let Err(err) = self.hooks.read_crash_dump(core, stack_bytes) {
                    error!("crash dump for core {core} failed: {err}");
                }
            }
            DeferredHook::ModuleEvent(event) => self.hooks.module_notification(event),
        }
    }
}

impl Drop for IpcChannel {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        let mut st = lock_inner(&self.inner);
        st.bus.update_reg(MailboxReg::IntControl, INT_IPC, 0);
        st.bus.update_reg(MailboxReg::IpcControl, IpcCtl::all().bits(), 0);
    }
}

fn lock_inner(inner: &Mutex<ChannelInner>) -> MutexGuard<'_, ChannelInner> {
    match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Deferred-retry context: wakes on the poll interval to hand the next
/// queued request to the doorbell once the hardware is free again, and
/// exits when the channel drops.
fn worker_loop(inner: Arc<Mutex<ChannelInner>>, stop_rx: Receiver<()>, poll: Duration) {
    loop {
        match stop_rx.recv_timeout(poll) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                lock_inner(&inner).dispatch_next();
            }
        }
    }
}

fn hex_dump(data: &[u8], limit: usize) -> String {
    if data.len() <= limit {
        hex::encode(data)
    } else {
        format!("{}.. ({} bytes)", hex::encode(&data[..limit]), data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_latches_and_wakes() {
        let gate = Arc::new(EventGate::new());
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.wait(Duration::from_secs(2)))
        };
        // Give the waiter time to park.
        thread::sleep(Duration::from_millis(20));
        gate.signal(7u32);
        assert_eq!(waiter.join().unwrap(), Some(7));
        // Latched: immediate.
        assert_eq!(gate.wait(Duration::from_millis(1)), Some(7));
        gate.clear();
        assert!(!gate.is_set());
        assert_eq!(gate.wait(Duration::from_millis(10)), None);
    }

    #[test]
    fn gate_timeout_returns_none() {
        let gate: EventGate<()> = EventGate::new();
        assert_eq!(gate.wait(Duration::from_millis(10)), None);
    }

    #[test]
    fn hex_dump_truncates() {
        assert_eq!(hex_dump(&[0xAB, 0xCD], 8), "abcd");
        let long = vec![0u8; 10];
        assert_eq!(hex_dump(&long, 4), "00000000.. (10 bytes)");
    }
}
