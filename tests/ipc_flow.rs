// CLASSIFICATION: COMMUNITY
// Filename: tests/ipc_flow.rs v0.4
// Date Modified: 2026-08-10
// Author: Lukas Bower

//! End-to-end transport behaviour over a scripted doorbell block:
//! round trips, the single-in-flight discipline, notification
//! interleaving, desynchronised replies and timeout recovery.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serial_test::serial;

use cohesix_adsp::header::{
    GlobalMsg, IpcHeader, ModuleMsg, DIRECTION, EXCEPT_CORE, EXCEPT_STACK_SIZE, INSTANCE_ID,
    LOAD_MODULE_COUNT, MSG_TYPE, PPL_LP_MODE, PPL_MEM_SIZE, PPL_STATE, PPL_TYPE, TARGET,
};
use cohesix_adsp::{IpcConfig, IpcError, PipelineState, ReplyStatus};

use common::{Harness, HookCall};

const SEND_WAIT: Duration = Duration::from_secs(2);

#[test]
fn create_pipeline_round_trip() {
    let h = Harness::new();
    let channel = Arc::clone(&h.channel);
    let caller = thread::spawn(move || channel.create_pipeline(0x180, 6, 3, true));

    let sent = h.take_sent(SEND_WAIT).expect("request not dispatched");
    assert_eq!(TARGET.get(sent.primary), 0);
    assert_eq!(MSG_TYPE.get(sent.primary), GlobalMsg::CreatePipeline as u32);
    assert_eq!(INSTANCE_ID.get(sent.primary), 3);
    assert_eq!(PPL_TYPE.get(sent.primary), 6);
    assert_eq!(PPL_MEM_SIZE.get(sent.primary), 0x180);
    assert_eq!(PPL_LP_MODE.get(sent.extension), 1);
    assert!(sent.payload.is_empty());
    assert!(h.host_busy());

    h.reply(&sent, ReplyStatus::Success.to_wire(), 0, &[]);
    assert!(!h.host_busy());
    caller.join().unwrap().expect("round trip failed");
}

#[test]
#[serial]
fn second_request_waits_for_first_reply() {
    let h = Harness::new();
    let first = {
        let channel = Arc::clone(&h.channel);
        thread::spawn(move || channel.set_pipeline_state(1, PipelineState::Running))
    };
    let sent_first = h.take_sent(SEND_WAIT).expect("first not dispatched");
    assert_eq!(
        MSG_TYPE.get(sent_first.primary),
        GlobalMsg::SetPipelineState as u32
    );
    assert_eq!(PPL_STATE.get(sent_first.primary), PipelineState::Running as u32);

    let second = {
        let channel = Arc::clone(&h.channel);
        thread::spawn(move || channel.delete_pipeline(1))
    };
    // The slot is occupied; nothing else may ring the doorbell.
    assert!(h.take_sent(Duration::from_millis(100)).is_none());

    h.reply(&sent_first, 0, 0, &[]);
    first.join().unwrap().expect("first round trip failed");

    let sent_second = h.take_sent(SEND_WAIT).expect("second not dispatched");
    assert_eq!(
        MSG_TYPE.get(sent_second.primary),
        GlobalMsg::DeletePipeline as u32
    );
    h.reply(&sent_second, 0, 0, &[]);
    second.join().unwrap().expect("second round trip failed");
}

#[test]
fn firmware_status_maps_to_typed_errors() {
    let h = Harness::new();
    let cases = [
        (ReplyStatus::OutOfMemory, IpcError::OutOfMemory),
        (ReplyStatus::Busy, IpcError::Busy),
        (
            ReplyStatus::PipelineNotExist,
            IpcError::InvalidRequest {
                status: ReplyStatus::PipelineNotExist,
            },
        ),
    ];
    for (status, expected) in cases {
        let channel = Arc::clone(&h.channel);
        let caller = thread::spawn(move || channel.delete_pipeline(9));
        let sent = h.take_sent(SEND_WAIT).expect("request not dispatched");
        h.reply(&sent, status.to_wire(), 0, &[]);
        assert_eq!(caller.join().unwrap(), Err(expected));
    }
}

#[test]
fn notification_interleaves_without_stealing_the_reply() {
    let h = Harness::new();
    assert!(!h.channel.firmware_ready());
    let channel = Arc::clone(&h.channel);
    let caller = thread::spawn(move || channel.restore_pipeline(2));
    let sent = h.take_sent(SEND_WAIT).expect("request not dispatched");

    // Firmware-ready arrives while the request is still in flight.
    h.notify(8, 0, 0, &[]);
    assert!(h.channel.firmware_ready());
    h.channel
        .wait_firmware_ready(Duration::from_millis(10))
        .expect("ready latch lost");

    h.reply(&sent, 0, 0, &[]);
    caller.join().unwrap().expect("reply was misrouted");
}

#[test]
fn get_pipeline_state_decodes_reply_dword() {
    let h = Harness::new();
    let channel = Arc::clone(&h.channel);
    let caller = thread::spawn(move || channel.get_pipeline_state(4));
    let sent = h.take_sent(SEND_WAIT).expect("request not dispatched");
    h.reply(&sent, 0, 0, &(PipelineState::Paused as u32).to_le_bytes());
    assert_eq!(caller.join().unwrap(), Ok(PipelineState::Paused));
}

#[test]
fn desynchronised_reply_is_dropped_not_fatal() {
    let h = Harness::new();
    let mut primary = 0u32;
    DIRECTION.set(&mut primary, 1);
    MSG_TYPE.set(&mut primary, GlobalMsg::SetPipelineState as u32);
    assert!(h.deliver(IpcHeader {
        primary,
        extension: 0,
    }));

    // The channel still works afterwards.
    let channel = Arc::clone(&h.channel);
    let caller = thread::spawn(move || channel.delete_pipeline(0));
    let sent = h.take_sent(SEND_WAIT).expect("request not dispatched");
    h.reply(&sent, 0, 0, &[]);
    caller.join().unwrap().expect("round trip failed");
}

#[test]
#[serial]
fn timeout_runs_recovery_exactly_once() {
    let cfg = IpcConfig {
        reply_timeout: Duration::from_millis(80),
        ..IpcConfig::default()
    };
    let h = Harness::with(64, 64, cfg);
    h.notify(8, 0, 0, &[]);
    assert!(h.channel.firmware_ready());
    let channel = Arc::clone(&h.channel);
    let caller = thread::spawn(move || channel.create_pipeline(1, 1, 1, false));
    let _sent = h.take_sent(SEND_WAIT).expect("request not dispatched");

    // Never reply.
    assert_eq!(caller.join().unwrap(), Err(IpcError::Timeout));
    assert_eq!(
        h.hooks.calls(),
        vec![
            HookCall::ClockGating(false),
            HookCall::PowerGating(false),
            HookCall::Reinit,
            HookCall::ClockGating(true),
            HookCall::PowerGating(true),
        ]
    );
    // The restart invalidated the ready latch.
    assert!(!h.channel.firmware_ready());
}

#[test]
fn phrase_detection_disables_clock_gating() {
    let h = Harness::new();
    assert!(!h.channel.clock_gating_disabled());
    h.notify(4, 0, 0, &[]);
    assert!(h.channel.clock_gating_disabled());
    assert_eq!(h.hooks.calls(), vec![HookCall::ClockGating(false)]);
}

#[test]
fn core_exception_requests_a_crash_dump() {
    let h = Harness::new();
    let mut extension = 0u32;
    EXCEPT_CORE.set(&mut extension, 1);
    EXCEPT_STACK_SIZE.set(&mut extension, 0x2000);
    h.notify(10, 0, extension, &[]);
    assert_eq!(
        h.hooks.calls(),
        vec![HookCall::CrashDump {
            core: 1,
            stack_bytes: 0x2000,
        }]
    );
}

#[test]
fn module_notification_reaches_the_platform() {
    let h = Harness::new();
    let mut record = Vec::new();
    record.extend_from_slice(&((0x0102u32 << 16) | 0x0304).to_le_bytes());
    record.extend_from_slice(&9u32.to_le_bytes());
    record.extend_from_slice(&4u32.to_le_bytes());
    record.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    h.notify(12, 0, 0, &record);

    let calls = h.hooks.calls();
    assert_eq!(calls.len(), 1);
    let HookCall::ModuleEvent(event) = &calls[0] else {
        panic!("unexpected hook call {calls:?}");
    };
    assert_eq!(event.module_id, 0x0102);
    assert_eq!(event.instance_id, 0x0304);
    assert_eq!(event.event_id, 9);
    assert_eq!(event.payload, vec![0xDE, 0xAD, 0xBE, 0xEF]);
}

#[test]
fn oversized_module_notification_is_rejected() {
    let h = Harness::new();
    let mut record = Vec::new();
    record.extend_from_slice(&0u32.to_le_bytes());
    record.extend_from_slice(&1u32.to_le_bytes());
    // Declared payload larger than the inbound window can hold.
    record.extend_from_slice(&4096u32.to_le_bytes());
    h.notify(12, 0, 0, &record);
    assert!(h.hooks.calls().is_empty());
}

#[test]
fn trace_ring_wraparound_drains_to_write_cursor() {
    let h = Harness::new();
    {
        // 16-byte data area, writer wrapped: read=12, write=3.
        let mut window = Vec::new();
        window.extend_from_slice(&12u32.to_le_bytes());
        window.extend_from_slice(&3u32.to_le_bytes());
        let mut data = [0u8; 16];
        data[12..16].copy_from_slice(b"tail");
        data[0..3].copy_from_slice(b"hed");
        window.extend_from_slice(&data);
        h.state.lock().unwrap().trace.insert(2, window);
    }
    h.notify(6, 2, 0, &[]);
    let state = h.state.lock().unwrap();
    let window = &state.trace[&2];
    // Read cursor caught up with write.
    assert_eq!(&window[0..4], &3u32.to_le_bytes());
    assert_eq!(&window[4..8], &3u32.to_le_bytes());
}

#[test]
fn module_load_latches_through_the_gate() {
    let h = Harness::new();
    h.channel
        .load_modules(&[0x0201, 0x0403])
        .expect("submit failed");
    let sent = h.take_sent(SEND_WAIT).expect("load not dispatched");
    assert_eq!(
        MSG_TYPE.get(sent.primary),
        GlobalMsg::LoadMultipleModules as u32
    );
    assert_eq!(LOAD_MODULE_COUNT.get(sent.primary), 2);
    assert_eq!(sent.payload, vec![1, 2, 3, 4]);

    h.reply(&sent, 0, 0, &[]);
    h.channel
        .wait_module_load(Duration::from_secs(1))
        .expect("load outcome never latched");
}

#[test]
fn d0ix_is_fire_and_forget() {
    let h = Harness::new();
    h.channel
        .set_d0ix(&cohesix_adsp::D0ix {
            module_id: 5,
            instance_id: 0,
            wake: true,
            streaming: false,
        })
        .expect("submit failed");
    let sent = h.take_sent(SEND_WAIT).expect("d0ix not dispatched");
    assert_eq!(MSG_TYPE.get(sent.primary), ModuleMsg::SetD0ix as u32);
    assert_eq!(sent.extension & 0b11, 0b01);
    // The reply only frees the slot; nobody waits on it.
    h.reply(&sent, 0, 0, &[]);
}
