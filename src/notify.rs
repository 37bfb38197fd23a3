// CLASSIFICATION: COMMUNITY
// Filename: notify.rs v0.4
// Date Modified: 2026-07-18
// Author: Lukas Bower

//! Classification and payload parsing for firmware notifications.
//!
//! Notifications arrive on the inbound doorbell with the direction bit
//! clear. The class field selects the handler; payload-bearing classes
//! read their record from the inbound window. Parsing here is pure;
//! the channel owns all window reads.

use crate::header::{IpcHeader, NOTIFY_CLASS, NOTIFY_CORE};

/// Notification classes reported by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyClass {
    /// Processing glitch on a pipeline.
    Glitch,
    /// Gateway overrun.
    Overrun,
    /// Gateway underrun.
    Underrun,
    /// Stream reached end of data.
    EndStream,
    /// Voice trigger phrase detected.
    PhraseDetected,
    /// Resource event record available in the inbound window.
    ResourceEvent,
    /// Trace ring of some core has data to drain.
    LogBufferStatus,
    /// Timestamp capture completed.
    TimestampCaptured,
    /// Firmware finished booting.
    FwReady,
    /// Audio classifier produced a result.
    AudioClassifierResult,
    /// A core took an exception; details in the extension word.
    ExceptionCaught,
    /// Module-defined event record available in the inbound window.
    ModuleNotification,
    /// Class value this crate does not know about.
    Unknown(u8),
}

impl NotifyClass {
    /// Decode the class field of a notification header.
    pub fn from_header(header: &IpcHeader) -> Self {
        match NOTIFY_CLASS.get(header.primary) {
            0 => NotifyClass::Glitch,
            1 => NotifyClass::Overrun,
            2 => NotifyClass::Underrun,
            3 => NotifyClass::EndStream,
            4 => NotifyClass::PhraseDetected,
            5 => NotifyClass::ResourceEvent,
            6 => NotifyClass::LogBufferStatus,
            7 => NotifyClass::TimestampCaptured,
            8 => NotifyClass::FwReady,
            9 => NotifyClass::AudioClassifierResult,
            10 => NotifyClass::ExceptionCaught,
            12 => NotifyClass::ModuleNotification,
            other => NotifyClass::Unknown(other as u8),
        }
    }
}

/// Originating core of a notification.
pub fn notify_core(header: &IpcHeader) -> u8 {
    NOTIFY_CORE.get(header.primary) as u8
}

/// Size of a resource event record in the inbound window.
pub const RESOURCE_EVENT_BYTES: usize = 36;

/// Resource event record, reported for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceEvent {
    /// Kind of resource the event concerns.
    pub resource_type: u32,
    /// Firmware id of the resource.
    pub resource_id: u32,
    /// Event type, see [`ResourceEvent::event_name`].
    pub event_type: u32,
    /// Event-specific words.
    pub event_data: [u32; 6],
}

impl ResourceEvent {
    /// Parse the little-endian record read from the inbound window.
    pub fn parse(bytes: &[u8; RESOURCE_EVENT_BYTES]) -> Self {
        let word = |i: usize| {
            u32::from_le_bytes([bytes[4 * i], bytes[4 * i + 1], bytes[4 * i + 2], bytes[4 * i + 3]])
        };
        let mut event_data = [0u32; 6];
        for (i, slot) in event_data.iter_mut().enumerate() {
            *slot = word(3 + i);
        }
        ResourceEvent {
            resource_type: word(0),
            resource_id: word(1),
            event_type: word(2),
            event_data,
        }
    }

    /// Human-readable category of the event type.
    pub fn event_name(&self) -> &'static str {
        match self.event_type {
            0 => "budget violation",
            1 => "mixer underrun detected",
            2 => "stream data segment",
            3 => "process data error",
            4 => "stack overflow",
            5 => "buffering mode changed",
            6 => "gateway underrun detected",
            7 => "gateway overrun detected",
            8 => "edf domain unstable",
            9 => "wall-clock sample count",
            10 => "gateway high threshold reached",
            11 => "gateway low threshold reached",
            12 => "i2s bit-count error",
            13 => "i2s clock state changed",
            14 => "i2s sink mode changed",
            15 => "i2s source mode changed",
            16 => "sre drift too high",
            _ => "invalid resource event",
        }
    }
}

/// Fixed part of a module notification record in the inbound window.
pub const MODULE_NOTIFY_BYTES: usize = 12;

/// Module-defined event forwarded to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleNotification {
    /// Module that raised the event.
    pub module_id: u16,
    /// Instance that raised the event.
    pub instance_id: u16,
    /// Module-defined event id.
    pub event_id: u32,
    /// Module-defined payload bytes.
    pub payload: Vec<u8>,
}

/// Declared payload length of a module notification record, before the
/// full record is read. Used to bound the read against the inbound
/// window.
pub(crate) fn module_notify_payload_len(head: &[u8; MODULE_NOTIFY_BYTES]) -> usize {
    u32::from_le_bytes([head[8], head[9], head[10], head[11]]) as usize
}

impl ModuleNotification {
    /// Parse a full record (fixed part plus payload).
    pub(crate) fn parse(record: &[u8]) -> Self {
        let unique_id =
            u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        let event_id = u32::from_le_bytes([record[4], record[5], record[6], record[7]]);
        ModuleNotification {
            module_id: (unique_id >> 16) as u16,
            instance_id: (unique_id & 0xFFFF) as u16,
            event_id,
            payload: record[MODULE_NOTIFY_BYTES..].to_vec(),
        }
    }
}
