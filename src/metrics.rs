//! Process-wide outcome counters.
//! Observability only: nothing in the control path reads these back.
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::events::{Channel, Event};

static FRAMES_DECODED: AtomicU64 = AtomicU64::new(0);
static DECODE_FAILURES: AtomicU64 = AtomicU64::new(0);
static RX_FAILURES: AtomicU64 = AtomicU64::new(0);
static SMS_OK: AtomicU64 = AtomicU64::new(0);
static SMS_FAILED: AtomicU64 = AtomicU64::new(0);
static PUBLISH_OK: AtomicU64 = AtomicU64::new(0);
static PUBLISH_FAILED: AtomicU64 = AtomicU64::new(0);
static MODEM_RESETS: AtomicU64 = AtomicU64::new(0);
static INIT_FATAL: AtomicU64 = AtomicU64::new(0);
static DEVICE_RESETS: AtomicU64 = AtomicU64::new(0);
static TRANSACTIONS: AtomicU64 = AtomicU64::new(0);
static TRANSACTION_TIMEOUTS: AtomicU64 = AtomicU64::new(0);
static TRANSACTION_LATENCY_SUM_MS: AtomicU64 = AtomicU64::new(0);

pub fn record_event(event: Event) {
    let counter = match event {
        Event::RadioDecodeOk => &FRAMES_DECODED,
        Event::RadioDecodeFail => &DECODE_FAILURES,
        Event::RadioRxFail => &RX_FAILURES,
        Event::RelayOk(Channel::Sms) => &SMS_OK,
        Event::RelayFail(Channel::Sms) => &SMS_FAILED,
        Event::RelayOk(Channel::Publish) => &PUBLISH_OK,
        Event::RelayFail(Channel::Publish) => &PUBLISH_FAILED,
        Event::ModemResetAttempted => &MODEM_RESETS,
        Event::InitFatal => &INIT_FATAL,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

/// One AT transaction finished; `terminated` is false when it ran out the deadline.
pub fn observe_transaction(elapsed: Duration, terminated: bool) {
    TRANSACTIONS.fetch_add(1, Ordering::Relaxed);
    TRANSACTION_LATENCY_SUM_MS.fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    if !terminated {
        TRANSACTION_TIMEOUTS.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn inc_device_resets() {
    DEVICE_RESETS.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub frames_decoded: u64,
    pub decode_failures: u64,
    pub rx_failures: u64,
    pub sms_ok: u64,
    pub sms_failed: u64,
    pub publish_ok: u64,
    pub publish_failed: u64,
    pub modem_resets: u64,
    pub init_fatal: u64,
    pub device_resets: u64,
    pub transactions: u64,
    pub transaction_timeouts: u64,
    pub transaction_latency_avg_ms: Option<u64>,
}

pub fn snapshot() -> Snapshot {
    let transactions = TRANSACTIONS.load(Ordering::Relaxed);
    let latency_sum = TRANSACTION_LATENCY_SUM_MS.load(Ordering::Relaxed);
    Snapshot {
        frames_decoded: FRAMES_DECODED.load(Ordering::Relaxed),
        decode_failures: DECODE_FAILURES.load(Ordering::Relaxed),
        rx_failures: RX_FAILURES.load(Ordering::Relaxed),
        sms_ok: SMS_OK.load(Ordering::Relaxed),
        sms_failed: SMS_FAILED.load(Ordering::Relaxed),
        publish_ok: PUBLISH_OK.load(Ordering::Relaxed),
        publish_failed: PUBLISH_FAILED.load(Ordering::Relaxed),
        modem_resets: MODEM_RESETS.load(Ordering::Relaxed),
        init_fatal: INIT_FATAL.load(Ordering::Relaxed),
        device_resets: DEVICE_RESETS.load(Ordering::Relaxed),
        transactions,
        transaction_timeouts: TRANSACTION_TIMEOUTS.load(Ordering::Relaxed),
        transaction_latency_avg_ms: if transactions > 0 {
            Some(latency_sum / transactions)
        } else {
            None
        },
    }
}
