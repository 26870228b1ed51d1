//! Photon-counter acquisition settings.
//!
//! Gate times are restricted to the fixed literals the counting unit
//! supports; each maps onto a vendor gate code.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Supported gate-time literals, in increasing order.
const GATE_TIMES: [(&str, u64, u8); 17] = [
    ("50us", 50, 0x02),
    ("100us", 100, 0x03),
    ("200us", 200, 0x04),
    ("500us", 500, 0x05),
    ("1ms", 1_000, 0x06),
    ("2ms", 2_000, 0x07),
    ("5ms", 5_000, 0x08),
    ("10ms", 10_000, 0x09),
    ("20ms", 20_000, 0x0A),
    ("50ms", 50_000, 0x0B),
    ("100ms", 100_000, 0x0C),
    ("200ms", 200_000, 0x0D),
    ("500ms", 500_000, 0x0E),
    ("1s", 1_000_000, 0x0F),
    ("2s", 2_000_000, 0x10),
    ("5s", 5_000_000, 0x11),
    ("10s", 10_000_000, 0x12),
];

/// One of the fixed gate times of the counting unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GateTime(usize);

impl GateTime {
    /// The vendor code selecting this gate time.
    #[must_use]
    pub fn code(self) -> u8 {
        GATE_TIMES[self.0].2
    }

    /// Gate duration.
    #[must_use]
    pub fn duration(self) -> Duration {
        Duration::from_micros(GATE_TIMES[self.0].1)
    }

    /// The configuration literal (e.g. `"1ms"`).
    #[must_use]
    pub fn literal(self) -> &'static str {
        GATE_TIMES[self.0].0
    }
}

impl FromStr for GateTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['µ', 'μ'], "u");
        GATE_TIMES
            .iter()
            .position(|(literal, _, _)| *literal == normalized)
            .map(Self)
            .ok_or_else(|| {
                let allowed: Vec<&str> = GATE_TIMES.iter().map(|(l, _, _)| *l).collect();
                format!("unsupported gate time `{s}`, expected one of {allowed:?}")
            })
    }
}

impl std::fmt::Display for GateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.literal())
    }
}

/// How counts are transferred from the counting unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferType {
    SingleTransfer,
    BlockTransfer,
}

impl TransferType {
    /// Vendor transfer-mode code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::SingleTransfer => 1,
            Self::BlockTransfer => 2,
        }
    }
}

/// What starts a counting run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Software,
    External,
}

impl TriggerType {
    /// Vendor trigger-mode code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Software => 0,
            Self::External => 1,
        }
    }
}

/// Everything the counting unit needs for one acquisition cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSettings {
    pub gate_time: GateTime,
    pub transfer_type: TransferType,
    pub trigger_type: TriggerType,
    pub number_of_gates: u16,
}
