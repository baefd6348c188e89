// Copyright 2026 Jeff Kent <jeff@jkent.net>
// Dual licensed under the Apache 2.0 and MIT licenses.

//! Software model of a JTAG target for tests.
//!
//! `SimTarget` stands in for real hardware behind the [`JtagPins`] seam: it
//! walks the IEEE 1149.1 state graph from the TMS level on each rising TCK
//! edge, shifts its IR/DR registers, and records the TMS/TDI levels of every
//! clock so tests can assert exact wire traces. The data register presented
//! on capture is configurable; loading the AVR OCD instruction switches the
//! data path to a small model of the on-chip debug registers.

use crate::bulk::{AVR_OCD_CTRLSTATUS, AVR_OCD_OCDR, IR_AVR_OCD};
use crate::packet::PacketSink;
use crate::pins::JtagPins;
use crate::tap::TapState;
use crate::usb::ControlPipe;

const IR_LEN: usize = 4;

pub struct SimTarget {
    state: TapState,
    tck: bool,
    tms: bool,
    tdi: bool,
    pub attached: bool,

    ir: u32,
    dr_len: usize,
    dr_value: u64,

    // Active shift register plus the raw TDI bits of the current scan.
    shreg: u64,
    shreg_len: usize,
    in_bits: u64,
    nbits: usize,

    ocd_select: u8,
    pub ocd_status: u16,
    pub ocdr: u16,

    /// Last committed DR scan as (bits LSB-first, bit count).
    pub updated_dr: Option<(u64, usize)>,
    /// Total rising TCK edges seen.
    pub edges: usize,
    /// (TMS, TDI) at each rising edge since the last `clear_trace`.
    pub trace: Vec<(bool, bool)>,
}

impl SimTarget {
    pub fn new() -> Self {
        // A lone device in BYPASS: a one-bit register capturing zero.
        Self::with_dr(1, 0)
    }

    pub fn with_dr(dr_len: usize, dr_value: u64) -> Self {
        SimTarget {
            state: TapState::RunIdle,
            tck: false,
            tms: false,
            tdi: false,
            attached: false,
            ir: 0xf,
            dr_len,
            dr_value,
            shreg: 0,
            shreg_len: 1,
            in_bits: 0,
            nbits: 0,
            ocd_select: 0,
            ocd_status: 0,
            ocdr: 0,
            updated_dr: None,
            edges: 0,
            trace: Vec::new(),
        }
    }

    pub fn state(&self) -> TapState {
        self.state
    }

    pub fn ir(&self) -> u32 {
        self.ir
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    pub fn tms_trace(&self) -> Vec<bool> {
        self.trace.iter().map(|&(tms, _)| tms).collect()
    }

    pub fn tdi_trace(&self) -> Vec<bool> {
        self.trace.iter().map(|&(_, tdi)| tdi).collect()
    }

    fn dr_capture(&self) -> (u64, usize) {
        if self.ir == IR_AVR_OCD {
            let value = match self.ocd_select as u32 {
                AVR_OCD_CTRLSTATUS => self.ocd_status as u64,
                AVR_OCD_OCDR => self.ocdr as u64,
                _ => 0,
            };
            (value, 16)
        } else {
            (self.dr_value, self.dr_len)
        }
    }

    fn dr_update(&mut self) {
        if self.ir == IR_AVR_OCD {
            if self.nbits == 5 {
                self.ocd_select = (self.in_bits & 0x1f) as u8;
            } else if self.nbits == 16 {
                match self.ocd_select as u32 {
                    AVR_OCD_OCDR => self.ocdr = self.in_bits as u16,
                    AVR_OCD_CTRLSTATUS => self.ocd_status = self.in_bits as u16,
                    _ => {}
                }
            }
        }
        self.updated_dr = Some((self.in_bits, self.nbits));
    }

    fn rising_edge(&mut self) {
        self.edges += 1;
        self.trace.push((self.tms, self.tdi));

        // A Shift state shifts on every rising edge, including the one that
        // exits into Exit1.
        if self.state == TapState::DrShift || self.state == TapState::IrShift {
            self.shreg >>= 1;
            if self.tdi {
                self.shreg |= 1 << (self.shreg_len - 1);
            }
            if self.nbits < 64 {
                self.in_bits |= (self.tdi as u64) << self.nbits;
            }
            self.nbits += 1;
        }

        self.state = self.state.step(self.tms);

        match self.state {
            TapState::DrCapture => {
                let (value, len) = self.dr_capture();
                self.shreg = value;
                self.shreg_len = len;
                self.in_bits = 0;
                self.nbits = 0;
            }
            TapState::IrCapture => {
                self.shreg = self.ir as u64;
                self.shreg_len = IR_LEN;
                self.in_bits = 0;
                self.nbits = 0;
            }
            TapState::DrUpdate => self.dr_update(),
            TapState::IrUpdate => self.ir = (self.shreg as u32) & 0xf,
            _ => {}
        }
    }
}

/// Control-transfer stand-in: `read` consumes the queued host OUT data,
/// `write` records each IN data stage.
pub struct TestPipe {
    out: Vec<u8>,
    pos: usize,
    pub written: Vec<Vec<u8>>,
}

impl TestPipe {
    pub fn new(out: &[u8]) -> Self {
        TestPipe {
            out: out.to_vec(),
            pos: 0,
            written: Vec::new(),
        }
    }
}

impl ControlPipe for TestPipe {
    fn read(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte = self.out.get(self.pos).copied().unwrap_or(0);
            self.pos += 1;
        }
    }

    fn write(&mut self, data: &[u8]) {
        self.written.push(data.to_vec());
    }
}

/// Bulk IN stand-in recording each reply chunk and its flush flag.
pub struct SinkRecorder {
    pub chunks: Vec<(Vec<u8>, bool)>,
}

impl SinkRecorder {
    pub fn new() -> Self {
        SinkRecorder { chunks: Vec::new() }
    }
}

impl PacketSink for SinkRecorder {
    fn write(&mut self, data: &[u8], flush: bool) {
        self.chunks.push((data.to_vec(), flush));
    }
}

impl JtagPins for SimTarget {
    fn set_tck(&mut self, bit: bool) {
        if bit && !self.tck {
            self.rising_edge();
        }
        self.tck = bit;
    }

    fn set_tms(&mut self, bit: bool) {
        self.tms = bit;
    }

    fn set_tdi(&mut self, bit: bool) {
        self.tdi = bit;
    }

    fn read_tdo(&mut self) -> bool {
        match self.state {
            TapState::DrShift | TapState::IrShift => self.shreg & 1 != 0,
            _ => false,
        }
    }

    fn attach(&mut self) {
        self.attached = true;
    }

    fn detach(&mut self) {
        self.attached = false;
    }
}
