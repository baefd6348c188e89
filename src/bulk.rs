// Copyright 2026 Jeff Kent <jeff@jkent.net>
// Dual licensed under the Apache 2.0 and MIT licenses.

//! Bulk byte engine: streams of byte-sized DR transactions over the shift
//! primitives, with optional IR pre-load and bypass padding for targets
//! sitting in a longer scan chain. This is what accelerates AVR OCD memory
//! reads and similar 8-bit mailbox traffic.

use crate::pins::JtagPins;
use crate::tap::{Tap, TapState};

pub const IR_AVR_OCD: u32 = 11;
pub const AVR_OCD_OCDR: u32 = 12;
pub const AVR_OCD_CTRLSTATUS: u32 = 13;

/// IR-side bypass padding is capped at this many bits.
const MAX_IR_PAD_BITS: u16 = 16384;

/// Position of the targeted device in the scan chain: bypass bit counts in
/// DR and bypass instruction bit counts in IR, before and after the device.
/// All zero for a lone device.
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq)]
pub struct Chain {
    pub devices_before: u8,
    pub devices_after: u8,
    pub ir_before: u16,
    pub ir_after: u16,
}

/// Clock `bits` one-bits (the BYPASS instruction, and what a bypassed DR
/// ignores), eight at a time.
fn shift_ones<P: JtagPins>(tap: &mut Tap<P>, mut bits: usize, exit: bool) {
    while bits > 0 {
        let n = bits.min(8);
        bits -= n;
        tap.shift_out(&[0xff], n, exit && bits == 0);
    }
}

/// Load the instruction register once, padding the bypassed devices with
/// one-bits on either side of the payload. Ends in IrUpdate.
pub fn write_ir<P: JtagPins>(tap: &mut Tap<P>, chain: &Chain, ir_bits: usize, ir: u32) {
    let head = chain.ir_before.min(MAX_IR_PAD_BITS) as usize;
    let tail = chain.ir_after.min(MAX_IR_PAD_BITS) as usize;
    let bits = ir_bits.min(32);

    tap.change_state(TapState::IrShift);
    shift_ones(tap, head, false);
    tap.shift_out(&ir.to_le_bytes(), bits, tail == 0);
    shift_ones(tap, tail, true);
    tap.change_state(TapState::IrUpdate);
}

/// Write `data` as byte-sized DR scans: for each byte enter DrShift, clock
/// the head bypass bits, the eight data bits and the tail bypass bits (the
/// overall last bit with TMS high), then return to Run-Test/Idle. When
/// `ir_bits` is non-zero the instruction register is loaded once up front.
pub fn write_bytes<P: JtagPins>(
    tap: &mut Tap<P>,
    chain: &Chain,
    data: &[u8],
    ir_bits: usize,
    ir: u32,
) {
    if !tap.attached() {
        return;
    }
    if ir_bits > 0 {
        write_ir(tap, chain, ir_bits, ir);
    }

    let head = chain.devices_before as usize;
    let tail = chain.devices_after as usize;
    for &byte in data {
        tap.change_state(TapState::DrShift);
        shift_ones(tap, head, false);
        tap.shift_out(&[byte], 8, tail == 0);
        shift_ones(tap, tail, true);
        tap.change_state(TapState::RunIdle);
    }
}

/// Mirror image of [`write_bytes`]: capture one byte of TDO per DR scan.
pub fn read_bytes<P: JtagPins>(
    tap: &mut Tap<P>,
    chain: &Chain,
    data: &mut [u8],
    ir_bits: usize,
    ir: u32,
) {
    if !tap.attached() {
        return;
    }
    if ir_bits > 0 {
        write_ir(tap, chain, ir_bits, ir);
    }

    let head = chain.devices_before as usize;
    let tail = chain.devices_after as usize;
    for byte in data.iter_mut() {
        tap.change_state(TapState::DrShift);
        shift_ones(tap, head, false);
        let mut buf = [0u8; 1];
        tap.shift_in(&mut buf, 8, tail == 0);
        shift_ones(tap, tail, true);
        *byte = buf[0];
        tap.change_state(TapState::RunIdle);
    }
}

/// Read the AVR On-Chip Debug mailbox byte.
///
/// Saves the current instruction, selects the OCD scan chain, polls
/// CTRLSTATUS, and only if bit 4 reports a pending byte reads OCDR (the
/// byte sits in the high half of the 16-bit read). The saved instruction is
/// restored before returning. −1 means nothing was pending.
pub fn avr_read_ocdr<P: JtagPins>(tap: &mut Tap<P>) -> i16 {
    if !tap.attached() {
        return -1;
    }

    tap.change_state(TapState::IrShift);
    let ir = tap.shift_scalar(IR_AVR_OCD, 4, true);
    tap.change_state(TapState::RunIdle);

    tap.change_state(TapState::DrShift);
    tap.shift_scalar(AVR_OCD_CTRLSTATUS, 5, true);
    tap.change_state(TapState::RunIdle);

    tap.change_state(TapState::DrShift);
    let status = tap.shift_scalar(0, 16, true);
    tap.change_state(TapState::RunIdle);

    let mut value = -1;
    if status & 0x10 != 0 {
        tap.change_state(TapState::DrShift);
        tap.shift_scalar(AVR_OCD_OCDR, 5, true);
        tap.change_state(TapState::RunIdle);

        tap.change_state(TapState::DrShift);
        value = (tap.shift_scalar(0, 16, true) >> 8) as i16;
        tap.change_state(TapState::RunIdle);
    }

    tap.change_state(TapState::IrShift);
    tap.shift_scalar(ir, 4, true);
    tap.change_state(TapState::RunIdle);

    value
}
