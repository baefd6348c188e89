// Copyright 2026 Jeff Kent <jeff@jkent.net>
// Dual licensed under the Apache 2.0 and MIT licenses.

//! Bulk-endpoint dialect of the host protocol.
//!
//! The host writes one command per packet to the OUT endpoint: an opcode
//! byte followed by little-endian arguments. Replies go out through a
//! [`PacketSink`] in chunks of up to eight bytes, flushed on the final
//! chunk. `BULK_LOAD_BYTES` switches the engine into a streaming sub-state
//! where every following packet is consumed entirely as data until the
//! advertised count is exhausted or a short packet arrives. Malformed
//! packets are dropped.

use core::convert::TryFrom;

use log::debug;
use num_enum::TryFromPrimitive;

use crate::bulk::{self, Chain};
use crate::pins::JtagPins;
use crate::tap::{Tap, TapState};

/// Size of the bulk endpoints; also the reply chunk size and the short
/// packet threshold ending a bulk load.
pub const PACKET_SIZE: usize = 8;

/// Reply path to the bulk IN endpoint. `flush` asks for the packet to be
/// sent even when it is not full.
pub trait PacketSink {
    fn write(&mut self, data: &[u8], flush: bool);
}

#[derive(Copy, Clone, PartialEq, TryFromPrimitive)]
#[repr(u8)]
enum Opcode {
    Nop = 0,
    Version = 1,
    Attach = 2,
    SetState = 3,
    Clock = 4,
    ClockOut = 5,
    ClockIn = 6,
    ClockOutIn = 7,
    BulkLoadBytes = 8,
    BulkReadBytes = 9,
    AvrReadOcdr = 128,
    Reset = 255,
}

/// Packet protocol engine. The bulk-endpoint build drives a lone target,
/// so the scan chain has no bypass padding.
pub struct Engine<P: JtagPins> {
    tap: Tap<P>,
    bulk_bytes: u16,
}

impl<P: JtagPins> Engine<P> {
    pub fn new(pins: P) -> Self {
        Engine {
            tap: Tap::new(pins),
            bulk_bytes: 0,
        }
    }

    pub fn tap(&self) -> &Tap<P> {
        &self.tap
    }

    /// Handle one OUT packet.
    pub fn packet(&mut self, buf: &[u8], sink: &mut impl PacketSink) {
        if buf.is_empty() {
            return;
        }

        if self.bulk_bytes > 0 {
            let chunk = (self.bulk_bytes as usize).min(buf.len());
            bulk::write_bytes(&mut self.tap, &Chain::default(), &buf[..chunk], 0, 0);
            self.bulk_bytes -= chunk as u16;
            if chunk < PACKET_SIZE {
                self.bulk_bytes = 0;
            }
            return;
        }

        let opcode = match Opcode::try_from(buf[0]) {
            Ok(opcode) => opcode,
            Err(_) => {
                debug!("unknown opcode {:#04x}", buf[0]);
                return;
            }
        };

        match opcode {
            Opcode::Nop => {}

            Opcode::Version => {
                if buf.len() != 1 {
                    return;
                }
                sink.write(&[0x00, 0x02], true);
            }

            Opcode::Attach => {
                if buf.len() != 2 {
                    return;
                }
                if buf[1] != 0 {
                    self.tap.attach();
                } else {
                    self.tap.detach();
                }
            }

            Opcode::SetState => {
                if buf.len() != 2 {
                    return;
                }
                if let Ok(target) = TapState::try_from(buf[1]) {
                    self.tap.change_state(target);
                }
                sink.write(&[u8::from(self.tap.state())], true);
            }

            Opcode::Clock => {
                if buf.len() != 3 {
                    return;
                }
                let bits = buf[1] as usize;
                if bits == 0 || bits > 32 {
                    return;
                }
                self.tap.shift(bits, buf[2] != 0);
            }

            Opcode::ClockOut => {
                if let Some((bits, exit, value)) = Self::scalar_args(buf) {
                    self.tap.shift_scalar(value, bits, exit);
                }
            }

            Opcode::ClockIn => {
                if buf.len() != 3 {
                    return;
                }
                let bits = buf[1] as usize;
                if bits == 0 || bits > 32 {
                    return;
                }
                let value = self.tap.shift_scalar(0, bits, buf[2] != 0);
                sink.write(&value.to_le_bytes()[..(bits + 7) / 8], true);
            }

            Opcode::ClockOutIn => {
                if let Some((bits, exit, value)) = Self::scalar_args(buf) {
                    let value = self.tap.shift_scalar(value, bits, exit);
                    sink.write(&value.to_le_bytes()[..(bits + 7) / 8], true);
                }
            }

            Opcode::BulkLoadBytes => {
                if buf.len() != 3 {
                    return;
                }
                self.bulk_bytes = u16::from_le_bytes([buf[1], buf[2]]);
            }

            Opcode::BulkReadBytes => {
                if buf.len() != 3 {
                    return;
                }
                self.bulk_bytes = u16::from_le_bytes([buf[1], buf[2]]);
                while self.bulk_bytes > 0 {
                    let chunk = (self.bulk_bytes as usize).min(PACKET_SIZE);
                    let mut data = [0u8; PACKET_SIZE];
                    bulk::read_bytes(&mut self.tap, &Chain::default(), &mut data[..chunk], 0, 0);
                    sink.write(&data[..chunk], self.bulk_bytes as usize <= PACKET_SIZE);
                    self.bulk_bytes -= chunk as u16;
                }
            }

            Opcode::AvrReadOcdr => {
                if buf.len() != 1 {
                    return;
                }
                let value = bulk::avr_read_ocdr(&mut self.tap);
                sink.write(&value.to_le_bytes(), true);
            }

            Opcode::Reset => {
                if buf.len() != 1 {
                    return;
                }
                self.bulk_bytes = 0;
            }
        }
    }

    /// Parse `bits, exit, data` for the scalar shift opcodes: the data field
    /// carries exactly enough bytes for the bit count.
    fn scalar_args(buf: &[u8]) -> Option<(usize, bool, u32)> {
        if buf.len() < 3 {
            return None;
        }
        let bits = buf[1] as usize;
        if bits == 0 || bits > 32 {
            return None;
        }
        let bytes = (bits + 7) / 8;
        if buf.len() != 3 + bytes {
            return None;
        }
        let mut word = [0u8; 4];
        word[..bytes].copy_from_slice(&buf[3..3 + bytes]);
        Some((bits, buf[2] != 0, u32::from_le_bytes(word)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimTarget, SinkRecorder};

    fn attached_engine(sim: SimTarget) -> (Engine<SimTarget>, SinkRecorder) {
        let mut engine = Engine::new(sim);
        let mut sink = SinkRecorder::new();
        engine.packet(&[Opcode::Attach as u8, 1], &mut sink);
        (engine, sink)
    }

    #[test]
    fn version_replies_two_bytes() {
        let mut engine = Engine::new(SimTarget::new());
        let mut sink = SinkRecorder::new();
        engine.packet(&[Opcode::Version as u8], &mut sink);
        assert_eq!(sink.chunks, vec![(vec![0x00, 0x02], true)]);
    }

    #[test]
    fn attach_runs_the_long_reset() {
        let (engine, _) = attached_engine(SimTarget::new());
        assert!(engine.tap.attached());
        assert_eq!(engine.tap.state(), TapState::Reset);
        assert_eq!(engine.tap.pins().edges, 1024);
    }

    #[test]
    fn set_state_echoes_the_new_state() {
        let (mut engine, mut sink) = attached_engine(SimTarget::new());
        engine.packet(&[Opcode::SetState as u8, TapState::DrShift as u8], &mut sink);
        assert_eq!(engine.tap.state(), TapState::DrShift);
        assert_eq!(sink.chunks.last(), Some(&(vec![TapState::DrShift as u8], true)));
    }

    #[test]
    fn set_state_out_of_range_echoes_current_state() {
        let (mut engine, mut sink) = attached_engine(SimTarget::new());
        engine.packet(&[Opcode::SetState as u8, 200], &mut sink);
        assert_eq!(engine.tap.state(), TapState::Reset);
        assert_eq!(sink.chunks.last(), Some(&(vec![TapState::Reset as u8], true)));
    }

    #[test]
    fn clock_shifts_with_tdi_low() {
        let (mut engine, mut sink) = attached_engine(SimTarget::new());
        engine.packet(&[Opcode::SetState as u8, TapState::DrShift as u8], &mut sink);
        let before = engine.tap.pins().edges;
        engine.packet(&[Opcode::Clock as u8, 4, 0], &mut sink);
        assert_eq!(engine.tap.pins().edges - before, 4);
        assert_eq!(engine.tap.state(), TapState::DrShift);
    }

    #[test]
    fn clock_in_reads_the_register() {
        let (mut engine, mut sink) = attached_engine(SimTarget::with_dr(16, 0xbeef));
        engine.packet(&[Opcode::SetState as u8, TapState::DrShift as u8], &mut sink);
        engine.packet(&[Opcode::ClockIn as u8, 16, 1], &mut sink);
        assert_eq!(sink.chunks.last(), Some(&(vec![0xef, 0xbe], true)));
        assert_eq!(engine.tap.state(), TapState::DrExit1);
    }

    #[test]
    fn clock_outin_exchanges() {
        let (mut engine, mut sink) = attached_engine(SimTarget::with_dr(8, 0x5a));
        engine.packet(&[Opcode::SetState as u8, TapState::DrShift as u8], &mut sink);
        engine.packet(&[Opcode::ClockOutIn as u8, 8, 1, 0xc3], &mut sink);
        assert_eq!(sink.chunks.last(), Some(&(vec![0x5a], true)));
        engine.packet(&[Opcode::SetState as u8, TapState::RunIdle as u8], &mut sink);
        assert_eq!(engine.tap.pins().updated_dr, Some((0xc3, 8)));
    }

    #[test]
    fn bulk_load_streams_following_packets() {
        let (mut engine, mut sink) = attached_engine(SimTarget::new());
        engine.packet(&[Opcode::BulkLoadBytes as u8, 20, 0], &mut sink);
        assert_eq!(engine.bulk_bytes, 20);

        engine.packet(&[1, 2, 3, 4, 5, 6, 7, 8], &mut sink);
        assert_eq!(engine.bulk_bytes, 12);
        engine.packet(&[9, 10, 11, 12, 13, 14, 15, 16], &mut sink);
        assert_eq!(engine.bulk_bytes, 4);
        engine.packet(&[17, 18, 19, 20], &mut sink);
        assert_eq!(engine.bulk_bytes, 0);
        assert_eq!(engine.tap.pins().updated_dr, Some((20, 8)));

        // Back to command mode.
        engine.packet(&[Opcode::Version as u8], &mut sink);
        assert_eq!(sink.chunks.last(), Some(&(vec![0x00, 0x02], true)));
    }

    #[test]
    fn bulk_load_ends_on_short_packet() {
        let (mut engine, mut sink) = attached_engine(SimTarget::new());
        engine.packet(&[Opcode::BulkLoadBytes as u8, 20, 0], &mut sink);
        engine.packet(&[1, 2, 3, 4, 5], &mut sink);
        assert_eq!(engine.bulk_bytes, 0);
    }

    #[test]
    fn bulk_load_consumes_at_most_the_advertised_count() {
        let (mut engine, mut sink) = attached_engine(SimTarget::new());
        engine.packet(&[Opcode::BulkLoadBytes as u8, 3, 0], &mut sink);
        engine.packet(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88], &mut sink);
        assert_eq!(engine.bulk_bytes, 0);
        // Only the first three bytes went to the target.
        assert_eq!(engine.tap.pins().updated_dr, Some((0x33, 8)));
    }

    #[test]
    fn bulk_read_chunks_replies_and_flushes_the_tail() {
        let (mut engine, mut sink) = attached_engine(SimTarget::with_dr(8, 0x5a));
        engine.packet(&[Opcode::BulkReadBytes as u8, 20, 0], &mut sink);
        assert_eq!(engine.bulk_bytes, 0);
        assert_eq!(
            sink.chunks,
            vec![
                (vec![0x5a; 8], false),
                (vec![0x5a; 8], false),
                (vec![0x5a; 4], true),
            ]
        );
    }

    #[test]
    fn avr_read_ocdr_replies_signed() {
        let (mut engine, mut sink) = attached_engine(SimTarget::new());
        engine.packet(&[Opcode::AvrReadOcdr as u8], &mut sink);
        assert_eq!(sink.chunks.last(), Some(&(vec![0xff, 0xff], true)));
    }

    #[test]
    fn reset_clears_the_bulk_cursor() {
        let mut engine = Engine::new(SimTarget::new());
        let mut sink = SinkRecorder::new();
        engine.packet(&[Opcode::Reset as u8], &mut sink);
        assert_eq!(engine.bulk_bytes, 0);
        assert!(sink.chunks.is_empty());
    }

    #[test]
    fn malformed_packets_are_dropped() {
        let (mut engine, mut sink) = attached_engine(SimTarget::new());
        let before = engine.tap.pins().edges;
        engine.packet(&[0x42], &mut sink);
        engine.packet(&[Opcode::Clock as u8, 8], &mut sink);
        engine.packet(&[Opcode::Clock as u8, 0, 0], &mut sink);
        engine.packet(&[Opcode::Clock as u8, 33, 0], &mut sink);
        engine.packet(&[Opcode::ClockOut as u8, 8, 0], &mut sink);
        engine.packet(&[], &mut sink);
        assert_eq!(engine.tap.pins().edges, before);
    }
}
