// Copyright 2026 Jeff Kent <jeff@jkent.net>
// Dual licensed under the Apache 2.0 and MIT licenses.

//! Vendor control-transfer dialect of the host protocol.
//!
//! Every request is a vendor-type, interface-recipient control transfer
//! with the FreeJTAG interface id in the low byte of `wIndex`. `EXECUTE`
//! carries one TAP command in `wValue` (low byte command, high byte
//! argument); shift results are staged in a 32-byte buffer the host drains
//! with `READBUF`. Anything malformed is ignored without a reply.

use core::convert::TryFrom;

use log::debug;
use num_enum::TryFromPrimitive;

use crate::bulk::{self, Chain};
use crate::pins::JtagPins;
use crate::tap::{Tap, TapState};
use crate::usb::{
    ControlPipe, SetupDirection, SetupPid, SetupRecipient, SetupType, CONTROL_ENDPOINT_SIZE,
    INTERFACE_ID_FREEJTAG,
};

/// Firmware version reported by `VERSION`, BCD 3.0.0.
pub const VERSION_BCD: u16 = 0x0300;

#[derive(Copy, Clone, TryFromPrimitive)]
#[repr(u8)]
enum Request {
    Version = 0x00,
    Reset = 0x01,
    Execute = 0x02,
    ReadBuf = 0x03,
    BulkByte = 0x04,
    Select = 0x05,
    ReadOcdr = 0x80,
}

#[derive(Copy, Clone, PartialEq, TryFromPrimitive)]
#[repr(u8)]
enum Command {
    Nop = 0x00,
    Attach = 0x01,
    SetTdi = 0x02,
    SetTms = 0x03,
    SetState = 0x04,
    Clock = 0x05,
    Shift = 0x06,
    ShiftExit = 0x07,
    ShiftOut = 0x40,
    ShiftOutExit = 0x41,
    ShiftIn = 0x80,
    ShiftInExit = 0x81,
    ShiftOutIn = 0xC0,
    ShiftOutInExit = 0xC1,
}

/// Control-transfer protocol engine: the TAP driver plus chain geometry and
/// the staging buffers for one request/reply exchange.
pub struct FreeJtag<P: JtagPins> {
    tap: Tap<P>,
    chain: Chain,
    rxbuf: [u8; CONTROL_ENDPOINT_SIZE],
    txbuf: [u8; CONTROL_ENDPOINT_SIZE],
    txlen: usize,
}

impl<P: JtagPins> FreeJtag<P> {
    pub fn new(pins: P) -> Self {
        FreeJtag {
            tap: Tap::new(pins),
            chain: Chain::default(),
            rxbuf: [0u8; CONTROL_ENDPOINT_SIZE],
            txbuf: [0u8; CONTROL_ENDPOINT_SIZE],
            txlen: 0,
        }
    }

    pub fn tap(&self) -> &Tap<P> {
        &self.tap
    }

    /// Handle one SETUP addressed to the FreeJTAG interface. Requests for
    /// other recipients, interfaces or types fall through untouched.
    pub fn control_request(&mut self, setup: &SetupPid, ep: &mut impl ControlPipe) {
        if setup.setup_type() != SetupType::Vendor
            || setup.recipient() != Some(SetupRecipient::Interface)
            || (setup.wIndex & 0xff) as u8 != INTERFACE_ID_FREEJTAG
        {
            return;
        }

        let request = match Request::try_from(setup.bRequest) {
            Ok(request) => request,
            Err(_) => {
                debug!("unknown vendor request {:#04x}", setup.bRequest);
                return;
            }
        };

        match setup.direction() {
            SetupDirection::DeviceToHost => self.request_in(request, setup, ep),
            SetupDirection::HostToDevice => self.request_out(request, setup, ep),
        }
    }

    fn request_in(&mut self, request: Request, setup: &SetupPid, ep: &mut impl ControlPipe) {
        match request {
            Request::Version => {
                ep.write(&VERSION_BCD.to_le_bytes());
            }

            Request::ReadBuf => {
                ep.write(&self.txbuf[..self.txlen]);
                self.txlen = 0;
            }

            Request::BulkByte => {
                let len = (setup.wLength as usize).min(CONTROL_ENDPOINT_SIZE);
                self.txlen = len;
                bulk::read_bytes(&mut self.tap, &self.chain, &mut self.txbuf[..len], 0, 0);
                ep.write(&self.txbuf[..self.txlen]);
                self.txlen = 0;
            }

            Request::ReadOcdr => {
                let value = bulk::avr_read_ocdr(&mut self.tap);
                ep.write(&value.to_le_bytes());
            }

            _ => {}
        }
    }

    fn request_out(&mut self, request: Request, setup: &SetupPid, ep: &mut impl ControlPipe) {
        match request {
            Request::Reset => {
                self.tap.invalidate();
                self.txlen = 0;
            }

            Request::Execute => self.execute(setup, ep),

            Request::BulkByte => {
                let len = (setup.wLength as usize).min(CONTROL_ENDPOINT_SIZE);
                ep.read(&mut self.rxbuf[..len]);
                bulk::write_bytes(&mut self.tap, &self.chain, &self.rxbuf[..len], 0, 0);
            }

            Request::Select => {
                let mut buf = [0u8; 6];
                ep.read(&mut buf);
                self.chain = Chain {
                    devices_before: buf[0],
                    devices_after: buf[1],
                    ir_before: u16::from_le_bytes([buf[2], buf[3]]),
                    ir_after: u16::from_le_bytes([buf[4], buf[5]]),
                };
                debug!("chain geometry {:?}", self.chain);
            }

            _ => {}
        }
    }

    fn execute(&mut self, setup: &SetupPid, ep: &mut impl ControlPipe) {
        let [cmd, arg] = setup.wValue.to_le_bytes();
        let command = match Command::try_from(cmd) {
            Ok(command) => command,
            Err(_) => {
                debug!("unknown command {:#04x}", cmd);
                return;
            }
        };

        match command {
            Command::Nop => {}

            Command::Attach => {
                if arg != 0 {
                    self.tap.attach();
                } else {
                    self.tap.detach();
                }
            }

            Command::SetTdi => self.tap.set_tdi(arg != 0),
            Command::SetTms => self.tap.set_tms(arg != 0),

            Command::SetState => {
                if let Ok(target) = TapState::try_from((arg & 0x0f) + 1) {
                    self.tap.change_state(target);
                    // Dwell clocks ride in the high byte of wIndex and only
                    // apply where they cannot advance the TAP.
                    let dwell = (setup.wIndex >> 8) as usize;
                    if dwell > 0 && self.tap.state().is_stable() {
                        self.tap.set_tms(self.tap.state() == TapState::Reset);
                        self.tap.clock(dwell);
                    }
                }
            }

            Command::Clock => self.tap.clock(arg as usize + 1),

            Command::Shift | Command::ShiftExit => {
                let bits = arg as usize + 1;
                self.tap.shift(bits, command == Command::ShiftExit);
            }

            Command::ShiftOut | Command::ShiftOutExit => {
                let bits = arg as usize + 1;
                let len = (bits + 7) / 8;
                ep.read(&mut self.rxbuf[..len]);
                self.tap
                    .shift_out(&self.rxbuf[..len], bits, command == Command::ShiftOutExit);
            }

            Command::ShiftIn | Command::ShiftInExit => {
                let bits = arg as usize + 1;
                let len = (bits + 7) / 8;
                self.txlen = len;
                self.tap
                    .shift_in(&mut self.txbuf[..len], bits, command == Command::ShiftInExit);
            }

            Command::ShiftOutIn | Command::ShiftOutInExit => {
                let bits = arg as usize + 1;
                let len = (bits + 7) / 8;
                ep.read(&mut self.rxbuf[..len]);
                self.txbuf[..len].copy_from_slice(&self.rxbuf[..len]);
                self.txlen = len;
                self.tap
                    .shift_outin(&mut self.txbuf[..len], bits, command == Command::ShiftOutInExit);
            }
        }
    }
}
