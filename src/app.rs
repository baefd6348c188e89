// Copyright 2026 Jeff Kent <jeff@jkent.net>
// Dual licensed under the Apache 2.0 and MIT licenses.

//! Top-level glue: owns the protocol engine and the serial bridge, routes
//! SETUP packets, and gives the main loop its pump entry points. The USB
//! device stack calls [`App::control_request`] from its SETUP callback and
//! the main loop calls [`App::poll`]; a 1 kHz timer drives [`App::tick`].

use core::convert::TryFrom;

use crate::cdc::{Bridge, BulkPipe, SerialPort};
use crate::pins::JtagPins;
use crate::usb::{
    self, ControlPipe, SetupDirection, SetupPid, SetupType, StandardRequest,
};
use crate::vendor::FreeJtag;

pub struct App<'a, P: JtagPins> {
    jtag: FreeJtag<P>,
    bridge: Bridge,
    unique_id: &'a [u8],
}

impl<'a, P: JtagPins> App<'a, P> {
    /// Build the application around a pin backend and the MCU unique id
    /// bytes used for the serial number string.
    pub fn new(pins: P, unique_id: &'a [u8]) -> Self {
        App {
            jtag: FreeJtag::new(pins),
            bridge: Bridge::new(),
            unique_id,
        }
    }

    pub fn jtag(&self) -> &FreeJtag<P> {
        &self.jtag
    }

    /// SETUP callback: descriptor requests go to the provider, vendor
    /// requests to the protocol engine, everything else is left for the
    /// device stack to answer or stall.
    pub fn control_request(&mut self, setup: &SetupPid, ep: &mut impl ControlPipe) {
        match setup.setup_type() {
            SetupType::Standard => {
                if let Ok(StandardRequest::GetDescriptor) = StandardRequest::try_from(setup.bRequest)
                {
                    if setup.direction() == SetupDirection::DeviceToHost {
                        usb::handle_get_descriptor(setup, self.unique_id, ep);
                    }
                }
            }
            SetupType::Vendor => self.jtag.control_request(setup, ep),
            _ => {}
        }
    }

    /// Main-loop pump for the serial bridge.
    pub fn poll(&mut self, serial: &mut impl SerialPort, host: &mut impl BulkPipe) {
        self.bridge.poll(serial, host);
    }

    /// 1 kHz tick: flush a stranded partial serial packet.
    pub fn tick(&mut self, host: &mut impl BulkPipe) {
        self.bridge.tick(host);
    }
}
