// Copyright 2026 Jeff Kent <jeff@jkent.net>
// Dual licensed under the Apache 2.0 and MIT licenses.

/// GPIO capability required to drive a JTAG Test Access Port.
///
/// The four signals are TCK (output), TMS (output), TDI (output) and TDO
/// (input). Implementations own the pin direction registers: `attach` must
/// configure TCK/TMS/TDI as outputs driving 0/1/0 and TDO as an input with
/// its pull-up enabled, `detach` must return all four pins to inputs with
/// pull-ups released.
///
/// There are no timing guarantees beyond each `clock` being a complete
/// rising-then-falling TCK edge pair; the TCK rate is whatever the pin
/// implementation yields. TMS and TDI are set before `clock` and held
/// through both halves of the pulse.
#[cfg_attr(test, mockall::automock)]
pub trait JtagPins {
    /// Drive the TCK line.
    fn set_tck(&mut self, bit: bool);

    /// Drive the TMS line.
    fn set_tms(&mut self, bit: bool);

    /// Drive the TDI line.
    fn set_tdi(&mut self, bit: bool);

    /// Sample the TDO line.
    fn read_tdo(&mut self) -> bool;

    /// Take control of the port: TCK/TMS/TDI outputs, TDO pulled-up input.
    fn attach(&mut self);

    /// Release the port: all pins inputs, pull-ups off.
    fn detach(&mut self);

    /// Pulse TCK once: a rising edge followed by a falling edge.
    fn clock(&mut self) {
        self.set_tck(true);
        self.set_tck(false);
    }
}
