// Copyright 2026 Jeff Kent <jeff@jkent.net>
// Dual licensed under the Apache 2.0 and MIT licenses.

//! UART passthrough for the CDC-ACM interface.
//!
//! Cooperative rendition of the interrupt-driven bridge: UART ingress lands
//! in a ring buffer (the RX interrupt stand-in) and leaves towards the bulk
//! IN pipe in full packets; `tick`, called at roughly 1 kHz, flushes a
//! partially filled packet so short bursts are not stranded. Host-to-UART
//! traffic moves one byte at a time, gated on CTS and UART readiness, with
//! a single holding slot while the UART is busy.

use log::warn;

/// CDC data endpoint size.
pub const CDC_PACKET_SIZE: usize = 32;

const RING_SIZE: usize = 64;

/// The UART side of the bridge.
pub trait SerialPort {
    /// Take one received byte, if any.
    fn read(&mut self) -> Option<u8>;

    /// True when the transmit data register can accept a byte.
    fn write_ready(&mut self) -> bool;

    fn write(&mut self, byte: u8);

    /// Target-side flow control.
    fn clear_to_send(&mut self) -> bool;
}

/// The host side of the bridge: the CDC bulk endpoint pair.
pub trait BulkPipe {
    /// Take one byte of host OUT data, if any.
    fn read(&mut self) -> Option<u8>;

    /// Queue an IN packet; false when the endpoint is still busy.
    fn write_packet(&mut self, data: &[u8]) -> bool;
}

struct Ring {
    buf: [u8; RING_SIZE],
    head: usize,
    tail: usize,
}

impl Ring {
    const fn new() -> Self {
        Ring {
            buf: [0u8; RING_SIZE],
            head: 0,
            tail: 0,
        }
    }

    fn push(&mut self, byte: u8) -> bool {
        let next = (self.head + 1) % RING_SIZE;
        if next == self.tail {
            return false;
        }
        self.buf[self.head] = byte;
        self.head = next;
        true
    }

    fn pop(&mut self) -> Option<u8> {
        if self.tail == self.head {
            return None;
        }
        let byte = self.buf[self.tail];
        self.tail = (self.tail + 1) % RING_SIZE;
        Some(byte)
    }
}

pub struct Bridge {
    ring: Ring,
    packet: [u8; CDC_PACKET_SIZE],
    fill: usize,
    pending: Option<u8>,
}

impl Bridge {
    pub const fn new() -> Self {
        Bridge {
            ring: Ring::new(),
            packet: [0u8; CDC_PACKET_SIZE],
            fill: 0,
            pending: None,
        }
    }

    /// Move bytes in both directions; called from the main loop.
    pub fn poll(&mut self, serial: &mut impl SerialPort, host: &mut impl BulkPipe) {
        while let Some(byte) = serial.read() {
            if !self.ring.push(byte) {
                warn!("serial ingress overflow, byte dropped");
                break;
            }
        }

        loop {
            while self.fill < CDC_PACKET_SIZE {
                match self.ring.pop() {
                    Some(byte) => {
                        self.packet[self.fill] = byte;
                        self.fill += 1;
                    }
                    None => break,
                }
            }
            if self.fill < CDC_PACKET_SIZE || !host.write_packet(&self.packet[..self.fill]) {
                break;
            }
            self.fill = 0;
        }

        loop {
            if self.pending.is_none() {
                self.pending = host.read();
            }
            match self.pending {
                Some(byte) if serial.clear_to_send() && serial.write_ready() => {
                    serial.write(byte);
                    self.pending = None;
                }
                _ => break,
            }
        }
    }

    /// Flush a partially filled IN packet; called from the 1 kHz tick.
    pub fn tick(&mut self, host: &mut impl BulkPipe) {
        if self.fill > 0 && host.write_packet(&self.packet[..self.fill]) {
            self.fill = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestSerial {
        rx: Vec<u8>,
        pos: usize,
        tx: Vec<u8>,
        cts: bool,
        ready: bool,
    }

    impl TestSerial {
        fn new(rx: &[u8]) -> Self {
            TestSerial {
                rx: rx.to_vec(),
                pos: 0,
                tx: Vec::new(),
                cts: true,
                ready: true,
            }
        }
    }

    impl SerialPort for TestSerial {
        fn read(&mut self) -> Option<u8> {
            let byte = self.rx.get(self.pos).copied();
            if byte.is_some() {
                self.pos += 1;
            }
            byte
        }

        fn write_ready(&mut self) -> bool {
            self.ready
        }

        fn write(&mut self, byte: u8) {
            self.tx.push(byte);
        }

        fn clear_to_send(&mut self) -> bool {
            self.cts
        }
    }

    struct TestHost {
        out: Vec<u8>,
        pos: usize,
        packets: Vec<Vec<u8>>,
        accept: bool,
    }

    impl TestHost {
        fn new(out: &[u8]) -> Self {
            TestHost {
                out: out.to_vec(),
                pos: 0,
                packets: Vec::new(),
                accept: true,
            }
        }
    }

    impl BulkPipe for TestHost {
        fn read(&mut self) -> Option<u8> {
            let byte = self.out.get(self.pos).copied();
            if byte.is_some() {
                self.pos += 1;
            }
            byte
        }

        fn write_packet(&mut self, data: &[u8]) -> bool {
            if self.accept {
                self.packets.push(data.to_vec());
            }
            self.accept
        }
    }

    #[test]
    fn full_packets_go_out_immediately() {
        let mut bridge = Bridge::new();
        let data: Vec<u8> = (0..40).collect();
        let mut serial = TestSerial::new(&data);
        let mut host = TestHost::new(&[]);

        bridge.poll(&mut serial, &mut host);
        assert_eq!(bridge.fill, 8);
        assert_eq!(host.packets, vec![data[..32].to_vec()]);

        bridge.tick(&mut host);
        assert_eq!(bridge.fill, 0);
        assert_eq!(host.packets[1], data[32..].to_vec());
    }

    #[test]
    fn tick_without_data_sends_nothing() {
        let mut bridge = Bridge::new();
        let mut host = TestHost::new(&[]);
        bridge.tick(&mut host);
        assert!(host.packets.is_empty());
    }

    #[test]
    fn host_bytes_reach_the_uart() {
        let mut bridge = Bridge::new();
        let mut serial = TestSerial::new(&[]);
        let mut host = TestHost::new(b"ab");
        bridge.poll(&mut serial, &mut host);
        assert_eq!(serial.tx, b"ab");
    }

    #[test]
    fn cts_holds_back_host_bytes() {
        let mut bridge = Bridge::new();
        let mut serial = TestSerial::new(&[]);
        serial.cts = false;
        let mut host = TestHost::new(b"x");

        bridge.poll(&mut serial, &mut host);
        assert!(serial.tx.is_empty());

        serial.cts = true;
        bridge.poll(&mut serial, &mut host);
        assert_eq!(serial.tx, b"x");
    }

    #[test]
    fn busy_endpoint_keeps_the_packet() {
        let mut bridge = Bridge::new();
        let data = [0u8; 32];
        let mut serial = TestSerial::new(&data);
        let mut host = TestHost::new(&[]);
        host.accept = false;

        bridge.poll(&mut serial, &mut host);
        assert_eq!(bridge.fill, 32);

        host.accept = true;
        bridge.tick(&mut host);
        assert_eq!(host.packets.len(), 1);
        assert_eq!(bridge.fill, 0);
    }
}
