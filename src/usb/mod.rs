// Copyright 2026 Jeff Kent <jeff@jkent.net>
// Dual licensed under the Apache 2.0 and MIT licenses.

//! USB-facing surface of the probe core: SETUP packet types, the static
//! descriptor tables, and the descriptor provider. Enumeration, endpoint
//! management and status stages belong to the device stack embedding this
//! crate; the core only consumes the control-transfer data stages through
//! [`ControlPipe`].

pub mod descriptors;
pub mod packets;

use core::convert::TryFrom;

use descriptors::*;
use packets::*;

pub use descriptors::{CONTROL_ENDPOINT_SIZE, INTERFACE_ID_FREEJTAG};
pub use packets::{SetupDirection, SetupPid, SetupRecipient, SetupType, StandardRequest};

/// Data-stage access for one control transfer. `read` consumes the OUT data
/// stage, `write` supplies the IN data stage; both run to completion before
/// returning, mirroring the blocking control-stream calls of the device
/// stack underneath.
pub trait ControlPipe {
    fn read(&mut self, buf: &mut [u8]);
    fn write(&mut self, data: &[u8]);
}

fn write_clamped(ep: &mut impl ControlPipe, data: &[u8], w_length: u16) {
    let n = data.len().min(w_length as usize);
    ep.write(&data[..n]);
}

/// GET_DESCRIPTOR provider.
///
/// Serves the device and configuration descriptors from the static tables
/// and builds string descriptors on demand; the serial string embeds the
/// given MCU unique id and goes straight out through the pipe. Unknown
/// types and indices are ignored and the stack is expected to stall them.
pub fn handle_get_descriptor(setup: &SetupPid, unique_id: &[u8], ep: &mut impl ControlPipe) {
    let [index, dtype] = setup.wValue.to_le_bytes();

    match DescriptorType::try_from(dtype) {
        Ok(DescriptorType::Device) => {
            write_clamped(ep, DEVICE_DESCRIPTOR.to_bytes(), setup.wLength);
        }

        Ok(DescriptorType::Configuration) => {
            // The configuration and interface descriptors go out back to
            // back in a single transfer.
            let mut buf = [0u8; 32];
            let mut n = 0;

            let data = CONFIGURATION_DESCRIPTOR.to_bytes();
            buf[n..n + data.len()].copy_from_slice(data);
            n += data.len();

            let data = INTERFACE_DESCRIPTOR.to_bytes();
            buf[n..n + data.len()].copy_from_slice(data);
            n += data.len();

            write_clamped(ep, &buf[..n], setup.wLength);
        }

        Ok(DescriptorType::String) => {
            let desc = match index {
                0 => lang_descriptor(),
                1 => string_descriptor(STRING_MANUFACTURER),
                2 => string_descriptor(STRING_PRODUCT),
                3 => serial_descriptor(unique_id),
                4 => string_descriptor(STRING_INTERFACE),
                _ => return,
            };
            let n = desc.bLength as usize;
            write_clamped(ep, &desc.to_bytes()[..n], setup.wLength);
        }

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::TestPipe;

    fn get_descriptor(dtype: u8, index: u8, w_length: u16, unique_id: &[u8]) -> Vec<u8> {
        let setup = SetupPid {
            bmRequestType: 0x80,
            bRequest: StandardRequest::GetDescriptor as u8,
            wValue: (dtype as u16) << 8 | index as u16,
            wIndex: 0,
            wLength: w_length,
        };
        let mut ep = TestPipe::new(&[]);
        handle_get_descriptor(&setup, unique_id, &mut ep);
        ep.written.concat()
    }

    #[test]
    fn device_descriptor_identity() {
        let data = get_descriptor(1, 0, 64, &[]);
        assert_eq!(data.len(), 18);
        assert_eq!(data[0], 18);
        assert_eq!(data[1], 1);
        // VID 0x16c0, PID 0x27dd, bcdDevice 0x0300, EP0 size 32.
        assert_eq!(&data[8..10], &[0xc0, 0x16]);
        assert_eq!(&data[10..12], &[0xdd, 0x27]);
        assert_eq!(&data[12..14], &[0x00, 0x03]);
        assert_eq!(data[7], 32);
    }

    #[test]
    fn device_descriptor_clamps_to_wlength() {
        let data = get_descriptor(1, 0, 8, &[]);
        assert_eq!(data.len(), 8);
    }

    #[test]
    fn configuration_descriptor_has_one_vendor_interface() {
        let data = get_descriptor(2, 0, 64, &[]);
        assert_eq!(data.len(), 18);
        // wTotalLength covers both descriptors; one interface, 100 mA.
        assert_eq!(&data[2..4], &[18, 0]);
        assert_eq!(data[4], 1);
        assert_eq!(data[7], 0b1000_0000);
        assert_eq!(data[8], 50);
        // Vendor class interface with no endpoints.
        assert_eq!(data[9 + 4], 0);
        assert_eq!(data[9 + 5], 0xff);
    }

    #[test]
    fn product_string_is_utf16() {
        let data = get_descriptor(3, 2, 255, &[]);
        assert_eq!(data.len() as usize, 2 + 2 * STRING_PRODUCT.len());
        assert_eq!(data[1], 3);
        assert_eq!(data[2], b'F');
        assert_eq!(data[3], 0);
        assert_eq!(data[2 + 2 * 32], b'n');
    }

    #[test]
    fn serial_string_embeds_hex_unique_id() {
        let data = get_descriptor(3, 3, 255, &[0xde, 0xad]);
        let expected: Vec<u8> = "jkent.net:dead"
            .bytes()
            .flat_map(|b| vec![b, 0])
            .collect();
        assert_eq!(&data[2..], &expected[..]);
        assert_eq!(data[0] as usize, 2 + expected.len());
    }

    #[test]
    fn unknown_descriptor_is_ignored() {
        assert!(get_descriptor(0x21, 0, 64, &[]).is_empty());
        assert!(get_descriptor(3, 9, 64, &[]).is_empty());
    }
}
