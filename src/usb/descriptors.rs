// Copyright 2026 Jeff Kent <jeff@jkent.net>
// Dual licensed under the Apache 2.0 and MIT licenses.

use core::mem::size_of;

use super::packets::*;

// V-USB shared VID/PID pair for vendor-class devices.
pub const VENDOR_ID: u16 = 0x16c0;
pub const PRODUCT_ID: u16 = 0x27dd;
pub const DEVICE_RELEASE: u16 = 0x0300;

pub const CONTROL_ENDPOINT_SIZE: usize = 32;
pub const INTERFACE_ID_FREEJTAG: u8 = 0;

pub static STRING_LANGS: [u16; 1] = [0x0409];
pub static STRING_MANUFACTURER: &str = "Jeff Kent <jeff@jkent.net>";
pub static STRING_PRODUCT: &str = "FreeJTAG Reference Implementation";
pub static STRING_INTERFACE: &str = "FreeJTAG";

/// The serial number string is this prefix followed by the hex-encoded MCU
/// unique id.
pub static SERIAL_PREFIX: &str = "jkent.net:";

pub static DEVICE_DESCRIPTOR: DeviceDescriptor = DeviceDescriptor {
    bLength: size_of::<DeviceDescriptor>() as u8,
    bDescriptorType: DescriptorType::Device as u8,
    bcdUSB: 0x0200,
    bDeviceClass: 0xFF,
    bDeviceSubClass: 0,
    bDeviceProtocol: 0,
    bMaxPacketSize0: CONTROL_ENDPOINT_SIZE as u8,
    idVendor: VENDOR_ID,
    idProduct: PRODUCT_ID,
    bcdDevice: DEVICE_RELEASE,
    iManufacturer: 1,
    iProduct: 2,
    iSerialNumber: 3,
    bNumConfigurations: 1,
};

pub static CONFIGURATION_DESCRIPTOR: ConfigurationDescriptor = ConfigurationDescriptor {
    bLength: size_of::<ConfigurationDescriptor>() as u8,
    bDescriptorType: DescriptorType::Configuration as u8,
    wTotalLength: (size_of::<ConfigurationDescriptor>() + size_of::<InterfaceDescriptor>()) as u16,
    bNumInterfaces: 1,
    bConfigurationValue: 1,
    iConfiguration: 0,
    bmAttributes: 0b1000_0000,
    bMaxPower: 50,
};

pub static INTERFACE_DESCRIPTOR: InterfaceDescriptor = InterfaceDescriptor {
    bLength: size_of::<InterfaceDescriptor>() as u8,
    bDescriptorType: DescriptorType::Interface as u8,
    bInterfaceNumber: INTERFACE_ID_FREEJTAG,
    bAlternateSetting: 0,
    bNumEndpoints: 0,
    bInterfaceClass: 0xFF,
    bInterfaceSubClass: 0,
    bInterfaceProtocol: 0,
    iInterface: 4,
};

static HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

fn empty_string_descriptor() -> StringDescriptor {
    StringDescriptor {
        bLength: 2,
        bDescriptorType: DescriptorType::String as u8,
        bString: [0u8; 66],
    }
}

/// String descriptor 0: the supported language IDs.
pub fn lang_descriptor() -> StringDescriptor {
    let mut desc = empty_string_descriptor();
    desc.bLength = 2 + 2 * STRING_LANGS.len() as u8;
    for (idx, lang) in STRING_LANGS.iter().enumerate() {
        let [u1, u2] = lang.to_le_bytes();
        desc.bString[idx * 2] = u1;
        desc.bString[idx * 2 + 1] = u2;
    }
    desc
}

/// UTF-16 encode a static string into a descriptor.
pub fn string_descriptor(string: &str) -> StringDescriptor {
    let mut desc = empty_string_descriptor();
    let mut n = 0;
    for cp in string.encode_utf16() {
        if n + 2 > desc.bString.len() {
            break;
        }
        let [u1, u2] = cp.to_le_bytes();
        desc.bString[n] = u1;
        desc.bString[n + 1] = u2;
        n += 2;
    }
    desc.bLength = 2 + n as u8;
    desc
}

/// The dynamic serial number: `jkent.net:` followed by the unique id as
/// lowercase hex, at most ten id bytes.
pub fn serial_descriptor(unique_id: &[u8]) -> StringDescriptor {
    let mut desc = empty_string_descriptor();
    let mut n = 0;
    for &byte in SERIAL_PREFIX.as_bytes() {
        desc.bString[n] = byte;
        n += 2;
    }
    for &byte in unique_id.iter().take(10) {
        desc.bString[n] = HEX_DIGITS[(byte >> 4) as usize];
        desc.bString[n + 2] = HEX_DIGITS[(byte & 0x0f) as usize];
        n += 4;
    }
    desc.bLength = 2 + n as u8;
    desc
}
