// Copyright 2026 Jeff Kent <jeff@jkent.net>
// Dual licensed under the Apache 2.0 and MIT licenses.

use core::convert::TryFrom;
use num_enum::TryFromPrimitive;

/// The eight bytes of a SETUP packet.
#[allow(non_snake_case)]
#[derive(Copy, Clone, Debug)]
pub struct SetupPid {
    pub bmRequestType: u8,
    pub bRequest: u8,
    pub wValue: u16,
    pub wIndex: u16,
    pub wLength: u16,
}

#[derive(Copy, Clone, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum SetupDirection {
    HostToDevice = 0,
    DeviceToHost = 1,
}

#[derive(Copy, Clone, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum SetupType {
    Standard = 0,
    Class = 1,
    Vendor = 2,
    Reserved = 3,
}

#[derive(Copy, Clone, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum SetupRecipient {
    Device = 0,
    Interface = 1,
    Endpoint = 2,
    Other = 3,
}

#[derive(TryFromPrimitive)]
#[repr(u8)]
pub enum StandardRequest {
    GetStatus = 0,
    ClearFeature = 1,
    SetFeature = 3,
    SetAddress = 5,
    GetDescriptor = 6,
    SetDescriptor = 7,
    GetConfiguration = 8,
    SetConfiguration = 9,
    GetInterface = 10,
    SetInterface = 11,
    SynchFrame = 12,
}

#[derive(TryFromPrimitive)]
#[repr(u8)]
pub enum DescriptorType {
    Device = 1,
    Configuration = 2,
    String = 3,
    Interface = 4,
    Endpoint = 5,
}

impl SetupPid {
    pub fn from_bytes(buf: &[u8; 8]) -> Self {
        SetupPid {
            bmRequestType: buf[0],
            bRequest: buf[1],
            wValue: u16::from_le_bytes([buf[2], buf[3]]),
            wIndex: u16::from_le_bytes([buf[4], buf[5]]),
            wLength: u16::from_le_bytes([buf[6], buf[7]]),
        }
    }

    pub fn direction(&self) -> SetupDirection {
        let x = (self.bmRequestType >> 7) & 0b1;
        SetupDirection::try_from(x).unwrap_or(SetupDirection::HostToDevice)
    }

    pub fn setup_type(&self) -> SetupType {
        let x = (self.bmRequestType >> 5) & 0b11;
        SetupType::try_from(x).unwrap_or(SetupType::Reserved)
    }

    pub fn recipient(&self) -> Option<SetupRecipient> {
        SetupRecipient::try_from(self.bmRequestType & 0b11111).ok()
    }
}

#[allow(non_snake_case)]
#[repr(C)]
#[repr(packed)]
pub struct DeviceDescriptor {
    pub bLength: u8,
    pub bDescriptorType: u8,
    pub bcdUSB: u16,
    pub bDeviceClass: u8,
    pub bDeviceSubClass: u8,
    pub bDeviceProtocol: u8,
    pub bMaxPacketSize0: u8,
    pub idVendor: u16,
    pub idProduct: u16,
    pub bcdDevice: u16,
    pub iManufacturer: u8,
    pub iProduct: u8,
    pub iSerialNumber: u8,
    pub bNumConfigurations: u8,
}

#[allow(non_snake_case)]
#[repr(C)]
#[repr(packed)]
pub struct ConfigurationDescriptor {
    pub bLength: u8,
    pub bDescriptorType: u8,
    pub wTotalLength: u16,
    pub bNumInterfaces: u8,
    pub bConfigurationValue: u8,
    pub iConfiguration: u8,
    pub bmAttributes: u8,
    pub bMaxPower: u8,
}

#[allow(non_snake_case)]
#[repr(C)]
#[repr(packed)]
pub struct InterfaceDescriptor {
    pub bLength: u8,
    pub bDescriptorType: u8,
    pub bInterfaceNumber: u8,
    pub bAlternateSetting: u8,
    pub bNumEndpoints: u8,
    pub bInterfaceClass: u8,
    pub bInterfaceSubClass: u8,
    pub bInterfaceProtocol: u8,
    pub iInterface: u8,
}

/// String descriptors are assembled at request time; the payload is UTF-16
/// and fits the longest string we serve (33 code points).
#[allow(non_snake_case)]
#[repr(C)]
#[repr(packed)]
pub struct StringDescriptor {
    pub bLength: u8,
    pub bDescriptorType: u8,
    pub bString: [u8; 66],
}

/// Trait for structs which can be safely cast to &[u8].
///
/// Types implementing ToBytes must be repr(packed).
pub unsafe trait ToBytes: Sized {
    fn to_bytes(&self) -> &[u8] {
        // UNSAFE: We return a non-mutable slice into this packed struct's
        // memory at the length of the struct, with a lifetime bound to &self.
        unsafe {
            core::slice::from_raw_parts(self as *const _ as *const u8, core::mem::size_of::<Self>())
        }
    }
}

unsafe impl ToBytes for DeviceDescriptor {}
unsafe impl ToBytes for ConfigurationDescriptor {}
unsafe impl ToBytes for InterfaceDescriptor {}
unsafe impl ToBytes for StringDescriptor {}
