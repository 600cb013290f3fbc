//! Human readable names for well known GATT UUIDs
//!
//! Covers the Bluetooth SIG assigned numbers a typical maker board exposes
//! plus the Nordic UART and DFU vendor services. Unknown UUIDs resolve to
//! `None` and are displayed as their UUID string.

use uuid::Uuid;

/// Name lookup used when the inspector builds display names.
pub trait NameLookup {
    fn service_name(&self, uuid: &Uuid) -> Option<&str>;
    fn characteristic_name(&self, uuid: &Uuid) -> Option<&str>;
    fn descriptor_name(&self, uuid: &Uuid) -> Option<&str>;
}

/// Static tables compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct KnownUuids;

impl NameLookup for KnownUuids {
    fn service_name(&self, uuid: &Uuid) -> Option<&str> {
        lookup(SERVICES, uuid)
    }

    fn characteristic_name(&self, uuid: &Uuid) -> Option<&str> {
        lookup(CHARACTERISTICS, uuid)
    }

    fn descriptor_name(&self, uuid: &Uuid) -> Option<&str> {
        lookup(DESCRIPTORS, uuid)
    }
}

/// Expands a 16-bit assigned number onto the Bluetooth base UUID.
pub const fn from_short(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | BASE_UUID)
}

const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

fn lookup(table: &'static [(Uuid, &'static str)], uuid: &Uuid) -> Option<&'static str> {
    table
        .iter()
        .find(|(known, _)| known == uuid)
        .map(|(_, name)| *name)
}

pub const NORDIC_UART_SERVICE: Uuid = Uuid::from_u128(0x6e40_0001_b5a3_f393_e0a9_e50e_24dc_ca9e);
pub const NORDIC_UART_TX: Uuid = Uuid::from_u128(0x6e40_0002_b5a3_f393_e0a9_e50e_24dc_ca9e);
pub const NORDIC_UART_RX: Uuid = Uuid::from_u128(0x6e40_0003_b5a3_f393_e0a9_e50e_24dc_ca9e);
pub const NORDIC_DFU_SERVICE: Uuid = Uuid::from_u128(0x0000_1530_1212_efde_1523_785f_eabc_d123);

static SERVICES: &[(Uuid, &str)] = &[
    (from_short(0x1800), "Generic Access"),
    (from_short(0x1801), "Generic Attribute"),
    (from_short(0x1802), "Immediate Alert"),
    (from_short(0x1803), "Link Loss"),
    (from_short(0x1804), "Tx Power"),
    (from_short(0x1805), "Current Time Service"),
    (from_short(0x1809), "Health Thermometer"),
    (from_short(0x180A), "Device Information"),
    (from_short(0x180D), "Heart Rate"),
    (from_short(0x180F), "Battery Service"),
    (from_short(0x1812), "Human Interface Device"),
    (from_short(0x1816), "Cycling Speed and Cadence"),
    (from_short(0x181A), "Environmental Sensing"),
    (from_short(0xFE59), "Nordic Secure DFU"),
    (NORDIC_UART_SERVICE, "UART"),
    (NORDIC_DFU_SERVICE, "DFU"),
];

static CHARACTERISTICS: &[(Uuid, &str)] = &[
    (from_short(0x2A00), "Device Name"),
    (from_short(0x2A01), "Appearance"),
    (from_short(0x2A04), "Peripheral Preferred Connection Parameters"),
    (from_short(0x2A05), "Service Changed"),
    (from_short(0x2A06), "Alert Level"),
    (from_short(0x2A07), "Tx Power Level"),
    (from_short(0x2A19), "Battery Level"),
    (from_short(0x2A1C), "Temperature Measurement"),
    (from_short(0x2A23), "System ID"),
    (from_short(0x2A24), "Model Number String"),
    (from_short(0x2A25), "Serial Number String"),
    (from_short(0x2A26), "Firmware Revision String"),
    (from_short(0x2A27), "Hardware Revision String"),
    (from_short(0x2A28), "Software Revision String"),
    (from_short(0x2A29), "Manufacturer Name String"),
    (from_short(0x2A2A), "IEEE 11073-20601 Regulatory Certification Data List"),
    (from_short(0x2A37), "Heart Rate Measurement"),
    (from_short(0x2A38), "Body Sensor Location"),
    (from_short(0x2A50), "PnP ID"),
    (from_short(0x2A6E), "Temperature"),
    (from_short(0x2A6F), "Humidity"),
    (NORDIC_UART_TX, "TX"),
    (NORDIC_UART_RX, "RX"),
    (
        Uuid::from_u128(0x0000_1531_1212_efde_1523_785f_eabc_d123),
        "DFU Control Point",
    ),
    (
        Uuid::from_u128(0x0000_1532_1212_efde_1523_785f_eabc_d123),
        "DFU Packet",
    ),
    (
        Uuid::from_u128(0x0000_1534_1212_efde_1523_785f_eabc_d123),
        "DFU Version",
    ),
];

static DESCRIPTORS: &[(Uuid, &str)] = &[
    (from_short(0x2900), "Characteristic Extended Properties"),
    (from_short(0x2901), "Characteristic User Description"),
    (from_short(0x2902), "Client Characteristic Configuration"),
    (from_short(0x2903), "Server Characteristic Configuration"),
    (from_short(0x2904), "Characteristic Presentation Format"),
    (from_short(0x2905), "Characteristic Aggregate Format"),
    (from_short(0x2906), "Valid Range"),
    (from_short(0x2908), "Report Reference"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_uuids_expand_onto_the_base_uuid() {
        assert_eq!(
            from_short(0x180F).to_string(),
            "0000180f-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn resolves_names_per_table() {
        let names = KnownUuids;
        assert_eq!(names.service_name(&from_short(0x180A)), Some("Device Information"));
        assert_eq!(names.characteristic_name(&from_short(0x2A19)), Some("Battery Level"));
        assert_eq!(
            names.descriptor_name(&from_short(0x2902)),
            Some("Client Characteristic Configuration")
        );
        // Tables are separate, a descriptor UUID is not a service
        assert_eq!(names.service_name(&from_short(0x2902)), None);
    }

    #[test]
    fn parsed_uuids_match_regardless_of_case() {
        let upper = Uuid::parse_str("6E400001-B5A3-F393-E0A9-E50E24DCCA9E").unwrap();
        assert_eq!(upper, NORDIC_UART_SERVICE);
        assert_eq!(KnownUuids.service_name(&upper), Some("UART"));
    }
}
