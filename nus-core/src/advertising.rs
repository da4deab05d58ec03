//! Advertising identity: device name and the legacy advertising data block.

use uuid::Uuid;

/// Nordic UART Service.
pub const NUS_SERVICE_UUID: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);
/// RX characteristic (peer writes).
pub const NUS_RX_CHAR_UUID: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);
/// TX characteristic (device notifies).
pub const NUS_TX_CHAR_UUID: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

pub const DEVICE_NAME_PREFIX: &str = "S1";

/// Legacy advertising payload limit.
pub const MAX_ADV_DATA_LEN: usize = 31;

const AD_TYPE_FLAGS: u8 = 0x01;
const AD_TYPE_128BIT_SERVICE_UUID_COMPLETE: u8 = 0x07;
const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
const ADV_FLAGS_LE_ONLY_GENERAL_DISC_MODE: u8 = 0x06;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdvertisingError {
    #[error("device name is empty")]
    EmptyName,
    #[error("advertising data is {0} bytes, limit is 31")]
    TooLong(usize),
}

/// `S1-` followed by the low 16 bits of the device address in upper-case hex.
pub fn device_name(address: u16) -> String {
    format!("{}-{:04X}", DEVICE_NAME_PREFIX, address)
}

/// Build AD structures: complete local name, discovery flags, and the
/// 128-bit service UUID in little-endian order.
pub fn advertising_data(name: &str) -> Result<Vec<u8>, AdvertisingError> {
    if name.is_empty() {
        return Err(AdvertisingError::EmptyName);
    }
    let uuid = NUS_SERVICE_UUID.as_u128().to_le_bytes();
    let len = (2 + name.len()) + 3 + (2 + uuid.len());
    if len > MAX_ADV_DATA_LEN {
        return Err(AdvertisingError::TooLong(len));
    }

    let mut out = Vec::with_capacity(len);
    out.push(name.len() as u8 + 1);
    out.push(AD_TYPE_COMPLETE_LOCAL_NAME);
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(&[0x02, AD_TYPE_FLAGS, ADV_FLAGS_LE_ONLY_GENERAL_DISC_MODE]);
    out.push(uuid.len() as u8 + 1);
    out.push(AD_TYPE_128BIT_SERVICE_UUID_COMPLETE);
    out.extend_from_slice(&uuid);
    Ok(out)
}
