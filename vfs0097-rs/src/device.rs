use crate::l1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Usb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    /// Finger is placed on the sensor
    Press,
    Swipe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbId {
    pub vendor_id: u16,
    pub product_id: u16,
}

/// Static description of a driver.
#[derive(Debug)]
pub struct DriverInfo {
    pub id: &'static str,
    pub full_name: &'static str,
    pub device_type: DeviceType,
    pub scan_type: ScanType,
    pub id_table: &'static [UsbId],
}

impl DriverInfo {
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.id_table
            .iter()
            .any(|id| id.vendor_id == vendor_id && id.product_id == product_id)
    }
}

pub static VFS0097_INFO: DriverInfo = DriverInfo {
    id: "vfs0097",
    full_name: "Validity VFS0097",
    device_type: DeviceType::Usb,
    scan_type: ScanType::Press,
    id_table: &[UsbId {
        vendor_id: l1::VENDOR_ID,
        product_id: l1::PRODUCT_ID,
    }],
};

/// Enrolled fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Print {
    pub username: Option<String>,
    pub description: Option<String>,
    pub data: Vec<u8>,
}

/// Operations a fingerprint driver exposes to its host.
#[allow(async_fn_in_trait)]
pub trait FpDevice {
    type Error;

    fn info(&self) -> &'static DriverInfo;

    async fn open(&mut self) -> Result<(), Self::Error>;

    async fn close(&mut self) -> Result<(), Self::Error>;

    /// Capture a new print, filling in `template`.
    async fn enroll(&mut self, template: Print) -> Result<Print, Self::Error>;

    /// Check the finger on the sensor against `print`.
    async fn verify(&mut self, print: &Print) -> Result<(), Self::Error>;

    /// Find the print matching the finger on the sensor among `gallery`.
    async fn identify(&mut self, gallery: &[Print]) -> Result<Option<Print>, Self::Error>;

    async fn delete(&mut self, print: &Print) -> Result<(), Self::Error>;

    /// Prints stored on the sensor.
    async fn list(&mut self) -> Result<Vec<Print>, Self::Error>;

    /// Abort the operation in progress.
    fn cancel(&self);
}
