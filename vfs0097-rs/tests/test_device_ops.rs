mod testing_common;

use log::info;
use vfs0097_rs::{Error, FpDevice, Print, device::ScanType};

use crate::testing_common::*;

#[tokio::test]
async fn test_close_drops_session() {
    setup_logging();

    let mut vfs = get_vfs0097_test_instance(open_script(paired_flash()));
    vfs.open().await.expect("failed to open device");
    assert!(vfs.last_response().is_some());

    info!("Closing device");
    vfs.close().await.expect("failed to close device");

    assert!(!vfs.is_open());
    assert!(vfs.tls_keys().is_none());
    assert!(vfs.last_response().is_none());
    assert!(vfs.transport().released);
}

#[tokio::test]
async fn test_reopen_after_close() {
    setup_logging();

    let mut transport = open_script(paired_flash());
    for reply in [
        rom_info(vfs0097_rs::l2::init::PROVISIONED),
        vec![0x00],
        vec![0x00],
        vec![0x00],
        vec![0x00],
        paired_flash(),
    ] {
        transport = transport.reply(reply);
    }
    let mut vfs = get_vfs0097_test_instance(transport);

    vfs.open().await.expect("failed to open device");
    vfs.close().await.expect("failed to close device");
    vfs.open().await.expect("failed to reopen device");

    assert_eq!(vfs.transport().written.len(), 12);
    assert!(vfs.tls_keys().is_some_and(|keys| keys.is_trusted()));
}

#[tokio::test]
async fn test_operations_complete_immediately() {
    setup_logging();

    let mut vfs = get_vfs0097_test_instance(open_script(paired_flash()));
    vfs.open().await.expect("failed to open device");

    let template = Print {
        username: Some("alice".into()),
        description: Some("right index".into()),
        data: vec![],
    };
    let enrolled = vfs.enroll(template.clone()).await.expect("failed to enroll");
    assert_eq!(enrolled, template);

    vfs.verify(&enrolled).await.expect("failed to verify");
    assert_eq!(
        vfs.identify(&[enrolled.clone()]).await.expect("failed to identify"),
        None
    );
    vfs.delete(&enrolled).await.expect("failed to delete");
    assert!(vfs.list().await.expect("failed to list").is_empty());

    info!("Nothing runs once the stubs returned, cancel is a no-op");
    vfs.cancel();
    assert!(!vfs.cancel_handle().is_cancelled());
}

#[tokio::test]
async fn test_operations_require_open_device() {
    setup_logging();

    let mut vfs = get_vfs0097_test_instance(ScriptedTransport::new());

    assert_eq!(vfs.list().await, Err(Error::NotOpen));
    assert_eq!(vfs.enroll(Print::default()).await, Err(Error::NotOpen));
    assert!(vfs.transport().written.is_empty());
}

#[test]
fn test_driver_info() {
    let vfs = get_vfs0097_test_instance(ScriptedTransport::new());
    let info = vfs.info();

    assert_eq!(info.id, "vfs0097");
    assert_eq!(info.full_name, "Validity VFS0097");
    assert_eq!(info.scan_type, ScanType::Press);
    assert!(info.matches(0x138a, 0x0097));
}
