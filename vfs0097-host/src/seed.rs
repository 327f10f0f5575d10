use std::fs;
use std::path::Path;

use log::{debug, warn};

use vfs0097_rs::common::Seed;

pub const DMI_ID_DIR: &str = "/sys/class/dmi/id";
const PRODUCT_NAME: &str = "product_name";
const PRODUCT_SERIAL: &str = "product_serial";

fn read_dmi_field(dir: &Path, field: &str) -> std::io::Result<String> {
    let value = fs::read_to_string(dir.join(field))?;
    Ok(value.trim_end_matches(['\n', '\0']).to_string())
}

/// Seed built from the DMI product name and serial under `dir`.
///
/// Falls back to the VirtualBox seed when either field cannot be read, the
/// serial is only readable by root.
pub fn seed_from_dmi(dir: &Path) -> Seed {
    let fields = read_dmi_field(dir, PRODUCT_NAME)
        .and_then(|name| Ok((name, read_dmi_field(dir, PRODUCT_SERIAL)?)));

    match fields {
        Ok((name, serial)) => {
            debug!("Seed from DMI: product {:?}, serial {:?}", name, serial);
            Seed::from_system_id(&name, &serial)
        }
        Err(err) => {
            warn!(
                "Unable to read DMI ids from {}: {}, using the VirtualBox seed",
                dir.display(),
                err
            );
            Seed::virtualbox()
        }
    }
}

pub fn system_seed() -> Seed {
    seed_from_dmi(Path::new(DMI_ID_DIR))
}
