//! Identity strings a host registrar shows for this driver.

/// Registration identifier.
pub const DRIVER_ID: &str = "PhotonDome.Dome";

/// Long description.
pub const DESCRIPTION: &str = "Arduino+Photon Dome Driver for Explora-Dome";

/// Short display name.
pub const NAME: &str = "Arduino+Photon Dome Controller";

/// Version of the dome interface this driver implements.
pub const INTERFACE_VERSION: i16 = 2;

/// `<major>.<minor>` of this crate.
pub fn driver_version() -> String {
    format!(
        "{}.{}",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR")
    )
}

/// Free-form description including the version.
pub fn driver_info() -> String {
    format!(
        "A Photon+Arduino based dome controller for Explora-Dome. Version: {}",
        driver_version()
    )
}
