//! List commands implementation

/// List the device kinds this build can open
pub fn list_devices() {
    println!("Supported devices:");
    println!();
    for device in synadiag_session::available_devices() {
        println!("  {:<22} - {}", device.name, device.description);
    }
}
