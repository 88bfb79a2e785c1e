//! Version command.

/// Prints version information.
pub fn run() {
    println!("faultline {}", env!("CARGO_PKG_VERSION"));
}
