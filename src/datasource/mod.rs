pub mod vsphere;
pub mod wire;

#[cfg(test)]
pub mod fake;

pub use vsphere::VsphereClient;
