//! lcp-core - Readium LCP license and decryption service
//!
//! Opens and validates LCP licenses, embeds them in EPUB containers and
//! decrypts protected resources. Android reaches it through [`jni_bridge`],
//! other hosts through the UniFFI exports in [`bindings`].
//!
//! ```no_run
//! use lcp_core::{service, ServiceConfig};
//! use std::path::Path;
//!
//! # fn main() -> lcp_core::Result<()> {
//! let config = ServiceConfig::from_file(Path::new("lcp.json"))?;
//! let handle = service::create_service(&config)?;
//! let license = service::open_container_license(handle, Path::new("book.epub"))?;
//! println!("{} from {}", license.id(), license.provider());
//! service::release_service(handle)?;
//! # Ok(())
//! # }
//! ```

uniffi::setup_scaffolding!();

pub mod bindings;
pub mod bridge;
pub mod config;
pub mod container;
pub mod crypto;
pub mod decrypt;
pub mod error;
pub mod file;
pub mod license;
pub mod service;

// JNI bridge for Android
#[cfg(target_os = "android")]
mod jni_bridge;

pub use config::ServiceConfig;
pub use error::{ContainerError, DecryptError, LcpError, LicenseError, Result};
pub use license::{License, LicenseStatus, LicenseSummary, Right, RightsReport, UserKeyScope};
pub use service::{LcpService, ServiceHandle};
