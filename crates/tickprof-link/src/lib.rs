//! Signed trace-activation links.
//!
//! A process running with profiling off can be switched into TRACE mode for
//! a single request by a URL carrying a nonce and a signature derived from a
//! shared secret. Signing and verification both compute over the canonical
//! form produced by [`UrlParts`], with scheme and host removed so a link stays
//! valid across hosts that share the secret.
//!
//! ```
//! use tickprof_link::LinkSigner;
//!
//! let signer = LinkSigner::new("abc").unwrap();
//! let link = signer.sign("https://svc/path?x=1").unwrap();
//! assert!(signer.verify(&link));
//! ```

pub mod query;
mod signer;
pub mod url;

pub use signer::{LinkSigner, Nonce, SignedLink};
pub use url::UrlParts;
