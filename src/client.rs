//! Named client bindings.
//!
//! A caller names a client and hands over a request; the binding supplies the
//! endpoint, default headers and the policy chain that decides how failures
//! are handled. Implementation details are split into submodules under
//! `src/client/`.

pub mod binding;
pub mod builder;
pub mod presets;
pub mod registry;
pub mod types;

pub use binding::ClientBinding;
pub use builder::{ClientBindingBuilder, ClientRegistryBuilder};
pub use registry::ClientRegistry;
pub use types::CallStats;
