//! # Device Inspector Module
//!
//! Shows the GATT tree of the connected peripheral as a three level
//! expandable list: services, their characteristics, and the descriptors of
//! each characteristic. Every readable characteristic and every descriptor
//! is read once per discovery; notifications update values in place.
//!
//! ## Module Architecture
//!
//! ```text
//! inspector/
//! ├── element.rs           - ElementKey identity and per-row display flags
//! ├── expansion.rs         - Accordion state of the service groups
//! ├── format.rs            - Text / hex value rendering
//! ├── inspector_handle.rs  - Worker task owning the model, UI handle
//! └── model.rs             - Tree, values and list adapter queries
//! ```
//!
//! ## Rules
//!
//! - A discovery clears everything and rebuilds the tree in the order the
//!   session reports services.
//! - Values are replaced, never appended. Failed reads are not retried and
//!   simply have no value.
//! - Opening a service group closes all others.

pub mod element;
pub mod expansion;
pub mod format;
pub mod inspector_handle;
pub mod model;
