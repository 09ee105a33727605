//! Rollcall admission passes
//!
//! A pass is the plaintext string `<eventId>:<userId>` that a student shows
//! as a QR code at the door. Passes are not signed and do not expire; the
//! registration row they point at is the only source of truth.
//!
//! Rendering delegates to a public QR image endpoint, so this crate only
//! builds links and never rasterizes anything itself.

pub mod payload;
pub mod render;

pub use payload::{AdmissionPass, PassError};
pub use render::QrRenderer;
