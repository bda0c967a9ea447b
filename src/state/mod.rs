//! Reactive client state: auth, profile and the navigation gate.
//!
//! Data flows one way: session store → [`AuthState`] → [`ProfileState`] →
//! [`NavigationGate`]. Handles are passed explicitly; there is no ambient
//! global context.

pub mod auth;
pub mod gate;
pub mod profile;

pub use auth::{AuthSnapshot, AuthState};
pub use gate::{evaluate, GateWatch, NavigationGate, Screen};
pub use profile::{ProfileSnapshot, ProfileState, ProfileStatus};
