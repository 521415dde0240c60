//! Route groups. Each module exposes `router()` returning a
//! `Router<AppState>` that `build_router` merges.

pub mod checkout;
pub mod health;
pub mod orders;
pub mod stock;
