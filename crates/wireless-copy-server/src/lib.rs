// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Server - Receiving side
//
// Fronts the token authority and the upload writer with a small axum
// router. The binary in main.rs only wires settings and logging.

pub mod auth;
pub mod receive;
pub mod server;

pub use auth::TokenAuthority;
pub use server::{create_router, serve, start_server, ServerState};
