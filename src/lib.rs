//! Session resolution and role-gated routing for the clinic client.
//!
//! The crate answers three questions for the views: who is signed in, what
//! role they hold, and whether that is known yet ([`session`]); which view a
//! given path may show for that session ([`routes`], [`navigator`]); and which
//! role-specific controls to render ([`role::Capability`], [`nav`]).
//!
//! Authentication and profile storage sit behind the
//! [`identity::IdentityProvider`] and [`profile::ProfileStore`] traits, with
//! in-memory, REST, and Postgres implementations. [`app::Clinic`] wires them
//! together from [`config::ClinicConfig`].

pub mod accounts;
pub mod app;
pub mod config;
pub mod db;
pub mod identity;
pub mod nav;
pub mod navigator;
pub mod profile;
pub mod role;
pub mod routes;
pub mod session;
