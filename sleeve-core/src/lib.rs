#![allow(clippy::new_without_default)]

pub mod artwork;
pub mod auth;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod sync;
pub mod track;
pub mod util;
pub mod webapi;
pub mod window;
