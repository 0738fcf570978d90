//! Printable implementations for stack types.

mod address;
mod event;
mod interface;
mod neighbor;
mod route;
