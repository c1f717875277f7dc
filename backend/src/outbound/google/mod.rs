//! Google Maps Platform adapter for the geo gateway port.

mod dto;
mod http_gateway;

pub use http_gateway::{GoogleMapsEndpoints, GoogleMapsGateway};
