//! Network plumbing below the messaging client.
//!
//! Only the byte transport lives here; Wi-Fi bring-up is an adapter
//! (`adapters::wifi`) and the HTTP framing is in `telegram`.

pub mod transport;
