//! GST computation: GSTIN checks and tax splits

pub mod gst;
pub mod gstin;
