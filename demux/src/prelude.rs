//! Prelude module for convenient imports.
//!
//! ```rust
//! use demux::prelude::*;
//! ```

// Core error types
pub use crate::{Error, Result};

// Packets and tracks
pub use crate::{Codec, Packet, PacketFlags, TrackDescriptor, TrackKind};

// Reader contract
pub use crate::{PacketQueue, PacketSink, ReadStatus, Reader};

// Format dispatch
pub use crate::{AnyReader, Format};

// Timing
pub use crate::{Packetizer, SyncConfig, TimecodeFactory};
