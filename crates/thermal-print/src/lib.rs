// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP codec and server, in-memory job store, print pipeline, and the
// USB/character-device printer backend. Bridges the domain types defined
// in `thermal-core` to the actual network and hardware I/O.

pub mod device;
pub mod ipp;
pub mod job_store;
pub mod pipeline;

pub use device::DeviceHandle;
pub use ipp::serve;
pub use job_store::JobStore;
