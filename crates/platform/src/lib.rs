//! Host-environment abstractions for the SoulAudio audio core.
//!
//! This crate provides only the hooks §6.3 of the audio core specification
//! names as external collaborators: a file-descriptor-shaped storage API, an
//! uncached/DMA-accessible memory region marker, a periodic tick-scheduler
//! API, and an offload-coprocessor job queue. It intentionally does not
//! carry the rest of a DAP firmware's hardware abstraction layer (display,
//! input, bluetooth, power, gpio, peripheral buses, flash/SDMMC drivers) —
//! those are peripheral subsystems outside the audio core's scope.
//!
//! # Modules
//!
//! - [`storage`] - `Storage`/`File` traits: open/read/seek/close.
//! - [`offload`] - `OffloadQueue` trait: submit/sync, two-tier priority.
//! - [`scheduler`] - `TickScheduler` trait: add_event/remove_event.
//! - [`uncached`] - `UncachedRegion` marker trait for sample-buffer storage.
//! - [`dma_safety`] - concrete DMA-accessible region types for hardware
//!   builds (`AxiSramRegion`, `Sram4Region`).
//!
//! # Features
//!
//! - `std`: enable standard-library support (for host-side testing).
//! - `defmt`: enable defmt logging/formatting on the public error types.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod dma_safety;
pub mod offload;
pub mod scheduler;
pub mod storage;
pub mod uncached;

pub use offload::OffloadQueue;
pub use scheduler::TickScheduler;
pub use storage::{File, Storage};
pub use uncached::UncachedRegion;
