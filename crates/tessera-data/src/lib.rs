// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Tessera Data
//!
//! The residency engines of the tile renderer:
//!
//! - [`cache::Cache3State`] bounds the memory held by GPU textures and decides
//!   which released textures to evict.
//! - [`partitioner::MemoryPartitioner`] carves a fixed GPU buffer arena into
//!   named byte ranges for render batches, reclaiming stale ranges on demand.

#![warn(missing_docs)]

pub mod cache;
pub mod partitioner;

pub use cache::{Cache3State, CacheStats, ElementHandle, ElementKey, ManagementType};
pub use partitioner::{
    ChunkLocation, MemoryChunk, MemoryPartitioner, PartitionError, PartitionResult, PartitionStats,
};
