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

//! Errors raised by the memory partitioner.

use thiserror::Error;

/// A specialized `Result` type for partitioner operations.
pub type PartitionResult<T> = Result<T, PartitionError>;

/// An error that can occur when reserving a chunk of the arena.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    /// A chunk of zero bytes was requested.
    #[error("Cannot reserve a chunk of zero bytes")]
    ZeroSized,
    /// No selection of chunks can hold the request without reclaiming a
    /// locked chunk.
    #[error(
        "No available chunk can hold {requested} bytes. Make sure that enough space is allocated \
         (currently {arena}) or that locked chunks are correctly unlocked"
    )]
    Exhausted {
        /// The number of bytes requested.
        requested: usize,
        /// The size of the whole arena.
        arena: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_names_both_sizes() {
        let err = PartitionError::Exhausted {
            requested: 300,
            arena: 256,
        };
        let message = err.to_string();
        assert!(message.contains("300 bytes"), "Message was: {message}");
        assert!(message.contains("currently 256"), "Message was: {message}");
    }
}
