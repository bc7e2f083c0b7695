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

// Drives the texture cache and the batch partitioner the way a tile
// renderer would: one reservation, touch and texture hold per visible
// sprite batch and frame.
// Run with: cargo run -p sandbox -- --frames 600

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tessera_core::{MemorySettings, ResidencyMonitor};
use tessera_data::{Cache3State, ElementKey, MemoryPartitioner, PartitionError};
use tessera_telemetry::{init_logging, TelemetryService};

#[derive(Debug, Parser)]
#[command(about = "Simulated frame loop over the residency engines")]
struct Args {
    /// JSON file with memory settings. Defaults apply when omitted.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Number of frames to simulate.
    #[arg(long, default_value_t = 600)]
    frames: u32,

    /// Number of distinct sprite batches in the scene.
    #[arg(long, default_value_t = 400)]
    batches: u32,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// A decoded batch descriptor, bound to its buffer chunk.
#[derive(Debug)]
struct BatchDescriptor {
    vertex_count: u32,
}

/// Stand-in for a GPU texture.
#[derive(Debug)]
struct Texture {
    name: String,
}

/// A tiny linear congruential generator, so runs are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) as u32
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<MemorySettings> {
    let Some(path) = path else {
        return Ok(MemorySettings::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    MemorySettings::from_json_str(&json)
        .with_context(|| format!("Failed to load settings from {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let settings = load_settings(args.settings.as_ref())?;
    log::info!("Memory settings: {settings:?}");

    let mut partitioner: MemoryPartitioner<BatchDescriptor> =
        MemoryPartitioner::from_settings(&settings)?.with_label("sprite_batches");
    partitioner.set_on_reclaimed(Box::new(|id: String, batch: Option<BatchDescriptor>| {
        log::trace!("Batch '{id}' lost its buffer range ({batch:?})");
    }));

    let mut textures: Cache3State<Texture> = Cache3State::new(
        settings.cache_budget_bytes,
        Some(Box::new(|texture: Texture| {
            log::trace!("Deleting texture '{}'", texture.name);
        })),
    )
    .with_label("textures");

    let mut telemetry = TelemetryService::new(Duration::from_millis(250));
    let mut rng = Lcg(0x7e55_e2a);
    let batch_count = args.batches.max(1);
    let mut reclaim_failures = 0u32;

    for frame in 0..args.frames {
        // The camera sees a sliding window of batches.
        let window = (frame * 3) % batch_count;
        let mut held: Vec<ElementKey> = Vec::new();

        for offset in 0..32 {
            let batch = (window + offset) % batch_count;
            let batch_id = format!("batch-{batch}");

            if partitioner.possess(&batch_id) {
                partitioner.touch(&batch_id);
            } else {
                let n_bytes = 512 + (rng.next_u32() % 16) as usize * 256;
                match partitioner
                    .reserve(&batch_id, n_bytes)
                    .map(|chunk| chunk.start())
                {
                    Ok(start) => {
                        log::trace!("'{batch_id}' uploaded at byte {start}");
                        partitioner.bind_object(
                            &batch_id,
                            BatchDescriptor {
                                vertex_count: (n_bytes / 16) as u32,
                            },
                        );
                    }
                    Err(err @ PartitionError::Exhausted { .. }) => {
                        reclaim_failures += 1;
                        log::warn!("Frame {frame}: {err}");
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            let texture_id = format!("texture-{}", batch % 64);
            let size = 256 * 1024 + (rng.next_u32() % 4) as usize * 256 * 1024;
            let key = textures.add_and_hold_element(
                Texture {
                    name: texture_id.clone(),
                },
                size,
                Some(&texture_id),
                None,
                false,
            );
            held.push(key);
        }

        // A multi-step draw pins the first visible batch.
        let pinned = format!("batch-{window}");
        if let Some(batch) = partitioner.add_lock(&pinned) {
            log::trace!("Drawing {} vertices from '{pinned}'", batch.vertex_count);
        }
        partitioner.remove_lock(&pinned);

        for key in held {
            textures.release(key);
        }

        let monitors: [&dyn ResidencyMonitor; 2] = [&textures, &partitioner];
        telemetry.tick(&monitors);
    }

    let monitors: [&dyn ResidencyMonitor; 2] = [&textures, &partitioner];
    telemetry.sample_now(&monitors);

    textures.log_stats();
    partitioner.log_state();
    telemetry.log_summary();
    log::info!(
        "Simulated {} frames, {} reservations failed",
        args.frames,
        reclaim_failures
    );
    Ok(())
}
