//! Coursecast Transcoding Pipeline
//!
//! This library turns one uploaded lesson video into an encrypted,
//! multi-bitrate HLS package:
//! - Rendition planning over a static quality ladder
//! - FFmpeg invocation per rendition with AES-128 segment encryption
//! - Master/canonical manifest assembly
//! - Orchestrating job with output verification and cleanup
//! - Retry supervision with bounded attempts and an overall deadline
//! - Read-only progress estimation from on-disk artifacts
// Copyright 2025 Francisco F. Pinochet
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


pub mod encoder;
pub mod job;
pub mod keys;
pub mod manifest;
pub mod progress;
pub mod renditions;
pub mod supervisor;

pub use encoder::{Encoder, FfmpegEncoder};
pub use job::TranscodeJob;
pub use keys::KeyMaterial;
pub use renditions::{Rendition, LADDER};
pub use supervisor::{run_supervised, RetryPolicy};
