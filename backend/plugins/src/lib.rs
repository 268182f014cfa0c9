pub mod image;
pub mod manifest;
pub mod registry;
pub mod video;

pub use image::{ImageGenerationConfig, ImageGenerationPlugin};
pub use manifest::{PluginDescriptor, parse_request};
pub use registry::PluginRegistry;
pub use video::{VideoGenerationConfig, VideoGenerationPlugin};
