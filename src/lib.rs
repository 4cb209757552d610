#![forbid(unsafe_code)]

pub mod cache;
pub mod error;
pub mod fields;
pub mod layout;
pub mod render;
pub mod service;
pub mod template;

pub use cache::{CacheStats, ImageCache, StalePolicy};
pub use error::{ClockError, ClockResult};
pub use fields::{ResolveOptions, ResolvedFields, WeatherSnapshot, resolve};
pub use layout::{Align, FieldSpec, LayoutConfig};
pub use render::{Bitmap, CONTENT_TYPE, Theme, render, render_themed, substitute};
pub use service::{ClockService, EncodedImage, Orientation, RenderRequest, cache_key};
pub use template::TemplateStore;
