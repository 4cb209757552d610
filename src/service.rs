use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{
    cache::ImageCache,
    error::ClockResult,
    fields::{self, ResolveOptions, WeatherSnapshot},
    render::{self, Bitmap, CONTENT_TYPE, Theme},
    template::TemplateStore,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    /// Layout/template pair addressed by this orientation.
    pub fn layout_name(self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
        }
    }
}

/// One incoming render request, as handed over by the HTTP layer.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderRequest {
    pub orientation: Orientation,
    pub theme: Theme,
    pub timezone: String,
    #[serde(default)]
    pub display_weather: bool,
    #[serde(default)]
    pub weather_snapshot: Option<WeatherSnapshot>,
}

/// Encoded response body plus the metadata the HTTP layer needs for headers.
#[derive(Clone, Debug)]
pub struct EncodedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }
}

/// Deterministic cache key over every render-affecting input: orientation,
/// theme, timezone, the request instant truncated to the minute (so all
/// requests within one minute share a single entry) and, when weather is
/// displayed, the snapshot fields that end up in the image.
pub fn cache_key(request: &RenderRequest, instant: DateTime<Utc>) -> String {
    use std::fmt::Write as _;

    let bucket = instant.format("%Y%m%d%H%M");
    let theme = match request.theme {
        Theme::Light => "light",
        Theme::Dark => "dark",
    };
    let mut key = format!(
        "clock:{}:{}:{}:{}:{}",
        request.orientation.layout_name(),
        theme,
        request.timezone,
        u8::from(request.display_weather),
        bucket
    );
    if request.display_weather
        && let Some(weather) = &request.weather_snapshot
    {
        let _ = write!(
            key,
            ":{}:{}:{}",
            weather.temperature_c.round() as i64,
            weather.condition,
            weather.icon_id
        );
    }
    key
}

/// Ties the store, cache and render pipeline together. The HTTP handler owns
/// one of these and calls [`handle`](Self::handle) per request.
pub struct ClockService {
    store: TemplateStore,
    cache: ImageCache,
    ttl: Duration,
}

impl ClockService {
    pub fn new(store: TemplateStore, cache: ImageCache, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    #[tracing::instrument(skip(self, request), fields(orientation = request.orientation.layout_name()))]
    pub fn handle(
        &self,
        request: &RenderRequest,
        instant: DateTime<Utc>,
    ) -> ClockResult<EncodedImage> {
        let key = cache_key(request, instant);
        let bitmap = self
            .cache
            .get_or_compute(&key, self.ttl, || self.render_uncached(request, instant))?;

        Ok(EncodedImage {
            png: bitmap.encode_png()?,
            width: bitmap.width,
            height: bitmap.height,
        })
    }

    /// Full render path, invoked by the cache on a miss.
    fn render_uncached(
        &self,
        request: &RenderRequest,
        instant: DateTime<Utc>,
    ) -> ClockResult<Bitmap> {
        let options = ResolveOptions {
            weather: if request.display_weather {
                request.weather_snapshot.clone()
            } else {
                None
            },
        };
        let resolved = fields::resolve(instant, &request.timezone, &options)?;

        let layout = self.store.load_layout(request.orientation.layout_name())?;
        let template = self.store.load(&layout.template_name)?;

        render::render_themed(&template, &layout, &resolved, request.theme)
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }
}
