pub mod commentary;
pub mod extractor;
pub mod renderer;

#[cfg(feature = "browser")]
pub mod browser;

pub use commentary::CommentaryClient;
pub use extractor::FeatureExtractor;
pub use renderer::HttpRenderer;

#[cfg(feature = "browser")]
pub use browser::ChromiumRenderer;
