pub mod app;
pub mod config;
pub mod model;
pub mod net;

pub use app::{
    run_app, AppError, Camera, FeedStatus, LoopConfig, LoopMetricsSnapshot, SessionControl, Vec2,
    ViewMode, ViewerAction, ViewerSession, Viewport, WorldSize,
};
pub use config::{ConfigError, SpriteSource, ViewerConfig};
pub use model::{ModelChange, WorldModel, WorldSnapshot};
pub use net::{spawn_transport, TransportEvent, TransportHandle, ViewRequest, ViewSink};
