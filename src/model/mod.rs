// MODEL: camera and scene graph state, independent of any GPU resources
pub mod camera;
pub mod scene;

pub use camera::{Camera, ViewContext};
pub use scene::{DirectionalLight, ProxyId, ProxyShape, Scene, VisualProxy};
