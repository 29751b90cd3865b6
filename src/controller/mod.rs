pub mod bindings;
pub mod input;
pub mod lifecycle;
pub mod physics;
pub mod stage;

pub use bindings::{BindError, BindingTable};
pub use input::PointerState;
pub use lifecycle::{LifecycleController, LifecycleState, RenderSink};
pub use physics::{Body, BodyId, BodyKind, PhysicsWorld, Shape};
pub use stage::{DropStage, Stage, StageContext, StageFactory};
