use thiserror::Error;

use crate::object::ObjectId;

/// Recoverable errors from scene graph operations.
///
/// A call that returns one of these has not modified the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("object {0:?} does not exist")]
    UnknownObject(ObjectId),
    #[error("object {0:?} has been destroyed")]
    DestroyedObject(ObjectId),
    #[error("object {0:?} cannot be its own parent")]
    SelfParent(ObjectId),
    #[error("parenting {child:?} to {parent:?} would create a cycle")]
    CyclicParent { child: ObjectId, parent: ObjectId },
}
