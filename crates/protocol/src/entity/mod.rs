mod descriptor;
mod id;
mod modification;

pub use descriptor::{EntityDescriptor, Shape, Vector3, Walk, WalkNode};
pub use id::RemoteEntityId;
pub use modification::EntityModification;
