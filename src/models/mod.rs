pub mod descriptor;
pub mod validation;

pub use descriptor::{Dimensions, MediaCategory, MediaDescriptor, MediaPriority};
pub use validation::{DescriptorValidator, ValidationError, Validator};
