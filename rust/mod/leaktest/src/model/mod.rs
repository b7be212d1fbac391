mod device;
mod medium;
mod test_record;

pub use device::*;
pub use medium::*;
pub use test_record::*;
