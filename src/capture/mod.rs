mod snapshot;
mod still;

pub use snapshot::SnapshotTicket;
pub use still::{CaptureController, CaptureRequest, PictureOutput, PictureTicket};
