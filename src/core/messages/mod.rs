pub mod codec;
pub mod envelope;
pub mod frame;

pub use codec::{Codec, JsonCodec};
pub use envelope::Envelope;
pub use frame::{encode_frame, FrameDecoder};
