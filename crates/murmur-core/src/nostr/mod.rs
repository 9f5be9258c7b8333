pub mod cipher;
pub mod wrap;

pub use cipher::{MessageCipher, Nip44Cipher};
pub use wrap::{build_gift_wraps, unwrap_envelope, OutgoingWraps};
