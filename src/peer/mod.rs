//! Direct peer-to-peer piece transfer.

mod connection;
mod cursor;
mod message;

pub use connection::PeerConnection;
pub use cursor::PeerCursor;
pub use message::{PieceRequest, MAX_REQUEST_LEN};
