pub mod codec;
pub mod config;
pub mod send_message;
pub mod tunnel;

pub use codec::{DecodeError, EncodeError};
pub use config::ConfigError;
pub use send_message::SendMessageError;
pub use tunnel::TunnelError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    SendMessage(#[from] send_message::SendMessageError),

    #[error(transparent)]
    Tunnel(#[from] tunnel::TunnelError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}
